// CtrlSim: Control-Plane Network Simulator written in Rust
// Copyright (C) 2022-2023 Tibor Schneider <sctibor@ethz.ch>
//
// This program is free software; you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation; either version 2 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along
// with this program; if not, write to the Free Software Foundation, Inc.,
// 51 Franklin Street, Fifth Floor, Boston, MA 02110-1301 USA.

//! Module containing the physical topology, from which all entities are built.

use petgraph::algo::dijkstra;
use petgraph::graph::{NodeIndex, UnGraph};

use crate::config::SimConfig;
use crate::entity::Entity;
use crate::types::{Census, EntityId, EntityKind, IndexType, ReaderError};

/// Physical topology: every entity with its role, and the (undirected) links between them.
#[derive(Debug, Clone)]
pub struct Topology {
    census: Census,
    graph: UnGraph<EntityKind, (), IndexType>,
}

impl Topology {
    /// Create a topology without links. Ids are assigned as described by [`Census`].
    pub fn new(census: Census) -> Self {
        let mut graph = UnGraph::with_capacity(census.total(), 0);
        for id in 0..census.total() {
            // the census covers every id in this range
            let kind = census.kind_of(id).unwrap_or(EntityKind::Host);
            graph.add_node(kind);
        }
        Self { census, graph }
    }

    /// Classification of the ids.
    pub fn census(&self) -> Census {
        self.census
    }

    /// Number of entities.
    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    /// Returns `true` if the topology has no entities.
    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Number of links.
    pub fn link_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Connect `a` and `b`. Adding an existing link again does nothing.
    pub fn add_link(&mut self, a: EntityId, b: EntityId) -> Result<(), ReaderError> {
        for id in [a, b] {
            if id >= self.len() {
                return Err(ReaderError::UnknownId(id));
            }
        }
        if a == b {
            return Err(ReaderError::SelfLoop(a));
        }
        self.graph.update_edge(NodeIndex::new(a), NodeIndex::new(b), ());
        Ok(())
    }

    /// Returns `true` if `a` and `b` are linked.
    pub fn has_link(&self, a: EntityId, b: EntityId) -> bool {
        a < self.len()
            && b < self.len()
            && self
                .graph
                .find_edge(NodeIndex::new(a), NodeIndex::new(b))
                .is_some()
    }

    /// Neighbors of `id`, in ascending order.
    pub fn neighbors(&self, id: EntityId) -> Vec<EntityId> {
        if id >= self.len() {
            return Vec::new();
        }
        let mut neighbors: Vec<EntityId> = self
            .graph
            .neighbors(NodeIndex::new(id))
            .map(|n| n.index())
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Largest hop distance between any two connected entities.
    pub fn diameter(&self) -> usize {
        self.graph
            .node_indices()
            .filter_map(|n| {
                dijkstra(&self.graph, n, None, |_| 1usize)
                    .into_values()
                    .max()
            })
            .max()
            .unwrap_or(0)
    }

    /// Build all entities. Ports are numbered in ascending order of the neighbor id.
    pub fn build_entities(&self, config: &SimConfig) -> Vec<Entity> {
        (0..self.len())
            .map(|id| {
                let kind = self.graph[NodeIndex::<IndexType>::new(id)];
                let mut entity = Entity::new(id, kind, &self.census);
                for n in self.neighbors(id) {
                    let n_kind = self.graph[NodeIndex::<IndexType>::new(n)];
                    entity.links_mut().add(n, n_kind, config.bandwidth);
                }
                entity
            })
            .collect()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ports_in_neighbor_order() {
        let mut t = Topology::new(Census::new(3, 0, 1));
        t.add_link(0, 2).unwrap();
        t.add_link(1, 0).unwrap();
        t.add_link(3, 0).unwrap();
        t.add_link(0, 1).unwrap();
        assert_eq!(t.link_count(), 3);
        let entities = t.build_entities(&SimConfig::default());
        let links = entities[0].links();
        assert_eq!(links.port_count(), 3);
        assert_eq!(links.neighbor(0), Some(1));
        assert_eq!(links.neighbor(1), Some(2));
        assert_eq!(links.neighbor(2), Some(3));
        assert_eq!(links.get(2).map(|l| l.kind), Some(EntityKind::Host));
        assert_eq!(entities[3].kind(), EntityKind::Host);
    }

    #[test]
    fn invalid_links() {
        let mut t = Topology::new(Census::new(2, 0, 0));
        assert!(matches!(t.add_link(0, 0), Err(ReaderError::SelfLoop(0))));
        assert!(matches!(t.add_link(0, 5), Err(ReaderError::UnknownId(5))));
        assert!(!t.has_link(0, 1));
    }

    #[test]
    fn diameter_of_a_line() {
        let mut t = Topology::new(Census::new(4, 0, 0));
        assert_eq!(t.diameter(), 0);
        t.add_link(0, 1).unwrap();
        t.add_link(1, 2).unwrap();
        t.add_link(2, 3).unwrap();
        assert_eq!(t.diameter(), 3);
        t.add_link(3, 0).unwrap();
        assert_eq!(t.diameter(), 2);
    }
}
