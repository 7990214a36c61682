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

//! # Link-state database
//!
//! [`LinkState`] stores, for every source, the last accepted advertisement (sequence number and
//! expiration) together with the adjacency it advertised. All adjacencies live in a single
//! directed graph whose vertices are all entities: the outgoing edges of a vertex are exactly the
//! neighbors that vertex advertised last.
//!
//! [`LinkStateControl`] extends the database with the computations a controller needs:
//! partitions (connected components, ignoring the direction of edges) and routing tables (breadth
//! first search from a switch).

use std::collections::{BTreeSet, VecDeque};
use std::rc::Rc;

use log::*;
use petgraph::stable_graph::{NodeIndex, StableDiGraph};
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::event::LinkStateUpdate;
use crate::types::{Census, EntityId, IndexType, NextHop, SequenceNum, Time};

/// Bookkeeping of the last advertisement accepted from a source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceRecord {
    /// Sequence number, or `None` if no (unexpired) advertisement was seen.
    pub sn: Option<SequenceNum>,
    /// Expiration time of that advertisement.
    pub expiration: Time,
}

/// Immutable copy of a link-state database, replicated between controllers.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkStateSnapshot {
    /// Bookkeeping per source.
    pub records: Vec<SourceRecord>,
    /// Advertised neighbors per source, sorted.
    pub adjacency: Vec<Vec<EntityId>>,
}

impl LinkStateSnapshot {
    /// Number of sources in the snapshot.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the snapshot contains no source.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Link-state database of a single entity.
#[derive(Debug, Clone)]
pub struct LinkState {
    records: Vec<SourceRecord>,
    topology: StableDiGraph<(), (), IndexType>,
    next_sn: SequenceNum,
    dirty: bool,
}

impl LinkState {
    /// Create an empty database for a network of `num_entities` entities.
    pub fn new(num_entities: usize) -> Self {
        let mut topology = StableDiGraph::with_capacity(num_entities, 0);
        for _ in 0..num_entities {
            topology.add_node(());
        }
        Self {
            records: vec![SourceRecord::default(); num_entities],
            topology,
            next_sn: 0,
            dirty: false,
        }
    }

    /// Number of entities known to the database.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if the database has no entities.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Last accepted sequence number of `src`.
    pub fn last_seq_num(&self, src: EntityId) -> Option<SequenceNum> {
        self.records.get(src).and_then(|r| r.sn)
    }

    /// Returns `true` if `update` is not newer than the last accepted advertisement of its source.
    /// Advertisements of unknown sources are always stale.
    pub fn is_stale_update(&self, update: &LinkStateUpdate) -> bool {
        match self.records.get(update.src) {
            Some(record) => matches!(record.sn, Some(last) if update.sn <= last),
            None => true,
        }
    }

    /// Returns `true` if the database holds a strictly newer advertisement than `update`.
    pub fn has_newer(&self, update: &LinkStateUpdate) -> bool {
        matches!(self.last_seq_num(update.src), Some(last) if last > update.sn)
    }

    /// Install `update`. Returns `true` if the advertised adjacency changed, and `false` if only
    /// the bookkeeping was refreshed.
    pub fn update(&mut self, update: &LinkStateUpdate) -> bool {
        let record = SourceRecord {
            sn: Some(update.sn),
            expiration: update.expiration,
        };
        self.install(update.src, record, &update.neighbors)
    }

    fn install(&mut self, src: EntityId, record: SourceRecord, neighbors: &[EntityId]) -> bool {
        let n = self.records.len();
        if src >= n {
            return false;
        }
        self.records[src] = record;

        let node = NodeIndex::new(src);
        let old: BTreeSet<EntityId> = self.topology.neighbors(node).map(|x| x.index()).collect();
        let new: BTreeSet<EntityId> = neighbors
            .iter()
            .copied()
            .filter(|x| *x < n && *x != src)
            .collect();
        if old == new {
            return false;
        }

        if old.difference(&new).next().is_some() {
            self.dirty = true;
        }
        self.clear_edges(node);
        for x in new {
            self.topology.add_edge(node, NodeIndex::new(x), ());
        }
        true
    }

    fn clear_edges(&mut self, node: NodeIndex<IndexType>) -> bool {
        let edges: Vec<_> = self.topology.edges(node).map(|e| e.id()).collect();
        let removed = !edges.is_empty();
        for e in edges {
            self.topology.remove_edge(e);
        }
        removed
    }

    /// Neighbors currently advertised by `src`, sorted.
    pub fn advertised(&self, src: EntityId) -> Vec<EntityId> {
        if src >= self.records.len() {
            return Vec::new();
        }
        let mut neighbors: Vec<EntityId> = self
            .topology
            .neighbors(NodeIndex::new(src))
            .map(|x| x.index())
            .collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// Reconstruct the advertisement of `src` that is currently installed.
    pub fn current_link_state(&self, src: EntityId) -> Option<LinkStateUpdate> {
        let record = self.records.get(src)?;
        Some(LinkStateUpdate {
            src,
            sn: record.sn?,
            neighbors: self.advertised(src).into(),
            expiration: record.expiration,
            resync: false,
        })
    }

    /// Forget every advertisement whose expiration time lies before `now`.
    pub fn refresh(&mut self, now: Time) {
        for src in 0..self.records.len() {
            let record = self.records[src];
            if record.sn.is_some() && now > record.expiration {
                trace!("advertisement of {} expired at {}", src, record.expiration);
                self.records[src].sn = None;
                if self.clear_edges(NodeIndex::new(src)) {
                    self.dirty = true;
                }
            }
        }
    }

    /// Sequence number for the next advertisement originated by the owner of this database.
    pub fn next_seq_num(&mut self) -> SequenceNum {
        let sn = self.next_sn;
        self.next_sn += 1;
        sn
    }

    /// Returns `true` if an edge was removed since the partitions were last computed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Create an immutable copy of the database.
    pub fn snapshot(&self) -> LinkStateSnapshot {
        LinkStateSnapshot {
            records: self.records.clone(),
            adjacency: (0..self.records.len()).map(|s| self.advertised(s)).collect(),
        }
    }

    /// Install every source of `snapshot` that is newer than the local record. Returns the sources
    /// whose adjacency changed.
    pub fn merge(&mut self, snapshot: &LinkStateSnapshot) -> Vec<EntityId> {
        let mut changed = Vec::new();
        for (src, (record, adjacency)) in snapshot
            .records
            .iter()
            .zip(snapshot.adjacency.iter())
            .enumerate()
        {
            if record.sn > self.last_seq_num(src) && self.install(src, *record, adjacency) {
                changed.push(src);
            }
        }
        changed
    }

    /// Iterate over all advertised edges.
    fn edges(&self) -> impl Iterator<Item = (EntityId, EntityId)> + '_ {
        self.topology
            .edge_indices()
            .filter_map(|e| self.topology.edge_endpoints(e))
            .map(|(a, b)| (a.index(), b.index()))
    }
}

/// Link-state database of a controller, with partition detection and routing tables.
#[derive(Debug, Clone)]
pub struct LinkStateControl {
    view: LinkState,
    census: Census,
    components: UnionFind<usize>,
}

impl LinkStateControl {
    /// Create an empty database.
    pub fn new(census: Census) -> Self {
        Self {
            view: LinkState::new(census.total()),
            census,
            components: UnionFind::new(census.total()),
        }
    }

    /// The underlying link-state database.
    pub fn view(&self) -> &LinkState {
        &self.view
    }

    /// See [`LinkState::is_stale_update`].
    pub fn is_stale_update(&self, update: &LinkStateUpdate) -> bool {
        self.view.is_stale_update(update)
    }

    /// See [`LinkState::refresh`].
    pub fn refresh(&mut self, now: Time) {
        self.view.refresh(now)
    }

    /// Install `update`, see [`LinkState::update`]. Pure additions are merged into the partitions
    /// right away.
    pub fn update(&mut self, update: &LinkStateUpdate) -> bool {
        let changed = self.view.update(update);
        if changed && !self.view.dirty {
            self.join(update.src);
        }
        changed
    }

    /// Merge a snapshot of another controller, see [`LinkState::merge`]. Returns `true` if any
    /// adjacency changed.
    pub fn merge(&mut self, snapshot: &LinkStateSnapshot) -> bool {
        let changed = self.view.merge(snapshot);
        if !self.view.dirty {
            changed.iter().for_each(|src| self.join(*src));
        }
        !changed.is_empty()
    }

    fn join(&mut self, src: EntityId) {
        for n in self.view.advertised(src) {
            self.components.union(src, n);
        }
    }

    /// Recompute the partitions, if an edge was removed since the last computation.
    pub fn compute_partitions(&mut self) {
        if self.view.dirty {
            debug!("recomputing partitions");
            let mut components = UnionFind::new(self.view.len());
            for (a, b) in self.view.edges() {
                components.union(a, b);
            }
            self.components = components;
            self.view.dirty = false;
        }
    }

    /// Returns `true` if `a` and `b` are in different partitions. Unknown entities are
    /// partitioned from everything.
    pub fn are_partitioned(&self, a: EntityId, b: EntityId) -> bool {
        let n = self.view.len();
        a >= n || b >= n || !self.components.equiv(a, b)
    }

    /// Returns `true` if any neighbor advertised by `update` lies in a different partition than
    /// `id`. Call this before installing the update.
    pub fn heals_partition(&self, id: EntityId, update: &LinkStateUpdate) -> bool {
        update
            .neighbors
            .iter()
            .any(|n| self.are_partitioned(id, *n))
    }

    /// Lowest controller in the partition of `src`.
    pub fn lowest_controller(&self, src: EntityId) -> Option<EntityId> {
        self.census
            .controller_ids()
            .find(|c| !self.are_partitioned(src, *c))
    }

    /// All switches in the partition of `src`, in ascending order.
    pub fn switches_in_partition(&self, src: EntityId) -> Vec<EntityId> {
        self.census
            .switch_ids()
            .filter(|s| !self.are_partitioned(src, *s))
            .collect()
    }

    /// Compute the next hop of `src` towards every host, using breadth-first search over the
    /// advertised (directed) adjacencies. Neighbors are explored in ascending order.
    pub fn compute_routing_table(&self, src: EntityId) -> Rc<[NextHop]> {
        let n = self.view.len();
        let mut pred: Vec<Option<EntityId>> = vec![None; n];
        let mut visited = vec![false; n];
        let mut queue = VecDeque::new();
        if src < n {
            visited[src] = true;
            queue.push_back(src);
        }
        while let Some(cur) = queue.pop_front() {
            for next in self.view.advertised(cur) {
                if !visited[next] {
                    visited[next] = true;
                    pred[next] = Some(cur);
                    queue.push_back(next);
                }
            }
        }

        self.census
            .host_ids()
            .map(|dst| next_hop(src, dst, &pred))
            .collect()
    }
}

/// Walk the predecessors from `dst` back to a direct neighbor of `src`.
fn next_hop(src: EntityId, dst: EntityId, pred: &[Option<EntityId>]) -> NextHop {
    let mut cur = dst;
    loop {
        match pred.get(cur).copied().flatten() {
            None => return NextHop::Drop,
            Some(p) if p == src => return NextHop::Via(cur),
            Some(p) => cur = p,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lsu(src: EntityId, sn: SequenceNum, neighbors: &[EntityId]) -> LinkStateUpdate {
        LinkStateUpdate {
            src,
            sn,
            neighbors: neighbors.into(),
            expiration: 10.0,
            resync: false,
        }
    }

    #[test]
    fn staleness() {
        let mut ls = LinkState::new(4);
        assert!(!ls.is_stale_update(&lsu(0, 0, &[1])));
        ls.update(&lsu(0, 3, &[1]));
        for sn in 0..=3 {
            assert!(ls.is_stale_update(&lsu(0, sn, &[1])));
        }
        assert!(!ls.is_stale_update(&lsu(0, 4, &[1])));
        assert!(ls.has_newer(&lsu(0, 2, &[1])));
        assert!(!ls.has_newer(&lsu(0, 3, &[1])));
        // other sources are independent
        assert!(!ls.is_stale_update(&lsu(1, 0, &[0])));
        // unknown sources are never accepted
        assert!(ls.is_stale_update(&lsu(9, 0, &[0])));
    }

    #[test]
    fn idempotent_update() {
        let mut ls = LinkState::new(4);
        assert!(ls.update(&lsu(0, 0, &[1, 2])));
        assert!(!ls.is_dirty());
        assert!(!ls.update(&lsu(0, 1, &[2, 1])));
        assert!(!ls.is_dirty());
        assert_eq!(ls.last_seq_num(0), Some(1));
        assert!(ls.update(&lsu(0, 2, &[1, 2, 3])));
        assert!(!ls.is_dirty());
        assert!(ls.update(&lsu(0, 3, &[3])));
        assert!(ls.is_dirty());
        assert_eq!(ls.advertised(0), vec![3]);
    }

    #[test]
    fn refresh_expires_lazily() {
        let mut ls = LinkState::new(3);
        ls.update(&lsu(0, 0, &[1]));
        ls.refresh(10.0);
        assert_eq!(ls.last_seq_num(0), Some(0));
        ls.refresh(10.5);
        assert_eq!(ls.last_seq_num(0), None);
        assert_eq!(ls.advertised(0), Vec::<EntityId>::new());
        assert!(ls.is_dirty());
        assert!(!ls.is_stale_update(&lsu(0, 0, &[1])));
        assert_eq!(ls.current_link_state(0), None);
    }

    #[test]
    fn merge_newer_sources() {
        let mut a = LinkState::new(3);
        let mut b = LinkState::new(3);
        a.update(&lsu(0, 5, &[1]));
        a.update(&lsu(1, 1, &[0, 2]));
        b.update(&lsu(0, 7, &[2]));
        let changed = b.merge(&a.snapshot());
        assert_eq!(changed, vec![1]);
        assert_eq!(b.advertised(0), vec![2]);
        assert_eq!(b.advertised(1), vec![0, 2]);
        assert_eq!(b.last_seq_num(1), Some(1));
        assert_eq!(
            b.current_link_state(1),
            Some(LinkStateUpdate {
                src: 1,
                sn: 1,
                neighbors: vec![0, 2].into(),
                expiration: 10.0,
                resync: false,
            })
        );
    }

    #[test]
    fn partitions() {
        // two stars: 0 - {1, 2} and 3 - {4, 5}
        let census = Census::new(6, 0, 0);
        let mut lsc = LinkStateControl::new(census);
        lsc.update(&lsu(0, 0, &[1, 2]));
        lsc.update(&lsu(3, 0, &[4, 5]));
        lsc.compute_partitions();
        assert!(!lsc.are_partitioned(1, 2));
        assert!(!lsc.are_partitioned(4, 5));
        assert!(lsc.are_partitioned(1, 4));
        assert!(lsc.are_partitioned(0, 3));

        let bridge = lsu(2, 0, &[0, 5]);
        assert!(lsc.heals_partition(0, &bridge));
        lsc.update(&bridge);
        lsc.compute_partitions();
        assert!(!lsc.are_partitioned(1, 4));
        assert!(!lsc.heals_partition(0, &bridge));

        // removing the bridge again splits the stars
        lsc.update(&lsu(2, 1, &[0]));
        lsc.compute_partitions();
        assert!(lsc.are_partitioned(1, 4));
        assert!(!lsc.view().is_dirty());
    }

    #[test]
    fn lowest_controller_per_partition() {
        // switches 0, 1, controllers 2, 3, 4
        let census = Census::new(2, 3, 0);
        let mut lsc = LinkStateControl::new(census);
        lsc.update(&lsu(0, 0, &[3, 4]));
        lsc.update(&lsu(1, 0, &[2]));
        assert_eq!(lsc.lowest_controller(0), Some(3));
        assert_eq!(lsc.lowest_controller(4), Some(3));
        assert_eq!(lsc.lowest_controller(1), Some(2));
        assert_eq!(lsc.switches_in_partition(3), vec![0]);
        assert_eq!(lsc.switches_in_partition(2), vec![1]);
    }

    #[test]
    fn routing_table_on_a_line() {
        // switches 0 - 1 - 2, hosts 3, 4, 5 attached to them, host 6 is not connected
        let census = Census::new(3, 0, 4);
        let mut lsc = LinkStateControl::new(census);
        lsc.update(&lsu(0, 0, &[1, 3]));
        lsc.update(&lsu(1, 0, &[0, 2, 4]));
        lsc.update(&lsu(2, 0, &[1, 5]));
        let table = lsc.compute_routing_table(0);
        assert_eq!(
            &*table,
            &[
                NextHop::Via(3),
                NextHop::Via(1),
                NextHop::Via(1),
                NextHop::Drop
            ]
        );
        let table = lsc.compute_routing_table(2);
        assert_eq!(table[0], NextHop::Via(1));
        assert_eq!(table[2], NextHop::Via(5));
    }
}
