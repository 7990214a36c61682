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

//! # Reader
//!
//! Parse the topology and the exogenous events from json.
//!
//! The topology lists every entity with its role, and the links as an adjacency map. Links are
//! undirected; listing a link from both sides creates it only once.
//!
//! ```json
//! {
//!   "entities": [{"id": 0, "type": "switch"}, {"id": 1, "type": "controller"}, {"id": 2, "type": "host"}],
//!   "links": {"0": [1, 2]}
//! }
//! ```
//!
//! Events are a list of timed transitions:
//!
//! ```json
//! [
//!   {"time": 5.0, "type": "link_down", "src": 0, "dst": 1},
//!   {"time": 8.0, "type": "down", "id": 2}
//! ]
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use itertools::Itertools;
use log::*;
use serde::Deserialize;

use crate::event::{Event, EventKind};
use crate::scheduler::Scheduler;
use crate::stats::Statistics;
use crate::topology::Topology;
use crate::types::{Census, EntityId, EntityKind, ReaderError, Time};

#[derive(Debug, Deserialize)]
struct TopologyFile {
    entities: Vec<EntityEntry>,
    #[serde(default)]
    links: BTreeMap<EntityId, Vec<EntityId>>,
}

#[derive(Debug, Deserialize)]
struct EntityEntry {
    id: EntityId,
    #[serde(rename = "type")]
    kind: EntityKind,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum EventEntry {
    Up { time: Time, id: EntityId },
    Down { time: Time, id: EntityId },
    LinkUp { time: Time, src: EntityId, dst: EntityId },
    LinkDown { time: Time, src: EntityId, dst: EntityId },
}

/// Parse a topology from a json string.
pub fn parse_topology(input: &str) -> Result<Topology, ReaderError> {
    let file: TopologyFile = serde_json::from_str(input)?;

    // ids must be unique, and form the range 0..n ordered by role
    let mut entities: Vec<&EntityEntry> = Vec::with_capacity(file.entities.len());
    for entry in file.entities.iter().sorted_by_key(|e| e.id) {
        if entities.last().map(|l| l.id) == Some(entry.id) {
            return Err(ReaderError::DuplicateId(entry.id));
        }
        if entry.id != entities.len() {
            return Err(ReaderError::UnknownId(entities.len()));
        }
        if let Some(prev) = entities.last() {
            if prev.kind > entry.kind {
                return Err(ReaderError::IdOrdering {
                    id: entry.id,
                    kind: entry.kind,
                });
            }
        }
        entities.push(entry);
    }
    let count = |kind: EntityKind| entities.iter().filter(|e| e.kind == kind).count();
    let census = Census::new(
        count(EntityKind::Switch),
        count(EntityKind::Controller),
        count(EntityKind::Host),
    );

    let mut topology = Topology::new(census);
    for (src, neighbors) in file.links.iter() {
        for dst in neighbors {
            topology.add_link(*src, *dst)?;
        }
    }
    info!(
        "Read topology with {} switches, {} controllers, {} hosts and {} links",
        census.switches,
        census.controllers,
        census.hosts,
        topology.link_count()
    );
    Ok(topology)
}

/// Read a topology from a json file.
pub fn read_topology(path: impl AsRef<Path>) -> Result<Topology, ReaderError> {
    parse_topology(&std::fs::read_to_string(path)?)
}

/// Parse the events from a json string and add them to the scheduler. Returns the number of
/// events added.
pub fn parse_events<S: Statistics>(
    input: &str,
    scheduler: &mut Scheduler<S>,
) -> Result<usize, ReaderError> {
    let entries: Vec<EventEntry> = serde_json::from_str(input)?;
    let n = scheduler.entities().len();
    let check_id = |id: EntityId| {
        if id < n {
            Ok(id)
        } else {
            Err(ReaderError::UnknownId(id))
        }
    };
    let check_time = |time: Time| {
        if time >= 0.0 {
            Ok(time)
        } else {
            Err(ReaderError::InvalidTime(time))
        }
    };

    let mut events = Vec::with_capacity(entries.len());
    for entry in entries {
        let event = match entry {
            EventEntry::Up { time, id } => {
                Event::new(check_time(time)?, check_id(id)?, EventKind::Up)
            }
            EventEntry::Down { time, id } => {
                Event::new(check_time(time)?, check_id(id)?, EventKind::Down)
            }
            EventEntry::LinkUp { time, src, dst } | EventEntry::LinkDown { time, src, dst } => {
                let up = matches!(entry, EventEntry::LinkUp { .. });
                let (src, dst) = (check_id(src)?, check_id(dst)?);
                if scheduler.entity(src)?.links().port_to(dst).is_none() {
                    return Err(ReaderError::NoSuchLink(src, dst));
                }
                Event::link(check_time(time)?, src, dst, up)
            }
        };
        events.push(event);
    }

    // nothing is queued unless every entry is valid
    let count = events.len();
    for event in events {
        scheduler.add_event(event)?;
    }
    info!("Read {} events", count);
    Ok(count)
}

/// Read the events from a json file and add them to the scheduler.
pub fn read_events<S: Statistics>(
    path: impl AsRef<Path>,
    scheduler: &mut Scheduler<S>,
) -> Result<usize, ReaderError> {
    parse_events(&std::fs::read_to_string(path)?, scheduler)
}
