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

//! Module tracking the heartbeats an entity has seen.

use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use crate::types::{EntityId, SequenceNum, Time};

/// Heartbeats seen by a single entity, and the derived "recently seen" snapshot.
#[derive(Debug, Clone, Default)]
pub struct HeartbeatHistory {
    /// Highest sequence number handled per source
    seen: HashMap<EntityId, SequenceNum>,
    last_seen: HashMap<EntityId, VecDeque<Time>>,
    next_sn: SequenceNum,
    cache: Option<Rc<[bool]>>,
}

impl HeartbeatHistory {
    /// Create an empty history.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the heartbeat `sn` of `src`, or a newer one, was already handled.
    pub fn has_been_seen(&self, src: EntityId, sn: SequenceNum) -> bool {
        matches!(self.seen.get(&src), Some(last) if sn <= *last)
    }

    /// Returns `true` if any heartbeat of `src` was handled.
    pub fn has_seen_source(&self, src: EntityId) -> bool {
        self.last_seen.contains_key(&src)
    }

    /// Record the heartbeat `sn` of `src`, received at `now`. Only the last `min_times` reception
    /// times are kept per source.
    pub fn mark_as_seen(&mut self, src: EntityId, sn: SequenceNum, now: Time, min_times: usize) {
        let last = self.seen.entry(src).or_insert(sn);
        *last = (*last).max(sn);
        let times = self.last_seen.entry(src).or_default();
        times.push_back(now);
        while times.len() > min_times.max(1) {
            times.pop_front();
        }
        self.cache = None;
    }

    /// Sequence number of the next heartbeat originated by the owner.
    pub fn next_seq_num(&mut self) -> SequenceNum {
        let sn = self.next_sn;
        self.next_sn += 1;
        sn
    }

    /// Entities whose every remembered heartbeat reception lies within `max_recent` of `now`.
    /// The snapshot is only rebuilt after a new heartbeat was recorded.
    pub fn recently_seen(&mut self, now: Time, num_entities: usize, max_recent: Time) -> Rc<[bool]> {
        if let Some(cache) = &self.cache {
            return cache.clone();
        }
        let snapshot: Rc<[bool]> = (0..num_entities)
            .map(|id| match self.last_seen.get(&id) {
                Some(times) => times.iter().all(|t| now - t < max_recent),
                None => false,
            })
            .collect();
        self.cache = Some(snapshot.clone());
        snapshot
    }
}
