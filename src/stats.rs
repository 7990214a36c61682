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

//! # Statistics
//!
//! The scheduler notifies a [`Statistics`] implementation about every transition and every sent
//! event. The simulation never reads anything back, so the implementation is free to discard
//! ([`NoStatistics`]) or record ([`Recorder`]) the notifications.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::entity::Entity;
use crate::event::{Event, EventType};
use crate::types::{Census, EntityId, SequenceNum, Time};

/// Receiver of notifications from the scheduler.
pub trait Statistics {
    /// Entity `id` came up.
    fn entity_up(&mut self, time: Time, id: EntityId);

    /// Entity `id` went down.
    fn entity_down(&mut self, time: Time, id: EntityId);

    /// The link between `a` and `b` came up.
    fn link_up(&mut self, time: Time, a: EntityId, b: EntityId);

    /// The link between `a` and `b` went down.
    fn link_down(&mut self, time: Time, a: EntityId, b: EntityId);

    /// An event was enqueued for delivery. `time` is the time at which it was sent.
    fn record_send(&mut self, time: Time, event: &Event);

    /// `receiver` accepted the advertisement `sn` of `src`.
    fn accepted_update(
        &mut self,
        _time: Time,
        _receiver: EntityId,
        _src: EntityId,
        _sn: SequenceNum,
    ) {
    }

    /// `switch` installed the routing table `sn` computed by `controller`.
    fn routes_installed(
        &mut self,
        _time: Time,
        _switch: EntityId,
        _controller: EntityId,
        _sn: SequenceNum,
    ) {
    }
}

/// Statistics that discard everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoStatistics;

impl Statistics for NoStatistics {
    fn entity_up(&mut self, _: Time, _: EntityId) {}
    fn entity_down(&mut self, _: Time, _: EntityId) {}
    fn link_up(&mut self, _: Time, _: EntityId, _: EntityId) {}
    fn link_down(&mut self, _: Time, _: EntityId, _: EntityId) {}
    fn record_send(&mut self, _: Time, _: &Event) {}
}

/// Statistics that count every notification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Recorder {
    /// Number of `Up` events
    pub entity_ups: usize,
    /// Number of `Down` events
    pub entity_downs: usize,
    /// Number of `LinkUp` events
    pub link_ups: usize,
    /// Number of `LinkDown` events
    pub link_downs: usize,
    /// Number of sent events per type
    pub sent: BTreeMap<EventType, usize>,
    /// Number of sent bytes per type
    pub bytes: BTreeMap<EventType, usize>,
    /// Number of sent bytes per second of simulated time
    pub bandwidth: BTreeMap<u64, usize>,
    /// Number of installed routing tables
    pub routes_installed: usize,
    /// Number of accepted advertisements per (source, receiver)
    #[serde(skip)]
    accepted: BTreeMap<(EntityId, EntityId), usize>,
}

impl Recorder {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of advertisements of `src` accepted by `receiver`.
    pub fn accepted(&self, src: EntityId, receiver: EntityId) -> usize {
        self.accepted.get(&(src, receiver)).copied().unwrap_or(0)
    }

    /// Total number of accepted advertisements.
    pub fn total_accepted(&self) -> usize {
        self.accepted.values().sum()
    }

    /// Total number of sent events.
    pub fn total_sent(&self) -> usize {
        self.sent.values().sum()
    }
}

impl Statistics for Recorder {
    fn entity_up(&mut self, _: Time, _: EntityId) {
        self.entity_ups += 1;
    }

    fn entity_down(&mut self, _: Time, _: EntityId) {
        self.entity_downs += 1;
    }

    fn link_up(&mut self, _: Time, _: EntityId, _: EntityId) {
        self.link_ups += 1;
    }

    fn link_down(&mut self, _: Time, _: EntityId, _: EntityId) {
        self.link_downs += 1;
    }

    fn record_send(&mut self, time: Time, event: &Event) {
        let size = event.size();
        let ty = event.event_type();
        *self.sent.entry(ty).or_default() += 1;
        *self.bytes.entry(ty).or_default() += size;
        *self.bandwidth.entry(time.max(0.0).floor() as u64).or_default() += size;
    }

    fn accepted_update(&mut self, _: Time, receiver: EntityId, src: EntityId, _: SequenceNum) {
        *self.accepted.entry((src, receiver)).or_default() += 1;
    }

    fn routes_installed(&mut self, _: Time, _: EntityId, _: EntityId, _: SequenceNum) {
        self.routes_installed += 1;
    }
}

/// Host-to-host reachability over the installed routing tables.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reachability {
    /// Number of ordered pairs of distinct hosts
    pub pairs: usize,
    /// Number of pairs for which the routing tables lead from source to destination
    pub reachable: usize,
}

/// Walk the routing tables from every host to every other host. A walk fails on a down entity, a
/// down link, a missing or dropping routing table, or a loop.
pub fn reachability(entities: &[Entity], census: &Census) -> Reachability {
    let mut result = Reachability::default();
    for src in census.host_ids() {
        for dst in census.host_ids().filter(|d| *d != src) {
            result.pairs += 1;
            if reaches(entities, census, src, dst) {
                result.reachable += 1;
            }
        }
    }
    result
}

fn reaches(entities: &[Entity], census: &Census, src: EntityId, dst: EntityId) -> bool {
    let (Some(src_host), Some(dst_host), Some(index)) =
        (entities.get(src), entities.get(dst), census.host_index(dst))
    else {
        return false;
    };
    if !src_host.is_up() || !dst_host.is_up() {
        return false;
    }
    let Ok(mut cur) = src_host.edge_switch() else {
        return false;
    };
    if !link_is_up(src_host, cur) {
        return false;
    }
    for _ in 0..entities.len() {
        let Some(switch) = entities.get(cur).filter(|e| e.is_up()) else {
            return false;
        };
        let next = match switch.routing_table().and_then(|t| t.get(index)) {
            Some(hop) => match hop.neighbor() {
                Some(next) => next,
                None => return false,
            },
            None => return false,
        };
        if !link_is_up(switch, next) {
            return false;
        }
        if next == dst {
            return true;
        }
        if !census.is_switch(next) {
            return false;
        }
        cur = next;
    }
    false
}

fn link_is_up(entity: &Entity, neighbor: EntityId) -> bool {
    entity
        .links()
        .port_to(neighbor)
        .map(|p| entity.links().is_link_up(p))
        .unwrap_or(false)
}
