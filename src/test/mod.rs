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

//! Test module

use crate::config::SimConfig;
use crate::event::{Affected, Event, EventKind, LinkStateUpdate};
use crate::topology::Topology;
use crate::types::{Census, EntityId, Port, SequenceNum, Time};

mod test_controller;
mod test_heartbeat;

/// Build a topology from a list of links.
fn topology(census: Census, links: &[(EntityId, EntityId)]) -> Topology {
    let mut t = Topology::new(census);
    for (a, b) in links {
        t.add_link(*a, *b).unwrap();
    }
    t
}

/// Default parameters, without any periodic events.
fn quiet() -> SimConfig {
    SimConfig::default().without_periodic_events()
}

/// Advertisement of `src` as it arrives at `at` through `in_port`.
fn lsu_event(
    time: Time,
    at: EntityId,
    in_port: Port,
    src: EntityId,
    sn: SequenceNum,
    neighbors: &[EntityId],
) -> Event {
    Event {
        time,
        affected: Affected::One(at),
        in_port: Some(in_port),
        kind: EventKind::LinkStateUpdate(LinkStateUpdate {
            src,
            sn,
            neighbors: neighbors.into(),
            expiration: time + 10.0,
            resync: false,
        }),
    }
}
