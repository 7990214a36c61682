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

use pretty_assertions::assert_eq;

use super::topology;
use crate::config::SimConfig;
use crate::event::{Event, EventKind, EventType};
use crate::scheduler::Scheduler;
use crate::stats::Recorder;
use crate::types::Census;

fn heartbeats_only(end_time: f64) -> SimConfig {
    let mut config = SimConfig::default().with_end_time(end_time);
    config.ls_update_period = 0.0;
    config
}

#[test_log::test]
fn heartbeats_are_flooded_once() {
    // switch 0 - switch 1 - host 2
    let t = topology(Census::new(2, 0, 1), &[(0, 1), (1, 2)]);
    let mut s = Scheduler::new(&t, heartbeats_only(4.0), Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.start_simulation().unwrap();

    // per round: four originated copies, and switch 1 relays the heartbeats of 0 and 2
    assert_eq!(s.stats().sent[&EventType::Heartbeat], 2 * 6);
    assert_eq!(s.stats().total_sent(), 2 * 6);

    for id in 0..3 {
        let history = s.entity(id).unwrap().heartbeats();
        for src in (0..3).filter(|src| *src != id) {
            assert!(history.has_been_seen(src, 0));
            assert!(history.has_been_seen(src, 1));
            assert!(!history.has_been_seen(src, 2));
        }
        assert!(!history.has_seen_source(id));
    }
}

#[test_log::test]
fn down_entities_are_silent() {
    let t = topology(Census::new(2, 0, 1), &[(0, 1), (1, 2)]);
    let mut s = Scheduler::new(&t, heartbeats_only(4.0), Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.add_event(Event::new(1.0, 1, EventKind::Down)).unwrap();
    s.start_simulation().unwrap();

    // the second round is originated by switch 0 and host 2, but never relayed
    assert_eq!(s.stats().sent[&EventType::Heartbeat], 6 + 2);
    let middle = s.entity(1).unwrap().heartbeats();
    assert!(middle.has_been_seen(0, 0));
    assert!(!middle.has_been_seen(0, 1));
    let left = s.entity(0).unwrap().heartbeats();
    assert!(left.has_been_seen(2, 0));
    assert!(!left.has_been_seen(2, 1));
}
