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

use lazy_static::lazy_static;
use pretty_assertions::assert_eq;

use super::topology;
use crate::config::SimConfig;
use crate::entity::Role;
use crate::event::{Event, EventType};
use crate::scheduler::Scheduler;
use crate::stats::{reachability, Reachability, Recorder};
use crate::topology::Topology;
use crate::types::Census;
use crate::types::NextHop::{self, Via};

lazy_static! {
    /// Three switches on a line, a controller on the middle switch, and one host per switch.
    static ref LINE: Topology = topology(
        Census::new(3, 1, 3),
        &[(0, 1), (1, 2), (1, 3), (0, 4), (1, 5), (2, 6)]
    );
}

fn no_heartbeats(end_time: f64) -> SimConfig {
    let mut config = SimConfig::default().with_end_time(end_time);
    config.heartbeat_period = 0.0;
    config
}

#[test_log::test]
fn routes_on_a_line() {
    let mut s = Scheduler::new(&LINE, no_heartbeats(20.0), Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.start_simulation().unwrap();

    assert_eq!(
        reachability(s.entities(), s.census()),
        Reachability {
            pairs: 6,
            reachable: 6
        }
    );
    // one table per switch, computed once the flooding had time to converge
    assert_eq!(s.stats().routes_installed, 3);
    assert_eq!(
        s.entity(0).unwrap().routing_table().unwrap(),
        &[Via(4), Via(1), Via(1)]
    );
    assert_eq!(
        s.entity(1).unwrap().routing_table().unwrap(),
        &[Via(0), Via(5), Via(2)]
    );
    assert_eq!(
        s.entity(2).unwrap().routing_table().unwrap(),
        &[Via(1), Via(1), Via(6)]
    );

    match s.entity(3).unwrap().role() {
        Role::Controller(c) => {
            assert_eq!(c.switch_count(), 3);
            assert_eq!(c.link_state().view().advertised(1), vec![0, 2, 3, 5]);
        }
        _ => unreachable!(),
    }
}

#[test_log::test]
fn no_routes_before_convergence() {
    let mut s = Scheduler::new(&LINE, no_heartbeats(20.0), Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.simulate_until(2.0).unwrap();

    assert_eq!(s.stats().routes_installed, 0);
    assert_eq!(reachability(s.entities(), s.census()).reachable, 0);
}

#[test_log::test]
fn partition_and_heal() {
    let mut config = no_heartbeats(20.0);
    config.ls_lifetime = 4.0;
    let mut s = Scheduler::new(&LINE, config, Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.add_event(Event::link(5.0, 1, 2, false)).unwrap();
    s.add_event(Event::link(10.0, 1, 2, true)).unwrap();

    s.simulate_until(8.0).unwrap();
    // only hosts 4 and 5 can reach each other
    assert_eq!(
        reachability(s.entities(), s.census()),
        Reachability {
            pairs: 6,
            reachable: 2
        }
    );
    assert_eq!(
        s.entity(0).unwrap().routing_table().unwrap(),
        &[Via(4), Via(1), NextHop::Drop]
    );
    assert_eq!(s.stats().sent.get(&EventType::LinkStateRequest), None);

    s.start_simulation().unwrap();
    assert_eq!(
        reachability(s.entities(), s.census()),
        Reachability {
            pairs: 6,
            reachable: 6
        }
    );
    assert!(s.stats().sent[&EventType::LinkStateRequest] > 0);
    assert_eq!(s.stats().link_downs, 1);
    assert_eq!(s.stats().link_ups, 1);
}

#[test_log::test]
fn lowest_controller_computes_routes() {
    // controller 2 on switch 0, controller 3 on switch 1
    let t = topology(Census::new(2, 2, 0), &[(0, 1), (0, 2), (1, 3)]);
    let mut s = Scheduler::new(&t, no_heartbeats(10.0), Recorder::new());
    s.schedule_periodic_events().unwrap();
    s.start_simulation().unwrap();

    let stats = s.stats();
    assert_eq!(stats.routes_installed, 2);
    assert!(stats.sent[&EventType::ControllerView] > 0);
    assert!(s.entity(0).unwrap().routing_table().is_some());
    assert!(s.entity(1).unwrap().routing_table().is_some());

    // both controllers share the same view of the switches
    let view = |id| match s.entity(id).unwrap().role() {
        Role::Controller(c) => {
            let ls = c.link_state().view();
            (ls.advertised(0), ls.advertised(1))
        }
        _ => unreachable!(),
    };
    assert_eq!(view(2), (vec![1, 2], vec![0, 3]));
    assert_eq!(view(3), view(2));
}
