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

#![deny(missing_docs, missing_debug_implementations)]

//! # CtrlSim
//!
//! This is a library for simulating the control plane of a network, in which switches flood
//! link-state advertisements, and controllers compute routing tables for the switches in their
//! partition.
//!
//! ## Main Concepts
//!
//! The [`scheduler::Scheduler`] is the main datastructure to operate on. It owns every
//! [`entity::Entity`] (switches, controllers and hosts), the simulation clock, and a
//! [`event::FrontierQueue`] that orders events by delivery time. Within one delivery time, events
//! are ordered by the id of the affected entity, and the events of one entity are delivered in
//! reverse order of their enqueueing. This makes every run deterministic.
//!
//! Entities react to events by returning [`entity::Action`]s. The scheduler forwards the
//! resulting events to neighbors, adding the per-hop delay from [`config::SimConfig`], and drops
//! everything that would arrive after the simulation horizon.
//!
//! Switches keep a [`link_state::LinkState`] database built from flooded advertisements.
//! Controllers keep a [`link_state::LinkStateControl`], which additionally detects partitions and
//! computes routing tables with a breadth-first search.
//!
//! ## Example usage
//!
//! ```
//! use ctrlsim::prelude::*;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // two switches, one controller and two hosts
//!     let mut t = Topology::new(Census::new(2, 1, 2));
//!     t.add_link(0, 1)?;
//!     t.add_link(0, 2)?;
//!     t.add_link(0, 3)?;
//!     t.add_link(1, 4)?;
//!
//!     let config = SimConfig::default().with_end_time(10.0);
//!     let mut s = Scheduler::new(&t, config, Recorder::new());
//!     s.schedule_periodic_events()?;
//!     s.start_simulation()?;
//!
//!     let reach = reachability(s.entities(), s.census());
//!     assert_eq!(reach.reachable, reach.pairs);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod entity;
pub mod event;
pub mod heartbeat;
pub mod link_state;
pub mod links;
pub mod prelude;
pub mod reader;
pub mod scheduler;
pub mod stats;
pub mod topology;
pub mod types;

#[cfg(test)]
mod test;
