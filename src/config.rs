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

//! # Simulation parameters
//!
//! All constants that influence the timing of the protocols are collected in [`SimConfig`]. The
//! defaults model a data-center network: 10 micro-seconds of computation, 1 milli-second of
//! transmission and 10 milli-seconds of propagation delay per hop.

use serde::{Deserialize, Serialize};

use crate::types::Time;

/// Parameters of a simulation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimConfig {
    /// Time needed to process an event before the reaction is sent.
    pub computation_delay: Time,
    /// Time needed to put an event on the wire.
    pub transmission_delay: Time,
    /// Time an event spends on the wire.
    pub propagation_delay: Time,
    /// Settle time after a link transition before a switch re-advertises.
    pub hello_delay: Time,
    /// Period of heartbeats. A period of zero disables heartbeats.
    pub heartbeat_period: Time,
    /// Period of link-state advertisements. A period of zero disables periodic advertisements.
    pub ls_update_period: Time,
    /// Lifetime of a link-state advertisement.
    pub ls_lifetime: Time,
    /// Simulation horizon. Events computed to fire later are dropped.
    pub end_time: Time,
    /// Window in which a heartbeat source must have been heard to count as recently seen.
    pub max_recent: Time,
    /// Number of heartbeat receptions that are remembered per source.
    pub min_times: usize,
    /// Optional token-bucket limit on every link.
    pub bandwidth: Option<BandwidthConfig>,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            computation_delay: 0.000_01,
            transmission_delay: 0.001,
            propagation_delay: 0.01,
            hello_delay: 0.001,
            heartbeat_period: 3.0,
            ls_update_period: 3.0,
            ls_lifetime: 10.0,
            end_time: 60.0,
            max_recent: 3.0,
            min_times: 2,
            bandwidth: None,
        }
    }
}

impl SimConfig {
    /// Per-hop delay of every forwarded event.
    pub fn delay(&self) -> Time {
        self.computation_delay + self.transmission_delay + self.propagation_delay
    }

    /// Set all three delay components such that [`SimConfig::delay`] returns `delay`.
    pub fn with_delay(mut self, delay: Time) -> Self {
        self.computation_delay = 0.0;
        self.transmission_delay = 0.0;
        self.propagation_delay = delay;
        self
    }

    /// Set the simulation horizon.
    pub fn with_end_time(mut self, end_time: Time) -> Self {
        self.end_time = end_time;
        self
    }

    /// Disable all periodic events (heartbeats and link-state advertisements).
    pub fn without_periodic_events(mut self) -> Self {
        self.heartbeat_period = 0.0;
        self.ls_update_period = 0.0;
        self
    }
}

/// Parameters of the token bucket attached to each port.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BandwidthConfig {
    /// Maximum number of bytes in the bucket.
    pub capacity: f64,
    /// Bytes added to the bucket per second.
    pub fill_rate: f64,
}
