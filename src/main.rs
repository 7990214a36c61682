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

use std::path::PathBuf;

use clap::Parser;
use log::*;
use serde::Serialize;

use ctrlsim::prelude::*;
use ctrlsim::reader::{read_events, read_topology};
use ctrlsim::stats::Reachability;

/// Simulate the control plane of a network.
#[derive(Debug, Parser)]
struct Cli {
    /// Topology description (json).
    #[clap(long = "topology", short = 't')]
    topology: PathBuf,
    /// Exogenous events (json).
    #[clap(long = "events", short = 'e')]
    events: Option<PathBuf>,
    /// Simulation parameters (json). Command line options take precedence.
    #[clap(long = "config", short = 'c')]
    config: Option<PathBuf>,
    /// Emit a heartbeat every heartbeat-period seconds. Zero disables heartbeats.
    #[clap(long)]
    heartbeat_period: Option<Time>,
    /// Emit a link-state advertisement every ls-update-period seconds.
    #[clap(long)]
    ls_update_period: Option<Time>,
    /// Simulation horizon, in seconds.
    #[clap(long)]
    end_time: Option<Time>,
    /// Capacity of the token bucket on every link, in bytes.
    #[clap(long, requires = "fill_rate")]
    bucket_capacity: Option<f64>,
    /// Fill rate of the token bucket on every link, in bytes per second.
    #[clap(long, requires = "bucket_capacity")]
    fill_rate: Option<f64>,
    /// Write the statistics to `<out-prefix>stats.json`.
    #[clap(long, short = 'o')]
    out_prefix: Option<String>,
    /// Expected number of switches.
    #[clap(long)]
    switch_count: Option<usize>,
    /// Expected number of controllers.
    #[clap(long)]
    controller_count: Option<usize>,
    /// Expected number of hosts.
    #[clap(long)]
    host_count: Option<usize>,
}

impl Cli {
    fn sim_config(&self) -> Result<SimConfig, Box<dyn std::error::Error>> {
        let mut config: SimConfig = match &self.config {
            Some(path) => serde_json::from_str(&std::fs::read_to_string(path)?)?,
            None => SimConfig::default(),
        };
        if let Some(period) = self.heartbeat_period {
            config.heartbeat_period = period;
        }
        if let Some(period) = self.ls_update_period {
            config.ls_update_period = period;
        }
        if let Some(end_time) = self.end_time {
            config.end_time = end_time;
        }
        if let (Some(capacity), Some(fill_rate)) = (self.bucket_capacity, self.fill_rate) {
            config.bandwidth = Some(BandwidthConfig {
                capacity,
                fill_rate,
            });
        }
        Ok(config)
    }

    fn check_counts(&self, census: &Census) -> Result<(), ReaderError> {
        for (kind, expected, found) in [
            (EntityKind::Switch, self.switch_count, census.switches),
            (EntityKind::Controller, self.controller_count, census.controllers),
            (EntityKind::Host, self.host_count, census.hosts),
        ] {
            match expected {
                Some(expected) if expected != found => {
                    return Err(ReaderError::CountMismatch {
                        kind,
                        expected,
                        found,
                    })
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct Summary<'a> {
    config: &'a SimConfig,
    census: &'a Census,
    reachability: Reachability,
    stats: &'a Recorder,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init_timed();

    let args = Cli::parse();
    let config = args.sim_config()?;

    let topology = read_topology(&args.topology)?;
    args.check_counts(&topology.census())?;

    let mut sched = Scheduler::new(&topology, config, Recorder::new());
    if let Some(events) = &args.events {
        read_events(events, &mut sched)?;
    }
    sched.schedule_periodic_events()?;
    sched.start_simulation()?;

    let reach = reachability(sched.entities(), sched.census());
    let stats = sched.stats();
    info!(
        "{} events sent ({} advertisements accepted, {} routing tables installed)",
        stats.total_sent(),
        stats.total_accepted(),
        stats.routes_installed
    );
    info!(
        "{} of {} host pairs are reachable",
        reach.reachable, reach.pairs
    );

    if let Some(prefix) = &args.out_prefix {
        let summary = Summary {
            config: sched.config(),
            census: sched.census(),
            reachability: reach,
            stats,
        };
        let path = format!("{prefix}stats.json");
        std::fs::write(&path, serde_json::to_string_pretty(&summary)?)?;
        info!("Statistics written to {}", path);
    }

    Ok(())
}
