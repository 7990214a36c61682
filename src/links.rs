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

//! Module containing the port table of an entity.

use std::collections::HashMap;
use std::rc::Rc;

use log::*;

use crate::config::BandwidthConfig;
use crate::types::{EntityId, EntityKind, Port, SimError, Time, MAX_NEIGHBORS};

/// Token bucket limiting the bytes sent on a single port.
#[derive(Debug, Clone, PartialEq)]
pub struct BandwidthMeter {
    capacity: f64,
    fill_rate: f64,
    level: f64,
    last_update: Time,
}

impl BandwidthMeter {
    /// Create a full bucket.
    pub fn new(config: BandwidthConfig) -> Self {
        Self {
            capacity: config.capacity,
            fill_rate: config.fill_rate,
            level: config.capacity,
            last_update: 0.0,
        }
    }

    /// Refill the bucket with the tokens accumulated since the last update.
    pub fn refill(&mut self, now: Time) {
        if now > self.last_update {
            let passed = now - self.last_update;
            self.level = self.capacity.min(self.level + self.fill_rate * passed);
            self.last_update = now;
        }
    }

    /// Take `size` bytes from the bucket. Returns `false` (and takes nothing) if the bucket does
    /// not hold enough tokens.
    pub fn try_send(&mut self, now: Time, size: usize) -> bool {
        self.refill(now);
        let size = size as f64;
        if size <= self.level {
            self.level -= size;
            true
        } else {
            false
        }
    }

    /// Number of bytes currently available.
    pub fn level(&self) -> f64 {
        self.level
    }
}

/// A single port.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Whether the link is currently up.
    pub is_up: bool,
    /// The entity on the other end.
    pub neighbor: EntityId,
    /// Role of the entity on the other end.
    pub kind: EntityKind,
    meter: Option<BandwidthMeter>,
}

/// Port table of an entity. Port numbers are assigned in the order in which links are added and
/// never change afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Links {
    ports: Vec<Link>,
    port_to_neighbor: HashMap<EntityId, Port>,
}

impl Links {
    /// Create an empty port table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a new port towards `neighbor`, and return its port number. Links start up.
    pub fn add(
        &mut self,
        neighbor: EntityId,
        kind: EntityKind,
        bandwidth: Option<BandwidthConfig>,
    ) -> Port {
        let port = self.ports.len();
        self.ports.push(Link {
            is_up: true,
            neighbor,
            kind,
            meter: bandwidth.map(BandwidthMeter::new),
        });
        self.port_to_neighbor.insert(neighbor, port);
        port
    }

    /// Number of ports.
    pub fn port_count(&self) -> usize {
        self.ports.len()
    }

    /// Get the link at port `port`.
    pub fn get(&self, port: Port) -> Option<&Link> {
        self.ports.get(port)
    }

    /// Iterate over all ports together with their link.
    pub fn iter(&self) -> impl Iterator<Item = (Port, &Link)> {
        self.ports.iter().enumerate()
    }

    /// Returns `true` if the link at `port` exists and is up.
    pub fn is_link_up(&self, port: Port) -> bool {
        self.ports.get(port).map(|l| l.is_up).unwrap_or(false)
    }

    /// Neighbor at the other end of `port`.
    pub fn neighbor(&self, port: Port) -> Option<EntityId> {
        self.ports.get(port).map(|l| l.neighbor)
    }

    /// Port through which `neighbor` is reached.
    pub fn port_to(&self, neighbor: EntityId) -> Option<Port> {
        self.port_to_neighbor.get(&neighbor).copied()
    }

    /// Mark a link as up.
    pub fn set_link_up(&mut self, owner: EntityId, port: Port) -> Result<(), SimError> {
        self.set_link(owner, port, true)
    }

    /// Mark a link as down.
    pub fn set_link_down(&mut self, owner: EntityId, port: Port) -> Result<(), SimError> {
        self.set_link(owner, port, false)
    }

    fn set_link(&mut self, owner: EntityId, port: Port, is_up: bool) -> Result<(), SimError> {
        let link = self.ports.get_mut(port).ok_or(SimError::InvalidPort {
            entity: owner,
            port,
        })?;
        link.is_up = is_up;
        Ok(())
    }

    /// Neighbors reached over a link that is up, in port order. At most [`MAX_NEIGHBORS`]
    /// neighbors are returned.
    pub fn up_neighbors(&self) -> Rc<[EntityId]> {
        let mut up: Vec<EntityId> = self
            .ports
            .iter()
            .filter(|l| l.is_up)
            .map(|l| l.neighbor)
            .collect();
        if up.len() > MAX_NEIGHBORS {
            warn!(
                "{} neighbors are up, only the first {} are advertised",
                up.len(),
                MAX_NEIGHBORS
            );
            up.truncate(MAX_NEIGHBORS);
        }
        up.into()
    }

    /// Ports that lead to an entity which takes part in topology distribution (everything except
    /// hosts).
    pub fn control_ports(&self) -> impl Iterator<Item = Port> + '_ {
        self.iter()
            .filter(|(_, l)| l.kind != EntityKind::Host)
            .map(|(p, _)| p)
    }

    /// Ports that lead to a switch.
    pub fn switch_ports(&self) -> impl Iterator<Item = Port> + '_ {
        self.iter()
            .filter(|(_, l)| l.kind == EntityKind::Switch)
            .map(|(p, _)| p)
    }

    /// Charge `size` bytes against the meter of `port`. Ports without a meter always admit.
    pub fn try_send(&mut self, port: Port, now: Time, size: usize) -> bool {
        match self.ports.get_mut(port).and_then(|l| l.meter.as_mut()) {
            Some(meter) => meter.try_send(now, size),
            None => true,
        }
    }
}
