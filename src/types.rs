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

//! Module containing all type definitions

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::EventType;

pub(crate) type IndexType = u32;

/// Entity identification. Ids are dense: switches come first, then controllers, and hosts last.
pub type EntityId = usize;
/// Local port number of an entity.
pub type Port = usize;
/// Sequence number of advertisements, heartbeats, requests and routing updates.
pub type SequenceNum = u64;
/// Simulated time in seconds.
pub type Time = f64;

/// Time at which every simulation starts.
pub const START_TIME: Time = 0.0;

/// Maximum number of neighbors carried in a single link-state advertisement.
pub const MAX_NEIGHBORS: usize = 13;

/// Role of an entity in the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Forwarding element, takes part in link-state flooding.
    Switch,
    /// Computes routing tables for all switches in its partition.
    Controller,
    /// End host, only takes part in heartbeats.
    Host,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Switch => write!(f, "Switch"),
            EntityKind::Controller => write!(f, "Controller"),
            EntityKind::Host => write!(f, "Host"),
        }
    }
}

/// Number of entities per role. Since ids are dense, the census is enough to classify any id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Census {
    /// Number of switches, with ids `0..switches`.
    pub switches: usize,
    /// Number of controllers, with ids directly following the switches.
    pub controllers: usize,
    /// Number of hosts, with ids directly following the controllers.
    pub hosts: usize,
}

impl Census {
    /// Create a new census.
    pub fn new(switches: usize, controllers: usize, hosts: usize) -> Self {
        Self {
            switches,
            controllers,
            hosts,
        }
    }

    /// Total number of entities.
    pub fn total(&self) -> usize {
        self.switches + self.controllers + self.hosts
    }

    /// Classify an id. Returns `None` if the id is out of range.
    pub fn kind_of(&self, id: EntityId) -> Option<EntityKind> {
        if id < self.switches {
            Some(EntityKind::Switch)
        } else if id < self.switches + self.controllers {
            Some(EntityKind::Controller)
        } else if id < self.total() {
            Some(EntityKind::Host)
        } else {
            None
        }
    }

    /// Returns `true` if `id` is a switch.
    pub fn is_switch(&self, id: EntityId) -> bool {
        self.kind_of(id) == Some(EntityKind::Switch)
    }

    /// Returns `true` if `id` is a controller.
    pub fn is_controller(&self, id: EntityId) -> bool {
        self.kind_of(id) == Some(EntityKind::Controller)
    }

    /// Returns `true` if `id` is a host.
    pub fn is_host(&self, id: EntityId) -> bool {
        self.kind_of(id) == Some(EntityKind::Host)
    }

    /// Index of a host into a routing table.
    pub fn host_index(&self, id: EntityId) -> Option<usize> {
        self.is_host(id).then(|| id - self.switches - self.controllers)
    }

    /// Id of the host stored at `index` of a routing table.
    pub fn host_id(&self, index: usize) -> EntityId {
        self.switches + self.controllers + index
    }

    /// All switch ids.
    pub fn switch_ids(&self) -> std::ops::Range<EntityId> {
        0..self.switches
    }

    /// All controller ids.
    pub fn controller_ids(&self) -> std::ops::Range<EntityId> {
        self.switches..self.switches + self.controllers
    }

    /// All host ids.
    pub fn host_ids(&self) -> std::ops::Range<EntityId> {
        self.switches + self.controllers..self.total()
    }
}

/// Entry of a routing table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NextHop {
    /// Forward to this neighbor.
    Via(EntityId),
    /// Destination is unreachable.
    Drop,
}

impl NextHop {
    /// Return the neighbor, or `None` if the packet is dropped.
    pub fn neighbor(&self) -> Option<EntityId> {
        match self {
            NextHop::Via(n) => Some(*n),
            NextHop::Drop => None,
        }
    }
}

impl std::fmt::Display for NextHop {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NextHop::Via(n) => write!(f, "{n}"),
            NextHop::Drop => write!(f, "drop"),
        }
    }
}

/// Fatal violations of the simulation's internal consistency. None of them is recovered from;
/// they abort the simulation loop.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SimError {
    /// Entity is not present in the topology
    #[error("Entity was not found in the topology: {0}")]
    EntityNotFound(EntityId),
    /// Two entities are assumed to be linked, but `from` has no port towards `to`.
    #[error("Entity {from} has no port towards {to}")]
    PortNotFound {
        /// Entity whose port table was searched
        from: EntityId,
        /// Entity that was searched for
        to: EntityId,
    },
    /// Port number is outside of the port table.
    #[error("Entity {entity} has no port {port}")]
    InvalidPort {
        /// Entity whose port table was accessed
        entity: EntityId,
        /// The missing port
        port: Port,
    },
    /// The clock would move backwards.
    #[error("Simulation clock moved backwards: from {last} to {current}")]
    NonMonotonicClock {
        /// Time of the last processed event
        last: Time,
        /// Time of the event that was popped
        current: Time,
    },
    /// An event was enqueued with a time that cannot be ordered.
    #[error("Cannot schedule an event at time {0}")]
    InvalidTime(Time),
    /// Popped from an empty queue.
    #[error("Cannot pop from an empty event queue")]
    EmptyQueue,
    /// The combination of sender, inbound event and outbound event is not supported.
    #[error("Unsupported transition: {sender} handling {inbound} cannot send {outbound}")]
    UnsupportedTransition {
        /// Role of the sending entity
        sender: EntityKind,
        /// Event that is being handled
        inbound: EventType,
        /// Event that should be sent
        outbound: EventType,
    },
    /// An entity received an event that it must never receive.
    #[error("{kind} {entity} cannot handle {event} at time {time}")]
    UnexpectedEvent {
        /// Receiving entity
        entity: EntityId,
        /// Role of the receiving entity
        kind: EntityKind,
        /// The offending event
        event: EventType,
        /// Time at which the event was delivered
        time: Time,
    },
    /// An event that must be answered on its inbound port carries none.
    #[error("{event} delivered to {entity} has no inbound port")]
    NoInboundPort {
        /// Receiving entity
        entity: EntityId,
        /// The offending event
        event: EventType,
    },
    /// A host is connected to zero or more than one switch.
    #[error("Host {host} must be connected to exactly one switch, found {switch_ports}")]
    NotSingleHomed {
        /// The host
        host: EntityId,
        /// Number of ports towards switches
        switch_ports: usize,
    },
}

/// Errors while reading the topology or the event description.
#[derive(Error, Debug)]
pub enum ReaderError {
    /// Cannot read the file
    #[error("IO Error: {0}")]
    Io(#[from] std::io::Error),
    /// Input is not valid json, or has the wrong shape.
    #[error("Json Error: {0}")]
    Json(#[from] serde_json::Error),
    /// The same id is declared twice.
    #[error("Entity {0} is declared twice")]
    DuplicateId(EntityId),
    /// Link or event refers to an id that is not declared.
    #[error("Unknown entity: {0}")]
    UnknownId(EntityId),
    /// Ids do not form the range `0..n` ordered by role.
    #[error("Entity {id} ({kind}) breaks the id ordering: switches, then controllers, then hosts")]
    IdOrdering {
        /// Offending id
        id: EntityId,
        /// Its declared role
        kind: EntityKind,
    },
    /// An entity is linked to itself.
    #[error("Entity {0} is linked to itself")]
    SelfLoop(EntityId),
    /// A link event refers to two entities that are not adjacent.
    #[error("There is no link between {0} and {1}")]
    NoSuchLink(EntityId, EntityId),
    /// Event time is negative or not a number.
    #[error("Invalid event time: {0}")]
    InvalidTime(Time),
    /// The declared role counts differ from the topology.
    #[error("Expected {expected} {kind}s, but the topology contains {found}")]
    CountMismatch {
        /// Role that was counted
        kind: EntityKind,
        /// Number requested on the command line
        expected: usize,
        /// Number found in the topology
        found: usize,
    },
    /// Error while setting up the scheduler
    #[error("Simulation Error: {0}")]
    Sim(#[from] SimError),
}
