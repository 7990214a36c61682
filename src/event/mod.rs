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

//! Module containing the definitions for the events and the event queue.

use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::config::SimConfig;
use crate::link_state::LinkStateSnapshot;
use crate::types::{EntityId, EntityKind, NextHop, Port, SequenceNum, SimError, Time};

mod queue;
pub use queue::FrontierQueue;

/// Bytes of every event on the wire, independent of its payload.
const BASE_SIZE: usize = 20;
/// Additional bytes of a link-state advertisement.
const LSU_SIZE: usize = 50;

/// Entities affected by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Affected {
    /// A single entity, the usual case.
    One(EntityId),
    /// Both endpoints of a link.
    Pair(EntityId, EntityId),
}

impl Affected {
    /// Entity under which the event is ordered in the frontier queue.
    pub fn primary(&self) -> EntityId {
        match self {
            Affected::One(id) => *id,
            Affected::Pair(a, b) => *a.min(b),
        }
    }

    /// All affected entities, in ascending order.
    pub fn ids(&self) -> Vec<EntityId> {
        match self {
            Affected::One(id) => vec![*id],
            Affected::Pair(a, b) => vec![*a.min(b), *a.max(b)],
        }
    }

    /// The other endpoint of a link event, as seen from `id`.
    pub fn peer_of(&self, id: EntityId) -> Option<EntityId> {
        match self {
            Affected::Pair(a, b) if *a == id => Some(*b),
            Affected::Pair(a, b) if *b == id => Some(*a),
            _ => None,
        }
    }
}

/// Event scheduled by the simulation.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    /// Delivery time
    pub time: Time,
    /// Entities that handle the event
    pub affected: Affected,
    /// Port on which the event arrives, if it was forwarded by a neighbor.
    pub in_port: Option<Port>,
    /// Kind-specific payload
    pub kind: EventKind,
}

impl Event {
    /// Create a new event that did not arrive over a link.
    pub fn new(time: Time, affected: EntityId, kind: EventKind) -> Self {
        Self {
            time,
            affected: Affected::One(affected),
            in_port: None,
            kind,
        }
    }

    /// Create a link event affecting both endpoints `a` and `b`.
    pub fn link(time: Time, a: EntityId, b: EntityId, up: bool) -> Self {
        Self {
            time,
            affected: Affected::Pair(a, b),
            in_port: None,
            kind: if up {
                EventKind::LinkUp
            } else {
                EventKind::LinkDown
            },
        }
    }

    /// Type of this event.
    pub fn event_type(&self) -> EventType {
        self.kind.event_type()
    }

    /// Size of the event on the wire, in bytes.
    pub fn size(&self) -> usize {
        BASE_SIZE
            + match &self.kind {
                EventKind::LinkStateUpdate(_) => LSU_SIZE,
                EventKind::RoutingUpdate(ru) => 4 * ru.table.len(),
                EventKind::ControllerView(cv) => 8 * cv.snapshot.len(),
                EventKind::Heartbeat(h) => h.recently_seen.len().div_ceil(8),
                _ => 0,
            }
    }
}

/// Payload of an event.
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    /// Entity comes up.
    Up,
    /// Entity goes down.
    Down,
    /// The link between the two affected entities comes up.
    LinkUp,
    /// The link between the two affected entities goes down.
    LinkDown,
    /// A switch should advertise its links.
    InitiateLinkState,
    /// An entity should send a heartbeat.
    InitiateHeartbeat,
    /// Flooded heartbeat.
    Heartbeat(Heartbeat),
    /// Flooded link-state advertisement.
    LinkStateUpdate(LinkStateUpdate),
    /// Request to re-advertise, sent by a controller after a partition heals.
    LinkStateRequest(LinkStateRequest),
    /// Routing table computed by a controller for a single switch.
    RoutingUpdate(RoutingUpdate),
    /// Topology view replicated between controllers.
    ControllerView(ControllerView),
}

impl EventKind {
    /// Type of this payload.
    pub fn event_type(&self) -> EventType {
        match self {
            EventKind::Up => EventType::Up,
            EventKind::Down => EventType::Down,
            EventKind::LinkUp => EventType::LinkUp,
            EventKind::LinkDown => EventType::LinkDown,
            EventKind::InitiateLinkState => EventType::InitiateLinkState,
            EventKind::InitiateHeartbeat => EventType::InitiateHeartbeat,
            EventKind::Heartbeat(_) => EventType::Heartbeat,
            EventKind::LinkStateUpdate(_) => EventType::LinkStateUpdate,
            EventKind::LinkStateRequest(_) => EventType::LinkStateRequest,
            EventKind::RoutingUpdate(_) => EventType::RoutingUpdate,
            EventKind::ControllerView(_) => EventType::ControllerView,
        }
    }
}

/// Payload-free discriminant of [`EventKind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[allow(missing_docs)]
pub enum EventType {
    Up,
    Down,
    LinkUp,
    LinkDown,
    InitiateLinkState,
    InitiateHeartbeat,
    Heartbeat,
    LinkStateUpdate,
    LinkStateRequest,
    RoutingUpdate,
    ControllerView,
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        std::fmt::Debug::fmt(self, f)
    }
}

/// Link-state advertisement of a single switch.
#[derive(Debug, Clone, PartialEq)]
pub struct LinkStateUpdate {
    /// Advertising switch
    pub src: EntityId,
    /// Sequence number of the advertisement
    pub sn: SequenceNum,
    /// Neighbors that were up when the advertisement was created
    pub neighbors: Rc<[EntityId]>,
    /// Time after which the advertisement is no longer valid
    pub expiration: Time,
    /// The advertisement answers a [`LinkStateRequest`].
    pub resync: bool,
}

/// Request to re-advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkStateRequest {
    /// Requesting controller
    pub src: EntityId,
    /// Sequence number of the request
    pub sn: SequenceNum,
}

/// Routing table for a single switch.
#[derive(Debug, Clone, PartialEq)]
pub struct RoutingUpdate {
    /// Controller that computed the table
    pub src: EntityId,
    /// Switch for which the table is destined
    pub dst: EntityId,
    /// Sequence number, per destination switch
    pub sn: SequenceNum,
    /// Next hop for every host, indexed by the host index.
    pub table: Rc<[NextHop]>,
}

/// Snapshot of the link-state database of a controller.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerView {
    /// Originating controller
    pub src: EntityId,
    /// Sequence number of the view
    pub sn: SequenceNum,
    /// The snapshot itself
    pub snapshot: Rc<LinkStateSnapshot>,
}

/// Heartbeat of a single entity.
#[derive(Debug, Clone, PartialEq)]
pub struct Heartbeat {
    /// Originating entity
    pub src: EntityId,
    /// Sequence number of the heartbeat
    pub sn: SequenceNum,
    /// Entities whose heartbeats the originator has recently seen, indexed by id.
    pub recently_seen: Rc<[bool]>,
}

/// A (sender, inbound, outbound) combination for which [`crate::scheduler::Scheduler`] can
/// forward an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Transition {
    /// Role of the sending entity
    pub sender: EntityKind,
    /// Event the sender is handling
    pub inbound: EventType,
    /// Event the sender emits
    pub outbound: EventType,
}

impl Transition {
    /// Time between the inbound event and the delivery of the outbound event. Returns an error if
    /// the combination is not one that any entity can produce.
    ///
    /// The payload of the outbound event (sequence numbers, expiration, neighbor snapshot, routing
    /// table) is computed by the handler of the sending entity in [`crate::entity`]. The
    /// scheduler only stamps the delivery time and the inbound port.
    pub fn offset(&self, config: &SimConfig) -> Result<Time, SimError> {
        use EntityKind as K;
        use EventType as T;
        match (self.sender, self.inbound, self.outbound) {
            (K::Switch, T::Up | T::InitiateLinkState | T::LinkStateUpdate, T::LinkStateUpdate)
            | (K::Switch, T::LinkStateRequest, T::LinkStateUpdate | T::LinkStateRequest)
            | (K::Switch, T::RoutingUpdate, T::RoutingUpdate)
            | (K::Switch, T::ControllerView, T::ControllerView)
            | (
                K::Controller,
                T::LinkStateUpdate,
                T::ControllerView | T::RoutingUpdate | T::LinkStateRequest,
            )
            | (_, T::InitiateHeartbeat | T::Heartbeat, T::Heartbeat) => Ok(config.delay()),
            _ => Err(SimError::UnsupportedTransition {
                sender: self.sender,
                inbound: self.inbound,
                outbound: self.outbound,
            }),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transitions() {
        let config = SimConfig::default().with_delay(2.0);
        let t = Transition {
            sender: EntityKind::Switch,
            inbound: EventType::Up,
            outbound: EventType::LinkStateUpdate,
        };
        assert_eq!(t.offset(&config), Ok(2.0));
        let t = Transition {
            sender: EntityKind::Host,
            inbound: EventType::Heartbeat,
            outbound: EventType::Heartbeat,
        };
        assert_eq!(t.offset(&config), Ok(2.0));
        let t = Transition {
            sender: EntityKind::Controller,
            inbound: EventType::Up,
            outbound: EventType::LinkStateUpdate,
        };
        assert!(matches!(
            t.offset(&config),
            Err(SimError::UnsupportedTransition { .. })
        ));
    }

    #[test]
    fn event_size() {
        let lsu = Event::new(
            0.0,
            1,
            EventKind::LinkStateUpdate(LinkStateUpdate {
                src: 0,
                sn: 0,
                neighbors: vec![1, 2].into(),
                expiration: 10.0,
                resync: false,
            }),
        );
        assert_eq!(lsu.size(), 70);
        assert_eq!(Event::new(0.0, 1, EventKind::Up).size(), 20);
        let hb = Event::new(
            0.0,
            1,
            EventKind::Heartbeat(Heartbeat {
                src: 0,
                sn: 0,
                recently_seen: vec![false; 9].into(),
            }),
        );
        assert_eq!(hb.size(), 22);
    }

    #[test]
    fn link_event_affects_both() {
        let e = Event::link(1.0, 4, 2, false);
        assert_eq!(e.affected.primary(), 2);
        assert_eq!(e.affected.ids(), vec![2, 4]);
        assert_eq!(e.affected.peer_of(4), Some(2));
        assert_eq!(e.affected.peer_of(3), None);
        assert_eq!(e.event_type(), EventType::LinkDown);
    }
}
