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

//! # Protocol entities
//!
//! Every entity shares a [`Base`] (id, up/down state, port table and heartbeat history) and
//! carries role-specific state in [`Role`]. Each role handles every [`EventKind`] in a single
//! exhaustive `match`; events that a role must never receive are reported as
//! [`SimError::UnexpectedEvent`].
//!
//! Handlers never touch the event queue. They return the [`Action`]s to be carried out by the
//! [`crate::scheduler::Scheduler`], together with a [`StepUpdate`] describing what changed.

use std::collections::HashMap;
use std::hash::Hash;
use std::rc::Rc;

use log::*;

use crate::config::SimConfig;
use crate::event::{
    ControllerView, Event, EventKind, Heartbeat, LinkStateRequest, LinkStateUpdate, RoutingUpdate,
};
use crate::heartbeat::HeartbeatHistory;
use crate::link_state::{LinkState, LinkStateControl};
use crate::links::Links;
use crate::types::{Census, EntityId, EntityKind, NextHop, Port, SequenceNum, SimError, Time};

/// Result of handling a single event.
pub type EventOutcome = (StepUpdate, Vec<Action>);

/// Change of protocol state caused by an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepUpdate {
    /// Nothing noteworthy happened.
    Unchanged,
    /// A link-state advertisement was accepted (it was neither stale nor expired).
    Accepted {
        /// Source of the advertisement
        src: EntityId,
        /// Its sequence number
        sn: SequenceNum,
    },
    /// A switch installed a new routing table.
    RoutesInstalled {
        /// Controller that computed the table
        src: EntityId,
        /// Sequence number of the routing update
        sn: SequenceNum,
    },
}

/// Request of an entity to the scheduler.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    /// Send an event through a local port.
    Forward {
        /// Outgoing port
        port: Port,
        /// Payload to send
        kind: EventKind,
    },
    /// Schedule an event for the entity itself, `delay` after the current event.
    After {
        /// Delay relative to the handled event
        delay: Time,
        /// Payload of the event
        kind: EventKind,
    },
}

/// Read-only information available to every handler.
#[derive(Debug, Clone, Copy)]
pub struct Context<'a> {
    /// Current simulation time
    pub now: Time,
    /// Classification of all ids
    pub census: &'a Census,
    /// Simulation parameters
    pub config: &'a SimConfig,
    /// Whether flooding had enough time to reach every entity.
    pub converged: bool,
}

/// Accept `sn` for `key` if it is newer than the last one accepted.
fn accept_newer<K: Eq + Hash>(seen: &mut HashMap<K, SequenceNum>, key: K, sn: SequenceNum) -> bool {
    match seen.get(&key) {
        Some(last) if sn <= *last => false,
        _ => {
            seen.insert(key, sn);
            true
        }
    }
}

fn unchanged() -> Result<EventOutcome, SimError> {
    Ok((StepUpdate::Unchanged, Vec::new()))
}

/// State shared by all roles.
#[derive(Debug, Clone)]
pub struct Base {
    id: EntityId,
    kind: EntityKind,
    is_up: bool,
    links: Links,
    heartbeats: HeartbeatHistory,
}

impl Base {
    fn unexpected(&self, event: &Event, ctx: &Context) -> SimError {
        SimError::UnexpectedEvent {
            entity: self.id,
            kind: self.kind,
            event: event.event_type(),
            time: ctx.now,
        }
    }

    fn in_port(&self, event: &Event) -> Result<Port, SimError> {
        event.in_port.ok_or(SimError::NoInboundPort {
            entity: self.id,
            event: event.event_type(),
        })
    }

    /// Toggle the port towards the other endpoint of a link event.
    fn set_link(&mut self, event: &Event, up: bool) -> Result<(), SimError> {
        let peer = event
            .affected
            .peer_of(self.id)
            .ok_or(SimError::EntityNotFound(self.id))?;
        let port = self.links.port_to(peer).ok_or(SimError::PortNotFound {
            from: self.id,
            to: peer,
        })?;
        if up {
            self.links.set_link_up(self.id, port)
        } else {
            self.links.set_link_down(self.id, port)
        }
    }

    fn initiate_heartbeat(&mut self, ctx: &Context) -> Result<EventOutcome, SimError> {
        if !self.is_up {
            return unchanged();
        }
        let heartbeat = Heartbeat {
            src: self.id,
            sn: self.heartbeats.next_seq_num(),
            recently_seen: self.heartbeats.recently_seen(
                ctx.now,
                ctx.census.total(),
                ctx.config.max_recent,
            ),
        };
        let actions = self
            .links
            .iter()
            .map(|(port, _)| Action::Forward {
                port,
                kind: EventKind::Heartbeat(heartbeat.clone()),
            })
            .collect();
        Ok((StepUpdate::Unchanged, actions))
    }

    fn handle_heartbeat(
        &mut self,
        event: &Event,
        heartbeat: &Heartbeat,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        if !self.is_up
            || heartbeat.src == self.id
            || self.heartbeats.has_been_seen(heartbeat.src, heartbeat.sn)
        {
            return unchanged();
        }
        self.heartbeats
            .mark_as_seen(heartbeat.src, heartbeat.sn, ctx.now, ctx.config.min_times);
        let actions = self
            .links
            .iter()
            .filter(|(port, _)| Some(*port) != event.in_port)
            .map(|(port, _)| Action::Forward {
                port,
                kind: EventKind::Heartbeat(heartbeat.clone()),
            })
            .collect();
        Ok((StepUpdate::Unchanged, actions))
    }

    /// Forward `kind` on every port yielded by `ports`, except the inbound port of `event`.
    fn forward_except<I>(event: &Event, ports: I, kind: &EventKind) -> Vec<Action>
    where
        I: Iterator<Item = Port>,
    {
        ports
            .filter(|p| Some(*p) != event.in_port)
            .map(|port| Action::Forward {
                port,
                kind: kind.clone(),
            })
            .collect()
    }
}

/// A switch, controller or host.
#[derive(Debug, Clone)]
pub struct Entity {
    base: Base,
    role: Role,
}

/// Role-specific state of an entity.
#[derive(Debug, Clone)]
pub enum Role {
    /// Switch state
    Switch(Switch),
    /// Controller state
    Controller(Controller),
    /// Host state
    Host(Host),
}

impl Entity {
    /// Create a new entity without any links. Entities start up.
    pub fn new(id: EntityId, kind: EntityKind, census: &Census) -> Self {
        let role = match kind {
            EntityKind::Switch => Role::Switch(Switch::new(census.total())),
            EntityKind::Controller => Role::Controller(Controller::new(*census)),
            EntityKind::Host => Role::Host(Host),
        };
        Self {
            base: Base {
                id,
                kind,
                is_up: true,
                links: Links::new(),
                heartbeats: HeartbeatHistory::new(),
            },
            role,
        }
    }

    /// Id of the entity.
    pub fn id(&self) -> EntityId {
        self.base.id
    }

    /// Role of the entity.
    pub fn kind(&self) -> EntityKind {
        self.base.kind
    }

    /// Returns `true` if the entity is up.
    pub fn is_up(&self) -> bool {
        self.base.is_up
    }

    /// Port table of the entity.
    pub fn links(&self) -> &Links {
        &self.base.links
    }

    pub(crate) fn links_mut(&mut self) -> &mut Links {
        &mut self.base.links
    }

    /// Heartbeats seen by the entity.
    pub fn heartbeats(&self) -> &HeartbeatHistory {
        &self.base.heartbeats
    }

    /// Role-specific state.
    pub fn role(&self) -> &Role {
        &self.role
    }

    /// Active routing table of a switch.
    pub fn routing_table(&self) -> Option<&[NextHop]> {
        match &self.role {
            Role::Switch(s) => s.routing_table.as_deref(),
            _ => None,
        }
    }

    /// Link-state database of a switch or controller.
    pub fn link_state(&self) -> Option<&LinkState> {
        match &self.role {
            Role::Switch(s) => Some(&s.link_state),
            Role::Controller(c) => Some(c.link_state.view()),
            Role::Host(_) => None,
        }
    }

    /// The only switch this entity is connected to. Fails unless exactly one port leads to a
    /// switch.
    pub fn edge_switch(&self) -> Result<EntityId, SimError> {
        let mut switches = self
            .base
            .links
            .iter()
            .filter(|(_, l)| l.kind == EntityKind::Switch)
            .map(|(_, l)| l.neighbor);
        match (switches.next(), switches.count()) {
            (Some(s), 0) => Ok(s),
            (first, rest) => Err(SimError::NotSingleHomed {
                host: self.base.id,
                switch_ports: first.map(|_| 1).unwrap_or(0) + rest,
            }),
        }
    }

    /// Handle an event addressed to this entity.
    pub fn handle(&mut self, event: &Event, ctx: &Context) -> Result<EventOutcome, SimError> {
        match &mut self.role {
            Role::Switch(s) => s.handle(&mut self.base, event, ctx),
            Role::Controller(c) => c.handle(&mut self.base, event, ctx),
            Role::Host(h) => h.handle(&mut self.base, event, ctx),
        }
    }
}

/// Switch state: a local link-state database and the routing table received from a controller.
#[derive(Debug, Clone)]
pub struct Switch {
    link_state: LinkState,
    routing_table: Option<Rc<[NextHop]>>,
    routes_seen: HashMap<(EntityId, EntityId), SequenceNum>,
    requests_seen: HashMap<EntityId, SequenceNum>,
    views_seen: HashMap<EntityId, SequenceNum>,
}

impl Switch {
    fn new(num_entities: usize) -> Self {
        Self {
            link_state: LinkState::new(num_entities),
            routing_table: None,
            routes_seen: HashMap::new(),
            requests_seen: HashMap::new(),
            views_seen: HashMap::new(),
        }
    }

    fn handle(
        &mut self,
        base: &mut Base,
        event: &Event,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        match &event.kind {
            EventKind::Up => {
                base.is_up = true;
                Ok((StepUpdate::Unchanged, self.advertise(base, ctx)))
            }
            EventKind::Down => {
                base.is_up = false;
                unchanged()
            }
            EventKind::LinkUp | EventKind::LinkDown => {
                base.set_link(event, event.kind == EventKind::LinkUp)?;
                if !base.is_up {
                    return unchanged();
                }
                let settle = Action::After {
                    delay: ctx.config.hello_delay,
                    kind: EventKind::InitiateLinkState,
                };
                Ok((StepUpdate::Unchanged, vec![settle]))
            }
            EventKind::InitiateHeartbeat => base.initiate_heartbeat(ctx),
            EventKind::Heartbeat(h) => base.handle_heartbeat(event, h, ctx),
            _ if !base.is_up => {
                trace!("Switch {} is down", base.id);
                unchanged()
            }
            EventKind::InitiateLinkState => Ok((StepUpdate::Unchanged, self.advertise(base, ctx))),
            EventKind::LinkStateUpdate(lsu) => self.handle_link_state(base, event, lsu, ctx),
            EventKind::LinkStateRequest(lsr) => self.handle_request(base, event, lsr, ctx),
            EventKind::RoutingUpdate(ru) => self.handle_routing_update(base, event, ru),
            EventKind::ControllerView(cv) => {
                if !accept_newer(&mut self.views_seen, cv.src, cv.sn) {
                    return unchanged();
                }
                let actions = Base::forward_except(event, base.links.control_ports(), &event.kind);
                Ok((StepUpdate::Unchanged, actions))
            }
        }
    }

    /// Create a fresh advertisement of the current up-neighbors and install it locally.
    fn originate(&mut self, base: &Base, ctx: &Context, resync: bool) -> LinkStateUpdate {
        let lsu = LinkStateUpdate {
            src: base.id,
            sn: self.link_state.next_seq_num(),
            neighbors: base.links.up_neighbors(),
            expiration: ctx.now + ctx.config.ls_lifetime,
            resync,
        };
        self.link_state.update(&lsu);
        lsu
    }

    fn advertise(&mut self, base: &Base, ctx: &Context) -> Vec<Action> {
        let lsu = self.originate(base, ctx, false);
        debug!("Switch {} advertises {:?} with sn {}", base.id, lsu.neighbors, lsu.sn);
        base.links
            .control_ports()
            .map(|port| Action::Forward {
                port,
                kind: EventKind::LinkStateUpdate(lsu.clone()),
            })
            .collect()
    }

    fn handle_link_state(
        &mut self,
        base: &Base,
        event: &Event,
        lsu: &LinkStateUpdate,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        if lsu.expiration < ctx.now {
            debug!(
                "Switch {}: advertisement {} of {} died of old age",
                base.id, lsu.sn, lsu.src
            );
            return unchanged();
        }
        self.link_state.refresh(ctx.now);

        if self.link_state.is_stale_update(lsu) {
            if self.link_state.has_newer(lsu) {
                if let Some(current) = self.link_state.current_link_state(lsu.src) {
                    debug!(
                        "Switch {}: correcting stale advertisement {} of {} with {}",
                        base.id, lsu.sn, lsu.src, current.sn
                    );
                    let port = base.in_port(event)?;
                    let kind = EventKind::LinkStateUpdate(current);
                    return Ok((StepUpdate::Unchanged, vec![Action::Forward { port, kind }]));
                }
            }
            trace!("Switch {}: stale advertisement {} of {}", base.id, lsu.sn, lsu.src);
            return unchanged();
        }

        self.link_state.update(lsu);
        let accepted = StepUpdate::Accepted {
            src: lsu.src,
            sn: lsu.sn,
        };
        let actions = Base::forward_except(event, base.links.control_ports(), &event.kind);
        Ok((accepted, actions))
    }

    fn handle_request(
        &mut self,
        base: &Base,
        event: &Event,
        lsr: &LinkStateRequest,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        if !accept_newer(&mut self.requests_seen, lsr.src, lsr.sn) {
            return unchanged();
        }
        let port = base.in_port(event)?;
        let reply = self.originate(base, ctx, true);
        debug!("Switch {} answers request {} of {}", base.id, lsr.sn, lsr.src);
        let mut actions = vec![Action::Forward {
            port,
            kind: EventKind::LinkStateUpdate(reply),
        }];
        actions.extend(Base::forward_except(event, base.links.switch_ports(), &event.kind));
        Ok((StepUpdate::Unchanged, actions))
    }

    fn handle_routing_update(
        &mut self,
        base: &Base,
        event: &Event,
        ru: &RoutingUpdate,
    ) -> Result<EventOutcome, SimError> {
        if !accept_newer(&mut self.routes_seen, (ru.src, ru.dst), ru.sn) {
            return unchanged();
        }
        if ru.dst == base.id {
            debug!("Switch {} installs routing table {} of {}", base.id, ru.sn, ru.src);
            self.routing_table = Some(ru.table.clone());
            let update = StepUpdate::RoutesInstalled {
                src: ru.src,
                sn: ru.sn,
            };
            return Ok((update, Vec::new()));
        }
        let actions = Base::forward_except(event, base.links.switch_ports(), &event.kind);
        Ok((StepUpdate::Unchanged, actions))
    }

    /// The local link-state database.
    pub fn link_state(&self) -> &LinkState {
        &self.link_state
    }

    /// The active routing table.
    pub fn routing_table(&self) -> Option<&[NextHop]> {
        self.routing_table.as_deref()
    }
}

/// Controller state.
#[derive(Debug, Clone)]
pub struct Controller {
    link_state: LinkStateControl,
    census: Census,
    next_route_sn: Vec<SequenceNum>,
    next_view_sn: SequenceNum,
    next_request_sn: SequenceNum,
    views_seen: HashMap<EntityId, SequenceNum>,
    /// A change was accepted before the network converged, and was not yet acted upon.
    pending: bool,
}

impl Controller {
    fn new(census: Census) -> Self {
        Self {
            link_state: LinkStateControl::new(census),
            census,
            next_route_sn: vec![0; census.switches],
            next_view_sn: 0,
            next_request_sn: 0,
            views_seen: HashMap::new(),
            pending: false,
        }
    }

    fn handle(
        &mut self,
        base: &mut Base,
        event: &Event,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        match &event.kind {
            EventKind::Up => {
                base.is_up = true;
                unchanged()
            }
            EventKind::Down => {
                base.is_up = false;
                unchanged()
            }
            EventKind::LinkUp | EventKind::LinkDown => {
                base.set_link(event, event.kind == EventKind::LinkUp)?;
                unchanged()
            }
            EventKind::InitiateHeartbeat => base.initiate_heartbeat(ctx),
            EventKind::Heartbeat(h) => base.handle_heartbeat(event, h, ctx),
            EventKind::InitiateLinkState
            | EventKind::RoutingUpdate(_)
            | EventKind::LinkStateRequest(_) => Err(base.unexpected(event, ctx)),
            _ if !base.is_up => {
                trace!("Controller {} is down", base.id);
                unchanged()
            }
            EventKind::LinkStateUpdate(lsu) => self.handle_link_state(base, lsu, ctx),
            EventKind::ControllerView(cv) => {
                self.handle_view(base, cv, ctx);
                unchanged()
            }
        }
    }

    fn handle_link_state(
        &mut self,
        base: &Base,
        lsu: &LinkStateUpdate,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        if lsu.expiration < ctx.now {
            debug!(
                "Controller {}: advertisement {} of {} died of old age",
                base.id, lsu.sn, lsu.src
            );
            return unchanged();
        }
        self.link_state.refresh(ctx.now);
        if self.link_state.is_stale_update(lsu) {
            trace!("Controller {}: stale advertisement {} of {}", base.id, lsu.sn, lsu.src);
            return unchanged();
        }

        self.link_state.compute_partitions();
        let heals = !lsu.resync && self.link_state.heals_partition(base.id, lsu);
        let changed = self.link_state.update(lsu);
        let accepted = StepUpdate::Accepted {
            src: lsu.src,
            sn: lsu.sn,
        };

        if !ctx.converged {
            self.pending |= changed;
            return Ok((accepted, Vec::new()));
        }
        if !(changed || self.pending) {
            return Ok((accepted, Vec::new()));
        }
        self.pending = false;

        let mut actions = self.replicate(base);
        actions.extend(self.compute_routes(base));
        if heals {
            let request = LinkStateRequest {
                src: base.id,
                sn: self.next_request_sn,
            };
            self.next_request_sn += 1;
            debug!("Controller {}: partition healed, sending request {}", base.id, request.sn);
            actions.extend(base.links.switch_ports().map(|port| Action::Forward {
                port,
                kind: EventKind::LinkStateRequest(request),
            }));
        }
        Ok((accepted, actions))
    }

    /// Broadcast a snapshot of the local view.
    fn replicate(&mut self, base: &Base) -> Vec<Action> {
        let view = ControllerView {
            src: base.id,
            sn: self.next_view_sn,
            snapshot: Rc::new(self.link_state.view().snapshot()),
        };
        self.next_view_sn += 1;
        base.links
            .control_ports()
            .map(|port| Action::Forward {
                port,
                kind: EventKind::ControllerView(view.clone()),
            })
            .collect()
    }

    /// Send a fresh routing table to every switch in the own partition, if this is the lowest
    /// controller of that partition.
    fn compute_routes(&mut self, base: &Base) -> Vec<Action> {
        self.link_state.compute_partitions();
        if self.link_state.lowest_controller(base.id) != Some(base.id) {
            trace!("Controller {} is not responsible for its partition", base.id);
            return Vec::new();
        }
        let mut actions = Vec::new();
        for switch in self.link_state.switches_in_partition(base.id) {
            let sn = self.next_route_sn[switch];
            self.next_route_sn[switch] += 1;
            let ru = RoutingUpdate {
                src: base.id,
                dst: switch,
                sn,
                table: self.link_state.compute_routing_table(switch),
            };
            actions.extend(base.links.switch_ports().map(|port| Action::Forward {
                port,
                kind: EventKind::RoutingUpdate(ru.clone()),
            }));
        }
        actions
    }

    fn handle_view(&mut self, base: &Base, cv: &ControllerView, ctx: &Context) {
        if cv.src == base.id || !accept_newer(&mut self.views_seen, cv.src, cv.sn) {
            return;
        }
        self.link_state.refresh(ctx.now);
        if self.link_state.merge(&cv.snapshot) {
            debug!("Controller {} merged view {} of {}", base.id, cv.sn, cv.src);
        }
    }

    /// The link-state database, with partitions and routing tables.
    pub fn link_state(&self) -> &LinkStateControl {
        &self.link_state
    }

    /// Number of switches the controller can address.
    pub fn switch_count(&self) -> usize {
        self.census.switches
    }
}

/// Host state. Hosts do not take part in the control plane.
#[derive(Debug, Clone, Copy, Default)]
pub struct Host;

impl Host {
    fn handle(
        &mut self,
        base: &mut Base,
        event: &Event,
        ctx: &Context,
    ) -> Result<EventOutcome, SimError> {
        match &event.kind {
            EventKind::Up => {
                base.is_up = true;
                unchanged()
            }
            EventKind::Down => {
                base.is_up = false;
                unchanged()
            }
            EventKind::LinkUp | EventKind::LinkDown => {
                base.set_link(event, event.kind == EventKind::LinkUp)?;
                unchanged()
            }
            EventKind::InitiateHeartbeat => base.initiate_heartbeat(ctx),
            EventKind::Heartbeat(h) => base.handle_heartbeat(event, h, ctx),
            EventKind::InitiateLinkState => Err(base.unexpected(event, ctx)),
            EventKind::LinkStateUpdate(_)
            | EventKind::LinkStateRequest(_)
            | EventKind::RoutingUpdate(_)
            | EventKind::ControllerView(_) => {
                trace!("Host {} ignores {}", base.id, event.event_type());
                unchanged()
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::topology::Topology;
    use pretty_assertions::assert_eq;

    fn host_of(census: Census, links: &[(EntityId, EntityId)]) -> Entity {
        let mut t = Topology::new(census);
        for (a, b) in links {
            t.add_link(*a, *b).unwrap();
        }
        let host = census.host_id(0);
        t.build_entities(&SimConfig::default()).swap_remove(host)
    }

    #[test]
    fn edge_switch() {
        let host = host_of(Census::new(2, 1, 1), &[(0, 1), (1, 3), (2, 3)]);
        assert_eq!(host.edge_switch(), Ok(1));
    }

    #[test]
    fn multi_homed_host() {
        let host = host_of(Census::new(2, 0, 1), &[(0, 2), (1, 2)]);
        assert_eq!(
            host.edge_switch(),
            Err(SimError::NotSingleHomed {
                host: 2,
                switch_ports: 2
            })
        );
    }

    #[test]
    fn detached_host() {
        let host = host_of(Census::new(1, 0, 1), &[]);
        assert_eq!(
            host.edge_switch(),
            Err(SimError::NotSingleHomed {
                host: 1,
                switch_ports: 0
            })
        );

        // a link to a controller does not count
        let host = host_of(Census::new(1, 1, 1), &[(0, 1), (1, 2)]);
        assert_eq!(
            host.edge_switch(),
            Err(SimError::NotSingleHomed {
                host: 2,
                switch_ports: 0
            })
        );
    }
}
