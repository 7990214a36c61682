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

//! # Event scheduler
//!
//! The [`Scheduler`] owns every entity, the simulation clock and the [`FrontierQueue`]. It pops
//! events in causal order, dispatches them to the affected entities, and carries out the
//! [`Action`]s returned by their handlers. Forwarding an event resolves the receiver and its
//! inbound port, computes the delivery time from the [`Transition`], and drops events that would
//! be delivered after the simulation horizon.

use log::*;

use crate::config::SimConfig;
use crate::entity::{Action, Context, Entity, StepUpdate};
use crate::event::{Affected, Event, EventKind, FrontierQueue, Transition};
use crate::stats::{NoStatistics, Statistics};
use crate::topology::Topology;
use crate::types::{Census, EntityId, Port, SimError, Time, START_TIME};

/// Discrete-event simulation of a network control plane.
#[derive(Debug)]
pub struct Scheduler<S = NoStatistics> {
    entities: Vec<Entity>,
    census: Census,
    config: SimConfig,
    queue: FrontierQueue,
    clock: Time,
    diameter: usize,
    stats: S,
}

impl Scheduler<NoStatistics> {
    /// Create a scheduler that does not record any statistics.
    pub fn without_stats(topology: &Topology, config: SimConfig) -> Self {
        Self::new(topology, config, NoStatistics)
    }
}

impl<S: Statistics> Scheduler<S> {
    /// Build all entities of `topology` and create an empty event queue.
    pub fn new(topology: &Topology, config: SimConfig, stats: S) -> Self {
        let entities = topology.build_entities(&config);
        Self {
            queue: FrontierQueue::new(entities.len()),
            entities,
            census: topology.census(),
            diameter: topology.diameter(),
            config,
            clock: START_TIME,
            stats,
        }
    }

    /// Per-hop delay of forwarded events.
    pub fn delay(&self) -> Time {
        self.config.delay()
    }

    /// Time after which flooding had enough time to reach every entity.
    pub fn converged_after(&self) -> Time {
        self.diameter as Time * self.delay()
    }

    /// Current simulation time.
    pub fn now(&self) -> Time {
        self.clock
    }

    /// Simulation parameters.
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// Classification of all ids.
    pub fn census(&self) -> &Census {
        &self.census
    }

    /// All entities, indexed by id.
    pub fn entities(&self) -> &[Entity] {
        &self.entities
    }

    /// Get a single entity.
    pub fn entity(&self, id: EntityId) -> Result<&Entity, SimError> {
        self.entities.get(id).ok_or(SimError::EntityNotFound(id))
    }

    /// Recorded statistics.
    pub fn stats(&self) -> &S {
        &self.stats
    }

    /// Consume the scheduler and return the recorded statistics.
    pub fn into_stats(self) -> S {
        self.stats
    }

    /// Number of pending events.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Enqueue an event.
    pub fn add_event(&mut self, event: Event) -> Result<(), SimError> {
        self.queue.push(event)
    }

    /// Send `kind` from `sender` through `out_port`, as a reaction to `inbound`. Returns `true` if
    /// the event was enqueued, and `false` if it was discarded because the link is down, the
    /// port ran out of bandwidth, or the delivery time lies beyond the horizon.
    pub fn forward(
        &mut self,
        sender: EntityId,
        inbound: &Event,
        kind: EventKind,
        out_port: Port,
    ) -> Result<bool, SimError> {
        let sender_entity = self.entity(sender)?;
        let link = sender_entity
            .links()
            .get(out_port)
            .ok_or(SimError::InvalidPort {
                entity: sender,
                port: out_port,
            })?;
        if !link.is_up {
            trace!("{} -> {}: link is down", sender, link.neighbor);
            return Ok(false);
        }
        let receiver = link.neighbor;
        let transition = Transition {
            sender: sender_entity.kind(),
            inbound: inbound.event_type(),
            outbound: kind.event_type(),
        };
        let in_port = self
            .entity(receiver)?
            .links()
            .port_to(sender)
            .ok_or(SimError::PortNotFound {
                from: receiver,
                to: sender,
            })?;

        let time = inbound.time + transition.offset(&self.config)?;
        if time > self.config.end_time {
            debug!(
                "{} -> {}: {} at {} lies beyond the horizon",
                sender, receiver, transition.outbound, time
            );
            return Ok(false);
        }

        let event = Event {
            time,
            affected: Affected::One(receiver),
            in_port: Some(in_port),
            kind,
        };
        let admitted = self
            .entities
            .get_mut(sender)
            .map(|e| e.links_mut().try_send(out_port, inbound.time, event.size()))
            .unwrap_or(false);
        if !admitted {
            debug!(
                "{} -> {}: not enough bandwidth for {}",
                sender, receiver, transition.outbound
            );
            return Ok(false);
        }

        self.stats.record_send(inbound.time, &event);
        self.queue.push(event)?;
        Ok(true)
    }

    /// Schedule the periodic link-state advertisements of every switch and the heartbeats of every
    /// entity, starting at time zero, up to the horizon. A period of zero disables the events.
    pub fn schedule_periodic_events(&mut self) -> Result<(), SimError> {
        let end_time = self.config.end_time;
        let periodic = |period: Time| {
            (0u32..)
                .map(move |k| k as Time * period)
                .take_while(move |t| period > 0.0 && *t <= end_time)
        };

        for time in periodic(self.config.ls_update_period) {
            for switch in self.census.switch_ids() {
                self.add_event(Event::new(time, switch, EventKind::InitiateLinkState))?;
            }
        }
        for time in periodic(self.config.heartbeat_period) {
            for id in 0..self.census.total() {
                self.add_event(Event::new(time, id, EventKind::InitiateHeartbeat))?;
            }
        }
        Ok(())
    }

    /// Process events until the queue is empty or the next event lies beyond the horizon.
    pub fn start_simulation(&mut self) -> Result<(), SimError> {
        info!(
            "Simulating {} entities until {}s ({} events pending)",
            self.entities.len(),
            self.config.end_time,
            self.queue.len()
        );
        let steps = self.simulate_until(self.config.end_time)?;
        info!(
            "Simulation stopped at {}s after {} events ({} events left)",
            self.clock,
            steps,
            self.queue.len()
        );
        Ok(())
    }

    /// Process every event due at or before `time`, and return the number of processed events.
    pub fn simulate_until(&mut self, time: Time) -> Result<usize, SimError> {
        let mut steps = 0;
        while let Some(next) = self.queue.peek_time() {
            if next > time {
                break;
            }
            self.simulate_step()?;
            steps += 1;
        }
        Ok(steps)
    }

    /// Delivery time of the next event.
    pub fn next_event_time(&self) -> Option<Time> {
        self.queue.peek_time()
    }

    /// Process the next event. Returns `false` if the queue was empty.
    pub fn simulate_step(&mut self) -> Result<bool, SimError> {
        if self.queue.is_empty() {
            return Ok(false);
        }
        let event = self.queue.pop()?;
        if event.time < self.clock {
            return Err(SimError::NonMonotonicClock {
                last: self.clock,
                current: event.time,
            });
        }
        self.clock = event.time;
        trace!(
            "{:.6}: {} for {:?}",
            event.time,
            event.event_type(),
            event.affected
        );

        match (&event.kind, event.affected) {
            (EventKind::Up, _) => {
                for id in event.affected.ids() {
                    self.stats.entity_up(event.time, id);
                }
            }
            (EventKind::Down, _) => {
                for id in event.affected.ids() {
                    self.stats.entity_down(event.time, id);
                }
            }
            (EventKind::LinkUp, Affected::Pair(a, b)) => self.stats.link_up(event.time, a, b),
            (EventKind::LinkDown, Affected::Pair(a, b)) => self.stats.link_down(event.time, a, b),
            _ => {}
        }

        for id in event.affected.ids() {
            self.deliver(id, &event)?;
        }
        Ok(true)
    }

    fn deliver(&mut self, id: EntityId, event: &Event) -> Result<(), SimError> {
        let ctx = Context {
            now: self.clock,
            census: &self.census,
            config: &self.config,
            converged: self.clock > self.diameter as Time * self.config.delay(),
        };
        let entity = self
            .entities
            .get_mut(id)
            .ok_or(SimError::EntityNotFound(id))?;
        let (update, actions) = entity.handle(event, &ctx)?;

        match update {
            StepUpdate::Unchanged => {}
            StepUpdate::Accepted { src, sn } => {
                self.stats.accepted_update(event.time, id, src, sn)
            }
            StepUpdate::RoutesInstalled { src, sn } => {
                self.stats.routes_installed(event.time, id, src, sn)
            }
        }

        for action in actions {
            match action {
                Action::Forward { port, kind } => {
                    self.forward(id, event, kind, port)?;
                }
                Action::After { delay, kind } => {
                    let time = event.time + delay;
                    if time > self.config.end_time {
                        debug!("{}: {} at {} lies beyond the horizon", id, kind.event_type(), time);
                        continue;
                    }
                    self.add_event(Event::new(time, id, kind))?;
                }
            }
        }
        Ok(())
    }
}
