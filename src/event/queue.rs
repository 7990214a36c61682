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

//! Module containing the frontier queue.
//!
//! Events are grouped into frontiers, one per exact delivery time, and the frontiers are ordered
//! in a min-heap. Inside a frontier, every entity owns a bucket. Buckets are drained in ascending
//! entity order, and each bucket is drained last-in-first-out. The position of the lowest
//! nonempty bucket is cached, so popping costs O(1) amortized.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};

use ordered_float::NotNan;

use super::Event;
use crate::types::{EntityId, SimError, Time};

/// Bucket storage of retired frontiers, ready to be reused by new frontiers.
#[derive(Debug, Default)]
struct BucketPool {
    free: Vec<Vec<Vec<Event>>>,
}

impl BucketPool {
    fn acquire(&mut self, entity_count: usize) -> Vec<Vec<Event>> {
        match self.free.pop() {
            Some(mut buckets) => {
                buckets.resize_with(entity_count, Vec::new);
                buckets
            }
            None => (0..entity_count).map(|_| Vec::new()).collect(),
        }
    }

    fn release(&mut self, buckets: Vec<Vec<Event>>) {
        debug_assert!(buckets.iter().all(|b| b.is_empty()));
        self.free.push(buckets);
    }
}

/// All pending events sharing one delivery time.
#[derive(Debug)]
struct Frontier {
    buckets: Vec<Vec<Event>>,
    /// Lowest bucket that may be nonempty. Equal to `buckets.len()` if the frontier is empty.
    cursor: usize,
}

impl Frontier {
    fn new(buckets: Vec<Vec<Event>>) -> Self {
        let cursor = buckets.len();
        Self { buckets, cursor }
    }

    fn push(&mut self, id: EntityId, event: Event) {
        self.buckets[id].push(event);
        self.cursor = self.cursor.min(id);
    }

    fn pop(&mut self) -> Option<Event> {
        let event = self.buckets.get_mut(self.cursor)?.pop();
        while self.cursor < self.buckets.len() && self.buckets[self.cursor].is_empty() {
            self.cursor += 1;
        }
        event
    }

    fn is_empty(&self) -> bool {
        self.cursor >= self.buckets.len()
    }
}

/// Causally ordered event queue. See the module documentation for the ordering.
#[derive(Debug)]
pub struct FrontierQueue {
    entity_count: usize,
    heap: BinaryHeap<Reverse<NotNan<Time>>>,
    frontiers: HashMap<NotNan<Time>, Frontier>,
    pool: BucketPool,
    len: usize,
}

impl FrontierQueue {
    /// Create an empty queue for a network of `entity_count` entities.
    pub fn new(entity_count: usize) -> Self {
        Self {
            entity_count,
            heap: BinaryHeap::new(),
            frontiers: HashMap::new(),
            pool: BucketPool::default(),
            len: 0,
        }
    }

    /// Enqueue an event. Fails if the time is NaN or the event affects an unknown entity.
    pub fn push(&mut self, event: Event) -> Result<(), SimError> {
        let time = NotNan::new(event.time).map_err(|_| SimError::InvalidTime(event.time))?;
        let id = event.affected.primary();
        if id >= self.entity_count {
            return Err(SimError::EntityNotFound(id));
        }
        let frontier = match self.frontiers.entry(time) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                self.heap.push(Reverse(time));
                e.insert(Frontier::new(self.pool.acquire(self.entity_count)))
            }
        };
        frontier.push(id, event);
        self.len += 1;
        Ok(())
    }

    /// Pop the next event. Popping from an empty queue is an error.
    pub fn pop(&mut self) -> Result<Event, SimError> {
        let Reverse(time) = *self.heap.peek().ok_or(SimError::EmptyQueue)?;
        let frontier = self
            .frontiers
            .get_mut(&time)
            .ok_or(SimError::InvalidTime(*time))?;
        let event = frontier.pop().ok_or(SimError::EmptyQueue)?;
        if frontier.is_empty() {
            self.heap.pop();
            if let Some(frontier) = self.frontiers.remove(&time) {
                self.pool.release(frontier.buckets);
            }
        }
        self.len -= 1;
        Ok(event)
    }

    /// Delivery time of the next event.
    pub fn peek_time(&self) -> Option<Time> {
        self.heap.peek().map(|Reverse(t)| **t)
    }

    /// Number of enqueued events.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns `true` if no event is enqueued.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of distinct delivery times currently enqueued.
    pub fn frontier_count(&self) -> usize {
        self.frontiers.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::event::{EventKind, LinkStateRequest};
    use pretty_assertions::assert_eq;

    /// Event for `id`, tagged with `tag` such that pops can be identified.
    fn tagged(time: Time, id: EntityId, tag: u64) -> Event {
        Event::new(
            time,
            id,
            EventKind::LinkStateRequest(LinkStateRequest { src: 0, sn: tag }),
        )
    }

    fn tag(e: &Event) -> u64 {
        match &e.kind {
            EventKind::LinkStateRequest(r) => r.sn,
            _ => unreachable!(),
        }
    }

    #[test]
    fn frontier_ordering() {
        let mut q = FrontierQueue::new(3);
        q.push(tagged(1.5, 0, 10)).unwrap();
        q.push(tagged(1.0, 2, 0)).unwrap();
        q.push(tagged(1.0, 0, 1)).unwrap();
        q.push(tagged(1.0, 1, 2)).unwrap();
        q.push(tagged(1.0, 0, 3)).unwrap();
        assert_eq!(q.len(), 5);
        assert_eq!(q.frontier_count(), 2);

        let order: Vec<(Time, EntityId, u64)> = std::iter::from_fn(|| q.pop().ok())
            .map(|e| (e.time, e.affected.primary(), tag(&e)))
            .collect();
        assert_eq!(
            order,
            vec![
                (1.0, 0, 3),
                (1.0, 0, 1),
                (1.0, 1, 2),
                (1.0, 2, 0),
                (1.5, 0, 10),
            ]
        );
        assert!(q.is_empty());
        assert_eq!(q.frontier_count(), 0);
    }

    #[test]
    fn push_below_cursor() {
        let mut q = FrontierQueue::new(4);
        q.push(tagged(2.0, 1, 0)).unwrap();
        q.push(tagged(2.0, 3, 1)).unwrap();
        assert_eq!(tag(&q.pop().unwrap()), 0);
        q.push(tagged(2.0, 0, 2)).unwrap();
        assert_eq!(tag(&q.pop().unwrap()), 2);
        assert_eq!(tag(&q.pop().unwrap()), 1);
        assert!(q.is_empty());
    }

    #[test]
    fn later_times_wait() {
        let mut q = FrontierQueue::new(2);
        q.push(tagged(1.0 + f64::EPSILON, 0, 0)).unwrap();
        q.push(tagged(1.0, 1, 1)).unwrap();
        assert_eq!(q.peek_time(), Some(1.0));
        assert_eq!(tag(&q.pop().unwrap()), 1);
        assert_eq!(tag(&q.pop().unwrap()), 0);
    }

    #[test]
    fn storage_is_reused() {
        let mut q = FrontierQueue::new(2);
        q.push(tagged(1.0, 1, 0)).unwrap();
        q.pop().unwrap();
        assert_eq!(q.pool.free.len(), 1);
        q.push(tagged(2.0, 0, 1)).unwrap();
        assert_eq!(q.pool.free.len(), 0);
        assert_eq!(tag(&q.pop().unwrap()), 1);
    }

    #[test]
    fn invalid_use() {
        let mut q = FrontierQueue::new(2);
        assert_eq!(q.pop(), Err(SimError::EmptyQueue));
        assert!(matches!(
            q.push(tagged(f64::NAN, 0, 0)),
            Err(SimError::InvalidTime(_))
        ));
        assert_eq!(
            q.push(tagged(1.0, 2, 0)),
            Err(SimError::EntityNotFound(2))
        );
    }
}
