// src/pipeline/event_bus.rs
//
// Decoupled event queue. The engine publishes parking events and violations
// here; sinks drain them after each frame instead of reaching into tracker
// state. The trackers keep the authoritative history, so an eviction on
// overflow only affects delivery, not the audit log.

use crate::types::{ParkingEvent, Violation};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    Parking(ParkingEvent),
    Violation(Violation),
}

/// Bounded FIFO between the engine and its sinks. When full, the oldest
/// pending event is evicted and handed back to the caller.
pub struct EventBus {
    queue: VecDeque<PipelineEvent>,
    capacity: usize,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            queue: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Queue `event`, returning the evicted event if the bus was at capacity.
    #[must_use = "an evicted event is never delivered"]
    pub fn publish(&mut self, event: PipelineEvent) -> Option<PipelineEvent> {
        let evicted = (self.queue.len() == self.capacity)
            .then(|| self.queue.pop_front())
            .flatten();
        self.queue.push_back(event);
        evicted
    }

    pub fn take_all(&mut self) -> Vec<PipelineEvent> {
        Vec::from(std::mem::take(&mut self.queue))
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
