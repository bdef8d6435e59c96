//! Bounded activity feed.
//!
//! [`EventLog`] is a fixed-capacity ring buffer: once full, each push evicts
//! the oldest event. Reads return events newest-first, which is the order
//! the activity feed renders them in.

use std::collections::VecDeque;

use microcollab_types::Event;

/// Fixed-capacity, oldest-evicted-first event buffer.
#[derive(Debug, Clone)]
pub struct EventLog {
    /// Events in arrival order (front = oldest).
    events: VecDeque<Event>,
    /// Maximum number of retained events. Always at least 1.
    capacity: usize,
    /// Total events ever pushed, including evicted ones.
    total_recorded: u64,
}

impl EventLog {
    /// Create an empty log. A capacity of 0 is raised to 1.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            events: VecDeque::with_capacity(capacity),
            capacity,
            total_recorded: 0,
        }
    }

    /// Append an event, evicting the oldest one if the log is full.
    ///
    /// Returns the evicted event, if any.
    pub fn push(&mut self, event: Event) -> Option<Event> {
        let evicted = if self.events.len() >= self.capacity {
            self.events.pop_front()
        } else {
            None
        };
        self.events.push_back(event);
        self.total_recorded = self.total_recorded.saturating_add(1);
        evicted
    }

    /// Return up to `limit` most recent events, newest first.
    pub fn recent(&self, limit: usize) -> Vec<Event> {
        self.events.iter().rev().take(limit).cloned().collect()
    }

    /// Return every retained event, newest first.
    pub fn all(&self) -> Vec<Event> {
        self.recent(self.capacity)
    }

    /// Number of retained events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the log holds no events.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Maximum number of retained events.
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    /// Total events ever recorded, including evicted ones.
    pub const fn total_recorded(&self) -> u64 {
        self.total_recorded
    }

    /// Drop every retained event. The lifetime counter is kept.
    pub fn clear(&mut self) {
        self.events.clear();
    }
}
