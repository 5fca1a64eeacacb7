//! Fixed-capacity, time-stamped ring buffer.

use std::collections::VecDeque;
use std::time::Instant;

/// Ring of time-stamped values that drops the oldest entry when full.
///
/// Values are expected to be pushed in time order, which is what a single
/// listener thread produces.
#[derive(Debug, Clone)]
pub struct TimedRing<T> {
    data: VecDeque<(Instant, T)>,
    capacity: usize,
}

impl<T> TimedRing<T> {
    /// Create a ring holding at most `capacity` values.
    ///
    /// # Panics
    /// Panics if capacity is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "TimedRing capacity must be > 0");
        Self {
            data: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Record `value` observed at `at`, evicting the oldest if full.
    pub fn push_at(&mut self, at: Instant, value: T) {
        if self.data.len() >= self.capacity {
            self.data.pop_front();
        }
        self.data.push_back((at, value));
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }

    /// Values observed strictly after `cutoff`, oldest first.
    pub fn since(&self, cutoff: Instant) -> impl Iterator<Item = &T> {
        self.data
            .iter()
            .filter(move |(at, _)| *at > cutoff)
            .map(|(_, value)| value)
    }

    /// All entries with their timestamps, oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &(Instant, T)> {
        self.data.iter()
    }
}
