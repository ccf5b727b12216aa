//! Lamport logical clock.
//!
//! Orders events across machines without synchronized wall clocks: every
//! local event ticks the counter, every received message folds the sender's
//! value in so the receiving event is numbered after everything it depends on.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Largest value a clock accepts from a peer. Fits a signed 64-bit peer and
/// leaves room for local ticks without wrapping.
pub const MAX_CLOCK: u64 = i64::MAX as u64;

/// Process-wide Lamport counter, shareable across threads.
///
/// All operations are single atomic read-modify-writes, so no caller ever
/// observes a half-applied update and no two calls return the same value.
#[derive(Debug, Default)]
pub struct LogicalClock {
    value: AtomicU64,
}

impl LogicalClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock resuming after `value`, e.g. the largest time found on disk.
    pub fn starting_at(value: u64) -> Self {
        Self {
            value: AtomicU64::new(value),
        }
    }

    /// Local event: increments by one and returns the new value.
    pub fn tick(&self) -> u64 {
        self.value.fetch_add(1, Ordering::AcqRel) + 1
    }

    /// Message receipt: sets the counter to `max(current, received) + 1`
    /// and returns the new value. Returns `None` and leaves the counter
    /// untouched when the result would pass `MAX_CLOCK`.
    pub fn update(&self, received: u64) -> Option<u64> {
        let next = |current: u64| {
            current
                .max(received)
                .checked_add(1)
                .filter(|next| *next <= MAX_CLOCK)
        };
        self.value
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, next)
            .ok()
            .and_then(next)
    }

    /// Current value, no side effect.
    pub fn value(&self) -> u64 {
        self.value.load(Ordering::Acquire)
    }
}

impl fmt::Display for LogicalClock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}
