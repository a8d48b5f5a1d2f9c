//! Performance counters collected by queues.
//!
//! Queues report events through the [`Counters`] trait so the storage of
//! measurements stays outside the queue implementation.
//!
//! # Best-Effort Pattern
//!
//! Counter updates never fail and never block queue operations for longer
//! than a short critical section.
//!
//! # Examples
//!
//! ```rust
//! use memqueue_runtime::counters::{CachedCounters, Counters};
//!
//! let counters = CachedCounters::new();
//! counters.increment_one("queue.orders.sentmessages");
//! assert_eq!(counters.get("queue.orders.sentmessages"), 1);
//! ```

use std::collections::BTreeMap;
use std::sync::{Mutex, PoisonError};

/// Counter key suffix for messages accepted by `send`
pub const SENT_MESSAGES: &str = "sentmessages";
/// Counter key suffix for messages handed out by `receive`
pub const RECEIVED_MESSAGES: &str = "receivedmessages";
/// Counter key suffix for dead-lettered messages
pub const DEAD_MESSAGES: &str = "deadmessages";

/// Build the counter key for a queue event: `queue.<queue_name>.<event>`
pub fn queue_counter_name(queue_name: &str, event: &str) -> String {
    format!("queue.{}.{}", queue_name, event)
}

/// Sink for named counters.
///
/// All methods take `&self` so a single collector can be shared as
/// `Arc<dyn Counters>` between queues and tasks.
pub trait Counters: Send + Sync {
    /// Increment the named counter by `value`
    fn increment(&self, name: &str, value: u64);

    /// Increment the named counter by one
    fn increment_one(&self, name: &str) {
        self.increment(name, 1);
    }
}

/// Counters that discard every update
#[derive(Debug, Default, Clone, Copy)]
pub struct NullCounters;

impl Counters for NullCounters {
    fn increment(&self, _name: &str, _value: u64) {}
}

/// Counters kept in memory, readable at any time
#[derive(Debug, Default)]
pub struct CachedCounters {
    values: Mutex<BTreeMap<String, u64>>,
}

impl CachedCounters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value of a counter; zero if it was never incremented
    pub fn get(&self, name: &str) -> u64 {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .copied()
            .unwrap_or(0)
    }

    /// Copy of all counters, ordered by name
    pub fn snapshot(&self) -> BTreeMap<String, u64> {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reset every counter
    pub fn clear(&self) {
        self.values
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Counters for CachedCounters {
    fn increment(&self, name: &str, value: u64) {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        let entry = values.entry(name.to_string()).or_insert(0);
        *entry = entry.saturating_add(value);
    }
}

#[cfg(test)]
#[path = "counters_tests.rs"]
mod tests;
