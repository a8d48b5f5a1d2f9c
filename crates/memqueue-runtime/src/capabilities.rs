//! Capability descriptors advertised by queue backends.

use serde::{Deserialize, Serialize};

/// Operations a queue backend supports.
///
/// Negotiated once when the queue is constructed. Callers consult it before
/// invoking an operation; queues do not enforce it themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessagingCapabilities {
    pub can_message_count: bool,
    pub can_send: bool,
    pub can_receive: bool,
    pub can_peek: bool,
    pub can_peek_batch: bool,
    pub can_renew_lock: bool,
    pub can_abandon: bool,
    /// Dead-lettered messages are forwarded to a separate queue
    pub can_dead_letter: bool,
    pub can_clear: bool,
}

impl MessagingCapabilities {
    /// Capabilities of the in-memory backend.
    ///
    /// Everything is supported except forwarding to a dead-letter queue:
    /// dead-lettered messages are counted and discarded.
    pub fn in_memory() -> Self {
        Self {
            can_message_count: true,
            can_send: true,
            can_receive: true,
            can_peek: true,
            can_peek_batch: true,
            can_renew_lock: true,
            can_abandon: true,
            can_dead_letter: false,
            can_clear: true,
        }
    }
}

#[cfg(test)]
#[path = "capabilities_tests.rs"]
mod tests;
