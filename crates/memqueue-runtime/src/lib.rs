//! # Memqueue Runtime
//!
//! In-process message queue with at-least-once delivery over a
//! lock/visibility-timeout protocol.
//!
//! A consumer receives a message, which stays invisible to other consumers
//! while it is locked, and then completes, abandons or dead-letters it.
//!
//! ## Module Organization
//!
//! - [error] - Error types for all queue operations
//! - [message] - Message envelope, lock tokens and identifiers
//! - [capabilities] - Operations advertised by a queue backend
//! - [config] - Queue configuration and connection parameters
//! - [counters] - Counter collaborators
//! - [client] - Queue and receiver traits
//! - [listener] - Background listen loop
//! - [providers] - Queue implementations

pub mod capabilities;
pub mod client;
pub mod config;
pub mod counters;
pub mod error;
pub mod listener;
pub mod message;
pub mod providers;

// Re-export commonly used types at crate root for convenience
pub use capabilities::MessagingCapabilities;
pub use client::{MessageQueue, MessageReceiver};
pub use config::{ConnectionParams, CredentialParams, MemoryQueueConfig};
pub use counters::{CachedCounters, Counters, NullCounters};
pub use error::{ConfigurationError, QueueError, SerializationError, ValidationError};
pub use listener::{ListenHandle, ListenOptions, ListenerState};
pub use message::{LockToken, MessageEnvelope, MessageId, QueueName, Timestamp};
pub use providers::MemoryMessageQueue;

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
