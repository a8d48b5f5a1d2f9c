//! Queue implementations.
//!
//! This module contains concrete implementations of the `MessageQueue`
//! trait for different queue backends.

pub mod memory;

pub use memory::MemoryMessageQueue;
