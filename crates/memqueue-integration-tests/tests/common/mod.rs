//! Common test utilities for memqueue integration tests
//!
//! This module provides:
//! - A recording receiver with configurable settlement behavior
//! - Helpers for creating queues with short listen timings
//! - Polling helpers for asynchronous assertions

use async_trait::async_trait;
use memqueue_runtime::{
    MemoryMessageQueue, MemoryQueueConfig, MessageEnvelope, MessageQueue, MessageReceiver,
};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

// ============================================================================
// Recording Receiver
// ============================================================================

/// How a [`RecordingReceiver`] settles each delivery
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[allow(dead_code)]
pub enum Settlement {
    Complete,
    /// Abandon the first delivery of every message, complete the second
    AbandonFirstDelivery,
    DeadLetter,
    /// Return an error without settling
    Fail,
}

/// Receiver that records every delivery it sees
#[allow(dead_code)]
pub struct RecordingReceiver {
    settlement: Settlement,
    deliveries: Mutex<Vec<MessageEnvelope>>,
    attempts: Mutex<HashMap<String, usize>>,
}

#[allow(dead_code)]
impl RecordingReceiver {
    pub fn new(settlement: Settlement) -> Self {
        Self {
            settlement,
            deliveries: Mutex::new(Vec::new()),
            attempts: Mutex::new(HashMap::new()),
        }
    }

    /// Payloads of all deliveries in arrival order
    pub fn payloads(&self) -> Vec<String> {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .map(|m| m.message_as_string())
            .collect()
    }

    pub fn delivery_count(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    /// Number of deliveries of the message with this payload
    pub fn attempts_for(&self, payload: &str) -> usize {
        self.attempts
            .lock()
            .unwrap()
            .get(payload)
            .copied()
            .unwrap_or(0)
    }
}

#[async_trait]
impl MessageReceiver for RecordingReceiver {
    async fn receive_message(
        &self,
        envelope: &mut MessageEnvelope,
        queue: &dyn MessageQueue,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.deliveries.lock().unwrap().push(envelope.clone());
        let attempt = {
            let mut attempts = self.attempts.lock().unwrap();
            let count = attempts.entry(envelope.message_as_string()).or_insert(0);
            *count += 1;
            *count
        };

        match self.settlement {
            Settlement::Complete => queue.complete(envelope).await?,
            Settlement::AbandonFirstDelivery if attempt == 1 => queue.abandon(envelope).await?,
            Settlement::AbandonFirstDelivery => queue.complete(envelope).await?,
            Settlement::DeadLetter => queue.move_to_dead_letter(envelope).await?,
            Settlement::Fail => return Err(format!("rejected attempt {}", attempt).into()),
        }
        Ok(())
    }
}

// ============================================================================
// Queue Helpers
// ============================================================================

/// Queue whose listen loops poll every few milliseconds
#[allow(dead_code)]
pub fn create_fast_queue(name: &str) -> MemoryMessageQueue {
    let config = MemoryQueueConfig {
        name: name.to_string(),
        listen_poll_interval_ms: 5,
        listen_receive_timeout_ms: 250,
    };
    MemoryMessageQueue::from_config(config).unwrap()
}

#[allow(dead_code)]
pub fn create_envelope(payload: &str) -> MessageEnvelope {
    MessageEnvelope::new("corr", "test", payload.to_string())
}

#[allow(dead_code)]
pub async fn send_payloads(queue: &dyn MessageQueue, payloads: &[String]) {
    for payload in payloads {
        queue.send("corr", create_envelope(payload)).await.unwrap();
    }
}

/// Poll `condition` every 10ms until it holds or `timeout` passes
#[allow(dead_code)]
pub async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    condition()
}
