//! In-memory queue implementation for testing and development.
//!
//! This module provides a queue that delivers messages within the same
//! process using shared memory. It:
//! - Delivers messages in FIFO order of sending
//! - Locks received messages until they are completed, abandoned or
//!   dead-lettered
//! - Wakes waiting receivers as soon as a message is sent
//! - Provides thread-safe concurrent access
//!
//! Lock expiry is advisory. Nothing sweeps the lock table in the
//! background; an expired lock keeps its message invisible until the holder
//! settles it or [`MemoryMessageQueue::release_expired_locks`] is called.

use crate::capabilities::MessagingCapabilities;
use crate::client::{MessageQueue, MessageReceiver};
use crate::config::{ConnectionParams, CredentialParams, MemoryQueueConfig};
use crate::counters::{
    queue_counter_name, Counters, NullCounters, DEAD_MESSAGES, RECEIVED_MESSAGES, SENT_MESSAGES,
};
use crate::error::QueueError;
use crate::listener::{spawn_listen_loop, ListenHandle, ListenOptions};
use crate::message::{LockToken, MessageEnvelope, QueueName, Timestamp};
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;
use tokio::sync::Notify;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;

/// Source of per-instance ids so lock tokens of different queues never match
static NEXT_INSTANCE_ID: AtomicU64 = AtomicU64::new(1);

/// Stand-in deadline for waits too long to represent
const FAR_FUTURE: Duration = Duration::from_secs(60 * 60 * 24 * 365 * 30);

// ============================================================================
// Internal Storage Structures
// ============================================================================

/// Visible and locked messages, always mutated together
struct QueueStorage {
    /// Messages waiting for delivery (FIFO order)
    visible: VecDeque<MessageEnvelope>,
    /// Checked-out messages keyed by their lock token
    locked: HashMap<LockToken, LockedMessage>,
    /// Sequence of the next lock token; never rewinds
    next_lock_sequence: u64,
}

impl QueueStorage {
    fn new() -> Self {
        Self {
            visible: VecDeque::new(),
            locked: HashMap::new(),
            next_lock_sequence: 0,
        }
    }

    fn mint_lock_token(&mut self, instance_id: u64) -> LockToken {
        let token = LockToken::new(instance_id, self.next_lock_sequence);
        self.next_lock_sequence += 1;
        token
    }

    fn enqueue(&mut self, mut envelope: MessageEnvelope) {
        envelope.sent_time = Some(Timestamp::now());
        envelope.set_reference(None);
        self.visible.push_back(envelope);
    }

    /// Drop the lock for `token` and, if it is still live, put `message`
    /// back at the end of the queue
    fn abandon(&mut self, token: LockToken, message: &MessageEnvelope) -> AbandonOutcome {
        let Some(lock) = self.locked.remove(&token) else {
            return AbandonOutcome::UnknownLock;
        };
        if lock.is_expired() {
            return AbandonOutcome::Expired;
        }

        self.enqueue(message.clone());
        AbandonOutcome::Requeued
    }
}

enum AbandonOutcome {
    UnknownLock,
    Expired,
    Requeued,
}

/// A message currently checked out by a consumer
struct LockedMessage {
    message: MessageEnvelope,
    expiration_time: Timestamp,
    /// Duration used for every renewal
    timeout: Duration,
}

impl LockedMessage {
    fn is_expired(&self) -> bool {
        self.expiration_time.has_passed()
    }
}

/// State shared by every clone of a queue
struct SharedState {
    instance_id: u64,
    storage: RwLock<QueueStorage>,
    /// Woken whenever messages become visible
    message_available: Notify,
    opened: AtomicBool,
    /// Parent of the cancellation tokens handed to listen loops
    listen_cancel: Mutex<CancellationToken>,
}

// ============================================================================
// MemoryMessageQueue
// ============================================================================

/// Message queue that keeps all messages in process memory.
///
/// Cloning is cheap; clones share the same messages and locks.
///
/// # Examples
///
/// ```rust
/// use memqueue_runtime::{MemoryMessageQueue, MessageEnvelope, MessageQueue};
/// use std::time::Duration;
///
/// # tokio_test::block_on(async {
/// let queue = MemoryMessageQueue::new("orders".parse().unwrap());
/// queue.open("123", None, None).await.unwrap();
///
/// queue
///     .send("123", MessageEnvelope::new("123", "order", "ABC"))
///     .await
///     .unwrap();
///
/// let mut message = queue
///     .receive("123", Duration::from_secs(1))
///     .await
///     .unwrap()
///     .unwrap();
/// assert_eq!(message.message_as_string(), "ABC");
///
/// queue.complete(&mut message).await.unwrap();
/// # });
/// ```
#[derive(Clone)]
pub struct MemoryMessageQueue {
    config: MemoryQueueConfig,
    capabilities: MessagingCapabilities,
    counters: Arc<dyn Counters>,
    shared: Arc<SharedState>,
}

impl MemoryMessageQueue {
    /// Create a queue with default listen timings
    pub fn new(name: QueueName) -> Self {
        Self::with_config(MemoryQueueConfig::named(name.as_str()))
    }

    /// Create a queue from validated configuration
    pub fn from_config(config: MemoryQueueConfig) -> Result<Self, QueueError> {
        config.validate()?;
        Ok(Self::with_config(config))
    }

    fn with_config(config: MemoryQueueConfig) -> Self {
        Self {
            config,
            capabilities: MessagingCapabilities::in_memory(),
            counters: Arc::new(NullCounters),
            shared: Arc::new(SharedState {
                instance_id: NEXT_INSTANCE_ID.fetch_add(1, Ordering::Relaxed),
                storage: RwLock::new(QueueStorage::new()),
                message_available: Notify::new(),
                opened: AtomicBool::new(false),
                listen_cancel: Mutex::new(CancellationToken::new()),
            }),
        }
    }

    /// Report queue events to `counters`
    pub fn with_counters(mut self, counters: Arc<dyn Counters>) -> Self {
        self.counters = counters;
        self
    }

    pub fn config(&self) -> &MemoryQueueConfig {
        &self.config
    }

    /// Number of messages currently locked by consumers
    pub fn read_locked_count(&self) -> usize {
        self.storage().locked.len()
    }

    /// Expiration time of a lock held by this queue
    pub fn lock_expiration(&self, token: LockToken) -> Option<Timestamp> {
        self.storage()
            .locked
            .get(&token)
            .map(|lock| lock.expiration_time)
    }

    /// Return the messages of all expired locks to the back of the queue.
    ///
    /// Envelopes still held by consumers keep their stale token; settling
    /// them afterwards does nothing. Returns the number of messages moved.
    pub fn release_expired_locks(&self, correlation_id: &str) -> usize {
        let released = {
            let mut storage = self.storage_mut();
            let mut expired: Vec<LockToken> = storage
                .locked
                .iter()
                .filter(|(_, lock)| lock.is_expired())
                .map(|(token, _)| *token)
                .collect();
            expired.sort();

            for token in &expired {
                if let Some(lock) = storage.locked.remove(token) {
                    storage.enqueue(lock.message);
                }
            }
            expired.len()
        };

        if released > 0 {
            self.shared.message_available.notify_waiters();
            self.counters.increment(
                &queue_counter_name(self.name(), SENT_MESSAGES),
                released as u64,
            );
        }

        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            released = released,
            "Released expired locks"
        );
        released
    }

    fn storage(&self) -> RwLockReadGuard<'_, QueueStorage> {
        self.shared
            .storage
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn storage_mut(&self) -> RwLockWriteGuard<'_, QueueStorage> {
        self.shared
            .storage
            .write()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether `token` was minted by this queue instance
    fn owns(&self, token: LockToken) -> bool {
        token.owner() == self.shared.instance_id
    }

    /// Pop the front message and lock it in one critical section
    fn lock_next(&self, lock_timeout: Duration) -> Option<MessageEnvelope> {
        let mut storage = self.storage_mut();
        let mut message = storage.visible.pop_front()?;

        let token = storage.mint_lock_token(self.shared.instance_id);
        message.set_reference(Some(token));
        storage.locked.insert(
            token,
            LockedMessage {
                message: message.clone(),
                expiration_time: Timestamp::now().after(lock_timeout),
                timeout: lock_timeout,
            },
        );

        Some(message)
    }

    /// Remove the lock referenced by `message` and clear its reference.
    ///
    /// Tokens of other queues are left untouched.
    fn release_lock(&self, message: &mut MessageEnvelope) -> Option<LockedMessage> {
        let token = message.reference()?;
        if !self.owns(token) {
            return None;
        }

        message.set_reference(None);
        self.storage_mut().locked.remove(&token)
    }

    fn enqueue(&self, correlation_id: &str, envelope: MessageEnvelope) {
        let rendered = envelope.to_string();
        self.storage_mut().enqueue(envelope);
        self.announce_sent(correlation_id, &rendered);
    }

    /// Wake receivers and record a message that became visible.
    ///
    /// Called after the storage guard is released.
    fn announce_sent(&self, correlation_id: &str, rendered: &str) {
        self.shared.message_available.notify_waiters();

        self.counters
            .increment_one(&queue_counter_name(self.name(), SENT_MESSAGES));
        debug!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            "Sent message {} via {}",
            rendered,
            self
        );
    }

    /// Parent token for new listen loops, replacing a cancelled one
    fn listen_token(&self) -> CancellationToken {
        let mut current = self
            .shared
            .listen_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if current.is_cancelled() {
            *current = CancellationToken::new();
        }
        current.clone()
    }
}

impl std::fmt::Display for MemoryMessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "memory-queue({})", self.config.name)
    }
}

impl std::fmt::Debug for MemoryMessageQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryMessageQueue")
            .field("name", &self.config.name)
            .field("instance_id", &self.shared.instance_id)
            .field("opened", &self.is_open())
            .finish()
    }
}

#[async_trait]
impl MessageQueue for MemoryMessageQueue {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn capabilities(&self) -> MessagingCapabilities {
        self.capabilities
    }

    fn is_open(&self) -> bool {
        self.shared.opened.load(Ordering::Acquire)
    }

    /// Connection and credential parameters are ignored
    async fn open(
        &self,
        correlation_id: &str,
        connection: Option<&ConnectionParams>,
        _credential: Option<&CredentialParams>,
    ) -> Result<(), QueueError> {
        self.shared.opened.store(true, Ordering::Release);
        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            uri = ?connection.and_then(|c| c.uri()),
            "Opened queue {}",
            self
        );
        Ok(())
    }

    async fn close(&self, correlation_id: &str) -> Result<(), QueueError> {
        self.shared.opened.store(false, Ordering::Release);
        self.end_listen(correlation_id);
        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            "Closed queue {}",
            self
        );
        Ok(())
    }

    async fn clear(&self, correlation_id: &str) -> Result<(), QueueError> {
        {
            let mut storage = self.storage_mut();
            storage.visible.clear();
            storage.locked.clear();
        }
        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            "Cleared queue {}",
            self
        );
        Ok(())
    }

    async fn read_message_count(&self) -> Result<usize, QueueError> {
        Ok(self.storage().visible.len())
    }

    async fn send(
        &self,
        correlation_id: &str,
        envelope: MessageEnvelope,
    ) -> Result<(), QueueError> {
        self.enqueue(correlation_id, envelope);
        Ok(())
    }

    async fn peek(&self, correlation_id: &str) -> Result<Option<MessageEnvelope>, QueueError> {
        let message = self.storage().visible.front().cloned();
        if let Some(ref message) = message {
            trace!(
                correlation_id = %correlation_id,
                queue = %self.name(),
                "Peeked message {} on {}",
                message,
                self
            );
        }
        Ok(message)
    }

    /// Returns the available prefix when fewer than `message_count`
    /// messages are visible
    async fn peek_batch(
        &self,
        correlation_id: &str,
        message_count: usize,
    ) -> Result<Vec<MessageEnvelope>, QueueError> {
        let messages: Vec<MessageEnvelope> = self
            .storage()
            .visible
            .iter()
            .take(message_count)
            .cloned()
            .collect();
        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            "Peeked {} messages on {}",
            messages.len(),
            self
        );
        Ok(messages)
    }

    /// The lock taken on a received message expires after `wait_timeout`
    async fn receive(
        &self,
        correlation_id: &str,
        wait_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>, QueueError> {
        let now = Instant::now();
        let deadline = now
            .checked_add(wait_timeout)
            .unwrap_or_else(|| now + FAR_FUTURE);

        loop {
            // Register for wake-ups before looking so a send in between is not missed
            let notified = self.shared.message_available.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(message) = self.lock_next(wait_timeout) {
                self.counters
                    .increment_one(&queue_counter_name(self.name(), RECEIVED_MESSAGES));
                debug!(
                    correlation_id = %correlation_id,
                    queue = %self.name(),
                    lock = ?message.reference(),
                    "Received message {} via {}",
                    message,
                    self
                );
                return Ok(Some(message));
            }

            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return Ok(None);
            }
        }
    }

    /// Extends the lock by the timeout recorded when the message was
    /// received; `lock_timeout` is not used. Expired locks are not renewed.
    async fn renew_lock(
        &self,
        message: &MessageEnvelope,
        _lock_timeout: Duration,
    ) -> Result<(), QueueError> {
        let Some(token) = message.reference() else {
            return Ok(());
        };
        if !self.owns(token) {
            return Ok(());
        }

        let renewed = match self.storage_mut().locked.get_mut(&token) {
            Some(lock) if !lock.is_expired() => {
                lock.expiration_time = Timestamp::now().after(lock.timeout);
                true
            }
            _ => false,
        };

        trace!(
            correlation_id = %message.correlation_id,
            queue = %self.name(),
            lock = %token,
            renewed = renewed,
            "Renewed lock for message {} at {}",
            message,
            self
        );
        Ok(())
    }

    async fn complete(&self, message: &mut MessageEnvelope) -> Result<(), QueueError> {
        if self.release_lock(message).is_some() {
            trace!(
                correlation_id = %message.correlation_id,
                queue = %self.name(),
                "Completed message {} at {}",
                message,
                self
            );
        }
        Ok(())
    }

    /// Messages whose lock already expired are dropped instead of requeued
    async fn abandon(&self, message: &mut MessageEnvelope) -> Result<(), QueueError> {
        let Some(token) = message.reference() else {
            return Ok(());
        };
        if !self.owns(token) {
            return Ok(());
        }

        message.set_reference(None);
        // Lock removal and requeue share one critical section so a
        // concurrent clear sees either both or neither
        let outcome = self.storage_mut().abandon(token, message);

        match outcome {
            AbandonOutcome::UnknownLock => {}
            AbandonOutcome::Expired => {
                trace!(
                    correlation_id = %message.correlation_id,
                    queue = %self.name(),
                    "Skipped abandoning message {} at {}: lock expired",
                    message,
                    self
                );
            }
            AbandonOutcome::Requeued => {
                trace!(
                    correlation_id = %message.correlation_id,
                    queue = %self.name(),
                    "Abandoned message {} at {}",
                    message,
                    self
                );
                self.announce_sent(&message.correlation_id, &message.to_string());
            }
        }
        Ok(())
    }

    async fn move_to_dead_letter(&self, message: &mut MessageEnvelope) -> Result<(), QueueError> {
        if self.release_lock(message).is_some() {
            self.counters
                .increment_one(&queue_counter_name(self.name(), DEAD_MESSAGES));
            trace!(
                correlation_id = %message.correlation_id,
                queue = %self.name(),
                "Moved to dead letter message {} at {}",
                message,
                self
            );
        }
        Ok(())
    }

    fn listen(&self, correlation_id: &str, receiver: Arc<dyn MessageReceiver>) -> ListenHandle {
        let cancel = self.listen_token().child_token();
        spawn_listen_loop(
            Arc::new(self.clone()),
            correlation_id.to_string(),
            receiver,
            ListenOptions::from(&self.config),
            cancel,
        )
    }

    fn end_listen(&self, correlation_id: &str) {
        self.shared
            .listen_cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .cancel();
        trace!(
            correlation_id = %correlation_id,
            queue = %self.name(),
            "Requested end of listening at {}",
            self
        );
    }
}
