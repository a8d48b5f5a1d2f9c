//! Queue and receiver traits shared by all queue backends.

use crate::capabilities::MessagingCapabilities;
use crate::config::{ConnectionParams, CredentialParams};
use crate::error::QueueError;
use crate::listener::ListenHandle;
use crate::message::MessageEnvelope;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// Main interface for queue operations.
///
/// A consumer that receives a message holds a lock on it until it settles
/// the message with [`complete`](MessageQueue::complete),
/// [`abandon`](MessageQueue::abandon) or
/// [`move_to_dead_letter`](MessageQueue::move_to_dead_letter). While locked
/// the message is invisible to other consumers.
///
/// Settling or renewing an envelope that carries no lock, or a lock this
/// queue does not know, succeeds without doing anything.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Name of the queue
    fn name(&self) -> &str;

    /// Operations supported by this queue
    fn capabilities(&self) -> MessagingCapabilities;

    /// Whether the queue has been opened and not closed since
    fn is_open(&self) -> bool;

    /// Open the queue with connection and credential parameters
    async fn open(
        &self,
        correlation_id: &str,
        connection: Option<&ConnectionParams>,
        credential: Option<&CredentialParams>,
    ) -> Result<(), QueueError>;

    /// Close the queue and stop any running listen loop
    async fn close(&self, correlation_id: &str) -> Result<(), QueueError>;

    /// Drop all visible and locked messages
    async fn clear(&self, correlation_id: &str) -> Result<(), QueueError>;

    /// Number of messages waiting to be delivered; locked messages are not counted
    async fn read_message_count(&self) -> Result<usize, QueueError>;

    /// Append a message to the back of the queue
    async fn send(&self, correlation_id: &str, envelope: MessageEnvelope)
        -> Result<(), QueueError>;

    /// Read the message at the front of the queue without removing it
    async fn peek(&self, correlation_id: &str) -> Result<Option<MessageEnvelope>, QueueError>;

    /// Read up to `message_count` messages from the front of the queue
    /// without removing them
    async fn peek_batch(
        &self,
        correlation_id: &str,
        message_count: usize,
    ) -> Result<Vec<MessageEnvelope>, QueueError>;

    /// Take the message at the front of the queue and lock it.
    ///
    /// Waits up to `wait_timeout` for a message to arrive. Returns `None`
    /// when the timeout elapses first.
    async fn receive(
        &self,
        correlation_id: &str,
        wait_timeout: Duration,
    ) -> Result<Option<MessageEnvelope>, QueueError>;

    /// Extend the lock on a received message
    async fn renew_lock(
        &self,
        message: &MessageEnvelope,
        lock_timeout: Duration,
    ) -> Result<(), QueueError>;

    /// Permanently remove a received message after successful processing
    async fn complete(&self, message: &mut MessageEnvelope) -> Result<(), QueueError>;

    /// Return a received message to the queue for another attempt
    async fn abandon(&self, message: &mut MessageEnvelope) -> Result<(), QueueError>;

    /// Permanently remove a received message that cannot be processed
    async fn move_to_dead_letter(&self, message: &mut MessageEnvelope) -> Result<(), QueueError>;

    /// Start a background loop delivering messages to `receiver`.
    ///
    /// Must be called from within a Tokio runtime.
    fn listen(&self, correlation_id: &str, receiver: Arc<dyn MessageReceiver>) -> ListenHandle;

    /// Signal every running listen loop of this queue to stop
    fn end_listen(&self, correlation_id: &str);
}

/// Application-provided processing logic invoked by a listen loop.
///
/// # Error Handling
///
/// Errors are logged by the listen loop and do not stop it. The message
/// stays locked; receivers settle messages themselves through `queue`.
///
/// # Examples
///
/// ```rust,no_run
/// use async_trait::async_trait;
/// use memqueue_runtime::{MessageEnvelope, MessageQueue, MessageReceiver};
///
/// struct Printer;
///
/// #[async_trait]
/// impl MessageReceiver for Printer {
///     async fn receive_message(
///         &self,
///         envelope: &mut MessageEnvelope,
///         queue: &dyn MessageQueue,
///     ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
///         println!("Got {}", envelope);
///         queue.complete(envelope).await?;
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait MessageReceiver: Send + Sync {
    /// Process one delivered message
    async fn receive_message(
        &self,
        envelope: &mut MessageEnvelope,
        queue: &dyn MessageQueue,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}
