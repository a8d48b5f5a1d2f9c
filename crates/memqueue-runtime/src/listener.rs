//! Background listen loop delivering queue messages to a receiver.

use crate::client::{MessageQueue, MessageReceiver};
use crate::config::MemoryQueueConfig;
use crate::error::QueueError;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, trace};

#[cfg(test)]
#[path = "listener_tests.rs"]
mod tests;

/// Timings of a listen loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenOptions {
    /// Wait timeout passed to every receive
    pub receive_timeout: Duration,
    /// Pause after every iteration
    pub poll_interval: Duration,
}

impl From<&MemoryQueueConfig> for ListenOptions {
    fn from(config: &MemoryQueueConfig) -> Self {
        Self {
            receive_timeout: config.listen_receive_timeout(),
            poll_interval: config.listen_poll_interval(),
        }
    }
}

/// Observable state of a listen loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Running,
    Stopped,
}

/// Handle to a running listen loop
#[derive(Debug)]
pub struct ListenHandle {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl ListenHandle {
    pub fn state(&self) -> ListenerState {
        if self.task.is_finished() {
            ListenerState::Stopped
        } else {
            ListenerState::Running
        }
    }

    /// Ask this loop to stop; other loops of the same queue keep running
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    /// Wait for the loop to finish
    pub async fn join(self) {
        if let Err(e) = self.task.await {
            error!(error = %e, "Listen loop terminated abnormally");
        }
    }
}

/// Spawn a listen loop on the current Tokio runtime.
///
/// Each iteration receives one message with `options.receive_timeout`,
/// hands it to `receiver` and then pauses for `options.poll_interval`.
/// `cancel` is observed while waiting for a message, before dispatch and
/// during the pause. A message received at the moment cancellation is seen
/// is abandoned back to the queue instead of being dispatched.
pub fn spawn_listen_loop(
    queue: Arc<dyn MessageQueue>,
    correlation_id: String,
    receiver: Arc<dyn MessageReceiver>,
    options: ListenOptions,
    cancel: CancellationToken,
) -> ListenHandle {
    let loop_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        run_listen_loop(queue, correlation_id, receiver, options, loop_cancel).await;
    });

    ListenHandle { cancel, task }
}

async fn run_listen_loop(
    queue: Arc<dyn MessageQueue>,
    correlation_id: String,
    receiver: Arc<dyn MessageReceiver>,
    options: ListenOptions,
    cancel: CancellationToken,
) {
    trace!(
        correlation_id = %correlation_id,
        queue = %queue.name(),
        "Started listening messages"
    );

    while !cancel.is_cancelled() {
        let received = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = queue.receive(&correlation_id, options.receive_timeout) => result,
        };

        match received {
            Ok(Some(mut message)) => {
                if cancel.is_cancelled() {
                    if let Err(e) = queue.abandon(&mut message).await {
                        error!(
                            correlation_id = %correlation_id,
                            queue = %queue.name(),
                            error = %e,
                            "Failed to return the message after cancellation"
                        );
                    }
                    break;
                }

                if let Err(e) = receiver.receive_message(&mut message, queue.as_ref()).await {
                    let failure = QueueError::ReceiverFailed {
                        message_id: message.message_id.to_string(),
                        message: e.to_string(),
                    };
                    error!(
                        correlation_id = %correlation_id,
                        queue = %queue.name(),
                        error = %failure,
                        "Failed to process the message"
                    );
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!(
                    correlation_id = %correlation_id,
                    queue = %queue.name(),
                    error = %e,
                    "Failed to receive the message"
                );
            }
        }

        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = tokio::time::sleep(options.poll_interval) => {}
        }
    }

    trace!(
        correlation_id = %correlation_id,
        queue = %queue.name(),
        "Stopped listening messages"
    );
}
