//! # Memqueue CLI
//!
//! Command-line interface over the in-memory queue runtime.
//!
//! This module provides CLI commands for:
//! - Running a producer/consumer demo against an in-memory queue
//! - Showing the resolved queue configuration

use async_trait::async_trait;
use clap::{Parser, Subcommand};
use memqueue_runtime::counters::{
    queue_counter_name, DEAD_MESSAGES, RECEIVED_MESSAGES, SENT_MESSAGES,
};
use memqueue_runtime::{
    CachedCounters, ConfigurationError, MemoryMessageQueue, MemoryQueueConfig, MessageEnvelope,
    MessageQueue, MessageReceiver, QueueError,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use tracing::{debug, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// CLI Structure
// ============================================================================

/// Memqueue CLI - in-process message queue with lock-based delivery
#[derive(Parser)]
#[command(name = "memqueue")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "In-process message queue with lock-based delivery")]
pub struct Cli {
    /// Configuration file path
    #[arg(short, long, env = "MEMQUEUE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Logging level
    #[arg(short, long, default_value = "info")]
    pub log_level: String,

    /// Enable JSON logging
    #[arg(long)]
    pub json_logs: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Send messages and consume them with a listen loop
    Demo {
        /// Number of messages to send
        #[arg(short, long, default_value = "10")]
        messages: usize,

        /// Message type stamped on every envelope
        #[arg(short = 't', long, default_value = "demo")]
        message_type: String,

        /// Dead-letter every k-th message instead of completing it
        #[arg(short, long)]
        fail_every: Option<usize>,

        /// Seconds to wait for the queue to drain
        #[arg(long, default_value = "60")]
        timeout: u64,
    },

    /// Show the resolved configuration
    Config {
        /// Output format
        #[arg(short = 'f', long, default_value = "toml")]
        format: ConfigFormat,
    },
}

/// Configuration format options
#[derive(Clone, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum ConfigFormat {
    /// JSON format
    Json,
    /// TOML format
    Toml,
}

// ============================================================================
// CLI Error Types
// ============================================================================

/// CLI-specific errors
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Command failed: {message}")]
    CommandFailed { message: String },

    #[error("Invalid argument: {arg} - {message}")]
    InvalidArgument { arg: String, message: String },
}

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("{0}")]
    Invalid(#[from] ConfigurationError),

    #[error("Failed to render configuration: {message}")]
    Render { message: String },
}

// ============================================================================
// Main Entry Point
// ============================================================================

/// Main CLI entry point
pub async fn run_cli() -> Result<(), CliError> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    execute(cli).await
}

/// Execute a parsed command line, printing command output to stdout
pub async fn execute(cli: Cli) -> Result<(), CliError> {
    let config = load_configuration(cli.config.as_deref())?;

    match cli.command {
        Commands::Demo {
            messages,
            message_type,
            fail_every,
            timeout,
        } => {
            let options = DemoOptions {
                messages,
                message_type,
                fail_every,
                timeout: Duration::from_secs(timeout),
            };
            let summary = execute_demo_command(&config, options).await?;
            println!("{}", summary);
        }
        Commands::Config { format } => {
            println!("{}", render_config(&config, &format)?);
        }
    }

    Ok(())
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `--log-level`. Logs are written to
/// stderr so command output on stdout stays machine readable.
pub fn initialize_logging(cli: &Cli) -> Result<(), CliError> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&cli.log_level))
        .map_err(|e| CliError::InvalidArgument {
            arg: "log-level".to_string(),
            message: e.to_string(),
        })?;

    let json = cli.json_logs;
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json().with_writer(std::io::stderr)))
        .with((!json).then(|| fmt::layer().with_writer(std::io::stderr)))
        .try_init()
        .map_err(|e| CliError::CommandFailed {
            message: format!("failed to initialize logging: {}", e),
        })
}

/// Load configuration from an optional file and `MEMQUEUE__*` variables
pub fn load_configuration(path: Option<&Path>) -> Result<MemoryQueueConfig, ConfigError> {
    if let Some(path) = path {
        if !path.exists() {
            return Err(ConfigError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    Ok(MemoryQueueConfig::load(path)?)
}

/// Render configuration in the requested format
pub fn render_config(
    config: &MemoryQueueConfig,
    format: &ConfigFormat,
) -> Result<String, ConfigError> {
    match format {
        ConfigFormat::Json => {
            serde_json::to_string_pretty(config).map_err(|e| ConfigError::Render {
                message: e.to_string(),
            })
        }
        ConfigFormat::Toml => toml::to_string_pretty(config).map_err(|e| ConfigError::Render {
            message: e.to_string(),
        }),
    }
}

// ============================================================================
// Demo Command
// ============================================================================

/// Parameters of a demo run
#[derive(Debug, Clone)]
pub struct DemoOptions {
    pub messages: usize,
    pub message_type: String,
    pub fail_every: Option<usize>,
    pub timeout: Duration,
}

/// Payload carried by demo messages
#[derive(Debug, Clone, Serialize, Deserialize)]
struct DemoPayload {
    sequence: usize,
    text: String,
}

/// Outcome of a demo run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DemoSummary {
    pub queue: String,
    pub sent: u64,
    pub received: u64,
    pub completed: usize,
    pub dead_lettered: u64,
}

impl std::fmt::Display for DemoSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Queue:         {}", self.queue)?;
        writeln!(f, "Sent:          {}", self.sent)?;
        writeln!(f, "Received:      {}", self.received)?;
        writeln!(f, "Completed:     {}", self.completed)?;
        write!(f, "Dead-lettered: {}", self.dead_lettered)
    }
}

/// Receiver settling demo messages by their sequence number
struct DemoReceiver {
    fail_every: Option<usize>,
    processed: AtomicUsize,
    completed: AtomicUsize,
    progress: Notify,
}

impl DemoReceiver {
    fn new(fail_every: Option<usize>) -> Self {
        Self {
            fail_every,
            processed: AtomicUsize::new(0),
            completed: AtomicUsize::new(0),
            progress: Notify::new(),
        }
    }

    async fn wait_for(&self, count: usize) {
        while self.processed.load(Ordering::Acquire) < count {
            self.progress.notified().await;
        }
    }
}

#[async_trait]
impl MessageReceiver for DemoReceiver {
    async fn receive_message(
        &self,
        envelope: &mut MessageEnvelope,
        queue: &dyn MessageQueue,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        let sequence = envelope
            .message_as_json::<DemoPayload>()
            .map(|payload| payload.sequence);

        // Unreadable payloads are dead-lettered too
        let dead_letter = match (sequence, self.fail_every) {
            (Some(sequence), Some(k)) => sequence % k == 0,
            (Some(_), None) => false,
            (None, _) => true,
        };

        if dead_letter {
            queue.move_to_dead_letter(envelope).await?;
        } else {
            queue.complete(envelope).await?;
            self.completed.fetch_add(1, Ordering::AcqRel);
        }

        debug!(
            correlation_id = %envelope.correlation_id,
            message_id = %envelope.message_id,
            dead_lettered = dead_letter,
            "Processed demo message"
        );

        self.processed.fetch_add(1, Ordering::AcqRel);
        self.progress.notify_one();
        Ok(())
    }
}

/// Send `options.messages` envelopes and consume them with a listen loop
pub async fn execute_demo_command(
    config: &MemoryQueueConfig,
    options: DemoOptions,
) -> Result<DemoSummary, CliError> {
    if options.fail_every == Some(0) {
        return Err(CliError::InvalidArgument {
            arg: "fail-every".to_string(),
            message: "must be greater than zero".to_string(),
        });
    }

    let correlation_id = uuid::Uuid::new_v4().to_string();
    let counters = Arc::new(CachedCounters::new());
    let queue = MemoryMessageQueue::from_config(config.clone())?.with_counters(counters.clone());

    queue.open(&correlation_id, None, None).await?;

    for sequence in 1..=options.messages {
        let payload = DemoPayload {
            sequence,
            text: format!("message {} of {}", sequence, options.messages),
        };
        let envelope =
            MessageEnvelope::from_value(&correlation_id, &options.message_type, &payload)
                .map_err(QueueError::from)?;
        queue.send(&correlation_id, envelope).await?;
    }

    info!(
        correlation_id = %correlation_id,
        queue = %queue.name(),
        messages = options.messages,
        fail_every = ?options.fail_every,
        "Sent demo messages, starting listener"
    );

    let receiver = Arc::new(DemoReceiver::new(options.fail_every));
    let handle = queue.listen(&correlation_id, receiver.clone());

    let drained = tokio::time::timeout(options.timeout, receiver.wait_for(options.messages))
        .await
        .is_ok();

    queue.close(&correlation_id).await?;
    handle.join().await;

    if !drained {
        return Err(CliError::CommandFailed {
            message: format!(
                "queue did not drain within {}s: {} of {} messages processed",
                options.timeout.as_secs(),
                receiver.processed.load(Ordering::Acquire),
                options.messages
            ),
        });
    }

    let name = queue.name();
    let summary = DemoSummary {
        queue: name.to_string(),
        sent: counters.get(&queue_counter_name(name, SENT_MESSAGES)),
        received: counters.get(&queue_counter_name(name, RECEIVED_MESSAGES)),
        completed: receiver.completed.load(Ordering::Acquire),
        dead_lettered: counters.get(&queue_counter_name(name, DEAD_MESSAGES)),
    };

    info!(
        correlation_id = %correlation_id,
        queue = %summary.queue,
        completed = summary.completed,
        dead_lettered = summary.dead_lettered,
        "Demo finished"
    );
    Ok(summary)
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
