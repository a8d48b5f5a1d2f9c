//! Queue configuration and connection parameters.

use crate::error::ConfigurationError;
use crate::message::QueueName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Environment variable prefix for configuration overrides,
/// e.g. `MEMQUEUE__NAME=orders`.
pub const ENV_PREFIX: &str = "MEMQUEUE";

/// In-memory queue configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MemoryQueueConfig {
    /// Name of the queue, used in counter keys and log fields
    pub name: String,
    /// Pause between two iterations of a listen loop
    pub listen_poll_interval_ms: u64,
    /// How long a listen loop waits inside a single receive
    pub listen_receive_timeout_ms: u64,
}

impl Default for MemoryQueueConfig {
    fn default() -> Self {
        Self {
            name: "memory".to_string(),
            listen_poll_interval_ms: 1000,
            listen_receive_timeout_ms: 1000,
        }
    }
}

impl MemoryQueueConfig {
    /// Create configuration for a named queue with default timings
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn listen_poll_interval(&self) -> Duration {
        Duration::from_millis(self.listen_poll_interval_ms)
    }

    pub fn listen_receive_timeout(&self) -> Duration {
        Duration::from_millis(self.listen_receive_timeout_ms)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        QueueName::new(self.name.clone()).map_err(|e| ConfigurationError::Invalid {
            message: format!("name: {}", e),
        })?;

        if self.listen_poll_interval_ms == 0 {
            return Err(ConfigurationError::Invalid {
                message: "listen_poll_interval_ms must be greater than zero".to_string(),
            });
        }

        if self.listen_receive_timeout_ms == 0 {
            return Err(ConfigurationError::Invalid {
                message: "listen_receive_timeout_ms must be greater than zero".to_string(),
            });
        }

        Ok(())
    }

    /// Load configuration from an optional file overlaid with
    /// `MEMQUEUE__*` environment variables.
    ///
    /// The file format is inferred from its extension. Missing fields keep
    /// their defaults. The result is validated before it is returned.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigurationError> {
        let mut builder = config::Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(true));
        }

        let loaded: Self = builder
            .add_source(config::Environment::with_prefix(ENV_PREFIX).separator("__"))
            .build()?
            .try_deserialize()?;

        loaded.validate()?;
        Ok(loaded)
    }
}

// ============================================================================
// Connection Parameters
// ============================================================================

/// Connection parameters passed when a queue is opened.
///
/// Network-backed queues read endpoints from here. The in-memory queue
/// accepts and ignores them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    values: HashMap<String, String>,
}

impl ConnectionParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn uri(&self) -> Option<&str> {
        self.get("uri")
    }
}

/// Credential parameters passed when a queue is opened.
///
/// Values are never written to logs; `Debug` only lists the keys.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialParams {
    values: HashMap<String, String>,
}

impl CredentialParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a credential parameter
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }
}

impl std::fmt::Debug for CredentialParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("CredentialParams")
            .field("keys", &keys)
            .finish()
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
