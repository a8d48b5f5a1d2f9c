//! Message envelope and the core domain identifiers used by queues.

use crate::error::{SerializationError, ValidationError};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

// ============================================================================
// Core Domain Identifiers
// ============================================================================

/// Validated queue name with length and character restrictions
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QueueName(String);

impl QueueName {
    /// Create new queue name with validation
    pub fn new(name: String) -> Result<Self, ValidationError> {
        if name.is_empty() || name.len() > 260 {
            return Err(ValidationError::OutOfRange {
                field: "queue_name".to_string(),
                message: "must be 1-260 characters".to_string(),
            });
        }

        if !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
        {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "only ASCII alphanumeric, hyphens, underscores and dots allowed"
                    .to_string(),
            });
        }

        if name.starts_with('-') || name.ends_with('-') || name.contains("--") {
            return Err(ValidationError::InvalidFormat {
                field: "queue_name".to_string(),
                message: "no leading/trailing hyphens or consecutive hyphens".to_string(),
            });
        }

        Ok(Self(name))
    }

    /// Get queue name as string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for QueueName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for QueueName {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Unique identifier stamped on an envelope when it is constructed
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Generate new random message ID
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().simple().to_string())
    }

    /// Get message ID as string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this is the empty placeholder carried by an empty envelope
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(ValidationError::Required {
                field: "message_id".to_string(),
            });
        }

        Ok(Self(s.to_string()))
    }
}

/// Reservation handle for a checked-out envelope.
///
/// Tokens are minted by a queue instance from a private counter and are
/// never reused by that instance. Each token also names the instance that
/// minted it, so a token never matches a lock held by another queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockToken {
    owner: u64,
    sequence: u64,
}

impl LockToken {
    pub(crate) fn new(owner: u64, sequence: u64) -> Self {
        Self { owner, sequence }
    }

    /// Id of the queue instance that minted the token
    pub fn owner(&self) -> u64 {
        self.owner
    }

    /// Position of the token in its queue's lock sequence
    pub fn sequence(&self) -> u64 {
        self.sequence
    }
}

impl std::fmt::Display for LockToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "lock-{}-{}", self.owner, self.sequence)
    }
}

/// Timestamp wrapper for consistent time handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create timestamp for current time
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Create timestamp from DateTime
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Get underlying DateTime
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Timestamp `duration` after this one, saturating at the maximum
    /// representable instant.
    pub fn after(&self, duration: std::time::Duration) -> Self {
        let delta = chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::MAX);
        Self(
            self.0
                .checked_add_signed(delta)
                .unwrap_or(DateTime::<Utc>::MAX_UTC),
        )
    }

    /// Whether this instant is at or before the current time
    pub fn has_passed(&self) -> bool {
        Timestamp::now() >= *self
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d %H:%M:%S%.3f UTC"))
    }
}

impl FromStr for Timestamp {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let dt = s.parse::<DateTime<Utc>>()?;
        Ok(Self::from_datetime(dt))
    }
}

// ============================================================================
// Message Envelope
// ============================================================================

/// The unit of transport through a queue.
///
/// Wraps an opaque payload with tracing and typing metadata. While the
/// envelope is checked out by a consumer it also carries the [`LockToken`]
/// of its reservation; the token is never serialized.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    /// Business transaction id used to trace calls across components
    pub correlation_id: String,
    /// Auto-generated id of this envelope
    pub message_id: MessageId,
    /// Classification tag of the payload
    pub message_type: String,
    /// Time the envelope was last accepted by a queue
    pub sent_time: Option<Timestamp>,
    /// Opaque payload
    #[serde(rename = "message", with = "bytes_serde")]
    pub payload: Bytes,
    #[serde(skip)]
    reference: Option<LockToken>,
}

/// Custom serialization for Bytes
mod bytes_serde {
    use base64::{engine::general_purpose, Engine as _};
    use bytes::Bytes;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(bytes: &Bytes, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let encoded = general_purpose::STANDARD.encode(bytes);
        encoded.serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Bytes, D::Error>
    where
        D: Deserializer<'de>,
    {
        let encoded = String::deserialize(deserializer)?;
        let decoded = general_purpose::STANDARD
            .decode(encoded)
            .map_err(serde::de::Error::custom)?;
        Ok(Bytes::from(decoded))
    }
}

impl MessageEnvelope {
    /// Create an envelope with no id, type or payload
    pub fn empty() -> Self {
        Self::default()
    }

    /// Create an envelope and mint its message id
    pub fn new(
        correlation_id: impl Into<String>,
        message_type: impl Into<String>,
        payload: impl Into<Bytes>,
    ) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            message_id: MessageId::new(),
            message_type: message_type.into(),
            sent_time: None,
            payload: payload.into(),
            reference: None,
        }
    }

    /// Create an envelope whose payload is the JSON encoding of `value`
    pub fn from_value<T: Serialize + ?Sized>(
        correlation_id: impl Into<String>,
        message_type: impl Into<String>,
        value: &T,
    ) -> Result<Self, SerializationError> {
        let payload = serde_json::to_vec(value)?;
        Ok(Self::new(correlation_id, message_type, payload))
    }

    /// Lock token of the current reservation, if checked out
    pub fn reference(&self) -> Option<LockToken> {
        self.reference
    }

    pub(crate) fn set_reference(&mut self, token: Option<LockToken>) {
        self.reference = token;
    }

    /// Payload decoded as UTF-8, replacing invalid sequences
    pub fn message_as_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }

    /// Payload decoded as UTF-8, failing on invalid sequences
    pub fn try_message_as_string(&self) -> Result<&str, SerializationError> {
        std::str::from_utf8(&self.payload).map_err(|_| SerializationError::InvalidUtf8)
    }

    /// Replace the payload with the UTF-8 bytes of `value`
    pub fn set_message_as_string(&mut self, value: impl Into<String>) {
        self.payload = Bytes::from(value.into());
    }

    /// Decode the payload as JSON.
    ///
    /// Returns `None` for an empty payload or one that does not decode into
    /// `T`; decode failures are not reported.
    pub fn message_as_json<T: DeserializeOwned>(&self) -> Option<T> {
        if self.payload.is_empty() {
            return None;
        }
        serde_json::from_slice(&self.payload).ok()
    }

    /// Replace the payload with the JSON encoding of `value`.
    ///
    /// A value encoding to JSON `null` clears the payload. If encoding fails
    /// the payload is left unchanged.
    pub fn set_message_as_json<T: Serialize + ?Sized>(&mut self, value: &T) {
        let Ok(encoded) = serde_json::to_value(value) else {
            return;
        };

        if encoded.is_null() {
            self.payload = Bytes::new();
        } else if let Ok(bytes) = serde_json::to_vec(&encoded) {
            self.payload = Bytes::from(bytes);
        }
    }

    /// Serialize the envelope's wire form
    pub fn to_json(&self) -> Result<String, SerializationError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Parse an envelope from its wire form
    pub fn from_json(json: &str) -> Result<Self, SerializationError> {
        Ok(serde_json::from_str(json)?)
    }
}

impl std::fmt::Display for MessageEnvelope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        fn or_placeholder(value: &str) -> &str {
            if value.is_empty() {
                "---"
            } else {
                value
            }
        }

        let payload = self.message_as_string();
        write!(
            f,
            "[{},{},{}]",
            or_placeholder(&self.correlation_id),
            or_placeholder(&self.message_type),
            or_placeholder(&payload)
        )
    }
}

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
