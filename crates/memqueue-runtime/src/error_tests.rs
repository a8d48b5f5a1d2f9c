//! Tests for error types.

use super::*;

#[test]
fn test_error_transience() {
    assert!(QueueError::ReceiverFailed {
        message_id: "abc".to_string(),
        message: "handler crashed".to_string(),
    }
    .is_transient());

    assert!(!QueueError::from(ValidationError::Required {
        field: "queue_name".to_string(),
    })
    .is_transient());

    assert!(!QueueError::from(ConfigurationError::Invalid {
        message: "bad".to_string(),
    })
    .is_transient());
}

#[test]
fn test_serialization_error_conversion() {
    let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
    let error: QueueError = SerializationError::from(json_error).into();

    assert!(matches!(
        error,
        QueueError::SerializationError(SerializationError::JsonError(_))
    ));
    assert!(error.to_string().starts_with("Serialization failed"));
}

#[test]
fn test_config_error_becomes_parsing_error() {
    let error = ConfigurationError::from(config::ConfigError::Message("boom".to_string()));
    assert!(matches!(error, ConfigurationError::Parsing { ref message } if message == "boom"));
}
