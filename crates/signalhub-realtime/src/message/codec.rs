//! Inbound frame decoding and validation.
//!
//! Decoding is two-step: the frame is first read as a loose envelope with a
//! string `type` and an untyped `payload`, then the payload is parsed for the
//! types we recognize. Unrecognized types survive as
//! [`ClientMessage::Unknown`] so the caller can answer with
//! `UNKNOWN_MESSAGE_TYPE` instead of a generic parse failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::types::{ChannelPayload, ClientMessage};

/// Longest accepted channel name.
const MAX_CHANNEL_NAME_LEN: usize = 128;

/// Protocol error codes carried in `error` frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Frame exceeds `max_message_bytes`.
    MessageTooLarge,
    /// Not JSON, not an object, or no string `type`.
    InvalidMessage,
    /// Recognized type with a payload of the wrong shape.
    InvalidPayload,
    /// `type` is not one the server handles.
    UnknownMessageType,
    /// Channel name is empty, too long or has illegal characters.
    InvalidChannel,
    /// Subscription limit reached.
    MaxSubscriptions,
    /// The connection is no longer registered.
    SubscriptionFailed,
    /// The metrics source failed.
    MetricsUnavailable,
    /// The health snapshot could not be built.
    HealthUnavailable,
}

impl ErrorCode {
    /// Wire representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MessageTooLarge => "MESSAGE_TOO_LARGE",
            Self::InvalidMessage => "INVALID_MESSAGE",
            Self::InvalidPayload => "INVALID_PAYLOAD",
            Self::UnknownMessageType => "UNKNOWN_MESSAGE_TYPE",
            Self::InvalidChannel => "INVALID_CHANNEL",
            Self::MaxSubscriptions => "MAX_SUBSCRIPTIONS",
            Self::SubscriptionFailed => "SUBSCRIPTION_FAILED",
            Self::MetricsUnavailable => "METRICS_UNAVAILABLE",
            Self::HealthUnavailable => "HEALTH_UNAVAILABLE",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A request the server answers with an `error` frame.
#[derive(Debug, Clone, Error)]
#[error("{code}: {message}")]
pub struct ProtocolError {
    /// Error code.
    pub code: ErrorCode,
    /// Description sent to the client.
    pub message: String,
    /// Correlation id of the offending frame, when it could be read.
    pub id: Option<String>,
}

impl ProtocolError {
    /// Create a protocol error without a correlation id.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            id: None,
        }
    }

    fn with_id(mut self, id: Option<String>) -> Self {
        self.id = id;
        self
    }
}

/// A decoded client frame.
#[derive(Debug, Clone, PartialEq)]
pub struct InboundFrame {
    /// Correlation id, echoed on replies.
    pub id: Option<String>,
    /// The request.
    pub message: ClientMessage,
}

/// Loose first-pass shape of an inbound frame.
#[derive(Debug, Deserialize)]
struct RawEnvelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    payload: Value,
    #[serde(default)]
    timestamp: Option<Value>,
    #[serde(default)]
    id: Option<Value>,
}

/// Decode one text frame.
pub fn decode_client(raw: &str, max_bytes: usize) -> Result<InboundFrame, ProtocolError> {
    if raw.len() > max_bytes {
        return Err(ProtocolError::new(
            ErrorCode::MessageTooLarge,
            format!("Message exceeds maximum size of {max_bytes} bytes"),
        ));
    }

    if raw.trim().is_empty() {
        return Err(ProtocolError::new(ErrorCode::InvalidMessage, "Empty message"));
    }

    let envelope: RawEnvelope = serde_json::from_str(raw)
        .map_err(|_| ProtocolError::new(ErrorCode::InvalidMessage, "Invalid message format"))?;

    let id = envelope.id.and_then(|id| match id {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    });

    let message = match envelope.kind.as_str() {
        "ping" => ClientMessage::Ping {
            timestamp: envelope
                .timestamp
                .or_else(|| envelope.payload.get("timestamp").cloned()),
        },
        "subscribe" => ClientMessage::Subscribe {
            event_type: channel_from_payload(envelope.payload).map_err(|e| e.with_id(id.clone()))?,
        },
        "unsubscribe" => ClientMessage::Unsubscribe {
            event_type: channel_from_payload(envelope.payload).map_err(|e| e.with_id(id.clone()))?,
        },
        "get_metrics" => ClientMessage::GetMetrics,
        "get_system_health" => ClientMessage::GetSystemHealth,
        other => ClientMessage::Unknown(other.to_string()),
    };

    Ok(InboundFrame { id, message })
}

fn channel_from_payload(payload: Value) -> Result<String, ProtocolError> {
    let ChannelPayload { event_type } = serde_json::from_value(payload).map_err(|_| {
        ProtocolError::new(
            ErrorCode::InvalidPayload,
            "Payload must be an object with a string eventType",
        )
    })?;
    validate_channel_name(&event_type)?;
    Ok(event_type)
}

/// Channel names are 1 to 128 characters of `[A-Za-z0-9:_-]`.
pub fn validate_channel_name(channel: &str) -> Result<(), ProtocolError> {
    if channel.is_empty() || channel.len() > MAX_CHANNEL_NAME_LEN {
        return Err(ProtocolError::new(
            ErrorCode::InvalidChannel,
            "Invalid channel name length",
        ));
    }

    if !channel
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == ':' || c == '-' || c == '_')
    {
        return Err(ProtocolError::new(
            ErrorCode::InvalidChannel,
            "Channel name contains invalid characters",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAX: usize = 1024;

    #[test]
    fn test_decodes_subscribe_with_id() {
        let frame = decode_client(
            r#"{"type":"subscribe","payload":{"eventType":"metrics"},"id":"a1"}"#,
            MAX,
        )
        .unwrap();
        assert_eq!(frame.id.as_deref(), Some("a1"));
        assert_eq!(
            frame.message,
            ClientMessage::Subscribe {
                event_type: "metrics".into()
            }
        );
    }

    #[test]
    fn test_ping_echoes_top_level_timestamp() {
        let frame = decode_client(r#"{"type":"ping","timestamp":1700000000000}"#, MAX).unwrap();
        assert_eq!(
            frame.message,
            ClientMessage::Ping {
                timestamp: Some(serde_json::json!(1700000000000u64))
            }
        );
    }

    #[test]
    fn test_numeric_id_is_stringified() {
        let frame = decode_client(r#"{"type":"get_metrics","id":7}"#, MAX).unwrap();
        assert_eq!(frame.id.as_deref(), Some("7"));
        assert_eq!(frame.message, ClientMessage::GetMetrics);
    }

    #[test]
    fn test_oversized_frame() {
        let raw = format!(r#"{{"type":"ping","pad":"{}"}}"#, "x".repeat(MAX));
        let err = decode_client(&raw, MAX).unwrap_err();
        assert_eq!(err.code, ErrorCode::MessageTooLarge);
    }

    #[test]
    fn test_malformed_and_missing_type() {
        for raw in ["not json", "[]", r#"{"payload":{}}"#, r#"{"type":5}"#, "   "] {
            let err = decode_client(raw, MAX).unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidMessage, "input: {raw}");
        }
    }

    #[test]
    fn test_bad_subscribe_payload() {
        let err = decode_client(r#"{"type":"subscribe","payload":{"channel":"x"},"id":"9"}"#, MAX)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidPayload);
        assert_eq!(err.id.as_deref(), Some("9"));
    }

    #[test]
    fn test_invalid_channel_names() {
        let long = "a".repeat(MAX_CHANNEL_NAME_LEN + 1);
        for name in ["", "has space", "emoji🙂", long.as_str()] {
            assert_eq!(
                validate_channel_name(name).unwrap_err().code,
                ErrorCode::InvalidChannel
            );
        }
        assert!(validate_channel_name("team:42_live-feed").is_ok());
    }

    #[test]
    fn test_unknown_type_is_preserved() {
        let frame = decode_client(r#"{"type":"dance"}"#, MAX).unwrap();
        assert_eq!(frame.message, ClientMessage::Unknown("dance".into()));
    }
}
