//! Outbound message envelope.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Serialize, Serializer};

use signalhub_core::error::AppError;

use super::types::ServerMessage;

/// Frame sent to clients: `{ "type", "payload", "timestamp", "id"? }`.
///
/// `type` and `payload` come from the flattened [`ServerMessage`].
#[derive(Debug, Clone, Serialize)]
pub struct Envelope {
    /// Message type and payload.
    #[serde(flatten)]
    pub message: ServerMessage,
    /// Creation time.
    #[serde(serialize_with = "serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Correlation id echoed from the request that caused this reply.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

impl Envelope {
    /// Wrap a message with the current time.
    pub fn new(message: ServerMessage) -> Self {
        Self {
            message,
            timestamp: Utc::now(),
            id: None,
        }
    }

    /// Wrap a reply, echoing the request's correlation id.
    pub fn reply(message: ServerMessage, id: Option<String>) -> Self {
        Self {
            id,
            ..Self::new(message)
        }
    }

    /// The wire `type` of the wrapped message.
    pub fn kind(&self) -> &'static str {
        self.message.kind()
    }

    /// Serialize to a JSON text frame.
    pub fn to_json(&self) -> Result<String, AppError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// RFC 3339 with millisecond precision and a `Z` suffix.
pub(crate) fn serialize_timestamp<S: Serializer>(
    ts: &DateTime<Utc>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&ts.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::types::ChannelPayload;

    #[test]
    fn test_envelope_shape() {
        let env = Envelope::reply(
            ServerMessage::SubscriptionConfirmed(ChannelPayload::new("metrics")),
            Some("req-1".into()),
        );
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert_eq!(value["type"], "subscription_confirmed");
        assert_eq!(value["payload"]["eventType"], "metrics");
        assert_eq!(value["id"], "req-1");
        let ts = value["timestamp"].as_str().unwrap();
        assert!(ts.ends_with('Z'));
        assert!(DateTime::parse_from_rfc3339(ts).is_ok());
    }

    #[test]
    fn test_id_omitted_when_absent() {
        let env = Envelope::new(ServerMessage::Notification(serde_json::json!({"title": "hi"})));
        let value: serde_json::Value = serde_json::from_str(&env.to_json().unwrap()).unwrap();
        assert!(value.get("id").is_none());
        assert_eq!(value["payload"]["title"], "hi");
    }
}
