//! Inbound and outbound message type definitions.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::activity::ActivityItem;
use crate::snapshot::{HealthSnapshot, MetricsSnapshot};

use super::codec::ErrorCode;

/// Channels advertised to every client on connect.
pub const WELL_KNOWN_CHANNELS: [&str; 6] = [
    "metrics",
    "notification",
    "user_activity",
    "system_health",
    "ai_generation_progress",
    "admin_alerts",
];

/// Messages sent by the client to the server.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    /// Application-level ping; answered with `pong`.
    Ping {
        /// Client timestamp, echoed back verbatim.
        timestamp: Option<Value>,
    },
    /// Subscribe to a channel.
    Subscribe {
        /// Channel name.
        event_type: String,
    },
    /// Unsubscribe from a channel.
    Unsubscribe {
        /// Channel name.
        event_type: String,
    },
    /// Request a metrics snapshot.
    GetMetrics,
    /// Request a system health snapshot.
    GetSystemHealth,
    /// Any other type.
    Unknown(String),
}

/// Messages sent by the server to the client.
///
/// Serialized adjacently tagged so an [`Envelope`](super::Envelope) renders
/// as `{ "type": ..., "payload": ... }`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Welcome frame queued right after admission.
    ConnectionEstablished(ConnectionEstablishedPayload),
    /// Reply to an application ping.
    Pong(PongPayload),
    /// Subscription accepted.
    SubscriptionConfirmed(ChannelPayload),
    /// Subscription removed.
    SubscriptionCancelled(ChannelPayload),
    /// Usage metrics snapshot.
    Metrics(MetricsSnapshot),
    /// Process and database health snapshot.
    SystemHealth(HealthSnapshot),
    /// Per-user notification; payload is caller-defined.
    Notification(Value),
    /// Activity event for `user_activity` subscribers.
    UserActivity(Value),
    /// Progress of a user's AI generation job.
    AiGenerationProgress(Value),
    /// Alert for admin connections.
    AdminAlert(Value),
    /// Recent event log, formatted.
    ActivityFeed(Vec<ActivityItem>),
    /// Protocol error; the connection stays open.
    Error(ErrorPayload),
}

impl ServerMessage {
    /// The wire `type` string.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ConnectionEstablished(_) => "connection_established",
            Self::Pong(_) => "pong",
            Self::SubscriptionConfirmed(_) => "subscription_confirmed",
            Self::SubscriptionCancelled(_) => "subscription_cancelled",
            Self::Metrics(_) => "metrics",
            Self::SystemHealth(_) => "system_health",
            Self::Notification(_) => "notification",
            Self::UserActivity(_) => "user_activity",
            Self::AiGenerationProgress(_) => "ai_generation_progress",
            Self::AdminAlert(_) => "admin_alert",
            Self::ActivityFeed(_) => "activity_feed",
            Self::Error(_) => "error",
        }
    }

    /// Build an `error` message.
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Self::Error(ErrorPayload {
            code,
            message: message.into(),
        })
    }
}

/// Payload of `connection_established`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionEstablishedPayload {
    /// The admitted identity.
    pub user_id: String,
    /// Server clock at admission.
    #[serde(serialize_with = "super::envelope::serialize_timestamp")]
    pub server_time: chrono::DateTime<chrono::Utc>,
    /// Channels clients may subscribe to.
    pub available_subscriptions: Vec<String>,
}

impl ConnectionEstablishedPayload {
    /// Welcome payload for `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            server_time: chrono::Utc::now(),
            available_subscriptions: WELL_KNOWN_CHANNELS.iter().map(|c| c.to_string()).collect(),
        }
    }
}

/// Payload of `pong`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PongPayload {
    /// The client's timestamp, unchanged.
    pub timestamp: Option<Value>,
}

/// Payload naming a channel (`subscribe`, `subscription_confirmed`, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChannelPayload {
    /// Channel name.
    pub event_type: String,
}

impl ChannelPayload {
    /// Payload for `channel`.
    pub fn new(channel: impl Into<String>) -> Self {
        Self {
            event_type: channel.into(),
        }
    }
}

/// Payload of `error`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Machine-readable code.
    pub code: ErrorCode,
    /// Human-readable description.
    pub message: String,
}
