//! Request and response bodies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use signalhub_realtime::EngineStats;

/// Standard success wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    /// Always `true`.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T> ApiResponse<T> {
    /// Wrap `data`.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// `GET /api/health`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// `"ok"`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
}

/// `GET /api/health/detailed`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetailedHealthResponse {
    /// `"ok"` or `"degraded"`.
    pub status: String,
    /// `"connected"` or `"disconnected"`.
    pub database: String,
    /// Database round trip.
    pub database_latency_ms: Option<u64>,
    /// Engine stats.
    pub realtime: EngineStats,
}

/// `POST /api/websocket/broadcast` body.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BroadcastRequest {
    /// `notification`, `user_activity`, `ai_progress`, `admin_alert` or
    /// `activity_feed`.
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    /// Target user for `notification` and `ai_progress`.
    #[serde(default)]
    pub user_id: Option<String>,
    /// Message payload.
    #[serde(default)]
    pub data: Option<Value>,
}

/// `POST /api/websocket/broadcast` success body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BroadcastResponse {
    /// Always `true`.
    pub success: bool,
    /// `"<type> broadcast sent successfully"`.
    pub message: String,
    /// When the broadcast was sent.
    pub timestamp: DateTime<Utc>,
}
