//! Persisted event log access.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// One persisted user event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    /// Event id.
    pub id: String,
    /// Event name, e.g. `user_login`.
    pub event: String,
    /// Display name of the acting user, if known.
    pub user_name: Option<String>,
    /// When the event happened.
    pub timestamp: DateTime<Utc>,
}

/// Reads the most recent events.
#[async_trait]
pub trait ActivitySource: Send + Sync + std::fmt::Debug + 'static {
    /// Return up to `limit` events, newest first.
    async fn recent_activity(&self, limit: i64) -> AppResult<Vec<ActivityRecord>>;
}
