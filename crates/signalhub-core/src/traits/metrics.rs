//! Aggregate usage metrics source.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::result::AppResult;

/// Aggregate counts read from the application database.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    /// Users with at least one event in the last 24 hours.
    pub active_users: i64,
    /// All registered users.
    pub total_users: i64,
    /// AI requests in the last hour.
    pub ai_requests: i64,
    /// Sum of succeeded payments.
    pub revenue: f64,
}

/// Produces aggregate usage metrics on demand.
#[async_trait]
pub trait MetricsSource: Send + Sync + std::fmt::Debug + 'static {
    /// Compute a fresh set of usage metrics.
    async fn collect_metrics(&self) -> AppResult<UsageMetrics>;
}
