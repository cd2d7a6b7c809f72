//! Usage metrics snapshot.

use chrono::{DateTime, Utc};
use serde::Serialize;

use signalhub_core::traits::UsageMetrics;

/// Payload of a `metrics` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Aggregate counts.
    #[serde(flatten)]
    pub usage: UsageMetrics,
    /// When the counts were read.
    #[serde(serialize_with = "crate::message::envelope::serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl From<UsageMetrics> for MetricsSnapshot {
    fn from(usage: UsageMetrics) -> Self {
        Self {
            usage,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_camel_case_fields() {
        let snapshot = MetricsSnapshot::from(UsageMetrics {
            active_users: 3,
            total_users: 10,
            ai_requests: 7,
            revenue: 99.5,
        });
        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["activeUsers"], 3);
        assert_eq!(value["totalUsers"], 10);
        assert_eq!(value["aiRequests"], 7);
        assert_eq!(value["revenue"], 99.5);
        assert!(value["timestamp"].is_string());
    }
}
