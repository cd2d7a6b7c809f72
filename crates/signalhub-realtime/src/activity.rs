//! Human-readable activity feed items.

use chrono::{DateTime, Utc};
use serde::Serialize;

use signalhub_core::traits::ActivityRecord;

/// Feed entries sent per `activity_feed` broadcast.
pub const FEED_SIZE: i64 = 20;

const UNKNOWN_USER: &str = "Unknown User";

/// One `activity_feed` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActivityItem {
    /// Event id.
    pub id: String,
    /// Sentence describing the event.
    pub description: String,
    /// When it happened.
    #[serde(serialize_with = "crate::message::envelope::serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
    /// Raw event name.
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&ActivityRecord> for ActivityItem {
    fn from(record: &ActivityRecord) -> Self {
        Self {
            id: record.id.clone(),
            description: describe(record),
            timestamp: record.timestamp,
            kind: record.event.clone(),
        }
    }
}

/// Describe an event in one sentence.
pub fn describe(record: &ActivityRecord) -> String {
    let name = record
        .user_name
        .as_deref()
        .filter(|n| !n.is_empty())
        .unwrap_or(UNKNOWN_USER);

    match record.event.as_str() {
        "ai_request" => format!("{name} generated content with AI"),
        "user_login" => format!("{name} logged in"),
        "subscription_created" => format!("{name} upgraded their subscription"),
        "data_export" => format!("{name} exported data"),
        other => format!("{name} performed {other}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: &str, name: Option<&str>) -> ActivityRecord {
        ActivityRecord {
            id: "e1".into(),
            event: event.into(),
            user_name: name.map(str::to_string),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_known_events() {
        assert_eq!(
            describe(&record("ai_request", Some("Ada"))),
            "Ada generated content with AI"
        );
        assert_eq!(describe(&record("user_login", Some("Ada"))), "Ada logged in");
        assert_eq!(
            describe(&record("subscription_created", Some("Ada"))),
            "Ada upgraded their subscription"
        );
        assert_eq!(describe(&record("data_export", Some("Ada"))), "Ada exported data");
    }

    #[test]
    fn test_fallbacks() {
        assert_eq!(
            describe(&record("password_reset", None)),
            "Unknown User performed password_reset"
        );
    }

    #[test]
    fn test_item_serializes_type_field() {
        let item = ActivityItem::from(&record("user_login", Some("Ada")));
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value["type"], "user_login");
        assert_eq!(value["description"], "Ada logged in");
    }
}
