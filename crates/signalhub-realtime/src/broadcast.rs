//! Server-initiated pushes: notifications, activity, AI progress, alerts.

use serde_json::Value;
use tracing::debug;

use signalhub_core::error::AppError;

use crate::activity::{ActivityItem, FEED_SIZE};
use crate::engine::RealtimeEngine;
use crate::message::{Envelope, ServerMessage};

/// Channel that receives `user_activity` and `activity_feed`.
pub const USER_ACTIVITY_CHANNEL: &str = "user_activity";

/// Who a broadcast goes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastTarget {
    /// Every connection.
    All,
    /// One identity.
    User(String),
    /// Subscribers of a channel.
    Subscribers(String),
    /// Connections whose role is admin.
    Admins,
}

impl RealtimeEngine {
    /// Deliver `message` to `target`. Returns how many connections accepted it.
    pub fn broadcast(&self, target: &BroadcastTarget, message: ServerMessage) -> usize {
        let envelope = Envelope::new(message);
        let directory = self.directory();

        let (attempted, delivered) = match target {
            BroadcastTarget::All => (
                directory.connection_count(),
                directory.broadcast_all(&envelope),
            ),
            BroadcastTarget::User(user_id) => (
                usize::from(directory.is_connected(user_id)),
                usize::from(directory.send_to(user_id, &envelope)),
            ),
            BroadcastTarget::Subscribers(channel) => (
                directory.channel_subscribers(channel).len(),
                directory.publish(channel, &envelope),
            ),
            BroadcastTarget::Admins => {
                let delivered = directory.broadcast_admins(&envelope);
                (delivered, delivered)
            }
        };

        self.counters().record_delivery(attempted, delivered);
        debug!(kind = envelope.kind(), ?target, delivered, "Broadcast");
        delivered
    }

    /// Push a notification to one user. Returns whether it was queued.
    pub fn send_notification(&self, user_id: &str, payload: Value) -> bool {
        self.broadcast(
            &BroadcastTarget::User(user_id.to_string()),
            ServerMessage::Notification(payload),
        ) > 0
    }

    /// Push an activity event to `user_activity` subscribers.
    pub fn send_user_activity(&self, payload: Value) -> usize {
        self.broadcast(
            &BroadcastTarget::Subscribers(USER_ACTIVITY_CHANNEL.to_string()),
            ServerMessage::UserActivity(payload),
        )
    }

    /// Push AI generation progress to the user who started it.
    pub fn send_ai_generation_progress(&self, user_id: &str, payload: Value) -> bool {
        self.broadcast(
            &BroadcastTarget::User(user_id.to_string()),
            ServerMessage::AiGenerationProgress(payload),
        ) > 0
    }

    /// Push an alert to every admin connection.
    pub fn send_admin_alert(&self, payload: Value) -> usize {
        self.broadcast(&BroadcastTarget::Admins, ServerMessage::AdminAlert(payload))
    }

    /// Read the latest events and push them, formatted, to `user_activity`
    /// subscribers.
    pub async fn send_activity_feed(&self) -> Result<usize, AppError> {
        let records = self.activity_source().recent_activity(FEED_SIZE).await?;
        let items = records.iter().map(ActivityItem::from).collect();
        Ok(self.broadcast(
            &BroadcastTarget::Subscribers(USER_ACTIVITY_CHANNEL.to_string()),
            ServerMessage::ActivityFeed(items),
        ))
    }
}
