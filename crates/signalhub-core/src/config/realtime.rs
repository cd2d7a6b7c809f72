//! Real-time gateway configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// What to do when an identity opens a second connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DuplicateConnectionPolicy {
    /// Close the previous connection and keep the new one.
    Replace,
    /// Refuse the new upgrade while the identity is connected.
    Reject,
}

/// Real-time (WebSocket) gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Heartbeat tick in seconds; a connection that does not answer a probe
    /// by the next tick is terminated.
    #[serde(default = "default_heartbeat_interval")]
    pub heartbeat_interval_seconds: u64,
    /// Cadence of the metrics / system-health snapshot broadcast, in seconds.
    #[serde(default = "default_snapshot_interval")]
    pub snapshot_interval_seconds: u64,
    /// Per-connection outbound queue capacity. Frames beyond it are dropped.
    #[serde(default = "default_outbound_buffer")]
    pub outbound_buffer_size: usize,
    /// Maximum accepted inbound text frame, in bytes.
    #[serde(default = "default_max_message_bytes")]
    pub max_message_bytes: usize,
    /// Maximum channel subscriptions per connection.
    #[serde(default = "default_max_subscriptions")]
    pub max_subscriptions_per_connection: usize,
    /// Policy for a second connection from an already-connected identity.
    #[serde(default = "default_duplicate_policy")]
    pub duplicate_connection_policy: DuplicateConnectionPolicy,
}

impl RealtimeConfig {
    /// Heartbeat tick as a `Duration`.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_seconds)
    }

    /// Snapshot cadence as a `Duration`.
    pub fn snapshot_interval(&self) -> Duration {
        Duration::from_secs(self.snapshot_interval_seconds)
    }
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_seconds: default_heartbeat_interval(),
            snapshot_interval_seconds: default_snapshot_interval(),
            outbound_buffer_size: default_outbound_buffer(),
            max_message_bytes: default_max_message_bytes(),
            max_subscriptions_per_connection: default_max_subscriptions(),
            duplicate_connection_policy: default_duplicate_policy(),
        }
    }
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_snapshot_interval() -> u64 {
    30
}

fn default_outbound_buffer() -> usize {
    256
}

fn default_max_message_bytes() -> usize {
    65_536
}

fn default_max_subscriptions() -> usize {
    50
}

fn default_duplicate_policy() -> DuplicateConnectionPolicy {
    DuplicateConnectionPolicy::Replace
}
