//! # signalhub-realtime
//!
//! Real-time WebSocket broadcast engine for SignalHub. Provides:
//!
//! - Token-based admission resolved against an identity store
//! - A directory of connected identities and their channel subscriptions
//! - Targeted delivery: one user, channel subscribers, admins, everyone
//! - Ping/pong heartbeat that reaps silent peers
//! - Periodic metrics and system-health snapshots

pub mod activity;
pub mod broadcast;
pub mod connection;
pub mod directory;
pub mod engine;
pub mod heartbeat;
pub mod message;
pub mod metrics;
pub mod snapshot;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use broadcast::BroadcastTarget;
pub use connection::{ConnectionHandle, Frame, WsAuthenticator};
pub use directory::Directory;
pub use engine::{Collaborators, EngineState, EngineStats, RealtimeEngine};
pub use heartbeat::HeartbeatMonitor;
pub use snapshot::{SnapshotBroadcaster, SnapshotBuilder};
