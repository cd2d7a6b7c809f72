//! Top-level real-time engine that ties together all subsystems.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use signalhub_core::config::{DuplicateConnectionPolicy, RealtimeConfig};
use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::traits::{ActivitySource, HealthProbe, MetricsSource};
use signalhub_core::types::Identity;

use crate::connection::handle::{CloseCode, ConnectionHandle, Frame};
use crate::directory::{Directory, Registration};
use crate::heartbeat::HeartbeatMonitor;
use crate::message::types::{ChannelPayload, ConnectionEstablishedPayload, PongPayload};
use crate::message::{ClientMessage, Envelope, ErrorCode, ServerMessage, decode_client};
use crate::metrics::{CounterSnapshot, EngineMetrics};
use crate::snapshot::{SnapshotBroadcaster, SnapshotBuilder};

/// Lifecycle of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// Created, timers not running.
    Init,
    /// Timers running, accepting connections.
    Listening,
    /// Closing connections.
    Stopping,
    /// Done.
    Stopped,
}

/// External systems the engine reads from.
#[derive(Debug, Clone)]
pub struct Collaborators {
    /// Usage metrics for `metrics` snapshots.
    pub metrics: Arc<dyn MetricsSource>,
    /// Event log for the activity feed.
    pub activity: Arc<dyn ActivitySource>,
    /// Database reachability for `system_health` snapshots.
    pub health: Arc<dyn HealthProbe>,
}

/// Summary served by the stats endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineStats {
    /// Lifecycle state.
    pub state: EngineState,
    /// Registered connections.
    pub connected_clients: usize,
    /// Channels with at least one subscriber.
    pub active_subscriptions: usize,
    /// Seconds since the engine was created.
    pub uptime_seconds: u64,
    /// Engine counters.
    pub counters: CounterSnapshot,
}

/// Central real-time engine that coordinates all WebSocket subsystems.
pub struct RealtimeEngine {
    config: RealtimeConfig,
    directory: Arc<Directory>,
    snapshots: Arc<SnapshotBuilder>,
    activity: Arc<dyn ActivitySource>,
    metrics: Arc<EngineMetrics>,
    state: Mutex<EngineState>,
    /// Parent of every timer and connection token.
    root: CancellationToken,
    timers: CancellationToken,
    tasks: TaskTracker,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("state", &self.state())
            .field("connections", &self.directory.connection_count())
            .finish()
    }
}

impl RealtimeEngine {
    /// Creates a new real-time engine with all subsystems.
    pub fn new(config: RealtimeConfig, collaborators: Collaborators) -> Self {
        let directory = Arc::new(Directory::new(
            config.duplicate_connection_policy,
            config.max_subscriptions_per_connection,
        ));
        let snapshots = Arc::new(SnapshotBuilder::new(
            collaborators.metrics,
            collaborators.health,
            directory.clone(),
        ));
        let root = CancellationToken::new();

        info!(
            heartbeat_interval_seconds = config.heartbeat_interval_seconds,
            snapshot_interval_seconds = config.snapshot_interval_seconds,
            duplicate_policy = ?config.duplicate_connection_policy,
            "Real-time engine initialized"
        );

        Self {
            directory,
            snapshots,
            activity: collaborators.activity,
            metrics: Arc::new(EngineMetrics::new()),
            state: Mutex::new(EngineState::Init),
            timers: root.child_token(),
            root,
            tasks: TaskTracker::new(),
            config,
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> EngineState {
        *self.state.lock()
    }

    /// The connection directory.
    pub fn directory(&self) -> &Arc<Directory> {
        &self.directory
    }

    /// Snapshot builders.
    pub fn snapshots(&self) -> &Arc<SnapshotBuilder> {
        &self.snapshots
    }

    /// Engine counters.
    pub fn counters(&self) -> &Arc<EngineMetrics> {
        &self.metrics
    }

    /// Engine configuration.
    pub fn config(&self) -> &RealtimeConfig {
        &self.config
    }

    /// The event log behind the activity feed.
    pub fn activity_source(&self) -> &Arc<dyn ActivitySource> {
        &self.activity
    }

    /// Start the heartbeat and snapshot timers. Calling it again while
    /// listening is a no-op.
    pub fn start(&self) -> Result<(), AppError> {
        let mut state = self.state.lock();
        match *state {
            EngineState::Init => {}
            EngineState::Listening => return Ok(()),
            EngineState::Stopping | EngineState::Stopped => {
                return Err(AppError::new(
                    ErrorKind::ServiceUnavailable,
                    "Real-time engine is shut down",
                ));
            }
        }

        let heartbeat = HeartbeatMonitor::new(self.directory.clone(), self.metrics.clone());
        self.tasks.spawn(heartbeat.run(
            self.config.heartbeat_interval(),
            self.timers.child_token(),
        ));

        let broadcaster = SnapshotBroadcaster::new(
            self.snapshots.clone(),
            self.directory.clone(),
            self.metrics.clone(),
        );
        self.tasks.spawn(broadcaster.run(
            self.config.snapshot_interval(),
            self.timers.child_token(),
        ));

        *state = EngineState::Listening;
        info!("Real-time engine listening");
        Ok(())
    }

    /// Pre-upgrade admission check for an authenticated identity.
    ///
    /// Fails with a conflict under the `reject` policy when the identity is
    /// already connected, and with service-unavailable once shutdown began.
    pub fn check_admission(&self, user_id: &str) -> Result<(), AppError> {
        self.ensure_accepting()?;
        if self.config.duplicate_connection_policy == DuplicateConnectionPolicy::Reject
            && self.directory.is_connected(user_id)
        {
            return Err(AppError::conflict(format!(
                "User {user_id} is already connected"
            )));
        }
        Ok(())
    }

    fn ensure_accepting(&self) -> Result<(), AppError> {
        match self.state() {
            EngineState::Init | EngineState::Listening => Ok(()),
            EngineState::Stopping | EngineState::Stopped => Err(AppError::service_unavailable(
                "Real-time engine is shutting down",
            )),
        }
    }

    /// Register a connection for `identity` and queue its welcome frame.
    ///
    /// Returns the handle and the receiving half of its outbound queue,
    /// which the caller drains to the socket.
    pub fn admit(
        &self,
        identity: &Identity,
    ) -> Result<(Arc<ConnectionHandle>, mpsc::Receiver<Frame>), AppError> {
        self.ensure_accepting()?;

        let (tx, rx) = mpsc::channel(self.config.outbound_buffer_size);
        let handle = Arc::new(ConnectionHandle::new(identity, tx, self.root.child_token()));

        if let Registration::Replaced(_) = self.directory.register(handle.clone())? {
            self.metrics.record_disconnect();
        }
        self.metrics.record_connect();

        info!(
            conn_id = %handle.id,
            user_id = %handle.user_id,
            role = %handle.role,
            "WebSocket client connected"
        );

        self.reply(
            &handle,
            ServerMessage::ConnectionEstablished(ConnectionEstablishedPayload::new(
                &identity.user_id,
            )),
            None,
        );

        Ok((handle, rx))
    }

    /// Process one inbound text frame from `handle`.
    ///
    /// Every failure is answered with an `error` frame; the connection
    /// stays open.
    pub async fn handle_inbound(&self, handle: &ConnectionHandle, raw: &str) {
        self.metrics.record_received();

        if !self.is_current(handle) {
            debug!(conn_id = %handle.id, "Ignoring frame from superseded connection");
            return;
        }

        let frame = match decode_client(raw, self.config.max_message_bytes) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(conn_id = %handle.id, code = %e.code, "Rejected inbound frame");
                self.reply_error(handle, e.code, e.message, e.id);
                return;
            }
        };
        let id = frame.id;

        match frame.message {
            ClientMessage::Ping { timestamp } => {
                self.reply(handle, ServerMessage::Pong(PongPayload { timestamp }), id);
            }
            ClientMessage::Subscribe { event_type } => self.subscribe(handle, event_type, id),
            ClientMessage::Unsubscribe { event_type } => {
                self.directory.unsubscribe(&handle.user_id, &event_type);
                info!(user_id = %handle.user_id, channel = %event_type, "Unsubscribed");
                self.reply(
                    handle,
                    ServerMessage::SubscriptionCancelled(ChannelPayload::new(event_type)),
                    id,
                );
            }
            ClientMessage::GetMetrics => match self.snapshots.metrics().await {
                Ok(snapshot) => self.reply(handle, ServerMessage::Metrics(snapshot), id),
                Err(e) => {
                    warn!(user_id = %handle.user_id, "Failed to fetch metrics: {e}");
                    self.reply_error(
                        handle,
                        ErrorCode::MetricsUnavailable,
                        "Metrics are temporarily unavailable",
                        id,
                    );
                }
            },
            ClientMessage::GetSystemHealth => match self.snapshots.health().await {
                Ok(snapshot) => self.reply(handle, ServerMessage::SystemHealth(snapshot), id),
                Err(e) => {
                    warn!(user_id = %handle.user_id, "Failed to check system health: {e}");
                    self.reply_error(
                        handle,
                        ErrorCode::HealthUnavailable,
                        "System health is temporarily unavailable",
                        id,
                    );
                }
            },
            ClientMessage::Unknown(kind) => {
                debug!(user_id = %handle.user_id, kind = %kind, "Unknown message type");
                self.reply_error(
                    handle,
                    ErrorCode::UnknownMessageType,
                    format!("Unknown message type: {kind}"),
                    id,
                );
            }
        }
    }

    /// Remove a closed connection. A superseded connection is a no-op.
    pub fn disconnect(&self, handle: &ConnectionHandle) {
        handle.mark_dead();
        if self
            .directory
            .deregister_connection(&handle.user_id, handle.id)
            .is_some()
        {
            self.metrics.record_disconnect();
            info!(conn_id = %handle.id, user_id = %handle.user_id, "WebSocket client disconnected");
        }
    }

    /// Spawn a per-connection task that shutdown waits for.
    pub fn spawn_connection_task<F>(&self, task: F) -> tokio::task::JoinHandle<F::Output>
    where
        F: Future + Send + 'static,
        F::Output: Send + 'static,
    {
        self.tasks.spawn(task)
    }

    /// Current stats.
    pub fn stats(&self) -> EngineStats {
        EngineStats {
            state: self.state(),
            connected_clients: self.directory.connection_count(),
            active_subscriptions: self.directory.channel_count(),
            uptime_seconds: self.snapshots.uptime().as_secs(),
            counters: self.metrics.snapshot(),
        }
    }

    /// Stop timers, close every connection with 1001, and wait up to
    /// `grace` for their writers to flush before cancelling the rest.
    pub async fn shutdown(&self, grace: Duration) {
        {
            let mut state = self.state.lock();
            if matches!(*state, EngineState::Stopping | EngineState::Stopped) {
                return;
            }
            *state = EngineState::Stopping;
        }
        info!("Shutting down real-time engine");

        self.timers.cancel();

        let handles = self.directory.drain();
        let closing = handles.len();
        for handle in handles {
            handle.close(CloseCode::GOING_AWAY, "server shutting down");
            self.metrics.record_disconnect();
        }

        self.tasks.close();
        if tokio::time::timeout(grace, self.tasks.wait()).await.is_err() {
            warn!(
                remaining = self.tasks.len(),
                "Connections did not close within grace period, cancelling"
            );
            self.root.cancel();
            self.tasks.wait().await;
        }
        self.root.cancel();

        *self.state.lock() = EngineState::Stopped;
        info!(closed = closing, "Real-time engine shut down");
    }

    fn subscribe(&self, handle: &ConnectionHandle, event_type: String, id: Option<String>) {
        match self.directory.subscribe(&handle.user_id, &event_type) {
            Ok(added) => {
                if added {
                    self.metrics.record_subscription();
                }
                info!(user_id = %handle.user_id, channel = %event_type, "Subscribed");
                self.reply(
                    handle,
                    ServerMessage::SubscriptionConfirmed(ChannelPayload::new(event_type)),
                    id,
                );
            }
            Err(e) if e.kind == ErrorKind::Validation => {
                self.reply_error(handle, ErrorCode::MaxSubscriptions, e.message, id);
            }
            Err(e) => {
                // Reaped or replaced after the frame arrived.
                debug!(conn_id = %handle.id, "Subscribe on unregistered connection: {e}");
                self.reply_error(handle, ErrorCode::SubscriptionFailed, e.message, id);
            }
        }
    }

    fn is_current(&self, handle: &ConnectionHandle) -> bool {
        self.directory
            .lookup(&handle.user_id)
            .is_some_and(|current| current.id == handle.id)
    }

    fn reply(&self, handle: &ConnectionHandle, message: ServerMessage, id: Option<String>) {
        let delivered = handle.send(&Envelope::reply(message, id));
        self.metrics.record_delivery(1, usize::from(delivered));
    }

    fn reply_error(
        &self,
        handle: &ConnectionHandle,
        code: ErrorCode,
        message: impl Into<String>,
        id: Option<String>,
    ) {
        self.metrics.record_protocol_error();
        self.reply(handle, ServerMessage::error(code, message), id);
    }
}
