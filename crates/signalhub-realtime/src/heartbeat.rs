//! Ping/pong liveness probing.
//!
//! Each tick, a connection that has not answered the previous probe is
//! terminated and deregistered; every other connection is flagged as
//! awaiting a pong and sent a WebSocket ping. A silent peer is therefore
//! reaped one interval after the probe it ignored.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::directory::Directory;
use crate::metrics::EngineMetrics;

/// Outcome of one heartbeat tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HeartbeatReport {
    /// Connections sent a fresh probe.
    pub probed: usize,
    /// Connections terminated for missing the previous probe.
    pub reaped: usize,
}

/// Drives liveness probing over the directory.
#[derive(Debug, Clone)]
pub struct HeartbeatMonitor {
    directory: Arc<Directory>,
    metrics: Arc<EngineMetrics>,
}

impl HeartbeatMonitor {
    /// Create a monitor over `directory`.
    pub fn new(directory: Arc<Directory>, metrics: Arc<EngineMetrics>) -> Self {
        Self { directory, metrics }
    }

    /// Run one probe round.
    pub fn tick(&self) -> HeartbeatReport {
        let mut report = HeartbeatReport::default();

        for handle in self.directory.handles() {
            if handle.is_awaiting_pong() || !handle.is_alive() {
                warn!(
                    conn_id = %handle.id,
                    user_id = %handle.user_id,
                    last_heartbeat = %handle.last_heartbeat(),
                    "Terminating dead connection"
                );
                handle.terminate("heartbeat timeout");
                if self
                    .directory
                    .deregister_connection(&handle.user_id, handle.id)
                    .is_some()
                {
                    self.metrics.record_disconnect();
                }
                report.reaped += 1;
                continue;
            }

            // Flag before queueing so a fast pong cannot be overwritten.
            handle.mark_awaiting_pong();
            if handle.ping() {
                report.probed += 1;
            } else if handle.is_alive() {
                // Queue full: no probe went out, retry next tick.
                handle.clear_awaiting_pong();
            }
        }

        if report.reaped > 0 {
            info!(reaped = report.reaped, probed = report.probed, "Heartbeat tick");
        } else {
            debug!(probed = report.probed, "Heartbeat tick");
        }
        report
    }

    /// Tick every `period` until `cancel` fires. The first tick happens one
    /// period after start.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut interval = time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        debug!("Heartbeat loop ended");
    }
}
