//! Periodic metrics and system-health snapshots.

pub mod health;
pub mod metrics;

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use signalhub_core::error::AppError;
use signalhub_core::traits::{HealthProbe, MetricsSource};

use crate::directory::Directory;
use crate::message::{Envelope, ServerMessage};
use crate::metrics::EngineMetrics;

pub use health::{DatabaseStatus, HealthSnapshot, HealthStatus, MemorySampler, MemoryUsage};
pub use metrics::MetricsSnapshot;

/// Channel that receives `metrics` snapshots.
pub const METRICS_CHANNEL: &str = "metrics";
/// Channel that receives `system_health` snapshots.
pub const SYSTEM_HEALTH_CHANNEL: &str = "system_health";

/// Builds snapshots on demand.
#[derive(Debug)]
pub struct SnapshotBuilder {
    metrics_source: Arc<dyn MetricsSource>,
    health_probe: Arc<dyn HealthProbe>,
    memory: MemorySampler,
    directory: Arc<Directory>,
    started: Instant,
}

impl SnapshotBuilder {
    /// Create a builder. Uptime counts from now.
    pub fn new(
        metrics_source: Arc<dyn MetricsSource>,
        health_probe: Arc<dyn HealthProbe>,
        directory: Arc<Directory>,
    ) -> Self {
        Self {
            metrics_source,
            health_probe,
            memory: MemorySampler::new(),
            directory,
            started: Instant::now(),
        }
    }

    /// Time since the builder was created.
    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Read fresh usage metrics.
    pub async fn metrics(&self) -> Result<MetricsSnapshot, AppError> {
        Ok(self.metrics_source.collect_metrics().await?.into())
    }

    /// Probe the database and sample process memory.
    ///
    /// An unreachable database is reported inside the snapshot, not as an
    /// error; only a failed memory read fails the build.
    pub async fn health(&self) -> Result<HealthSnapshot, AppError> {
        let latency = match self.health_probe.probe().await {
            Ok(latency) => Some(latency),
            Err(e) => {
                warn!("Database health probe failed: {e}");
                None
            }
        };
        let memory = self.memory.sample()?;
        Ok(HealthSnapshot::new(
            latency,
            self.uptime(),
            memory,
            self.directory.connection_count(),
        ))
    }
}

/// What a broadcaster tick published.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotReport {
    /// Subscribers reached with `metrics`, or `None` if skipped.
    pub metrics: Option<usize>,
    /// Subscribers reached with `system_health`, or `None` if skipped.
    pub health: Option<usize>,
}

/// Publishes both snapshots to their channels on a fixed cadence.
#[derive(Debug, Clone)]
pub struct SnapshotBroadcaster {
    builder: Arc<SnapshotBuilder>,
    directory: Arc<Directory>,
    counters: Arc<EngineMetrics>,
}

impl SnapshotBroadcaster {
    /// Create a broadcaster.
    pub fn new(
        builder: Arc<SnapshotBuilder>,
        directory: Arc<Directory>,
        counters: Arc<EngineMetrics>,
    ) -> Self {
        Self {
            builder,
            directory,
            counters,
        }
    }

    /// Build and publish both snapshots. A failing source skips its
    /// snapshot for this tick; clients never see the failure.
    pub async fn tick(&self) -> SnapshotReport {
        let metrics = match self.builder.metrics().await {
            Ok(snapshot) => Some(self.publish(METRICS_CHANNEL, ServerMessage::Metrics(snapshot))),
            Err(e) => {
                warn!("Skipping metrics snapshot: {e}");
                None
            }
        };

        let health = match self.builder.health().await {
            Ok(snapshot) => Some(self.publish(
                SYSTEM_HEALTH_CHANNEL,
                ServerMessage::SystemHealth(snapshot),
            )),
            Err(e) => {
                warn!("Skipping system health snapshot: {e}");
                None
            }
        };

        debug!(?metrics, ?health, "Snapshot tick");
        SnapshotReport { metrics, health }
    }

    fn publish(&self, channel: &str, message: ServerMessage) -> usize {
        let subscribers = self.directory.channel_subscribers(channel).len();
        let delivered = self.directory.publish(channel, &Envelope::new(message));
        self.counters.record_delivery(subscribers, delivered);
        delivered
    }

    /// Tick every `period` until `cancel` fires. The first tick happens one
    /// period after start.
    pub async fn run(self, period: Duration, cancel: CancellationToken) {
        let mut interval = time::interval_at(time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = interval.tick() => {
                    self.tick().await;
                }
            }
        }

        debug!("Snapshot loop ended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::{ConnectionHandle, Frame};
    use crate::testing::{FakeHealthProbe, FakeMetricsSource};
    use signalhub_core::config::DuplicateConnectionPolicy;
    use signalhub_core::traits::UsageMetrics;
    use signalhub_core::types::{Identity, UserRole};
    use tokio::sync::mpsc;

    struct Fixture {
        directory: Arc<Directory>,
        source: Arc<FakeMetricsSource>,
        broadcaster: SnapshotBroadcaster,
    }

    fn fixture(probe: FakeHealthProbe) -> Fixture {
        let directory = Arc::new(Directory::new(DuplicateConnectionPolicy::Replace, 8));
        let source = Arc::new(FakeMetricsSource::new(UsageMetrics {
            active_users: 2,
            total_users: 5,
            ai_requests: 1,
            revenue: 10.0,
        }));
        let builder = Arc::new(SnapshotBuilder::new(
            source.clone(),
            Arc::new(probe),
            directory.clone(),
        ));
        let broadcaster =
            SnapshotBroadcaster::new(builder, directory.clone(), Arc::new(EngineMetrics::new()));
        Fixture {
            directory,
            source,
            broadcaster,
        }
    }

    fn subscriber(dir: &Directory, user_id: &str, channel: &str) -> mpsc::Receiver<Frame> {
        let (tx, rx) = mpsc::channel(8);
        let handle = ConnectionHandle::new(
            &Identity::new(user_id, UserRole::User),
            tx,
            CancellationToken::new(),
        );
        dir.register(Arc::new(handle)).unwrap();
        dir.subscribe(user_id, channel).unwrap();
        rx
    }

    fn kind(frame: Frame) -> String {
        match frame {
            Frame::Text(text) => {
                let value: serde_json::Value = serde_json::from_str(&text).unwrap();
                value["type"].as_str().unwrap().to_string()
            }
            other => panic!("unexpected frame {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_tick_publishes_to_each_channel() {
        let f = fixture(FakeHealthProbe::up(Duration::from_millis(2)));
        let mut metrics_rx = subscriber(&f.directory, "a", METRICS_CHANNEL);
        let mut health_rx = subscriber(&f.directory, "b", SYSTEM_HEALTH_CHANNEL);

        let report = f.broadcaster.tick().await;

        assert_eq!(report, SnapshotReport { metrics: Some(1), health: Some(1) });
        assert_eq!(kind(metrics_rx.try_recv().unwrap()), "metrics");
        assert!(metrics_rx.try_recv().is_err());
        assert_eq!(kind(health_rx.try_recv().unwrap()), "system_health");
        assert!(health_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_failing_metrics_source_skips_only_metrics() {
        let f = fixture(FakeHealthProbe::up(Duration::from_millis(2)));
        f.source.set(None);
        let mut metrics_rx = subscriber(&f.directory, "a", METRICS_CHANNEL);
        let mut health_rx = subscriber(&f.directory, "b", SYSTEM_HEALTH_CHANNEL);

        let report = f.broadcaster.tick().await;

        assert_eq!(report.metrics, None);
        assert_eq!(report.health, Some(1));
        assert!(metrics_rx.try_recv().is_err());
        assert_eq!(kind(health_rx.try_recv().unwrap()), "system_health");
    }

    #[tokio::test]
    async fn test_database_down_still_reports_health() {
        let f = fixture(FakeHealthProbe::down());
        let snapshot = f.broadcaster.builder.health().await.unwrap();
        assert_eq!(snapshot.database, DatabaseStatus::Disconnected);
        assert_eq!(snapshot.status, HealthStatus::Critical);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_ticks_on_cadence() {
        let f = fixture(FakeHealthProbe::up(Duration::from_millis(2)));
        let cancel = CancellationToken::new();
        let task = tokio::spawn(f.broadcaster.clone().run(Duration::from_secs(30), cancel.clone()));

        time::sleep(Duration::from_secs(29)).await;
        assert_eq!(f.source.calls(), 0);
        time::sleep(Duration::from_secs(2)).await;
        assert_eq!(f.source.calls(), 1);
        time::sleep(Duration::from_secs(30)).await;
        assert_eq!(f.source.calls(), 2);

        cancel.cancel();
        task.await.unwrap();
    }
}
