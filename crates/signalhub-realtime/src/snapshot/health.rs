//! Process and database health snapshot.

use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use sysinfo::{ProcessesToUpdate, System};

use signalhub_core::error::AppError;

/// Memory share above which the process is `warning`.
const MEMORY_WARNING_PERCENT: f64 = 75.0;
/// Memory share above which the process is `critical`.
const MEMORY_CRITICAL_PERCENT: f64 = 90.0;
/// Database round trip above which we report `warning`.
const LATENCY_WARNING: Duration = Duration::from_millis(500);
/// Database round trip above which we report `critical`.
const LATENCY_CRITICAL: Duration = Duration::from_millis(1000);

/// Overall verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// All good.
    Healthy,
    /// Degraded.
    Warning,
    /// Database unreachable or resources exhausted.
    Critical,
}

/// Database reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseStatus {
    /// Probe succeeded.
    Connected,
    /// Probe failed.
    Disconnected,
}

/// Resident memory of this process.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident set size in bytes.
    pub rss_bytes: u64,
    /// Total system memory in bytes.
    pub total_bytes: u64,
    /// `rss / total`, as a percentage.
    pub percent: f64,
}

impl MemoryUsage {
    /// Build from raw byte counts.
    pub fn new(rss_bytes: u64, total_bytes: u64) -> Self {
        let percent = if total_bytes == 0 {
            0.0
        } else {
            rss_bytes as f64 / total_bytes as f64 * 100.0
        };
        Self {
            rss_bytes,
            total_bytes,
            percent,
        }
    }
}

/// Payload of a `system_health` message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthSnapshot {
    /// Overall verdict.
    pub status: HealthStatus,
    /// Database reachability.
    pub database: DatabaseStatus,
    /// Database round trip, when reachable.
    pub database_latency_ms: Option<u64>,
    /// Seconds since the engine was created.
    pub uptime_seconds: u64,
    /// Process memory.
    pub memory: MemoryUsage,
    /// Registered connections.
    pub connections: usize,
    /// When the snapshot was taken.
    #[serde(serialize_with = "crate::message::envelope::serialize_timestamp")]
    pub timestamp: DateTime<Utc>,
}

impl HealthSnapshot {
    /// Assemble a snapshot and grade it.
    pub fn new(
        database_latency: Option<Duration>,
        uptime: Duration,
        memory: MemoryUsage,
        connections: usize,
    ) -> Self {
        Self {
            status: grade(database_latency, &memory),
            database: if database_latency.is_some() {
                DatabaseStatus::Connected
            } else {
                DatabaseStatus::Disconnected
            },
            database_latency_ms: database_latency.map(|d| d.as_millis() as u64),
            uptime_seconds: uptime.as_secs(),
            memory,
            connections,
            timestamp: Utc::now(),
        }
    }
}

fn grade(database_latency: Option<Duration>, memory: &MemoryUsage) -> HealthStatus {
    let Some(latency) = database_latency else {
        return HealthStatus::Critical;
    };
    if memory.percent > MEMORY_CRITICAL_PERCENT || latency > LATENCY_CRITICAL {
        HealthStatus::Critical
    } else if memory.percent > MEMORY_WARNING_PERCENT || latency > LATENCY_WARNING {
        HealthStatus::Warning
    } else {
        HealthStatus::Healthy
    }
}

/// Reads this process's memory through `sysinfo`.
#[derive(Debug)]
pub struct MemorySampler {
    system: Mutex<System>,
}

impl MemorySampler {
    /// Create a sampler. No refresh happens until [`sample`](Self::sample).
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    /// Current resident memory of this process.
    pub fn sample(&self) -> Result<MemoryUsage, AppError> {
        let pid = sysinfo::get_current_pid()
            .map_err(|e| AppError::internal(format!("Cannot resolve current pid: {e}")))?;

        let mut system = self.system.lock();
        system.refresh_memory();
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), false);

        let rss = system
            .process(pid)
            .map(sysinfo::Process::memory)
            .ok_or_else(|| AppError::internal("Current process not visible to sysinfo"))?;

        Ok(MemoryUsage::new(rss, system.total_memory()))
    }
}

impl Default for MemorySampler {
    fn default() -> Self {
        Self::new()
    }
}
