//! In-memory collaborators for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use parking_lot::Mutex;

use signalhub_auth::jwt::JwtEncoder;
use signalhub_core::config::AuthConfig;
use signalhub_core::error::AppError;
use signalhub_core::result::AppResult;
use signalhub_core::traits::{
    ActivityRecord, ActivitySource, HealthProbe, IdentityStore, MetricsSource, UsageMetrics,
};
use signalhub_core::types::{Identity, UserRole};

/// Secret shared by [`auth_config`] and [`issue_token`].
pub const TEST_SECRET: &str = "test-secret";

/// Auth settings with a fixed secret and no leeway.
pub fn auth_config() -> AuthConfig {
    AuthConfig {
        jwt_secret: TEST_SECRET.to_string(),
        jwt_access_ttl_minutes: 15,
        leeway_seconds: 0,
    }
}

/// A valid token for `user_id`.
pub fn issue_token(user_id: &str, role: UserRole) -> String {
    JwtEncoder::new(&auth_config())
        .issue(user_id, role)
        .map(|t| t.token)
        .unwrap_or_default()
}

/// A token that expired a minute ago.
pub fn expired_token(user_id: &str) -> String {
    JwtEncoder::new(&auth_config())
        .issue_with_ttl(user_id, UserRole::User, chrono::Duration::minutes(-1))
        .map(|t| t.token)
        .unwrap_or_default()
}

/// Identity store backed by a map.
#[derive(Debug, Default)]
pub struct FakeIdentityStore {
    users: Mutex<HashMap<String, UserRole>>,
    fail: bool,
}

impl FakeIdentityStore {
    /// Store containing `users`.
    pub fn with_users<'a>(users: impl IntoIterator<Item = (&'a str, UserRole)>) -> Self {
        Self {
            users: Mutex::new(users.into_iter().map(|(id, r)| (id.to_string(), r)).collect()),
            fail: false,
        }
    }

    /// Store whose every lookup errors.
    pub fn failing() -> Self {
        Self {
            users: Mutex::default(),
            fail: true,
        }
    }

    /// Add or replace a user.
    pub fn insert(&self, user_id: &str, role: UserRole) {
        self.users.lock().insert(user_id.to_string(), role);
    }
}

#[async_trait]
impl IdentityStore for FakeIdentityStore {
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<Identity>> {
        if self.fail {
            return Err(AppError::database("connection refused"));
        }
        Ok(self
            .users
            .lock()
            .get(user_id)
            .map(|role| Identity::new(user_id, *role)))
    }
}

/// Metrics source returning a fixed value, or failing when unset.
#[derive(Debug, Default)]
pub struct FakeMetricsSource {
    metrics: Mutex<Option<UsageMetrics>>,
    calls: AtomicUsize,
}

impl FakeMetricsSource {
    /// Source that returns `metrics`.
    pub fn new(metrics: UsageMetrics) -> Self {
        Self {
            metrics: Mutex::new(Some(metrics)),
            calls: AtomicUsize::new(0),
        }
    }

    /// Source that always fails.
    pub fn failing() -> Self {
        Self::default()
    }

    /// Swap the value (`None` makes it fail).
    pub fn set(&self, metrics: Option<UsageMetrics>) {
        *self.metrics.lock() = metrics;
    }

    /// Number of collections so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetricsSource for FakeMetricsSource {
    async fn collect_metrics(&self) -> AppResult<UsageMetrics> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.metrics
            .lock()
            .clone()
            .ok_or_else(|| AppError::database("metrics query failed"))
    }
}

/// Activity source over a fixed list, newest first.
#[derive(Debug, Default)]
pub struct FakeActivitySource {
    records: Vec<ActivityRecord>,
}

impl FakeActivitySource {
    /// Source that returns `records` (truncated to the limit).
    pub fn new(records: Vec<ActivityRecord>) -> Self {
        Self { records }
    }

    /// One record per `(event, user name)` pair, one minute apart.
    pub fn sample(events: &[(&str, Option<&str>)]) -> Self {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).single().unwrap_or_default();
        Self::new(
            events
                .iter()
                .enumerate()
                .map(|(i, (event, name))| ActivityRecord {
                    id: format!("evt-{i}"),
                    event: event.to_string(),
                    user_name: name.map(str::to_string),
                    timestamp: base - chrono::Duration::minutes(i as i64),
                })
                .collect(),
        )
    }
}

#[async_trait]
impl ActivitySource for FakeActivitySource {
    async fn recent_activity(&self, limit: i64) -> AppResult<Vec<ActivityRecord>> {
        Ok(self.records.iter().take(limit.max(0) as usize).cloned().collect())
    }
}

/// Health probe with a fixed outcome.
#[derive(Debug)]
pub struct FakeHealthProbe {
    latency: Option<Duration>,
}

impl FakeHealthProbe {
    /// Reachable with `latency`.
    pub fn up(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
        }
    }

    /// Unreachable.
    pub fn down() -> Self {
        Self { latency: None }
    }
}

#[async_trait]
impl HealthProbe for FakeHealthProbe {
    async fn probe(&self) -> AppResult<Duration> {
        self.latency
            .ok_or_else(|| AppError::database("connection refused"))
    }
}
