//! Dependency reachability probe.

use std::time::Duration;

use async_trait::async_trait;

use crate::result::AppResult;

/// Checks that a dependency answers, returning its round-trip time.
#[async_trait]
pub trait HealthProbe: Send + Sync + std::fmt::Debug + 'static {
    /// Issue a trivial request against the dependency.
    async fn probe(&self) -> AppResult<Duration>;
}
