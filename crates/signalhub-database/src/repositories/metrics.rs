//! Aggregate usage metrics.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::PgPool;

use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::result::AppResult;
use signalhub_core::traits::{MetricsSource, UsageMetrics};

/// Window for "active" users. Timestamps are stored without zone, in UTC.
const ACTIVE_WINDOW_HOURS: i64 = 24;
/// Window for recent AI requests.
const AI_REQUEST_WINDOW_HOURS: i64 = 1;

/// Computes the counters shown on the live dashboard.
#[derive(Debug, Clone)]
pub struct MetricsRepository {
    pool: PgPool,
}

impl MetricsRepository {
    /// Create a new metrics repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn total_users(&self) -> AppResult<i64> {
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "User""#)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to count users", e))
    }

    async fn active_users(&self) -> AppResult<i64> {
        let since = (Utc::now() - Duration::hours(ACTIVE_WINDOW_HOURS)).naive_utc();
        sqlx::query_scalar::<_, i64>(
            r#"SELECT COUNT(DISTINCT "userId") FROM "Event" WHERE "timestamp" >= $1"#,
        )
        .bind(since)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            AppError::with_source(ErrorKind::Database, "Failed to count active users", e)
        })
    }

    async fn recent_ai_requests(&self) -> AppResult<i64> {
        let since = (Utc::now() - Duration::hours(AI_REQUEST_WINDOW_HOURS)).naive_utc();
        sqlx::query_scalar::<_, i64>(r#"SELECT COUNT(*) FROM "AIRequest" WHERE "timestamp" >= $1"#)
            .bind(since)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                AppError::with_source(ErrorKind::Database, "Failed to count AI requests", e)
            })
    }

    async fn revenue(&self) -> AppResult<f64> {
        sqlx::query_scalar::<_, f64>(
            r#"SELECT COALESCE(SUM(amount), 0)::float8 FROM "Payment" WHERE status = 'SUCCEEDED'"#,
        )
        .fetch_one(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to sum revenue", e))
    }
}

#[async_trait]
impl MetricsSource for MetricsRepository {
    async fn collect_metrics(&self) -> AppResult<UsageMetrics> {
        let (total_users, active_users, ai_requests, revenue) = tokio::try_join!(
            self.total_users(),
            self.active_users(),
            self.recent_ai_requests(),
            self.revenue(),
        )?;

        Ok(UsageMetrics {
            active_users,
            total_users,
            ai_requests,
            revenue,
        })
    }
}
