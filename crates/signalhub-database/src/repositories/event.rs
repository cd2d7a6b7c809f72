//! Recent event log.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::{PgPool, Row};

use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::result::AppResult;
use signalhub_core::traits::{ActivityRecord, ActivitySource};

/// Reads the `"Event"` table joined with the acting user's name.
#[derive(Debug, Clone)]
pub struct EventRepository {
    pool: PgPool,
}

impl EventRepository {
    /// Create a new event repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ActivitySource for EventRepository {
    async fn recent_activity(&self, limit: i64) -> AppResult<Vec<ActivityRecord>> {
        let rows = sqlx::query(
            r#"SELECT e.id, e.event, e."timestamp", u.name
               FROM "Event" e
               LEFT JOIN "User" u ON u.id = e."userId"
               ORDER BY e."timestamp" DESC
               LIMIT $1"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to list events", e))?;

        rows.into_iter()
            .map(|row| {
                let map = |e| AppError::with_source(ErrorKind::Database, "Malformed event row", e);
                Ok(ActivityRecord {
                    id: row.try_get("id").map_err(map)?,
                    event: row.try_get("event").map_err(map)?,
                    user_name: row.try_get::<Option<String>, _>("name").map_err(map)?,
                    timestamp: row
                        .try_get::<NaiveDateTime, _>("timestamp")
                        .map_err(map)?
                        .and_utc(),
                })
            })
            .collect()
    }
}
