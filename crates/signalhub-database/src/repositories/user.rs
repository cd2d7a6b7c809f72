//! User repository: identity lookup and database reachability.

use std::time::Duration;

use async_trait::async_trait;
use sqlx::{PgPool, Row};
use tracing::warn;

use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::result::AppResult;
use signalhub_core::traits::{HealthProbe, IdentityStore};
use signalhub_core::types::{Identity, UserRole};

/// Repository for user lookups.
#[derive(Debug, Clone)]
pub struct UserRepository {
    pool: PgPool,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl IdentityStore for UserRepository {
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<Identity>> {
        let row = sqlx::query(r#"SELECT id, role::text AS role FROM "User" WHERE id = $1"#)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Failed to find user by id", e))?;

        let Some(row) = row else {
            return Ok(None);
        };

        let id: String = row
            .try_get("id")
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Malformed user row", e))?;
        let role: Option<String> = row
            .try_get("role")
            .map_err(|e| AppError::with_source(ErrorKind::Database, "Malformed user row", e))?;

        let role = match role.as_deref().map(str::parse::<UserRole>) {
            Some(Ok(role)) => role,
            Some(Err(_)) => {
                warn!(user_id = %id, role = ?role, "Unrecognized role, treating as USER");
                UserRole::User
            }
            None => UserRole::User,
        };

        Ok(Some(Identity::new(id, role)))
    }
}

#[async_trait]
impl HealthProbe for UserRepository {
    async fn probe(&self) -> AppResult<Duration> {
        crate::connection::ping(&self.pool).await
    }
}
