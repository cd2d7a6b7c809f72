//! Identity store lookup.

use async_trait::async_trait;

use crate::result::AppResult;
use crate::types::Identity;

/// Resolves a verified token subject to a known identity.
#[async_trait]
pub trait IdentityStore: Send + Sync + std::fmt::Debug + 'static {
    /// Find a user by id. `Ok(None)` means the user does not exist.
    async fn find_identity(&self, user_id: &str) -> AppResult<Option<Identity>>;
}
