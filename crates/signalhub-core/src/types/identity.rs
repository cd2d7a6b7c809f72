//! Resolved identity of an authenticated connection.

use serde::{Deserialize, Serialize};

use super::role::UserRole;

/// An authenticated user as known to the identity store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Opaque user id.
    pub user_id: String,
    /// Role at lookup time.
    pub role: UserRole,
}

impl Identity {
    /// Creates a new identity.
    pub fn new(user_id: impl Into<String>, role: UserRole) -> Self {
        Self {
            user_id: user_id.into(),
            role,
        }
    }
}
