//! WebSocket admission: bearer token from the `token` query parameter,
//! checked once before the upgrade.

use std::sync::Arc;

use signalhub_auth::jwt::JwtDecoder;
use signalhub_core::error::{AppError, ErrorKind};
use signalhub_core::traits::IdentityStore;
use signalhub_core::types::Identity;

/// Authenticates WebSocket connections using JWT tokens.
#[derive(Clone)]
pub struct WsAuthenticator {
    /// JWT decoder.
    decoder: Arc<JwtDecoder>,
    /// Source of truth for whether the subject still exists.
    identities: Arc<dyn IdentityStore>,
}

impl std::fmt::Debug for WsAuthenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WsAuthenticator")
            .field("identities", &self.identities)
            .finish()
    }
}

impl WsAuthenticator {
    /// Creates a new WebSocket authenticator.
    pub fn new(decoder: Arc<JwtDecoder>, identities: Arc<dyn IdentityStore>) -> Self {
        Self {
            decoder,
            identities,
        }
    }

    /// Resolve a token to an identity.
    ///
    /// Missing, malformed, expired or badly signed tokens and unknown users
    /// are `Unauthorized`; an identity store failure is `ServiceUnavailable`.
    pub async fn authenticate(&self, token: Option<&str>) -> Result<Identity, AppError> {
        let token = token
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| AppError::unauthorized("Missing token"))?;

        let claims = self.decoder.decode(token)?;
        let user_id = claims
            .subject()
            .ok_or_else(|| AppError::unauthorized("Invalid token"))?;

        match self.identities.find_identity(user_id).await {
            Ok(Some(identity)) => Ok(identity),
            Ok(None) => {
                tracing::info!(user_id, "WebSocket connection rejected: user not found");
                Err(AppError::unauthorized("User not found"))
            }
            Err(e) => {
                tracing::error!(user_id, "Identity lookup failed: {e}");
                Err(AppError::with_source(
                    ErrorKind::ServiceUnavailable,
                    "Identity store unavailable",
                    e,
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeIdentityStore, auth_config, issue_token};
    use signalhub_core::types::UserRole;

    fn authenticator(store: FakeIdentityStore) -> WsAuthenticator {
        WsAuthenticator::new(Arc::new(JwtDecoder::new(&auth_config())), Arc::new(store))
    }

    #[tokio::test]
    async fn test_admits_known_user_with_store_role() {
        let store = FakeIdentityStore::with_users([("u1", UserRole::Admin)]);
        let token = issue_token("u1", UserRole::User);
        let identity = authenticator(store).authenticate(Some(&token)).await.unwrap();
        assert_eq!(identity, Identity::new("u1", UserRole::Admin));
    }

    #[tokio::test]
    async fn test_rejects_missing_token() {
        let err = authenticator(FakeIdentityStore::default())
            .authenticate(None)
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_rejects_unknown_user() {
        let token = issue_token("ghost", UserRole::User);
        let err = authenticator(FakeIdentityStore::default())
            .authenticate(Some(&token))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Unauthorized);
    }

    #[tokio::test]
    async fn test_store_failure_is_unavailable() {
        let token = issue_token("u1", UserRole::User);
        let err = authenticator(FakeIdentityStore::failing())
            .authenticate(Some(&token))
            .await
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    }
}
