//! JWT token creation.

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};

use signalhub_core::config::AuthConfig;
use signalhub_core::error::AppError;
use signalhub_core::types::UserRole;

use super::claims::Claims;

/// Creates signed tokens in the same shape the web application issues.
#[derive(Clone)]
pub struct JwtEncoder {
    /// HMAC secret key for signing.
    encoding_key: EncodingKey,
    /// Default token lifetime.
    ttl: Duration,
}

impl std::fmt::Debug for JwtEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtEncoder").field("ttl", &self.ttl).finish()
    }
}

/// A freshly issued token.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

impl JwtEncoder {
    /// Creates a new encoder from auth configuration.
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            ttl: Duration::minutes(config.jwt_access_ttl_minutes as i64),
        }
    }

    /// Issues a token with the configured lifetime.
    pub fn issue(&self, user_id: &str, role: UserRole) -> Result<IssuedToken, AppError> {
        self.issue_with_ttl(user_id, role, self.ttl)
    }

    /// Issues a token with an explicit lifetime (negative for already-expired).
    pub fn issue_with_ttl(
        &self,
        user_id: &str,
        role: UserRole,
        ttl: Duration,
    ) -> Result<IssuedToken, AppError> {
        let now = Utc::now();
        let expires_at = now + ttl;

        let claims = Claims {
            user_id: Some(user_id.to_string()),
            email: None,
            role: Some(role.as_str().to_string()),
            subscription: None,
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| AppError::internal(format!("Failed to encode token: {e}")))?;

        Ok(IssuedToken { token, expires_at })
    }
}
