//! Application configuration schemas.
//!
//! All configuration structs are deserialized via the `config` crate from a
//! TOML file, an optional environment overlay, and `SIGNALHUB__*`
//! environment variables. Each sub-module represents one section.

pub mod app;
pub mod auth;
pub mod database;
pub mod logging;
pub mod realtime;

use std::path::Path;

use serde::{Deserialize, Serialize};

pub use self::app::{CorsConfig, ServerConfig};
pub use self::auth::AuthConfig;
pub use self::database::DatabaseConfig;
pub use self::logging::LoggingConfig;
pub use self::realtime::{DuplicateConnectionPolicy, RealtimeConfig};

use crate::error::AppError;

/// Prefix for environment variable overrides (`SIGNALHUB__SERVER__PORT=4000`).
const ENV_PREFIX: &str = "SIGNALHUB";

/// Root application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database connection settings.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token verification settings.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Real-time gateway settings.
    #[serde(default)]
    pub realtime: RealtimeConfig,
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    ///
    /// `path` is the base file (e.g. `config/default.toml`). When `env` is
    /// given, `<dir>/<env>.toml` next to it is layered on top. Environment
    /// variables prefixed with `SIGNALHUB__` win over both. Missing files are
    /// not an error; every field has a default.
    pub fn load(path: &str, env: Option<&str>) -> Result<Self, AppError> {
        let mut builder = config::Config::builder()
            .add_source(config::File::with_name(path).required(false));

        if let Some(env) = env {
            let dir = Path::new(path)
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let overlay = dir.join(env);
            builder = builder.add_source(
                config::File::with_name(&overlay.to_string_lossy()).required(false),
            );
        }

        let config = builder
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .map_err(|e| AppError::configuration(format!("Failed to build config: {e}")))?;

        let config: Self = config
            .try_deserialize()
            .map_err(|e| AppError::configuration(format!("Failed to deserialize config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Check cross-field constraints that serde defaults cannot express.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.realtime.heartbeat_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.heartbeat_interval_seconds must be greater than zero",
            ));
        }
        if self.realtime.snapshot_interval_seconds == 0 {
            return Err(AppError::configuration(
                "realtime.snapshot_interval_seconds must be greater than zero",
            ));
        }
        if self.realtime.outbound_buffer_size == 0 {
            return Err(AppError::configuration(
                "realtime.outbound_buffer_size must be greater than zero",
            ));
        }
        if self.auth.jwt_secret.is_empty() {
            return Err(AppError::configuration("auth.jwt_secret must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_yields_defaults() {
        let config = AppConfig::load("does/not/exist", Some("nowhere")).unwrap();
        assert_eq!(config.server.port, 3001);
        assert_eq!(config.realtime.heartbeat_interval_seconds, 30);
        assert_eq!(
            config.realtime.duplicate_connection_policy,
            DuplicateConnectionPolicy::Replace
        );
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let mut config = AppConfig::default();
        config.realtime.heartbeat_interval_seconds = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_empty_secret() {
        let mut config = AppConfig::default();
        config.auth.jwt_secret.clear();
        assert!(config.validate().is_err());
    }
}
