//! Application state shared across all handlers.

use std::sync::Arc;

use signalhub_core::config::AppConfig;
use signalhub_core::traits::HealthProbe;
use signalhub_realtime::{RealtimeEngine, WsAuthenticator};

/// Application state passed to every Axum handler via `State<AppState>`.
/// All fields are `Arc`-wrapped or cheap to clone.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// The broadcast engine
    pub engine: Arc<RealtimeEngine>,
    /// Token + identity store admission
    pub authenticator: WsAuthenticator,
    /// Database reachability for the detailed health endpoint
    pub database: Arc<dyn HealthProbe>,
}
