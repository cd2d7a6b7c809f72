//! Application builder: wires router + middleware + state into an Axum app.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::trace::TraceLayer;

use signalhub_auth::JwtDecoder;
use signalhub_core::config::{AppConfig, CorsConfig};
use signalhub_core::error::AppError;
use signalhub_database::{DatabasePool, EventRepository, MetricsRepository, UserRepository};
use signalhub_realtime::{Collaborators, RealtimeEngine, WsAuthenticator};

use crate::middleware::cors::build_cors_layer;
use crate::router::build_router;
use crate::state::AppState;

/// Builds the complete Axum application with all routes and middleware.
pub fn build_app(state: AppState, cors_config: &CorsConfig) -> Router {
    build_router(state)
        .layer(build_cors_layer(cors_config))
        .layer(TraceLayer::new_for_http())
}

/// Runs the SignalHub server with the given configuration until Ctrl-C or
/// SIGTERM, then closes every connection and stops.
pub async fn run_server(config: AppConfig) -> Result<(), AppError> {
    tracing::info!("Starting SignalHub server...");

    // ── Step 1: Database ─────────────────────────────────────────
    let db = DatabasePool::connect(&config.database).await?;
    let users = Arc::new(UserRepository::new(db.pool().clone()));
    let metrics = Arc::new(MetricsRepository::new(db.pool().clone()));
    let events = Arc::new(EventRepository::new(db.pool().clone()));

    // ── Step 2: Auth ─────────────────────────────────────────────
    let decoder = Arc::new(JwtDecoder::new(&config.auth));
    let authenticator = WsAuthenticator::new(decoder, users.clone());

    // ── Step 3: Real-time engine ─────────────────────────────────
    let engine = Arc::new(RealtimeEngine::new(
        config.realtime.clone(),
        Collaborators {
            metrics,
            activity: events,
            health: users.clone(),
        },
    ));
    engine.start()?;

    // ── Step 4: HTTP server ──────────────────────────────────────
    let state = AppState {
        config: Arc::new(config.clone()),
        engine: engine.clone(),
        authenticator,
        database: users,
    };

    let app = build_app(state, &config.server.cors);
    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| AppError::internal(format!("Failed to bind {addr}: {e}")))?;

    tracing::info!("SignalHub server listening on {}", addr);

    let grace = Duration::from_secs(config.server.shutdown_grace_seconds);
    let shutdown_engine = engine.clone();
    let server = axum::serve(listener, app).with_graceful_shutdown(async move {
        shutdown_signal().await;
        // Upgraded sockets are not tracked by the server; close them first.
        shutdown_engine.shutdown(grace).await;
    });

    server
        .await
        .map_err(|e| AppError::internal(format!("Server error: {e}")))?;

    db.close().await;
    tracing::info!("SignalHub server stopped");
    Ok(())
}

/// Resolves on Ctrl-C or, on Unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
