//! Route definitions for the SignalHub HTTP API.
//!
//! REST routes are mounted under `/api`; the WebSocket endpoint lives at
//! `/ws`. The router receives `AppState` and passes it to all handlers via
//! Axum's `State` extractor.

use axum::{
    Router,
    routing::{get, post},
};

use crate::handlers;
use crate::state::AppState;

/// Build the Axum router with all routes.
pub fn build_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .merge(health_routes())
        .merge(broadcast_routes());

    let ws_routes = Router::new().route("/ws", get(handlers::ws::ws_handler));

    Router::new()
        .nest("/api", api_routes)
        .merge(ws_routes)
        .with_state(state)
}

/// Liveness and readiness
fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route("/health/detailed", get(handlers::health::health_detailed))
}

/// Server-initiated pushes and engine stats
fn broadcast_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/websocket/broadcast",
            post(handlers::broadcast::broadcast),
        )
        .route("/websocket/stats", get(handlers::broadcast::stats))
}
