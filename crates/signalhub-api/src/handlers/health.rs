//! Health check handlers.

use axum::Json;
use axum::extract::State;

use crate::dto::{ApiResponse, DetailedHealthResponse, HealthResponse};
use crate::state::AppState;

/// GET /api/health: basic health check
pub async fn health(State(state): State<AppState>) -> Json<ApiResponse<HealthResponse>> {
    Json(ApiResponse::ok(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_seconds: state.engine.snapshots().uptime().as_secs(),
    }))
}

/// GET /api/health/detailed: engine stats and database reachability
pub async fn health_detailed(
    State(state): State<AppState>,
) -> Json<ApiResponse<DetailedHealthResponse>> {
    let latency = state.database.probe().await.ok();

    let (status, database) = match latency {
        Some(_) => ("ok", "connected"),
        None => ("degraded", "disconnected"),
    };

    Json(ApiResponse::ok(DetailedHealthResponse {
        status: status.to_string(),
        database: database.to_string(),
        database_latency_ms: latency.map(|d| d.as_millis() as u64),
        realtime: state.engine.stats(),
    }))
}
