//! Server-side broadcast endpoint used by other backend services.

use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use chrono::Utc;
use serde_json::Value;
use tracing::info;

use signalhub_realtime::EngineStats;

use crate::dto::{ApiResponse, BroadcastRequest, BroadcastResponse};
use crate::error::ApiError;
use crate::extractors::AuthUser;
use crate::state::AppState;

/// POST /api/websocket/broadcast: push a message to connected clients
pub async fn broadcast(
    State(state): State<AppState>,
    auth: AuthUser,
    body: Result<Json<BroadcastRequest>, JsonRejection>,
) -> Result<Json<BroadcastResponse>, ApiError> {
    let Json(req) = body?;

    let kind = req.kind.as_deref().filter(|k| !k.is_empty());
    let Some(kind) = kind else {
        return Err(ApiError::invalid_input("Type and data are required"));
    };
    if req.data.is_none() && kind != "activity_feed" {
        return Err(ApiError::invalid_input("Type and data are required"));
    }
    let data = req.data.unwrap_or(Value::Null);
    let engine = &state.engine;

    let delivered = match kind {
        "notification" => {
            let target = authorize_target(&auth, req.user_id.as_deref(), "notifications")?;
            usize::from(engine.send_notification(target, data))
        }
        "ai_progress" => {
            let target = authorize_target(&auth, req.user_id.as_deref(), "AI progress")?;
            usize::from(engine.send_ai_generation_progress(target, data))
        }
        "user_activity" => {
            require_admin(&auth)?;
            engine.send_user_activity(data)
        }
        "admin_alert" => {
            require_admin(&auth)?;
            engine.send_admin_alert(data)
        }
        "activity_feed" => {
            require_admin(&auth)?;
            engine.send_activity_feed().await?
        }
        _ => {
            return Err(ApiError::new(
                axum::http::StatusCode::BAD_REQUEST,
                "INVALID_TYPE",
                "Invalid broadcast type",
            ));
        }
    };

    info!(
        kind,
        sender = %auth.user_id,
        target = req.user_id.as_deref().unwrap_or("-"),
        delivered,
        "Broadcast sent"
    );

    Ok(Json(BroadcastResponse {
        success: true,
        message: format!("{kind} broadcast sent successfully"),
        timestamp: Utc::now(),
    }))
}

/// GET /api/websocket/stats: engine stats (admin only)
pub async fn stats(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ApiResponse<EngineStats>>, ApiError> {
    require_admin(&auth)?;
    Ok(Json(ApiResponse::ok(state.engine.stats())))
}

fn require_admin(auth: &AuthUser) -> Result<(), ApiError> {
    if auth.role.is_admin() {
        Ok(())
    } else {
        Err(ApiError::forbidden("Admin access required"))
    }
}

/// Non-admins may only target themselves.
fn authorize_target<'a>(
    auth: &AuthUser,
    user_id: Option<&'a str>,
    what: &str,
) -> Result<&'a str, ApiError> {
    let target = user_id
        .filter(|u| !u.is_empty())
        .ok_or_else(|| ApiError::invalid_input(format!("userId required for {what}")))?;

    if !auth.role.is_admin() && target != auth.user_id {
        return Err(ApiError::forbidden(format!(
            "Cannot send {what} to other users"
        )));
    }
    Ok(target)
}
