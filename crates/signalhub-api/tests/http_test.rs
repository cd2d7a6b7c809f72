mod common;

use axum::Router;
use axum::body::Body;
use http::{Request, StatusCode, header};
use serde_json::{Value, json};
use tower::ServiceExt;

use signalhub_api::{AppState, build_app};
use signalhub_core::config::DuplicateConnectionPolicy;
use signalhub_core::types::{Identity, UserRole};
use signalhub_realtime::Frame;
use signalhub_realtime::testing::issue_token;

use common::*;

fn app(state: &AppState) -> Router {
    build_app(state.clone(), &state.config.server.cors)
}

async fn send(app: Router, req: Request<Body>) -> (StatusCode, Value) {
    let resp = app.oneshot(req).await.expect("oneshot");
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
        .await
        .expect("body");
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn post_broadcast(token: Option<&str>, body: Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/api/websocket/broadcast")
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    builder.body(Body::empty()).expect("request")
}

fn state() -> AppState {
    test_state(test_config(DuplicateConnectionPolicy::Replace))
}

fn text_frames(rx: &mut tokio::sync::mpsc::Receiver<Frame>) -> Vec<Value> {
    let mut out = Vec::new();
    while let Ok(frame) = rx.try_recv() {
        if let Frame::Text(text) = frame {
            out.push(serde_json::from_str(&text).expect("frame json"));
        }
    }
    out
}

#[tokio::test]
async fn health_reports_version_and_uptime() {
    let state = state();
    let (status, body) = send(app(&state), get("/api/health", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "ok");
    assert_eq!(body["data"]["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn detailed_health_includes_engine_and_database() {
    let state = state();
    let (status, body) = send(app(&state), get("/api/health/detailed", None)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["database"], "connected");
    assert_eq!(body["data"]["realtime"]["connectedClients"], 0);
    assert_eq!(body["data"]["realtime"]["state"], "init");
}

#[tokio::test]
async fn broadcast_requires_bearer_token() {
    let state = state();
    let (status, body) = send(
        app(&state),
        post_broadcast(None, json!({"type": "admin_alert", "data": {}})),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn broadcast_validates_type_and_data() {
    let state = state();
    let token = issue_token(ADMIN, UserRole::Admin);

    let (status, body) = send(
        app(&state),
        post_broadcast(Some(&token), json!({"type": "notification"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_INPUT");
    assert_eq!(body["error"]["message"], "Type and data are required");

    let (status, body) = send(
        app(&state),
        post_broadcast(Some(&token), json!({"type": "carrier_pigeon", "data": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "INVALID_TYPE");

    let (status, body) = send(
        app(&state),
        post_broadcast(Some(&token), json!({"type": "notification", "data": {}})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "userId required for notifications");
}

#[tokio::test]
async fn non_admin_cannot_send_admin_broadcasts() {
    let state = state();
    let token = issue_token(ALICE, UserRole::User);

    for kind in ["admin_alert", "user_activity", "activity_feed"] {
        let (status, body) = send(
            app(&state),
            post_broadcast(Some(&token), json!({"type": kind, "data": {}})),
        )
        .await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{kind}");
        assert_eq!(body["error"]["message"], "Admin access required");
    }
}

#[tokio::test]
async fn non_admin_may_only_notify_themselves() {
    let state = state();
    let (_handle, mut rx) = state
        .engine
        .admit(&Identity::new(ALICE, UserRole::User))
        .expect("admit");
    text_frames(&mut rx);

    let token = issue_token(ALICE, UserRole::User);
    let (status, body) = send(
        app(&state),
        post_broadcast(
            Some(&token),
            json!({"type": "notification", "userId": BOB, "data": {"title": "hi"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["message"], "Cannot send notifications to other users");

    let (status, body) = send(
        app(&state),
        post_broadcast(
            Some(&token),
            json!({"type": "ai_progress", "userId": ALICE, "data": {"progress": 50}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["message"], "ai_progress broadcast sent successfully");

    let frames = text_frames(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "ai_generation_progress");
    assert_eq!(frames[0]["payload"]["progress"], 50);
}

#[tokio::test]
async fn admin_alert_reaches_only_admins() {
    let state = state();
    let (_admin, mut admin_rx) = state
        .engine
        .admit(&Identity::new(ADMIN, UserRole::Admin))
        .expect("admit");
    let (_user, mut user_rx) = state
        .engine
        .admit(&Identity::new(BOB, UserRole::User))
        .expect("admit");
    text_frames(&mut admin_rx);
    text_frames(&mut user_rx);

    let token = issue_token(ADMIN, UserRole::Admin);
    let (status, _) = send(
        app(&state),
        post_broadcast(
            Some(&token),
            json!({"type": "admin_alert", "data": {"level": "critical"}}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let frames = text_frames(&mut admin_rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "admin_alert");
    assert!(text_frames(&mut user_rx).is_empty());
}

#[tokio::test]
async fn activity_feed_needs_no_data() {
    let state = state();
    let (_admin, mut rx) = state
        .engine
        .admit(&Identity::new(ADMIN, UserRole::Admin))
        .expect("admit");
    state
        .engine
        .directory()
        .subscribe(ADMIN, "user_activity")
        .expect("subscribe");
    text_frames(&mut rx);

    let token = issue_token(ADMIN, UserRole::Admin);
    let (status, _) = send(
        app(&state),
        post_broadcast(Some(&token), json!({"type": "activity_feed"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let frames = text_frames(&mut rx);
    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0]["type"], "activity_feed");
    assert_eq!(frames[0]["payload"].as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn stats_is_admin_only() {
    let state = state();

    let (status, _) = send(
        app(&state),
        get("/api/websocket/stats", Some(&issue_token(BOB, UserRole::User))),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        app(&state),
        get("/api/websocket/stats", Some(&issue_token(ADMIN, UserRole::Admin))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["connectedClients"], 0);
}
