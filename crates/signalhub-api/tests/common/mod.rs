//! Shared helpers: an app over in-memory collaborators, served on a random
//! local port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::net::TcpStream;
use tokio::time;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use signalhub_api::{AppState, build_app};
use signalhub_auth::JwtDecoder;
use signalhub_core::config::{AppConfig, DuplicateConnectionPolicy};
use signalhub_core::traits::UsageMetrics;
use signalhub_core::types::UserRole;
use signalhub_realtime::testing::{
    FakeActivitySource, FakeHealthProbe, FakeIdentityStore, FakeMetricsSource, auth_config,
};
use signalhub_realtime::{Collaborators, RealtimeEngine, WsAuthenticator};

pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

pub const ALICE: &str = "user-alice";
pub const BOB: &str = "user-bob";
pub const ADMIN: &str = "user-admin";

pub fn test_config(policy: DuplicateConnectionPolicy) -> AppConfig {
    let mut config = AppConfig::default();
    config.auth = auth_config();
    config.realtime.snapshot_interval_seconds = 1;
    config.realtime.duplicate_connection_policy = policy;
    config
}

pub fn test_state(config: AppConfig) -> AppState {
    let identities = Arc::new(FakeIdentityStore::with_users([
        (ALICE, UserRole::User),
        (BOB, UserRole::User),
        (ADMIN, UserRole::Admin),
    ]));
    let health = Arc::new(FakeHealthProbe::up(Duration::from_millis(3)));

    let engine = Arc::new(RealtimeEngine::new(
        config.realtime.clone(),
        Collaborators {
            metrics: Arc::new(FakeMetricsSource::new(UsageMetrics {
                active_users: 7,
                total_users: 42,
                ai_requests: 3,
                revenue: 1234.5,
            })),
            activity: Arc::new(FakeActivitySource::sample(&[
                ("user_signup", Some("Ada")),
                ("ai_generation", None),
            ])),
            health: health.clone(),
        },
    ));

    AppState {
        authenticator: WsAuthenticator::new(Arc::new(JwtDecoder::new(&config.auth)), identities),
        config: Arc::new(config),
        engine,
        database: health,
    }
}

/// Serve the app with a started engine. Returns the bound address.
pub async fn start_server(state: AppState) -> SocketAddr {
    state.engine.start().expect("engine start");
    let app = build_app(state.clone(), &state.config.server.cors);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind");
    let addr = listener.local_addr().expect("local addr");

    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("serve");
    });

    addr
}

pub async fn connect(addr: SocketAddr, token: &str) -> WsClient {
    let url = format!("ws://{addr}/ws?token={token}");
    let (ws, _) = tokio_tungstenite::connect_async(&url)
        .await
        .expect("ws connect");
    ws
}

/// Next text frame as JSON, skipping pings.
pub async fn next_json(ws: &mut WsClient) -> serde_json::Value {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .expect("timeout waiting for frame")
            .expect("stream ended")
            .expect("ws read error");
        match msg {
            Message::Text(text) => return serde_json::from_str(&text).expect("parse frame"),
            Message::Ping(_) | Message::Pong(_) => continue,
            other => panic!("unexpected message: {other:?}"),
        }
    }
}

/// Read until a close frame arrives.
pub async fn next_close(ws: &mut WsClient) -> Option<CloseFrame> {
    loop {
        let msg = time::timeout(Duration::from_secs(5), ws.next())
            .await
            .ok()??;
        match msg {
            Ok(Message::Close(frame)) => return frame,
            Ok(_) => continue,
            Err(_) => return None,
        }
    }
}

/// Poll `check` until it holds or a second passes.
pub async fn eventually(mut check: impl FnMut() -> bool) -> bool {
    for _ in 0..100 {
        if check() {
            return true;
        }
        time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
