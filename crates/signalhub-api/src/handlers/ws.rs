//! WebSocket upgrade handler.

use axum::extract::ws::{CloseFrame, Message, WebSocket};
use axum::extract::{Query, State, WebSocketUpgrade};
use axum::response::Response;
use bytes::Bytes;
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use signalhub_core::types::Identity;
use signalhub_realtime::Frame;
use signalhub_realtime::connection::CloseCode;

use crate::error::ApiError;
use crate::state::AppState;

/// Query parameters for WebSocket authentication.
#[derive(Debug, serde::Deserialize)]
pub struct WsQuery {
    /// JWT access token.
    #[serde(default)]
    pub token: Option<String>,
}

/// GET /ws?token={jwt}: WebSocket upgrade
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<WsQuery>,
    ws: WebSocketUpgrade,
) -> Result<Response, ApiError> {
    // Authenticate before upgrade
    let identity = state
        .authenticator
        .authenticate(query.token.as_deref())
        .await?;
    state.engine.check_admission(&identity.user_id)?;

    Ok(ws.on_upgrade(move |socket| handle_ws_connection(state, identity, socket)))
}

/// Handles an established WebSocket connection.
async fn handle_ws_connection(state: AppState, identity: Identity, mut socket: WebSocket) {
    let engine = state.engine;

    let (handle, outbound_rx) = match engine.admit(&identity) {
        Ok(admitted) => admitted,
        Err(e) => {
            warn!(user_id = %identity.user_id, error = %e, "Connection refused after upgrade");
            let _ = socket
                .send(Message::Close(Some(CloseFrame {
                    code: CloseCode::POLICY,
                    reason: e.message.into(),
                })))
                .await;
            return;
        }
    };

    let (ws_tx, mut ws_rx) = socket.split();
    let cancel = handle.cancellation().clone();

    // Outbound forwarder; shutdown waits for it to flush the close frame.
    let writer = engine.spawn_connection_task(write_loop(ws_tx, outbound_rx, cancel.clone()));

    loop {
        let next = tokio::select! {
            _ = cancel.cancelled() => break,
            next = ws_rx.next() => next,
        };

        match next {
            Some(Ok(Message::Text(text))) => {
                engine.handle_inbound(&handle, text.as_str()).await;
            }
            Some(Ok(Message::Binary(data))) => {
                // Decoded like text; invalid UTF-8 fails JSON parsing.
                engine
                    .handle_inbound(&handle, &String::from_utf8_lossy(&data))
                    .await;
            }
            Some(Ok(Message::Pong(_))) => handle.record_pong(),
            Some(Ok(Message::Close(_))) | None => break,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!(conn_id = %handle.id, error = %e, "WebSocket read error");
                break;
            }
        }
    }

    // Cleanup
    engine.disconnect(&handle);
    cancel.cancel();
    let _ = writer.await;
}

/// Drain the connection's outbound queue to the socket until the queue
/// closes, a close frame has been written, or the connection is cancelled.
async fn write_loop(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<Frame>,
    cancel: CancellationToken,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            frame = outbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let closing = matches!(frame, Frame::Close { .. });
        if sink.send(to_message(frame)).await.is_err() {
            break;
        }
        if closing {
            break;
        }
    }

    let _ = sink.close().await;
    cancel.cancel();
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Ping => Message::Ping(Bytes::new()),
        Frame::Close { code, reason } => Message::Close(Some(CloseFrame {
            code,
            reason: reason.into(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_close_frame_carries_code_and_reason() {
        let msg = to_message(Frame::Close {
            code: CloseCode::REPLACED,
            reason: "replaced".to_string(),
        });
        match msg {
            Message::Close(Some(frame)) => {
                assert_eq!(frame.code, 4000);
                assert_eq!(frame.reason.as_str(), "replaced");
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_ping_frame_is_empty() {
        assert!(matches!(to_message(Frame::Ping), Message::Ping(p) if p.is_empty()));
    }
}
