//! Individual WebSocket connection handle.

use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use signalhub_core::types::{Identity, UserRole};

use crate::message::Envelope;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// Close codes the gateway sends.
pub struct CloseCode;

impl CloseCode {
    /// Server is going away (shutdown).
    pub const GOING_AWAY: u16 = 1001;
    /// Policy violation (admission raced with another connection).
    pub const POLICY: u16 = 1008;
    /// Superseded by a newer connection for the same identity.
    pub const REPLACED: u16 = 4000;
}

/// Items queued for the socket writer task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A serialized envelope.
    Text(String),
    /// A WebSocket ping control frame.
    Ping,
    /// Close handshake; the writer stops after sending it.
    Close {
        /// Close code.
        code: u16,
        /// Close reason.
        reason: String,
    },
}

/// A handle to a single WebSocket connection.
///
/// Owns the sending half of the connection's bounded outbound queue; the
/// socket writer task drains the other half. Sending never blocks: a full
/// queue drops the frame.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Identity that owns this connection
    pub user_id: String,
    /// Role at admission
    pub role: UserRole,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Frame>,
    /// False once the writer is gone or the connection was terminated
    alive: AtomicBool,
    /// Set by the heartbeat probe, cleared by a pong
    awaiting_pong: AtomicBool,
    last_heartbeat: Mutex<DateTime<Utc>>,
    cancel: CancellationToken,
}

impl ConnectionHandle {
    /// Create a new connection handle
    pub fn new(identity: &Identity, sender: mpsc::Sender<Frame>, cancel: CancellationToken) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id: identity.user_id.clone(),
            role: identity.role,
            connected_at: now,
            sender,
            alive: AtomicBool::new(true),
            awaiting_pong: AtomicBool::new(false),
            last_heartbeat: Mutex::new(now),
            cancel,
        }
    }

    /// Queue a frame. Returns whether it was accepted.
    pub fn send_frame(&self, frame: Frame) -> bool {
        if !self.is_alive() {
            return false;
        }
        match self.sender.try_send(frame) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    conn_id = %self.id,
                    user_id = %self.user_id,
                    "Send buffer full, dropping frame"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                self.mark_dead();
                false
            }
        }
    }

    /// Queue a serialized text frame.
    pub fn send_text(&self, text: String) -> bool {
        self.send_frame(Frame::Text(text))
    }

    /// Serialize and queue an envelope.
    pub fn send(&self, envelope: &Envelope) -> bool {
        match envelope.to_json() {
            Ok(text) => self.send_text(text),
            Err(e) => {
                tracing::error!(conn_id = %self.id, kind = envelope.kind(), "Failed to serialize envelope: {e}");
                false
            }
        }
    }

    /// Queue a WebSocket ping.
    pub fn ping(&self) -> bool {
        self.send_frame(Frame::Ping)
    }

    /// Check if connection is alive
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Mark connection as dead
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }

    /// Flag that a probe is outstanding.
    pub fn mark_awaiting_pong(&self) {
        self.awaiting_pong.store(true, Ordering::SeqCst);
    }

    /// Withdraw an outstanding-probe flag for a probe that was never queued.
    pub fn clear_awaiting_pong(&self) {
        self.awaiting_pong.store(false, Ordering::SeqCst);
    }

    /// Whether the last probe is still unanswered.
    pub fn is_awaiting_pong(&self) -> bool {
        self.awaiting_pong.load(Ordering::SeqCst)
    }

    /// Record a pong: back to ALIVE with a fresh heartbeat timestamp.
    pub fn record_pong(&self) {
        self.awaiting_pong.store(false, Ordering::SeqCst);
        *self.last_heartbeat.lock() = Utc::now();
    }

    /// Time of the last pong (or of admission).
    pub fn last_heartbeat(&self) -> DateTime<Utc> {
        *self.last_heartbeat.lock()
    }

    /// Begin a close handshake. Falls back to [`terminate`](Self::terminate)
    /// when the close frame cannot be queued.
    pub fn close(&self, code: u16, reason: &str) {
        let queued = self.send_frame(Frame::Close {
            code,
            reason: reason.to_string(),
        });
        self.mark_dead();
        if !queued {
            self.cancel.cancel();
        }
    }

    /// Drop the connection immediately, without a close handshake.
    pub fn terminate(&self, reason: &str) {
        tracing::debug!(conn_id = %self.id, user_id = %self.user_id, reason, "Terminating connection");
        self.mark_dead();
        self.cancel.cancel();
    }

    /// Token cancelled when this connection must stop.
    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Get a snapshot of connection info
    pub fn info(&self) -> ConnectionInfo {
        ConnectionInfo {
            id: self.id,
            user_id: self.user_id.clone(),
            role: self.role,
            connected_at: self.connected_at,
            last_heartbeat: self.last_heartbeat(),
            awaiting_pong: self.is_awaiting_pong(),
        }
    }
}

/// Snapshot of connection info (serializable)
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionInfo {
    /// Connection ID
    pub id: ConnectionId,
    /// User ID
    pub user_id: String,
    /// Role
    pub role: UserRole,
    /// Connected at
    pub connected_at: DateTime<Utc>,
    /// Last pong
    pub last_heartbeat: DateTime<Utc>,
    /// Probe outstanding
    pub awaiting_pong: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle(buffer: usize) -> (ConnectionHandle, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(buffer);
        let identity = Identity::new("u1", UserRole::User);
        (ConnectionHandle::new(&identity, tx, CancellationToken::new()), rx)
    }

    #[test]
    fn test_full_buffer_drops_without_killing() {
        let (h, _rx) = handle(1);
        assert!(h.send_text("a".into()));
        assert!(!h.send_text("b".into()));
        assert!(h.is_alive());
    }

    #[test]
    fn test_closed_receiver_marks_dead() {
        let (h, rx) = handle(4);
        drop(rx);
        assert!(!h.send_text("a".into()));
        assert!(!h.is_alive());
    }

    #[test]
    fn test_pong_clears_probe() {
        let (h, _rx) = handle(4);
        h.mark_awaiting_pong();
        assert!(h.is_awaiting_pong());
        h.record_pong();
        assert!(!h.is_awaiting_pong());
    }

    #[test]
    fn test_close_queues_frame_then_stops_sending() {
        let (h, mut rx) = handle(4);
        h.close(CloseCode::REPLACED, "replaced");
        assert_eq!(
            rx.try_recv().unwrap(),
            Frame::Close {
                code: 4000,
                reason: "replaced".into()
            }
        );
        assert!(!h.send_text("late".into()));
        assert!(!h.cancellation().is_cancelled());
    }

    #[test]
    fn test_close_on_full_queue_cancels() {
        let (h, _rx) = handle(1);
        assert!(h.send_text("fill".into()));
        h.close(CloseCode::GOING_AWAY, "server shutting down");
        assert!(h.cancellation().is_cancelled());
    }

    #[test]
    fn test_terminate_cancels() {
        let (h, _rx) = handle(4);
        h.terminate("heartbeat timeout");
        assert!(!h.is_alive());
        assert!(h.cancellation().is_cancelled());
    }
}
