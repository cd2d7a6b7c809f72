//! Engine counters.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

/// Engine-level metrics counters.
#[derive(Debug, Default)]
pub struct EngineMetrics {
    /// Total frames queued to clients
    pub messages_sent: AtomicU64,
    /// Total text frames received
    pub messages_received: AtomicU64,
    /// Frames not queued (full buffer or closed connection)
    pub messages_dropped: AtomicU64,
    /// Inbound frames answered with an `error`
    pub protocol_errors: AtomicU64,
    /// Total connections established
    pub connections_total: AtomicU64,
    /// Total connections currently active
    pub connections_active: AtomicU64,
    /// Total subscribe operations that added a subscription
    pub subscriptions_total: AtomicU64,
}

impl EngineMetrics {
    /// Create new zeroed metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a new connection
    pub fn record_connect(&self) {
        self.connections_total.fetch_add(1, Ordering::Relaxed);
        self.connections_active.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a disconnection
    pub fn record_disconnect(&self) {
        // Saturates at zero.
        let _ = self
            .connections_active
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_sub(1));
    }

    /// Record `delivered` queued frames out of `attempted`.
    pub fn record_delivery(&self, attempted: usize, delivered: usize) {
        self.messages_sent
            .fetch_add(delivered as u64, Ordering::Relaxed);
        self.messages_dropped
            .fetch_add(attempted.saturating_sub(delivered) as u64, Ordering::Relaxed);
    }

    /// Record an inbound text frame
    pub fn record_received(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an `error` reply
    pub fn record_protocol_error(&self) {
        self.protocol_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a new subscription
    pub fn record_subscription(&self) {
        self.subscriptions_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_dropped: self.messages_dropped.load(Ordering::Relaxed),
            protocol_errors: self.protocol_errors.load(Ordering::Relaxed),
            connections_total: self.connections_total.load(Ordering::Relaxed),
            connections_active: self.connections_active.load(Ordering::Relaxed),
            subscriptions_total: self.subscriptions_total.load(Ordering::Relaxed),
        }
    }
}

/// Serializable counter snapshot
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterSnapshot {
    /// Total frames queued to clients
    pub messages_sent: u64,
    /// Total text frames received
    pub messages_received: u64,
    /// Frames dropped
    pub messages_dropped: u64,
    /// Protocol errors answered
    pub protocol_errors: u64,
    /// Total connections ever established
    pub connections_total: u64,
    /// Currently active connections
    pub connections_active: u64,
    /// Total subscribe operations
    pub subscriptions_total: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disconnect_never_underflows() {
        let metrics = EngineMetrics::new();
        metrics.record_connect();
        metrics.record_disconnect();
        metrics.record_disconnect();
        let snap = metrics.snapshot();
        assert_eq!(snap.connections_active, 0);
        assert_eq!(snap.connections_total, 1);
    }

    #[test]
    fn test_delivery_counts_drops() {
        let metrics = EngineMetrics::new();
        metrics.record_delivery(5, 3);
        let snap = metrics.snapshot();
        assert_eq!(snap.messages_sent, 3);
        assert_eq!(snap.messages_dropped, 2);
    }
}
