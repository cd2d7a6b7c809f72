//! Connection directory: who is connected and what they subscribe to.
//!
//! Both indices (identity → subscriptions and channel → identities) sit
//! behind one mutex so every mutation updates them together, and so a
//! publish sees exactly the subscribers present when it takes the lock.
//! Nothing in here awaits; delivery is a non-blocking enqueue.

pub mod channel_index;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

use signalhub_core::config::DuplicateConnectionPolicy;
use signalhub_core::error::AppError;

use crate::connection::handle::{CloseCode, ConnectionHandle, ConnectionId};
use crate::message::Envelope;

pub use channel_index::ChannelIndex;

/// A registered connection and its subscriptions.
#[derive(Debug)]
pub struct ConnectionEntry {
    /// The connection.
    pub handle: Arc<ConnectionHandle>,
    /// Channels this identity subscribes to.
    pub subscriptions: HashSet<String>,
}

#[derive(Debug, Default)]
struct DirectoryState {
    connections: HashMap<String, ConnectionEntry>,
    channels: ChannelIndex,
}

impl DirectoryState {
    /// Remove an entry and sweep its own subscriptions out of the channel index.
    fn remove_entry(&mut self, user_id: &str) -> Option<ConnectionEntry> {
        let entry = self.connections.remove(user_id)?;
        for channel in &entry.subscriptions {
            self.channels.remove(channel, user_id);
        }
        Some(entry)
    }

    fn deliver(&self, user_id: &str, text: &str) -> bool {
        self.connections
            .get(user_id)
            .is_some_and(|entry| entry.handle.send_text(text.to_string()))
    }
}

/// Outcome of [`Directory::register`].
#[derive(Debug)]
pub enum Registration {
    /// No previous connection for this identity.
    New,
    /// A previous connection was closed and replaced.
    Replaced(Arc<ConnectionHandle>),
}

/// Registry of live connections plus the channel index.
#[derive(Debug)]
pub struct Directory {
    state: Mutex<DirectoryState>,
    policy: DuplicateConnectionPolicy,
    max_subscriptions: usize,
}

impl Directory {
    /// Create an empty directory.
    pub fn new(policy: DuplicateConnectionPolicy, max_subscriptions: usize) -> Self {
        Self {
            state: Mutex::new(DirectoryState::default()),
            policy,
            max_subscriptions,
        }
    }

    /// The duplicate-identity policy in force.
    pub fn policy(&self) -> DuplicateConnectionPolicy {
        self.policy
    }

    /// Register a connection.
    ///
    /// Under `reject`, an identity that is already connected yields a
    /// conflict and the existing connection is untouched. Under `replace`,
    /// the old connection is closed with 4000 and its subscriptions dropped.
    pub fn register(&self, handle: Arc<ConnectionHandle>) -> Result<Registration, AppError> {
        let mut state = self.state.lock();

        let registration = if state.connections.contains_key(&handle.user_id) {
            if self.policy == DuplicateConnectionPolicy::Reject {
                return Err(AppError::conflict(format!(
                    "User {} is already connected",
                    handle.user_id
                )));
            }
            match state.remove_entry(&handle.user_id) {
                Some(previous) => {
                    previous.handle.close(CloseCode::REPLACED, "replaced");
                    info!(
                        user_id = %handle.user_id,
                        old_conn_id = %previous.handle.id,
                        conn_id = %handle.id,
                        "Replaced existing connection"
                    );
                    Registration::Replaced(previous.handle)
                }
                None => Registration::New,
            }
        } else {
            Registration::New
        };

        state.connections.insert(
            handle.user_id.clone(),
            ConnectionEntry {
                handle,
                subscriptions: HashSet::new(),
            },
        );
        Ok(registration)
    }

    /// Remove an identity and all its subscriptions.
    pub fn deregister(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        let entry = self.state.lock().remove_entry(user_id)?;
        debug!(user_id, conn_id = %entry.handle.id, "Deregistered connection");
        Some(entry.handle)
    }

    /// Like [`deregister`](Self::deregister), but only if `conn_id` is still
    /// the registered connection for `user_id`.
    pub fn deregister_connection(
        &self,
        user_id: &str,
        conn_id: ConnectionId,
    ) -> Option<Arc<ConnectionHandle>> {
        let mut state = self.state.lock();
        if state.connections.get(user_id)?.handle.id != conn_id {
            return None;
        }
        let entry = state.remove_entry(user_id)?;
        debug!(user_id, conn_id = %conn_id, "Deregistered connection");
        Some(entry.handle)
    }

    /// The registered connection for `user_id`.
    pub fn lookup(&self, user_id: &str) -> Option<Arc<ConnectionHandle>> {
        self.state
            .lock()
            .connections
            .get(user_id)
            .map(|entry| entry.handle.clone())
    }

    /// Whether `user_id` has a registered connection.
    pub fn is_connected(&self, user_id: &str) -> bool {
        self.state.lock().connections.contains_key(user_id)
    }

    /// Subscribe `user_id` to `channel`. Returns whether it was new.
    ///
    /// Re-subscribing is a no-op. Fails with not-found for an unregistered
    /// identity and with a validation error at the subscription limit.
    pub fn subscribe(&self, user_id: &str, channel: &str) -> Result<bool, AppError> {
        let mut state = self.state.lock();
        let DirectoryState {
            connections,
            channels,
        } = &mut *state;

        let entry = connections
            .get_mut(user_id)
            .ok_or_else(|| AppError::not_found(format!("User {user_id} is not connected")))?;

        if entry.subscriptions.contains(channel) {
            return Ok(false);
        }
        if entry.subscriptions.len() >= self.max_subscriptions {
            return Err(AppError::validation(format!(
                "Subscription limit of {} reached",
                self.max_subscriptions
            )));
        }

        entry.subscriptions.insert(channel.to_string());
        channels.insert(channel, user_id);
        debug!(user_id, channel, "Subscribed");
        Ok(true)
    }

    /// Unsubscribe `user_id` from `channel`. Returns whether it was subscribed.
    pub fn unsubscribe(&self, user_id: &str, channel: &str) -> bool {
        let mut state = self.state.lock();
        let removed = state
            .connections
            .get_mut(user_id)
            .is_some_and(|entry| entry.subscriptions.remove(channel));
        if removed {
            state.channels.remove(channel, user_id);
            debug!(user_id, channel, "Unsubscribed");
        }
        removed
    }

    /// Deliver to every subscriber of `channel`. Returns how many accepted it.
    pub fn publish(&self, channel: &str, envelope: &Envelope) -> usize {
        let Some(text) = serialize(envelope) else {
            return 0;
        };
        let state = self.state.lock();
        let Some(members) = state.channels.members(channel) else {
            return 0;
        };
        members
            .iter()
            .filter(|user_id| state.deliver(user_id, &text))
            .count()
    }

    /// Deliver to one identity. Returns whether it was queued.
    pub fn send_to(&self, user_id: &str, envelope: &Envelope) -> bool {
        let Some(text) = serialize(envelope) else {
            return false;
        };
        self.state.lock().deliver(user_id, &text)
    }

    /// Deliver to every connection.
    pub fn broadcast_all(&self, envelope: &Envelope) -> usize {
        self.broadcast_where(envelope, |_| true)
    }

    /// Deliver to connections whose role is admin.
    pub fn broadcast_admins(&self, envelope: &Envelope) -> usize {
        self.broadcast_where(envelope, |handle| handle.role.is_admin())
    }

    fn broadcast_where(
        &self,
        envelope: &Envelope,
        filter: impl Fn(&ConnectionHandle) -> bool,
    ) -> usize {
        let Some(text) = serialize(envelope) else {
            return 0;
        };
        self.state
            .lock()
            .connections
            .values()
            .filter(|entry| filter(&entry.handle))
            .filter(|entry| entry.handle.send_text(text.clone()))
            .count()
    }

    /// Channels `user_id` subscribes to, sorted.
    pub fn subscriptions(&self, user_id: &str) -> Option<Vec<String>> {
        let state = self.state.lock();
        let mut subs: Vec<String> = state
            .connections
            .get(user_id)?
            .subscriptions
            .iter()
            .cloned()
            .collect();
        subs.sort();
        Some(subs)
    }

    /// Identities subscribed to `channel`, sorted.
    pub fn channel_subscribers(&self, channel: &str) -> Vec<String> {
        let state = self.state.lock();
        let mut members: Vec<String> = state
            .channels
            .members(channel)
            .map(|m| m.iter().cloned().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Number of registered connections.
    pub fn connection_count(&self) -> usize {
        self.state.lock().connections.len()
    }

    /// Number of channels with at least one subscriber.
    pub fn channel_count(&self) -> usize {
        self.state.lock().channels.len()
    }

    /// All registered handles.
    pub fn handles(&self) -> Vec<Arc<ConnectionHandle>> {
        self.state
            .lock()
            .connections
            .values()
            .map(|entry| entry.handle.clone())
            .collect()
    }

    /// Remove everything, returning the handles that were registered.
    pub fn drain(&self) -> Vec<Arc<ConnectionHandle>> {
        let mut state = self.state.lock();
        state.channels.clear();
        state
            .connections
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect()
    }

    /// Both indices agree: `u ∈ channel(c) ⟺ c ∈ subscriptions(u)`.
    #[cfg(test)]
    pub(crate) fn is_consistent(&self) -> bool {
        let state = self.state.lock();
        let forward = state.connections.iter().all(|(user_id, entry)| {
            entry
                .subscriptions
                .iter()
                .all(|channel| state.channels.contains(channel, user_id))
        });
        let reverse = state.channels.iter().all(|(channel, members)| {
            !members.is_empty()
                && members.iter().all(|user_id| {
                    state
                        .connections
                        .get(user_id)
                        .is_some_and(|entry| entry.subscriptions.contains(channel))
                })
        });
        forward && reverse
    }
}

fn serialize(envelope: &Envelope) -> Option<String> {
    match envelope.to_json() {
        Ok(text) => Some(text),
        Err(e) => {
            tracing::error!(kind = envelope.kind(), "Failed to serialize envelope: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::handle::Frame;
    use crate::message::ServerMessage;
    use signalhub_core::error::ErrorKind;
    use signalhub_core::types::{Identity, UserRole};
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    fn connect(
        dir: &Directory,
        user_id: &str,
        role: UserRole,
    ) -> (Arc<ConnectionHandle>, mpsc::Receiver<Frame>) {
        let (tx, rx) = mpsc::channel(16);
        let handle = Arc::new(ConnectionHandle::new(
            &Identity::new(user_id, role),
            tx,
            CancellationToken::new(),
        ));
        dir.register(handle.clone()).unwrap();
        (handle, rx)
    }

    fn directory() -> Directory {
        Directory::new(DuplicateConnectionPolicy::Replace, 8)
    }

    fn note(text: &str) -> Envelope {
        Envelope::new(ServerMessage::Notification(serde_json::json!({ "text": text })))
    }

    fn texts(rx: &mut mpsc::Receiver<Frame>) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(frame) = rx.try_recv() {
            if let Frame::Text(t) = frame {
                out.push(t);
            }
        }
        out
    }

    #[test]
    fn test_indices_stay_consistent_under_mixed_operations() {
        let dir = directory();
        let users = ["a", "b", "c", "d"];
        let channels = ["metrics", "system_health", "user_activity"];
        let _rxs: Vec<_> = users
            .iter()
            .map(|u| connect(&dir, u, UserRole::User).1)
            .collect();

        // Deterministic pseudo-random walk over subscribe/unsubscribe/deregister.
        let mut seed: u32 = 7;
        for step in 0..400 {
            seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
            let user = users[(seed >> 8) as usize % users.len()];
            let channel = channels[(seed >> 16) as usize % channels.len()];
            match (seed >> 24) % 5 {
                0 | 1 => {
                    let _ = dir.subscribe(user, channel);
                }
                2 | 3 => {
                    dir.unsubscribe(user, channel);
                }
                _ => {
                    if dir.deregister(user).is_some() {
                        let (tx, _rx) = mpsc::channel(1);
                        let handle = ConnectionHandle::new(
                            &Identity::new(user, UserRole::User),
                            tx,
                            CancellationToken::new(),
                        );
                        dir.register(Arc::new(handle)).unwrap();
                    }
                }
            }
            assert!(dir.is_consistent(), "inconsistent after step {step}");
        }
    }

    #[test]
    fn test_deregister_sweeps_every_channel() {
        let dir = directory();
        let (_a, _rx_a) = connect(&dir, "a", UserRole::User);
        let (_b, _rx_b) = connect(&dir, "b", UserRole::User);
        dir.subscribe("a", "metrics").unwrap();
        dir.subscribe("a", "system_health").unwrap();
        dir.subscribe("b", "metrics").unwrap();

        assert!(dir.deregister("a").is_some());

        assert_eq!(dir.channel_subscribers("metrics"), vec!["b".to_string()]);
        assert!(dir.channel_subscribers("system_health").is_empty());
        assert_eq!(dir.channel_count(), 1);
        assert!(dir.is_consistent());
    }

    #[test]
    fn test_publish_reaches_exactly_current_subscribers() {
        let dir = directory();
        let (_a, mut rx_a) = connect(&dir, "a", UserRole::User);
        let (_b, mut rx_b) = connect(&dir, "b", UserRole::User);
        let (_c, mut rx_c) = connect(&dir, "c", UserRole::User);
        dir.subscribe("a", "metrics").unwrap();
        dir.subscribe("b", "metrics").unwrap();
        dir.unsubscribe("b", "metrics");
        dir.subscribe("c", "other").unwrap();

        assert_eq!(dir.publish("metrics", &note("one")), 1);
        assert_eq!(texts(&mut rx_a).len(), 1);
        assert!(texts(&mut rx_b).is_empty());
        assert!(texts(&mut rx_c).is_empty());

        assert_eq!(dir.publish("nobody", &note("two")), 0);
    }

    #[test]
    fn test_subscribe_is_idempotent_and_limited() {
        let dir = Directory::new(DuplicateConnectionPolicy::Replace, 2);
        let (_a, _rx) = connect(&dir, "a", UserRole::User);
        assert!(dir.subscribe("a", "one").unwrap());
        assert!(!dir.subscribe("a", "one").unwrap());
        assert!(dir.subscribe("a", "two").unwrap());
        let err = dir.subscribe("a", "three").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation);
        assert_eq!(dir.subscriptions("a").unwrap(), vec!["one", "two"]);

        let err = dir.subscribe("ghost", "one").unwrap_err();
        assert_eq!(err.kind, ErrorKind::NotFound);
    }

    #[test]
    fn test_replace_policy_closes_previous_and_drops_its_subscriptions() {
        let dir = directory();
        let (old, mut old_rx) = connect(&dir, "a", UserRole::User);
        dir.subscribe("a", "metrics").unwrap();

        let (tx, _new_rx) = mpsc::channel(4);
        let new = Arc::new(ConnectionHandle::new(
            &Identity::new("a", UserRole::User),
            tx,
            CancellationToken::new(),
        ));
        let outcome = dir.register(new.clone()).unwrap();

        assert!(matches!(outcome, Registration::Replaced(ref h) if h.id == old.id));
        assert_eq!(
            old_rx.try_recv().unwrap(),
            Frame::Close {
                code: CloseCode::REPLACED,
                reason: "replaced".into()
            }
        );
        assert_eq!(dir.lookup("a").unwrap().id, new.id);
        assert!(dir.channel_subscribers("metrics").is_empty());

        // The replaced socket's cleanup must not evict its successor.
        assert!(dir.deregister_connection("a", old.id).is_none());
        assert!(dir.is_connected("a"));
        assert!(dir.deregister_connection("a", new.id).is_some());
        assert!(!dir.is_connected("a"));
    }

    #[test]
    fn test_reject_policy_keeps_existing() {
        let dir = Directory::new(DuplicateConnectionPolicy::Reject, 8);
        let (old, mut old_rx) = connect(&dir, "a", UserRole::User);

        let (tx, _rx) = mpsc::channel(4);
        let dup = Arc::new(ConnectionHandle::new(
            &Identity::new("a", UserRole::User),
            tx,
            CancellationToken::new(),
        ));
        let err = dir.register(dup).unwrap_err();

        assert_eq!(err.kind, ErrorKind::Conflict);
        assert_eq!(dir.lookup("a").unwrap().id, old.id);
        assert!(old_rx.try_recv().is_err());
    }

    #[test]
    fn test_broadcast_admins_filters_by_role() {
        let dir = directory();
        let (_u, mut rx_user) = connect(&dir, "user", UserRole::User);
        let (_a, mut rx_admin) = connect(&dir, "admin", UserRole::Admin);
        let (_s, mut rx_super) = connect(&dir, "root", UserRole::SuperAdmin);

        assert_eq!(dir.broadcast_admins(&note("alert")), 2);
        assert!(texts(&mut rx_user).is_empty());
        assert_eq!(texts(&mut rx_admin).len(), 1);
        assert_eq!(texts(&mut rx_super).len(), 1);

        assert_eq!(dir.broadcast_all(&note("all")), 3);
    }

    #[test]
    fn test_dead_handle_does_not_count_as_delivered() {
        let dir = directory();
        let (_a, rx_a) = connect(&dir, "a", UserRole::User);
        let (_b, _rx_b) = connect(&dir, "b", UserRole::User);
        dir.subscribe("a", "metrics").unwrap();
        dir.subscribe("b", "metrics").unwrap();
        drop(rx_a);

        assert_eq!(dir.publish("metrics", &note("x")), 1);
        assert!(!dir.lookup("a").unwrap().is_alive());
    }

    #[test]
    fn test_drain_empties_everything() {
        let dir = directory();
        let (_a, _rx) = connect(&dir, "a", UserRole::User);
        dir.subscribe("a", "metrics").unwrap();
        assert_eq!(dir.drain().len(), 1);
        assert_eq!(dir.connection_count(), 0);
        assert_eq!(dir.channel_count(), 0);
    }
}
