//! Reverse index from channel name to subscribed identities.

use std::collections::{HashMap, HashSet};

/// `channel → identities`. Empty channels are pruned.
#[derive(Debug, Default)]
pub struct ChannelIndex {
    channels: HashMap<String, HashSet<String>>,
}

impl ChannelIndex {
    /// Add `user_id` to `channel`, creating the channel. Returns whether it was new.
    pub fn insert(&mut self, channel: &str, user_id: &str) -> bool {
        self.channels
            .entry(channel.to_string())
            .or_default()
            .insert(user_id.to_string())
    }

    /// Remove `user_id` from `channel`. Returns whether it was present.
    pub fn remove(&mut self, channel: &str, user_id: &str) -> bool {
        let Some(members) = self.channels.get_mut(channel) else {
            return false;
        };
        let removed = members.remove(user_id);
        if members.is_empty() {
            self.channels.remove(channel);
        }
        removed
    }

    /// Subscribers of `channel`.
    pub fn members(&self, channel: &str) -> Option<&HashSet<String>> {
        self.channels.get(channel)
    }

    /// Whether `user_id` is in `channel`.
    pub fn contains(&self, channel: &str, user_id: &str) -> bool {
        self.channels
            .get(channel)
            .is_some_and(|members| members.contains(user_id))
    }

    /// Number of non-empty channels.
    pub fn len(&self) -> usize {
        self.channels.len()
    }

    /// Whether no channel has subscribers.
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    /// Iterate `(channel, members)`.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &HashSet<String>)> {
        self.channels.iter()
    }

    /// Remove everything.
    pub fn clear(&mut self) {
        self.channels.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_channel_is_pruned() {
        let mut index = ChannelIndex::default();
        assert!(index.insert("metrics", "u1"));
        assert!(!index.insert("metrics", "u1"));
        assert_eq!(index.len(), 1);
        assert!(index.remove("metrics", "u1"));
        assert!(index.is_empty());
        assert!(!index.remove("metrics", "u1"));
    }
}
