//! Recent-message index: a short-lived window of user command invocations.
//!
//! Game replies do not always say who they are about. The index keeps the
//! recent human messages per channel so a classifier can find the command
//! that most plausibly triggered a reply.

use chrono::{DateTime, TimeDelta, Utc};
use regex::Regex;
use sapling_core::{error::SaplingError, message::IncomingMessage};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use tracing::debug;

/// A recorded command invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct RecentMessage {
    pub message_id: u64,
    pub channel_id: u64,
    pub author_id: u64,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl From<&IncomingMessage> for RecentMessage {
    fn from(message: &IncomingMessage) -> Self {
        Self {
            message_id: message.id,
            channel_id: message.channel_id,
            author_id: message.author_id,
            author_name: message.author_name.clone(),
            content: message.content.clone(),
            created_at: message.created_at,
        }
    }
}

/// Time-windowed, capacity-bounded lookup of recent invocations.
pub struct RecentMessageIndex {
    window: TimeDelta,
    capacity: usize,
    entries: Mutex<VecDeque<RecentMessage>>,
}

impl RecentMessageIndex {
    pub fn new(window: TimeDelta, capacity: usize) -> Self {
        Self {
            window,
            capacity: capacity.max(1),
            entries: Mutex::new(VecDeque::new()),
        }
    }

    /// Record an observed message. Expired entries are dropped on the way,
    /// including `message` itself when it arrives already out of the window.
    pub async fn record(&self, message: RecentMessage, now: DateTime<Utc>) {
        let mut entries = self.entries.lock().await;
        self.expire(&mut entries, now);
        if message.created_at < now - self.window {
            debug!(
                "recent: message {} arrived after its window, not recorded",
                message.message_id
            );
            return;
        }

        // Entries stay ordered by creation time, so late arrivals slot in
        // behind newer ones and expiry only ever looks at the front.
        let at = entries.partition_point(|entry| entry.created_at <= message.created_at);
        entries.insert(at, message);
        if entries.len() > self.capacity {
            entries.pop_front();
        }
    }

    /// Newest message in `channel_id` whose content matches `pattern`.
    ///
    /// When `author_name` is given, only messages by that display name count
    /// (compared case-insensitively). A miss is `NotFound`.
    pub async fn find(
        &self,
        channel_id: u64,
        pattern: &Regex,
        author_name: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<RecentMessage, SaplingError> {
        let mut entries = self.entries.lock().await;
        self.expire(&mut entries, now);

        let found = entries
            .iter()
            .rev()
            .filter(|entry| entry.channel_id == channel_id)
            .filter(|entry| {
                author_name.is_none_or(|name| entry.author_name.eq_ignore_ascii_case(name.trim()))
            })
            .find(|entry| pattern.is_match(&entry.content))
            .cloned();

        match found {
            Some(entry) => {
                debug!(
                    "recent: matched message {} by {} in channel {channel_id}",
                    entry.message_id, entry.author_id
                );
                Ok(entry)
            }
            None => Err(SaplingError::NotFound(format!(
                "no recent command matching '{pattern}' in channel {channel_id}"
            ))),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    fn expire(&self, entries: &mut VecDeque<RecentMessage>, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while entries.front().is_some_and(|entry| entry.created_at < cutoff) {
            entries.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(id: u64, channel_id: u64, author: &str, content: &str, at: DateTime<Utc>) -> RecentMessage {
        RecentMessage {
            message_id: id,
            channel_id,
            author_id: 1000 + id,
            author_name: author.to_string(),
            content: content.to_string(),
            created_at: at,
        }
    }

    fn prune_pattern() -> Regex {
        Regex::new(r"(?i)^\s*(?:/|tree\s+)prune\b").unwrap()
    }

    #[tokio::test]
    async fn test_find_returns_newest_match_in_channel() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(120), 100);
        index.record(entry(1, 10, "alice", "tree prune", now - TimeDelta::seconds(30)), now).await;
        index.record(entry(2, 10, "bob", "tree prune", now - TimeDelta::seconds(10)), now).await;
        index.record(entry(3, 11, "carol", "tree prune", now - TimeDelta::seconds(5)), now).await;

        let found = index.find(10, &prune_pattern(), None, now).await.unwrap();
        assert_eq!(found.message_id, 2);
    }

    #[tokio::test]
    async fn test_find_filters_by_author_name_case_insensitively() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(120), 100);
        index.record(entry(1, 10, "Alice", "tree prune", now), now).await;
        index.record(entry(2, 10, "bob", "tree prune", now), now).await;

        let found = index.find(10, &prune_pattern(), Some("alice"), now).await.unwrap();
        assert_eq!(found.message_id, 1);
    }

    #[tokio::test]
    async fn test_find_misses_on_non_matching_content() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(120), 100);
        index.record(entry(1, 10, "alice", "hello there", now), now).await;

        let err = index.find(10, &prune_pattern(), None, now).await.unwrap_err();
        assert!(matches!(err, SaplingError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_entries_expire_by_age() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(60), 100);
        index.record(entry(1, 10, "alice", "tree prune", now - TimeDelta::seconds(90)), now).await;

        assert!(index.find(10, &prune_pattern(), None, now).await.is_err());
        assert!(index.is_empty().await);
    }

    #[tokio::test]
    async fn test_late_arrival_outside_window_is_not_recorded() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(60), 100);
        index.record(entry(1, 10, "alice", "tree prune", now - TimeDelta::seconds(5)), now).await;
        index.record(entry(2, 10, "bob", "tree prune", now - TimeDelta::seconds(600)), now).await;

        let found = index.find(10, &prune_pattern(), None, now).await.unwrap();
        assert_eq!(found.message_id, 1);
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_out_of_order_entries_rank_and_expire_by_creation_time() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(60), 100);
        index.record(entry(1, 10, "alice", "tree prune", now - TimeDelta::seconds(5)), now).await;
        index.record(entry(2, 10, "bob", "tree prune", now - TimeDelta::seconds(30)), now).await;

        let found = index.find(10, &prune_pattern(), None, now).await.unwrap();
        assert_eq!(found.message_id, 1);

        // Bob's command was recorded last but is the first to leave the window.
        let later = now + TimeDelta::seconds(40);
        let err = index
            .find(10, &prune_pattern(), Some("bob"), later)
            .await
            .unwrap_err();
        assert!(matches!(err, SaplingError::NotFound(_)));
        assert_eq!(index.len().await, 1);
    }

    #[tokio::test]
    async fn test_capacity_drops_oldest() {
        let now = Utc::now();
        let index = RecentMessageIndex::new(TimeDelta::seconds(60), 2);
        for id in 1..=3 {
            index.record(entry(id, 10, "alice", "tree prune", now), now).await;
        }
        assert_eq!(index.len().await, 2);
        let found = index.find(10, &prune_pattern(), None, now).await.unwrap();
        assert_eq!(found.message_id, 3);
    }
}
