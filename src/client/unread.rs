/**
 * Unread Tracker
 *
 * Per-conversation unread counts derived from inbound message events.
 *
 * A message reaches the client twice when its conversation is open (once via
 * the conversation room, once via the user room), so counting is keyed on
 * the message id. The counts are client-local and written to the durable
 * store after every change; a failed write is logged and the in-memory state
 * stays authoritative for the session.
 */

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use crate::client::store::{UnreadCounts, UnreadStore};
use crate::shared::ids::{ConversationId, MessageId, UserId};
use crate::shared::model::{Conversation, Message};

const SEEN_WINDOW: usize = 1024;

pub struct UnreadTracker {
    me: UserId,
    counts: UnreadCounts,
    seen: HashSet<MessageId>,
    seen_order: VecDeque<MessageId>,
    store: Arc<dyn UnreadStore>,
}

impl UnreadTracker {
    /// Restore counts from `store`; an unreadable store starts empty
    pub async fn load(me: UserId, store: Arc<dyn UnreadStore>) -> Self {
        let counts = match store.load().await {
            Ok(counts) => counts,
            Err(e) => {
                tracing::warn!("[Unread] Failed to load unread counts: {}", e);
                UnreadCounts::new()
            }
        };
        tracing::debug!("[Unread] Restored {} conversation count(s)", counts.len());

        Self {
            me,
            counts,
            seen: HashSet::new(),
            seen_order: VecDeque::new(),
            store,
        }
    }

    pub fn count(&self, conversation: ConversationId) -> u32 {
        self.counts.get(&conversation).copied().unwrap_or(0)
    }

    /// Aggregate badge count
    pub fn total(&self) -> u32 {
        self.counts.values().sum()
    }

    pub fn counts(&self) -> &UnreadCounts {
        &self.counts
    }

    /// Count an inbound message; returns whether it was counted
    ///
    /// Messages already seen, sent by this user, or addressed to the
    /// conversation open in the inbox do not count.
    pub async fn record(&mut self, message: &Message, open: Option<ConversationId>) -> bool {
        if !self.remember(message.id) {
            return false;
        }
        if message.sender.id == self.me || open == Some(message.conversation_id) {
            return false;
        }

        *self.counts.entry(message.conversation_id).or_insert(0) += 1;
        self.persist().await;
        true
    }

    /// Reset one conversation to zero
    pub async fn mark_read(&mut self, conversation: ConversationId) {
        if self.counts.get(&conversation).copied().unwrap_or(0) == 0 {
            self.counts.entry(conversation).or_insert(0);
            return;
        }
        self.counts.insert(conversation, 0);
        self.persist().await;
    }

    /// Merge a fresh conversation list
    ///
    /// Unknown conversations start at zero; existing counts are kept, including
    /// those for conversations absent from the list.
    pub async fn merge_snapshot(&mut self, conversations: &[Conversation]) {
        let mut changed = false;
        for conversation in conversations {
            if !self.counts.contains_key(&conversation.id) {
                self.counts.insert(conversation.id, 0);
                changed = true;
            }
        }
        if changed {
            self.persist().await;
        }
    }

    fn remember(&mut self, id: MessageId) -> bool {
        if !self.seen.insert(id) {
            return false;
        }
        self.seen_order.push_back(id);
        if self.seen_order.len() > SEEN_WINDOW {
            if let Some(evicted) = self.seen_order.pop_front() {
                self.seen.remove(&evicted);
            }
        }
        true
    }

    async fn persist(&self) {
        if let Err(e) = self.store.save(&self.counts).await {
            tracing::warn!("[Unread] Failed to persist unread counts: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::{MemoryUnreadStore, SqliteUnreadStore};
    use crate::shared::model::UserSummary;
    use chrono::Utc;

    fn message(conversation: ConversationId, sender: UserId) -> Message {
        Message {
            id: MessageId::new(),
            conversation_id: conversation,
            sender: UserSummary {
                id: sender,
                name: "Bob".to_string(),
                email: "bob@example.com".to_string(),
                avatar_url: None,
            },
            content: "hi".to_string(),
            created_at: Utc::now(),
        }
    }

    async fn tracker(me: UserId) -> UnreadTracker {
        UnreadTracker::load(me, Arc::new(MemoryUnreadStore::new())).await
    }

    #[tokio::test]
    async fn test_duplicate_delivery_counts_once() {
        let me = UserId::new();
        let mut tracker = tracker(me).await;
        let conversation = ConversationId::new();
        let msg = message(conversation, UserId::new());

        assert!(tracker.record(&msg, None).await);
        assert!(!tracker.record(&msg, None).await);
        assert_eq!(tracker.count(conversation), 1);
        assert_eq!(tracker.total(), 1);
    }

    #[tokio::test]
    async fn test_open_conversation_and_own_messages_do_not_count() {
        let me = UserId::new();
        let mut tracker = tracker(me).await;
        let conversation = ConversationId::new();

        assert!(!tracker.record(&message(conversation, UserId::new()), Some(conversation)).await);
        assert!(!tracker.record(&message(conversation, me), None).await);
        assert_eq!(tracker.total(), 0);
    }

    #[tokio::test]
    async fn test_total_sums_conversations_and_mark_read_resets() {
        let me = UserId::new();
        let mut tracker = tracker(me).await;
        let first = ConversationId::new();
        let second = ConversationId::new();
        for _ in 0..2 {
            tracker.record(&message(first, UserId::new()), None).await;
        }
        tracker.record(&message(second, UserId::new()), None).await;
        assert_eq!(tracker.total(), 3);

        tracker.mark_read(first).await;
        assert_eq!(tracker.count(first), 0);
        assert_eq!(tracker.total(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_merge_preserves_counts() {
        let me = UserId::new();
        let mut tracker = tracker(me).await;
        let known = ConversationId::new();
        tracker.record(&message(known, UserId::new()), None).await;

        let conversation = |id| Conversation {
            id,
            members: vec![],
            last_message: None,
            updated_at: Utc::now(),
        };
        let fresh = ConversationId::new();
        tracker.merge_snapshot(&[conversation(known), conversation(fresh)]).await;

        assert_eq!(tracker.count(known), 1);
        assert_eq!(tracker.count(fresh), 0);
        assert!(tracker.counts().contains_key(&fresh));
    }

    #[tokio::test]
    async fn test_counts_are_durable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("client.db");
        let me = UserId::new();
        let conversation = ConversationId::new();

        {
            let store = Arc::new(SqliteUnreadStore::open(&path).await.unwrap());
            let mut tracker = UnreadTracker::load(me, store).await;
            tracker.record(&message(conversation, UserId::new()), None).await;
            tracker.record(&message(conversation, UserId::new()), None).await;
        }

        let store = Arc::new(SqliteUnreadStore::open(&path).await.unwrap());
        let restored = UnreadTracker::load(me, store).await;
        assert_eq!(restored.count(conversation), 2);
    }
}
