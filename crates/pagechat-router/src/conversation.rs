//! Per-conversation chat history.

use std::collections::HashMap;
use std::sync::Arc;

use pagechat_protocols::{ConversationKey, Message};
use parking_lot::RwLock;

/// History for a single conversation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConversationHistory {
    messages: Vec<Message>,
}

impl ConversationHistory {
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
        }
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn into_messages(self) -> Vec<Message> {
        self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }

    /// The most recent `count` turns, in original order.
    pub fn recent(&self, count: usize) -> &[Message] {
        let start = self.messages.len().saturating_sub(count);
        &self.messages[start..]
    }
}

/// Process-wide conversation histories, keyed by tab.
///
/// Stored history is unbounded; callers window it when building requests.
/// Nothing is persisted, so conversations end with the process.
#[derive(Clone, Default)]
pub struct ConversationStore {
    histories: Arc<RwLock<HashMap<ConversationKey, ConversationHistory>>>,
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the history for `key`, creating an empty entry on first use.
    pub fn get(&self, key: ConversationKey) -> ConversationHistory {
        if let Some(history) = self.histories.read().get(&key) {
            return history.clone();
        }
        self.histories.write().entry(key).or_default().clone()
    }

    /// Read without creating an entry.
    pub fn peek(&self, key: ConversationKey) -> ConversationHistory {
        self.histories
            .read()
            .get(&key)
            .cloned()
            .unwrap_or_default()
    }

    /// The most recent `count` turns for `key`.
    pub fn window(&self, key: ConversationKey, count: usize) -> Vec<Message> {
        self.histories
            .read()
            .get(&key)
            .map(|h| h.recent(count).to_vec())
            .unwrap_or_default()
    }

    pub fn append(&self, key: ConversationKey, message: Message) {
        self.histories.write().entry(key).or_default().push(message);
    }

    /// Record a completed user/assistant exchange under one lock.
    pub fn append_exchange(&self, key: ConversationKey, user: Message, assistant: Message) {
        let mut histories = self.histories.write();
        let history = histories.entry(key).or_default();
        history.push(user);
        history.push(assistant);
    }

    /// Empty the history for `key`. The key stays tracked.
    pub fn clear(&self, key: ConversationKey) {
        self.histories.write().entry(key).or_default().clear();
    }

    pub fn len(&self, key: ConversationKey) -> usize {
        self.histories.read().get(&key).map_or(0, |h| h.len())
    }

    #[cfg(test)]
    pub(crate) fn conversation_count(&self) -> usize {
        self.histories.read().len()
    }
}
