//! Per-conversation single-flight gate.

use std::sync::Arc;

use dashmap::DashMap;
use pagechat_protocols::ConversationKey;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Serializes chat turns that share a conversation key.
///
/// Holding the guard covers the whole fetch-context, complete, append
/// sequence. Turns on different keys never wait on each other.
#[derive(Default)]
pub struct TurnGate {
    locks: DashMap<ConversationKey, Arc<Mutex<()>>>,
}

impl TurnGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until no other turn is in flight for `key`.
    pub async fn acquire(&self, key: ConversationKey) -> OwnedMutexGuard<()> {
        let lock = self
            .locks
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        lock.lock_owned().await
    }

    /// Drop the lock for `key` once no turn holds or waits on it.
    pub fn prune(&self, key: ConversationKey) {
        self.locks
            .remove_if(&key, |_, lock| Arc::strong_count(lock) == 1);
    }

    #[cfg(test)]
    pub(crate) fn is_busy(&self, key: ConversationKey) -> bool {
        self.locks
            .get(&key)
            .map(|lock| lock.try_lock().is_err())
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub(crate) fn tracked_keys(&self) -> usize {
        self.locks.len()
    }
}
