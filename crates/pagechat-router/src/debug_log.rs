//! Ring buffer backing the options page's debug log view.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{SecondsFormat, Utc};
use parking_lot::Mutex;

/// Entries kept before the oldest is dropped.
pub const DEBUG_LOG_CAPACITY: usize = 200;

pub struct DebugLog {
    entries: Mutex<VecDeque<String>>,
    capacity: usize,
    enabled: AtomicBool,
}

impl DebugLog {
    pub fn new() -> Self {
        Self::with_capacity(DEBUG_LOG_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(VecDeque::with_capacity(capacity)),
            capacity,
            enabled: AtomicBool::new(false),
        }
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Stamp and store `message` when enabled, returning the stored entry.
    pub fn record(&self, message: &str) -> Option<String> {
        if !self.is_enabled() {
            return None;
        }
        let entry = format!(
            "[{}] {}",
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            message
        );
        let mut entries = self.entries.lock();
        if entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry.clone());
        Some(entry)
    }

    /// Snapshot, oldest first.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }
}

impl Default for DebugLog {
    fn default() -> Self {
        Self::new()
    }
}
