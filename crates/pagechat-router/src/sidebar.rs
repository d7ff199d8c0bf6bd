//! Believed side-panel visibility per tab.
//!
//! The browser offers no "is the panel open" query, so this is the router's
//! best guess. Page contexts report what their DOM probing sees and the
//! tracker takes the latest report as-is.

use std::collections::HashMap;
use std::sync::Arc;

use pagechat_protocols::TabId;
use parking_lot::RwLock;
use tracing::debug;

#[derive(Clone, Default)]
pub struct SidebarTracker {
    states: Arc<RwLock<HashMap<TabId, bool>>>,
}

impl SidebarTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current belief for `tab`, `false` when unknown.
    pub fn get(&self, tab: TabId) -> bool {
        self.states.read().get(&tab).copied().unwrap_or(false)
    }

    pub fn set(&self, tab: TabId, is_open: bool) {
        self.states.write().insert(tab, is_open);
    }

    /// Flip the belief for `tab` and return the new value.
    pub fn toggle(&self, tab: TabId) -> bool {
        let mut states = self.states.write();
        let state = states.entry(tab).or_insert(false);
        *state = !*state;
        *state
    }

    /// Accept a presence report from the page. Last write wins.
    pub fn report_presence(&self, tab: TabId, is_open: bool) {
        let previous = self.states.write().insert(tab, is_open);
        if previous != Some(is_open) {
            debug!("Sidebar presence for tab {} corrected to {}", tab, is_open);
        }
    }

    #[cfg(test)]
    pub(crate) fn tracked_tabs(&self) -> usize {
        self.states.read().len()
    }
}
