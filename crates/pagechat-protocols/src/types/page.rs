//! Page context snapshot.

use serde::{Deserialize, Serialize};

/// Title, URL and extracted text of the page a tab is showing.
///
/// Fetched fresh for every chat turn and never cached.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageContent {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub content: String,
}

impl PageContent {
    /// Cap the extracted text at `max_chars` characters.
    pub fn truncated(mut self, max_chars: usize) -> Self {
        if let Some((idx, _)) = self.content.char_indices().nth(max_chars) {
            self.content.truncate(idx);
        }
        self
    }
}
