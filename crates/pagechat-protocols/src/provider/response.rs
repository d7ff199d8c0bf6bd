//! Completion response types.

use serde::{Deserialize, Serialize};

/// Text produced by a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Assistant reply text.
    pub content: String,

    /// Model that answered, when the provider reports it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl CompletionResponse {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: None,
        }
    }
}
