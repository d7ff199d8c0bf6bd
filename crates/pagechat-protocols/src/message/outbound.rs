//! Outbound events.

use serde::{Deserialize, Serialize};

use crate::types::TabId;

/// Events the router pushes to surfaces and page contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundEvent {
    ChatResponse { content: String },

    Error { error: String },

    SidebarOpened,

    SidebarClosed,

    SidebarCloseHint,

    #[serde(rename_all = "camelCase")]
    SidebarStateUpdate { is_open: bool },

    #[serde(rename_all = "camelCase")]
    PrefillText { text: String, tab_id: TabId },

    DebugLog { log: String },

    #[serde(rename_all = "camelCase")]
    ShowCloseInstructions { tab_id: TabId },
}

impl OutboundEvent {
    pub fn chat_response(content: impl Into<String>) -> Self {
        Self::ChatResponse {
            content: content.into(),
        }
    }

    pub fn error(error: impl Into<String>) -> Self {
        Self::Error {
            error: error.into(),
        }
    }

    /// Wire name of the event type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatResponse { .. } => "chat_response",
            Self::Error { .. } => "error",
            Self::SidebarOpened => "sidebar_opened",
            Self::SidebarClosed => "sidebar_closed",
            Self::SidebarCloseHint => "sidebar_close_hint",
            Self::SidebarStateUpdate { .. } => "sidebar_state_update",
            Self::PrefillText { .. } => "prefill_text",
            Self::DebugLog { .. } => "debug_log",
            Self::ShowCloseInstructions { .. } => "show_close_instructions",
        }
    }
}
