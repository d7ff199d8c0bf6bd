//! Synchronous replies.

use serde::Serialize;

use crate::types::{Message, TabId};

/// Answer to a request that expects one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Reply {
    #[serde(rename_all = "camelCase")]
    TabId { tab_id: Option<TabId> },

    DebugLogs { logs: Vec<String> },

    #[serde(rename_all = "camelCase")]
    SidebarState { is_open: bool },

    #[serde(rename_all = "camelCase")]
    ConversationHistory {
        history: Vec<Message>,
        #[serde(skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    Pong { ok: bool },
}
