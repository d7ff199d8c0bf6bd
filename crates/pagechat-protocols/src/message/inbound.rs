//! Inbound requests.

use serde::{Deserialize, Serialize};

use crate::types::TabId;

/// Every message the router accepts, discriminated by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundRequest {
    /// A user chat turn from any surface.
    #[serde(rename_all = "camelCase")]
    ChatMessage {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },

    GetTabId,

    GetDebugLogs,

    /// A page context noticed the side panel is gone.
    SidebarManuallyClosed,

    ShowCloseInstructions,

    ToggleSidebar,

    #[serde(rename_all = "camelCase")]
    ClearConversation {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    /// The side panel's own close button was used.
    SidebarClosedByUser,

    #[serde(rename_all = "camelCase")]
    GetSidebarState {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    #[serde(rename_all = "camelCase")]
    GetConversationHistory {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        tab_id: Option<TabId>,
    },

    /// Presence report from a page context's panel probe.
    #[serde(rename_all = "camelCase")]
    SidebarPresence { is_open: bool },

    /// Toolbar icon clicked (browser host event).
    #[serde(rename_all = "camelCase")]
    ActionClicked { tab_id: TabId },

    /// "Ask about selection" context menu used (browser host event).
    #[serde(rename_all = "camelCase")]
    ContextMenuSelection { text: String, tab_id: TabId },

    #[serde(rename_all = "camelCase")]
    TabActivated { tab_id: TabId },

    #[serde(rename_all = "camelCase")]
    TabUpdated {
        tab_id: TabId,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<String>,
    },

    Ping,
}

impl InboundRequest {
    /// Wire name of the request type.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ChatMessage { .. } => "chat_message",
            Self::GetTabId => "get_tab_id",
            Self::GetDebugLogs => "get_debug_logs",
            Self::SidebarManuallyClosed => "sidebar_manually_closed",
            Self::ShowCloseInstructions => "show_close_instructions",
            Self::ToggleSidebar => "toggle_sidebar",
            Self::ClearConversation { .. } => "clear_conversation",
            Self::SidebarClosedByUser => "sidebar_closed_by_user",
            Self::GetSidebarState { .. } => "get_sidebar_state",
            Self::GetConversationHistory { .. } => "get_conversation_history",
            Self::SidebarPresence { .. } => "sidebar_presence",
            Self::ActionClicked { .. } => "action_clicked",
            Self::ContextMenuSelection { .. } => "context_menu_selection",
            Self::TabActivated { .. } => "tab_activated",
            Self::TabUpdated { .. } => "tab_updated",
            Self::Ping => "ping",
        }
    }

    /// Build a chat message with only the text set.
    pub fn chat(message: impl Into<String>) -> Self {
        Self::ChatMessage {
            message: message.into(),
            tab_id: None,
            url: None,
            title: None,
            source: None,
        }
    }

    /// Build a chat message that names its tab explicitly.
    pub fn chat_for_tab(message: impl Into<String>, tab_id: TabId) -> Self {
        Self::ChatMessage {
            message: message.into(),
            tab_id: Some(tab_id),
            url: None,
            title: None,
            source: None,
        }
    }
}
