//! Tab identity, message senders and conversation keys.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Browser tab identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TabId(pub i64);

impl fmt::Display for TabId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for TabId {
    fn from(id: i64) -> Self {
        Self(id)
    }
}

/// The tab a message was sent from, as reported by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderTab {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<TabId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Who sent an inbound message.
///
/// Page contexts are tab-bound; the side panel, popup and options page are not.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageSender {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tab: Option<SenderTab>,
}

impl MessageSender {
    /// A tab-less extension surface.
    pub fn surface() -> Self {
        Self { tab: None }
    }

    /// A page context running in `tab`.
    pub fn page(tab: TabId) -> Self {
        Self {
            tab: Some(SenderTab {
                id: Some(tab),
                url: None,
            }),
        }
    }

    pub fn is_tab_bound(&self) -> bool {
        self.tab.is_some()
    }

    /// The sender's tab id, when the browser attached one.
    pub fn tab_id(&self) -> Option<TabId> {
        self.tab.as_ref().and_then(|t| t.id)
    }
}

/// Key grouping the turns of one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConversationKey {
    Tab(TabId),
    NoTab,
}

impl ConversationKey {
    pub fn for_tab(tab: Option<TabId>) -> Self {
        match tab {
            Some(id) => Self::Tab(id),
            None => Self::NoTab,
        }
    }

    pub fn tab(&self) -> Option<TabId> {
        match self {
            Self::Tab(id) => Some(*id),
            Self::NoTab => None,
        }
    }
}

impl fmt::Display for ConversationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tab(id) => write!(f, "tab:{}", id),
            Self::NoTab => f.write_str("no_tab"),
        }
    }
}
