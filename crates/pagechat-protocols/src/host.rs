//! Browser-only side effects.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::types::TabId;

/// Capabilities only the browser itself has.
///
/// There is no programmatic close for the side panel and no way to ask
/// whether it is open.
#[async_trait]
pub trait BrowserHost: Send + Sync {
    async fn open_side_panel(&self, tab: TabId) -> Result<(), ChannelError>;

    /// The active tab of the current window, if any.
    async fn active_tab(&self) -> Result<Option<TabId>, ChannelError>;
}
