//! Delivery to extension surfaces and tab page contexts.

use async_trait::async_trait;

use crate::error::ChannelError;
use crate::message::{InboundRequest, OutboundEvent, Reply};
use crate::types::{MessageSender, TabId};

/// Outbound delivery used by the router.
///
/// Exactly one of the two methods is used for any chat result: tab-less
/// origins get a broadcast, tab-bound origins get a direct tab message.
#[async_trait]
pub trait SurfaceBus: Send + Sync {
    /// Send to every listening extension surface (side panel, popup, options).
    async fn broadcast(&self, event: OutboundEvent) -> Result<(), ChannelError>;

    /// Send to the page context of one tab.
    async fn send_to_tab(&self, tab: TabId, event: OutboundEvent) -> Result<(), ChannelError>;
}

/// Receives inbound messages from a transport.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    /// Returns the synchronous reply, if the message type has one.
    async fn handle(&self, request: InboundRequest, sender: MessageSender) -> Option<Reply>;
}
