//! Cross-surface message schema.
//!
//! - **InboundRequest**: surfaces, page contexts and the browser host -> router
//! - **OutboundEvent**: router -> surfaces / page contexts
//! - **Reply**: synchronous answer to a request that expects one

mod inbound;
mod outbound;
mod reply;

pub use inbound::*;
pub use outbound::*;
pub use reply::*;

#[cfg(test)]
#[path = "message_tests.rs"]
mod tests;
