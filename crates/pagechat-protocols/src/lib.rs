//! # Pagechat Protocols
//!
//! Wire types and collaborator traits shared by every pagechat crate.
//! Contains only definitions - no implementations.
//!
//! ## Collaborator Traits
//!
//! - [`CompletionClient`] - remote chat-completion API
//! - [`SurfaceBus`] - delivery to extension surfaces and tab page contexts
//! - [`PageContext`] - content provider running inside a tab
//! - [`BrowserHost`] - browser-only side effects (side panel, active tab)
//! - [`SettingsStore`] - persisted user settings
//! - [`MessageHandler`] - consumer of inbound messages from a transport

pub mod channel;
pub mod command;
pub mod error;
pub mod host;
pub mod message;
pub mod provider;
pub mod settings;
pub mod types;

pub use channel::{MessageHandler, SurfaceBus};
pub use command::{CommandParams, PageCommand, PageCommandRequest, PageCommandResponse, PageContext, ScrollDirection};
pub use error::{ChannelError, ProviderError, SettingsError};
pub use host::BrowserHost;
pub use message::{InboundRequest, OutboundEvent, Reply};
pub use provider::{CompletionClient, CompletionRequest, CompletionResponse};
pub use settings::SettingsStore;
pub use types::*;
