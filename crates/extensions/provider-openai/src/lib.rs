//! OpenAI chat-completion client for pagechat.

mod api;
mod converter;
mod provider;

pub use provider::{OpenAIProvider, DEFAULT_API_URL};
