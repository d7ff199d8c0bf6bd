//! # Pagechat Router
//!
//! The single dispatch point for every message crossing between the
//! extension's surfaces, its page contexts and the completion API.
//!
//! State lives in injected services: [`ConversationStore`] for per-tab chat
//! history, [`SidebarTracker`] for the believed side-panel visibility, and
//! [`DebugLog`] for the ring the options page reads.

mod conversation;
mod debug_log;
mod error;
mod gate;
mod intent;
mod prompt;
mod router;
mod sidebar;

pub use conversation::{ConversationHistory, ConversationStore};
pub use debug_log::{DebugLog, DEBUG_LOG_CAPACITY};
pub use error::{ChatError, NOT_CONFIGURED_MESSAGE};
pub use gate::TurnGate;
pub use intent::IntentMatcher;
pub use prompt::{build_messages, synthesize_prompt, system_message};
pub use router::{ChatParams, MessageRouter};
pub use sidebar::SidebarTracker;
