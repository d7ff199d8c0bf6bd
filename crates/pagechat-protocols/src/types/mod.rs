//! Core data model.

mod message;
mod page;
mod tab;

pub use message::*;
pub use page::*;
pub use tab::*;
