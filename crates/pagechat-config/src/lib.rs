//! # Pagechat Config
//!
//! Service configuration (TOML) and the persisted user settings the
//! options page writes.

mod error;
mod loader;
mod schema;
mod settings;
mod validator;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
pub use settings::{FileSettingsStore, MemorySettingsStore, Settings, API_KEY_ENV};
pub use validator::{ConfigValidator, ValidationError, ValidationResult, ValidationWarning};
