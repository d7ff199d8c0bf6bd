//! Settings store errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed settings: {0}")]
    Malformed(#[from] serde_json::Error),
}
