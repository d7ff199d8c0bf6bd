//! Persisted user settings.

use async_trait::async_trait;

use crate::error::SettingsError;

/// Key-value settings written by the options page.
#[async_trait]
pub trait SettingsStore: Send + Sync {
    /// The completion API key. Empty strings count as absent.
    async fn api_key(&self) -> Result<Option<String>, SettingsError>;

    async fn debug_logging(&self) -> Result<bool, SettingsError>;
}
