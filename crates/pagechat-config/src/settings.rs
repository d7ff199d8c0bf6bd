//! Persisted user settings.
//!
//! The options page owns this file; the service only reads it. Reads go to
//! disk on every access so a key saved mid-session is picked up by the next
//! chat turn without a restart.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::debug;

use pagechat_protocols::{SettingsError, SettingsStore};

use crate::loader::ConfigLoader;

/// Environment variable that overrides the stored API key.
pub const API_KEY_ENV: &str = "PAGECHAT_OPENAI_API_KEY";

/// Settings as persisted by the options page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub debug_logging: bool,
}

impl Settings {
    /// The API key, with empty strings treated as unset.
    pub fn api_key(&self) -> Option<String> {
        self.openai_api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(str::to_string)
    }
}

/// JSON-file backed settings store.
pub struct FileSettingsStore {
    path: PathBuf,
}

impl FileSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Build from a configured path, expanding `~`.
    pub fn from_config_path(path: &str) -> Self {
        if path.is_empty() {
            return Self::new(Self::default_path());
        }
        Self::new(ConfigLoader::expand_path(path))
    }

    /// `<home>/.pagechat/settings.json`, or a relative path when no home exists.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .map(|home| home.join(".pagechat"))
            .unwrap_or_else(|| PathBuf::from(".pagechat"))
            .join("settings.json")
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the current settings. A missing file yields defaults.
    pub async fn load(&self) -> Result<Settings, SettingsError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Settings::default()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("Settings file {:?} not found, using defaults", self.path);
                Ok(Settings::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Persist settings, creating the parent directory if needed.
    pub async fn save(&self, settings: &Settings) -> Result<(), SettingsError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(settings)?;
        tokio::fs::write(&self.path, content).await?;
        Ok(())
    }
}

#[async_trait]
impl SettingsStore for FileSettingsStore {
    async fn api_key(&self) -> Result<Option<String>, SettingsError> {
        if let Ok(key) = std::env::var(API_KEY_ENV) {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(Some(key.to_string()));
            }
        }
        Ok(self.load().await?.api_key())
    }

    async fn debug_logging(&self) -> Result<bool, SettingsError> {
        Ok(self.load().await?.debug_logging)
    }
}

/// In-memory settings store.
#[derive(Default)]
pub struct MemorySettingsStore {
    inner: RwLock<Settings>,
}

impl MemorySettingsStore {
    pub fn new(settings: Settings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    pub fn with_api_key(key: impl Into<String>) -> Self {
        Self::new(Settings {
            openai_api_key: Some(key.into()),
            debug_logging: false,
        })
    }

    pub fn set_api_key(&self, key: Option<String>) {
        self.inner.write().openai_api_key = key;
    }

    pub fn set_debug_logging(&self, enabled: bool) {
        self.inner.write().debug_logging = enabled;
    }
}

#[async_trait]
impl SettingsStore for MemorySettingsStore {
    async fn api_key(&self) -> Result<Option<String>, SettingsError> {
        Ok(self.inner.read().api_key())
    }

    async fn debug_logging(&self) -> Result<bool, SettingsError> {
        Ok(self.inner.read().debug_logging)
    }
}
