//! Configuration schema definitions.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub openai: OpenAIConfig,

    #[serde(default)]
    pub router: RouterConfig,

    #[serde(default)]
    pub bridge: BridgeConfig,

    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Bridge listener address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8765
}

/// Completion API parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAIConfig {
    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_request_timeout")]
    pub timeout_seconds: u64,
}

impl Default for OpenAIConfig {
    fn default() -> Self {
        Self {
            model: default_model(),
            api_url: default_api_url(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_model() -> String {
    "gpt-3.5-turbo".to_string()
}

fn default_api_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_max_tokens() -> u32 {
    1000
}

fn default_temperature() -> f32 {
    0.5
}

fn default_request_timeout() -> u64 {
    60
}

/// Message router behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouterConfig {
    /// Most recent stored turns included in each request.
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// Page text beyond this many characters is dropped.
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,

    /// Enable regex intent matching for page commands.
    #[serde(default)]
    pub agent_commands: bool,

    /// Delay before a context-menu selection is prefilled into the panel.
    #[serde(default = "default_prefill_delay")]
    pub prefill_delay_ms: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            max_page_chars: default_max_page_chars(),
            agent_commands: false,
            prefill_delay_ms: default_prefill_delay(),
        }
    }
}

fn default_history_window() -> usize {
    20
}

fn default_max_page_chars() -> usize {
    6000
}

fn default_prefill_delay() -> u64 {
    500
}

/// WebSocket bridge timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeConfig {
    /// How long to wait for a page context or the host to answer.
    #[serde(default = "default_bridge_timeout")]
    pub request_timeout_ms: u64,

    /// Pause after injecting the content provider.
    #[serde(default = "default_inject_settle")]
    pub inject_settle_ms: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            request_timeout_ms: default_bridge_timeout(),
            inject_settle_ms: default_inject_settle(),
        }
    }
}

fn default_bridge_timeout() -> u64 {
    5000
}

fn default_inject_settle() -> u64 {
    100
}

/// Where persisted settings live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    #[serde(default = "default_settings_path")]
    pub path: String,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            path: default_settings_path(),
        }
    }
}

fn default_settings_path() -> String {
    "~/.pagechat/settings.json".to_string()
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
