//! OpenAI provider implementation.

use std::time::Duration;

use async_trait::async_trait;
use tracing::debug;

use pagechat_protocols::{CompletionClient, CompletionRequest, CompletionResponse, ProviderError};

use crate::api::{ApiRequest, ApiResponse};
use crate::converter::{convert_request, parse_error, parse_response};

pub const DEFAULT_API_URL: &str = "https://api.openai.com/v1/chat/completions";

const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// OpenAI chat-completion client.
///
/// The API key is passed per call because the user can change it at any
/// time from the options page.
pub struct OpenAIProvider {
    api_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl OpenAIProvider {
    pub fn new() -> Self {
        Self::with_url(DEFAULT_API_URL.to_string())
    }

    /// Create provider with custom API URL (for OpenAI-compatible APIs).
    pub fn with_url(api_url: String) -> Self {
        Self {
            api_url,
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn send_request(
        &self,
        api_request: &ApiRequest,
        api_key: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(&self.api_url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .timeout(self.timeout)
            .json(api_request)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        debug!("OpenAI API response status: {}", response.status());

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            return Err(parse_error(status, &text));
        }

        Ok(response)
    }

    fn map_send_error(&self, e: reqwest::Error) -> ProviderError {
        if e.is_timeout() {
            ProviderError::Timeout(self.timeout.as_secs())
        } else {
            ProviderError::Network(e.to_string())
        }
    }
}

impl Default for OpenAIProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CompletionClient for OpenAIProvider {
    fn id(&self) -> &str {
        "openai"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        api_key: &str,
    ) -> Result<CompletionResponse, ProviderError> {
        let api_request = convert_request(&request);
        let response = self.send_request(&api_request, api_key).await?;
        let api_response: ApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))?;
        Ok(parse_response(api_response))
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
