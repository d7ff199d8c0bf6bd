//! Completion provider errors.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API error: {status} - {message}")]
    ApiError { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),
}

const QUOTA_MARKERS: [&str; 3] = ["quota", "billing", "insufficient_quota"];
const RATE_LIMIT_MARKERS: [&str; 2] = ["rate limit", "rate_limit"];

impl ProviderError {
    /// Classify a non-2xx provider response.
    ///
    /// Exhausted quota is reported with 429 as well, so quota markers are
    /// checked before the rate-limit status.
    pub fn from_api_response(status: u16, message: String) -> Self {
        let lower = message.to_lowercase();

        if status == 401 || lower.contains("unauthorized") {
            return Self::AuthenticationFailed(message);
        }
        if QUOTA_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::QuotaExceeded(message);
        }
        if status == 429 || RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
            return Self::RateLimited(message);
        }
        Self::ApiError { status, message }
    }

    /// The provider's own wording, without the variant prefix.
    pub fn provider_message(&self) -> String {
        match self {
            Self::AuthenticationFailed(m)
            | Self::RateLimited(m)
            | Self::QuotaExceeded(m)
            | Self::InvalidResponse(m)
            | Self::Network(m) => m.clone(),
            Self::ApiError { message, .. } => message.clone(),
            Self::Timeout(secs) => format!("request timed out after {} seconds", secs),
        }
    }
}

#[cfg(test)]
#[path = "provider_tests.rs"]
mod tests;
