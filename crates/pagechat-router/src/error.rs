//! Chat turn errors.

use pagechat_protocols::ProviderError;
use thiserror::Error;

/// Shown when no API key is stored.
pub const NOT_CONFIGURED_MESSAGE: &str =
    "OpenAI API key not configured. Please set it in the options page.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("API key not configured")]
    NotConfigured,

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl ChatError {
    /// Text shown to the user in the `error` event.
    pub fn user_message(&self) -> String {
        match self {
            Self::NotConfigured => NOT_CONFIGURED_MESSAGE.to_string(),
            Self::Provider(ProviderError::AuthenticationFailed(_)) => {
                "Invalid API key. Please check your OpenAI API key in the options.".to_string()
            }
            Self::Provider(ProviderError::RateLimited(_)) => {
                "Rate limit exceeded. Please try again later.".to_string()
            }
            Self::Provider(ProviderError::QuotaExceeded(_)) => {
                "Quota exceeded! You've reached your OpenAI API usage limit. \
Please check your billing details and upgrade your plan if needed."
                    .to_string()
            }
            Self::Provider(e) => format!("API Error: {}", e.provider_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_configured_message() {
        assert_eq!(
            ChatError::NotConfigured.user_message(),
            "OpenAI API key not configured. Please set it in the options page."
        );
    }

    #[test]
    fn test_auth_message() {
        let err = ChatError::from(ProviderError::AuthenticationFailed("bad key".into()));
        assert!(err.user_message().starts_with("Invalid API key"));
    }

    #[test]
    fn test_rate_limit_message() {
        let err = ChatError::from(ProviderError::RateLimited("slow down".into()));
        assert_eq!(err.user_message(), "Rate limit exceeded. Please try again later.");
    }

    #[test]
    fn test_quota_message() {
        let err = ChatError::from(ProviderError::QuotaExceeded("insufficient_quota".into()));
        assert!(err.user_message().starts_with("Quota exceeded!"));
        assert!(err.user_message().contains("billing details"));
    }

    #[test]
    fn test_generic_message_is_prefixed() {
        let err = ChatError::from(ProviderError::ApiError {
            status: 500,
            message: "The server had an error".into(),
        });
        assert_eq!(err.user_message(), "API Error: The server had an error");
    }

    #[test]
    fn test_timeout_message() {
        let err = ChatError::from(ProviderError::Timeout(60));
        assert_eq!(err.user_message(), "API Error: request timed out after 60 seconds");
    }
}
