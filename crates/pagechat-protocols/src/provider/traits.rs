//! Completion client trait definition.

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse};
use crate::error::ProviderError;

/// Remote chat-completion API.
///
/// Failures come back classified so the router can pick the user-facing
/// wording.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Returns the client ID.
    fn id(&self) -> &str;

    /// Generate a completion with the given credential.
    async fn complete(
        &self,
        request: CompletionRequest,
        api_key: &str,
    ) -> Result<CompletionResponse, ProviderError>;
}
