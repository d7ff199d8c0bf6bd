//! Conversion between pagechat types and the OpenAI wire format.

use pagechat_protocols::{CompletionRequest, CompletionResponse, Message, ProviderError, Role};

use crate::api::{ApiErrorBody, ApiMessage, ApiRequest, ApiResponse};

/// Content used when the API answers without any choice.
pub const EMPTY_RESPONSE: &str = "No response generated.";

pub fn convert_request(request: &CompletionRequest) -> ApiRequest {
    ApiRequest {
        model: request.model.clone(),
        messages: convert_messages(&request.messages),
        max_tokens: request.max_tokens,
        temperature: request.temperature,
    }
}

pub fn convert_messages(messages: &[Message]) -> Vec<ApiMessage> {
    messages.iter().map(convert_message).collect()
}

fn convert_message(msg: &Message) -> ApiMessage {
    let role = match msg.role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
    };
    ApiMessage {
        role: role.to_string(),
        content: msg.content.clone(),
    }
}

/// First choice's text, or [`EMPTY_RESPONSE`] when there is none.
pub fn parse_response(response: ApiResponse) -> CompletionResponse {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content)
        .filter(|c| !c.is_empty())
        .unwrap_or_else(|| EMPTY_RESPONSE.to_string());

    CompletionResponse {
        content,
        model: response.model,
    }
}

/// Classify a non-2xx response from its status and raw body.
pub fn parse_error(status: u16, body: &str) -> ProviderError {
    let detail = serde_json::from_str::<ApiErrorBody>(body)
        .ok()
        .and_then(|b| b.error)
        .unwrap_or_default();
    let message = detail
        .message
        .clone()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| format!("API request failed with status {}", status));

    if detail.is_quota_exhausted() {
        return ProviderError::QuotaExceeded(message);
    }
    ProviderError::from_api_response(status, message)
}
