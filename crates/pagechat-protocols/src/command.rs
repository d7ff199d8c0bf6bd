//! Page-context command protocol.
//!
//! The router asks the content provider running inside a tab to act on the
//! page: `{type: agent_command, command, params, originalMessage}` answered by
//! `{success, data?, message?, error?}`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ChannelError;
use crate::types::{PageContent, TabId};

/// Commands a page context understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PageCommand {
    GetPageContent,
    SummarizePage,
    FindEmail,
    FindPhone,
    ClickButton,
    FillForm,
    Scroll,
    ExtractText,
    /// Declared but not implemented by page contexts; always fails.
    Screenshot,
}

impl PageCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::GetPageContent => "get_page_content",
            Self::SummarizePage => "summarize_page",
            Self::FindEmail => "find_email",
            Self::FindPhone => "find_phone",
            Self::ClickButton => "click_button",
            Self::FillForm => "fill_form",
            Self::Scroll => "scroll",
            Self::ExtractText => "extract_text",
            Self::Screenshot => "screenshot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollDirection {
    Up,
    Down,
}

/// Extra arguments carried with a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandParams {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub direction: Option<ScrollDirection>,
}

/// A command sent to a page context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCommandRequest {
    pub command: PageCommand,
    #[serde(default)]
    pub params: CommandParams,
    #[serde(default)]
    pub original_message: String,
}

impl PageCommandRequest {
    pub fn new(command: PageCommand, original_message: impl Into<String>) -> Self {
        Self {
            command,
            params: CommandParams::default(),
            original_message: original_message.into(),
        }
    }

    pub fn with_params(mut self, params: CommandParams) -> Self {
        self.params = params;
        self
    }
}

/// A page context's answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageCommandResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<PageCommand>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PageCommandResponse {
    pub fn ok(data: Value) -> Self {
        Self {
            success: true,
            data: Some(data),
            ..Default::default()
        }
    }

    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Default::default()
        }
    }

    /// Non-null payload, if the command produced one.
    pub fn payload(&self) -> Option<&Value> {
        self.data.as_ref().filter(|v| !v.is_null())
    }

    /// Interpret the payload as a page snapshot.
    pub fn page_content(&self) -> Option<PageContent> {
        if !self.success {
            return None;
        }
        self.payload()
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}

/// Content provider running inside a tab.
#[async_trait]
pub trait PageContext: Send + Sync {
    /// Liveness probe; fails when no provider answers in `tab`.
    async fn ping(&self, tab: TabId) -> Result<(), ChannelError>;

    /// Install the provider into `tab`.
    async fn inject(&self, tab: TabId) -> Result<(), ChannelError>;

    /// Run a command in `tab` and wait for its answer.
    async fn execute(
        &self,
        tab: TabId,
        request: PageCommandRequest,
    ) -> Result<PageCommandResponse, ChannelError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let request = PageCommandRequest::new(PageCommand::Scroll, "scroll down please")
            .with_params(CommandParams {
                text: None,
                direction: Some(ScrollDirection::Down),
            });
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["command"], "scroll");
        assert_eq!(json["params"]["direction"], "down");
        assert_eq!(json["originalMessage"], "scroll down please");
    }

    #[test]
    fn test_response_page_content() {
        let json = r#"{"success":true,"command":"get_page_content","data":{"title":"T","url":"https://a.b","content":"body"}}"#;
        let response: PageCommandResponse = serde_json::from_str(json).unwrap();
        let page = response.page_content().unwrap();
        assert_eq!(page.title, "T");
        assert_eq!(page.content, "body");
    }

    #[test]
    fn test_failed_response_has_no_page_content() {
        let mut response = PageCommandResponse::failed("boom");
        response.data = Some(serde_json::json!({"title": "T"}));
        assert!(response.page_content().is_none());
    }

    #[test]
    fn test_null_data_is_no_payload() {
        let response: PageCommandResponse =
            serde_json::from_str(r#"{"success":true,"data":null,"message":"Scrolled down"}"#).unwrap();
        assert!(response.payload().is_none());
        assert_eq!(response.message.as_deref(), Some("Scrolled down"));
    }

    #[test]
    fn test_command_names() {
        assert_eq!(PageCommand::GetPageContent.as_str(), "get_page_content");
        let json = serde_json::to_string(&PageCommand::FindEmail).unwrap();
        assert_eq!(json, "\"find_email\"");
    }
}
