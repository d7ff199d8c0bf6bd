//! Wire frames exchanged over the bridge socket.
//!
//! Client to server:
//! - `{"type":"request","requestId"?,"message":{...}}` carries an inbound
//!   message. A `requestId` asks for a `reply` frame.
//! - `{"type":"response","requestId","result"?,"error"?}` answers a `call`.
//!
//! Server to client:
//! - outbound events, serialized as-is (`{"type":"chat_response",...}`)
//! - `{"type":"reply","requestId","reply"}`
//! - `{"type":"call","requestId","call":{...}}` asks a page or the host to act.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use pagechat_protocols::{InboundRequest, MessageSender, PageCommandRequest, Reply, SenderTab, TabId};

/// What a socket stands for on the extension side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientRole {
    /// Content script in one tab.
    Page,
    /// Side panel, popup or options page.
    Surface,
    /// Background shim with access to browser-only APIs.
    Host,
}

/// Query string of the `/ws` upgrade request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectParams {
    pub role: ClientRole,
    #[serde(default)]
    pub tab_id: Option<TabId>,
}

impl ConnectParams {
    /// The sender identity messages on this socket carry.
    pub fn sender(&self) -> MessageSender {
        match self.role {
            ClientRole::Page => MessageSender {
                tab: Some(SenderTab {
                    id: self.tab_id,
                    url: None,
                }),
            },
            ClientRole::Surface | ClientRole::Host => MessageSender::surface(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    #[serde(rename_all = "camelCase")]
    Request {
        #[serde(default)]
        request_id: Option<String>,
        message: InboundRequest,
    },
    #[serde(rename_all = "camelCase")]
    Response {
        request_id: String,
        #[serde(default)]
        result: Option<Value>,
        #[serde(default)]
        error: Option<String>,
    },
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerFrame {
    #[serde(rename_all = "camelCase")]
    Reply {
        request_id: String,
        reply: Option<Reply>,
    },
    #[serde(rename_all = "camelCase")]
    Call { request_id: String, call: Call },
}

/// Work the server asks a client to do.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Call {
    /// Liveness probe for a page's content script.
    Ping,
    AgentCommand(PageCommandRequest),
    #[serde(rename_all = "camelCase")]
    OpenSidePanel { tab_id: TabId },
    QueryActiveTab,
    #[serde(rename_all = "camelCase")]
    InjectContentScript { tab_id: TabId },
}

impl Call {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ping => "ping",
            Self::AgentCommand(_) => "agent_command",
            Self::OpenSidePanel { .. } => "open_side_panel",
            Self::QueryActiveTab => "query_active_tab",
            Self::InjectContentScript { .. } => "inject_content_script",
        }
    }
}

/// Read a tab id from `{"tabId": n}` or a bare number. Zero and null mean none.
pub fn parse_tab(value: &Value) -> Option<TabId> {
    value
        .get("tabId")
        .and_then(Value::as_i64)
        .or_else(|| value.as_i64())
        .filter(|id| *id != 0)
        .map(TabId)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagechat_protocols::PageCommand;
    use serde_json::json;

    #[test]
    fn test_request_frame() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "request",
            "requestId": "r1",
            "message": {"type": "chat_message", "message": "hi", "tabId": 5}
        }))
        .unwrap();
        match frame {
            ClientFrame::Request { request_id, message } => {
                assert_eq!(request_id.as_deref(), Some("r1"));
                assert_eq!(message, InboundRequest::chat_for_tab("hi", TabId(5)));
            }
            other => panic!("Expected request, got {:?}", other),
        }
    }

    #[test]
    fn test_fire_and_forget_request() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "request",
            "message": {"type": "toggle_sidebar"}
        }))
        .unwrap();
        assert!(matches!(
            frame,
            ClientFrame::Request { request_id: None, message: InboundRequest::ToggleSidebar }
        ));
    }

    #[test]
    fn test_response_frame_with_error() {
        let frame: ClientFrame = serde_json::from_value(json!({
            "type": "response",
            "requestId": "c1",
            "error": "Could not establish connection"
        }))
        .unwrap();
        match frame {
            ClientFrame::Response { request_id, result, error } => {
                assert_eq!(request_id, "c1");
                assert!(result.is_none());
                assert_eq!(error.as_deref(), Some("Could not establish connection"));
            }
            other => panic!("Expected response, got {:?}", other),
        }
    }

    #[test]
    fn test_call_frame_agent_command() {
        let frame = ServerFrame::Call {
            request_id: "c2".to_string(),
            call: Call::AgentCommand(PageCommandRequest::new(PageCommand::GetPageContent, "hi")),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json["type"], "call");
        assert_eq!(json["requestId"], "c2");
        assert_eq!(json["call"]["type"], "agent_command");
        assert_eq!(json["call"]["command"], "get_page_content");
        assert_eq!(json["call"]["originalMessage"], "hi");
    }

    #[test]
    fn test_call_frame_host_calls() {
        let json = serde_json::to_value(Call::OpenSidePanel { tab_id: TabId(3) }).unwrap();
        assert_eq!(json, json!({"type": "open_side_panel", "tabId": 3}));
        let json = serde_json::to_value(Call::QueryActiveTab).unwrap();
        assert_eq!(json, json!({"type": "query_active_tab"}));
    }

    #[test]
    fn test_reply_frame() {
        let frame = ServerFrame::Reply {
            request_id: "r1".to_string(),
            reply: Some(Reply::SidebarState { is_open: true }),
        };
        let json = serde_json::to_value(&frame).unwrap();
        assert_eq!(json, json!({"type": "reply", "requestId": "r1", "reply": {"isOpen": true}}));

        let empty = ServerFrame::Reply {
            request_id: "r2".to_string(),
            reply: None,
        };
        assert!(serde_json::to_value(&empty).unwrap()["reply"].is_null());
    }

    #[test]
    fn test_connect_params_sender() {
        let page = ConnectParams {
            role: ClientRole::Page,
            tab_id: Some(TabId(4)),
        };
        assert_eq!(page.sender(), MessageSender::page(TabId(4)));

        let surface = ConnectParams {
            role: ClientRole::Surface,
            tab_id: Some(TabId(4)),
        };
        assert!(!surface.sender().is_tab_bound());
    }

    #[test]
    fn test_parse_tab() {
        assert_eq!(parse_tab(&json!({"tabId": 9})), Some(TabId(9)));
        assert_eq!(parse_tab(&json!(9)), Some(TabId(9)));
        assert_eq!(parse_tab(&json!({"tabId": null})), None);
        assert_eq!(parse_tab(&json!(0)), None);
    }
}
