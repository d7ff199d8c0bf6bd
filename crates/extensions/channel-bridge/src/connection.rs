//! WebSocket connection management.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use pagechat_protocols::{ChannelError, MessageSender, TabId};

use crate::frame::{ClientFrame, ClientRole, ConnectParams, ServerFrame};
use crate::BridgeState;

/// A socket opened by the extension.
pub struct Connection {
    pub id: String,
    pub role: ClientRole,
    /// Tab a page connection belongs to.
    pub tab: Option<TabId>,
    tx: mpsc::Sender<String>,
    open: Arc<AtomicBool>,
}

impl Connection {
    /// Register the connection in `state` and spawn its handler task.
    pub fn open(id: String, params: ConnectParams, socket: WebSocket, state: Arc<BridgeState>) {
        let (tx, rx) = mpsc::channel::<String>(32);
        let open = Arc::new(AtomicBool::new(true));

        let conn = Self {
            id: id.clone(),
            role: params.role,
            tab: params.tab_id,
            tx: tx.clone(),
            open: open.clone(),
        };
        state.connections.insert(id.clone(), conn);

        let sender = params.sender();
        tokio::spawn(handle_connection(id, socket, rx, tx, sender, state, open));
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    pub(crate) fn outbound(&self) -> mpsc::Sender<String> {
        self.tx.clone()
    }

    pub(crate) fn matches(&self, role: ClientRole, tab: Option<TabId>) -> bool {
        self.is_open() && self.role == role && (tab.is_none() || self.tab == tab)
    }
}

async fn handle_connection(
    conn_id: String,
    socket: WebSocket,
    mut outbound_rx: mpsc::Receiver<String>,
    reply_tx: mpsc::Sender<String>,
    sender: MessageSender,
    state: Arc<BridgeState>,
    open: Arc<AtomicBool>,
) {
    let (mut ws_tx, mut ws_rx) = socket.split();

    info!("Bridge connection established: {}", conn_id);

    loop {
        tokio::select! {
            Some(text) = outbound_rx.recv() => {
                if let Err(e) = ws_tx.send(Message::Text(text.into())).await {
                    warn!("Failed to send frame to {}: {}", conn_id, e);
                    break;
                }
            }

            result = ws_rx.next() => {
                match result {
                    Some(Ok(msg)) => {
                        if let Err(e) = handle_message(&conn_id, msg, &reply_tx, &sender, &state) {
                            warn!("Failed to handle frame from {}: {}", conn_id, e);
                        }
                    }
                    Some(Err(e)) => {
                        error!("WebSocket error from {}: {}", conn_id, e);
                        break;
                    }
                    None => {
                        info!("Bridge connection closed: {}", conn_id);
                        break;
                    }
                }
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    state.connections.remove(&conn_id);
    state.abandon_calls(&conn_id);
    debug!("Bridge connection removed: {}", conn_id);
}

fn handle_message(
    conn_id: &str,
    msg: Message,
    reply_tx: &mpsc::Sender<String>,
    sender: &MessageSender,
    state: &BridgeState,
) -> Result<(), ChannelError> {
    match msg {
        Message::Text(text) => handle_frame(conn_id, text.as_str(), reply_tx, sender, state),
        Message::Binary(_) => {
            debug!("Received binary frame from {} (ignored)", conn_id);
            Ok(())
        }
        Message::Ping(_) | Message::Pong(_) | Message::Close(_) => Ok(()),
    }
}

fn handle_frame(
    conn_id: &str,
    text: &str,
    reply_tx: &mpsc::Sender<String>,
    sender: &MessageSender,
    state: &BridgeState,
) -> Result<(), ChannelError> {
    let frame: ClientFrame = serde_json::from_str(text)
        .map_err(|e| ChannelError::ReceiveFailed(format!("Invalid frame: {}", e)))?;

    match frame {
        ClientFrame::Request { request_id, message } => {
            let handler = state
                .handler()
                .ok_or_else(|| ChannelError::NotFound("message handler".to_string()))?;
            debug!("Request {} from {}", message.kind(), conn_id);

            // Handlers can wait on calls answered over this same socket.
            let sender = sender.clone();
            let reply_tx = reply_tx.clone();
            tokio::spawn(async move {
                let reply = handler.handle(message, sender).await;
                let Some(request_id) = request_id else {
                    return;
                };
                match serde_json::to_string(&ServerFrame::Reply { request_id, reply }) {
                    Ok(text) => {
                        if reply_tx.send(text).await.is_err() {
                            debug!("Connection gone before reply was sent");
                        }
                    }
                    Err(e) => warn!("Failed to encode reply: {}", e),
                }
            });
        }
        ClientFrame::Response {
            request_id,
            result,
            error,
        } => {
            let outcome = match error {
                Some(message) => Err(message),
                None => Ok(result.unwrap_or(Value::Null)),
            };
            if !state.complete_call(&request_id, outcome) {
                debug!("Response for unknown call {} from {}", request_id, conn_id);
            }
        }
    }

    Ok(())
}
