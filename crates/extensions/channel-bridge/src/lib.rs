//! # Pagechat Channel - Bridge
//!
//! WebSocket bridge between the browser extension and the router.
//!
//! The extension keeps three kinds of sockets open on `/ws`:
//! - `role=page&tabId=N` for the content script of tab N
//! - `role=surface` for the side panel, popup and options page
//! - `role=host` for the background shim that owns browser-only APIs
//!
//! Inbound `request` frames are handed to the attached [`MessageHandler`].
//! [`WebBridge`] in turn implements [`SurfaceBus`], [`PageContext`] and
//! [`BrowserHost`] by pushing events and `call` frames back out.
//!
//! ## Usage
//!
//! ```ignore
//! let bridge = WebBridge::new(config.bridge.clone());
//! let router = Arc::new(MessageRouter::new(completion, settings,
//!     Arc::new(bridge.clone()), Arc::new(bridge.clone()), Arc::new(bridge.clone())));
//! bridge.attach(router);
//! let addr = bridge.start("127.0.0.1:8765").await?;
//! ```

mod connection;
mod frame;
mod server;

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use pagechat_config::BridgeConfig;
use pagechat_protocols::{
    BrowserHost, ChannelError, MessageHandler, OutboundEvent, PageCommandRequest,
    PageCommandResponse, PageContext, SurfaceBus, TabId,
};

pub use connection::Connection;
pub use frame::{parse_tab, Call, ClientFrame, ClientRole, ConnectParams, ServerFrame};
pub use server::create_router;

type CallResult = Result<Value, String>;

struct PendingCall {
    conn_id: String,
    tx: oneshot::Sender<CallResult>,
}

/// Bridge state shared across handlers.
pub struct BridgeState {
    /// Open sockets by connection id.
    pub connections: DashMap<String, Connection>,
    pending: DashMap<String, PendingCall>,
    handler: OnceLock<Arc<dyn MessageHandler>>,
    config: BridgeConfig,
    pub started: AtomicBool,
}

impl BridgeState {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            connections: DashMap::new(),
            pending: DashMap::new(),
            handler: OnceLock::new(),
            config,
            started: AtomicBool::new(false),
        }
    }

    pub fn handler(&self) -> Option<Arc<dyn MessageHandler>> {
        self.handler.get().cloned()
    }

    pub fn count(&self, role: ClientRole) -> usize {
        self.connections
            .iter()
            .filter(|c| c.matches(role, None))
            .count()
    }

    #[cfg(test)]
    pub(crate) fn pending_calls(&self) -> usize {
        self.pending.len()
    }

    fn outbound_for(&self, role: ClientRole, tab: Option<TabId>) -> Vec<mpsc::Sender<String>> {
        self.connections
            .iter()
            .filter(|c| c.matches(role, tab))
            .map(|c| c.outbound())
            .collect()
    }

    fn first_outbound(
        &self,
        role: ClientRole,
        tab: Option<TabId>,
    ) -> Option<(String, mpsc::Sender<String>)> {
        self.connections
            .iter()
            .find(|c| c.matches(role, tab))
            .map(|c| (c.id.clone(), c.outbound()))
    }

    /// Resolve a pending call. Returns false for unknown or expired ids.
    fn complete_call(&self, request_id: &str, outcome: CallResult) -> bool {
        match self.pending.remove(request_id) {
            Some((_, call)) => call.tx.send(outcome).is_ok(),
            None => false,
        }
    }

    /// Drop every call waiting on `conn_id`; waiters see a disconnect.
    fn abandon_calls(&self, conn_id: &str) {
        self.pending.retain(|_, call| call.conn_id != conn_id);
    }
}

/// The server side of the extension bridge.
#[derive(Clone)]
pub struct WebBridge {
    state: Arc<BridgeState>,
    shutdown_tx: Arc<Mutex<Option<oneshot::Sender<()>>>>,
}

impl WebBridge {
    pub fn new(config: BridgeConfig) -> Self {
        Self {
            state: Arc::new(BridgeState::new(config)),
            shutdown_tx: Arc::new(Mutex::new(None)),
        }
    }

    /// Set the consumer of inbound requests. Only the first call takes effect.
    pub fn attach(&self, handler: Arc<dyn MessageHandler>) -> bool {
        self.state.handler.set(handler).is_ok()
    }

    pub fn state(&self) -> Arc<BridgeState> {
        self.state.clone()
    }

    pub fn is_started(&self) -> bool {
        self.state.started.load(Ordering::SeqCst)
    }

    #[cfg(test)]
    pub(crate) fn connection_count(&self) -> usize {
        self.state.connections.len()
    }

    /// Bind `addr` and serve in the background. Returns the bound address.
    pub async fn start(&self, addr: &str) -> Result<SocketAddr, ChannelError> {
        let listener_addr: SocketAddr = addr
            .parse()
            .map_err(|e| ChannelError::ConnectionFailed(format!("Invalid address: {}", e)))?;

        let listener = tokio::net::TcpListener::bind(listener_addr)
            .await
            .map_err(|e| ChannelError::ConnectionFailed(format!("Failed to bind: {}", e)))?;
        let local_addr = listener
            .local_addr()
            .map_err(|e| ChannelError::ConnectionFailed(e.to_string()))?;

        let router = create_router(self.state.clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        *self.shutdown_tx.lock() = Some(shutdown_tx);

        info!("Bridge listening on ws://{}/ws", local_addr);
        self.state.started.store(true, Ordering::SeqCst);

        tokio::spawn(async move {
            let shutdown = async {
                let _ = shutdown_rx.await;
            };
            if let Err(e) = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown)
                .await
            {
                error!("Bridge server error: {}", e);
            }
        });

        Ok(local_addr)
    }

    pub fn stop(&self) {
        if let Some(tx) = self.shutdown_tx.lock().take() {
            let _ = tx.send(());
        }
        for conn in self.state.connections.iter() {
            conn.close();
        }
        self.state.connections.clear();
        self.state.pending.clear();
        self.state.started.store(false, Ordering::SeqCst);
        info!("Bridge stopped");
    }

    async fn send_event(
        &self,
        targets: Vec<mpsc::Sender<String>>,
        event: &OutboundEvent,
    ) -> Result<(), ChannelError> {
        let text =
            serde_json::to_string(event).map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let mut delivered = 0;
        let mut last_error = None;
        for tx in targets {
            match tx.send(text.clone()).await {
                Ok(()) => delivered += 1,
                Err(e) => last_error = Some(e.to_string()),
            }
        }

        match (delivered, last_error) {
            (0, Some(e)) => Err(ChannelError::SendFailed(e)),
            _ => Ok(()),
        }
    }

    /// Send a call to the first matching client and wait for its response.
    async fn call(
        &self,
        role: ClientRole,
        tab: Option<TabId>,
        call: Call,
    ) -> Result<Value, ChannelError> {
        let (conn_id, outbound) = self.state.first_outbound(role, tab).ok_or_else(|| {
            ChannelError::NotFound(match tab {
                Some(tab) => format!("tab {}", tab),
                None => format!("{:?}", role).to_lowercase(),
            })
        })?;

        let kind = call.kind();
        let request_id = uuid::Uuid::new_v4().to_string();
        let text = serde_json::to_string(&ServerFrame::Call {
            request_id: request_id.clone(),
            call,
        })
        .map_err(|e| ChannelError::SendFailed(e.to_string()))?;

        let (tx, rx) = oneshot::channel();
        self.state
            .pending
            .insert(request_id.clone(), PendingCall { conn_id, tx });

        if let Err(e) = outbound.send(text).await {
            self.state.pending.remove(&request_id);
            return Err(ChannelError::SendFailed(e.to_string()));
        }
        debug!("Sent {} call {}", kind, request_id);

        let timeout_ms = self.state.config.request_timeout_ms;
        match tokio::time::timeout(Duration::from_millis(timeout_ms), rx).await {
            Ok(Ok(Ok(value))) => Ok(value),
            Ok(Ok(Err(message))) => Err(ChannelError::Rejected(message)),
            Ok(Err(_)) => Err(ChannelError::Disconnected),
            Err(_) => {
                self.state.pending.remove(&request_id);
                warn!("{} call {} timed out", kind, request_id);
                Err(ChannelError::Timeout(timeout_ms))
            }
        }
    }
}

#[async_trait]
impl SurfaceBus for WebBridge {
    async fn broadcast(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        let targets = self.state.outbound_for(ClientRole::Surface, None);
        if targets.is_empty() {
            return Err(ChannelError::NotFound("extension surfaces".to_string()));
        }
        self.send_event(targets, &event).await
    }

    async fn send_to_tab(&self, tab: TabId, event: OutboundEvent) -> Result<(), ChannelError> {
        let targets = self.state.outbound_for(ClientRole::Page, Some(tab));
        if targets.is_empty() {
            return Err(ChannelError::NotFound(format!("tab {}", tab)));
        }
        self.send_event(targets, &event).await
    }
}

#[async_trait]
impl PageContext for WebBridge {
    async fn ping(&self, tab: TabId) -> Result<(), ChannelError> {
        self.call(ClientRole::Page, Some(tab), Call::Ping)
            .await
            .map(|_| ())
    }

    async fn inject(&self, tab: TabId) -> Result<(), ChannelError> {
        self.call(ClientRole::Host, None, Call::InjectContentScript { tab_id: tab })
            .await?;
        tokio::time::sleep(Duration::from_millis(self.state.config.inject_settle_ms)).await;
        Ok(())
    }

    async fn execute(
        &self,
        tab: TabId,
        request: PageCommandRequest,
    ) -> Result<PageCommandResponse, ChannelError> {
        let value = self
            .call(ClientRole::Page, Some(tab), Call::AgentCommand(request))
            .await?;
        serde_json::from_value(value)
            .map_err(|e| ChannelError::ReceiveFailed(format!("Malformed command response: {}", e)))
    }
}

#[async_trait]
impl BrowserHost for WebBridge {
    async fn open_side_panel(&self, tab: TabId) -> Result<(), ChannelError> {
        self.call(ClientRole::Host, None, Call::OpenSidePanel { tab_id: tab })
            .await
            .map(|_| ())
    }

    async fn active_tab(&self) -> Result<Option<TabId>, ChannelError> {
        let value = self
            .call(ClientRole::Host, None, Call::QueryActiveTab)
            .await?;
        Ok(parse_tab(&value))
    }
}

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;
