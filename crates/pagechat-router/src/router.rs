//! The message router.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use pagechat_config::{OpenAIConfig, RouterConfig};
use pagechat_protocols::{
    BrowserHost, ChannelError, CompletionClient, CompletionRequest, ConversationKey,
    InboundRequest, Message, MessageHandler, MessageSender, OutboundEvent, PageCommand,
    PageCommandRequest, PageContent, PageContext, Reply, SettingsStore, SurfaceBus, TabId,
};
use tracing::{debug, error, info, warn};

use crate::conversation::ConversationStore;
use crate::debug_log::DebugLog;
use crate::error::ChatError;
use crate::gate::TurnGate;
use crate::intent::IntentMatcher;
use crate::prompt::{build_messages, synthesize_prompt};
use crate::sidebar::SidebarTracker;

const COMMAND_DONE_MESSAGE: &str = "Command executed successfully.";

/// Generation parameters sent with every completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatParams {
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl From<&OpenAIConfig> for ChatParams {
    fn from(config: &OpenAIConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
        }
    }
}

impl Default for ChatParams {
    fn default() -> Self {
        Self::from(&OpenAIConfig::default())
    }
}

/// Where a turn's result goes.
///
/// Tab-less senders (side panel, popup) get a broadcast; page contexts get
/// a direct message. Never both.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Broadcast,
    Tab(Option<TabId>),
}

impl Delivery {
    fn for_sender(sender: &MessageSender, resolved: Option<TabId>) -> Self {
        if sender.is_tab_bound() {
            Self::Tab(resolved.or_else(|| valid_tab(sender.tab_id())))
        } else {
            Self::Broadcast
        }
    }
}

/// Outcome of an attempted page command.
enum CommandOutcome {
    Handled,
    Fallback,
}

fn valid_tab(tab: Option<TabId>) -> Option<TabId> {
    tab.filter(|t| t.0 != 0)
}

/// Single dispatch point for inbound messages.
pub struct MessageRouter {
    completion: Arc<dyn CompletionClient>,
    settings: Arc<dyn SettingsStore>,
    bus: Arc<dyn SurfaceBus>,
    page: Arc<dyn PageContext>,
    host: Arc<dyn BrowserHost>,
    conversations: ConversationStore,
    sidebar: SidebarTracker,
    debug_log: Arc<DebugLog>,
    gate: TurnGate,
    intents: IntentMatcher,
    config: RouterConfig,
    params: ChatParams,
}

impl MessageRouter {
    pub fn new(
        completion: Arc<dyn CompletionClient>,
        settings: Arc<dyn SettingsStore>,
        bus: Arc<dyn SurfaceBus>,
        page: Arc<dyn PageContext>,
        host: Arc<dyn BrowserHost>,
    ) -> Self {
        Self {
            completion,
            settings,
            bus,
            page,
            host,
            conversations: ConversationStore::new(),
            sidebar: SidebarTracker::new(),
            debug_log: Arc::new(DebugLog::new()),
            gate: TurnGate::new(),
            intents: IntentMatcher::new(),
            config: RouterConfig::default(),
            params: ChatParams::default(),
        }
    }

    pub fn with_config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_params(mut self, params: ChatParams) -> Self {
        self.params = params;
        self
    }

    pub fn with_conversations(mut self, conversations: ConversationStore) -> Self {
        self.conversations = conversations;
        self
    }

    pub fn with_sidebar(mut self, sidebar: SidebarTracker) -> Self {
        self.sidebar = sidebar;
        self
    }

    pub fn with_debug_log(mut self, debug_log: Arc<DebugLog>) -> Self {
        self.debug_log = debug_log;
        self
    }

    pub fn conversations(&self) -> &ConversationStore {
        &self.conversations
    }

    pub fn sidebar(&self) -> &SidebarTracker {
        &self.sidebar
    }

    pub fn debug_log(&self) -> &DebugLog {
        &self.debug_log
    }

    /// Handle one inbound message. Returns the reply for request/response
    /// message types, `None` for fire-and-forget ones.
    pub async fn dispatch(&self, request: InboundRequest, sender: MessageSender) -> Option<Reply> {
        self.refresh_debug_flag().await;
        debug!(
            "Dispatching {} (tab-bound sender: {})",
            request.kind(),
            sender.is_tab_bound()
        );

        match request {
            InboundRequest::ChatMessage {
                message,
                tab_id,
                source,
                ..
            } => {
                debug!("Chat message source: {}", source.as_deref().unwrap_or("unknown"));
                self.handle_chat(message, tab_id, &sender).await;
                None
            }
            InboundRequest::GetTabId => Some(Reply::TabId {
                tab_id: sender.tab_id(),
            }),
            InboundRequest::GetDebugLogs => Some(Reply::DebugLogs {
                logs: self.debug_log.entries(),
            }),
            InboundRequest::SidebarManuallyClosed => {
                if let Some(tab) = valid_tab(sender.tab_id()) {
                    self.note(format!("Sidebar manually closed for tab {}", tab)).await;
                    self.mark_closed(tab).await;
                }
                None
            }
            InboundRequest::SidebarClosedByUser => {
                if let Some(tab) = self.resolve_tab(None, &sender).await {
                    info!("Sidebar closed by user for tab {}", tab);
                    self.mark_closed(tab).await;
                }
                None
            }
            InboundRequest::ShowCloseInstructions => {
                self.handle_show_close_instructions(&sender).await;
                None
            }
            InboundRequest::ToggleSidebar => {
                self.handle_toggle(&sender).await;
                None
            }
            InboundRequest::ClearConversation { tab_id } => {
                let key = ConversationKey::for_tab(self.resolve_tab(tab_id, &sender).await);
                self.conversations.clear(key);
                info!("Conversation history cleared for {}", key);
                None
            }
            InboundRequest::GetSidebarState { tab_id } => {
                let is_open = match self.resolve_tab(tab_id, &sender).await {
                    Some(tab) => self.sidebar.get(tab),
                    None => false,
                };
                Some(Reply::SidebarState { is_open })
            }
            InboundRequest::GetConversationHistory { tab_id } => {
                let tab_id = valid_tab(tab_id);
                let history = match tab_id {
                    Some(tab) => {
                        let history = self.conversations.peek(ConversationKey::Tab(tab));
                        self.note(format!(
                            "Returning conversation history for tab {}: {} messages",
                            tab,
                            history.len()
                        ))
                        .await;
                        history.into_messages()
                    }
                    None => Vec::new(),
                };
                Some(Reply::ConversationHistory { history, tab_id })
            }
            InboundRequest::SidebarPresence { is_open } => {
                if let Some(tab) = valid_tab(sender.tab_id()) {
                    self.sidebar.report_presence(tab, is_open);
                }
                None
            }
            InboundRequest::ActionClicked { tab_id } => {
                self.note("Extension icon clicked, opening sidebar".to_string()).await;
                self.open_panel(tab_id).await;
                None
            }
            InboundRequest::ContextMenuSelection { text, tab_id } => {
                self.handle_selection(text, tab_id).await;
                None
            }
            InboundRequest::TabActivated { tab_id } => {
                self.push_sidebar_state(tab_id).await;
                None
            }
            InboundRequest::TabUpdated { tab_id, status } => {
                if status.as_deref() == Some("complete") {
                    self.push_sidebar_state(tab_id).await;
                }
                None
            }
            InboundRequest::Ping => Some(Reply::Pong { ok: true }),
        }
    }

    async fn handle_chat(&self, message: String, message_tab: Option<TabId>, sender: &MessageSender) {
        let Some(api_key) = self.api_key().await else {
            warn!("Chat message rejected: no API key configured");
            let known_tab = valid_tab(sender.tab_id()).or(valid_tab(message_tab));
            let delivery = Delivery::for_sender(sender, known_tab);
            self.deliver(delivery, OutboundEvent::error(ChatError::NotConfigured.user_message()))
                .await;
            return;
        };

        let tab = self.resolve_tab(message_tab, sender).await;
        let key = ConversationKey::for_tab(tab);
        let delivery = Delivery::for_sender(sender, tab);

        let turn = self.gate.acquire(key).await;
        self.run_turn(message, tab, key, delivery, &api_key).await;
        drop(turn);
        self.gate.prune(key);
    }

    /// One chat turn, run while holding the gate for `key`.
    async fn run_turn(
        &self,
        message: String,
        tab: Option<TabId>,
        key: ConversationKey,
        delivery: Delivery,
        api_key: &str,
    ) {
        debug!("Turn started for {} ({} stored messages)", key, self.conversations.len(key));

        if self.config.agent_commands {
            if let (Some(tab), Some(request)) = (tab, self.intents.parse(&message)) {
                match self.run_page_command(tab, key, request, api_key, delivery).await {
                    CommandOutcome::Handled => return,
                    CommandOutcome::Fallback => {
                        debug!("Page command did not resolve, continuing with contextual chat");
                    }
                }
            }
        }

        let page = match tab {
            Some(tab) => self.fetch_page_content(tab, &message).await,
            None => {
                debug!("No tab resolved, sending without page context");
                None
            }
        };

        let result = self.complete_turn(key, &message, page.as_ref(), api_key).await;
        self.finish_turn(key, delivery, result).await;
    }

    /// Execute a matched page command and route its data through completion.
    async fn run_page_command(
        &self,
        tab: TabId,
        key: ConversationKey,
        request: PageCommandRequest,
        api_key: &str,
        delivery: Delivery,
    ) -> CommandOutcome {
        let command = request.command;
        self.note(format!("Executing page command {} on tab {}", command.as_str(), tab))
            .await;

        if command == PageCommand::Screenshot {
            debug!("Screenshots are not supported by the page context");
            return CommandOutcome::Fallback;
        }

        if let Err(e) = self.ensure_provider(tab).await {
            warn!("Content provider unavailable in tab {}: {}", tab, e);
            return CommandOutcome::Fallback;
        }

        let original_message = request.original_message.clone();
        let response = match self.page.execute(tab, request).await {
            Ok(response) if response.success => response,
            Ok(response) => {
                warn!(
                    "Page command {} failed: {}",
                    command.as_str(),
                    response.error.as_deref().unwrap_or("unknown error")
                );
                return CommandOutcome::Fallback;
            }
            Err(e) => {
                warn!("Page command {} failed: {}", command.as_str(), e);
                return CommandOutcome::Fallback;
            }
        };

        match response.payload() {
            Some(data) => {
                let prompt = synthesize_prompt(command, data, &original_message);
                let result = self.complete_turn(key, &prompt, None, api_key).await;
                self.finish_turn(key, delivery, result).await;
            }
            None => {
                let content = response
                    .message
                    .clone()
                    .unwrap_or_else(|| COMMAND_DONE_MESSAGE.to_string());
                self.deliver(delivery, OutboundEvent::chat_response(content)).await;
            }
        }
        CommandOutcome::Handled
    }

    /// Ask the completion API and record the exchange on success.
    async fn complete_turn(
        &self,
        key: ConversationKey,
        user_message: &str,
        page: Option<&PageContent>,
        api_key: &str,
    ) -> Result<String, ChatError> {
        let history = self.conversations.window(key, self.config.history_window);
        let messages = build_messages(&history, user_message, page);
        debug!(
            "Calling {} with {} messages (page context: {})",
            self.completion.id(),
            messages.len(),
            page.is_some()
        );

        let request = CompletionRequest::new(self.params.model.clone(), messages)
            .with_max_tokens(self.params.max_tokens)
            .with_temperature(self.params.temperature);

        let response = self.completion.complete(request, api_key).await?;
        let content = response.content;

        self.conversations.append_exchange(
            key,
            Message::user(user_message),
            Message::assistant(content.clone()),
        );
        Ok(content)
    }

    async fn finish_turn(
        &self,
        key: ConversationKey,
        delivery: Delivery,
        result: Result<String, ChatError>,
    ) {
        let event = match result {
            Ok(content) => {
                info!(
                    "Turn completed for {} ({} stored messages)",
                    key,
                    self.conversations.len(key)
                );
                OutboundEvent::chat_response(content)
            }
            Err(e) => {
                warn!("Turn failed for {}: {}", key, e);
                OutboundEvent::error(e.user_message())
            }
        };
        self.deliver(delivery, event).await;
    }

    async fn fetch_page_content(&self, tab: TabId, original_message: &str) -> Option<PageContent> {
        if let Err(e) = self.ensure_provider(tab).await {
            warn!("Could not reach content provider in tab {}: {}", tab, e);
            return None;
        }

        let request = PageCommandRequest::new(PageCommand::GetPageContent, original_message);
        match self.page.execute(tab, request).await {
            Ok(response) => match response.page_content() {
                Some(page) => {
                    debug!("Got page content for tab {}: {:?}", tab, page.title);
                    Some(page.truncated(self.config.max_page_chars))
                }
                None => {
                    warn!("Tab {} returned no page content, sending without context", tab);
                    None
                }
            },
            Err(e) => {
                warn!("Error getting page content from tab {}: {}", tab, e);
                None
            }
        }
    }

    /// Ping the content provider, injecting it when the ping fails.
    async fn ensure_provider(&self, tab: TabId) -> Result<(), ChannelError> {
        if self.page.ping(tab).await.is_ok() {
            return Ok(());
        }
        debug!("Content provider not answering in tab {}, injecting", tab);
        self.page.inject(tab).await
    }

    /// Resolve the acting tab: sender tab, then the message's `tabId`, then
    /// the sender tab even without an id, then the active tab.
    async fn resolve_tab(&self, message_tab: Option<TabId>, sender: &MessageSender) -> Option<TabId> {
        if let Some(tab) = valid_tab(sender.tab_id()) {
            return Some(tab);
        }
        if let Some(tab) = valid_tab(message_tab) {
            return Some(tab);
        }
        if sender.is_tab_bound() {
            return None;
        }
        match self.host.active_tab().await {
            Ok(tab) => valid_tab(tab),
            Err(e) => {
                warn!("Failed to get active tab: {}", e);
                None
            }
        }
    }

    async fn api_key(&self) -> Option<String> {
        match self.settings.api_key().await {
            Ok(key) => key.filter(|k| !k.is_empty()),
            Err(e) => {
                warn!("Failed to read API key: {}", e);
                None
            }
        }
    }

    async fn handle_toggle(&self, sender: &MessageSender) {
        let Some(tab) = valid_tab(sender.tab_id()) else {
            error!("No tab id available for sidebar toggle");
            return;
        };

        if self.sidebar.toggle(tab) {
            if let Err(e) = self.host.open_side_panel(tab).await {
                self.sidebar.set(tab, false);
                error!("Error opening sidebar for tab {}: {}", tab, e);
                self.note(format!("Sidebar open failed for tab {}: {}", tab, e)).await;
                return;
            }
            info!("Sidebar opened from page toggle for tab {}", tab);
            self.notify_tab(tab, OutboundEvent::SidebarOpened).await;
        } else {
            debug!("Sidebar toggle closing tab {}", tab);
            self.notify_tab(tab, OutboundEvent::SidebarCloseHint).await;
        }
    }

    async fn handle_show_close_instructions(&self, sender: &MessageSender) {
        let Some(tab) = valid_tab(sender.tab_id()) else {
            return;
        };
        self.note(format!("Forwarding close instructions to sidebar for tab {}", tab))
            .await;
        if let Err(e) = self
            .bus
            .broadcast(OutboundEvent::ShowCloseInstructions { tab_id: tab })
            .await
        {
            self.note(format!("Could not send close instructions to sidebar: {}", e))
                .await;
        }
    }

    async fn handle_selection(&self, text: String, tab: TabId) {
        if !self.open_panel(tab).await {
            return;
        }
        tokio::time::sleep(Duration::from_millis(self.config.prefill_delay_ms)).await;
        if let Err(e) = self
            .bus
            .broadcast(OutboundEvent::PrefillText { text, tab_id: tab })
            .await
        {
            error!("Error sending prefill text: {}", e);
        }
    }

    /// Open the side panel and record it as open. Returns whether it opened.
    async fn open_panel(&self, tab: TabId) -> bool {
        match self.host.open_side_panel(tab).await {
            Ok(()) => {
                self.sidebar.set(tab, true);
                info!("Sidebar opened for tab {}", tab);
                self.notify_tab(tab, OutboundEvent::SidebarOpened).await;
                true
            }
            Err(e) => {
                error!("Error opening sidebar for tab {}: {}", tab, e);
                false
            }
        }
    }

    async fn mark_closed(&self, tab: TabId) {
        self.sidebar.set(tab, false);
        self.notify_tab(tab, OutboundEvent::SidebarClosed).await;
    }

    async fn push_sidebar_state(&self, tab: TabId) {
        let is_open = self.sidebar.get(tab);
        self.notify_tab(tab, OutboundEvent::SidebarStateUpdate { is_open })
            .await;
        self.note(format!("Checked sidebar state for tab {}: {}", tab, is_open))
            .await;
    }

    /// Advisory message to a page context. Failure is logged and dropped.
    async fn notify_tab(&self, tab: TabId, event: OutboundEvent) {
        let kind = event.kind();
        if let Err(e) = self.bus.send_to_tab(tab, event).await {
            debug!("Could not notify tab {} of {}: {}", tab, kind, e);
        }
    }

    async fn deliver(&self, delivery: Delivery, event: OutboundEvent) {
        let kind = event.kind();
        let result = match delivery {
            Delivery::Broadcast => self.bus.broadcast(event).await,
            Delivery::Tab(Some(tab)) => self.bus.send_to_tab(tab, event).await,
            Delivery::Tab(None) => {
                error!("No tab id available for {} delivery", kind);
                return;
            }
        };
        if let Err(e) = result {
            error!("Failed to deliver {}: {}", kind, e);
        }
    }

    async fn refresh_debug_flag(&self) {
        match self.settings.debug_logging().await {
            Ok(enabled) => self.debug_log.set_enabled(enabled),
            Err(e) => warn!("Failed to read debug logging setting: {}", e),
        }
    }

    /// Trace `message` and, when debug logging is on, keep and broadcast it.
    async fn note(&self, message: String) {
        debug!("{}", message);
        if let Some(entry) = self.debug_log.record(&message) {
            if let Err(e) = self.bus.broadcast(OutboundEvent::DebugLog { log: entry }).await {
                debug!("Debug log entry not delivered: {}", e);
            }
        }
    }
}

#[async_trait]
impl MessageHandler for MessageRouter {
    async fn handle(&self, request: InboundRequest, sender: MessageSender) -> Option<Reply> {
        self.dispatch(request, sender).await
    }
}

#[cfg(test)]
#[path = "router_tests.rs"]
mod tests;
