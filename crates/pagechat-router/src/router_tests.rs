use super::*;
use crate::error::NOT_CONFIGURED_MESSAGE;
use crate::prompt::system_message;
use async_trait::async_trait;
use pagechat_config::{MemorySettingsStore, Settings};
use pagechat_protocols::{PageCommandResponse, ProviderError, Role};
use parking_lot::Mutex;
use serde_json::json;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

// ---------------------------------------------------------------------------
// Fakes
// ---------------------------------------------------------------------------

struct FakeCompletion {
    scripted: Mutex<VecDeque<Result<String, ProviderError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    keys: Mutex<Vec<String>>,
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl FakeCompletion {
    fn new() -> Self {
        Self {
            scripted: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            keys: Mutex::new(Vec::new()),
            delay: Duration::ZERO,
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    fn push(&self, result: Result<String, ProviderError>) {
        self.scripted.lock().push_back(result);
    }

    fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().clone()
    }

    fn last_request(&self) -> CompletionRequest {
        self.requests.lock().last().cloned().unwrap()
    }
}

#[async_trait]
impl CompletionClient for FakeCompletion {
    fn id(&self) -> &str {
        "fake"
    }

    async fn complete(
        &self,
        request: CompletionRequest,
        api_key: &str,
    ) -> Result<pagechat_protocols::CompletionResponse, ProviderError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let user = request
            .messages
            .last()
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.requests.lock().push(request);
        self.keys.lock().push(api_key.to_string());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        let scripted = self.scripted.lock().pop_front();
        match scripted {
            Some(result) => result.map(pagechat_protocols::CompletionResponse::text),
            None => Ok(pagechat_protocols::CompletionResponse::text(format!(
                "reply to {}",
                user
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Sent {
    Broadcast(OutboundEvent),
    Tab(TabId, OutboundEvent),
}

#[derive(Default)]
struct RecordingBus {
    sent: Mutex<Vec<Sent>>,
    /// No surface is listening; broadcasts fail.
    surfaces_offline: bool,
}

impl RecordingBus {
    fn sent(&self) -> Vec<Sent> {
        self.sent.lock().clone()
    }

    fn broadcasts(&self) -> Vec<OutboundEvent> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Broadcast(e) => Some(e),
                Sent::Tab(..) => None,
            })
            .collect()
    }

    fn to_tab(&self, tab: TabId) -> Vec<OutboundEvent> {
        self.sent()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Tab(t, e) if t == tab => Some(e),
                _ => None,
            })
            .collect()
    }

    /// Chat results only, ignoring advisory traffic.
    fn results(&self) -> Vec<Sent> {
        self.sent()
            .into_iter()
            .filter(|s| {
                let event = match s {
                    Sent::Broadcast(e) | Sent::Tab(_, e) => e,
                };
                matches!(
                    event,
                    OutboundEvent::ChatResponse { .. } | OutboundEvent::Error { .. }
                )
            })
            .collect()
    }
}

#[async_trait]
impl SurfaceBus for RecordingBus {
    async fn broadcast(&self, event: OutboundEvent) -> Result<(), ChannelError> {
        if self.surfaces_offline {
            return Err(ChannelError::NotFound("extension surfaces".to_string()));
        }
        self.sent.lock().push(Sent::Broadcast(event));
        Ok(())
    }

    async fn send_to_tab(&self, tab: TabId, event: OutboundEvent) -> Result<(), ChannelError> {
        self.sent.lock().push(Sent::Tab(tab, event));
        Ok(())
    }
}

struct FakePage {
    alive: bool,
    inject_ok: bool,
    content: Option<PageContent>,
    commands: HashMap<PageCommand, PageCommandResponse>,
    pings: AtomicUsize,
    injects: AtomicUsize,
    executed: Mutex<Vec<(TabId, PageCommandRequest)>>,
}

impl FakePage {
    fn with_content(content: Option<PageContent>) -> Self {
        Self {
            alive: true,
            inject_ok: true,
            content,
            commands: HashMap::new(),
            pings: AtomicUsize::new(0),
            injects: AtomicUsize::new(0),
            executed: Mutex::new(Vec::new()),
        }
    }

    fn unreachable() -> Self {
        Self {
            alive: false,
            inject_ok: false,
            ..Self::with_content(None)
        }
    }

    fn with_command(mut self, command: PageCommand, response: PageCommandResponse) -> Self {
        self.commands.insert(command, response);
        self
    }

    fn executed_commands(&self) -> Vec<PageCommand> {
        self.executed.lock().iter().map(|(_, r)| r.command).collect()
    }
}

#[async_trait]
impl PageContext for FakePage {
    async fn ping(&self, _tab: TabId) -> Result<(), ChannelError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        if self.alive {
            Ok(())
        } else {
            Err(ChannelError::NotFound("page".to_string()))
        }
    }

    async fn inject(&self, _tab: TabId) -> Result<(), ChannelError> {
        self.injects.fetch_add(1, Ordering::SeqCst);
        if self.inject_ok {
            Ok(())
        } else {
            Err(ChannelError::Rejected("cannot inject into chrome:// pages".to_string()))
        }
    }

    async fn execute(
        &self,
        tab: TabId,
        request: PageCommandRequest,
    ) -> Result<PageCommandResponse, ChannelError> {
        let command = request.command;
        self.executed.lock().push((tab, request));
        if command == PageCommand::GetPageContent {
            return match &self.content {
                Some(page) => Ok(PageCommandResponse::ok(serde_json::to_value(page).unwrap())),
                None => Err(ChannelError::Timeout(5000)),
            };
        }
        Ok(self
            .commands
            .get(&command)
            .cloned()
            .unwrap_or_else(|| PageCommandResponse::failed("Unknown command")))
    }
}

struct FakeHost {
    active: Result<Option<TabId>, ()>,
    open_ok: bool,
    opened: Mutex<Vec<TabId>>,
}

impl FakeHost {
    fn new(active: Option<TabId>) -> Self {
        Self {
            active: Ok(active),
            open_ok: true,
            opened: Mutex::new(Vec::new()),
        }
    }

    fn failing_open() -> Self {
        Self {
            open_ok: false,
            ..Self::new(None)
        }
    }

    fn broken() -> Self {
        Self {
            active: Err(()),
            ..Self::new(None)
        }
    }
}

#[async_trait]
impl BrowserHost for FakeHost {
    async fn open_side_panel(&self, tab: TabId) -> Result<(), ChannelError> {
        if !self.open_ok {
            return Err(ChannelError::Rejected("user gesture required".to_string()));
        }
        self.opened.lock().push(tab);
        Ok(())
    }

    async fn active_tab(&self) -> Result<Option<TabId>, ChannelError> {
        self.active.map_err(|_| ChannelError::Disconnected)
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    router: Arc<MessageRouter>,
    completion: Arc<FakeCompletion>,
    bus: Arc<RecordingBus>,
    page: Arc<FakePage>,
    host: Arc<FakeHost>,
    settings: Arc<MemorySettingsStore>,
}

struct HarnessBuilder {
    completion: FakeCompletion,
    page: FakePage,
    host: FakeHost,
    settings: Settings,
    config: RouterConfig,
    surfaces_offline: bool,
}

impl HarnessBuilder {
    fn new() -> Self {
        Self {
            completion: FakeCompletion::new(),
            page: FakePage::with_content(None),
            host: FakeHost::new(None),
            settings: Settings {
                openai_api_key: Some("sk-test".to_string()),
                debug_logging: false,
            },
            config: RouterConfig {
                prefill_delay_ms: 0,
                ..RouterConfig::default()
            },
            surfaces_offline: false,
        }
    }

    fn completion(mut self, completion: FakeCompletion) -> Self {
        self.completion = completion;
        self
    }

    fn page(mut self, page: FakePage) -> Self {
        self.page = page;
        self
    }

    fn host(mut self, host: FakeHost) -> Self {
        self.host = host;
        self
    }

    fn api_key(mut self, key: Option<&str>) -> Self {
        self.settings.openai_api_key = key.map(str::to_string);
        self
    }

    fn debug_logging(mut self) -> Self {
        self.settings.debug_logging = true;
        self
    }

    fn surfaces_offline(mut self) -> Self {
        self.surfaces_offline = true;
        self
    }

    fn agent_commands(mut self) -> Self {
        self.config.agent_commands = true;
        self
    }

    fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    fn build(self) -> Harness {
        let completion = Arc::new(self.completion);
        let bus = Arc::new(RecordingBus {
            surfaces_offline: self.surfaces_offline,
            ..RecordingBus::default()
        });
        let page = Arc::new(self.page);
        let host = Arc::new(self.host);
        let settings = Arc::new(MemorySettingsStore::new(self.settings));
        let router = MessageRouter::new(
            completion.clone(),
            settings.clone(),
            bus.clone(),
            page.clone(),
            host.clone(),
        )
        .with_config(self.config);
        Harness {
            router: Arc::new(router),
            completion,
            bus,
            page,
            host,
            settings,
        }
    }
}

fn page_content() -> PageContent {
    PageContent {
        title: "Release notes".to_string(),
        url: "https://example.com/notes".to_string(),
        content: "Version 2 ships a new parser.".to_string(),
    }
}

fn tab5() -> TabId {
    TabId(5)
}

fn key5() -> ConversationKey {
    ConversationKey::Tab(tab5())
}

// ---------------------------------------------------------------------------
// Chat turns
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_tab_bound_chat_replies_to_tab_only() {
    let h = HarnessBuilder::new().build();

    let reply = h
        .router
        .dispatch(InboundRequest::chat("hi"), MessageSender::page(tab5()))
        .await;

    assert!(reply.is_none());
    assert_eq!(
        h.bus.results(),
        vec![Sent::Tab(tab5(), OutboundEvent::chat_response("reply to hi"))]
    );
    assert!(h.bus.broadcasts().is_empty());
    assert_eq!(h.router.conversations().len(key5()), 2);
    assert_eq!(h.completion.keys.lock().as_slice(), ["sk-test"]);
}

#[tokio::test]
async fn test_surface_chat_is_broadcast_only() {
    let h = HarnessBuilder::new().build();

    h.router
        .dispatch(
            InboundRequest::chat_for_tab("hello", tab5()),
            MessageSender::surface(),
        )
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Broadcast(OutboundEvent::chat_response("reply to hello"))]
    );
    assert!(h.bus.to_tab(tab5()).is_empty());
    assert_eq!(h.router.conversations().len(key5()), 2);
}

#[tokio::test]
async fn test_missing_api_key_reports_not_configured() {
    let h = HarnessBuilder::new().api_key(None).build();

    h.router
        .dispatch(InboundRequest::chat_for_tab("hi", tab5()), MessageSender::page(tab5()))
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Tab(tab5(), OutboundEvent::error(NOT_CONFIGURED_MESSAGE))]
    );
    assert_eq!(h.router.conversations().len(key5()), 0);
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn test_not_configured_from_idless_tab_goes_to_message_tab() {
    let h = HarnessBuilder::new().api_key(None).build();
    let sender = MessageSender {
        tab: Some(pagechat_protocols::SenderTab { id: None, url: None }),
    };

    h.router
        .dispatch(InboundRequest::chat_for_tab("hi", tab5()), sender)
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Tab(tab5(), OutboundEvent::error(NOT_CONFIGURED_MESSAGE))]
    );
    assert!(h.completion.requests().is_empty());
}

#[tokio::test]
async fn test_empty_api_key_is_not_configured() {
    let h = HarnessBuilder::new().api_key(Some("")).build();

    h.router
        .dispatch(InboundRequest::chat_for_tab("hi", tab5()), MessageSender::surface())
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Broadcast(OutboundEvent::error(NOT_CONFIGURED_MESSAGE))]
    );
}

#[tokio::test]
async fn test_key_saved_mid_session_is_used() {
    let h = HarnessBuilder::new().api_key(None).build();
    h.router
        .dispatch(InboundRequest::chat("one"), MessageSender::page(tab5()))
        .await;
    h.settings.set_api_key(Some("sk-late".to_string()));
    h.router
        .dispatch(InboundRequest::chat("two"), MessageSender::page(tab5()))
        .await;

    assert_eq!(h.completion.keys.lock().as_slice(), ["sk-late"]);
    assert_eq!(h.router.conversations().len(key5()), 2);
}

#[tokio::test]
async fn test_page_fetch_failure_degrades_to_generic_prompt() {
    let h = HarnessBuilder::new().page(FakePage::unreachable()).build();

    h.router
        .dispatch(
            InboundRequest::chat_for_tab("summarize", tab5()),
            MessageSender::page(tab5()),
        )
        .await;

    let request = h.completion.last_request();
    assert_eq!(request.messages[0], system_message(None));
    assert!(matches!(
        h.bus.results().as_slice(),
        [Sent::Tab(_, OutboundEvent::ChatResponse { .. })]
    ));
    assert_eq!(h.router.conversations().len(key5()), 2);
    assert_eq!(h.page.injects.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_page_content_is_attached_to_system_message() {
    let h = HarnessBuilder::new()
        .page(FakePage::with_content(Some(page_content())))
        .build();

    h.router
        .dispatch(InboundRequest::chat("what changed?"), MessageSender::page(tab5()))
        .await;

    let request = h.completion.last_request();
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains("Title: Release notes"));
    assert!(request.messages[0].content.contains("new parser"));
    assert_eq!(h.page.injects.load(Ordering::SeqCst), 0);
    assert_eq!(h.page.executed_commands(), vec![PageCommand::GetPageContent]);
}

#[tokio::test]
async fn test_page_content_is_truncated() {
    let mut page = page_content();
    page.content = "x".repeat(50);
    let h = HarnessBuilder::new()
        .page(FakePage::with_content(Some(page)))
        .config(RouterConfig {
            max_page_chars: 10,
            ..RouterConfig::default()
        })
        .build();

    h.router
        .dispatch(InboundRequest::chat("q"), MessageSender::page(tab5()))
        .await;

    let system = &h.completion.last_request().messages[0].content;
    assert!(system.contains(&"x".repeat(10)));
    assert!(!system.contains(&"x".repeat(11)));
}

#[tokio::test]
async fn test_request_shape_and_generation_params() {
    let h = HarnessBuilder::new().build();
    for i in 0..3 {
        h.router
            .dispatch(InboundRequest::chat(format!("q{}", i)), MessageSender::page(tab5()))
            .await;
    }

    let request = h.completion.last_request();
    assert_eq!(request.model, "gpt-3.5-turbo");
    assert_eq!(request.max_tokens, Some(1000));
    assert_eq!(request.temperature, Some(0.5));
    assert_eq!(request.messages.len(), 1 + 4 + 1);
    assert_eq!(
        request.messages.iter().filter(|m| m.role == Role::System).count(),
        1
    );
    assert_eq!(request.messages.last(), Some(&Message::user("q2")));
}

#[tokio::test]
async fn test_history_window_is_most_recent_twenty() {
    let h = HarnessBuilder::new().build();
    for i in 0..30 {
        h.router
            .conversations()
            .append(key5(), Message::user(format!("old{}", i)));
    }

    h.router
        .dispatch(InboundRequest::chat("now"), MessageSender::page(tab5()))
        .await;

    let messages = h.completion.last_request().messages;
    assert_eq!(messages.len(), 22);
    assert_eq!(messages[1].content, "old10");
    assert_eq!(messages[20].content, "old29");
    assert_eq!(messages[21], Message::user("now"));
}

#[tokio::test]
async fn test_failed_turn_leaves_history_untouched() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::chat("first"), MessageSender::page(tab5()))
        .await;
    h.completion.push(Err(ProviderError::RateLimited("Rate limit reached".into())));
    h.router
        .dispatch(InboundRequest::chat("second"), MessageSender::page(tab5()))
        .await;

    assert_eq!(h.router.conversations().len(key5()), 2);
    let results = h.bus.results();
    assert_eq!(
        results.last(),
        Some(&Sent::Tab(
            tab5(),
            OutboundEvent::error("Rate limit exceeded. Please try again later.")
        ))
    );
}

#[tokio::test]
async fn test_generic_provider_error_is_prefixed() {
    let h = HarnessBuilder::new().build();
    h.completion.push(Err(ProviderError::ApiError {
        status: 500,
        message: "The server had an error".into(),
    }));

    h.router
        .dispatch(InboundRequest::chat("hi"), MessageSender::surface())
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Broadcast(OutboundEvent::error("API Error: The server had an error"))]
    );
}

#[tokio::test]
async fn test_successful_turns_double_history() {
    let h = HarnessBuilder::new().build();
    h.completion.push(Ok("a".into()));
    h.completion.push(Err(ProviderError::AuthenticationFailed("bad".into())));
    h.completion.push(Ok("c".into()));
    for msg in ["1", "2", "3"] {
        h.router
            .dispatch(InboundRequest::chat(msg), MessageSender::page(tab5()))
            .await;
    }

    let history = h.router.conversations().get(key5());
    assert_eq!(history.len(), 4);
    assert_eq!(history.messages()[0], Message::user("1"));
    assert_eq!(history.messages()[1], Message::assistant("a"));
    assert_eq!(history.messages()[2], Message::user("3"));
    assert_eq!(history.messages()[3], Message::assistant("c"));
}

#[tokio::test]
async fn test_concurrent_turns_on_one_tab_are_serialized() {
    let h = HarnessBuilder::new()
        .completion(FakeCompletion::new().with_delay(Duration::from_millis(30)))
        .build();

    let r1 = h.router.clone();
    let r2 = h.router.clone();
    let (a, b) = tokio::join!(
        r1.dispatch(InboundRequest::chat("alpha"), MessageSender::page(tab5())),
        r2.dispatch(InboundRequest::chat("beta"), MessageSender::page(tab5())),
    );
    assert!(a.is_none() && b.is_none());

    assert_eq!(h.completion.max_in_flight.load(Ordering::SeqCst), 1);
    let history = h.router.conversations().get(key5());
    assert_eq!(history.len(), 4);
    for pair in history.messages().chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].content, format!("reply to {}", pair[0].content));
    }
    // The second turn saw the first exchange.
    assert_eq!(h.completion.requests()[1].messages.len(), 4);
}

#[tokio::test]
async fn test_turns_on_different_tabs_run_concurrently() {
    let h = HarnessBuilder::new()
        .completion(FakeCompletion::new().with_delay(Duration::from_millis(30)))
        .build();

    tokio::join!(
        h.router.dispatch(InboundRequest::chat("a"), MessageSender::page(TabId(1))),
        h.router.dispatch(InboundRequest::chat("b"), MessageSender::page(TabId(2))),
    );

    assert_eq!(h.completion.max_in_flight.load(Ordering::SeqCst), 2);
}

// ---------------------------------------------------------------------------
// Tab resolution
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_sender_tab_wins_over_message_tab() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(
            InboundRequest::chat_for_tab("hi", TabId(9)),
            MessageSender::page(tab5()),
        )
        .await;
    assert_eq!(h.router.conversations().len(key5()), 2);
    assert_eq!(h.router.conversations().len(ConversationKey::Tab(TabId(9))), 0);
}

#[tokio::test]
async fn test_surface_without_tab_uses_active_tab() {
    let h = HarnessBuilder::new()
        .host(FakeHost::new(Some(TabId(7))))
        .build();
    h.router
        .dispatch(InboundRequest::chat("hi"), MessageSender::surface())
        .await;
    assert_eq!(h.router.conversations().len(ConversationKey::Tab(TabId(7))), 2);
    assert!(matches!(h.bus.results().as_slice(), [Sent::Broadcast(_)]));
}

#[tokio::test]
async fn test_unresolvable_tab_uses_no_tab_key() {
    let h = HarnessBuilder::new().host(FakeHost::broken()).build();
    h.router
        .dispatch(InboundRequest::chat("hi"), MessageSender::surface())
        .await;

    assert_eq!(h.router.conversations().len(ConversationKey::NoTab), 2);
    assert!(h.page.executed_commands().is_empty());
    assert_eq!(h.completion.last_request().messages[0], system_message(None));
}

#[tokio::test]
async fn test_tab_without_id_skips_active_tab_fallback() {
    let h = HarnessBuilder::new()
        .host(FakeHost::new(Some(TabId(7))))
        .build();
    let sender = MessageSender {
        tab: Some(pagechat_protocols::SenderTab { id: None, url: None }),
    };
    h.router.dispatch(InboundRequest::chat("hi"), sender).await;

    assert_eq!(h.router.conversations().len(ConversationKey::NoTab), 2);
    assert!(h.bus.results().is_empty());
}

// ---------------------------------------------------------------------------
// Conversation and sidebar requests
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_clear_conversation_is_idempotent() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::chat("hi"), MessageSender::page(tab5()))
        .await;

    for _ in 0..2 {
        h.router
            .dispatch(
                InboundRequest::ClearConversation { tab_id: Some(tab5()) },
                MessageSender::surface(),
            )
            .await;
        let reply = h
            .router
            .dispatch(
                InboundRequest::GetConversationHistory { tab_id: Some(tab5()) },
                MessageSender::surface(),
            )
            .await;
        assert_eq!(
            reply,
            Some(Reply::ConversationHistory {
                history: Vec::new(),
                tab_id: Some(tab5())
            })
        );
    }
}

#[tokio::test]
async fn test_get_conversation_history_returns_turns() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::chat("hi"), MessageSender::page(tab5()))
        .await;

    let reply = h
        .router
        .dispatch(
            InboundRequest::GetConversationHistory { tab_id: Some(tab5()) },
            MessageSender::surface(),
        )
        .await;
    assert_eq!(
        reply,
        Some(Reply::ConversationHistory {
            history: vec![Message::user("hi"), Message::assistant("reply to hi")],
            tab_id: Some(tab5())
        })
    );
}

#[tokio::test]
async fn test_get_conversation_history_without_tab_is_empty() {
    let h = HarnessBuilder::new().build();
    let reply = h
        .router
        .dispatch(
            InboundRequest::GetConversationHistory { tab_id: None },
            MessageSender::page(tab5()),
        )
        .await;
    assert_eq!(
        reply,
        Some(Reply::ConversationHistory {
            history: Vec::new(),
            tab_id: None
        })
    );
}

#[tokio::test]
async fn test_toggle_is_a_pure_flip() {
    let h = HarnessBuilder::new().build();
    let state = |router: Arc<MessageRouter>| async move {
        router
            .dispatch(InboundRequest::GetSidebarState { tab_id: None }, MessageSender::page(tab5()))
            .await
    };

    assert_eq!(state(h.router.clone()).await, Some(Reply::SidebarState { is_open: false }));
    h.router
        .dispatch(InboundRequest::ToggleSidebar, MessageSender::page(tab5()))
        .await;
    assert_eq!(state(h.router.clone()).await, Some(Reply::SidebarState { is_open: true }));
    h.router
        .dispatch(InboundRequest::ToggleSidebar, MessageSender::page(tab5()))
        .await;
    assert_eq!(state(h.router.clone()).await, Some(Reply::SidebarState { is_open: false }));

    assert_eq!(h.host.opened.lock().as_slice(), [tab5()]);
    assert_eq!(
        h.bus.to_tab(tab5()),
        vec![OutboundEvent::SidebarOpened, OutboundEvent::SidebarCloseHint]
    );
}

#[tokio::test]
async fn test_toggle_reverts_when_open_fails() {
    let h = HarnessBuilder::new().host(FakeHost::failing_open()).build();
    h.router
        .dispatch(InboundRequest::ToggleSidebar, MessageSender::page(tab5()))
        .await;

    assert!(!h.router.sidebar().get(tab5()));
    assert!(h.bus.to_tab(tab5()).is_empty());
}

#[tokio::test]
async fn test_toggle_from_surface_is_ignored() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::ToggleSidebar, MessageSender::surface())
        .await;
    assert!(h.host.opened.lock().is_empty());
    assert_eq!(h.router.sidebar().tracked_tabs(), 0);
}

#[tokio::test]
async fn test_sidebar_closed_notifications() {
    let h = HarnessBuilder::new().build();
    h.router.sidebar().set(tab5(), true);
    h.router
        .dispatch(InboundRequest::SidebarManuallyClosed, MessageSender::page(tab5()))
        .await;
    assert!(!h.router.sidebar().get(tab5()));

    let other = TabId(8);
    h.router.sidebar().set(other, true);
    h.router
        .dispatch(InboundRequest::SidebarClosedByUser, MessageSender::page(other))
        .await;
    assert!(!h.router.sidebar().get(other));
    assert_eq!(h.bus.to_tab(tab5()), vec![OutboundEvent::SidebarClosed]);
    assert_eq!(h.bus.to_tab(other), vec![OutboundEvent::SidebarClosed]);
}

#[tokio::test]
async fn test_sidebar_closed_by_user_from_panel_uses_active_tab() {
    let h = HarnessBuilder::new()
        .host(FakeHost::new(Some(TabId(3))))
        .build();
    h.router.sidebar().set(TabId(3), true);
    h.router
        .dispatch(InboundRequest::SidebarClosedByUser, MessageSender::surface())
        .await;
    assert!(!h.router.sidebar().get(TabId(3)));
}

#[tokio::test]
async fn test_sidebar_presence_report() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(
            InboundRequest::SidebarPresence { is_open: true },
            MessageSender::page(tab5()),
        )
        .await;
    assert!(h.router.sidebar().get(tab5()));
}

#[tokio::test]
async fn test_show_close_instructions_broadcasts_for_tab() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::ShowCloseInstructions, MessageSender::page(tab5()))
        .await;
    h.router
        .dispatch(InboundRequest::ShowCloseInstructions, MessageSender::surface())
        .await;
    assert_eq!(
        h.bus.broadcasts(),
        vec![OutboundEvent::ShowCloseInstructions { tab_id: tab5() }]
    );
}

#[tokio::test]
async fn test_action_clicked_opens_panel() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::ActionClicked { tab_id: tab5() }, MessageSender::surface())
        .await;
    assert!(h.router.sidebar().get(tab5()));
    assert_eq!(h.bus.to_tab(tab5()), vec![OutboundEvent::SidebarOpened]);
}

#[tokio::test]
async fn test_context_menu_selection_prefills_after_open() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(
            InboundRequest::ContextMenuSelection {
                text: "borrow checker".to_string(),
                tab_id: tab5(),
            },
            MessageSender::surface(),
        )
        .await;
    assert_eq!(
        h.bus.broadcasts(),
        vec![OutboundEvent::PrefillText {
            text: "borrow checker".to_string(),
            tab_id: tab5()
        }]
    );
}

#[tokio::test]
async fn test_context_menu_selection_without_panel_does_not_prefill() {
    let h = HarnessBuilder::new().host(FakeHost::failing_open()).build();
    h.router
        .dispatch(
            InboundRequest::ContextMenuSelection {
                text: "x".to_string(),
                tab_id: tab5(),
            },
            MessageSender::surface(),
        )
        .await;
    assert!(h.bus.sent().is_empty());
    assert!(!h.router.sidebar().get(tab5()));
}

#[tokio::test]
async fn test_tab_lifecycle_pushes_sidebar_state() {
    let h = HarnessBuilder::new().build();
    h.router.sidebar().set(tab5(), true);
    h.router
        .dispatch(InboundRequest::TabActivated { tab_id: tab5() }, MessageSender::surface())
        .await;
    h.router
        .dispatch(
            InboundRequest::TabUpdated {
                tab_id: tab5(),
                status: Some("loading".to_string()),
            },
            MessageSender::surface(),
        )
        .await;
    h.router
        .dispatch(
            InboundRequest::TabUpdated {
                tab_id: tab5(),
                status: Some("complete".to_string()),
            },
            MessageSender::surface(),
        )
        .await;

    assert_eq!(
        h.bus.to_tab(tab5()),
        vec![
            OutboundEvent::SidebarStateUpdate { is_open: true },
            OutboundEvent::SidebarStateUpdate { is_open: true }
        ]
    );
}

#[tokio::test]
async fn test_get_tab_id_and_ping() {
    let h = HarnessBuilder::new().build();
    assert_eq!(
        h.router.dispatch(InboundRequest::GetTabId, MessageSender::page(tab5())).await,
        Some(Reply::TabId { tab_id: Some(tab5()) })
    );
    assert_eq!(
        h.router.dispatch(InboundRequest::GetTabId, MessageSender::surface()).await,
        Some(Reply::TabId { tab_id: None })
    );
    assert_eq!(
        h.router.dispatch(InboundRequest::Ping, MessageSender::surface()).await,
        Some(Reply::Pong { ok: true })
    );
}

// ---------------------------------------------------------------------------
// Debug log
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_debug_log_disabled_by_default() {
    let h = HarnessBuilder::new().build();
    h.router
        .dispatch(InboundRequest::ActionClicked { tab_id: tab5() }, MessageSender::surface())
        .await;
    assert_eq!(
        h.router.dispatch(InboundRequest::GetDebugLogs, MessageSender::surface()).await,
        Some(Reply::DebugLogs { logs: Vec::new() })
    );
}

#[tokio::test]
async fn test_debug_log_records_and_broadcasts() {
    let h = HarnessBuilder::new().debug_logging().build();
    h.router
        .dispatch(InboundRequest::ActionClicked { tab_id: tab5() }, MessageSender::surface())
        .await;

    let Some(Reply::DebugLogs { logs }) = h
        .router
        .dispatch(InboundRequest::GetDebugLogs, MessageSender::surface())
        .await
    else {
        panic!("expected debug logs");
    };
    assert_eq!(logs.len(), 1);
    assert!(logs[0].ends_with("Extension icon clicked, opening sidebar"));
    assert_eq!(
        h.bus.broadcasts(),
        vec![OutboundEvent::DebugLog { log: logs[0].clone() }]
    );
}

#[tokio::test]
async fn test_debug_log_survives_offline_surfaces() {
    let h = HarnessBuilder::new().debug_logging().surfaces_offline().build();
    h.router
        .dispatch(InboundRequest::ActionClicked { tab_id: tab5() }, MessageSender::surface())
        .await;

    assert_eq!(h.host.opened.lock().as_slice(), [tab5()]);
    assert_eq!(h.router.debug_log().len(), 1);
    assert!(h.bus.broadcasts().is_empty());
}

// ---------------------------------------------------------------------------
// Page commands
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_page_commands_off_by_default() {
    let page = FakePage::with_content(None)
        .with_command(PageCommand::FindEmail, PageCommandResponse::ok(json!(["a@b.io"])));
    let h = HarnessBuilder::new().page(page).build();

    h.router
        .dispatch(InboundRequest::chat("find email"), MessageSender::page(tab5()))
        .await;

    assert_eq!(h.page.executed_commands(), vec![PageCommand::GetPageContent]);
    assert_eq!(
        h.router.conversations().get(key5()).messages()[0],
        Message::user("find email")
    );
}

#[tokio::test]
async fn test_page_command_data_goes_through_completion() {
    let page = FakePage::with_content(Some(page_content()))
        .with_command(PageCommand::FindEmail, PageCommandResponse::ok(json!(["a@b.io", "c@d.io"])));
    let h = HarnessBuilder::new().page(page).agent_commands().build();

    h.router
        .dispatch(InboundRequest::chat("find the email"), MessageSender::page(tab5()))
        .await;

    let prompt = "I found the following email addresses on the page: a@b.io, c@d.io";
    let request = h.completion.last_request();
    assert_eq!(request.messages[0], system_message(None));
    assert_eq!(request.messages.last(), Some(&Message::user(prompt)));
    assert_eq!(h.page.executed_commands(), vec![PageCommand::FindEmail]);

    let history = h.router.conversations().get(key5());
    assert_eq!(history.messages()[0], Message::user(prompt));
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn test_page_command_without_data_replies_directly() {
    let response = PageCommandResponse {
        success: true,
        message: Some("Scrolled down".to_string()),
        ..Default::default()
    };
    let page = FakePage::with_content(None).with_command(PageCommand::Scroll, response);
    let h = HarnessBuilder::new().page(page).agent_commands().build();

    h.router
        .dispatch(InboundRequest::chat("scroll down"), MessageSender::page(tab5()))
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Tab(tab5(), OutboundEvent::chat_response("Scrolled down"))]
    );
    assert!(h.completion.requests().is_empty());
    assert_eq!(h.router.conversations().len(key5()), 0);
}

#[tokio::test]
async fn test_page_command_default_message() {
    let response = PageCommandResponse {
        success: true,
        ..Default::default()
    };
    let page = FakePage::with_content(None).with_command(PageCommand::ClickButton, response);
    let h = HarnessBuilder::new()
        .page(page)
        .host(FakeHost::new(Some(tab5())))
        .agent_commands()
        .build();

    h.router
        .dispatch(InboundRequest::chat("click the buy button"), MessageSender::surface())
        .await;

    assert_eq!(
        h.bus.results(),
        vec![Sent::Broadcast(OutboundEvent::chat_response(
            "Command executed successfully."
        ))]
    );
}

#[tokio::test]
async fn test_failed_page_command_falls_back_to_chat() {
    let page = FakePage::with_content(Some(page_content()));
    let h = HarnessBuilder::new().page(page).agent_commands().build();

    h.router
        .dispatch(InboundRequest::chat("take a screenshot"), MessageSender::page(tab5()))
        .await;

    let request = h.completion.last_request();
    assert!(request.messages[0].content.contains("Release notes"));
    assert_eq!(request.messages.last(), Some(&Message::user("take a screenshot")));
    assert_eq!(h.router.conversations().len(key5()), 2);
}

#[tokio::test]
async fn test_page_command_failure_response_falls_back() {
    let page = FakePage::with_content(None)
        .with_command(PageCommand::FillForm, PageCommandResponse::failed("No form found"));
    let h = HarnessBuilder::new().page(page).agent_commands().build();

    h.router
        .dispatch(InboundRequest::chat("fill the form"), MessageSender::page(tab5()))
        .await;

    assert_eq!(
        h.page.executed_commands(),
        vec![PageCommand::FillForm, PageCommand::GetPageContent]
    );
    assert_eq!(
        h.bus.results(),
        vec![Sent::Tab(tab5(), OutboundEvent::chat_response("reply to fill the form"))]
    );
}
