use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use recall_chat::{ChatEngine, ChatError};
use recall_core::{ChatRequest, ChatResponse, ChatUsage, Message, Role};
use recall_llm::{LLMError, LLMProvider};
use recall_session::{
    HistoryStore, ManualClock, MemoryHistoryStore, SearchCapability, StorageError, StorageResult,
};
use tokio_test::assert_ok;

const SESSION: &str = "user_001";

/// Mock provider that records every request and replies from a script
struct RecordingProvider {
    replies: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl RecordingProvider {
    fn new(replies: &[&str]) -> Self {
        Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl LLMProvider for RecordingProvider {
    fn provider_id(&self) -> &str {
        "mock"
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, LLMError> {
        self.requests.lock().push(request.clone());
        let reply = self
            .replies
            .lock()
            .pop_front()
            .unwrap_or_else(|| "Mock response".to_string());
        Ok(
            ChatResponse::new("mock-1", request.model, Message::assistant(reply))
                .with_usage(ChatUsage::new(10, 5)),
        )
    }

    async fn validate(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Provider whose endpoint is always down
struct FailingProvider;

#[async_trait]
impl LLMProvider for FailingProvider {
    fn provider_id(&self) -> &str {
        "failing"
    }

    async fn chat(&self, _request: ChatRequest) -> Result<ChatResponse, LLMError> {
        Err(LLMError::Network("connection reset by peer".to_string()))
    }

    async fn validate(&self) -> Result<(), LLMError> {
        Ok(())
    }
}

/// Memory store whose connection can be cut
struct SeveredStore {
    inner: MemoryHistoryStore,
    down: AtomicBool,
}

impl SeveredStore {
    fn new() -> Self {
        Self {
            inner: MemoryHistoryStore::new(),
            down: AtomicBool::new(false),
        }
    }

    fn cut(&self) {
        self.down.store(true, Ordering::SeqCst);
    }

    fn restore(&self) {
        self.down.store(false, Ordering::SeqCst);
    }

    fn check(&self) -> StorageResult<()> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StorageError::unavailable("Connection refused (os error 111)"));
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryStore for SeveredStore {
    fn backend(&self) -> &'static str {
        "severed"
    }

    async fn get_history(&self, session_id: &str) -> StorageResult<Vec<Message>> {
        self.check()?;
        self.inner.get_history(session_id).await
    }

    async fn append_all(&self, session_id: &str, messages: &[Message]) -> StorageResult<()> {
        self.check()?;
        self.inner.append_all(session_id, messages).await
    }

    async fn clear(&self, session_id: &str) -> StorageResult<()> {
        self.check()?;
        self.inner.clear(session_id).await
    }

    async fn count(&self, session_id: &str) -> StorageResult<u64> {
        self.check()?;
        self.inner.count(session_id).await
    }

    async fn health_check(&self) -> StorageResult<()> {
        self.check()
    }
}

fn engine_with(provider: Arc<dyn LLMProvider>, store: Arc<dyn HistoryStore>) -> ChatEngine {
    ChatEngine::new(provider, store)
        .with_model("openai/gpt-oss-120b:free")
        .with_system_prompt("You are a helpful AI assistant with persistent memory.")
}

#[tokio::test]
async fn test_second_turn_sees_first_turn() {
    let provider = Arc::new(RecordingProvider::new(&["Nice to meet you, Alex!", "Your name is Alex."]));
    let store = Arc::new(MemoryHistoryStore::new());
    let engine = engine_with(provider.clone(), store.clone());

    let first = engine.chat("My name is Alex", SESSION).await.unwrap();
    assert_eq!(first, "Nice to meet you, Alex!");
    let second = engine.chat("What's my name?", SESSION).await.unwrap();
    assert_eq!(second, "Your name is Alex.");

    let requests = provider.requests();
    assert_eq!(requests.len(), 2);

    let sent: Vec<(Role, &str)> = requests[1]
        .messages
        .iter()
        .map(|m| (m.role, m.text()))
        .collect();
    assert_eq!(
        sent,
        vec![
            (Role::System, "You are a helpful AI assistant with persistent memory."),
            (Role::User, "My name is Alex"),
            (Role::Assistant, "Nice to meet you, Alex!"),
            (Role::User, "What's my name?"),
        ]
    );
    assert_eq!(requests[1].model, "openai/gpt-oss-120b:free");
    assert_eq!(engine.get_message_count(SESSION).await.unwrap(), 4);
}

#[tokio::test]
async fn test_turn_appends_user_then_assistant() {
    let provider = Arc::new(RecordingProvider::new(&["pong"]));
    let engine = engine_with(provider, Arc::new(MemoryHistoryStore::new()));

    let before = engine.get_message_count(SESSION).await.unwrap();
    let turn = engine.chat_turn("ping", SESSION).await.unwrap();
    assert_eq!(turn.message_count, Some(before + 2));
    assert_eq!(turn.usage.total_tokens, 15);

    let history = engine.get_history(SESSION).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!((history[0].role, history[0].text()), (Role::User, "ping"));
    assert_eq!((history[1].role, history[1].text()), (Role::Assistant, "pong"));
    assert!(history[0].created_at <= history[1].created_at);
}

#[tokio::test]
async fn test_model_failure_writes_nothing() {
    let store = Arc::new(MemoryHistoryStore::new());
    store
        .append_all(SESSION, &[Message::user("earlier"), Message::assistant("reply")])
        .await
        .unwrap();
    let engine = engine_with(Arc::new(FailingProvider), store.clone());

    let err = engine.chat("hello?", SESSION).await.unwrap_err();
    assert!(matches!(err, ChatError::ModelCallFailed(LLMError::Network(_))));

    let history = store.get_history(SESSION).await.unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].text(), "reply");
}

#[tokio::test]
async fn test_unavailable_store_fails_before_model_call() {
    let provider = Arc::new(RecordingProvider::new(&["never sent"]));
    let store = Arc::new(SeveredStore::new());
    let engine = engine_with(provider.clone(), store.clone());

    assert_ok!(engine.chat("first", SESSION).await);
    store.cut();

    let err = engine.chat("second", SESSION).await.unwrap_err();
    assert!(err.is_store_unavailable(), "got {:?}", err);
    assert_eq!(provider.requests().len(), 1);

    // Count is unknown, not zero
    assert!(engine.get_message_count(SESSION).await.unwrap_err().is_store_unavailable());

    store.restore();
    assert_eq!(engine.get_message_count(SESSION).await.unwrap(), 2);
}

#[tokio::test]
async fn test_clear_session_resets_count() {
    let provider = Arc::new(RecordingProvider::new(&[]));
    let engine = engine_with(provider.clone(), Arc::new(MemoryHistoryStore::new()));

    engine.chat("one", SESSION).await.unwrap();
    engine.chat("two", SESSION).await.unwrap();
    assert_eq!(engine.get_message_count(SESSION).await.unwrap(), 4);

    assert_ok!(engine.clear_session(SESSION).await);
    assert_ok!(engine.clear_session(SESSION).await);
    assert_eq!(engine.get_message_count(SESSION).await.unwrap(), 0);

    // The next turn starts from an empty history
    engine.chat("fresh start", SESSION).await.unwrap();
    let last = provider.requests().pop().unwrap();
    assert_eq!(last.messages.len(), 2);
}

#[tokio::test]
async fn test_sessions_do_not_leak() {
    let provider = Arc::new(RecordingProvider::new(&[]));
    let engine = engine_with(provider.clone(), Arc::new(MemoryHistoryStore::new()));

    engine.chat("I am Alice", "alice").await.unwrap();
    engine.chat("I am Bob", "bob").await.unwrap();

    let bob_request = &provider.requests()[1];
    assert!(bob_request.messages.iter().all(|m| m.text() != "I am Alice"));

    engine.clear_session("alice").await.unwrap();
    assert_eq!(engine.get_message_count("bob").await.unwrap(), 2);
}

#[tokio::test]
async fn test_search_unsupported_is_none() {
    let engine = engine_with(
        Arc::new(RecordingProvider::new(&[])),
        Arc::new(SeveredStore::new()),
    );
    engine.chat("python question", SESSION).await.unwrap();

    let result = engine.search_history(SESSION, "python", 5).await.unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_search_supported_returns_matches() {
    let engine = engine_with(
        Arc::new(RecordingProvider::new(&["Python is great", "Rust is fast"])),
        Arc::new(MemoryHistoryStore::new()),
    );
    engine.chat("Tell me about python", SESSION).await.unwrap();
    engine.chat("And rust?", SESSION).await.unwrap();

    let found = engine
        .search_history(SESSION, "PYTHON", 5)
        .await
        .unwrap()
        .expect("memory store searches");
    let texts: Vec<_> = found.iter().map(|m| m.text()).collect();
    assert_eq!(texts, vec!["Tell me about python", "Python is great"]);

    let none = engine.search_history(SESSION, "python", 0).await.unwrap();
    assert_eq!(none.map(|v| v.len()), Some(0));
}

#[tokio::test]
async fn test_empty_session_id_rejected() {
    let provider = Arc::new(RecordingProvider::new(&[]));
    let engine = engine_with(provider.clone(), Arc::new(MemoryHistoryStore::new()));

    let err = engine.chat("hello", "").await.unwrap_err();
    assert!(matches!(err, ChatError::InvalidSessionId(_)));
    assert!(provider.requests().is_empty());

    assert!(matches!(
        engine.clear_session("").await,
        Err(ChatError::InvalidSessionId(_))
    ));
}

#[tokio::test]
async fn test_expired_session_starts_over() {
    let clock = Arc::new(ManualClock::default());
    let store = Arc::new(
        MemoryHistoryStore::new()
            .with_ttl(Some(Duration::from_secs(3600)))
            .with_clock(clock.clone()),
    );
    let provider = Arc::new(RecordingProvider::new(&[]));
    let engine = engine_with(provider.clone(), store);

    engine.chat("remember this", SESSION).await.unwrap();
    clock.advance(chrono::Duration::hours(2));
    engine.chat("do you remember?", SESSION).await.unwrap();

    let last = provider.requests().pop().unwrap();
    assert_eq!(last.messages.len(), 2);
    assert_eq!(engine.get_message_count(SESSION).await.unwrap(), 2);
}

#[tokio::test]
async fn test_concurrent_turns_same_session_stay_paired() {
    let provider = Arc::new(RecordingProvider::new(&[]));
    let engine = Arc::new(engine_with(provider, Arc::new(MemoryHistoryStore::new())));

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.chat(&format!("message {}", i), SESSION).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let history = engine.get_history(SESSION).await.unwrap();
    assert_eq!(history.len(), 16);
    for pair in history.chunks(2) {
        assert_eq!(pair[0].role, Role::User);
        assert_eq!(pair[1].role, Role::Assistant);
    }
}

#[tokio::test]
async fn test_health_check_reports_store_state() {
    let store = Arc::new(SeveredStore::new());
    let engine = engine_with(Arc::new(RecordingProvider::new(&[])), store.clone());

    assert_ok!(engine.health_check().await);
    store.cut();
    assert!(engine.health_check().await.unwrap_err().is_store_unavailable());
}

#[test]
fn test_search_capability_trait_is_object_safe() {
    fn takes(_: Option<&dyn SearchCapability>) {}
    let store = MemoryHistoryStore::new();
    takes(store.search_capability());
}
