//! # Chat Engine
//!
//! 把会话历史注入模型请求，并在回复成功后持久化本轮对话。

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use recall_config::{Config, ConfigManager, StoreBackend, StoreConfig};
use recall_core::{ChatOptions, ChatRequest, ChatUsage, FinishReason, Message};
use recall_llm::{LLMProvider, OpenAiProvider, ProviderConfig};
use recall_session::{
    validate_session_id, HistoryStore, MemoryHistoryStore, RedisHistoryStore, RedisStoreConfig,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{ChatError, ChatResult};

/// Result of one completed turn
#[derive(Debug, Clone)]
pub struct ChatTurn {
    pub reply: String,
    pub usage: ChatUsage,
    pub finish_reason: FinishReason,
    /// Stored messages after the turn, if the store could still be counted
    pub message_count: Option<u64>,
}

/// Session-aware chat orchestrator.
///
/// Cheap to share behind an `Arc`; turns for different sessions run
/// concurrently, turns for the same session are serialized.
pub struct ChatEngine {
    provider: Arc<dyn LLMProvider>,
    store: Arc<dyn HistoryStore>,
    model: String,
    options: ChatOptions,
    system_prompt: String,
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatEngine {
    pub fn new(provider: Arc<dyn LLMProvider>, store: Arc<dyn HistoryStore>) -> Self {
        Self {
            provider,
            store,
            model: String::new(),
            options: ChatOptions::default(),
            system_prompt: recall_config::DEFAULT_SYSTEM_PROMPT.to_string(),
            turn_locks: DashMap::new(),
        }
    }

    /// Build the engine from validated configuration.
    ///
    /// Fails with [`ChatError::ConfigInvalid`] before any store or network
    /// access.
    pub fn from_config(config: &Config) -> ChatResult<Self> {
        ConfigManager::validate(config)?;

        let llm = &config.llm;
        let provider_config = ProviderConfig::new("openrouter", llm.base_url.as_str())
            .with_api_key(llm.api_key.as_str())
            .with_model(llm.model.as_str())
            .with_timeout(llm.timeout())
            .with_max_retries(llm.max_retries)
            .with_header("X-Title", "Recall");
        let provider = OpenAiProvider::with_config(provider_config)
            .map_err(|e| ChatError::ConfigInvalid(e.to_string()))?;

        let store = build_store(&config.store)?;

        let mut options = ChatOptions::new().with_temperature(llm.temperature);
        if let Some(max_tokens) = llm.max_tokens {
            options = options.with_max_tokens(max_tokens);
        }

        info!(
            model = %llm.model,
            backend = store.backend(),
            "Chat engine ready"
        );

        Ok(Self::new(Arc::new(provider), store)
            .with_model(llm.model.as_str())
            .with_options(options)
            .with_system_prompt(llm.system_prompt.as_str()))
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn store(&self) -> &Arc<dyn HistoryStore> {
        &self.store
    }

    /// Send one user message and return the assistant reply.
    pub async fn chat(&self, message: &str, session_id: &str) -> ChatResult<String> {
        self.chat_turn(message, session_id).await.map(|turn| turn.reply)
    }

    /// Like [`chat`](Self::chat), with usage and the post-turn count.
    ///
    /// The user message and the reply are persisted together, and only once
    /// the model has answered. A failed model call leaves the history as it was.
    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn chat_turn(&self, message: &str, session_id: &str) -> ChatResult<ChatTurn> {
        validate_session_id(session_id)?;

        let lock = self.turn_lock(session_id);
        let guard = lock.lock().await;
        let result = self.run_turn(message, session_id).await;
        drop(guard);

        self.release_turn_lock(session_id);
        result
    }

    async fn run_turn(&self, message: &str, session_id: &str) -> ChatResult<ChatTurn> {
        let history = self.store.get_history(session_id).await?;
        let user = Message::user(message);
        let request = self.build_request(history, user.clone());
        debug!(messages = request.messages.len(), "Sending chat request");

        let started = Instant::now();
        let response = self.provider.chat(request).await.map_err(|e| {
            warn!(error = %e, "Model call failed");
            ChatError::ModelCallFailed(e)
        })?;

        let reply = response.text().to_string();
        let assistant = Message::assistant(reply.as_str());
        self.store
            .append_all(session_id, &[user, assistant])
            .await?;

        let message_count = match self.store.count(session_id).await {
            Ok(count) => Some(count),
            Err(e) => {
                warn!(error = %e, "Could not count history after turn");
                None
            }
        };
        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            tokens = response.usage.total_tokens,
            message_count,
            "Turn completed"
        );

        Ok(ChatTurn {
            reply,
            usage: response.usage,
            finish_reason: response.finish_reason,
            message_count,
        })
    }

    /// Full stored history of a session
    pub async fn get_history(&self, session_id: &str) -> ChatResult<Vec<Message>> {
        validate_session_id(session_id)?;
        Ok(self.store.get_history(session_id).await?)
    }

    /// Stored message count. An error means "unknown", not zero.
    pub async fn get_message_count(&self, session_id: &str) -> ChatResult<u64> {
        validate_session_id(session_id)?;
        Ok(self.store.count(session_id).await?)
    }

    #[instrument(skip_all, fields(session_id = %session_id))]
    pub async fn clear_session(&self, session_id: &str) -> ChatResult<()> {
        validate_session_id(session_id)?;

        let lock = self.turn_lock(session_id);
        let guard = lock.lock().await;
        let result = self.store.clear(session_id).await;
        drop(guard);

        self.release_turn_lock(session_id);
        result?;
        info!("Session cleared");
        Ok(())
    }

    /// Search the session history.
    ///
    /// `None` means the store has no search capability, which is distinct
    /// from `Some(vec![])` (nothing matched).
    pub async fn search_history(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> ChatResult<Option<Vec<Message>>> {
        validate_session_id(session_id)?;
        let Some(search) = self.store.search_capability() else {
            debug!(backend = self.store.backend(), "Search not supported");
            return Ok(None);
        };
        Ok(Some(search.search(session_id, query, limit).await?))
    }

    /// Round-trip the store
    pub async fn health_check(&self) -> ChatResult<()> {
        Ok(self.store.health_check().await?)
    }

    /// Validate the model provider configuration without calling it
    pub async fn validate_provider(&self) -> ChatResult<()> {
        self.provider
            .validate()
            .await
            .map_err(|e| ChatError::ConfigInvalid(e.to_string()))
    }

    fn build_request(&self, history: Vec<Message>, user: Message) -> ChatRequest {
        ChatRequest::for_turn(self.model.as_str(), &self.system_prompt, history, user)
            .with_options(self.options.clone())
    }

    fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Drop the session's lock unless another turn holds or awaits it.
    /// The map and the caller's clone account for two references.
    fn release_turn_lock(&self, session_id: &str) {
        self.turn_locks
            .remove_if(session_id, |_, lock| Arc::strong_count(lock) <= 2);
    }

    #[cfg(test)]
    fn tracked_sessions(&self) -> usize {
        self.turn_locks.len()
    }
}

/// Open the history store selected by configuration.
pub fn build_store(config: &StoreConfig) -> ChatResult<Arc<dyn HistoryStore>> {
    match config.backend {
        StoreBackend::Redis => {
            let redis_config = RedisStoreConfig::new(config.url.as_str())
                .with_key_prefix(config.key_prefix.as_str())
                .with_ttl(config.ttl())
                .with_timeouts(config.connect_timeout(), config.response_timeout())
                .with_search(config.enable_search);
            Ok(Arc::new(RedisHistoryStore::new(redis_config)?))
        }
        StoreBackend::Memory => Ok(Arc::new(
            MemoryHistoryStore::new()
                .with_key_prefix(config.key_prefix.as_str())
                .with_ttl(config.ttl()),
        )),
    }
}
