//! # Redis History Store
//!
//! 每个会话对应一个 Redis LIST：`<prefix><session_id>`，元素为 JSON 编码的消息。
//!
//! - 追加：`MULTI / RPUSH / EXPIRE / EXEC`，写入即刷新 TTL
//! - 读取：`LRANGE 0 -1`
//! - 计数：`LLEN`
//! - 清除：`DEL`
//!
//! The connection is opened lazily and shared. A connection-level failure
//! drops it and surfaces [`StorageError::StoreUnavailable`]; the next call
//! reconnects. Nothing is retried within a call.

use std::time::Duration;

use async_trait::async_trait;
use recall_core::Message;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, RedisError, RedisResult};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{StorageError, StorageResult};
use crate::storage::{
    select_matches, session_key, validate_session_id, HistoryStore, SearchCapability,
};

/// Largest `EXPIRE` accepted (100 years)
const MAX_EXPIRE_SECS: u64 = 100 * 365 * 24 * 3600;

/// Redis 存储配置
#[derive(Debug, Clone)]
pub struct RedisStoreConfig {
    /// `redis://`, `rediss://` or `unix://` URL
    pub url: String,
    pub key_prefix: String,
    /// 会话过期时间，`None` 表示永不过期
    pub ttl: Option<Duration>,
    pub connect_timeout: Duration,
    pub response_timeout: Duration,
    /// Offer substring search over the stored history
    pub enable_search: bool,
}

impl RedisStoreConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_timeouts(mut self, connect: Duration, response: Duration) -> Self {
        self.connect_timeout = connect;
        self.response_timeout = response;
        self
    }

    pub fn with_search(mut self, enabled: bool) -> Self {
        self.enable_search = enabled;
        self
    }
}

impl Default for RedisStoreConfig {
    fn default() -> Self {
        Self {
            url: "redis://127.0.0.1:6379/0".to_string(),
            key_prefix: crate::DEFAULT_KEY_PREFIX.to_string(),
            ttl: Some(Duration::from_secs(24 * 3600)),
            connect_timeout: Duration::from_secs(5),
            response_timeout: Duration::from_secs(5),
            enable_search: false,
        }
    }
}

pub struct RedisHistoryStore {
    client: redis::Client,
    config: RedisStoreConfig,
    connection: Mutex<Option<MultiplexedConnection>>,
}

impl RedisHistoryStore {
    /// Parse the URL and prepare a client. No connection is made yet.
    pub fn new(config: RedisStoreConfig) -> StorageResult<Self> {
        let client = redis::Client::open(config.url.as_str())
            .map_err(|e| StorageError::config(format!("invalid Redis URL: {}", e)))?;
        if let Some(ttl) = config.ttl {
            // EXPIRE fails inside MULTI after RPUSH has applied, so reject up front
            if ttl.as_secs() > MAX_EXPIRE_SECS {
                return Err(StorageError::config(format!(
                    "session ttl of {}s exceeds the {}s limit",
                    ttl.as_secs(),
                    MAX_EXPIRE_SECS
                )));
            }
        }

        info!(
            prefix = %config.key_prefix,
            ttl_secs = config.ttl.map(|t| t.as_secs()),
            search = config.enable_search,
            "Redis history store configured"
        );

        Ok(Self {
            client,
            config,
            connection: Mutex::new(None),
        })
    }

    pub fn config(&self) -> &RedisStoreConfig {
        &self.config
    }

    /// Key holding the given session's history
    pub fn key_for(&self, session_id: &str) -> String {
        session_key(&self.config.key_prefix, session_id)
    }

    fn checked_key(&self, session_id: &str) -> StorageResult<String> {
        validate_session_id(session_id)?;
        Ok(self.key_for(session_id))
    }

    async fn connection(&self) -> StorageResult<MultiplexedConnection> {
        let mut guard = self.connection.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let conn = self
            .client
            .get_multiplexed_async_connection_with_timeouts(
                self.config.response_timeout,
                self.config.connect_timeout,
            )
            .await
            .map_err(|e| {
                warn!(error = %e, "Failed to connect to Redis");
                classify(e)
            })?;

        debug!("Connected to Redis");
        *guard = Some(conn.clone());
        Ok(conn)
    }

    /// Map a command result, forgetting the connection if it broke.
    async fn finish<T>(&self, result: RedisResult<T>) -> StorageResult<T> {
        match result {
            Ok(value) => Ok(value),
            Err(e) => {
                if is_connection_failure(&e) {
                    warn!(error = %e, "Redis connection lost");
                    self.connection.lock().await.take();
                }
                Err(classify(e))
            }
        }
    }

    fn ttl_seconds(&self) -> Option<i64> {
        self.config
            .ttl
            .map(|ttl| ttl.as_secs().clamp(1, MAX_EXPIRE_SECS) as i64)
    }
}

fn is_connection_failure(error: &RedisError) -> bool {
    error.is_io_error()
        || error.is_connection_refusal()
        || error.is_connection_dropped()
        || error.is_timeout()
}

fn classify(error: RedisError) -> StorageError {
    if is_connection_failure(&error) {
        StorageError::unavailable(error.to_string())
    } else {
        StorageError::backend(error.to_string())
    }
}

fn decode(raw: Vec<String>, key: &str) -> Vec<Message> {
    raw.into_iter()
        .filter_map(|entry| match serde_json::from_str::<Message>(&entry) {
            Ok(message) => Some(message),
            Err(e) => {
                warn!(key, error = %e, "Skipping undecodable history entry");
                None
            }
        })
        .collect()
}

#[async_trait]
impl HistoryStore for RedisHistoryStore {
    fn backend(&self) -> &'static str {
        "redis"
    }

    async fn get_history(&self, session_id: &str) -> StorageResult<Vec<Message>> {
        let key = self.checked_key(session_id)?;
        let mut conn = self.connection().await?;
        let result: RedisResult<Vec<String>> = conn.lrange(&key, 0, -1).await;
        let raw = self.finish(result).await?;
        debug!(key = %key, entries = raw.len(), "Loaded history");
        Ok(decode(raw, &key))
    }

    async fn append_all(&self, session_id: &str, messages: &[Message]) -> StorageResult<()> {
        let key = self.checked_key(session_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        let payloads = messages
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let mut pipe = redis::pipe();
        pipe.atomic();
        pipe.cmd("RPUSH").arg(&key).arg(&payloads).ignore();
        if let Some(secs) = self.ttl_seconds() {
            pipe.cmd("EXPIRE").arg(&key).arg(secs).ignore();
        }

        let mut conn = self.connection().await?;
        let result: RedisResult<()> = pipe.query_async(&mut conn).await;
        self.finish(result).await?;
        debug!(key = %key, appended = messages.len(), "Appended history");
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> StorageResult<()> {
        let key = self.checked_key(session_id)?;
        let mut conn = self.connection().await?;
        let result: RedisResult<u64> = conn.del(&key).await;
        let removed = self.finish(result).await?;
        debug!(key = %key, removed, "Cleared history");
        Ok(())
    }

    async fn count(&self, session_id: &str) -> StorageResult<u64> {
        let key = self.checked_key(session_id)?;
        let mut conn = self.connection().await?;
        let result: RedisResult<u64> = conn.llen(&key).await;
        self.finish(result).await
    }

    fn search_capability(&self) -> Option<&dyn SearchCapability> {
        if self.config.enable_search {
            Some(self)
        } else {
            None
        }
    }

    async fn health_check(&self) -> StorageResult<()> {
        let mut conn = self.connection().await?;
        let result: RedisResult<String> = redis::cmd("PING").query_async(&mut conn).await;
        let reply = self.finish(result).await?;
        if reply != "PONG" {
            return Err(StorageError::backend(format!("unexpected PING reply: {}", reply)));
        }
        Ok(())
    }
}

#[async_trait]
impl SearchCapability for RedisHistoryStore {
    async fn search(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<Message>> {
        if limit == 0 {
            validate_session_id(session_id)?;
            return Ok(Vec::new());
        }
        let history = self.get_history(session_id).await?;
        Ok(select_matches(history, query, limit))
    }
}
