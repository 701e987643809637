//! # In-Memory History Store
//!
//! 进程内的会话历史存储，用于 `--memory` 模式和测试。
//!
//! Sessions carry the same whole-session TTL as the Redis backend: the
//! expiry is pushed forward on every write and checked lazily on access.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use recall_core::Message;
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::error::StorageResult;
use crate::storage::{
    select_matches, session_key, validate_session_id, HistoryStore, SearchCapability,
};

/// 内存中的会话日志
#[derive(Debug, Default)]
struct SessionLog {
    messages: Vec<Message>,
    expires_at: Option<DateTime<Utc>>,
}

impl SessionLog {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

pub struct MemoryHistoryStore {
    sessions: DashMap<String, SessionLog>,
    key_prefix: String,
    ttl: Option<chrono::Duration>,
    clock: Arc<dyn Clock>,
}

impl MemoryHistoryStore {
    /// 创建不过期的内存存储
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            key_prefix: crate::DEFAULT_KEY_PREFIX.to_string(),
            ttl: None,
            clock: Arc::new(SystemClock),
        }
    }

    /// Expire sessions `ttl` after their last write. `None` keeps them forever.
    pub fn with_ttl(mut self, ttl: Option<Duration>) -> Self {
        // Out of chrono's range means no expiry
        self.ttl = ttl.and_then(|ttl| chrono::Duration::from_std(ttl).ok());
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Number of live sessions
    pub fn session_count(&self) -> usize {
        let now = self.clock.now();
        self.sessions.iter().filter(|log| !log.is_expired(now)).count()
    }

    /// 清理所有过期会话
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let before = self.sessions.len();
        self.sessions.retain(|_, log| !log.is_expired(now));
        let purged = before - self.sessions.len();
        if purged > 0 {
            debug!(purged, "Purged expired sessions");
        }
        purged
    }

    fn key(&self, session_id: &str) -> StorageResult<String> {
        validate_session_id(session_id)?;
        Ok(session_key(&self.key_prefix, session_id))
    }

    fn drop_if_expired(&self, key: &str) {
        let now = self.clock.now();
        if self.sessions.remove_if(key, |_, log| log.is_expired(now)).is_some() {
            debug!(key, "Session expired");
        }
    }
}

impl Default for MemoryHistoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn get_history(&self, session_id: &str) -> StorageResult<Vec<Message>> {
        let key = self.key(session_id)?;
        self.drop_if_expired(&key);
        Ok(self
            .sessions
            .get(&key)
            .map(|log| log.messages.clone())
            .unwrap_or_default())
    }

    async fn append_all(&self, session_id: &str, messages: &[Message]) -> StorageResult<()> {
        let key = self.key(session_id)?;
        if messages.is_empty() {
            return Ok(());
        }

        self.drop_if_expired(&key);
        let now = self.clock.now();
        let mut log = self.sessions.entry(key).or_default();
        log.messages.extend_from_slice(messages);
        log.expires_at = self.ttl.and_then(|ttl| now.checked_add_signed(ttl));
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> StorageResult<()> {
        let key = self.key(session_id)?;
        self.sessions.remove(&key);
        Ok(())
    }

    async fn count(&self, session_id: &str) -> StorageResult<u64> {
        let key = self.key(session_id)?;
        self.drop_if_expired(&key);
        Ok(self
            .sessions
            .get(&key)
            .map_or(0, |log| log.messages.len() as u64))
    }

    fn search_capability(&self) -> Option<&dyn SearchCapability> {
        Some(self)
    }

    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}

#[async_trait]
impl SearchCapability for MemoryHistoryStore {
    async fn search(
        &self,
        session_id: &str,
        query: &str,
        limit: usize,
    ) -> StorageResult<Vec<Message>> {
        let history = self.get_history(session_id).await?;
        Ok(select_matches(history, query, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::StorageError;

    #[tokio::test]
    async fn test_append_and_read_back() {
        let store = MemoryHistoryStore::new();
        store.append("s1", &Message::user("hi")).await.unwrap();
        store.append("s1", &Message::assistant("hello")).await.unwrap();

        let history = store.get_history("s1").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].text(), "hi");
        assert_eq!(history[1].text(), "hello");
        assert_eq!(store.count("s1").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_huge_ttl_never_expires() {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryHistoryStore::new()
            .with_clock(clock.clone())
            .with_ttl(Some(Duration::from_secs(10_000_000_000 * 3600)));
        store.append("s1", &Message::user("hi")).await.unwrap();

        clock.advance(chrono::Duration::days(365 * 100));
        assert_eq!(store.count("s1").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_empty_append_creates_nothing() {
        let store = MemoryHistoryStore::new();
        store.append_all("s1", &[]).await.unwrap();
        assert_eq!(store.session_count(), 0);
    }

    #[tokio::test]
    async fn test_rejects_empty_session_id() {
        let store = MemoryHistoryStore::new();
        let err = store.get_history("").await.unwrap_err();
        assert!(matches!(err, StorageError::InvalidSessionId { .. }));
    }

    #[tokio::test]
    async fn test_ttl_refreshed_by_write() {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryHistoryStore::new()
            .with_ttl(Some(Duration::from_secs(3600)))
            .with_clock(clock.clone());

        store.append("s1", &Message::user("one")).await.unwrap();
        clock.advance(chrono::Duration::minutes(50));
        store.append("s1", &Message::user("two")).await.unwrap();
        clock.advance(chrono::Duration::minutes(50));

        // 100 minutes since the first write, 50 since the last
        assert_eq!(store.count("s1").await.unwrap(), 2);

        clock.advance(chrono::Duration::minutes(11));
        assert_eq!(store.count("s1").await.unwrap(), 0);
        assert!(store.get_history("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let clock = Arc::new(ManualClock::default());
        let store = MemoryHistoryStore::new()
            .with_ttl(Some(Duration::from_secs(60)))
            .with_clock(clock.clone());

        store.append("a", &Message::user("x")).await.unwrap();
        store.append("b", &Message::user("y")).await.unwrap();
        clock.advance(chrono::Duration::seconds(61));

        assert_eq!(store.purge_expired(), 2);
        assert_eq!(store.session_count(), 0);
    }
}
