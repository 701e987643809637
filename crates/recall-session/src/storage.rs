//! # Storage Traits
//!
//! The session-history contract every backend implements.

use async_trait::async_trait;
use recall_core::Message;

use crate::error::{StorageError, StorageResult};

/// Session-scoped history store.
///
/// A session exists iff it holds at least one message. Reads of an unknown
/// session return an empty history; connection failures surface as
/// [`StorageError::StoreUnavailable`].
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Short backend name for logs and the CLI (`redis`, `memory`)
    fn backend(&self) -> &'static str;

    /// Full history in insertion order
    async fn get_history(&self, session_id: &str) -> StorageResult<Vec<Message>>;

    /// Append one message, refreshing the session TTL if one is configured
    async fn append(&self, session_id: &str, message: &Message) -> StorageResult<()> {
        self.append_all(session_id, std::slice::from_ref(message)).await
    }

    /// Append several messages in order as a single atomic write
    async fn append_all(&self, session_id: &str, messages: &[Message]) -> StorageResult<()>;

    /// Remove every message of the session. Idempotent.
    async fn clear(&self, session_id: &str) -> StorageResult<()>;

    /// Number of stored messages
    async fn count(&self, session_id: &str) -> StorageResult<u64>;

    /// Search support, if this store offers it
    fn search_capability(&self) -> Option<&dyn SearchCapability> {
        None
    }

    /// 健康检查
    async fn health_check(&self) -> StorageResult<()>;
}

/// Optional history search.
#[async_trait]
pub trait SearchCapability: Send + Sync {
    /// At most `limit` of the most recent messages whose content contains
    /// `query` (case-insensitive), oldest first.
    async fn search(&self, session_id: &str, query: &str, limit: usize)
        -> StorageResult<Vec<Message>>;
}

/// Reject session ids the store cannot key on.
pub fn validate_session_id(session_id: &str) -> StorageResult<()> {
    if session_id.trim().is_empty() {
        return Err(StorageError::InvalidSessionId {
            id: session_id.to_string(),
        });
    }
    Ok(())
}

/// Namespaced store key for a session.
pub fn session_key(prefix: &str, session_id: &str) -> String {
    format!("{}{}", prefix, session_id)
}

/// Pick the most recent `limit` matches of `query`, keeping chronological order.
pub fn select_matches(history: Vec<Message>, query: &str, limit: usize) -> Vec<Message> {
    if limit == 0 {
        return Vec::new();
    }
    let mut matches: Vec<Message> = history.into_iter().filter(|m| m.mentions(query)).collect();
    let skip = matches.len().saturating_sub(limit);
    matches.drain(..skip);
    matches
}
