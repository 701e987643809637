//! # Recall Session Storage
//!
//! 会话历史存储：每个 session id 对应一段按时间排序的消息记录。
//!
//! ## 后端
//!
//! - [`RedisHistoryStore`]：Redis LIST，支持整段会话 TTL（写入即刷新）
//! - [`MemoryHistoryStore`]：进程内存储，语义相同，用于 `--memory` 模式与测试
//!
//! ## 使用示例
//!
//! ```rust,no_run
//! use recall_core::Message;
//! use recall_session::{HistoryStore, RedisHistoryStore, RedisStoreConfig};
//!
//! # async fn run() -> recall_session::StorageResult<()> {
//! let store = RedisHistoryStore::new(RedisStoreConfig::new("redis://127.0.0.1:6379/0"))?;
//! store.append("user_001", &Message::user("My name is Alex")).await?;
//! assert_eq!(store.count("user_001").await?, 1);
//! # Ok(())
//! # }
//! ```

pub mod clock;
pub mod error;
pub mod memory_store;
pub mod redis_store;
pub mod storage;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{StorageError, StorageResult};
pub use memory_store::MemoryHistoryStore;
pub use redis_store::{RedisHistoryStore, RedisStoreConfig};
pub use storage::{
    select_matches, session_key, validate_session_id, HistoryStore, SearchCapability,
};

/// Key namespace shared by all backends
pub const DEFAULT_KEY_PREFIX: &str = "chat:";
