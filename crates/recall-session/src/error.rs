//! # Storage Error Types
//!
//! 定义会话历史存储相关的错误类型。

use thiserror::Error;

/// 存储错误类型
#[derive(Error, Debug)]
pub enum StorageError {
    /// The store could not be reached (refused, dropped, timed out).
    /// Callers treat this as "unknown", never as "empty".
    #[error("Store unavailable: {message}")]
    StoreUnavailable { message: String },

    /// 序列化/反序列化错误
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// 无效的会话 ID
    #[error("Invalid session id: {id:?}")]
    InvalidSessionId { id: String },

    /// The store answered but rejected the command
    #[error("Store error: {message}")]
    Backend { message: String },

    /// 配置错误
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
}

impl StorageError {
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::StoreUnavailable {
            message: message.into(),
        }
    }

    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
        }
    }

    /// 创建配置错误
    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable { .. })
    }
}

/// 存储结果类型
pub type StorageResult<T> = Result<T, StorageError>;
