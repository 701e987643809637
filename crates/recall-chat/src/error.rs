use recall_config::ConfigError;
use recall_llm::LLMError;
use recall_session::StorageError;
use thiserror::Error;

/// Errors surfaced by [`crate::ChatEngine`].
#[derive(Error, Debug)]
pub enum ChatError {
    /// Missing or invalid configuration; raised before any session is touched
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    /// The history store could not be reached. The count or history is unknown.
    #[error("History store unavailable: {0}")]
    StoreUnavailable(String),

    /// The model endpoint failed; nothing was written for the turn
    #[error("Model call failed: {0}")]
    ModelCallFailed(#[source] LLMError),

    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    /// Any other store fault (rejected command, corrupt entry)
    #[error("History store error: {0}")]
    Store(#[source] StorageError),
}

impl ChatError {
    pub fn is_store_unavailable(&self) -> bool {
        matches!(self, Self::StoreUnavailable(_))
    }

    /// The same turn may succeed if sent again
    pub fn is_transient(&self) -> bool {
        match self {
            Self::StoreUnavailable(_) => true,
            Self::ModelCallFailed(e) => e.is_transient(),
            _ => false,
        }
    }
}

impl From<StorageError> for ChatError {
    fn from(error: StorageError) -> Self {
        match error {
            StorageError::StoreUnavailable { message } => Self::StoreUnavailable(message),
            StorageError::InvalidSessionId { id } => Self::InvalidSessionId(id),
            StorageError::ConfigError { message } => Self::ConfigInvalid(message),
            other => Self::Store(other),
        }
    }
}

impl From<LLMError> for ChatError {
    fn from(error: LLMError) -> Self {
        Self::ModelCallFailed(error)
    }
}

impl From<ConfigError> for ChatError {
    fn from(error: ConfigError) -> Self {
        Self::ConfigInvalid(error.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
