use thiserror::Error;

/// Failures talking to the chat-completion endpoint
#[derive(Error, Debug)]
pub enum LLMError {
    #[error("model endpoint unreachable: {0}")]
    Network(String),

    #[error("model call timed out: {0}")]
    Timeout(String),

    #[error("model endpoint returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("credentials rejected: {0}")]
    Auth(String),

    #[error("unreadable completion: {0}")]
    Transform(#[from] ConversionError),

    #[error("invalid provider settings: {0}")]
    Config(String),

    #[error("rate limited by model endpoint, retry after {retry_after}s")]
    RateLimited { retry_after: u64 },
}

impl LLMError {
    /// HTTP status reported by the endpoint, if any
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::RateLimited { .. } => Some(429),
            _ => None,
        }
    }

    /// Worth asking the user to try again
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout(_) | Self::RateLimited { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Completion body could not be turned into a reply
#[derive(Error, Debug)]
pub enum ConversionError {
    #[error("not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing {0}")]
    MissingField(String),

    #[error("unexpected shape: {0}")]
    InvalidFormat(String),
}

pub type Result<T> = std::result::Result<T, LLMError>;
