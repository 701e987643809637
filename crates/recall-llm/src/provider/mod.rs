pub mod base;
pub mod config;

pub use base::BaseProvider;
pub use config::{AuthConfig, ProviderConfig};

use async_trait::async_trait;
use recall_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;

/// LLM Provider trait
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Get the provider ID
    fn provider_id(&self) -> &str;

    /// Send a chat request and get a complete response
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;

    /// Validate the provider configuration
    async fn validate(&self) -> Result<()>;
}
