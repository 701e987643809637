use async_trait::async_trait;
use recall_core::chat::{ChatRequest, ChatResponse};

use crate::error::Result;
use crate::provider::{BaseProvider, LLMProvider, ProviderConfig};
use crate::transformer::OpenAiTransformer;

/// OpenAI Provider
/// Uses OpenAI API or compatible endpoints (OpenRouter, Azure, local servers)
pub struct OpenAiProvider {
    base: BaseProvider<OpenAiTransformer>,
}

impl OpenAiProvider {
    /// Create with custom configuration
    pub fn with_config(config: ProviderConfig) -> Result<Self> {
        let base = BaseProvider::new(config, OpenAiTransformer::new())?;
        Ok(Self { base })
    }

    /// Create a new OpenAI provider with API key
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ProviderConfig::default().with_api_key(api_key))
    }

    /// Create with custom base URL (for OpenRouter or other compatible APIs)
    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Result<Self> {
        let config = ProviderConfig::new("openai", base_url).with_api_key(api_key);
        Self::with_config(config)
    }

    /// Create an OpenRouter provider
    pub fn openrouter(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(ProviderConfig::openrouter(api_key))
    }

    /// Default model for requests that do not name one
    pub fn model(&self) -> &str {
        &self.base.config().model
    }
}

#[async_trait]
impl LLMProvider for OpenAiProvider {
    fn provider_id(&self) -> &str {
        self.base.provider_id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.base.chat(request).await
    }

    async fn validate(&self) -> Result<()> {
        self.base.validate().await
    }
}
