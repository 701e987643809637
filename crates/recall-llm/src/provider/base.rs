use async_trait::async_trait;
use log::{debug, warn};
use recall_core::chat::{ChatRequest, ChatResponse};
use reqwest::{header, Client};
use reqwest_middleware::ClientWithMiddleware;
use reqwest_retry::{policies::ExponentialBackoff, RetryTransientMiddleware};
use std::sync::Arc;
use std::time::Duration;

use crate::auth::{Authenticator, BearerAuth, NoAuth};
use crate::error::{ConversionError, LLMError, Result};
use crate::provider::{AuthConfig, LLMProvider, ProviderConfig};
use crate::transformer::SchemaTransformer;

const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// Base provider implementation
/// Handles common HTTP functionality and delegates schema transformation
pub struct BaseProvider<T: SchemaTransformer> {
    config: ProviderConfig,
    http_client: ClientWithMiddleware,
    transformer: Arc<T>,
    authenticator: Arc<dyn Authenticator>,
}

impl<T: SchemaTransformer + 'static> BaseProvider<T> {
    /// Create a new base provider
    pub fn new(config: ProviderConfig, transformer: T) -> Result<Self> {
        let authenticator: Arc<dyn Authenticator> = match &config.auth {
            AuthConfig::Bearer { token } => Arc::new(BearerAuth::new(token.clone())),
            AuthConfig::None => Arc::new(NoAuth),
        };

        Self::with_authenticator(config, transformer, authenticator)
    }

    /// Create with a custom authenticator
    pub fn with_authenticator(
        config: ProviderConfig,
        transformer: T,
        authenticator: Arc<dyn Authenticator>,
    ) -> Result<Self> {
        let http_client = build_http_client(config.timeout, config.max_retries)?;

        Ok(Self {
            config,
            http_client,
            transformer: Arc::new(transformer),
            authenticator,
        })
    }

    /// Get the provider ID
    pub fn provider_id(&self) -> &str {
        &self.config.provider_id
    }

    /// Get the config
    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    fn build_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        headers.insert(header::CONTENT_TYPE, header::HeaderValue::from_static("application/json"));

        if let Some((name, value)) = self.authenticator.auth_header()? {
            headers.insert(name, value);
        }

        // Extra headers such as OpenRouter's X-Title
        for (key, value) in &self.config.headers {
            let name = header::HeaderName::from_bytes(key.as_bytes())
                .map_err(|e| LLMError::Config(format!("invalid header name {:?}: {}", key, e)))?;
            let value = header::HeaderValue::from_str(value)
                .map_err(|e| LLMError::Config(format!("invalid value for header {}: {}", key, e)))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// POST one completion request and parse the reply
    pub async fn send_request(&self, mut request: ChatRequest) -> Result<ChatResponse> {
        if request.model.is_empty() {
            request.model = self.config.model.clone();
        }

        let body = self.transformer.transform_request(&request)?;
        let headers = self.build_headers()?;
        let url = self.config.completions_url();

        debug!(
            "POST {} model={} messages={}",
            url,
            request.model,
            request.messages.len()
        );

        let response = self
            .http_client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status();

        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            let error_text = response.text().await.unwrap_or_default();
            warn!("Chat completion failed with status {}", status);

            return Err(match status.as_u16() {
                401 | 403 => LLMError::Auth(error_text),
                429 => LLMError::RateLimited {
                    retry_after: retry_after.unwrap_or(DEFAULT_RETRY_AFTER_SECS),
                },
                code => LLMError::Api {
                    status: code,
                    message: error_text,
                },
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| LLMError::Network(e.to_string()))?;
        let response_data: serde_json::Value =
            serde_json::from_str(&body).map_err(ConversionError::from)?;

        // OpenRouter reports some upstream failures inside a 200 body
        if let Some(error) = response_data.get("error") {
            let code = error["code"]
                .as_u64()
                .and_then(|c| u16::try_from(c).ok())
                .unwrap_or(status.as_u16());
            let message = error["message"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| error.to_string());
            return Err(LLMError::Api { status: code, message });
        }

        let parsed = self.transformer.parse_response(&response_data)?;
        debug!(
            "Chat completion {} finished: {:?}, {} tokens",
            parsed.id, parsed.finish_reason, parsed.usage.total_tokens
        );
        Ok(parsed)
    }
}

fn build_http_client(timeout: Duration, max_retries: u32) -> Result<ClientWithMiddleware> {
    let client = Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| LLMError::Config(e.to_string()))?;

    let mut builder = reqwest_middleware::ClientBuilder::new(client);
    if max_retries > 0 {
        // Create retry policy with exponential backoff
        let retry_policy = ExponentialBackoff::builder()
            .base(2)
            .build_with_max_retries(max_retries);
        builder = builder.with(RetryTransientMiddleware::new_with_policy(retry_policy));
    }
    Ok(builder.build())
}

fn map_send_error(error: reqwest_middleware::Error) -> LLMError {
    match error {
        reqwest_middleware::Error::Reqwest(e) if e.is_timeout() => LLMError::Timeout(e.to_string()),
        other => LLMError::Network(other.to_string()),
    }
}

#[async_trait]
impl<T: SchemaTransformer + 'static> LLMProvider for BaseProvider<T> {
    fn provider_id(&self) -> &str {
        self.provider_id()
    }

    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        self.send_request(request).await
    }

    async fn validate(&self) -> Result<()> {
        if matches!(self.config.auth, AuthConfig::None) {
            return Err(LLMError::Auth("no API key configured".to_string()));
        }
        self.build_headers()?;
        Ok(())
    }
}
