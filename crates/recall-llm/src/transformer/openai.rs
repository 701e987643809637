use recall_core::chat::{ChatRequest, ChatResponse, ChatUsage, FinishReason};
use recall_core::types::{Message, Role};
use serde_json::{json, Value};

use crate::error::ConversionError;
use crate::transformer::SchemaTransformer;

/// OpenAI-compatible schema transformer
/// Works with OpenAI, OpenRouter, Azure OpenAI and other compatible providers
pub struct OpenAiTransformer;

impl OpenAiTransformer {
    /// Create a new OpenAI transformer
    pub fn new() -> Self {
        Self
    }

    /// Convert internal Message to OpenAI format
    fn convert_message(&self, msg: &Message) -> Value {
        json!({
            "role": msg.role.as_str(),
            "content": msg.content,
        })
    }
}

impl Default for OpenAiTransformer {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaTransformer for OpenAiTransformer {
    fn provider_id(&self) -> &str {
        "openai"
    }

    fn transform_request(&self, request: &ChatRequest) -> Result<Value, ConversionError> {
        if request.messages.is_empty() {
            return Err(ConversionError::InvalidFormat(
                "request has no messages".to_string(),
            ));
        }

        let messages: Vec<Value> = request
            .messages
            .iter()
            .map(|m| self.convert_message(m))
            .collect();

        let mut body = json!({
            "model": request.model,
            "messages": messages,
            "stream": false,
        });

        // Add optional parameters
        if let Some(temp) = request.options.temperature {
            body["temperature"] = json!(temp);
        }

        if let Some(max_tokens) = request.options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        if let Some(top_p) = request.options.top_p {
            body["top_p"] = json!(top_p);
        }

        Ok(body)
    }

    fn parse_response(&self, data: &Value) -> Result<ChatResponse, ConversionError> {
        let id = data["id"].as_str().unwrap_or_default().to_string();
        let model = data["model"].as_str().unwrap_or_default().to_string();

        let choice = data["choices"]
            .get(0)
            .ok_or_else(|| ConversionError::MissingField("choices".to_string()))?;

        let message_data = &choice["message"];
        if let Some(role) = message_data["role"].as_str() {
            let role: Role = role
                .parse()
                .map_err(|e: recall_core::UnknownRole| ConversionError::InvalidFormat(e.to_string()))?;
            if role != Role::Assistant {
                return Err(ConversionError::InvalidFormat(format!(
                    "expected an assistant message, got {}",
                    role
                )));
            }
        }

        let content = message_data["content"]
            .as_str()
            .ok_or_else(|| ConversionError::MissingField("choices[0].message.content".to_string()))?;

        let usage = data
            .get("usage")
            .map(|u| {
                let input = u["prompt_tokens"].as_u64().unwrap_or(0) as u32;
                let output = u["completion_tokens"].as_u64().unwrap_or(0) as u32;
                ChatUsage::new(input, output)
            })
            .unwrap_or_default();

        let finish_reason = FinishReason::from_wire(choice["finish_reason"].as_str());

        Ok(ChatResponse::new(id, model, Message::assistant(content))
            .with_usage(usage)
            .with_finish_reason(finish_reason))
    }
}
