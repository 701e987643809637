use crate::types::Message;

/// Why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FinishReason {
    /// Completed naturally
    #[default]
    Stop,
    /// Hit token limit
    Length,
    /// Blocked by the provider's content filter
    ContentFilter,
}

impl FinishReason {
    /// Map a provider `finish_reason` string; unknown values count as `Stop`.
    pub fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Stop,
        }
    }
}

/// Chat completion response
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub id: String,
    pub model: String,
    pub message: Message,
    pub usage: ChatUsage,
    pub finish_reason: FinishReason,
}

impl ChatResponse {
    /// Create a new response
    pub fn new(id: impl Into<String>, model: impl Into<String>, message: Message) -> Self {
        Self {
            id: id.into(),
            model: model.into(),
            message,
            usage: ChatUsage::default(),
            finish_reason: FinishReason::Stop,
        }
    }

    /// Set usage
    pub fn with_usage(mut self, usage: ChatUsage) -> Self {
        self.usage = usage;
        self
    }

    /// Set finish reason
    pub fn with_finish_reason(mut self, reason: FinishReason) -> Self {
        self.finish_reason = reason;
        self
    }

    /// Get the text content
    pub fn text(&self) -> &str {
        self.message.text()
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChatUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub total_tokens: u32,
}

impl ChatUsage {
    /// Create new usage info
    pub fn new(input: u32, output: u32) -> Self {
        Self {
            input_tokens: input,
            output_tokens: output,
            total_tokens: input + output,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Message;

    #[test]
    fn test_chat_response() {
        let message = Message::assistant("Hello!");
        let response = ChatResponse::new("resp_123", "gpt-4o-mini", message);

        assert_eq!(response.id, "resp_123");
        assert_eq!(response.model, "gpt-4o-mini");
        assert_eq!(response.text(), "Hello!");
        assert_eq!(response.finish_reason, FinishReason::Stop);
    }

    #[test]
    fn test_chat_usage() {
        let usage = ChatUsage::new(10, 20);
        assert_eq!(usage.input_tokens, 10);
        assert_eq!(usage.output_tokens, 20);
        assert_eq!(usage.total_tokens, 30);
    }

    #[test]
    fn test_finish_reason_from_wire() {
        assert_eq!(FinishReason::from_wire(Some("length")), FinishReason::Length);
        assert_eq!(
            FinishReason::from_wire(Some("content_filter")),
            FinishReason::ContentFilter
        );
        assert_eq!(FinishReason::from_wire(Some("weird")), FinishReason::Stop);
        assert_eq!(FinishReason::from_wire(None), FinishReason::Stop);
    }
}
