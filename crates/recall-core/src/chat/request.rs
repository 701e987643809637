use crate::types::{Message, Role};

/// One chat-completion call: the full prompt plus sampling options.
///
/// An empty `model` lets the provider fall back to its configured default.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            messages: Vec::new(),
            options: ChatOptions::default(),
        }
    }

    /// Prompt for one conversational turn: system instruction, the stored
    /// history in order, then the new user message.
    pub fn for_turn(
        model: impl Into<String>,
        system_prompt: &str,
        history: Vec<Message>,
        user: Message,
    ) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 2);
        if !system_prompt.trim().is_empty() {
            messages.push(Message::system(system_prompt));
        }
        messages.extend(history);
        messages.push(user);
        Self {
            model: model.into(),
            messages,
            options: ChatOptions::default(),
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }

    pub fn with_messages(mut self, messages: Vec<Message>) -> Self {
        self.messages.extend(messages);
        self
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.options.temperature = Some(temp);
        self
    }

    /// The last user message, i.e. what this turn asks
    pub fn prompt(&self) -> Option<&Message> {
        self.messages.iter().rev().find(|m| m.role == Role::User)
    }
}

/// Sampling options; unset fields are left to the endpoint's defaults
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// 0.0 - 2.0
    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_turn_layout() {
        let history = vec![Message::user("My name is Alex"), Message::assistant("Hi Alex!")];
        let request = ChatRequest::for_turn(
            "openai/gpt-oss-120b:free",
            "You are a helpful AI assistant with persistent memory.",
            history,
            Message::user("What's my name?"),
        );

        let roles: Vec<_> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.prompt().map(|m| m.text()), Some("What's my name?"));
    }

    #[test]
    fn test_for_turn_skips_blank_system_prompt() {
        let request = ChatRequest::for_turn("m", "  ", Vec::new(), Message::user("hi"));
        assert_eq!(request.messages.len(), 1);
    }

    #[test]
    fn test_with_messages_keeps_order() {
        let request = ChatRequest::new("m")
            .with_message(Message::system("sys"))
            .with_messages(vec![Message::user("a"), Message::assistant("b")])
            .temperature(0.7);

        let contents: Vec<_> = request.messages.iter().map(|m| m.text()).collect();
        assert_eq!(contents, vec!["sys", "a", "b"]);
        assert_eq!(request.options.temperature, Some(0.7));
        assert_eq!(request.prompt().map(|m| m.text()), Some("a"));
    }

    #[test]
    fn test_chat_options() {
        let options = ChatOptions::new()
            .with_temperature(0.5)
            .with_max_tokens(200)
            .with_top_p(0.9);

        assert_eq!(options.temperature, Some(0.5));
        assert_eq!(options.max_tokens, Some(200));
        assert_eq!(options.top_p, Some(0.9));
    }
}
