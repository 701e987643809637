//! Shared types for Recall.
//!
//! Everything that crosses a crate boundary lives here: the stored
//! [`Message`] and its [`Role`], and the request/response pair exchanged
//! with a chat-completion provider.

pub mod chat;
pub mod types;

pub use types::{Message, MessageId, Role, UnknownRole};

pub use chat::{ChatOptions, ChatRequest, ChatResponse, ChatUsage, FinishReason};
