pub mod message;

pub use message::{Message, MessageId, Role, UnknownRole};
