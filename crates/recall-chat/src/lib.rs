//! # Recall Chat
//!
//! 会话感知的对话编排：读取历史 → 组装请求 → 调用模型 → 持久化本轮对话。
//!
//! ```rust,no_run
//! use recall_chat::ChatEngine;
//! use recall_config::ConfigManager;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let config = ConfigManager::load_default().await?.into_config();
//! let engine = ChatEngine::from_config(&config)?;
//!
//! engine.chat("My name is Alex", "user_001").await?;
//! let reply = engine.chat("What's my name?", "user_001").await?;
//! println!("{}", reply);
//! # Ok(())
//! # }
//! ```

pub mod engine;
pub mod error;

pub use engine::{build_store, ChatEngine, ChatTurn};
pub use error::{ChatError, ChatResult};
