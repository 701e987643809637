pub mod config;
pub mod manager;

pub use config::{
    ttl_from_hours, Config, ConfigError, ConfigResult, LlmConfig, LogLevel, LoggingConfig,
    StoreBackend, StoreConfig, DEFAULT_SYSTEM_PROMPT, MAX_TTL_HOURS,
};
pub use manager::ConfigManager;

use std::path::PathBuf;

/// 获取 Recall 配置目录路径
pub fn recall_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".recall"))
}

/// 获取默认配置文件路径
pub fn default_config_path() -> Option<PathBuf> {
    recall_dir().map(|dir| dir.join("config.json"))
}

/// 获取默认日志文件路径
pub fn default_log_path() -> Option<PathBuf> {
    recall_dir().map(|dir| dir.join("logs").join("recall.log"))
}

/// Load `.env` from the working directory (or a parent) into the process
/// environment. Variables that are already set win.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenvy::dotenv().ok()
}

/// 展开路径中的 ~ 为用户主目录
pub fn expand_tilde(path: &str) -> Option<PathBuf> {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir().map(|home| home.join(rest)),
        None => Some(PathBuf::from(path)),
    }
}
