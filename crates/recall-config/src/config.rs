use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_MODEL: &str = "openai/gpt-oss-120b:free";
pub const DEFAULT_REDIS_URL: &str = "redis://127.0.0.1:6379/0";
pub const DEFAULT_KEY_PREFIX: &str = "chat:";
/// Longest session expiry accepted, in hours (30 days)
pub const MAX_TTL_HOURS: u64 = 720;

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant with persistent memory.
You remember previous conversations even across sessions.
Reference past discussions naturally when relevant.";

/// Environment variables consulted after the config file is read.
pub const ENV_API_KEY: &str = "OPENROUTER_API_KEY";
pub const ENV_BASE_URL: &str = "RECALL_BASE_URL";
pub const ENV_MODEL: &str = "DEFAULT_MODEL";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_TTL_HOURS: &str = "DEFAULT_TTL_HOURS";
pub const ENV_LOG_LEVEL: &str = "RECALL_LOG_LEVEL";

/// Top-level configuration, loaded once at startup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Config {
    pub version: String,
    pub llm: LlmConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            llm: LlmConfig::default(),
            store: StoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Config {
    /// Apply environment overrides using the given lookup.
    ///
    /// Empty values are ignored so that an exported-but-blank variable does
    /// not wipe a value from the file.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        if let Some(key) = get(ENV_API_KEY) {
            self.llm.api_key = key;
        }
        if let Some(url) = get(ENV_BASE_URL) {
            self.llm.base_url = url;
        }
        if let Some(model) = get(ENV_MODEL) {
            self.llm.model = model;
        }
        if let Some(url) = get(ENV_REDIS_URL) {
            self.store.url = url;
        }
        if let Some(hours) = get(ENV_TTL_HOURS) {
            self.store.default_ttl_hours = hours.trim().parse().map_err(|_| {
                ConfigError::Validation(format!("{} must be a whole number of hours: {}", ENV_TTL_HOURS, hours))
            })?;
        }
        if let Some(level) = get(ENV_LOG_LEVEL) {
            self.logging.level = level.parse()?;
        }
        Ok(())
    }

    /// Apply overrides from the process environment.
    pub fn apply_process_env(&mut self) -> ConfigResult<()> {
        self.apply_env_overrides(|name| std::env::var(name).ok())
    }

    /// 获取配置值的快捷方法
    pub fn get_value(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["version"] => Some(self.version.clone()),
            ["llm", "base_url"] => Some(self.llm.base_url.clone()),
            ["llm", "api_key"] => Some(if self.llm.api_key.is_empty() {
                "<unset>".to_string()
            } else {
                "<set>".to_string()
            }),
            ["llm", "model"] => Some(self.llm.model.clone()),
            ["llm", "temperature"] => Some(self.llm.temperature.to_string()),
            ["llm", "max_tokens"] => self.llm.max_tokens.map(|v| v.to_string()),
            ["llm", "timeout_seconds"] => Some(self.llm.timeout_seconds.to_string()),
            ["llm", "max_retries"] => Some(self.llm.max_retries.to_string()),
            ["llm", "system_prompt"] => Some(self.llm.system_prompt.clone()),
            ["store", "backend"] => Some(self.store.backend.to_string()),
            ["store", "url"] => Some(self.store.redacted_url()),
            ["store", "key_prefix"] => Some(self.store.key_prefix.clone()),
            ["store", "default_ttl_hours"] => Some(self.store.default_ttl_hours.to_string()),
            ["store", "connect_timeout_seconds"] => {
                Some(self.store.connect_timeout_seconds.to_string())
            }
            ["store", "response_timeout_seconds"] => {
                Some(self.store.response_timeout_seconds.to_string())
            }
            ["store", "enable_search"] => Some(self.store.enable_search.to_string()),
            ["logging", "level"] => Some(self.logging.level.to_string()),
            ["logging", "json"] => Some(self.logging.json.to_string()),
            ["logging", "file"] => self.logging.file.clone(),
            _ => None,
        }
    }

    /// 设置配置值
    pub fn set_value(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["llm", "base_url"] => self.llm.base_url = value.to_string(),
            ["llm", "api_key"] => self.llm.api_key = value.to_string(),
            ["llm", "model"] => self.llm.model = value.to_string(),
            ["llm", "temperature"] => self.llm.temperature = parse_value(key, value)?,
            ["llm", "max_tokens"] => self.llm.max_tokens = Some(parse_value(key, value)?),
            ["llm", "timeout_seconds"] => self.llm.timeout_seconds = parse_value(key, value)?,
            ["llm", "max_retries"] => self.llm.max_retries = parse_value(key, value)?,
            ["llm", "system_prompt"] => self.llm.system_prompt = value.to_string(),
            ["store", "backend"] => self.store.backend = value.parse()?,
            ["store", "url"] => self.store.url = value.to_string(),
            ["store", "key_prefix"] => self.store.key_prefix = value.to_string(),
            ["store", "default_ttl_hours"] => {
                self.store.default_ttl_hours = parse_value(key, value)?
            }
            ["store", "connect_timeout_seconds"] => {
                self.store.connect_timeout_seconds = parse_value(key, value)?
            }
            ["store", "response_timeout_seconds"] => {
                self.store.response_timeout_seconds = parse_value(key, value)?
            }
            ["store", "enable_search"] => self.store.enable_search = parse_value(key, value)?,
            ["logging", "level"] => self.logging.level = value.parse()?,
            ["logging", "json"] => self.logging.json = parse_value(key, value)?,
            ["logging", "file"] => self.logging.file = Some(value.to_string()),
            _ => return Err(ConfigError::KeyNotFound(key.to_string())),
        }
        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::Validation(format!("Invalid value for {}: {}", key, value)))
}

/// Chat-completion endpoint settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmConfig {
    pub base_url: String,
    /// Bearer credential; usually supplied through `OPENROUTER_API_KEY`
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub timeout_seconds: u64,
    /// Transient-failure retries; 0 disables the retry middleware
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: String::new(),
            model: DEFAULT_MODEL.to_string(),
            temperature: 0.7,
            max_tokens: None,
            timeout_seconds: 60,
            max_retries: 0,
            system_prompt: default_system_prompt(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

/// History store backend
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Redis,
    Memory,
}

impl std::fmt::Display for StoreBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreBackend::Redis => write!(f, "redis"),
            StoreBackend::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "redis" => Ok(StoreBackend::Redis),
            "memory" => Ok(StoreBackend::Memory),
            _ => Err(ConfigError::Validation(format!("Invalid store backend: {}", s))),
        }
    }
}

/// History store settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoreConfig {
    #[serde(default)]
    pub backend: StoreBackend,
    pub url: String,
    pub key_prefix: String,
    /// Whole-session expiry in hours; 0 means never expire
    pub default_ttl_hours: u64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_response_timeout")]
    pub response_timeout_seconds: u64,
    #[serde(default)]
    pub enable_search: bool,
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_response_timeout() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Redis,
            url: DEFAULT_REDIS_URL.to_string(),
            key_prefix: DEFAULT_KEY_PREFIX.to_string(),
            default_ttl_hours: 24,
            connect_timeout_seconds: default_connect_timeout(),
            response_timeout_seconds: default_response_timeout(),
            enable_search: false,
        }
    }
}

impl StoreConfig {
    /// Session TTL, or `None` when sessions never expire.
    pub fn ttl(&self) -> Option<Duration> {
        ttl_from_hours(self.default_ttl_hours)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_seconds)
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_secs(self.response_timeout_seconds)
    }

    /// The store URL with any password replaced, safe for logs.
    pub fn redacted_url(&self) -> String {
        redact_url(&self.url)
    }
}

/// Convert a TTL in hours to a duration; zero means no expiry.
pub fn ttl_from_hours(hours: u64) -> Option<Duration> {
    if hours == 0 {
        None
    } else {
        Some(Duration::from_secs(hours.saturating_mul(3600)))
    }
}

fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let Some((userinfo, host)) = rest.rsplit_once('@') else {
        return url.to_string();
    };
    match userinfo.split_once(':') {
        Some((user, _)) => format!("{}://{}:***@{}", scheme, user, host),
        None => format!("{}://***@{}", scheme, host),
    }
}

/// 日志级别
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        };
        f.write_str(s)
    }
}

impl std::str::FromStr for LogLevel {
    type Err = ConfigError;

    fn from_str(s: &str) -> ConfigResult<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            _ => Err(ConfigError::Validation(format!("Invalid log level: {}", s))),
        }
    }
}

/// Logging 配置
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct LoggingConfig {
    pub level: LogLevel,
    #[serde(default)]
    pub json: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
}

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Missing required value: {0}")]
    MissingValue(String),

    #[error("Key not found: {0}")]
    KeyNotFound(String),

    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    #[error("Invalid path: {0}")]
    InvalidPath(String),
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
