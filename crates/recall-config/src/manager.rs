use crate::config::{Config, ConfigError, ConfigResult, StoreBackend};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

static ENV_VAR_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$\{([^}]+)\}").expect("env var pattern is a valid regex"));

/// 配置管理器
///
/// Owns the configuration file location and the loaded [`Config`]. The
/// configuration is read once; there is no hot-reload.
#[derive(Debug, Clone)]
pub struct ConfigManager {
    path: PathBuf,
    config: Config,
}

impl ConfigManager {
    /// Load the config file, creating a default one if it does not exist,
    /// then apply environment overrides.
    pub async fn load(path: &Path) -> ConfigResult<Self> {
        let mut manager = Self::load_file(path).await?;
        manager.config.apply_process_env()?;
        debug!(
            "Effective config: model={}, store={} ({})",
            manager.config.llm.model,
            manager.config.store.backend,
            manager.config.store.redacted_url()
        );
        Ok(manager)
    }

    /// Load only what the file says. Used when the result is written back,
    /// so environment secrets never end up on disk.
    pub async fn load_file(path: &Path) -> ConfigResult<Self> {
        let config = if path.exists() {
            info!("Loading config from {:?}", path);
            let content = tokio::fs::read_to_string(path).await?;
            let content = Self::expand_env_vars(&content)?;
            serde_json::from_str(&content)?
        } else {
            info!("Config file not found, creating default config at {:?}", path);
            let default_config = Config::default();
            // 确保父目录存在
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            let content = serde_json::to_string_pretty(&default_config)?;
            tokio::fs::write(path, &content).await?;
            default_config
        };

        Ok(Self {
            path: path.to_path_buf(),
            config,
        })
    }

    /// 从默认位置加载配置
    pub async fn load_default() -> ConfigResult<Self> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path).await
    }

    /// 获取默认配置路径 (~/.recall/config.json)
    pub fn default_config_path() -> ConfigResult<PathBuf> {
        crate::default_config_path()
            .ok_or_else(|| ConfigError::InvalidPath("Could not find home directory".to_string()))
    }

    /// Wrap an already-built config (used by tests and `config init`).
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { path, config }
    }

    pub fn get(&self) -> &Config {
        &self.config
    }

    pub fn into_config(self) -> Config {
        self.config
    }

    /// 保存配置到文件
    pub async fn save(&self) -> ConfigResult<()> {
        let content = serde_json::to_string_pretty(&self.config)?;

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::write(&self.path, content).await?;
        info!("Config saved to {:?}", self.path);
        Ok(())
    }

    /// Mutate the config and persist it.
    pub async fn update<F>(&mut self, f: F) -> ConfigResult<()>
    where
        F: FnOnce(&mut Config) -> ConfigResult<()>,
    {
        f(&mut self.config)?;
        self.save().await
    }

    /// Fail fast on configuration the chat engine cannot run with.
    pub fn validate(config: &Config) -> ConfigResult<()> {
        if config.llm.api_key.trim().is_empty() {
            return Err(ConfigError::MissingValue(format!(
                "llm.api_key (set {})",
                crate::config::ENV_API_KEY
            )));
        }

        if config.llm.model.trim().is_empty() {
            return Err(ConfigError::MissingValue("llm.model".to_string()));
        }

        if config.llm.base_url.trim().is_empty() {
            return Err(ConfigError::MissingValue("llm.base_url".to_string()));
        }

        if !(0.0..=2.0).contains(&config.llm.temperature) {
            return Err(ConfigError::Validation(format!(
                "llm.temperature must be between 0 and 2, got {}",
                config.llm.temperature
            )));
        }

        if config.llm.timeout_seconds == 0 {
            return Err(ConfigError::Validation(
                "llm.timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if config.store.default_ttl_hours > crate::config::MAX_TTL_HOURS {
            return Err(ConfigError::Validation(format!(
                "store.default_ttl_hours must be between 0 and {}, got {}",
                crate::config::MAX_TTL_HOURS,
                config.store.default_ttl_hours
            )));
        }

        if config.store.key_prefix.is_empty() {
            return Err(ConfigError::Validation(
                "store.key_prefix cannot be empty".to_string(),
            ));
        }

        if config.store.backend == StoreBackend::Redis {
            let url = config.store.url.trim();
            if url.is_empty() {
                return Err(ConfigError::MissingValue(format!(
                    "store.url (set {})",
                    crate::config::ENV_REDIS_URL
                )));
            }
            let known_scheme = ["redis://", "rediss://", "unix://", "redis+unix://"]
                .iter()
                .any(|scheme| url.starts_with(scheme));
            if !known_scheme {
                return Err(ConfigError::Validation(format!(
                    "store.url must start with redis://, rediss:// or unix://, got {}",
                    config.store.redacted_url()
                )));
            }
        }

        Ok(())
    }

    /// 展开环境变量 ${VAR} 或 ${VAR:-default}
    fn expand_env_vars(content: &str) -> ConfigResult<String> {
        let mut result = content.to_string();

        for cap in ENV_VAR_PATTERN.captures_iter(content) {
            let full_match = &cap[0];
            let var_expr = &cap[1];

            let (var_name, default_value) = match var_expr.split_once(":-") {
                Some((name, default)) => (name, Some(default)),
                None => (var_expr, None),
            };

            let replacement = match std::env::var(var_name) {
                Ok(val) => val,
                Err(_) => match default_value {
                    Some(default) => default.to_string(),
                    None => return Err(ConfigError::EnvVarNotFound(var_name.to_string())),
                },
            };

            result = result.replace(full_match, &replacement);
        }

        Ok(result)
    }

    /// 获取配置文件路径
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.llm.api_key = "sk-or-test".to_string();
        config
    }

    #[tokio::test]
    async fn test_load_creates_default_config() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.json");

        let manager = ConfigManager::load(&config_path).await.unwrap();

        assert!(config_path.exists());
        assert_eq!(manager.get().store.key_prefix, "chat:");
        assert_eq!(manager.path(), config_path.as_path());
    }

    #[tokio::test]
    async fn test_save_and_reload() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.json");

        let mut manager = ConfigManager::new(Config::default(), config_path.clone());
        manager
            .update(|config| config.set_value("store.key_prefix", "recall:"))
            .await
            .unwrap();

        let reloaded = ConfigManager::load(&config_path).await.unwrap();
        assert_eq!(reloaded.get().store.key_prefix, "recall:");
    }

    #[test]
    fn test_env_var_expansion() {
        std::env::set_var("RECALL_TEST_EXPAND_VAR", "test_value");

        let content = r#"{"key": "${RECALL_TEST_EXPAND_VAR}", "other": "${RECALL_TEST_UNSET_VAR:-fallback}"}"#;
        let expanded = ConfigManager::expand_env_vars(content).unwrap();

        assert!(expanded.contains("test_value"));
        assert!(expanded.contains("fallback"));
    }

    #[test]
    fn test_env_var_expansion_missing() {
        let content = r#"{"key": "${RECALL_TEST_DEFINITELY_UNSET}"}"#;
        let result = ConfigManager::expand_env_vars(content);
        assert!(matches!(result, Err(ConfigError::EnvVarNotFound(name)) if name == "RECALL_TEST_DEFINITELY_UNSET"));
    }

    #[test]
    fn test_validation_requires_api_key() {
        let config = Config::default();
        assert!(matches!(
            ConfigManager::validate(&config),
            Err(ConfigError::MissingValue(_))
        ));
        assert!(ConfigManager::validate(&valid_config()).is_ok());
    }

    #[test]
    fn test_validation_checks_store_url() {
        let mut config = valid_config();
        config.store.url = "http://localhost:6379".to_string();
        assert!(matches!(
            ConfigManager::validate(&config),
            Err(ConfigError::Validation(_))
        ));

        config.store.url = String::new();
        assert!(matches!(
            ConfigManager::validate(&config),
            Err(ConfigError::MissingValue(_))
        ));

        // the memory backend never touches the url
        config.store.backend = StoreBackend::Memory;
        assert!(ConfigManager::validate(&config).is_ok());
    }

    #[test]
    fn test_validation_checks_ranges() {
        let mut config = valid_config();
        config.llm.temperature = 3.5;
        assert!(ConfigManager::validate(&config).is_err());

        let mut config = valid_config();
        config.llm.timeout_seconds = 0;
        assert!(ConfigManager::validate(&config).is_err());

        let mut config = valid_config();
        config.store.key_prefix = String::new();
        assert!(ConfigManager::validate(&config).is_err());
    }

    #[test]
    fn test_validation_bounds_ttl() {
        let mut config = valid_config();
        config.store.default_ttl_hours = crate::config::MAX_TTL_HOURS;
        assert!(ConfigManager::validate(&config).is_ok());

        config.store.default_ttl_hours = 0;
        assert!(ConfigManager::validate(&config).is_ok());

        config.store.default_ttl_hours = 10_000_000_000;
        let err = ConfigManager::validate(&config).unwrap_err();
        assert!(err.to_string().contains("store.default_ttl_hours"));
    }
}
