use config::{Config, Environment, File};
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}
fn default_port() -> u16 {
    5000
}
fn default_max_body_bytes() -> usize {
    65536
}

#[derive(Debug, Deserialize, Clone)]
pub struct CacheConfig {
    #[serde(default = "default_cache_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_cache_expiry")]
    pub expiry_secs: u64,
    #[serde(default = "default_memory_capacity")]
    pub memory_capacity: u64,
    #[serde(default = "default_prune_interval")]
    pub prune_interval_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            dir: default_cache_dir(),
            expiry_secs: default_cache_expiry(),
            memory_capacity: default_memory_capacity(),
            prune_interval_secs: default_prune_interval(),
        }
    }
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("./cache")
}
fn default_cache_expiry() -> u64 {
    604800 // 7 days
}
fn default_memory_capacity() -> u64 {
    10_000
}
fn default_prune_interval() -> u64 {
    3600
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_history_path")]
    pub path: PathBuf,
    #[serde(default = "default_history_format")]
    pub format: String,
    #[serde(default)]
    pub max_commands: Option<usize>,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            path: default_history_path(),
            format: default_history_format(),
            max_commands: None,
        }
    }
}

fn default_history_path() -> PathBuf {
    PathBuf::from("./cli_history.txt")
}
fn default_history_format() -> String {
    "plain".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    #[serde(default = "default_provider_kind")]
    pub kind: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: default_provider_kind(),
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            timeout_secs: default_timeout(),
            max_tokens: default_max_tokens(),
        }
    }
}

fn default_provider_kind() -> String {
    "openai".to_string()
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}
fn default_timeout() -> u64 {
    30
}
fn default_max_tokens() -> u32 {
    256
}

impl AppConfig {
    /// Reject settings the service cannot run with.
    pub fn validate(&self) -> Result<(), String> {
        if self.cache.expiry_secs == 0 {
            return Err("cache.expiry_secs must be greater than zero. \
                 Set it in config.toml or via SHELLCOACH__CACHE__EXPIRY_SECS env var."
                .to_string());
        }
        if self.provider.timeout_secs == 0 {
            return Err("provider.timeout_secs must be greater than zero".to_string());
        }
        if !matches!(self.provider.kind.as_str(), "openai" | "stub") {
            return Err(format!(
                "provider.kind must be \"openai\" or \"stub\", got {:?}",
                self.provider.kind
            ));
        }
        if !matches!(
            self.history.format.to_ascii_lowercase().as_str(),
            "plain" | "zsh"
        ) {
            return Err(format!(
                "history.format must be \"plain\" or \"zsh\", got {:?}",
                self.history.format
            ));
        }
        if self.history.max_commands == Some(0) {
            return Err("history.max_commands must be greater than zero when set".to_string());
        }
        Ok(())
    }

    pub fn load(config_path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = Config::builder();

        // Load from config file
        let path = config_path.unwrap_or("config.toml");
        builder = builder.add_source(File::with_name(path).required(false));

        // Overlay with environment variables (SHELLCOACH__SERVER__PORT=5001, etc.)
        builder = builder.add_source(
            Environment::with_prefix("SHELLCOACH")
                .separator("__")
                .try_parsing(true),
        );

        let mut config: Self = builder.build()?.try_deserialize()?;
        config.apply_legacy_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Flat variable names used by earlier deployments win over everything else.
    fn apply_legacy_env<F>(&mut self, lookup: F) -> Result<(), config::ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("CACHE_DIR") {
            self.cache.dir = PathBuf::from(dir);
        }
        if let Some(expiry) = lookup("CACHE_EXPIRY") {
            self.cache.expiry_secs = expiry.trim().parse().map_err(|_| {
                config::ConfigError::Message(format!("CACHE_EXPIRY is not a number: {expiry}"))
            })?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY") {
            self.provider.api_key = key;
        }
        if let Some(model) = lookup("MODEL") {
            self.provider.model = model;
        }
        if let Some(path) = lookup("CLI_HISTORY_FILE") {
            self.history.path = PathBuf::from(path);
        }
        Ok(())
    }
}
