//! Client configuration loaded from TOML.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Environment variable overriding [`ClientConfig::base_url`].
pub const BASE_URL_ENV: &str = "CODEBREAKER_BASE_URL";
/// Environment variable overriding [`ClientConfig::log_filter`].
pub const LOG_FILTER_ENV: &str = "CODEBREAKER_LOG";

/// Settings for the HTTP transport and the console front end.
#[derive(Debug, Clone, PartialEq, Getters, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Root URL of the codebreaker service.
    #[serde(default = "default_base_url")]
    base_url: String,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,

    /// Default `tracing` filter directive.
    #[serde(default = "default_log_filter")]
    log_filter: String,

    /// Pool used for new games when none is given.
    #[serde(default = "default_pool")]
    pool: String,

    /// Code length used for new games when none is given.
    #[serde(default = "default_length")]
    length: usize,
}

#[instrument]
fn default_base_url() -> String {
    "https://ddc-java.services/codebreaker-solitaire".to_string()
}

#[instrument]
fn default_timeout_secs() -> u64 {
    30
}

#[instrument]
fn default_log_filter() -> String {
    "info".to_string()
}

#[instrument]
fn default_pool() -> String {
    "ABCDE".to_string()
}

#[instrument]
fn default_length() -> usize {
    2
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            timeout_secs: default_timeout_secs(),
            log_filter: default_log_filter(),
            pool: default_pool(),
            length: default_length(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration pointing at `base_url` with default settings.
    #[instrument(skip(base_url))]
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }

    /// Loads configuration from a TOML file. Missing keys take defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        config.check()?;
        info!(base_url = %config.base_url, "Config loaded successfully");
        Ok(config)
    }

    /// Applies [`BASE_URL_ENV`] and [`LOG_FILTER_ENV`] when they are set.
    #[instrument(skip(self))]
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var(BASE_URL_ENV) {
            debug!(base_url = %url, "Base URL overridden from environment");
            self.base_url = url;
        }
        if let Ok(filter) = std::env::var(LOG_FILTER_ENV) {
            self.log_filter = filter;
        }
        self
    }

    /// Overrides the default game parameters.
    pub fn with_game_defaults(mut self, pool: Option<String>, length: Option<usize>) -> Self {
        if let Some(pool) = pool {
            self.pool = pool;
        }
        if let Some(length) = length {
            self.length = length;
        }
        self
    }

    /// Request timeout as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    fn check(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::new(format!(
                "base_url must be an http(s) URL, got '{}'",
                self.base_url
            )));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigError::new("timeout_secs must be positive".to_string()));
        }
        Ok(())
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}
