//! Configuration management for search-export
//!
//! This module handles loading, parsing, and managing configuration from various sources:
//! - Configuration files (TOML format)
//! - Environment variables
//! - Command-line arguments
//!
//! Configuration precedence (highest to lowest):
//! 1. Command-line arguments
//! 2. Environment variables
//! 3. Configuration file
//! 4. Default values

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{ConfigError, Result};
use crate::model::{DEFAULT_CHUNK_SIZE, DEFAULT_FIELDS};

/// Prefix of environment variables that override file settings
pub const ENV_PREFIX: &str = "SEARCH_EXPORT_";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Export behaviour
    #[serde(default)]
    pub export: ExportConfig,

    /// Search backend access
    #[serde(default)]
    pub backend: BackendConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Export-related configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    /// Chunk size used when a command does not set one
    #[serde(default = "default_chunk_size")]
    pub default_chunk_size: usize,

    /// Fields exported when a command does not name any
    #[serde(default = "default_fields")]
    pub default_fields: Vec<String>,

    /// Field holding the record timestamp (primary sort key)
    #[serde(default = "default_timestamp_field")]
    pub timestamp_field: String,

    /// Field holding the stable per-record id (tie-break sort key)
    #[serde(default = "default_tie_breaker_field")]
    pub tie_breaker_field: String,

    /// Field listing the streams a record belongs to
    #[serde(default = "default_streams_field")]
    pub streams_field: String,

    /// Pagination strategy
    #[serde(default)]
    pub strategy: PaginationStrategy,

    /// Keep-alive of a scroll context between pages, in seconds
    #[serde(default = "default_scroll_keep_alive")]
    pub scroll_keep_alive: u64,

    /// Let queries start with a wildcard (`*foo`); expensive on large indices
    #[serde(default)]
    pub allow_leading_wildcard: bool,
}

/// How pages are requested from the backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum PaginationStrategy {
    /// Sort cursor ("search after the last seen sort values")
    #[default]
    SearchAfter,

    /// Server-side scroll handle
    Scroll,
}

/// Search backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// JSON fixture with documents grouped by index, served in-process
    #[serde(default)]
    pub fixture: Option<PathBuf>,

    /// Timeout for a single backend request in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Maximum number of backend requests in flight across all exports
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: LogLevel,

    /// Enable timestamps in logs
    #[serde(default = "default_log_timestamps")]
    pub timestamps: bool,
}

/// Log level options
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

// Default value functions
fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

fn default_fields() -> Vec<String> {
    DEFAULT_FIELDS.iter().map(|f| f.to_string()).collect()
}

fn default_timestamp_field() -> String {
    "timestamp".to_string()
}

fn default_tie_breaker_field() -> String {
    "gl2_message_id".to_string()
}

fn default_streams_field() -> String {
    "streams".to_string()
}

fn default_scroll_keep_alive() -> u64 {
    60
}

fn default_request_timeout() -> u64 {
    60
}

fn default_max_concurrent_requests() -> usize {
    8
}

fn default_log_level() -> LogLevel {
    LogLevel::Warn
}

fn default_log_timestamps() -> bool {
    true
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            default_chunk_size: default_chunk_size(),
            default_fields: default_fields(),
            timestamp_field: default_timestamp_field(),
            tie_breaker_field: default_tie_breaker_field(),
            streams_field: default_streams_field(),
            strategy: PaginationStrategy::default(),
            scroll_keep_alive: default_scroll_keep_alive(),
            allow_leading_wildcard: false,
        }
    }
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            fixture: None,
            request_timeout: default_request_timeout(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            timestamps: default_log_timestamps(),
        }
    }
}

impl Config {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from a file, then apply environment overrides
    ///
    /// When `path` is `None` the default location is used if it exists,
    /// otherwise defaults apply. An explicit path that does not exist is an error.
    ///
    /// # Arguments
    /// * `path` - Optional path to the configuration file (TOML format)
    ///
    /// # Returns
    /// * `Result<Config>` - Loaded and validated configuration or error
    pub fn load_from_file(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = Self::default_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    Self::default()
                }
            }
        };

        config.apply_env_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound(path.display().to_string()))?;
        Self::from_toml_str(&content)
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::from)?;
        Ok(config)
    }

    /// Apply `SEARCH_EXPORT_*` overrides
    ///
    /// `lookup` resolves a variable name to its value; the loader passes the
    /// process environment, tests pass a map.
    pub fn apply_env_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(value) = var("CHUNK_SIZE") {
            self.export.default_chunk_size = parse_env("CHUNK_SIZE", &value)?;
        }
        if let Some(value) = var("STRATEGY") {
            self.export.strategy = match value.as_str() {
                "search-after" => PaginationStrategy::SearchAfter,
                "scroll" => PaginationStrategy::Scroll,
                _ => return Err(invalid_env("STRATEGY", &value)),
            };
        }
        if let Some(value) = var("REQUEST_TIMEOUT") {
            self.backend.request_timeout = parse_env("REQUEST_TIMEOUT", &value)?;
        }
        if let Some(value) = var("MAX_CONCURRENT_REQUESTS") {
            self.backend.max_concurrent_requests = parse_env("MAX_CONCURRENT_REQUESTS", &value)?;
        }
        if let Some(value) = var("FIXTURE") {
            self.backend.fixture = Some(PathBuf::from(value));
        }
        Ok(())
    }

    /// Get the default configuration file path
    ///
    /// # Returns
    /// * `PathBuf` - Path to default configuration file
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("search-export")
            .join("config.toml")
    }

    /// Render the configuration as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidFormat(e.to_string()).into())
    }

    /// Validate the configuration
    ///
    /// # Returns
    /// * `Result<()>` - Ok if valid, error otherwise
    pub fn validate(&self) -> Result<()> {
        if self.export.default_chunk_size == 0 {
            return Err(invalid("export.default_chunk_size", "0"));
        }
        if self.export.default_fields.is_empty() {
            return Err(invalid("export.default_fields", "[]"));
        }
        if self.export.timestamp_field.trim().is_empty() {
            return Err(invalid("export.timestamp_field", &self.export.timestamp_field));
        }
        if self.export.tie_breaker_field.trim().is_empty() {
            return Err(invalid("export.tie_breaker_field", &self.export.tie_breaker_field));
        }
        if self.export.scroll_keep_alive == 0 {
            return Err(invalid("export.scroll_keep_alive", "0"));
        }
        if self.backend.request_timeout == 0 {
            return Err(invalid("backend.request_timeout", "0"));
        }
        if self.backend.max_concurrent_requests == 0 {
            return Err(invalid("backend.max_concurrent_requests", "0"));
        }
        Ok(())
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.backend.request_timeout)
    }

    /// Get scroll keep-alive as Duration
    pub fn scroll_keep_alive(&self) -> Duration {
        Duration::from_secs(self.export.scroll_keep_alive)
    }
}

fn invalid(field: &str, value: &str) -> crate::error::ExportError {
    ConfigError::InvalidValue {
        field: field.to_string(),
        value: value.to_string(),
    }
    .into()
}

fn invalid_env(name: &str, value: &str) -> crate::error::ExportError {
    invalid(&format!("{ENV_PREFIX}{name}"), value)
}

fn parse_env<T: std::str::FromStr>(name: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid_env(name, value))
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}
