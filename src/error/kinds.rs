use std::{fmt, io};

/// Crate-wide `Result` type using [`ExportError`] as the error.
///
/// This alias is re-exported by the parent `error` module and is intended
/// to be used throughout the crate for fallible operations.
pub type Result<T> = std::result::Result<T, ExportError>;

/// Top-level error type for export operations.
///
/// Every failure aborts the export in progress. Chunks that already reached
/// the sink stay delivered.
#[derive(Debug)]
pub enum ExportError {
    /// The export command is malformed. Raised before any backend call.
    Validation(String),

    /// The backend rejected the query (malformed, disallowed leading wildcard, ...).
    QuerySyntax {
        /// Machine-readable error type reported by the backend.
        error_type: String,
        /// Human-readable reason reported by the backend.
        reason: String,
    },

    /// Transport failure or timeout while talking to the backend.
    Unavailable(String),

    /// The consumer failed to accept a chunk.
    Sink(String),

    /// Unclassified backend failure with its raw diagnostic text.
    Backend(String),

    /// Configuration errors.
    Config(ConfigError),
}

/// Configuration-specific errors.
#[derive(Debug)]
pub enum ConfigError {
    /// Config file not found.
    FileNotFound(String),

    /// Invalid config format.
    InvalidFormat(String),

    /// Invalid field value.
    InvalidValue { field: String, value: String },
}

impl ExportError {
    /// Whether the same request could succeed if issued again later.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ExportError::Unavailable(_))
    }

    /// Short, stable name of the error class, used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExportError::Validation(_) => "validation",
            ExportError::QuerySyntax { .. } => "query_syntax",
            ExportError::Unavailable(_) => "unavailable",
            ExportError::Sink(_) => "sink",
            ExportError::Backend(_) => "backend",
            ExportError::Config(_) => "config",
        }
    }
}

/* ========================= Display & Error impls ========================= */

impl fmt::Display for ExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportError::Validation(msg) => write!(f, "Invalid export command: {msg}"),
            ExportError::QuerySyntax { error_type, reason } => {
                write!(f, "Query rejected by search backend ({error_type}): {reason}")
            }
            ExportError::Unavailable(msg) => write!(f, "Search backend unavailable: {msg}"),
            ExportError::Sink(msg) => write!(f, "Chunk consumer failed: {msg}"),
            ExportError::Backend(msg) => write!(f, "Search backend error: {msg}"),
            ExportError::Config(e) => write!(f, "Configuration error: {e}"),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FileNotFound(path) => write!(f, "Config file not found: {path}"),
            ConfigError::InvalidFormat(msg) => write!(f, "Invalid config format: {msg}"),
            ConfigError::InvalidValue { field, value } => {
                write!(f, "Invalid value '{value}' for field '{field}'")
            }
        }
    }
}

impl std::error::Error for ExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ExportError::Config(e) => Some(e),
            _ => None,
        }
    }
}

impl std::error::Error for ConfigError {}

/* ========================= Conversions to ExportError ========================= */

impl From<ConfigError> for ExportError {
    fn from(err: ConfigError) -> Self {
        ExportError::Config(err)
    }
}

impl From<io::Error> for ExportError {
    fn from(err: io::Error) -> Self {
        ExportError::Sink(err.to_string())
    }
}

impl From<serde_json::Error> for ExportError {
    fn from(err: serde_json::Error) -> Self {
        ExportError::Sink(format!("Failed to serialize record: {err}"))
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::InvalidFormat(err.to_string())
    }
}
