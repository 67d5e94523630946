//! Error types for weather-extract services.

use thiserror::Error;

/// Result type alias using ExtractError.
pub type ExtractResult<T> = Result<T, ExtractError>;

/// Primary error type for extraction operations.
#[derive(Debug, Error)]
pub enum ExtractError {
    // === Configuration errors (fatal, never retried) ===
    #[error("Configuration error: {0}")]
    Configuration(String),

    // === Fetch errors ===
    #[error("Fetch failed after {attempts} attempts: {last}")]
    FetchFailed { attempts: u32, last: String },

    #[error("Native file unavailable and autofetch is disabled: {0}")]
    NativeFileUnavailable(String),

    // === Field resolution ===
    #[error("Field '{variable}' not found under any name (tried {tried:?})")]
    FieldResolution {
        variable: String,
        tried: Vec<String>,
    },

    // === Grouping ===
    #[error("Non-monotonic step sequence: {0}")]
    GroupingInconsistency(String),

    // === Dataset format collaborator ===
    #[error("Dataset format error: {0}")]
    DatasetFormat(String),

    #[error("Domain not found: {0}")]
    DomainNotFound(String),

    // === Infrastructure ===
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExtractError {
    /// Whether this error is a fatal configuration problem that a retry
    /// can never fix.
    pub fn is_configuration(&self) -> bool {
        matches!(self, ExtractError::Configuration(_))
    }
}

impl From<serde_json::Error> for ExtractError {
    fn from(err: serde_json::Error) -> Self {
        ExtractError::DatasetFormat(format!("JSON error: {}", err))
    }
}
