//! Error types for the estimation service.

use std::path::PathBuf;
use std::time::Duration;

use crate::validation::ValidationError;

/// Top-level error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors raised while reading process configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

/// Errors from the external language-model service.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("Request to {provider} failed: {reason}")]
    RequestFailed { provider: String, reason: String },

    #[error("Authentication failed for {provider}")]
    AuthFailed { provider: String },

    #[error("Rate limited by {provider}")]
    RateLimited {
        provider: String,
        retry_after: Option<Duration>,
    },

    #[error("Invalid response from {provider}: {reason}")]
    InvalidResponse { provider: String, reason: String },

    #[error("Request to {provider} timed out after {timeout:?}")]
    Timeout { provider: String, timeout: Duration },
}

/// Errors from the runtime-override store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The override document was rejected before anything was written.
    #[error("Override rejected: {}", summarize(.errors))]
    Rejected { errors: Vec<ValidationError> },

    /// Persisting the override failed; the new settings were not applied.
    #[error("Failed to write override file {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to remove override file {}: {source}", .path.display())]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to serialize override: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Errors compiling a keyword rule.
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    #[error("Unsupported regex flag '{0}'")]
    UnknownFlag(char),

    #[error("Invalid pattern: {0}")]
    Invalid(#[from] regex::Error),
}

fn summarize(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("{}: {}", e.field, e.message))
        .collect::<Vec<_>>()
        .join("; ")
}

/// Result type for crate operations.
pub type Result<T> = std::result::Result<T, Error>;
