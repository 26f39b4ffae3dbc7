//! Error types for cache operations
//!
//! Only whole-request problems (an unkeyable context, a bad configuration)
//! are meant to reach callers. Per-entry problems such as a corrupt persisted
//! record are logged and contained by the stores.

use chrono::NaiveDate;
use thiserror::Error;

/// Main error type for cache operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The request lacks an identity field, so it cannot be keyed
    #[error("Incomplete context: missing {field}")]
    IncompleteContext { field: &'static str },

    /// Configuration rejected at construction time
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A persisted entry could not be decoded
    #[error("Malformed stored entry '{key}': {reason}")]
    MalformedStoredEntry { key: String, reason: String },

    /// Range record whose start lies after its end
    #[error("Invalid interval: {start} is after {end}")]
    InvalidInterval { start: NaiveDate, end: NaiveDate },

    /// The persistence collaborator failed or timed out
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Serialization/Deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A spawned write task panicked or was aborted
    #[error("Background task failed: {0}")]
    Background(String),

    /// Generic error with context
    #[error("Error: {0}")]
    Other(String),
}

impl CacheError {
    /// Whether the error invalidates the whole request rather than just the cache attempt
    pub fn is_request_fatal(&self) -> bool {
        matches!(
            self,
            CacheError::IncompleteContext { .. } | CacheError::Configuration(_)
        )
    }
}

/// Result type alias for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

impl From<String> for CacheError {
    fn from(s: String) -> Self {
        CacheError::Other(s)
    }
}

impl From<&str> for CacheError {
    fn from(s: &str) -> Self {
        CacheError::Other(s.to_string())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(e: serde_json::Error) -> Self {
        CacheError::Serialization(e.to_string())
    }
}
