//! Error types for location inference.
//!
//! "No location found" is not an error: it is an empty `FeatureCollection`.

use thiserror::Error;

/// A failure talking to an external store (settings service, profile table, gazetteer).
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(String),

    #[error("malformed store response: {0}")]
    Malformed(String),

    #[error("{operation} timed out after {after_ms}ms")]
    Timeout { operation: String, after_ms: u64 },
}

/// Fatal resolution errors. None of these carries a partial result.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum InferenceError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("[{0}] is an unsupported language")]
    UnsupportedLanguage(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl InferenceError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}
