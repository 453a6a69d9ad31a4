//! Error types for the gossip data model

use thiserror::Error;

/// Errors surfaced while decoding or validating gossip values
#[derive(Debug, Error)]
pub enum ModelError {
    /// The value decoded but carries an unsupported model version.
    #[error("version of model {name} unmatched: actual {actual}, expected {expected}")]
    VersionMismatch {
        name: &'static str,
        actual: u16,
        expected: u16,
    },

    /// The value is not a well-formed wire object.
    #[error("malformed value: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Result type for gossip model operations
pub type ModelResult<T> = Result<T, ModelError>;
