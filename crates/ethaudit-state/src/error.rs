//! Error types for ethaudit-state

use thiserror::Error;

/// Errors produced by checkpoint stores.
#[derive(Error, Debug)]
pub enum StorageError {
    /// No checkpoint exists for the requested run
    #[error("run not found: {run_id}")]
    RunNotFound { run_id: String },

    /// A digest string was not 64 lowercase hex characters
    #[error("invalid digest: {digest}")]
    InvalidDigest { digest: String },

    /// Stored bytes no longer match their recorded digest
    #[error("digest mismatch for {path}: expected {expected}, got {actual}")]
    DigestMismatch {
        path: String,
        expected: String,
        actual: String,
    },

    /// Run identifiers become directory names, so they must be path-safe
    #[error("invalid run id: {run_id}")]
    InvalidRunId { run_id: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
