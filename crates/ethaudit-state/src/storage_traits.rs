//! Storage trait definitions for ethaudit
//!
//! A `RunStore` persists one checkpoint per stage boundary of an evaluation
//! run. Checkpoints are append-only: a run's history is never rewritten, and
//! the latest checkpoint is the one with the highest `seq`.
//!
//! The store is agnostic to the run-state schema; it accepts any JSON value
//! and guarantees that what it returns hashes to the digest it recorded.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::error::StorageError;

/// Result type for storage operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// Content digest (SHA-256 hex string).
///
/// The inner field is private to guarantee the string is always valid
/// lowercase hex produced by `from_bytes` or validated via `TryFrom<String>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentDigest(String);

impl ContentDigest {
    /// Compute the SHA-256 digest of the given bytes.
    pub fn from_bytes(data: &[u8]) -> Self {
        use sha2::Digest;
        let mut hasher = Sha256::new();
        hasher.update(data);
        ContentDigest(hex::encode(hasher.finalize()))
    }

    /// Return the full hex string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short form (first 12 hex chars).
    pub fn short(&self) -> &str {
        &self.0[..12.min(self.0.len())]
    }
}

impl TryFrom<String> for ContentDigest {
    type Error = StorageError;

    fn try_from(s: String) -> std::result::Result<Self, Self::Error> {
        if s.len() != 64 || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(StorageError::InvalidDigest { digest: s });
        }
        Ok(ContentDigest(s.to_ascii_lowercase()))
    }
}

impl std::fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Checkpoints
// ---------------------------------------------------------------------------

/// Index entry for one persisted checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub run_id: String,
    /// Monotonic per run, starting at 1.
    pub seq: u64,
    /// Stage label the run had entered when the checkpoint was taken.
    pub stage: String,
    pub digest: ContentDigest,
    pub recorded_at: DateTime<Utc>,
}

/// A checkpoint together with the serialized run state it covers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunCheckpoint {
    pub meta: CheckpointMeta,
    pub state: serde_json::Value,
}

/// Serialize a state value the way every store hashes it.
pub fn checkpoint_bytes(state: &serde_json::Value) -> StorageResult<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(state)?)
}

/// Reject run ids that could escape the store root or collide on disk.
pub fn validate_run_id(run_id: &str) -> StorageResult<()> {
    let ok = !run_id.is_empty()
        && run_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if ok {
        Ok(())
    } else {
        Err(StorageError::InvalidRunId {
            run_id: run_id.to_string(),
        })
    }
}

/// Checkpoint store for evaluation runs.
///
/// Guarantees:
/// - `save` assigns `seq = previous max + 1` and never overwrites history.
/// - `latest` returns the highest-`seq` checkpoint, verified against its digest.
/// - `history` is ordered by ascending `seq`.
#[async_trait]
pub trait RunStore: Send + Sync {
    /// Persist a checkpoint for `run_id` at `stage`.
    async fn save(
        &self,
        run_id: &str,
        stage: &str,
        state: &serde_json::Value,
    ) -> StorageResult<CheckpointMeta>;

    /// Load the most recent checkpoint. `RunNotFound` if none exist.
    async fn latest(&self, run_id: &str) -> StorageResult<RunCheckpoint>;

    /// Load a specific checkpoint by sequence number.
    async fn load(&self, run_id: &str, seq: u64) -> StorageResult<RunCheckpoint>;

    /// All checkpoint index entries for a run, oldest first.
    async fn history(&self, run_id: &str) -> StorageResult<Vec<CheckpointMeta>>;

    /// Ids of every run that has at least one checkpoint, sorted.
    async fn list_runs(&self) -> StorageResult<Vec<String>>;
}
