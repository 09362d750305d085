//! In-memory fakes for storage traits (testing only)
//!
//! `MemoryRunStore` satisfies the `RunStore` contract without touching disk.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;

use crate::error::StorageError;
use crate::storage_traits::*;

#[derive(Debug, Clone)]
struct StoredCheckpoint {
    meta: CheckpointMeta,
    bytes: Vec<u8>,
}

/// In-memory checkpoint store backed by a `BTreeMap<run_id, Vec<checkpoint>>`.
#[derive(Debug, Default)]
pub struct MemoryRunStore {
    runs: Mutex<BTreeMap<String, Vec<StoredCheckpoint>>>,
}

impl MemoryRunStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of checkpoints recorded for a run (0 when unknown).
    pub fn checkpoint_count(&self, run_id: &str) -> usize {
        let runs = self.runs.lock().unwrap();
        runs.get(run_id).map(Vec::len).unwrap_or(0)
    }

    fn decode(run_id: &str, stored: &StoredCheckpoint) -> StorageResult<RunCheckpoint> {
        let actual = ContentDigest::from_bytes(&stored.bytes);
        if actual != stored.meta.digest {
            return Err(StorageError::DigestMismatch {
                path: format!("{}@{}", run_id, stored.meta.seq),
                expected: stored.meta.digest.to_string(),
                actual: actual.to_string(),
            });
        }
        Ok(RunCheckpoint {
            meta: stored.meta.clone(),
            state: serde_json::from_slice(&stored.bytes)?,
        })
    }
}

#[async_trait]
impl RunStore for MemoryRunStore {
    async fn save(
        &self,
        run_id: &str,
        stage: &str,
        state: &serde_json::Value,
    ) -> StorageResult<CheckpointMeta> {
        validate_run_id(run_id)?;
        let bytes = checkpoint_bytes(state)?;
        let mut runs = self.runs.lock().unwrap();
        let history = runs.entry(run_id.to_string()).or_default();
        let meta = CheckpointMeta {
            run_id: run_id.to_string(),
            seq: history.len() as u64 + 1,
            stage: stage.to_string(),
            digest: ContentDigest::from_bytes(&bytes),
            recorded_at: Utc::now(),
        };
        history.push(StoredCheckpoint {
            meta: meta.clone(),
            bytes,
        });
        Ok(meta)
    }

    async fn latest(&self, run_id: &str) -> StorageResult<RunCheckpoint> {
        let runs = self.runs.lock().unwrap();
        let stored = runs
            .get(run_id)
            .and_then(|h| h.last())
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: run_id.to_string(),
            })?;
        Self::decode(run_id, stored)
    }

    async fn load(&self, run_id: &str, seq: u64) -> StorageResult<RunCheckpoint> {
        let runs = self.runs.lock().unwrap();
        let stored = runs
            .get(run_id)
            .and_then(|h| h.iter().find(|c| c.meta.seq == seq))
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: format!("{run_id}@{seq}"),
            })?;
        Self::decode(run_id, stored)
    }

    async fn history(&self, run_id: &str) -> StorageResult<Vec<CheckpointMeta>> {
        let runs = self.runs.lock().unwrap();
        let history = runs.get(run_id).ok_or_else(|| StorageError::RunNotFound {
            run_id: run_id.to_string(),
        })?;
        Ok(history.iter().map(|c| c.meta.clone()).collect())
    }

    async fn list_runs(&self) -> StorageResult<Vec<String>> {
        let runs = self.runs.lock().unwrap();
        Ok(runs.keys().cloned().collect())
    }
}
