//! Filesystem-backed checkpoint store.
//!
//! Layout:
//!
//! ```text
//! <root>/<run_id>/000001-collection.json     pretty JSON run state
//! <root>/<run_id>/000001-collection.digest   SHA-256 hex of the .json bytes
//! ```
//!
//! Writes go through a temp file in the run directory followed by a rename,
//! and the digest is written after the state so a torn write is detected as a
//! missing or mismatched digest on load.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::StorageError;
use crate::storage_traits::{
    checkpoint_bytes, validate_run_id, CheckpointMeta, ContentDigest, RunCheckpoint, RunStore,
    StorageResult,
};

/// Checkpoint store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FsRunStore {
    root: PathBuf,
}

impl FsRunStore {
    /// Create a store rooted at `root`, creating the directory if needed.
    pub fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn run_dir(&self, run_id: &str) -> StorageResult<PathBuf> {
        validate_run_id(run_id)?;
        Ok(self.root.join(run_id))
    }

    fn stem(seq: u64, stage: &str) -> String {
        format!("{:06}-{}", seq, stage)
    }

    /// Scan a run directory for `<seq>-<stage>.json` entries, ordered by seq.
    fn scan(&self, run_id: &str) -> StorageResult<Vec<(u64, String, PathBuf)>> {
        let dir = self.run_dir(run_id)?;
        if !dir.is_dir() {
            return Err(StorageError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }

        let mut entries = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            let Some(stem) = name.strip_suffix(".json") else {
                continue;
            };
            let Some((seq, stage)) = stem.split_once('-') else {
                continue;
            };
            let Ok(seq) = seq.parse::<u64>() else {
                continue;
            };
            entries.push((seq, stage.to_string(), path.clone()));
        }
        entries.sort_by_key(|(seq, _, _)| *seq);

        if entries.is_empty() {
            return Err(StorageError::RunNotFound {
                run_id: run_id.to_string(),
            });
        }
        Ok(entries)
    }

    fn read_verified(
        &self,
        run_id: &str,
        seq: u64,
        stage: &str,
        json_path: &Path,
    ) -> StorageResult<RunCheckpoint> {
        let bytes = fs::read(json_path)?;
        let digest_path = json_path.with_extension("digest");
        let recorded = fs::read_to_string(&digest_path)?;
        let actual = ContentDigest::from_bytes(&bytes);
        if recorded.trim() != actual.as_str() {
            return Err(StorageError::DigestMismatch {
                path: json_path.display().to_string(),
                expected: recorded.trim().to_string(),
                actual: actual.to_string(),
            });
        }

        let recorded_at: DateTime<Utc> = fs::metadata(json_path)?
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or_else(|_| Utc::now());

        Ok(RunCheckpoint {
            meta: CheckpointMeta {
                run_id: run_id.to_string(),
                seq,
                stage: stage.to_string(),
                digest: actual,
                recorded_at,
            },
            state: serde_json::from_slice(&bytes)?,
        })
    }

    fn write_atomic(dir: &Path, path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(data)?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}

#[async_trait]
impl RunStore for FsRunStore {
    async fn save(
        &self,
        run_id: &str,
        stage: &str,
        state: &serde_json::Value,
    ) -> StorageResult<CheckpointMeta> {
        validate_run_id(stage)?;
        let dir = self.run_dir(run_id)?;
        fs::create_dir_all(&dir)?;

        let seq = match self.scan(run_id) {
            Ok(entries) => entries.last().map(|(s, _, _)| s + 1).unwrap_or(1),
            Err(StorageError::RunNotFound { .. }) => 1,
            Err(e) => return Err(e),
        };

        let bytes = checkpoint_bytes(state)?;
        let digest = ContentDigest::from_bytes(&bytes);
        let stem = Self::stem(seq, stage);
        let json_path = dir.join(format!("{stem}.json"));
        let digest_path = dir.join(format!("{stem}.digest"));

        Self::write_atomic(&dir, &json_path, &bytes)?;
        Self::write_atomic(&dir, &digest_path, digest.as_str().as_bytes())?;
        debug!(run_id = %run_id, seq = seq, stage = %stage, digest = %digest.short(), "checkpoint written");

        Ok(CheckpointMeta {
            run_id: run_id.to_string(),
            seq,
            stage: stage.to_string(),
            digest,
            recorded_at: Utc::now(),
        })
    }

    async fn latest(&self, run_id: &str) -> StorageResult<RunCheckpoint> {
        let entries = self.scan(run_id)?;
        let (seq, stage, path) = entries.last().ok_or_else(|| StorageError::RunNotFound {
            run_id: run_id.to_string(),
        })?;
        self.read_verified(run_id, *seq, stage, path)
    }

    async fn load(&self, run_id: &str, seq: u64) -> StorageResult<RunCheckpoint> {
        let entries = self.scan(run_id)?;
        let (seq, stage, path) = entries
            .iter()
            .find(|(s, _, _)| *s == seq)
            .ok_or_else(|| StorageError::RunNotFound {
                run_id: format!("{run_id}@{seq}"),
            })?;
        self.read_verified(run_id, *seq, stage, path)
    }

    async fn history(&self, run_id: &str) -> StorageResult<Vec<CheckpointMeta>> {
        let entries = self.scan(run_id)?;
        entries
            .iter()
            .map(|(seq, stage, path)| {
                self.read_verified(run_id, *seq, stage, path)
                    .map(|cp| cp.meta)
            })
            .collect()
    }

    async fn list_runs(&self) -> StorageResult<Vec<String>> {
        let mut runs = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_run_id(name).is_ok() && self.scan(name).is_ok() {
                    runs.push(name.to_string());
                }
            }
        }
        runs.sort();
        Ok(runs)
    }
}
