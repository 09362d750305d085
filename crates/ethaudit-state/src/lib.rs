//! ethaudit-state: checkpoint persistence for evaluation runs
//!
//! Every stage boundary of an evaluation run produces a checkpoint: the full
//! serialized run state plus a SHA-256 digest over the stored bytes. Stores
//! keep the complete checkpoint history per run so a run can be audited or
//! resumed from its latest boundary.
//!
//! ## Key Components
//!
//! - `RunStore`: async, backend-agnostic checkpoint store
//! - `FsRunStore`: filesystem layout `<root>/<run_id>/<seq>-<stage>.json` + `.digest`
//! - `fakes::MemoryRunStore`: in-memory store for tests

mod error;
pub mod fakes;
pub mod fs_store;
pub mod storage_traits;

pub use error::StorageError;
pub use fs_store::FsRunStore;
pub use storage_traits::{CheckpointMeta, ContentDigest, RunCheckpoint, RunStore, StorageResult};
