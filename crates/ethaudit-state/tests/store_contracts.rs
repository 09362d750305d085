//! Contract tests for `RunStore`.
//!
//! Both the filesystem store and the in-memory fake must satisfy these.

use ethaudit_state::fakes::MemoryRunStore;
use ethaudit_state::storage_traits::*;
use ethaudit_state::{FsRunStore, StorageError};
use serde_json::json;

async fn assert_append_only_history(store: &dyn RunStore) {
    store.save("run-1", "collection", &json!({"retry_count": 0})).await.unwrap();
    store.save("run-1", "analysis", &json!({"retry_count": 0})).await.unwrap();
    store.save("run-1", "collection", &json!({"retry_count": 1})).await.unwrap();

    let history = store.history("run-1").await.unwrap();
    let seqs: Vec<u64> = history.iter().map(|m| m.seq).collect();
    let stages: Vec<&str> = history.iter().map(|m| m.stage.as_str()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(stages, vec!["collection", "analysis", "collection"]);

    let latest = store.latest("run-1").await.unwrap();
    assert_eq!(latest.state["retry_count"], 1);

    let first = store.load("run-1", 1).await.unwrap();
    assert_eq!(first.state["retry_count"], 0);
}

async fn assert_digest_matches_bytes(store: &dyn RunStore) {
    let state = json!({"run_id": "run-2", "ethics_score": 72});
    let meta = store.save("run-2", "report", &state).await.unwrap();
    let expected = ContentDigest::from_bytes(&checkpoint_bytes(&state).unwrap());
    assert_eq!(meta.digest, expected);

    let loaded = store.latest("run-2").await.unwrap();
    assert_eq!(loaded.meta.digest, expected);
    assert_eq!(loaded.state, state);
}

async fn assert_unknown_run(store: &dyn RunStore) {
    let err = store.latest("ghost").await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
    let err = store.load("run-1", 99).await.unwrap_err();
    assert!(matches!(err, StorageError::RunNotFound { .. }));
}

#[tokio::test]
async fn memory_store_contract() {
    let store = MemoryRunStore::new();
    assert_append_only_history(&store).await;
    assert_digest_matches_bytes(&store).await;
    assert_unknown_run(&store).await;
    assert_eq!(store.checkpoint_count("run-1"), 3);
    assert_eq!(store.list_runs().await.unwrap(), vec!["run-1", "run-2"]);
}

#[tokio::test]
async fn fs_store_contract() {
    let dir = tempfile::tempdir().unwrap();
    let store = FsRunStore::new(dir.path()).unwrap();
    assert_append_only_history(&store).await;
    assert_digest_matches_bytes(&store).await;
    assert_unknown_run(&store).await;
    assert_eq!(store.list_runs().await.unwrap(), vec!["run-1", "run-2"]);
}

#[tokio::test]
async fn fs_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    {
        let store = FsRunStore::new(dir.path()).unwrap();
        store.save("run-3", "evaluation", &json!({"k": "v"})).await.unwrap();
    }
    let reopened = FsRunStore::new(dir.path()).unwrap();
    let latest = reopened.latest("run-3").await.unwrap();
    assert_eq!(latest.meta.stage, "evaluation");
    assert_eq!(latest.state, json!({"k": "v"}));
}
