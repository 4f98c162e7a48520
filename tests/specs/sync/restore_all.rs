//! Bulk restore specs
//!
//! `restore_all` brings back every agent with a snapshot and isolates
//! per-agent failures.

use crate::prelude::*;

async fn snapshot_agents(store: &MemoryBlobStore, ids: &[&str]) {
    let sync = SyncEngine::new(Arc::new(store.clone()), PREFIX);
    let src = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(src.path());
    for id in ids {
        let id = AgentId::new(*id);
        write_tree(&layout.sessions_dir(&id), &[("s.jsonl", id.as_bytes())]);
        write_tree(&layout.workspace_dir(&id), &[("w.md", id.as_bytes())]);
        sync.snapshot_agent(&id, &layout).await.unwrap();
    }
}

#[tokio::test]
async fn restore_all_counts_agents_and_skips_corrupt_ones() {
    let store = MemoryBlobStore::new();
    snapshot_agents(&store, &["a", "b", "c"]).await;
    store.insert("agent-state/broken/agentdir.tar.gz", b"\x1f\x8b garbage".to_vec());

    let sync = SyncEngine::new(Arc::new(store.clone()), PREFIX).with_concurrency(2);
    let dest = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(dest.path());

    assert_eq!(sync.restore_all(&layout).await.unwrap(), 3);

    for id in ["a", "b", "c"] {
        let id = AgentId::new(id);
        let session = std::fs::read(layout.sessions_dir(&id).join("s.jsonl")).unwrap();
        assert_eq!(session, id.as_bytes());
        let workspace = std::fs::read(layout.workspace_dir(&id).join("w.md")).unwrap();
        assert_eq!(workspace, id.as_bytes());
    }
    assert!(!layout.agent_dir(&AgentId::new("broken")).exists());
    assert_eq!(layout.discover_agents().unwrap().len(), 3);
}

#[tokio::test]
async fn restore_all_on_empty_store_restores_nothing() {
    let sync = SyncEngine::new(Arc::new(MemoryBlobStore::new()), PREFIX);
    let dest = tempfile::tempdir().unwrap();

    assert_eq!(sync.restore_all(&StateLayout::new(dest.path())).await.unwrap(), 0);
}

#[tokio::test]
async fn restore_all_ignores_other_prefixes() {
    let store = MemoryBlobStore::new();
    snapshot_agents(&store, &["a"]).await;
    store.insert("other-prefix/z/agentdir.tar.gz", b"ignored".to_vec());

    let sync = SyncEngine::new(Arc::new(store), PREFIX);
    let dest = tempfile::tempdir().unwrap();
    assert_eq!(sync.restore_all(&StateLayout::new(dest.path())).await.unwrap(), 1);
}
