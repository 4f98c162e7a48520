//! Snapshot/restore round-trip specs
//!
//! An agent's directories survive a trip through the blob store byte for
//! byte, landing on a different state root.

use crate::prelude::*;

#[tokio::test]
async fn snapshot_restore_reproduces_every_file_and_byte() {
    let blobs = tempfile::tempdir().unwrap();
    let sync = SyncEngine::new(Arc::new(FsBlobStore::new(blobs.path())), PREFIX);
    let id = AgentId::new("alice");

    let src = tempfile::tempdir().unwrap();
    let src_layout = StateLayout::new(src.path());
    let binary: Vec<u8> = (0..=255u8).cycle().take(70_000).collect();
    write_tree(
        &src_layout.agent_dir(&id),
        &[
            ("sessions/2026-01-01.jsonl", b"{\"role\":\"user\"}\n"),
            ("sessions/empty.jsonl", b""),
            ("auth/profile.json", b"{}"),
            ("deeply/nested/dir/blob.bin", binary.as_slice()),
        ],
    );
    write_tree(&src_layout.workspace_dir(&id), &[("MEMORY.md", b"# memory\n")]);

    sync.snapshot_agent(&id, &src_layout).await.unwrap();
    assert!(blobs.path().join("agent-state/alice/agentdir.tar.gz").is_file());
    assert!(blobs.path().join("agent-state/alice/workspace.tar.gz").is_file());

    let dest = tempfile::tempdir().unwrap();
    let dest_layout = StateLayout::new(dest.path());
    let outcome = sync.restore_agent(&id, &dest_layout).await.unwrap();
    assert!(outcome.agentdir && outcome.workspace);

    assert_eq!(read_tree(&dest_layout.agent_dir(&id)), read_tree(&src_layout.agent_dir(&id)));
    assert_eq!(
        read_tree(&dest_layout.workspace_dir(&id)),
        read_tree(&src_layout.workspace_dir(&id))
    );
}

#[tokio::test]
async fn snapshot_of_missing_directory_writes_nothing() {
    let store = MemoryBlobStore::new();
    let sync = SyncEngine::new(Arc::new(store.clone()), PREFIX);
    let root = tempfile::tempdir().unwrap();

    sync.snapshot_agent(&AgentId::new("ghost"), &StateLayout::new(root.path())).await.unwrap();

    assert!(store.puts().is_empty());
    assert!(store.keys().is_empty());
}

#[tokio::test]
async fn restore_of_absent_key_is_false_and_creates_nothing() {
    let sync = SyncEngine::new(Arc::new(MemoryBlobStore::new()), PREFIX);
    let root = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(root.path());
    let id = AgentId::new("nobody");

    let outcome = sync.restore_agent(&id, &layout).await.unwrap();

    assert!(!outcome.any());
    assert!(!layout.agent_dir(&id).exists());
    assert!(!layout.workspace_dir(&id).exists());
}

#[tokio::test]
async fn later_snapshot_replaces_earlier_one() {
    let store = MemoryBlobStore::new();
    let sync = SyncEngine::new(Arc::new(store.clone()), PREFIX);
    let id = AgentId::new("alice");
    let src = tempfile::tempdir().unwrap();
    let layout = StateLayout::new(src.path());

    write_tree(&layout.workspace_dir(&id), &[("notes.md", b"v1")]);
    sync.snapshot_agent(&id, &layout).await.unwrap();
    write_tree(&layout.workspace_dir(&id), &[("notes.md", b"v2")]);
    sync.snapshot_agent(&id, &layout).await.unwrap();

    let dest = tempfile::tempdir().unwrap();
    let dest_layout = StateLayout::new(dest.path());
    sync.restore_agent(&id, &dest_layout).await.unwrap();
    assert_eq!(std::fs::read(dest_layout.workspace_dir(&id).join("notes.md")).unwrap(), b"v2");
}
