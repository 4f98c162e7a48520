//! Local provisioning specs
//!
//! A single supervised runtime serves every user; agent state follows the
//! user between hosts through the blob store.

use crate::prelude::*;

#[tokio::test]
async fn agent_state_follows_user_to_a_new_host() {
    let blobs = tempfile::tempdir().unwrap();
    let port = free_port().await;
    let runtime = serve_health(port).await;
    let alice = AgentId::new("alice");

    // First host: provision, do some work, deprovision
    let first = tempfile::tempdir().unwrap();
    let config = local_config(first.path(), blobs.path(), port);
    let daemon = lifecycle::startup(&config).await.unwrap();
    let control = Arc::clone(&daemon.services.control);

    let status = control.provision(&alice).await.unwrap();
    assert_eq!(status, ProvisionStatus::running(Some(Endpoint::new("127.0.0.1", port))));
    let layout = config.layout();
    write_tree(&layout.sessions_dir(&alice), &[("today.jsonl", b"{\"turn\":1}\n")]);
    write_tree(&layout.workspace_dir(&alice), &[("MEMORY.md", b"likes tea\n")]);

    assert_eq!(control.deprovision(&alice).await.unwrap(), ProvisionStatus::stopped());
    assert_eq!(control.status(&alice).await.unwrap(), ProvisionStatus::stopped());
    daemon.shutdown().await.unwrap();

    // Second host: a fresh state root sharing only the blob store
    let second = tempfile::tempdir().unwrap();
    let config = local_config(second.path(), blobs.path(), port);
    let daemon = lifecycle::startup(&config).await.unwrap();
    let layout = config.layout();

    // Boot restore already brought the agent back
    assert_eq!(layout.discover_agents().unwrap(), vec![alice.clone()]);

    let control = Arc::clone(&daemon.services.control);
    assert_eq!(control.provision(&alice).await.unwrap().state, LifecycleState::Running);
    assert_eq!(
        std::fs::read(layout.workspace_dir(&alice).join("MEMORY.md")).unwrap(),
        b"likes tea\n"
    );
    assert!(layout.sessions_dir(&alice).join("today.jsonl").is_file());

    let runtime_config: serde_json::Value = serde_json::from_str(
        &std::fs::read_to_string(&config.runtime_config_path).unwrap(),
    )
    .unwrap();
    assert_eq!(runtime_config["agents"]["list"][0]["id"], "alice");

    daemon.shutdown().await.unwrap();
    runtime.abort();
}

#[tokio::test]
async fn second_control_plane_on_same_root_is_refused() {
    let root = tempfile::tempdir().unwrap();
    let blobs = tempfile::tempdir().unwrap();
    let port = free_port().await;
    let runtime = serve_health(port).await;
    let config = local_config(root.path(), blobs.path(), port);

    let daemon = lifecycle::startup(&config).await.unwrap();
    assert!(matches!(
        lifecycle::startup(&config).await,
        Err(warden_daemon::LifecycleError::LockFailed(_))
    ));

    daemon.shutdown().await.unwrap();
    runtime.abort();
}
