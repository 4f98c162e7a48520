//! One-shot command specs
//!
//! CLI commands build their own services against the state root of a
//! running control plane. They share its runtime, never start their own,
//! and everything they register stays visible to the daemon.

use serde_json::Value;
use warden_daemon::{ControlError, SupervisorError};

use crate::prelude::*;

fn listed_ids(config: &Config) -> Vec<String> {
    let doc: Value =
        serde_json::from_str(&std::fs::read_to_string(&config.runtime_config_path).unwrap())
            .unwrap();
    doc["agents"]["list"]
        .as_array()
        .unwrap()
        .iter()
        .map(|e| e["id"].as_str().unwrap().to_string())
        .collect()
}

#[tokio::test]
async fn one_shot_commands_on_one_root_keep_every_agent() {
    let root = tempfile::tempdir().unwrap();
    let blobs = tempfile::tempdir().unwrap();
    let port = free_port().await;
    let runtime = serve_health(port).await;
    let config = local_config(root.path(), blobs.path(), port);

    let a = lifecycle::connect(&config).await.unwrap();
    let b = lifecycle::connect(&config).await.unwrap();

    let (id1, id2) = (AgentId::new("u1"), AgentId::new("u2"));
    let (u1, u2) = tokio::join!(
        a.control.provision(&id1),
        b.control.provision(&id2),
    );
    assert_eq!(u1.unwrap().state, LifecycleState::Running);
    assert_eq!(u2.unwrap().state, LifecycleState::Running);
    assert_eq!(listed_ids(&config), vec!["u1", "u2"]);

    // A later rewrite from either side still lists both
    a.local.as_ref().unwrap().registry.write_runtime_config().await.unwrap();
    assert_eq!(listed_ids(&config), vec!["u1", "u2"]);

    runtime.abort();
}

#[tokio::test]
async fn daemon_snapshots_agents_provisioned_from_the_cli() {
    let root = tempfile::tempdir().unwrap();
    let blobs = tempfile::tempdir().unwrap();
    let port = free_port().await;
    let runtime = serve_health(port).await;
    let config = local_config(root.path(), blobs.path(), port);

    let daemon = lifecycle::startup(&config).await.unwrap();
    let cli = lifecycle::connect(&config).await.unwrap();

    let bob = AgentId::new("bob");
    cli.control.provision(&bob).await.unwrap();
    write_tree(&config.layout().workspace_dir(&bob), &[("notes.txt", b"from the cli\n")]);

    assert_eq!(daemon.services.snapshot_registered().await, 1);
    assert!(blobs.path().join(PREFIX).join("bob/workspace.tar.gz").is_file());

    daemon.shutdown().await.unwrap();
    runtime.abort();
}

#[tokio::test]
async fn one_shot_provision_without_a_runtime_spawns_nothing() {
    let root = tempfile::tempdir().unwrap();
    let blobs = tempfile::tempdir().unwrap();
    let port = free_port().await;
    let mut config = local_config(root.path(), blobs.path(), port);
    let spawned = root.path().join("spawned");
    config.supervisor.args =
        vec!["-c".to_string(), format!("touch {}; sleep 5", spawned.display())];

    let cli = lifecycle::connect(&config).await.unwrap();
    let err = cli.control.provision(&AgentId::new("carol")).await.unwrap_err();
    assert!(matches!(err, ControlError::Supervisor(SupervisorError::NotRunning { .. })));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!spawned.exists());
    assert_eq!(
        cli.control.status(&AgentId::new("carol")).await.unwrap(),
        ProvisionStatus::stopped()
    );
}
