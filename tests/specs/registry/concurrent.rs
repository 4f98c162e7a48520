//! Concurrent registration specs
//!
//! Many simultaneous registrations leave exactly one runtime config entry
//! per agent, on top of the operator's base config and integrations.

use serde_json::Value;
use warden_daemon::{Registry, RegistryConfig};

use crate::prelude::*;

fn registry_config(root: &std::path::Path) -> RegistryConfig {
    RegistryConfig {
        layout: StateLayout::new(root),
        base_config: root.join("etc/base-config.json"),
        integrations: root.join("etc/integrations.toml"),
        runtime_config: root.join("runtime-config.json"),
    }
}

#[tokio::test]
async fn concurrent_registration_keeps_one_entry_per_agent() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_tree(
        root,
        &[
            (
                "etc/base-config.json",
                br#"{
                    "agents": {"list": [{"id": "operator", "workspace": "./operator-ws"}]},
                    "plugins": {"path": "../plugins"}
                }"#,
            ),
            (
                "etc/integrations.toml",
                b"[[integration]]\nid = \"plaid\"\nenabled = true\ntool_patterns = [\"plaid_*\"]\n\n\
                  [[integration]]\nid = \"ibkr\"\nenabled = false\ntool_patterns = [\"ibkr_*\"]\n",
            ),
        ],
    );
    let config = registry_config(root);
    let registry = Registry::spawn(config.clone(), Vec::<AgentId>::new());

    let mut calls = Vec::new();
    for _ in 0..5 {
        for user in 0..12 {
            let registry = registry.clone();
            let id = AgentId::new(format!("user-{user:02}"));
            calls.push(tokio::spawn(async move { registry.register(&id).await }));
        }
    }
    let mut added = 0;
    for call in calls {
        if call.await.unwrap().unwrap() {
            added += 1;
        }
    }
    assert_eq!(added, 12);

    let doc: Value =
        serde_json::from_str(&std::fs::read_to_string(&config.runtime_config).unwrap()).unwrap();
    let list = doc["agents"]["list"].as_array().unwrap();
    let ids: Vec<&str> = list.iter().map(|e| e["id"].as_str().unwrap()).collect();
    let mut expected = vec!["operator".to_string()];
    expected.extend((0..12).map(|u| format!("user-{u:02}")));
    assert_eq!(ids, expected);

    // Relative base paths resolve against the base config's directory
    let etc = root.join("etc");
    assert_eq!(list[0]["workspace"], etc.join("operator-ws").display().to_string());
    assert_eq!(doc["plugins"]["path"], root.join("plugins").display().to_string());

    let layout = StateLayout::new(root);
    let alice = AgentId::new("user-00");
    assert_eq!(list[1]["agentDir"], layout.agent_dir(&alice).display().to_string());
    assert_eq!(list[1]["workspace"], layout.workspace_dir(&alice).display().to_string());
    assert!(layout.sessions_dir(&alice).is_dir());

    assert_eq!(doc["tools"]["allow"], serde_json::json!(["plaid_*"]));
    assert_eq!(registry.list().await.unwrap().len(), 12);
}

#[tokio::test]
async fn invalid_ids_are_rejected_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let config = registry_config(dir.path());
    let registry = Registry::spawn(config.clone(), Vec::<AgentId>::new());

    for bad in ["", ".", "..", "a/b", "a\\b"] {
        assert!(registry.register(&AgentId::new(bad)).await.is_err(), "{bad:?} accepted");
    }
    assert!(registry.list().await.unwrap().is_empty());
    assert!(!config.runtime_config.exists());
}
