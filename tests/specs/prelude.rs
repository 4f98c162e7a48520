//! Shared fixtures for end-to-end scenarios.

#![allow(dead_code)]

use std::path::Path;

pub use std::sync::Arc;
pub use std::time::Duration;

pub use warden_core::{AgentId, Endpoint, LifecycleState, ProvisionStatus, StateLayout};
pub use warden_daemon::lifecycle::{self, Config};
pub use warden_daemon::ControlPlane;
pub use warden_storage::{FsBlobStore, MemoryBlobStore, SyncEngine};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

pub const PREFIX: &str = "agent-state";

/// An unused loopback port.
pub async fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// Answer `GET /health` with 200 on `port` until the task is aborted.
pub async fn serve_health(port: u16) -> tokio::task::JoinHandle<()> {
    let listener = TcpListener::bind(("127.0.0.1", port)).await.unwrap();
    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let mut buf = [0u8; 1024];
                let _ = socket.read(&mut buf).await;
                let _ = socket.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nok").await;
            });
        }
    })
}

/// Write `files` (relative path, contents) under `root`.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, contents).unwrap();
    }
}

/// Every regular file under `root` as (relative path, contents), sorted.
pub fn read_tree(root: &Path) -> Vec<(String, Vec<u8>)> {
    fn walk(root: &Path, dir: &Path, out: &mut Vec<(String, Vec<u8>)>) {
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                walk(root, &path, out);
            } else {
                let rel = path.strip_prefix(root).unwrap().display().to_string();
                out.push((rel, std::fs::read(&path).unwrap()));
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Local-mode config rooted at `state_dir` whose runtime is already being
/// served on `port`, sharing `blob_dir` with other roots.
pub fn local_config(state_dir: &Path, blob_dir: &Path, port: u16) -> Config {
    let mut config = Config::for_state_dir(state_dir.to_path_buf());
    config.blob_dir = blob_dir.to_path_buf();
    config.blob_prefix = PREFIX.to_string();
    config.snapshot_interval = None;
    config.supervisor.bin = "sh".to_string();
    config.supervisor.args = vec!["-c".to_string(), "exit 1".to_string()];
    config.supervisor.port = port;
    config.supervisor.health_poll = Duration::from_millis(50);
    config.supervisor.health_timeout = Duration::from_secs(2);
    config
}
