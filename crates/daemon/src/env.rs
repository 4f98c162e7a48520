// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::lifecycle::{LifecycleError, Mode};

fn parsed<T: FromStr>(var: &str) -> Option<T> {
    std::env::var(var).ok().and_then(|s| s.trim().parse::<T>().ok())
}

fn millis(var: &str, default_ms: u64) -> Duration {
    Duration::from_millis(parsed::<u64>(var).unwrap_or(default_ms))
}

fn path_or(var: &str, default: PathBuf) -> PathBuf {
    std::env::var(var).ok().filter(|s| !s.is_empty()).map(PathBuf::from).unwrap_or(default)
}

/// Resolve state directory: WARDEN_STATE_DIR > XDG_STATE_HOME/warden > ~/.local/state/warden
pub fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("WARDEN_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("warden"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/warden"))
}

/// Deployment mode (default `local`).
pub fn mode() -> Result<Mode, LifecycleError> {
    match std::env::var("WARDEN_MODE") {
        Ok(value) if !value.is_empty() => value.parse(),
        _ => Ok(Mode::Local),
    }
}

/// Supervised runtime binary
pub fn runtime_bin() -> String {
    std::env::var("WARDEN_RUNTIME_BIN").unwrap_or_else(|_| "openclaw".to_string())
}

/// Runtime arguments, whitespace-separated. `--port <port>` is appended.
pub fn runtime_args() -> Vec<String> {
    std::env::var("WARDEN_RUNTIME_ARGS")
        .unwrap_or_else(|_| "gateway --bind loopback --allow-unconfigured".to_string())
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

pub fn runtime_port() -> u16 {
    parsed("WARDEN_RUNTIME_PORT").unwrap_or(18789)
}

/// Token handed to the runtime for its gateway API.
pub fn runtime_token() -> String {
    std::env::var("WARDEN_RUNTIME_TOKEN")
        .ok()
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "warden-internal".to_string())
}

pub fn base_config(state_dir: &Path) -> PathBuf {
    path_or("WARDEN_BASE_CONFIG", state_dir.join("base-config.json"))
}

pub fn integrations(state_dir: &Path) -> PathBuf {
    path_or("WARDEN_INTEGRATIONS", state_dir.join("integrations.toml"))
}

/// Interval between health probes while the runtime starts.
pub fn health_poll() -> Duration {
    millis("WARDEN_HEALTH_POLL_MS", 1_000)
}

/// How long the runtime has to answer its health probe (default 60s).
pub fn health_timeout() -> Duration {
    millis("WARDEN_HEALTH_TIMEOUT_MS", 60_000)
}

pub fn blob_dir(state_dir: &Path) -> PathBuf {
    path_or("WARDEN_BLOB_DIR", state_dir.join("blobs"))
}

/// Key prefix for archived artifacts
pub fn blob_prefix() -> String {
    std::env::var("WARDEN_BLOB_PREFIX")
        .ok()
        .filter(|s| !s.trim_matches('/').is_empty())
        .unwrap_or_else(|| "agent-state".to_string())
}

/// Upper bound on agents restored in parallel at boot.
pub fn restore_concurrency() -> usize {
    parsed::<usize>("WARDEN_RESTORE_CONCURRENCY").filter(|n| *n > 0).unwrap_or(8)
}

/// Timeout applied to each orchestrator and store call.
pub fn call_timeout() -> Duration {
    millis("WARDEN_CALL_TIMEOUT_MS", 30_000)
}

/// Periodic snapshot interval for `serve`. `0` disables.
pub fn snapshot_interval() -> Option<Duration> {
    Some(millis("WARDEN_SNAPSHOT_INTERVAL_MS", 300_000)).filter(|d| !d.is_zero())
}

pub fn db_path(state_dir: &Path) -> PathBuf {
    path_or("WARDEN_DB_PATH", state_dir.join("records.db"))
}

/// Kubernetes namespace for remote tasks.
pub fn k8s_namespace() -> String {
    std::env::var("WARDEN_K8S_NAMESPACE").unwrap_or_else(|_| "default".to_string())
}

/// Container image for remote tasks.
pub fn k8s_image() -> String {
    std::env::var("WARDEN_K8S_IMAGE").unwrap_or_else(|_| "warden-agent:latest".to_string())
}

/// Port remote tasks serve on.
pub fn task_port() -> u16 {
    parsed("WARDEN_TASK_PORT").unwrap_or(3001)
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
