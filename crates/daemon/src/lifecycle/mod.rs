// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane lifecycle management: configuration, startup, shutdown.

mod startup;
pub use startup::{connect, startup};

use std::collections::BTreeSet;
use std::fs::File;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::{info, warn};
use warden_core::{AgentId, StateLayout};
use warden_storage::{RecordError, SyncEngine};

use crate::control::ControlPlane;
use crate::orchestrator::OrchestratorError;
use crate::provisioner::ProvisionerConfig;
use crate::registry::{Registry, RegistryConfig};
use crate::supervisor::{Supervisor, SupervisorConfig, SupervisorError};

/// Where agent compute runs, chosen once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// One supervised runtime on this host serves every agent
    Local,
    /// One orchestrated task per user
    Remote,
}

warden_core::simple_display! {
    Mode {
        Local => "local",
        Remote => "remote",
    }
}

impl FromStr for Mode {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        [Mode::Local, Mode::Remote]
            .into_iter()
            .find(|mode| mode.as_str() == wanted)
            .ok_or(LifecycleError::InvalidMode(wanted))
    }
}

/// Control-plane configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Root state directory (e.g. ~/.local/state/warden)
    pub state_dir: PathBuf,
    pub mode: Mode,
    /// Path to lock/PID file
    pub lock_path: PathBuf,
    /// Path to control-plane log file
    pub log_path: PathBuf,
    pub base_config_path: PathBuf,
    pub integrations_path: PathBuf,
    /// Derived config the runtime reads
    pub runtime_config_path: PathBuf,
    pub blob_dir: PathBuf,
    pub blob_prefix: String,
    pub restore_concurrency: usize,
    /// Bound on each blob store, record store, and orchestrator call
    pub call_timeout: Duration,
    /// Periodic snapshot interval while serving; `None` disables
    pub snapshot_interval: Option<Duration>,
    /// SQLite record store (remote mode)
    pub db_path: PathBuf,
    pub k8s_namespace: String,
    pub k8s_image: String,
    pub supervisor: SupervisorConfig,
    pub provisioner: ProvisionerConfig,
}

impl Config {
    /// Load configuration from the environment.
    ///
    /// Uses paths under `~/.local/state/warden/` (or `$XDG_STATE_HOME/warden/`)
    /// unless `WARDEN_STATE_DIR` says otherwise.
    pub fn load() -> Result<Self, LifecycleError> {
        let state_dir = crate::env::state_dir()?;
        let mut config = Self::for_state_dir(state_dir);
        config.mode = crate::env::mode()?;
        Ok(config)
    }

    /// Configuration rooted at `state_dir`, with other settings taken from
    /// the environment and local mode.
    pub fn for_state_dir(state_dir: PathBuf) -> Self {
        use crate::env;

        let runtime_config_path = state_dir.join("runtime-config.json");
        let call_timeout = env::call_timeout();
        Self {
            mode: Mode::Local,
            lock_path: state_dir.join("wardend.pid"),
            log_path: state_dir.join("wardend.log"),
            base_config_path: env::base_config(&state_dir),
            integrations_path: env::integrations(&state_dir),
            blob_dir: env::blob_dir(&state_dir),
            blob_prefix: env::blob_prefix(),
            restore_concurrency: env::restore_concurrency(),
            call_timeout,
            snapshot_interval: env::snapshot_interval(),
            db_path: env::db_path(&state_dir),
            k8s_namespace: env::k8s_namespace(),
            k8s_image: env::k8s_image(),
            supervisor: SupervisorConfig {
                bin: env::runtime_bin(),
                args: env::runtime_args(),
                port: env::runtime_port(),
                token: env::runtime_token(),
                runtime_config: runtime_config_path.clone(),
                cwd: state_dir.clone(),
                health_poll: env::health_poll(),
                health_timeout: env::health_timeout(),
            },
            provisioner: ProvisionerConfig { task_port: env::task_port(), call_timeout },
            runtime_config_path,
            state_dir,
        }
    }

    pub fn layout(&self) -> StateLayout {
        StateLayout::new(&self.state_dir)
    }

    pub(crate) fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            layout: self.layout(),
            base_config: self.base_config_path.clone(),
            integrations: self.integrations_path.clone(),
            runtime_config: self.runtime_config_path.clone(),
        }
    }
}

/// Local-mode pieces the daemon drives directly.
#[derive(Clone)]
pub struct LocalRuntime {
    pub supervisor: Arc<Supervisor>,
    pub registry: Registry,
}

/// Everything a command needs to act on agents.
#[derive(Clone)]
pub struct Services {
    pub control: Arc<dyn ControlPlane>,
    pub sync: SyncEngine,
    pub layout: StateLayout,
    /// Present in local mode
    pub local: Option<LocalRuntime>,
}

impl Services {
    /// Snapshot every registered agent (local mode). Returns how many
    /// snapshots succeeded.
    ///
    /// Agents provisioned by one-shot commands live only on disk until this
    /// process rewrites the runtime config, so the on-disk set is included.
    pub async fn snapshot_registered(&self) -> usize {
        let Some(ref local) = self.local else { return 0 };
        let mut agents: BTreeSet<AgentId> = match local.registry.list().await {
            Ok(agents) => agents.into_iter().collect(),
            Err(e) => {
                warn!(error = %e, "failed to list registered agents");
                BTreeSet::new()
            }
        };
        match self.layout.discover_agents() {
            Ok(found) => agents.extend(found.into_iter().filter(|id| id.validate().is_ok())),
            Err(e) => warn!(error = %e, "failed to discover agents on disk"),
        }
        let agents: Vec<AgentId> = agents.into_iter().collect();
        if agents.is_empty() {
            return 0;
        }
        let ok = self.sync.snapshot_all(&agents, &self.layout).await;
        info!(ok, total = agents.len(), "snapshotted registered agents");
        ok
    }
}

/// Control-plane state while serving.
pub struct Daemon {
    pub config: Config,
    // NOTE(lifetime): Held to maintain exclusive file lock; released on drop
    #[allow(dead_code)]
    lock_file: File,
    pub services: Services,
    /// When the control plane started
    pub start_time: Instant,
}

impl Daemon {
    /// Periodically snapshot registered agents until the task is aborted.
    pub fn spawn_snapshot_loop(&self) -> Option<tokio::task::JoinHandle<()>> {
        let interval = self.config.snapshot_interval?;
        self.services.local.as_ref()?;
        let services = self.services.clone();
        Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                services.snapshot_registered().await;
            }
        }))
    }

    /// Shutdown the control plane gracefully.
    ///
    /// Takes a final snapshot of every registered agent and asks an owned
    /// runtime to stop. Remote tasks are left running.
    pub async fn shutdown(self) -> Result<(), LifecycleError> {
        info!("Shutting down control plane...");

        self.services.snapshot_registered().await;

        if let Some(ref local) = self.services.local {
            local.supervisor.stop().await;
        }

        if self.config.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.config.lock_path) {
                warn!("Failed to remove PID file: {}", e);
            }
        }

        info!(uptime_secs = self.start_time.elapsed().as_secs(), "Control plane shutdown complete");
        Ok(())
    }
}

/// Lifecycle errors
#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("Could not determine state directory")]
    NoStateDir,

    #[error("Invalid WARDEN_MODE {0:?} (expected \"local\" or \"remote\")")]
    InvalidMode(String),

    #[error("Failed to acquire lock: control plane already running?")]
    LockFailed(#[source] std::io::Error),

    #[error("Runtime failed to start: {0}")]
    Supervisor(#[from] SupervisorError),

    #[error("Record store error: {0}")]
    Records(#[from] RecordError),

    #[error("Orchestrator error: {0}")]
    Orchestrator(#[from] OrchestratorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
