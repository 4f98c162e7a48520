// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane startup and initialization logic.

use std::io::Write;
use std::sync::Arc;
use std::time::Instant;

use fs2::FileExt;
use tracing::{info, warn};
use warden_core::StateLayout;
use warden_storage::{FsBlobStore, SqliteRecordStore, SyncEngine};

use crate::control::{LocalControlPlane, RemoteControlPlane};
use crate::orchestrator::KubernetesOrchestrator;
use crate::provisioner::TaskProvisioner;
use crate::registry::Registry;
use crate::supervisor::{Supervisor, SupervisorConfig};

use super::{Config, Daemon, LifecycleError, LocalRuntime, Mode, Services};

/// Start the control plane
pub async fn startup(config: &Config) -> Result<Daemon, LifecycleError> {
    match startup_inner(config).await {
        Ok(daemon) => Ok(daemon),
        Err(e) => {
            // Don't clean up if we failed to acquire the lock;
            // the PID file belongs to the already-running control plane.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(config);
            }
            Err(e)
        }
    }
}

/// Build services for a one-shot command without taking the lock.
///
/// The command only uses a runtime that is already running; it never spawns
/// one, since nothing would own the process once the command exits.
pub async fn connect(config: &Config) -> Result<Services, LifecycleError> {
    std::fs::create_dir_all(&config.state_dir)?;
    build_services(config, build_sync(config), config.layout(), Supervisor::adopt_only).await
}

/// Inner startup logic - cleanup_on_failure called if this fails
async fn startup_inner(config: &Config) -> Result<Daemon, LifecycleError> {
    // 1. Create state directory
    std::fs::create_dir_all(&config.state_dir)?;

    // 2. Acquire lock file FIRST - prevents races
    // Use OpenOptions to avoid truncating the file before we hold the lock,
    // which would wipe the running control plane's PID.
    let lock_file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(false)
        .open(&config.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;

    let mut lock_file = lock_file;
    lock_file.set_len(0)?;
    writeln!(lock_file, "{}", std::process::id())?;
    let lock_file = lock_file;

    // 3. Restore agent state before anything reads agent directories.
    // A failed restore never blocks boot.
    let sync = build_sync(config);
    let layout = config.layout();
    if config.mode == Mode::Local {
        match sync.restore_all(&layout).await {
            Ok(restored) => info!(restored, "restored agent state"),
            Err(e) => warn!(error = %e, "restore at boot failed, starting fresh"),
        }
    }

    // 4. Wire the control plane for the configured mode
    let services = build_services(config, sync, layout, Supervisor::new).await?;

    // 5. Local mode needs a healthy runtime to serve anything
    if let Some(ref local) = services.local {
        local.supervisor.start().await?;
    }

    info!(mode = %config.mode, state_dir = %config.state_dir.display(), "Control plane started");

    Ok(Daemon { config: config.clone(), lock_file, services, start_time: Instant::now() })
}

fn build_sync(config: &Config) -> SyncEngine {
    let store = FsBlobStore::new(&config.blob_dir);
    SyncEngine::new(Arc::new(store), config.blob_prefix.clone())
        .with_concurrency(config.restore_concurrency)
        .with_call_timeout(config.call_timeout)
}

async fn build_services(
    config: &Config,
    sync: SyncEngine,
    layout: StateLayout,
    supervisor: fn(SupervisorConfig, Registry) -> Supervisor,
) -> Result<Services, LifecycleError> {
    match config.mode {
        Mode::Local => {
            let seed = layout.discover_agents()?;
            info!(agents = seed.len(), "discovered agents on disk");

            let registry = Registry::spawn(config.registry_config(), seed);
            let supervisor = Arc::new(supervisor(config.supervisor.clone(), registry.clone()));
            let control = LocalControlPlane::new(
                Arc::clone(&supervisor),
                registry.clone(),
                sync.clone(),
                layout.clone(),
            );
            Ok(Services {
                control: Arc::new(control),
                sync,
                layout,
                local: Some(LocalRuntime { supervisor, registry }),
            })
        }
        Mode::Remote => {
            let orchestrator =
                KubernetesOrchestrator::new(&config.k8s_namespace, &config.k8s_image).await?;
            let records = SqliteRecordStore::open(&config.db_path)?;
            let provisioner = TaskProvisioner::new(
                Arc::new(orchestrator),
                Arc::new(records),
                config.provisioner.clone(),
            );
            Ok(Services {
                control: Arc::new(RemoteControlPlane::new(Arc::new(provisioner))),
                sync,
                layout,
                local: None,
            })
        }
    }
}

/// Clean up resources on startup failure
fn cleanup_on_failure(config: &Config) {
    if config.lock_path.exists() {
        let _ = std::fs::remove_file(&config.lock_path);
    }
}

#[cfg(test)]
#[path = "startup_tests.rs"]
mod tests;
