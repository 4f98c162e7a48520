// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent registry: the single writer of the registered set and the runtime
//! config file.
//!
//! One task owns both; callers talk to it through a cloneable [`Registry`]
//! handle. Requests are processed strictly in arrival order, so concurrent
//! registrations never lose entries and never duplicate them.
//!
//! One-shot CLI commands run their own registry against the same state root.
//! Every rewrite therefore holds an exclusive lock on a sibling `.lock` file
//! and lists the union of this task's set and the agent directories on disk.
//! Registration creates the directories before rewriting, so the last writer
//! always sees every agent registered by any process.

use std::collections::BTreeSet;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use warden_core::{AgentId, StateLayout};

use crate::integrations::Integrations;
use crate::runtime_config::{self, BaseConfig, RuntimeConfigError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("invalid agent id {0:?}")]
    InvalidId(String),

    #[error("failed to lock {}: {source}", path.display())]
    Lock { path: PathBuf, source: std::io::Error },

    #[error("registry task is not running")]
    Closed,

    #[error("runtime config error: {0}")]
    Config(#[from] RuntimeConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Inputs the registry regenerates the runtime config from.
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    pub layout: StateLayout,
    pub base_config: PathBuf,
    pub integrations: PathBuf,
    pub runtime_config: PathBuf,
}

enum Request {
    Register { id: AgentId, reply: oneshot::Sender<Result<bool, RegistryError>> },
    Contains { id: AgentId, reply: oneshot::Sender<bool> },
    List { reply: oneshot::Sender<Vec<AgentId>> },
    Rewrite { reply: oneshot::Sender<Result<PathBuf, RegistryError>> },
}

/// Handle to the registry task.
#[derive(Clone)]
pub struct Registry {
    tx: mpsc::Sender<Request>,
}

impl Registry {
    /// Spawn the registry task seeded with already-known agents.
    ///
    /// Seeding does no I/O; the config is written on the first
    /// [`Registry::write_runtime_config`] or new registration.
    pub fn spawn(config: RegistryConfig, seed: impl IntoIterator<Item = AgentId>) -> Self {
        let (tx, rx) = mpsc::channel(64);
        let actor = RegistryActor { config, agents: seed.into_iter().collect() };
        tokio::spawn(actor.run(rx));
        Self { tx }
    }

    /// Register `id`. Returns `true` when newly added, `false` when it was
    /// already registered (in which case nothing is touched).
    pub async fn register(&self, id: &AgentId) -> Result<bool, RegistryError> {
        validate(id)?;
        let (reply, rx) = oneshot::channel();
        self.send(Request::Register { id: id.clone(), reply }).await?;
        rx.await.map_err(|_| RegistryError::Closed)?
    }

    pub async fn contains(&self, id: &AgentId) -> Result<bool, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Contains { id: id.clone(), reply }).await?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Registered agents, sorted.
    pub async fn list(&self) -> Result<Vec<AgentId>, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::List { reply }).await?;
        rx.await.map_err(|_| RegistryError::Closed)
    }

    /// Regenerate the runtime config from the current set and integrations.
    pub async fn write_runtime_config(&self) -> Result<PathBuf, RegistryError> {
        let (reply, rx) = oneshot::channel();
        self.send(Request::Rewrite { reply }).await?;
        rx.await.map_err(|_| RegistryError::Closed)?
    }

    async fn send(&self, request: Request) -> Result<(), RegistryError> {
        self.tx.send(request).await.map_err(|_| RegistryError::Closed)
    }
}

fn validate(id: &AgentId) -> Result<(), RegistryError> {
    id.validate().map_err(|e| RegistryError::InvalidId(e.0))
}

/// `runtime-config.json` -> `runtime-config.json.lock`
fn lock_path(runtime_config: &Path) -> PathBuf {
    let mut name = OsString::from(runtime_config.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

struct RegistryActor {
    config: RegistryConfig,
    agents: BTreeSet<AgentId>,
}

impl RegistryActor {
    async fn run(mut self, mut rx: mpsc::Receiver<Request>) {
        while let Some(request) = rx.recv().await {
            match request {
                Request::Register { id, reply } => {
                    let _ = reply.send(self.register(id).await);
                }
                Request::Contains { id, reply } => {
                    let _ = reply.send(self.agents.contains(&id));
                }
                Request::List { reply } => {
                    let _ = reply.send(self.agents.iter().cloned().collect());
                }
                Request::Rewrite { reply } => {
                    let _ = reply.send(self.rewrite().await);
                }
            }
        }
        tracing::debug!("registry task stopped");
    }

    async fn register(&mut self, id: AgentId) -> Result<bool, RegistryError> {
        if self.agents.contains(&id) {
            return Ok(false);
        }

        let layout = &self.config.layout;
        tokio::fs::create_dir_all(layout.sessions_dir(&id)).await?;
        tokio::fs::create_dir_all(layout.workspace_dir(&id)).await?;

        self.agents.insert(id.clone());
        if let Err(e) = self.rewrite().await {
            self.agents.remove(&id);
            return Err(e);
        }
        tracing::info!(agent_id = %id, total = self.agents.len(), "agent registered");
        Ok(true)
    }

    async fn rewrite(&mut self) -> Result<PathBuf, RegistryError> {
        let config = self.config.clone();
        let agents = self.agents.clone();
        let merged = tokio::task::spawn_blocking(move || rewrite_locked(&config, agents))
            .await
            .map_err(|e| RegistryError::Io(std::io::Error::other(e.to_string())))??;

        let discovered = merged.len() - self.agents.len();
        if discovered > 0 {
            tracing::debug!(discovered, "picked up agents registered by another process");
        }
        self.agents = merged;
        Ok(self.config.runtime_config.clone())
    }
}

/// Regenerate the runtime config under the cross-process lock. Returns the
/// full set that was written.
fn rewrite_locked(
    config: &RegistryConfig,
    mut agents: BTreeSet<AgentId>,
) -> Result<BTreeSet<AgentId>, RegistryError> {
    let path = lock_path(&config.runtime_config);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let lock_file = std::fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(&path)
        .map_err(|source| RegistryError::Lock { path: path.clone(), source })?;
    lock_file.lock_exclusive().map_err(|source| RegistryError::Lock { path, source })?;

    for id in config.layout.discover_agents()? {
        if id.validate().is_ok() {
            agents.insert(id);
        }
    }

    let base = BaseConfig::load(&config.base_config)?;
    let patterns = Integrations::load(&config.integrations)?.enabled_tool_patterns();
    let document = runtime_config::build(&base, &config.layout, &agents, &patterns)?;
    runtime_config::write(&config.runtime_config, &document)?;
    // Lock released when `lock_file` drops
    Ok(agents)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
