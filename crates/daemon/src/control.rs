// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane façade: one interface over local and remote compute.
//!
//! [`LocalControlPlane`] runs every user inside the single supervised
//! runtime on this host and answers `running` as soon as the runtime is
//! healthy. [`RemoteControlPlane`] hands each user their own task through
//! the [`TaskProvisioner`] and converges asynchronously via `status`.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use warden_core::{
    AgentId, Clock, Endpoint, InvalidAgentId, ProvisionStatus, StateLayout, SystemClock,
};
use warden_storage::SyncEngine;

use crate::provisioner::{ProvisionError, TaskProvisioner};
use crate::registry::{Registry, RegistryError};
use crate::supervisor::{Supervisor, SupervisorError};

#[derive(Debug, Error)]
pub enum ControlError {
    #[error(transparent)]
    InvalidAgentId(#[from] InvalidAgentId),

    #[error(transparent)]
    Supervisor(#[from] SupervisorError),

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Provision(#[from] ProvisionError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Provision, inspect, and tear down a user's agent environment.
#[async_trait]
pub trait ControlPlane: Send + Sync {
    async fn provision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError>;

    async fn status(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError>;

    async fn deprovision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError>;

    /// Reachable endpoint, only while running.
    async fn endpoint(&self, agent_id: &AgentId) -> Result<Option<Endpoint>, ControlError>;
}

/// Single-host control plane over the supervised runtime.
///
/// The provisioned user is persisted in a marker file so status survives a
/// control-plane restart.
pub struct LocalControlPlane {
    supervisor: Arc<Supervisor>,
    registry: Registry,
    sync: SyncEngine,
    layout: StateLayout,
    marker: PathBuf,
    op: tokio::sync::Mutex<()>,
}

impl LocalControlPlane {
    pub fn new(
        supervisor: Arc<Supervisor>,
        registry: Registry,
        sync: SyncEngine,
        layout: StateLayout,
    ) -> Self {
        let marker = layout.root().join("local-user");
        Self { supervisor, registry, sync, layout, marker, op: tokio::sync::Mutex::new(()) }
    }

    fn endpoint_now(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.supervisor.port())
    }

    fn read_marker(&self) -> Result<Option<AgentId>, ControlError> {
        match std::fs::read_to_string(&self.marker) {
            Ok(s) => {
                let id = s.trim();
                Ok((!id.is_empty()).then(|| AgentId::new(id)))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn is_marked(&self, agent_id: &AgentId) -> Result<bool, ControlError> {
        Ok(self.read_marker()?.as_ref() == Some(agent_id))
    }
}

#[async_trait]
impl ControlPlane for LocalControlPlane {
    async fn provision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        // Before the restore writes under the agent's directories
        agent_id.validate()?;
        let _op = self.op.lock().await;

        if self.is_marked(agent_id)? && self.supervisor.is_healthy() {
            return Ok(ProvisionStatus::running(Some(self.endpoint_now())));
        }

        match self.sync.restore_agent(agent_id, &self.layout).await {
            Ok(outcome) if outcome.any() => tracing::info!(%agent_id, "agent state restored"),
            Ok(_) => tracing::debug!(%agent_id, "no snapshot, starting fresh"),
            Err(e) => {
                tracing::warn!(%agent_id, error = %e, "restore failed, starting fresh");
            }
        }

        // An agent seeded from disk is already registered, but an adopted
        // runtime may never have seen a config that lists it
        if !self.registry.register(agent_id).await? {
            self.registry.write_runtime_config().await?;
        }
        self.supervisor.restart().await?;
        std::fs::write(&self.marker, agent_id.as_str())?;

        let endpoint = self.endpoint_now();
        tracing::info!(%agent_id, %endpoint, "agent running locally");
        Ok(ProvisionStatus::running(Some(endpoint)))
    }

    async fn status(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        if self.is_marked(agent_id)? {
            Ok(ProvisionStatus::running(Some(self.endpoint_now())))
        } else {
            Ok(ProvisionStatus::stopped())
        }
    }

    async fn deprovision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        agent_id.validate()?;
        let _op = self.op.lock().await;

        if !self.is_marked(agent_id)? {
            return Ok(ProvisionStatus::stopped());
        }

        if let Err(e) = self.sync.snapshot_agent(agent_id, &self.layout).await {
            tracing::warn!(%agent_id, error = %e, "snapshot before deprovision failed");
        }
        match std::fs::remove_file(&self.marker) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        tracing::info!(%agent_id, "agent deprovisioned");
        Ok(ProvisionStatus::stopped())
    }

    async fn endpoint(&self, agent_id: &AgentId) -> Result<Option<Endpoint>, ControlError> {
        Ok(self.status(agent_id).await?.endpoint)
    }
}

/// Per-user remote tasks through the provisioner.
pub struct RemoteControlPlane<C: Clock = SystemClock> {
    provisioner: Arc<TaskProvisioner<C>>,
}

impl<C: Clock> RemoteControlPlane<C> {
    pub fn new(provisioner: Arc<TaskProvisioner<C>>) -> Self {
        Self { provisioner }
    }
}

#[async_trait]
impl<C: Clock> ControlPlane for RemoteControlPlane<C> {
    async fn provision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        Ok(self.provisioner.provision(agent_id).await?)
    }

    async fn status(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        Ok(self.provisioner.resolve_status(agent_id).await?)
    }

    async fn deprovision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ControlError> {
        Ok(self.provisioner.deprovision(agent_id).await?)
    }

    async fn endpoint(&self, agent_id: &AgentId) -> Result<Option<Endpoint>, ControlError> {
        Ok(self.provisioner.resolve_endpoint(agent_id).await?)
    }
}

#[cfg(test)]
#[path = "control_tests.rs"]
mod tests;
