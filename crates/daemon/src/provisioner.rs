// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-user provisioning state machine over the remote orchestrator.
//!
//! Each user has at most one [`AgentRecord`]. `provision` allocates a task
//! and persists `provisioning`; `resolve_status` polls the task and moves the
//! record to `running` or `stopped`; `deprovision` tears the task down.
//!
//! Operations for the same user are serialized on a per-user lock, so
//! concurrent provision calls allocate once. Different users proceed in
//! parallel.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thiserror::Error;
use warden_core::{
    AgentId, AgentRecord, Clock, Endpoint, LifecycleState, ProvisionStatus, RecordPatch,
    SystemClock,
};
use warden_storage::{RecordError, RecordStore};

use crate::orchestrator::{Orchestrator, OrchestratorError, TaskRequest, TaskStatus};

#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("orchestrator returned no task handle for {0}")]
    AllocationFailed(AgentId),

    #[error("invariant violated for {agent_id}: {reason}")]
    InvariantViolation { agent_id: AgentId, reason: &'static str },

    #[error(transparent)]
    Orchestrator(#[from] OrchestratorError),

    #[error("record store: {0}")]
    Store(#[from] RecordError),

    #[error("{op} timed out after {ms}ms")]
    Timeout { op: &'static str, ms: u64 },
}

#[derive(Debug, Clone)]
pub struct ProvisionerConfig {
    /// Port every remote task serves on
    pub task_port: u16,
    /// Bound on each orchestrator and record store call
    pub call_timeout: Duration,
}

impl Default for ProvisionerConfig {
    fn default() -> Self {
        Self { task_port: 3001, call_timeout: Duration::from_secs(30) }
    }
}

pub struct TaskProvisioner<C: Clock = SystemClock> {
    orchestrator: Arc<dyn Orchestrator>,
    records: Arc<dyn RecordStore>,
    clock: C,
    config: ProvisionerConfig,
    locks: Mutex<HashMap<AgentId, Arc<tokio::sync::Mutex<()>>>>,
}

impl TaskProvisioner<SystemClock> {
    pub fn new(
        orchestrator: Arc<dyn Orchestrator>,
        records: Arc<dyn RecordStore>,
        config: ProvisionerConfig,
    ) -> Self {
        Self::with_clock(orchestrator, records, config, SystemClock)
    }
}

impl<C: Clock> TaskProvisioner<C> {
    pub fn with_clock(
        orchestrator: Arc<dyn Orchestrator>,
        records: Arc<dyn RecordStore>,
        config: ProvisionerConfig,
        clock: C,
    ) -> Self {
        Self { orchestrator, records, clock, config, locks: Mutex::new(HashMap::new()) }
    }

    /// Request compute for a user. Returns the current status without a new
    /// allocation when the user is already provisioning or running.
    pub async fn provision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ProvisionError> {
        let lock = self.user_lock(agent_id);
        let _guard = lock.lock().await;

        if let Some(record) = self.get_record(agent_id).await? {
            if record.state.is_active() {
                tracing::debug!(%agent_id, state = %record.state, "already provisioned");
                return Ok(record.status());
            }
        }

        let request = TaskRequest { agent_id: agent_id.clone(), port: self.config.task_port };
        let handle = self
            .timed("allocate_task", self.orchestrator.allocate_task(&request))
            .await?
            .ok_or_else(|| ProvisionError::AllocationFailed(agent_id.clone()))?;

        let record = AgentRecord::provisioning(agent_id.clone(), handle, self.clock.epoch_ms());
        self.timed("upsert", self.records.upsert(&record)).await?;

        tracing::info!(%agent_id, task = ?record.task, "task allocated");
        Ok(record.status())
    }

    /// Current status, polling the orchestrator while provisioning.
    pub async fn resolve_status(
        &self,
        agent_id: &AgentId,
    ) -> Result<ProvisionStatus, ProvisionError> {
        let lock = self.user_lock(agent_id);
        let guard = lock.lock().await;
        let result = self.resolve_status_locked(agent_id).await;
        drop(guard);
        if matches!(result, Ok(ref status) if status.state == LifecycleState::Stopped) {
            self.release_lock(agent_id, lock);
        }
        result
    }

    async fn resolve_status_locked(
        &self,
        agent_id: &AgentId,
    ) -> Result<ProvisionStatus, ProvisionError> {
        let Some(record) = self.get_record(agent_id).await? else {
            return Ok(ProvisionStatus::stopped());
        };
        if record.state != LifecycleState::Provisioning {
            return Ok(record.status());
        }

        let Some(ref task) = record.task else {
            return Err(ProvisionError::InvariantViolation {
                agent_id: agent_id.clone(),
                reason: "provisioning record has no task handle",
            });
        };

        let description =
            self.timed("describe_task", self.orchestrator.describe_task(task)).await?;
        match description {
            None => {
                tracing::info!(%agent_id, %task, "task no longer exists");
                self.mark_stopped(agent_id).await
            }
            Some(desc) => match desc.status {
                TaskStatus::Stopped => {
                    tracing::info!(%agent_id, %task, "task stopped");
                    self.mark_stopped(agent_id).await
                }
                TaskStatus::Running => {
                    let Some(address) = desc.address else {
                        return Err(ProvisionError::InvariantViolation {
                            agent_id: agent_id.clone(),
                            reason: "task running without an address",
                        });
                    };
                    let endpoint = Endpoint::new(address, self.config.task_port);
                    tracing::info!(%agent_id, %task, %endpoint, "task running");
                    let patch = RecordPatch::running(endpoint);
                    let updated =
                        self.timed("update", self.records.update(agent_id, &patch)).await?;
                    Ok(updated.status())
                }
                TaskStatus::Pending => Ok(ProvisionStatus::provisioning()),
            },
        }
    }

    /// Tear down a user's compute. Stopping the task is best effort; the
    /// record is marked stopped regardless.
    pub async fn deprovision(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ProvisionError> {
        let lock = self.user_lock(agent_id);
        let guard = lock.lock().await;
        let result = self.deprovision_locked(agent_id).await;
        drop(guard);
        self.release_lock(agent_id, lock);
        result
    }

    async fn deprovision_locked(
        &self,
        agent_id: &AgentId,
    ) -> Result<ProvisionStatus, ProvisionError> {
        let Some(record) = self.get_record(agent_id).await? else {
            return Ok(ProvisionStatus::stopped());
        };
        if record.state == LifecycleState::Stopped {
            return Ok(ProvisionStatus::stopped());
        }

        if let Some(ref task) = record.task {
            match self.timed("stop_task", self.orchestrator.stop_task(task)).await {
                Ok(()) => tracing::info!(%agent_id, %task, "task stopped"),
                Err(e) => tracing::warn!(%agent_id, %task, error = %e, "failed to stop task"),
            }
        }

        self.mark_stopped(agent_id).await
    }

    /// The stored endpoint, present only while running. Never calls the
    /// orchestrator.
    pub async fn resolve_endpoint(
        &self,
        agent_id: &AgentId,
    ) -> Result<Option<Endpoint>, ProvisionError> {
        let record = self.get_record(agent_id).await?;
        Ok(record.and_then(|r| r.status().endpoint))
    }

    async fn get_record(&self, agent_id: &AgentId) -> Result<Option<AgentRecord>, ProvisionError> {
        self.timed("get", self.records.get(agent_id)).await
    }

    async fn mark_stopped(&self, agent_id: &AgentId) -> Result<ProvisionStatus, ProvisionError> {
        let patch = RecordPatch::stopped();
        let updated = self.timed("update", self.records.update(agent_id, &patch)).await?;
        Ok(updated.status())
    }

    fn user_lock(&self, agent_id: &AgentId) -> Arc<tokio::sync::Mutex<()>> {
        self.locks.lock().entry(agent_id.clone()).or_default().clone()
    }

    /// Drop the user's lock entry unless another caller holds or awaits it.
    fn release_lock(&self, agent_id: &AgentId, lock: Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock();
        // One reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(agent_id);
        }
        // Drop ours before the map unlocks so the next caller counts correctly
        drop(lock);
    }

    async fn timed<T, E>(
        &self,
        op: &'static str,
        call: impl Future<Output = Result<T, E>>,
    ) -> Result<T, ProvisionError>
    where
        ProvisionError: From<E>,
    {
        match tokio::time::timeout(self.config.call_timeout, call).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(ProvisionError::Timeout {
                op,
                ms: self.config.call_timeout.as_millis() as u64,
            }),
        }
    }
}

#[cfg(test)]
#[path = "provisioner_tests.rs"]
mod tests;
