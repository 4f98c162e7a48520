// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable record of one user's remote environment.
//!
//! `AgentRecord` is the row the task provisioner keeps in the metadata
//! store. The control plane is its only writer; on restart the record is
//! read back and polling resumes from the persisted state.
//!
//! Invariants maintained by the constructors and [`RecordPatch`]:
//! - `task` is `None` whenever `state` is `Stopped`
//! - `endpoint` is `Some` only when `state` is `Running`

use crate::agent::{AgentId, Endpoint, LifecycleState, ProvisionStatus, TaskHandle};
use serde::{Deserialize, Serialize};

/// Persisted lifecycle record for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentRecord {
    pub id: AgentId,
    pub state: LifecycleState,
    /// Remote task, present once provisioning has been requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<TaskHandle>,
    /// Reachable location, present once the task reported running
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
    /// Epoch milliseconds of the most recent provision request
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provisioned_at_ms: Option<u64>,
}

impl AgentRecord {
    /// A freshly requested allocation.
    pub fn provisioning(id: AgentId, task: TaskHandle, provisioned_at_ms: u64) -> Self {
        Self {
            id,
            state: LifecycleState::Provisioning,
            task: Some(task),
            endpoint: None,
            provisioned_at_ms: Some(provisioned_at_ms),
        }
    }

    /// Apply a partial update in place.
    pub fn apply(&mut self, patch: &RecordPatch) {
        if let Some(state) = patch.state {
            self.state = state;
        }
        if let Some(ref task) = patch.task {
            self.task = task.clone();
        }
        if let Some(ref endpoint) = patch.endpoint {
            self.endpoint = endpoint.clone();
        }
    }

    /// Status as reported to callers: the endpoint is only surfaced while running.
    pub fn status(&self) -> ProvisionStatus {
        match self.state {
            LifecycleState::Running => ProvisionStatus::running(self.endpoint.clone()),
            LifecycleState::Provisioning => ProvisionStatus::provisioning(),
            LifecycleState::Stopped => ProvisionStatus::stopped(),
        }
    }
}

/// Partial update of an [`AgentRecord`].
///
/// `None` leaves a field untouched; `Some(None)` clears an optional field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<LifecycleState>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task: Option<Option<TaskHandle>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Option<Endpoint>>,
}

impl RecordPatch {
    /// Transition to `Stopped`, dropping the task handle and endpoint.
    pub fn stopped() -> Self {
        Self { state: Some(LifecycleState::Stopped), task: Some(None), endpoint: Some(None) }
    }

    /// Transition to `Running` at the given endpoint.
    pub fn running(endpoint: Endpoint) -> Self {
        Self { state: Some(LifecycleState::Running), task: None, endpoint: Some(Some(endpoint)) }
    }
}

#[cfg(test)]
#[path = "agent_record_tests.rs"]
mod tests;
