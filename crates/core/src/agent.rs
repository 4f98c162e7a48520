// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent identity and lifecycle types.
//!
//! One agent is one user's isolated environment. The agent ID *is* the user
//! ID: blob store keys, registry entries, on-disk directories, and metadata
//! records are all keyed by the same string.

use serde::{Deserialize, Serialize};
use std::fmt;

crate::define_id! {
    /// Stable identifier of an agent (equal to the owning user's ID).
    pub struct AgentId;
}

/// An agent ID that cannot be used as a directory name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid agent id {0:?}")]
pub struct InvalidAgentId(pub String);

impl AgentId {
    /// Agent IDs become directory names under the state root; reject anything
    /// that is empty or would escape it.
    pub fn validate(&self) -> Result<(), InvalidAgentId> {
        let s = self.as_str();
        if s.is_empty() || s == "." || s == ".." || s.contains(['/', '\\', '\0']) {
            return Err(InvalidAgentId(s.to_string()));
        }
        Ok(())
    }
}

crate::define_id! {
    /// Opaque reference to a remote compute allocation.
    pub struct TaskHandle;
}

/// Provisioning status of an agent's compute.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    #[default]
    Stopped,
    Provisioning,
    Running,
}

crate::simple_display! {
    LifecycleState {
        Stopped => "stopped",
        Provisioning => "provisioning",
        Running => "running",
    }
}

impl LifecycleState {
    /// True when compute has been requested and not torn down.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Provisioning | Self::Running)
    }
}

/// Reachable network location of a running agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub address: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new(address: impl Into<String>, port: u16) -> Self {
        Self { address: address.into(), port }
    }

    /// Base URL for HTTP calls into the agent runtime.
    pub fn base_url(&self) -> String {
        format!("http://{}", self)
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.address, self.port)
    }
}

/// Lifecycle state plus the endpoint when one is known.
///
/// This is what every control-plane operation reports back to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionStatus {
    pub state: LifecycleState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<Endpoint>,
}

impl ProvisionStatus {
    pub fn stopped() -> Self {
        Self { state: LifecycleState::Stopped, endpoint: None }
    }

    pub fn provisioning() -> Self {
        Self { state: LifecycleState::Provisioning, endpoint: None }
    }

    pub fn running(endpoint: Option<Endpoint>) -> Self {
        Self { state: LifecycleState::Running, endpoint }
    }
}

#[cfg(test)]
#[path = "agent_tests.rs"]
mod tests;
