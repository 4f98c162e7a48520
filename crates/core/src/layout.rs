// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! On-disk directory scheme for agent state.
//!
//! ```text
//! <root>/agents/<id>/            agent dir (archived as `agentdir`)
//! <root>/agents/<id>/sessions/   session transcripts
//! <root>/workspace-<id>/         workspace (archived as `workspace`)
//! ```

use crate::agent::AgentId;
use crate::artifact::ArtifactKind;
use std::path::{Path, PathBuf};

/// Resolves per-agent directories under a state root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateLayout {
    root: PathBuf,
}

impl StateLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Parent of every agent dir; scanned at boot to discover agents.
    pub fn agents_root(&self) -> PathBuf {
        self.root.join("agents")
    }

    pub fn agent_dir(&self, id: &AgentId) -> PathBuf {
        self.agents_root().join(id.as_str())
    }

    pub fn sessions_dir(&self, id: &AgentId) -> PathBuf {
        self.agent_dir(id).join("sessions")
    }

    pub fn workspace_dir(&self, id: &AgentId) -> PathBuf {
        self.root.join(format!("workspace-{}", id))
    }

    /// Directory captured by the given artifact kind.
    pub fn dir_for(&self, id: &AgentId, kind: ArtifactKind) -> PathBuf {
        match kind {
            ArtifactKind::Agentdir => self.agent_dir(id),
            ArtifactKind::Workspace => self.workspace_dir(id),
        }
    }

    /// Agent IDs with an existing agent dir, sorted.
    ///
    /// A missing agents root yields an empty list.
    pub fn discover_agents(&self) -> std::io::Result<Vec<AgentId>> {
        let entries = match std::fs::read_dir(self.agents_root()) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut ids = Vec::new();
        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                ids.push(AgentId::new(name));
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
