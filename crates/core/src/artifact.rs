// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Archive artifact naming.
//!
//! The key scheme is `{prefix}/{agent_id}/{kind}.tar.gz` and must stay
//! stable: archives written by earlier deployments are restored with it.

use crate::agent::AgentId;
use serde::{Deserialize, Serialize};

/// Which directory of an agent an artifact captures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// Agent state directory (session transcripts, agent metadata)
    Agentdir,
    /// Agent workspace tree
    Workspace,
}

crate::simple_display! {
    ArtifactKind {
        Agentdir => "agentdir",
        Workspace => "workspace",
    }
}

impl ArtifactKind {
    pub const ALL: [ArtifactKind; 2] = [ArtifactKind::Agentdir, ArtifactKind::Workspace];

    /// File name of the artifact within an agent's key group.
    pub fn file_name(self) -> String {
        format!("{}.tar.gz", self.as_str())
    }
}

/// Blob store key for one artifact.
pub fn artifact_key(prefix: &str, agent_id: &AgentId, kind: ArtifactKind) -> String {
    format!("{}/{}/{}", prefix.trim_end_matches('/'), agent_id, kind.file_name())
}

/// Extract the agent ID (second-level key group) from a key under `prefix`.
///
/// Returns `None` for keys outside the prefix or without a group segment.
pub fn agent_from_key(prefix: &str, key: &str) -> Option<AgentId> {
    let prefix = prefix.trim_end_matches('/');
    let rest = key.strip_prefix(prefix)?.strip_prefix('/')?;
    let (group, tail) = rest.split_once('/')?;
    if group.is_empty() || tail.is_empty() {
        return None;
    }
    Some(AgentId::new(group))
}

#[cfg(test)]
#[path = "artifact_tests.rs"]
mod tests;
