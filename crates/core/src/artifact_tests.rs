// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn artifact_key_follows_scheme() {
    let id = AgentId::new("user_2abc");
    assert_eq!(
        artifact_key("agent-state", &id, ArtifactKind::Agentdir),
        "agent-state/user_2abc/agentdir.tar.gz"
    );
    assert_eq!(
        artifact_key("agent-state/", &id, ArtifactKind::Workspace),
        "agent-state/user_2abc/workspace.tar.gz"
    );
}

#[yare::parameterized(
    agentdir       = { "agent-state/u1/agentdir.tar.gz", Some("u1") },
    workspace      = { "agent-state/u2/workspace.tar.gz", Some("u2") },
    other_prefix   = { "other/u1/agentdir.tar.gz", None },
    prefix_lookalike = { "agent-stateX/u1/agentdir.tar.gz", None },
    no_group       = { "agent-state/agentdir.tar.gz", None },
    empty_group    = { "agent-state//agentdir.tar.gz", None },
)]
fn agent_from_key_extracts_group(key: &str, expected: Option<&str>) {
    assert_eq!(agent_from_key("agent-state", key), expected.map(AgentId::new));
}

#[test]
fn round_trip_key_to_agent() {
    let id = AgentId::new("u9");
    for kind in ArtifactKind::ALL {
        let key = artifact_key("p", &id, kind);
        assert_eq!(agent_from_key("p", &key), Some(id.clone()));
    }
}
