// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! warden-core: shared types for the Warden agent control plane

pub mod macros;

pub mod agent;
pub mod agent_record;
pub mod artifact;
pub mod clock;
pub mod id;
pub mod layout;

pub use agent::{AgentId, Endpoint, InvalidAgentId, LifecycleState, ProvisionStatus, TaskHandle};
pub use agent_record::{AgentRecord, RecordPatch};
pub use artifact::{agent_from_key, artifact_key, ArtifactKind};
#[cfg(any(test, feature = "test-support"))]
pub use clock::FakeClock;
pub use clock::{Clock, SystemClock};
pub use layout::StateLayout;
