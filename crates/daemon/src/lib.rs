// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Warden control plane library
//!
//! Provisions, supervises, and persists the state of one isolated agent
//! environment per user, either inside a single supervised runtime on this
//! host or as one orchestrated task per user.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod control;
pub mod env;
pub mod health;
pub mod integrations;
pub mod lifecycle;
pub mod orchestrator;
pub mod provisioner;
pub mod registry;
pub mod runtime_config;
pub mod supervisor;

pub use control::{ControlError, ControlPlane, LocalControlPlane, RemoteControlPlane};
pub use integrations::{Integration, Integrations};
pub use lifecycle::{Config, Daemon, LifecycleError, Mode, Services};
#[cfg(any(test, feature = "test-support"))]
pub use orchestrator::FakeOrchestrator;
pub use orchestrator::{
    KubernetesOrchestrator, Orchestrator, OrchestratorError, TaskDescription, TaskRequest,
    TaskStatus,
};
pub use provisioner::{ProvisionError, ProvisionerConfig, TaskProvisioner};
pub use registry::{Registry, RegistryConfig, RegistryError};
pub use runtime_config::{BaseConfig, RuntimeConfigError};
pub use supervisor::{Supervisor, SupervisorConfig, SupervisorError, SupervisorState};
