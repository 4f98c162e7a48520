// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote compute orchestration.
//!
//! # Module layout
//!
//! - [`k8s`]: Kubernetes implementation (one pod per task)

pub mod k8s;

pub use k8s::KubernetesOrchestrator;

use async_trait::async_trait;
use thiserror::Error;
use warden_core::{AgentId, TaskHandle};

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("orchestrator unavailable: {0}")]
    Transient(String),
    #[error("orchestrator rejected request: {0}")]
    Rejected(String),
}

/// Coarse task status as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Accepted but not yet serving
    Pending,
    Running,
    /// Terminated or terminating
    Stopped,
}

warden_core::simple_display! {
    TaskStatus {
        Pending => "pending",
        Running => "running",
        Stopped => "stopped",
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskDescription {
    pub status: TaskStatus,
    /// Private network address, once assigned
    pub address: Option<String>,
}

impl TaskDescription {
    pub fn pending() -> Self {
        Self { status: TaskStatus::Pending, address: None }
    }

    pub fn running(address: impl Into<String>) -> Self {
        Self { status: TaskStatus::Running, address: Some(address.into()) }
    }

    pub fn stopped() -> Self {
        Self { status: TaskStatus::Stopped, address: None }
    }
}

/// Parameters for a task allocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskRequest {
    /// The user the task serves; passed into the task's environment
    pub agent_id: AgentId,
    pub port: u16,
}

/// Allocates and tracks remote tasks, one per user.
#[async_trait]
pub trait Orchestrator: Send + Sync + 'static {
    /// Allocate a task. `None` means the orchestrator accepted the request
    /// but returned no handle.
    async fn allocate_task(
        &self,
        request: &TaskRequest,
    ) -> Result<Option<TaskHandle>, OrchestratorError>;

    /// Describe a task. `None` means the orchestrator no longer knows it.
    async fn describe_task(
        &self,
        handle: &TaskHandle,
    ) -> Result<Option<TaskDescription>, OrchestratorError>;

    /// Stop a task. Stopping an unknown task succeeds.
    async fn stop_task(&self, handle: &TaskHandle) -> Result<(), OrchestratorError>;
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{Orchestrator, OrchestratorError, TaskDescription, TaskRequest};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::collections::{HashMap, VecDeque};
    use std::sync::Arc;
    use std::time::Duration;
    use warden_core::TaskHandle;

    #[derive(Default)]
    struct State {
        allocations: Vec<TaskRequest>,
        describes: HashMap<TaskHandle, VecDeque<Option<TaskDescription>>>,
        stops: Vec<TaskHandle>,
        no_handle: bool,
        fail_stop: bool,
        fail_describe: bool,
        delay: Option<Duration>,
    }

    /// Scripted orchestrator for tests.
    ///
    /// Handles are `task-1`, `task-2`, … in allocation order. Each handle's
    /// describe script is consumed front to back; the last entry repeats.
    /// Unscripted handles describe as pending.
    #[derive(Clone, Default)]
    pub struct FakeOrchestrator {
        inner: Arc<Mutex<State>>,
    }

    impl FakeOrchestrator {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn script(&self, handle: &str, describes: Vec<Option<TaskDescription>>) {
            self.inner.lock().describes.insert(TaskHandle::new(handle), describes.into());
        }

        pub fn allocations(&self) -> Vec<TaskRequest> {
            self.inner.lock().allocations.clone()
        }

        pub fn stops(&self) -> Vec<TaskHandle> {
            self.inner.lock().stops.clone()
        }

        /// Make allocations succeed without returning a handle.
        pub fn return_no_handle(&self) {
            self.inner.lock().no_handle = true;
        }

        pub fn fail_stop(&self) {
            self.inner.lock().fail_stop = true;
        }

        pub fn fail_describe(&self) {
            self.inner.lock().fail_describe = true;
        }

        /// Delay every call, to exercise call timeouts and interleavings.
        pub fn set_delay(&self, delay: Duration) {
            self.inner.lock().delay = Some(delay);
        }

        async fn pause(&self) {
            let delay = self.inner.lock().delay;
            if let Some(delay) = delay {
                tokio::time::sleep(delay).await;
            }
        }
    }

    #[async_trait]
    impl Orchestrator for FakeOrchestrator {
        async fn allocate_task(
            &self,
            request: &TaskRequest,
        ) -> Result<Option<TaskHandle>, OrchestratorError> {
            self.pause().await;
            let mut state = self.inner.lock();
            state.allocations.push(request.clone());
            if state.no_handle {
                return Ok(None);
            }
            Ok(Some(TaskHandle::new(format!("task-{}", state.allocations.len()))))
        }

        async fn describe_task(
            &self,
            handle: &TaskHandle,
        ) -> Result<Option<TaskDescription>, OrchestratorError> {
            self.pause().await;
            let mut state = self.inner.lock();
            if state.fail_describe {
                return Err(OrchestratorError::Transient("injected describe failure".into()));
            }
            let Some(script) = state.describes.get_mut(handle) else {
                return Ok(Some(TaskDescription::pending()));
            };
            let next = if script.len() > 1 { script.pop_front() } else { script.front().cloned() };
            Ok(next.unwrap_or_else(|| Some(TaskDescription::pending())))
        }

        async fn stop_task(&self, handle: &TaskHandle) -> Result<(), OrchestratorError> {
            self.pause().await;
            let mut state = self.inner.lock();
            state.stops.push(handle.clone());
            if state.fail_stop {
                return Err(OrchestratorError::Transient("injected stop failure".into()));
            }
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeOrchestrator;
