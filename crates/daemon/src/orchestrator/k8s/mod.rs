// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Kubernetes orchestrator: each task is a single pod.
//!
//! # Module layout
//!
//! - [`pod`]: Pod spec construction and phase mapping
//!
//! The pod name is the task handle. Pods carry the user's ID in their
//! environment and in the `warden.dev/agent-id` annotation, and expose the
//! task port on the pod IP.

mod pod;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Pod;
use kube::api::{Api, DeleteParams, PostParams};
use kube::Client;
use warden_core::TaskHandle;

use self::pod::PodParams;
use super::{Orchestrator, OrchestratorError, TaskDescription, TaskRequest};

/// Orchestrator that runs agent tasks as Kubernetes pods.
#[derive(Clone)]
pub struct KubernetesOrchestrator {
    client: Client,
    namespace: String,
    image: String,
}

impl KubernetesOrchestrator {
    /// Connect using the ambient kubeconfig or in-cluster service account.
    pub async fn new(
        namespace: impl Into<String>,
        image: impl Into<String>,
    ) -> Result<Self, OrchestratorError> {
        let client = Client::try_default().await.map_err(|e| {
            OrchestratorError::Transient(format!("failed to create kube client: {}", e))
        })?;
        Ok(Self::with_client(client, namespace, image))
    }

    pub fn with_client(
        client: Client,
        namespace: impl Into<String>,
        image: impl Into<String>,
    ) -> Self {
        Self { client, namespace: namespace.into(), image: image.into() }
    }

    fn pods(&self) -> Api<Pod> {
        Api::namespaced(self.client.clone(), &self.namespace)
    }
}

/// 4xx other than throttling means the request itself is bad; everything
/// else may succeed on retry.
fn map_kube_error(e: kube::Error) -> OrchestratorError {
    match e {
        kube::Error::Api(ref resp) if (400..500).contains(&resp.code) && resp.code != 429 => {
            OrchestratorError::Rejected(e.to_string())
        }
        other => OrchestratorError::Transient(other.to_string()),
    }
}

fn is_not_found(e: &kube::Error) -> bool {
    matches!(e, kube::Error::Api(resp) if resp.code == 404)
}

#[async_trait]
impl Orchestrator for KubernetesOrchestrator {
    async fn allocate_task(
        &self,
        request: &TaskRequest,
    ) -> Result<Option<TaskHandle>, OrchestratorError> {
        let pod = pod::build_pod(&PodParams {
            namespace: self.namespace.clone(),
            image: self.image.clone(),
            agent_id: request.agent_id.to_string(),
            container_port: i32::from(request.port),
        });

        let created =
            self.pods().create(&PostParams::default(), &pod).await.map_err(map_kube_error)?;
        let handle = created.metadata.name.map(TaskHandle::new);
        tracing::info!(
            agent_id = %request.agent_id,
            namespace = %self.namespace,
            pod = ?handle,
            "agent pod created"
        );
        Ok(handle)
    }

    async fn describe_task(
        &self,
        handle: &TaskHandle,
    ) -> Result<Option<TaskDescription>, OrchestratorError> {
        match self.pods().get(handle.as_str()).await {
            Ok(pod) => Ok(Some(pod::describe_pod(&pod))),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(map_kube_error(e)),
        }
    }

    async fn stop_task(&self, handle: &TaskHandle) -> Result<(), OrchestratorError> {
        match self.pods().delete(handle.as_str(), &DeleteParams::default()).await {
            Ok(_) => {
                tracing::info!(pod = %handle, "agent pod deleted");
                Ok(())
            }
            Err(e) if is_not_found(&e) => Ok(()),
            Err(e) => Err(map_kube_error(e)),
        }
    }
}
