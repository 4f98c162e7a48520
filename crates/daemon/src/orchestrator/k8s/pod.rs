// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Pod spec construction and status mapping for agent tasks.

use k8s_openapi::api::core::v1::{
    Container, ContainerPort, EnvVar, HTTPGetAction, Pod, PodSpec, Probe,
};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;

use crate::orchestrator::{TaskDescription, TaskStatus};

pub(super) const APP_LABEL: &str = "warden-agent";
pub(super) const AGENT_ID_ANNOTATION: &str = "warden.dev/agent-id";

/// Parameters for building an agent task pod.
pub(super) struct PodParams {
    pub namespace: String,
    pub image: String,
    pub agent_id: String,
    pub container_port: i32,
}

/// Build a Pod spec for one user's agent task.
///
/// The pod name is server-generated from `warden-agent-`.
pub(super) fn build_pod(params: &PodParams) -> Pod {
    let health_probe = |period_seconds: i32| Probe {
        http_get: Some(HTTPGetAction {
            path: Some("/health".to_string()),
            port: IntOrString::Int(params.container_port),
            ..Default::default()
        }),
        period_seconds: Some(period_seconds),
        ..Default::default()
    };

    let container = Container {
        name: "agent".to_string(),
        image: Some(params.image.clone()),
        ports: Some(vec![ContainerPort {
            container_port: params.container_port,
            ..Default::default()
        }]),
        env: Some(vec![
            env_var("WARDEN_AGENT_ID", &params.agent_id),
            env_var("WARDEN_TASK_PORT", &params.container_port.to_string()),
        ]),
        readiness_probe: Some(health_probe(5)),
        ..Default::default()
    };

    Pod {
        metadata: ObjectMeta {
            generate_name: Some(format!("{APP_LABEL}-")),
            namespace: Some(params.namespace.clone()),
            labels: Some([("app".to_string(), APP_LABEL.to_string())].into_iter().collect()),
            annotations: Some(
                [(AGENT_ID_ANNOTATION.to_string(), params.agent_id.clone())].into_iter().collect(),
            ),
            ..Default::default()
        },
        spec: Some(PodSpec {
            containers: vec![container],
            restart_policy: Some("Never".to_string()),
            ..Default::default()
        }),
        ..Default::default()
    }
}

/// Map a pod's phase onto a task description.
pub(super) fn describe_pod(pod: &Pod) -> TaskDescription {
    if pod.metadata.deletion_timestamp.is_some() {
        return TaskDescription::stopped();
    }
    let status = pod.status.as_ref();
    match status.and_then(|s| s.phase.as_deref()) {
        Some("Succeeded") | Some("Failed") => TaskDescription::stopped(),
        Some("Running") => TaskDescription {
            status: TaskStatus::Running,
            address: status.and_then(|s| s.pod_ip.clone()).filter(|ip| !ip.is_empty()),
        },
        _ => TaskDescription::pending(),
    }
}

fn env_var(name: &str, value: &str) -> EnvVar {
    EnvVar { name: name.to_string(), value: Some(value.to_string()), ..Default::default() }
}

#[cfg(test)]
#[path = "pod_tests.rs"]
mod tests;
