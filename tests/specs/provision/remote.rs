//! Remote provisioning specs
//!
//! One orchestrated task per user, tracked in a durable record store.

use warden_daemon::{
    FakeOrchestrator, ProvisionerConfig, RemoteControlPlane, TaskDescription, TaskProvisioner,
};
use warden_storage::SqliteRecordStore;

use crate::prelude::*;

struct Cluster {
    _dir: tempfile::TempDir,
    db: std::path::PathBuf,
    orchestrator: FakeOrchestrator,
}

impl Cluster {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let db = dir.path().join("records.db");
        Self { _dir: dir, db, orchestrator: FakeOrchestrator::new() }
    }

    /// A control plane over the shared orchestrator and database, as a
    /// freshly started process would build it.
    fn control_plane(&self) -> RemoteControlPlane {
        let records = SqliteRecordStore::open(&self.db).unwrap();
        let provisioner = TaskProvisioner::new(
            Arc::new(self.orchestrator.clone()),
            Arc::new(records),
            ProvisionerConfig { task_port: 3001, call_timeout: Duration::from_secs(5) },
        );
        RemoteControlPlane::new(Arc::new(provisioner))
    }
}

#[tokio::test]
async fn status_follows_task_from_pending_to_running_to_stopped() {
    let cluster = Cluster::new();
    cluster.orchestrator.script(
        "task-1",
        vec![
            Some(TaskDescription::pending()),
            Some(TaskDescription::pending()),
            Some(TaskDescription::running("10.0.0.5")),
        ],
    );
    let control = cluster.control_plane();
    let alice = AgentId::new("alice");

    assert_eq!(control.provision(&alice).await.unwrap(), ProvisionStatus::provisioning());

    let mut seen = Vec::new();
    for _ in 0..3 {
        seen.push(control.status(&alice).await.unwrap());
    }
    seen.push(control.deprovision(&alice).await.unwrap());

    let running = ProvisionStatus::running(Some(Endpoint::new("10.0.0.5", 3001)));
    assert_eq!(
        seen,
        vec![
            ProvisionStatus::provisioning(),
            ProvisionStatus::provisioning(),
            running,
            ProvisionStatus::stopped(),
        ]
    );
    assert_eq!(control.status(&alice).await.unwrap(), ProvisionStatus::stopped());
    assert_eq!(control.endpoint(&alice).await.unwrap(), None);
}

#[tokio::test]
async fn status_is_monotonic_between_provision_and_deprovision() {
    let cluster = Cluster::new();
    let mut script = vec![Some(TaskDescription::pending()); 5];
    script.push(Some(TaskDescription::running("10.0.0.9")));
    cluster.orchestrator.script("task-1", script);
    let control = cluster.control_plane();
    let bob = AgentId::new("bob");

    control.provision(&bob).await.unwrap();
    let mut states = Vec::new();
    for _ in 0..10 {
        states.push(control.status(&bob).await.unwrap().state);
    }

    let first_running = states.iter().position(|s| *s == LifecycleState::Running).unwrap();
    assert!(states[..first_running].iter().all(|s| *s == LifecycleState::Provisioning));
    assert!(states[first_running..].iter().all(|s| *s == LifecycleState::Running));
}

#[tokio::test]
async fn provision_is_idempotent_across_control_plane_restarts() {
    let cluster = Cluster::new();
    cluster.orchestrator.script("task-1", vec![Some(TaskDescription::running("10.0.0.7"))]);
    let carol = AgentId::new("carol");

    cluster.control_plane().provision(&carol).await.unwrap();
    cluster.control_plane().provision(&carol).await.unwrap();
    assert_eq!(cluster.orchestrator.allocations().len(), 1);

    // A restarted control plane resumes polling from the stored record
    let restarted = cluster.control_plane();
    let status = restarted.status(&carol).await.unwrap();
    assert_eq!(status.endpoint, Some(Endpoint::new("10.0.0.7", 3001)));
    restarted.provision(&carol).await.unwrap();
    assert_eq!(cluster.orchestrator.allocations().len(), 1);
}

#[tokio::test]
async fn vanished_task_is_stopped_and_reprovision_allocates_again() {
    let cluster = Cluster::new();
    cluster.orchestrator.script("task-1", vec![None]);
    let control = cluster.control_plane();
    let dave = AgentId::new("dave");

    control.provision(&dave).await.unwrap();
    assert_eq!(control.status(&dave).await.unwrap(), ProvisionStatus::stopped());

    assert_eq!(control.provision(&dave).await.unwrap(), ProvisionStatus::provisioning());
    let allocations = cluster.orchestrator.allocations();
    assert_eq!(allocations.len(), 2);
    assert!(allocations.iter().all(|a| a.agent_id == dave && a.port == 3001));
}

#[tokio::test]
async fn concurrent_provision_for_many_users_allocates_once_each() {
    let cluster = Cluster::new();
    cluster.orchestrator.set_delay(Duration::from_millis(10));
    let control: Arc<dyn ControlPlane> = Arc::new(cluster.control_plane());

    let mut calls = Vec::new();
    for _ in 0..3 {
        for user in 0..6 {
            let control = Arc::clone(&control);
            let id = AgentId::new(format!("user-{user}"));
            calls.push(tokio::spawn(async move { control.provision(&id).await }));
        }
    }
    for call in calls {
        assert_eq!(call.await.unwrap().unwrap().state, LifecycleState::Provisioning);
    }

    assert_eq!(cluster.orchestrator.allocations().len(), 6);
}
