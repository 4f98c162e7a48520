// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn provisioning_record() -> AgentRecord {
    AgentRecord::provisioning(AgentId::new("u1"), TaskHandle::new("t-1"), 1_000)
}

#[test]
fn provisioning_record_has_task_and_no_endpoint() {
    let record = provisioning_record();
    assert_eq!(record.state, LifecycleState::Provisioning);
    assert_eq!(record.task, Some(TaskHandle::new("t-1")));
    assert_eq!(record.endpoint, None);
    assert_eq!(record.provisioned_at_ms, Some(1_000));
}

#[test]
fn running_patch_keeps_task_and_sets_endpoint() {
    let mut record = provisioning_record();
    record.apply(&RecordPatch::running(Endpoint::new("10.0.0.5", 3001)));

    assert_eq!(record.state, LifecycleState::Running);
    assert_eq!(record.task, Some(TaskHandle::new("t-1")));
    assert_eq!(record.status(), ProvisionStatus::running(Some(Endpoint::new("10.0.0.5", 3001))));
}

#[test]
fn stopped_patch_clears_task_and_endpoint() {
    let mut record = provisioning_record();
    record.apply(&RecordPatch::running(Endpoint::new("10.0.0.5", 3001)));
    record.apply(&RecordPatch::stopped());

    assert_eq!(record.state, LifecycleState::Stopped);
    assert_eq!(record.task, None);
    assert_eq!(record.endpoint, None);
    // provision timestamp survives teardown
    assert_eq!(record.provisioned_at_ms, Some(1_000));
    assert_eq!(record.status(), ProvisionStatus::stopped());
}

#[test]
fn empty_patch_is_identity() {
    let mut record = provisioning_record();
    let before = record.clone();
    record.apply(&RecordPatch::default());
    assert_eq!(record, before);
}

#[test]
fn record_json_skips_absent_fields() {
    let mut record = provisioning_record();
    record.apply(&RecordPatch::stopped());
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "id": "u1", "state": "stopped", "provisioned_at_ms": 1000 })
    );
    let back: AgentRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
}
