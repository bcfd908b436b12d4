// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use anvil_core::{
    FakeClock, ObjectMeta, PipelineSpec, PipelineState, PipelineWorkflow, SequentialIdGen,
    WorkflowSpec,
};

fn test_store() -> MemoryStore<FakeClock, SequentialIdGen> {
    MemoryStore::with_deps(FakeClock::default(), SequentialIdGen::new("uid"))
}

fn hardware(name: &str) -> Hardware {
    Hardware {
        metadata: ObjectMeta::named("default", name),
        ..Hardware::default()
    }
}

fn pipeline(name: &str) -> Pipeline {
    Pipeline {
        metadata: ObjectMeta::named("default", name),
        spec: PipelineSpec {
            workflows: vec![PipelineWorkflow {
                agent_id: "agent1".to_string(),
                workflow_ref: "wf".to_string(),
                hardware_ref: "hw".to_string(),
                ..PipelineWorkflow::default()
            }],
            ..PipelineSpec::default()
        },
        ..Pipeline::default()
    }
}

#[tokio::test]
async fn create_assigns_uid_and_version() {
    let store = test_store();
    let created = store.create(hardware("m1")).await.unwrap();
    assert_eq!(created.metadata.uid, "uid-1");
    assert!(created.metadata.resource_version > 0);

    let fetched: Hardware = store.get("default", "m1").await.unwrap();
    assert_eq!(fetched, created);
}

#[tokio::test]
async fn create_duplicate_rejected() {
    let store = test_store();
    store.create(hardware("m1")).await.unwrap();
    let err = store.create(hardware("m1")).await.unwrap_err();
    assert!(matches!(err, StoreError::AlreadyExists { .. }));
}

#[tokio::test]
async fn get_missing_is_not_found() {
    let store = test_store();
    let err = ObjectStore::<Hardware>::get(&store, "default", "nope")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn invalid_object_rejected_on_create() {
    let store = test_store();
    let wf = anvil_core::Workflow {
        metadata: ObjectMeta::named("default", "wf"),
        spec: WorkflowSpec::default(), // no actions
    };
    let err = store.create(wf).await.unwrap_err();
    assert!(matches!(err, StoreError::Invalid(_)));
}

#[tokio::test]
async fn stale_update_conflicts() {
    let store = test_store();
    let created = store.create(hardware("m1")).await.unwrap();

    let mut first = created.clone();
    first.spec.bmc_ref = Some("bmc1".to_string());
    store.update(first).await.unwrap();

    // Second writer still holds the original resource version.
    let mut second = created;
    second.spec.bmc_ref = Some("bmc2".to_string());
    let err = store.update(second).await.unwrap_err();
    assert!(err.is_conflict());
}

#[tokio::test]
async fn list_is_namespace_scoped_and_sorted() {
    let store = test_store();
    store.create(hardware("m2")).await.unwrap();
    store.create(hardware("m1")).await.unwrap();
    let mut other = hardware("m3");
    other.metadata.namespace = "lab".to_string();
    store.create(other).await.unwrap();

    let names: Vec<String> = ObjectStore::<Hardware>::list(&store, "default")
        .await
        .unwrap()
        .into_iter()
        .map(|h| h.metadata.name)
        .collect();
    assert_eq!(names, ["m1", "m2"]);
}

#[tokio::test]
async fn watch_sees_create_and_delete() {
    let store = test_store();
    let mut watch = ObjectStore::<Hardware>::watch(&store);

    store.create(hardware("m1")).await.unwrap();
    ObjectStore::<Hardware>::delete(&store, "default", "m1")
        .await
        .unwrap();
    let _: Hardware = match watch.recv().await.unwrap() {
        WatchEvent::Applied(h) => h,
        other => panic!("expected Applied, got {:?}", other),
    };
    assert!(matches!(
        watch.recv().await.unwrap(),
        WatchEvent::Deleted(_)
    ));
}

#[tokio::test]
async fn deleting_running_pipeline_marks_cancellation() {
    let store = test_store();
    let mut p = store.create(pipeline("deploy")).await.unwrap();
    p.status.transition(PipelineState::Running, FakeClock::default().now());
    let p = store.update_status(p).await.unwrap();

    ObjectStore::<Pipeline>::delete(&store, "default", "deploy")
        .await
        .unwrap();

    // Still present, with the deletion timestamp set.
    let marked: Pipeline = store.get("default", "deploy").await.unwrap();
    assert!(marked.metadata.deletion_requested());
    assert!(marked.metadata.resource_version > p.metadata.resource_version);
}

#[tokio::test]
async fn deleting_terminal_pipeline_removes_it() {
    let store = test_store();
    let mut p = store.create(pipeline("deploy")).await.unwrap();
    p.status.transition(PipelineState::Succeeded, FakeClock::default().now());
    store.update_status(p).await.unwrap();

    ObjectStore::<Pipeline>::delete(&store, "default", "deploy")
        .await
        .unwrap();
    let err = ObjectStore::<Pipeline>::get(&store, "default", "deploy")
        .await
        .unwrap_err();
    assert!(err.is_not_found());
}
