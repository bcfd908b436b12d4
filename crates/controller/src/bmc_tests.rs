// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use anvil_core::{BmcTask, FakeClock, HardwareSpec, ObjectMeta, SequentialIdGen};
use anvil_store::MemoryStore;

fn store() -> MemoryStore<FakeClock, SequentialIdGen> {
    MemoryStore::with_deps(FakeClock::default(), SequentialIdGen::new("uid"))
}

fn hardware() -> Hardware {
    Hardware {
        metadata: ObjectMeta::named("default", "machine1"),
        spec: HardwareSpec {
            bmc_ref: Some("bmc-machine1".to_string()),
            ..HardwareSpec::default()
        },
    }
}

fn pipeline() -> Pipeline {
    Pipeline {
        metadata: ObjectMeta::named("default", "deploy-machine1"),
        spec: anvil_core::PipelineSpec {
            workflows: vec![anvil_core::PipelineWorkflow {
                agent_id: "agent1".to_string(),
                workflow_ref: "wf".to_string(),
                hardware_ref: "machine1".to_string(),
                ..anvil_core::PipelineWorkflow::default()
            }],
            ..anvil_core::PipelineSpec::default()
        },
        ..Pipeline::default()
    }
}

#[tokio::test]
async fn ensure_job_creates_and_records_slot() {
    let store = store();
    let coordinator = BmcCoordinator::new(store.clone());
    let mut p = pipeline();

    coordinator
        .ensure_job(&mut p, &hardware(), BmcJobRole::AllowPxe, None)
        .await
        .unwrap();

    let slot = p.status.boot_options.jobs.get("netboot-allow").unwrap();
    assert!(!slot.complete);
    assert!(!slot.existing_job_deleted);
    assert!(!slot.uid.is_empty());

    let job: BmcJob = store
        .get("default", "netboot-allow-machine1")
        .await
        .unwrap();
    assert_eq!(job.metadata.uid, slot.uid);
    assert_eq!(job.spec.machine_ref, "bmc-machine1");
    assert_eq!(job.spec.tasks, vec![BmcTask::SetPxe { enabled: true }]);
}

#[tokio::test]
async fn ensure_job_is_idempotent_per_pipeline() {
    let store = store();
    let coordinator = BmcCoordinator::new(store.clone());
    let mut p = pipeline();

    coordinator
        .ensure_job(&mut p, &hardware(), BmcJobRole::AllowPxe, None)
        .await
        .unwrap();
    let first_uid = p.status.boot_options.jobs.get("netboot-allow").unwrap().uid.clone();

    coordinator
        .ensure_job(&mut p, &hardware(), BmcJobRole::AllowPxe, None)
        .await
        .unwrap();
    assert_eq!(
        p.status.boot_options.jobs.get("netboot-allow").unwrap().uid,
        first_uid
    );
}

#[tokio::test]
async fn conflicting_job_is_replaced_and_flagged() {
    let store = store();
    let coordinator = BmcCoordinator::new(store.clone());

    // A leftover job from an earlier pipeline with the same fixed name.
    store
        .create(BmcJob {
            metadata: ObjectMeta::named("default", "netboot-allow-machine1"),
            ..BmcJob::default()
        })
        .await
        .unwrap();

    let mut p = pipeline();
    coordinator
        .ensure_job(&mut p, &hardware(), BmcJobRole::AllowPxe, None)
        .await
        .unwrap();

    let slot = p.status.boot_options.jobs.get("netboot-allow").unwrap();
    assert!(slot.existing_job_deleted);

    // Exactly one job with the fixed name exists.
    let jobs: Vec<BmcJob> = store.list("default").await.unwrap();
    assert_eq!(jobs.len(), 1);
    assert_eq!(jobs[0].metadata.uid, slot.uid);
}

#[tokio::test]
async fn iso_boot_job_carries_media_url() {
    let store = store();
    let coordinator = BmcCoordinator::new(store.clone());
    let mut p = pipeline();

    coordinator
        .ensure_job(
            &mut p,
            &hardware(),
            BmcJobRole::IsoBoot,
            Some("http://images/osie.iso"),
        )
        .await
        .unwrap();

    let job: BmcJob = store.get("default", "iso-boot-machine1").await.unwrap();
    match &job.spec.tasks[0] {
        BmcTask::SetBootDevice {
            device,
            one_shot,
            media_url,
        } => {
            assert_eq!(*device, anvil_core::BootDevice::Cdrom);
            assert!(one_shot);
            assert_eq!(media_url.as_deref(), Some("http://images/osie.iso"));
        }
        other => panic!("unexpected first task: {:?}", other),
    }
    assert_eq!(job.spec.tasks[1], BmcTask::PowerCycle);
}

#[tokio::test]
async fn observe_returns_only_slotted_roles() {
    let store = store();
    let coordinator = BmcCoordinator::new(store.clone());
    let mut p = pipeline();

    coordinator
        .ensure_job(&mut p, &hardware(), BmcJobRole::AllowPxe, None)
        .await
        .unwrap();

    let observations = coordinator.observe(&p, "machine1").await.unwrap();
    assert!(observations.get(BmcJobRole::AllowPxe).is_some());
    assert!(observations.get(BmcJobRole::DisallowPxe).is_none());
    assert!(observations.get(BmcJobRole::IsoBoot).is_none());
}
