// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use anvil_core::{
    Action, ActionStatus, FakeClock, ObjectMeta, PipelineSpec, PipelineWorkflow, SequentialIdGen,
};
use anvil_store::MemoryStore;

type TestStore = MemoryStore<FakeClock, SequentialIdGen>;

struct Harness {
    store: Arc<TestStore>,
    clock: FakeClock,
    service: WorkflowService<TestStore, FakeClock>,
}

fn rendered_action(workflow_id: &str, name: &str, id: &str) -> ActionStatus {
    ActionStatus {
        id: id.to_string(),
        workflow_id: workflow_id.to_string(),
        agent_id: "agent1".to_string(),
        rendered: Action {
            name: name.to_string(),
            image: "quay.io/example/img:v1".to_string(),
            ..Action::default()
        },
        ..ActionStatus::default()
    }
}

impl Harness {
    fn new() -> Self {
        let clock = FakeClock::default();
        let store = Arc::new(MemoryStore::with_deps(
            clock.clone(),
            SequentialIdGen::new("uid"),
        ));
        let service = WorkflowService::new(Arc::clone(&store), clock.clone(), "default");
        Self {
            store,
            clock,
            service,
        }
    }

    /// Seed a pipeline that has been rendered and is Pending, with three
    /// actions, the way the reconciler leaves it for the agent.
    async fn seed_pending(&self) {
        let mut p = Pipeline {
            metadata: ObjectMeta::named("default", "deploy-machine1"),
            spec: PipelineSpec {
                workflows: vec![PipelineWorkflow {
                    agent_id: "agent1".to_string(),
                    workflow_ref: "ubuntu-install".to_string(),
                    hardware_ref: "machine1".to_string(),
                    ..PipelineWorkflow::default()
                }],
                ..PipelineSpec::default()
            },
            ..Pipeline::default()
        };
        p.status.actions = vec![
            rendered_action("ubuntu-install", "stream-image", "a-1"),
            rendered_action("ubuntu-install", "install", "a-2"),
            rendered_action("ubuntu-install", "reboot", "a-3"),
        ];
        p.status.current_workflow = "ubuntu-install".to_string();
        p.status.current_action = "stream-image".to_string();
        p.status.current_agent = "agent1".to_string();
        p.status.current_hardware = "machine1".to_string();
        p.status
            .transition(PipelineState::Pending, self.clock.now());
        self.store.create(p).await.unwrap();
    }

    async fn pipeline(&self) -> Pipeline {
        self.store.get("default", "deploy-machine1").await.unwrap()
    }

    fn report(&self, action: &str, state: ReportedActionState) -> Request {
        Request::ReportActionStatus {
            report: ActionReport {
                workflow_id: "deploy-machine1".to_string(),
                task_name: "ubuntu-install".to_string(),
                action_name: action.to_string(),
                state: Some(state),
                worker_id: "agent1".to_string(),
                ..ActionReport::default()
            },
        }
    }

    async fn one(&self, request: Request) -> Response {
        let mut frames = self.service.handle(request).await;
        assert_eq!(frames.len(), 1, "expected exactly one frame: {:?}", frames);
        frames.remove(0)
    }
}

#[tokio::test]
async fn ping_pongs() {
    let h = Harness::new();
    assert_eq!(h.one(Request::Ping).await, Response::Pong);
}

#[tokio::test]
async fn contexts_streams_assigned_pipelines_and_ends() {
    let h = Harness::new();
    h.seed_pending().await;

    let frames = h
        .service
        .handle(Request::GetWorkflowContexts {
            worker_id: "agent1".to_string(),
        })
        .await;
    assert_eq!(frames.len(), 2);
    match &frames[0] {
        Response::Context { context } => {
            assert_eq!(context.workflow_id, "deploy-machine1");
            assert_eq!(context.current_task, "ubuntu-install");
            assert_eq!(context.current_action, "stream-image");
            assert_eq!(context.current_action_index, 0);
            assert_eq!(context.total_number_of_actions, 3);
        }
        other => panic!("expected context, got {:?}", other),
    }
    assert_eq!(frames[1], Response::StreamEnd);
}

#[tokio::test]
async fn contexts_excludes_other_workers() {
    let h = Harness::new();
    h.seed_pending().await;

    let frames = h
        .service
        .handle(Request::GetWorkflowContexts {
            worker_id: "someone-else".to_string(),
        })
        .await;
    assert_eq!(frames, vec![Response::StreamEnd]);
}

#[tokio::test]
async fn contexts_requires_worker_id() {
    let h = Harness::new();
    let frames = h
        .service
        .handle(Request::GetWorkflowContexts {
            worker_id: String::new(),
        })
        .await;
    assert!(matches!(
        frames[0],
        Response::Error {
            code: ErrorCode::InvalidArgument,
            ..
        }
    ));
}

#[tokio::test]
async fn actions_returns_rendered_list_and_schedules() {
    let h = Harness::new();
    h.seed_pending().await;

    let response = h
        .one(Request::GetWorkflowActions {
            workflow_id: "deploy-machine1".to_string(),
        })
        .await;
    match response {
        Response::Actions { actions } => {
            let names: Vec<&str> = actions.iter().map(|a| a.action.name.as_str()).collect();
            assert_eq!(names, ["stream-image", "install", "reboot"]);
            assert_eq!(actions[0].id, "a-1");
        }
        other => panic!("expected actions, got {:?}", other),
    }

    assert_eq!(
        h.pipeline().await.status.state,
        Some(PipelineState::Scheduled)
    );
}

#[tokio::test]
async fn actions_for_unknown_pipeline_is_not_found() {
    let h = Harness::new();
    let response = h
        .one(Request::GetWorkflowActions {
            workflow_id: "ghost".to_string(),
        })
        .await;
    assert!(matches!(
        response,
        Response::Error {
            code: ErrorCode::NotFound,
            ..
        }
    ));
}

#[tokio::test]
async fn running_report_stamps_server_time_and_starts_pipeline() {
    let h = Harness::new();
    h.seed_pending().await;
    h.clock.advance_secs(100);

    let response = h
        .one(h.report("stream-image", ReportedActionState::Running))
        .await;
    assert_eq!(response, Response::Ack);

    let p = h.pipeline().await;
    assert_eq!(p.status.state, Some(PipelineState::Running));
    assert_eq!(p.status.started_at, Some(h.clock.now()));
    assert_eq!(p.status.actions[0].state, ActionState::Running);
    assert_eq!(p.status.actions[0].started_at, Some(h.clock.now()));
}

#[tokio::test]
async fn success_advances_the_current_action_pointer() {
    let h = Harness::new();
    h.seed_pending().await;

    h.one(h.report("stream-image", ReportedActionState::Running))
        .await;
    h.clock.advance_secs(30);
    let response = h
        .one(h.report("stream-image", ReportedActionState::Succeeded))
        .await;
    assert_eq!(response, Response::Ack);

    let p = h.pipeline().await;
    assert_eq!(p.status.actions[0].state, ActionState::Succeeded);
    assert_eq!(p.status.actions[0].seconds, 30);
    assert_eq!(p.status.current_action, "install");
    assert_eq!(p.status.state, Some(PipelineState::Running));
}

#[tokio::test]
async fn last_action_success_succeeds_the_pipeline() {
    let h = Harness::new();
    h.seed_pending().await;

    for action in ["stream-image", "install", "reboot"] {
        h.one(h.report(action, ReportedActionState::Running)).await;
        h.one(h.report(action, ReportedActionState::Succeeded))
            .await;
    }

    let p = h.pipeline().await;
    assert_eq!(p.status.state, Some(PipelineState::Succeeded));
    assert!(p.status.all_actions_succeeded());
}

#[tokio::test]
async fn out_of_order_report_rejected() {
    let h = Harness::new();
    h.seed_pending().await;

    let response = h.one(h.report("reboot", ReportedActionState::Running)).await;
    match response {
        Response::Error { code, message } => {
            assert_eq!(code, ErrorCode::InvalidArgument);
            assert!(message.contains("invalid action reported"));
        }
        other => panic!("expected error, got {:?}", other),
    }
    // Status untouched.
    let p = h.pipeline().await;
    assert_eq!(p.status.state, Some(PipelineState::Pending));
}

#[tokio::test]
async fn wrong_task_name_rejected() {
    let h = Harness::new();
    h.seed_pending().await;

    let response = h
        .one(Request::ReportActionStatus {
            report: ActionReport {
                workflow_id: "deploy-machine1".to_string(),
                task_name: "other-task".to_string(),
                action_name: "stream-image".to_string(),
                state: Some(ReportedActionState::Running),
                worker_id: "agent1".to_string(),
                ..ActionReport::default()
            },
        })
        .await;
    assert!(matches!(
        response,
        Response::Error {
            code: ErrorCode::InvalidArgument,
            ..
        }
    ));
}

#[tokio::test]
async fn failure_report_fails_pipeline_and_blocks_rest() {
    let h = Harness::new();
    h.seed_pending().await;

    h.one(h.report("stream-image", ReportedActionState::Running))
        .await;
    h.one(h.report("stream-image", ReportedActionState::Succeeded))
        .await;
    h.one(h.report("install", ReportedActionState::Running)).await;

    let mut report = ActionReport {
        workflow_id: "deploy-machine1".to_string(),
        task_name: "ubuntu-install".to_string(),
        action_name: "install".to_string(),
        state: Some(ReportedActionState::Failed),
        worker_id: "agent1".to_string(),
        ..ActionReport::default()
    };
    report.failure_reason = "ExitCode 2".to_string();
    report.message = "container exited with code 2".to_string();
    h.one(Request::ReportActionStatus { report }).await;

    let p = h.pipeline().await;
    assert_eq!(p.status.state, Some(PipelineState::Failed));
    assert_eq!(p.status.failure_reason, "ExitCode 2");
    assert_eq!(p.status.actions[1].state, ActionState::Failed);
    assert_eq!(p.status.actions[2].state, ActionState::Pending);

    // A report for the next action is refused now.
    let response = h.one(h.report("reboot", ReportedActionState::Running)).await;
    assert!(matches!(response, Response::Error { .. }));
}

#[tokio::test]
async fn timeout_report_keeps_distinguishing_reason() {
    let h = Harness::new();
    h.seed_pending().await;

    h.one(h.report("stream-image", ReportedActionState::Running))
        .await;
    h.one(h.report("stream-image", ReportedActionState::Timeout))
        .await;

    let p = h.pipeline().await;
    assert_eq!(p.status.state, Some(PipelineState::Failed));
    assert_eq!(p.status.actions[0].failure_reason, "Timeout");
}

#[tokio::test]
async fn report_after_pipeline_timeout_is_refused() {
    let h = Harness::new();
    h.seed_pending().await;

    h.one(h.report("stream-image", ReportedActionState::Running))
        .await;
    // The reconciler timed the pipeline out.
    let mut p = h.pipeline().await;
    p.status.failure_reason = "PipelineTimeout".to_string();
    p.status.transition(PipelineState::Failed, h.clock.now());
    h.store.update_status(p).await.unwrap();

    let response = h
        .one(h.report("stream-image", ReportedActionState::Succeeded))
        .await;
    assert!(matches!(
        response,
        Response::Error {
            code: ErrorCode::FailedPrecondition,
            ..
        }
    ));
}

#[tokio::test]
async fn report_against_cancelling_pipeline_acknowledges_abort() {
    let h = Harness::new();
    h.seed_pending().await;

    h.one(h.report("stream-image", ReportedActionState::Running))
        .await;
    let mut p = h.pipeline().await;
    p.status
        .transition(PipelineState::Cancelling, h.clock.now());
    h.store.update_status(p).await.unwrap();

    let response = h
        .one(h.report("stream-image", ReportedActionState::Failed))
        .await;
    assert_eq!(response, Response::Ack);
    assert_eq!(
        h.pipeline().await.status.state,
        Some(PipelineState::Canceled)
    );
}

#[tokio::test]
async fn pending_like_empty_state_report_rejected() {
    let h = Harness::new();
    h.seed_pending().await;

    let response = h
        .one(Request::ReportActionStatus {
            report: ActionReport {
                workflow_id: "deploy-machine1".to_string(),
                task_name: "ubuntu-install".to_string(),
                action_name: "stream-image".to_string(),
                state: None,
                worker_id: "agent1".to_string(),
                ..ActionReport::default()
            },
        })
        .await;
    match response {
        Response::Error { code, message } => {
            assert_eq!(code, ErrorCode::InvalidArgument);
            assert!(message.contains("no update requested"));
        }
        other => panic!("expected error, got {:?}", other),
    }
}
