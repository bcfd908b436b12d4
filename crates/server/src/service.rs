// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Protocol request handling.
//!
//! The service owns the server side of the three worker operations. All
//! time stamped here comes from the server clock; worker-observed durations
//! are informational only.

use std::sync::Arc;

use anvil_core::{ActionState, Clock, Pipeline, PipelineState};
use anvil_protocol::{
    ActionReport, ErrorCode, ReportedActionState, Request, Response, WorkflowAction,
    WorkflowContext, PROTOCOL_VERSION,
};
use anvil_store::ObjectStore;
use tracing::{debug, info, warn};

/// Attempts at the compare-and-swap status write before giving up on a
/// report. The worker retries by reconnecting.
const UPDATE_ATTEMPTS: usize = 3;

pub struct WorkflowService<S, C: Clock> {
    store: Arc<S>,
    clock: C,
    namespace: String,
}

fn error(code: ErrorCode, message: impl Into<String>) -> Response {
    Response::Error {
        code,
        message: message.into(),
    }
}

impl<S, C> WorkflowService<S, C>
where
    S: ObjectStore<Pipeline>,
    C: Clock,
{
    pub fn new(store: Arc<S>, clock: C, namespace: impl Into<String>) -> Self {
        Self {
            store,
            clock,
            namespace: namespace.into(),
        }
    }

    /// Handle one request, returning the response frames in write order.
    pub async fn handle(&self, request: Request) -> Vec<Response> {
        match request {
            Request::Hello { version } => {
                debug!(worker_version = %version, "hello");
                vec![Response::Hello {
                    version: PROTOCOL_VERSION.to_string(),
                }]
            }
            Request::Ping => vec![Response::Pong],
            Request::GetWorkflowContexts { worker_id } => self.contexts(&worker_id).await,
            Request::GetWorkflowActions { workflow_id } => {
                vec![self.actions(&workflow_id).await]
            }
            Request::ReportActionStatus { report } => vec![self.report(report).await],
        }
    }

    /// One context per currently assigned non-terminal pipeline, then a
    /// stream end marker.
    async fn contexts(&self, worker_id: &str) -> Vec<Response> {
        if worker_id.is_empty() {
            return vec![error(ErrorCode::InvalidArgument, "invalid worker id")];
        }

        let pipelines = match self.store.list(&self.namespace).await {
            Ok(pipelines) => pipelines,
            Err(e) => return vec![error(ErrorCode::Internal, e.to_string())],
        };

        let mut frames: Vec<Response> = pipelines
            .iter()
            .filter(|p| !p.is_terminal())
            .filter(|p| p.status.current_agent == worker_id)
            .filter(|p| !p.status.actions.is_empty())
            .map(|p| Response::Context {
                context: context_for(p),
            })
            .collect();
        frames.push(Response::StreamEnd);
        frames
    }

    /// The ordered rendered action list for one pipeline. Fetching it is the
    /// agent's acknowledgment: a Pending pipeline moves to Scheduled.
    async fn actions(&self, workflow_id: &str) -> Response {
        if workflow_id.is_empty() {
            return error(ErrorCode::InvalidArgument, "invalid workflow id");
        }

        let pipeline = match self.store.get(&self.namespace, workflow_id).await {
            Ok(p) => p,
            Err(e) if e.is_not_found() => return error(ErrorCode::NotFound, e.to_string()),
            Err(e) => return error(ErrorCode::Internal, e.to_string()),
        };

        let actions: Vec<WorkflowAction> = pipeline
            .status
            .actions
            .iter()
            .map(|a| WorkflowAction {
                id: a.id.clone(),
                task_name: a.workflow_id.clone(),
                action: a.rendered.clone(),
            })
            .collect();

        if pipeline.status.state == Some(PipelineState::Pending) {
            let mut scheduled = pipeline;
            scheduled
                .status
                .transition(PipelineState::Scheduled, self.clock.now());
            // Best effort: a conflict means another writer moved it first,
            // and the Running report path will catch the transition up.
            match self.store.update_status(scheduled).await {
                Ok(_) => {}
                Err(e) if e.is_conflict() => {}
                Err(e) => warn!(workflow_id, error = %e, "failed to mark pipeline scheduled"),
            }
        }

        Response::Actions { actions }
    }

    /// Apply a worker-reported action transition.
    async fn report(&self, report: ActionReport) -> Response {
        if report.workflow_id.is_empty() {
            return error(ErrorCode::InvalidArgument, "invalid workflow id");
        }
        if report.task_name.is_empty() {
            return error(ErrorCode::InvalidArgument, "invalid task name");
        }
        if report.action_name.is_empty() {
            return error(ErrorCode::InvalidArgument, "invalid action name");
        }
        let Some(state) = report.state else {
            return error(ErrorCode::InvalidArgument, "no update requested");
        };

        for _ in 0..UPDATE_ATTEMPTS {
            let mut pipeline = match self.store.get(&self.namespace, &report.workflow_id).await {
                Ok(p) => p,
                Err(e) if e.is_not_found() => {
                    return error(ErrorCode::InvalidArgument, "invalid workflow id")
                }
                Err(e) => return error(ErrorCode::Internal, e.to_string()),
            };

            // Only the current action may report; out-of-order reports are
            // client bugs.
            if report.task_name != pipeline.status.current_workflow {
                return error(ErrorCode::InvalidArgument, "invalid task reported");
            }
            if report.action_name != pipeline.status.current_action {
                return error(ErrorCode::InvalidArgument, "invalid action reported");
            }

            let now = self.clock.now();

            // A report against a cancelling pipeline is the abort
            // acknowledgment.
            if pipeline.status.state == Some(PipelineState::Cancelling) {
                pipeline.status.transition(PipelineState::Canceled, now);
                match self.store.update_status(pipeline).await {
                    Ok(_) => {
                        info!(workflow = %report.workflow_id, "cancellation acknowledged");
                        return Response::Ack;
                    }
                    Err(e) if e.is_conflict() => continue,
                    Err(e) => return error(ErrorCode::Internal, e.to_string()),
                }
            }

            if pipeline.is_terminal() {
                return error(ErrorCode::FailedPrecondition, "pipeline is terminal");
            }

            let Some(index) = pipeline.status.current_action_index() else {
                return error(ErrorCode::Internal, "current action not present in status");
            };
            let total = pipeline.status.total_actions();

            match state {
                ReportedActionState::Running => {
                    if pipeline.status.started_at.is_none() {
                        pipeline.status.started_at = Some(now);
                    }
                    let action = &mut pipeline.status.actions[index];
                    if action.started_at.is_none() {
                        action.started_at = Some(now);
                    }
                    action.transition(ActionState::Running, now);
                    if pipeline.status.state == Some(PipelineState::Pending) {
                        pipeline.status.transition(PipelineState::Scheduled, now);
                    }
                    pipeline.status.transition(PipelineState::Running, now);
                }
                ReportedActionState::Failed | ReportedActionState::Timeout => {
                    let reason = if !report.failure_reason.is_empty() {
                        report.failure_reason.clone()
                    } else if state == ReportedActionState::Timeout {
                        "Timeout".to_string()
                    } else {
                        "ActionFailed".to_string()
                    };
                    let action = &mut pipeline.status.actions[index];
                    action.seconds = action
                        .started_at
                        .map(|s| (now - s).num_seconds())
                        .unwrap_or(report.execution_seconds);
                    action.failure_reason = reason.clone();
                    action.failure_message = report.message.clone();
                    action.transition(ActionState::Failed, now);
                    pipeline.status.failure_reason = reason;
                    pipeline.status.failure_message = report.message.clone();
                    pipeline.status.transition(PipelineState::Failed, now);
                }
                ReportedActionState::Succeeded => {
                    let action = &mut pipeline.status.actions[index];
                    action.seconds = action
                        .started_at
                        .map(|s| (now - s).num_seconds())
                        .unwrap_or(report.execution_seconds);
                    action.transition(ActionState::Succeeded, now);

                    if index + 1 < total {
                        let next = &pipeline.status.actions[index + 1];
                        pipeline.status.current_action = next.rendered.name.clone();
                        pipeline.status.current_workflow = next.workflow_id.clone();
                    } else if !teardown_owed(&pipeline) {
                        pipeline.status.transition(PipelineState::Succeeded, now);
                    }
                    // When a netboot teardown is owed the pipeline stays
                    // Running; the reconciler completes the bracket.
                }
            }

            match self.store.update_status(pipeline).await {
                Ok(_) => {
                    info!(
                        workflow = %report.workflow_id,
                        action = %report.action_name,
                        state = %state,
                        "action status applied"
                    );
                    return Response::Ack;
                }
                Err(e) if e.is_conflict() => continue,
                Err(e) => return error(ErrorCode::Internal, e.to_string()),
            }
        }

        error(ErrorCode::Internal, "status update conflict")
    }
}

fn context_for(p: &Pipeline) -> WorkflowContext {
    WorkflowContext {
        workflow_id: p.metadata.name.clone(),
        current_worker: p.status.current_agent.clone(),
        current_task: p.status.current_workflow.clone(),
        current_action: p.status.current_action.clone(),
        current_action_index: p.status.current_action_index().unwrap_or(0) as u64,
        current_action_state: p.status.current_action_status().map(|a| a.state),
        total_number_of_actions: p.status.total_actions() as u64,
        pipeline_state: p.status.state.map(|s| s.to_string()),
    }
}

// The AllowPXE=false toggle must land before the pipeline may be declared
// succeeded.
fn teardown_owed(p: &Pipeline) -> bool {
    p.spec
        .boot_options_for(0)
        .is_some_and(|b| b.toggle_allow_netboot)
        && !p.status.boot_options.allow_netboot.toggled_false
}

#[cfg(test)]
#[path = "service_tests.rs"]
mod tests;
