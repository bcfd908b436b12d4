// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Message types for the worker↔server protocol.

use anvil_core::{Action, ActionState};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Protocol version exchanged in the Hello handshake.
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Request from a worker to the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Request {
    /// Version handshake.
    Hello { version: String },

    /// Keepalive. Permitted without an active stream.
    Ping,

    /// Stream one context per currently assigned non-terminal pipeline.
    GetWorkflowContexts { worker_id: String },

    /// Fetch the ordered rendered action list for one pipeline.
    GetWorkflowActions { workflow_id: String },

    /// Report an action state transition.
    ReportActionStatus { report: ActionReport },
}

/// Response from the server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum Response {
    Hello { version: String },

    Pong,

    /// One assigned pipeline; zero or more per GetWorkflowContexts request.
    Context { context: WorkflowContext },

    /// End of a context stream.
    StreamEnd,

    Actions { actions: Vec<WorkflowAction> },

    /// Acknowledgment of a status report.
    Ack,

    Error { code: ErrorCode, message: String },
}

/// Failure categories mirrored from the server's validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorCode {
    InvalidArgument,
    NotFound,
    FailedPrecondition,
    Internal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorCode::InvalidArgument => "InvalidArgument",
            ErrorCode::NotFound => "NotFound",
            ErrorCode::FailedPrecondition => "FailedPrecondition",
            ErrorCode::Internal => "Internal",
        };
        write!(f, "{}", s)
    }
}

/// Where a pipeline stands, as delivered to its worker.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowContext {
    /// Name of the pipeline object.
    pub workflow_id: String,

    pub current_worker: String,

    /// Workflow entry currently executing.
    pub current_task: String,

    pub current_action: String,

    pub current_action_index: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_action_state: Option<ActionState>,

    pub total_number_of_actions: u64,

    /// Overall pipeline state; lets the worker observe cancellation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_state: Option<String>,
}

/// One rendered action plus its status identity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct WorkflowAction {
    /// Action status ID assigned at render time.
    pub id: String,

    /// Workflow entry the action belongs to.
    pub task_name: String,

    pub action: Action,
}

/// Action states a worker may report. Pending is not reportable: a no-op
/// report is a client bug.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportedActionState {
    Running,
    Succeeded,
    Failed,
    Timeout,
}

impl fmt::Display for ReportedActionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ReportedActionState::Running => "Running",
            ReportedActionState::Succeeded => "Succeeded",
            ReportedActionState::Failed => "Failed",
            ReportedActionState::Timeout => "Timeout",
        };
        write!(f, "{}", s)
    }
}

/// A worker-posted state transition for the current action.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ActionReport {
    pub workflow_id: String,

    /// Must match the pipeline's current workflow entry.
    pub task_name: String,

    /// Must match the pipeline's current action.
    pub action_name: String,

    /// Omitted in Default only; a real report always carries a state.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<ReportedActionState>,

    /// Reporting worker, for attribution.
    pub worker_id: String,

    /// Worker-observed execution duration. Informational; the server clock
    /// is authoritative.
    #[serde(default)]
    pub execution_seconds: i64,

    /// Short CamelCase failure reason, e.g. `Timeout` or `ExitCode 2`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub failure_reason: String,

    /// Free-form failure elaboration.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

#[cfg(test)]
#[path = "types_tests.rs"]
mod tests;
