// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Sequential per-pipeline action executor.
//!
//! For each action: prepare, run with a concurrent log drain, wait with an
//! optional deadline, destroy in every exit path, then report the terminal
//! state before moving on. A failed action stops the pipeline.

use std::sync::Arc;
use std::time::{Duration, Instant};

use anvil_protocol::{ActionReport, ReportedActionState, WorkflowAction};
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use crate::client::{ClientError, StatusReporter};
use crate::runner::{ContainerRunner, RunnerError};

/// Grace period for stopping a container on destroy.
const DESTROY_GRACE: Duration = Duration::from_secs(5);

/// Buffered log lines between the runtime stream and the drain task.
const LOG_BUFFER: usize = 64;

/// How one pipeline's execution ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkflowOutcome {
    /// Every action succeeded.
    Completed,
    /// An action failed or timed out; subsequent actions were not run.
    ActionFailed { action: String },
    /// Cancelled by the control plane or worker shutdown.
    Cancelled,
}

enum AttemptResult {
    Succeeded,
    Background,
    TimedOut,
    Cancelled,
    Failed {
        exit_code: Option<i64>,
        reason: String,
        message: String,
    },
}

pub struct ActionExecutor<R, T> {
    runner: Arc<R>,
    reporter: Arc<T>,
    worker_id: String,
}

impl<R, T> ActionExecutor<R, T>
where
    R: ContainerRunner,
    T: StatusReporter,
{
    pub fn new(runner: Arc<R>, reporter: Arc<T>, worker_id: impl Into<String>) -> Self {
        Self {
            runner,
            reporter,
            worker_id: worker_id.into(),
        }
    }

    /// Execute `actions` strictly in order, reporting each transition.
    ///
    /// Returns Err only on report transport failure; rejected reports and
    /// failed actions resolve to a [`WorkflowOutcome`].
    pub async fn execute_workflow(
        &self,
        workflow_id: &str,
        actions: &[WorkflowAction],
        cancel: watch::Receiver<bool>,
    ) -> Result<WorkflowOutcome, ClientError> {
        for action in actions {
            if *cancel.borrow() {
                return Ok(WorkflowOutcome::Cancelled);
            }
            match self.execute_action(workflow_id, action, cancel.clone()).await? {
                ActionDisposition::Continue => {}
                ActionDisposition::Stop => {
                    return Ok(WorkflowOutcome::ActionFailed {
                        action: action.action.name.clone(),
                    })
                }
                ActionDisposition::Cancelled => return Ok(WorkflowOutcome::Cancelled),
            }
        }
        Ok(WorkflowOutcome::Completed)
    }

    async fn execute_action(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
        cancel: watch::Receiver<bool>,
    ) -> Result<ActionDisposition, ClientError> {
        info!(
            workflow = workflow_id,
            action = %action.action.name,
            "starting action"
        );
        self.report(workflow_id, action, ReportedActionState::Running, "", "", 0)
            .await?;

        let started = Instant::now();
        let mut attempt: u32 = 0;
        loop {
            attempt += 1;
            let seconds = || started.elapsed().as_secs() as i64;

            match self.run_attempt(workflow_id, action, cancel.clone()).await {
                AttemptResult::Succeeded | AttemptResult::Background => {
                    self.report(
                        workflow_id,
                        action,
                        ReportedActionState::Succeeded,
                        "",
                        "",
                        seconds(),
                    )
                    .await?;
                    return Ok(ActionDisposition::Continue);
                }
                AttemptResult::TimedOut => {
                    // Timeouts are never retried.
                    self.report(
                        workflow_id,
                        action,
                        ReportedActionState::Timeout,
                        "Timeout",
                        &format!(
                            "action exceeded its {}s timeout",
                            action.action.timeout_seconds
                        ),
                        seconds(),
                    )
                    .await?;
                    return Ok(ActionDisposition::Stop);
                }
                AttemptResult::Cancelled => {
                    self.report(
                        workflow_id,
                        action,
                        ReportedActionState::Failed,
                        "Cancelled",
                        "action aborted",
                        seconds(),
                    )
                    .await?;
                    return Ok(ActionDisposition::Cancelled);
                }
                AttemptResult::Failed {
                    exit_code: Some(code),
                    reason,
                    message,
                } => {
                    if attempt <= action.action.retries {
                        warn!(
                            action = %action.action.name,
                            exit_code = code,
                            attempt,
                            retries = action.action.retries,
                            "action failed; retrying"
                        );
                        continue;
                    }
                    self.report(
                        workflow_id,
                        action,
                        ReportedActionState::Failed,
                        &reason,
                        &message,
                        seconds(),
                    )
                    .await?;
                    return Ok(ActionDisposition::Stop);
                }
                AttemptResult::Failed {
                    exit_code: None,
                    reason,
                    message,
                } => {
                    // Prepare and start errors are not retried.
                    self.report(
                        workflow_id,
                        action,
                        ReportedActionState::Failed,
                        &reason,
                        &message,
                        seconds(),
                    )
                    .await?;
                    return Ok(ActionDisposition::Stop);
                }
            }
        }
    }

    async fn run_attempt(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
        mut cancel: watch::Receiver<bool>,
    ) -> AttemptResult {
        let id = match self.runner.prepare(workflow_id, action).await {
            Ok(id) => id,
            Err(e) => {
                return AttemptResult::Failed {
                    exit_code: None,
                    reason: "PrepareFailed".to_string(),
                    message: e.to_string(),
                }
            }
        };

        let (log_tx, log_rx) = mpsc::channel(LOG_BUFFER);
        spawn_log_drain(action.id.clone(), action.action.name.clone(), log_rx);

        let handle = match self.runner.run(&id, log_tx).await {
            Ok(handle) => handle,
            Err(e) => {
                self.destroy(&id).await;
                return AttemptResult::Failed {
                    exit_code: None,
                    reason: "StartFailed".to_string(),
                    message: e.to_string(),
                };
            }
        };

        // Background actions are left running; the agent proceeds.
        if action.action.background {
            return AttemptResult::Background;
        }

        let timeout_seconds = action.action.timeout_seconds;
        let wait = handle.wait();
        tokio::pin!(wait);

        let result = tokio::select! {
            changed = cancel.changed() => {
                // A closed channel means the worker itself is going away.
                let _ = changed;
                self.destroy(&id).await;
                return AttemptResult::Cancelled;
            }
            outcome = async {
                if timeout_seconds > 0 {
                    match tokio::time::timeout(Duration::from_secs(timeout_seconds), &mut wait).await {
                        Ok(result) => Some(result),
                        Err(_) => None,
                    }
                } else {
                    Some((&mut wait).await)
                }
            } => outcome,
        };

        self.destroy(&id).await;

        match result {
            None => AttemptResult::TimedOut,
            Some(Ok(())) => AttemptResult::Succeeded,
            Some(Err(RunnerError::ExitCode(code))) => AttemptResult::Failed {
                exit_code: Some(code),
                reason: format!("ExitCode {}", code),
                message: format!("container exited with code {}", code),
            },
            Some(Err(e)) => AttemptResult::Failed {
                exit_code: None,
                reason: "RuntimeError".to_string(),
                message: e.to_string(),
            },
        }
    }

    async fn destroy(&self, id: &str) {
        if let Err(e) = self.runner.destroy(id, DESTROY_GRACE).await {
            warn!(container = id, error = %e, "failed to destroy container");
        }
    }

    async fn report(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
        state: ReportedActionState,
        failure_reason: &str,
        message: &str,
        execution_seconds: i64,
    ) -> Result<(), ClientError> {
        self.reporter
            .report_action_status(ActionReport {
                workflow_id: workflow_id.to_string(),
                task_name: action.task_name.clone(),
                action_name: action.action.name.clone(),
                state: Some(state),
                worker_id: self.worker_id.clone(),
                execution_seconds,
                failure_reason: failure_reason.to_string(),
                message: message.to_string(),
            })
            .await
    }
}

enum ActionDisposition {
    Continue,
    Stop,
    Cancelled,
}

/// Re-emit container output as structured log records.
fn spawn_log_drain(action_id: String, action_name: String, mut logs: mpsc::Receiver<Vec<u8>>) {
    tokio::spawn(async move {
        while let Some(chunk) = logs.recv().await {
            for line in chunk.split(|b| *b == b'\n') {
                if line.is_empty() {
                    continue;
                }
                info!(
                    action_id = %action_id,
                    action = %action_name,
                    log = %String::from_utf8_lossy(line),
                    "container log"
                );
            }
        }
    });
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
