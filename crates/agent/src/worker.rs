// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The worker loop.
//!
//! Polls the control plane for assigned pipelines, runs each in its own
//! sequential executor task, and keeps the connection alive with periodic
//! pings. Distinct pipelines run in parallel; actions within one never do.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anvil_protocol::{
    ActionReport, ReportedActionState, WorkflowContext, KEEPALIVE_INTERVAL,
};
use parking_lot::Mutex;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ControlPlane};
use crate::executor::ActionExecutor;
use crate::runner::ContainerRunner;

/// Delay between context polls when everything is healthy.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

struct PipelineTask {
    cancel: watch::Sender<bool>,
    task: JoinHandle<()>,
}

pub struct Worker<C, R> {
    client: Arc<C>,
    executor: Arc<ActionExecutor<R, C>>,
    worker_id: String,
    pipelines: Mutex<HashMap<String, PipelineTask>>,
}

impl<C, R> Worker<C, R>
where
    C: ControlPlane,
    R: ContainerRunner,
{
    pub fn new(client: Arc<C>, runner: Arc<R>, worker_id: impl Into<String>) -> Self {
        let worker_id = worker_id.into();
        Self {
            executor: Arc::new(ActionExecutor::new(
                runner,
                Arc::clone(&client),
                worker_id.clone(),
            )),
            client,
            worker_id,
            pipelines: Mutex::new(HashMap::new()),
        }
    }

    /// One poll: fetch assigned contexts and reconcile local execution
    /// tasks with them.
    pub async fn poll_once(&self) -> Result<(), ClientError> {
        let contexts = self.client.workflow_contexts(&self.worker_id).await?;
        self.reap_finished();

        for context in contexts {
            if context.pipeline_state.as_deref() == Some("Cancelling") {
                self.cancel_pipeline(&context).await;
                continue;
            }
            if self.pipelines.lock().contains_key(&context.workflow_id) {
                continue;
            }
            self.start_pipeline(context);
        }
        Ok(())
    }

    /// Run until `shutdown` is notified, reconnecting with randomized
    /// backoff on any transport failure. The worker is a daemon: it does
    /// not exit on errors.
    pub async fn run(&self, shutdown: Arc<Notify>) {
        let keepalive = self.spawn_keepalive();

        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    info!("worker shutting down");
                    break;
                }
                result = self.poll_once() => {
                    let delay = match result {
                        Ok(()) => POLL_INTERVAL,
                        Err(e) => {
                            let delay = crate::client::reconnect_delay();
                            warn!(
                                error = %e,
                                retry_in_secs = delay.as_secs(),
                                "control plane poll failed; reconnecting"
                            );
                            delay
                        }
                    };
                    tokio::select! {
                        _ = shutdown.notified() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }

        keepalive.abort();
        self.abort_all().await;
    }

    /// Signal every running pipeline to abort and wait for the executors
    /// to destroy their containers.
    pub async fn abort_all(&self) {
        let tasks: Vec<PipelineTask> = {
            let mut pipelines = self.pipelines.lock();
            pipelines.drain().map(|(_, t)| t).collect()
        };
        for task in &tasks {
            let _ = task.cancel.send(true);
        }
        for task in tasks {
            let _ = task.task.await;
        }
    }

    fn start_pipeline(&self, context: WorkflowContext) {
        let workflow_id = context.workflow_id.clone();
        info!(
            workflow = %workflow_id,
            action_index = context.current_action_index,
            total = context.total_number_of_actions,
            "picking up pipeline"
        );

        let (cancel_tx, cancel_rx) = watch::channel(false);
        let client = Arc::clone(&self.client);
        let executor = Arc::clone(&self.executor);
        let id = workflow_id.clone();
        let task = tokio::spawn(async move {
            let actions = match client.workflow_actions(&id).await {
                Ok(actions) => actions,
                Err(e) => {
                    warn!(workflow = %id, error = %e, "failed to fetch actions");
                    return;
                }
            };

            // Resume from the currently assigned action.
            let start = (context.current_action_index as usize).min(actions.len());
            match executor.execute_workflow(&id, &actions[start..], cancel_rx).await {
                Ok(outcome) => info!(workflow = %id, outcome = ?outcome, "pipeline finished"),
                Err(e) => warn!(workflow = %id, error = %e, "pipeline reporting failed"),
            }
        });

        self.pipelines
            .lock()
            .insert(workflow_id, PipelineTask { cancel: cancel_tx, task });
    }

    /// Abort a cancelling pipeline. If nothing is running locally the
    /// cancellation is acknowledged with a direct report.
    async fn cancel_pipeline(&self, context: &WorkflowContext) {
        let signalled = {
            let pipelines = self.pipelines.lock();
            match pipelines.get(&context.workflow_id) {
                Some(entry) => entry.cancel.send(true).is_ok(),
                None => false,
            }
        };
        if signalled {
            debug!(workflow = %context.workflow_id, "cancellation signalled to executor");
            return;
        }

        let report = ActionReport {
            workflow_id: context.workflow_id.clone(),
            task_name: context.current_task.clone(),
            action_name: context.current_action.clone(),
            state: Some(ReportedActionState::Failed),
            worker_id: self.worker_id.clone(),
            execution_seconds: 0,
            failure_reason: "Cancelled".to_string(),
            message: "no action in flight".to_string(),
        };
        if let Err(e) = self.client.report_action_status(report).await {
            warn!(workflow = %context.workflow_id, error = %e, "failed to acknowledge cancellation");
        }
    }

    fn reap_finished(&self) {
        self.pipelines.lock().retain(|workflow_id, entry| {
            if entry.task.is_finished() {
                debug!(workflow = %workflow_id, "pipeline task finished");
                false
            } else {
                true
            }
        });
    }

    fn spawn_keepalive(&self) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(KEEPALIVE_INTERVAL).await;
                if let Err(e) = client.ping().await {
                    debug!(error = %e, "keepalive ping failed");
                }
            }
        })
    }
}

#[cfg(test)]
#[path = "worker_tests.rs"]
mod tests;
