// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake container runner for testing

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anvil_protocol::WorkflowAction;
use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};

use super::{ContainerRunner, RunHandle, RunnerError};

/// Scripted behavior for one run of an action.
#[derive(Debug, Clone)]
pub enum FakeOutcome {
    /// Container exits 0.
    Success,
    /// Container exits non-zero.
    Exit(i64),
    /// Prepare fails (image pull or create error).
    PrepareError(String),
    /// Start fails.
    StartError(String),
    /// Container never terminates; only a timeout or cancellation ends it.
    RunsForever,
}

/// Recorded runner call
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerCall {
    Prepare { workflow_id: String, action: String },
    Run { id: String },
    Destroy { id: String },
}

struct FakeRunnerState {
    /// Outcome scripts per action name; consumed front to back per run.
    outcomes: HashMap<String, Vec<FakeOutcome>>,
    /// Log lines emitted on every run.
    log_lines: Vec<Vec<u8>>,
    calls: Vec<RunnerCall>,
    /// Maps container IDs back to the outcome chosen at prepare time.
    containers: HashMap<String, FakeOutcome>,
    next_id: u64,
}

/// Fake container runner with scripted outcomes per action name.
#[derive(Clone)]
pub struct FakeRunner {
    inner: Arc<Mutex<FakeRunnerState>>,
}

impl Default for FakeRunner {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeRunnerState {
                outcomes: HashMap::new(),
                log_lines: Vec::new(),
                calls: Vec::new(),
                containers: HashMap::new(),
                next_id: 0,
            })),
        }
    }
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Script the outcomes for an action, consumed one per attempt. The
    /// last outcome repeats once the script is exhausted.
    pub fn script(&self, action: &str, outcomes: Vec<FakeOutcome>) {
        self.inner.lock().outcomes.insert(action.to_string(), outcomes);
    }

    /// Emit these log lines on every run.
    pub fn emit_logs(&self, lines: Vec<&str>) {
        self.inner.lock().log_lines = lines.into_iter().map(|l| l.as_bytes().to_vec()).collect();
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<RunnerCall> {
        self.inner.lock().calls.clone()
    }

    /// How many times an action was prepared.
    pub fn prepare_count(&self, action: &str) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, RunnerCall::Prepare { action: a, .. } if a == action))
            .count()
    }

    /// Container IDs that were destroyed, in order.
    pub fn destroyed(&self) -> Vec<String> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                RunnerCall::Destroy { id } => Some(id.clone()),
                _ => None,
            })
            .collect()
    }

    fn next_outcome(&self, action: &str) -> FakeOutcome {
        let mut state = self.inner.lock();
        match state.outcomes.get_mut(action) {
            Some(script) if script.len() > 1 => script.remove(0),
            Some(script) => script.first().cloned().unwrap_or(FakeOutcome::Success),
            None => FakeOutcome::Success,
        }
    }
}

#[async_trait]
impl ContainerRunner for FakeRunner {
    async fn prepare(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
    ) -> Result<String, RunnerError> {
        let outcome = self.next_outcome(&action.action.name);
        let mut state = self.inner.lock();
        state.calls.push(RunnerCall::Prepare {
            workflow_id: workflow_id.to_string(),
            action: action.action.name.clone(),
        });

        if let FakeOutcome::PrepareError(message) = &outcome {
            return Err(RunnerError::Prepare(message.clone()));
        }

        state.next_id += 1;
        let id = format!("ctr-{}-{}", action.action.name, state.next_id);
        state.containers.insert(id.clone(), outcome);
        Ok(id)
    }

    async fn run(&self, id: &str, logs: mpsc::Sender<Vec<u8>>) -> Result<RunHandle, RunnerError> {
        let (outcome, log_lines) = {
            let mut state = self.inner.lock();
            state.calls.push(RunnerCall::Run { id: id.to_string() });
            let outcome = state
                .containers
                .get(id)
                .cloned()
                .unwrap_or(FakeOutcome::Success);
            (outcome, state.log_lines.clone())
        };

        if let FakeOutcome::StartError(message) = &outcome {
            return Err(RunnerError::Start(message.clone()));
        }

        tokio::spawn(async move {
            for line in log_lines {
                if logs.send(line).await.is_err() {
                    break;
                }
            }
        });

        let (tx, rx) = oneshot::channel();
        match outcome {
            FakeOutcome::Success => {
                let _ = tx.send(Ok(()));
            }
            FakeOutcome::Exit(code) => {
                let _ = tx.send(Err(RunnerError::ExitCode(code)));
            }
            FakeOutcome::RunsForever => {
                // Hold the sender so the wait never resolves.
                tokio::spawn(async move {
                    let _tx = tx;
                    std::future::pending::<()>().await;
                });
            }
            FakeOutcome::PrepareError(_) | FakeOutcome::StartError(_) => {
                let _ = tx.send(Err(RunnerError::Runtime(
                    "unreachable outcome".to_string(),
                )));
            }
        }
        Ok(RunHandle::new(rx))
    }

    async fn destroy(&self, id: &str, _grace: Duration) -> Result<(), RunnerError> {
        self.inner
            .lock()
            .calls
            .push(RunnerCall::Destroy { id: id.to_string() });
        Ok(())
    }
}
