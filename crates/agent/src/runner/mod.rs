// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Container runtime adapters.

mod docker;

pub use docker::DockerRunner;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeOutcome, FakeRunner, RunnerCall};

use anvil_protocol::WorkflowAction;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Errors from container operations
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("failed to prepare container: {0}")]
    Prepare(String),

    #[error("failed to start container: {0}")]
    Start(String),

    #[error("container exited with code {0}")]
    ExitCode(i64),

    #[error("runtime error: {0}")]
    Runtime(String),
}

impl RunnerError {
    /// Only non-zero exits are eligible for retries.
    pub fn exit_code(&self) -> Option<i64> {
        match self {
            RunnerError::ExitCode(code) => Some(*code),
            _ => None,
        }
    }
}

/// Completion handle for a started container.
///
/// Separating start from wait lets background actions detach: the executor
/// reports success once the start lands and drops the handle.
pub struct RunHandle {
    rx: oneshot::Receiver<Result<(), RunnerError>>,
}

impl RunHandle {
    pub fn new(rx: oneshot::Receiver<Result<(), RunnerError>>) -> Self {
        Self { rx }
    }

    /// Wait for the container to terminate. Ok means exit code 0.
    pub async fn wait(self) -> Result<(), RunnerError> {
        match self.rx.await {
            Ok(result) => result,
            Err(_) => Err(RunnerError::Runtime(
                "container wait task dropped".to_string(),
            )),
        }
    }
}

/// Adapter for running one action as a container.
#[async_trait]
pub trait ContainerRunner: Send + Sync + 'static {
    /// Pull the image and create (not start) a container for the action.
    /// Returns the container ID.
    async fn prepare(
        &self,
        workflow_id: &str,
        action: &WorkflowAction,
    ) -> Result<String, RunnerError>;

    /// Start the container. Log lines flow into `logs` as they appear; the
    /// returned handle resolves when the container terminates.
    async fn run(
        &self,
        id: &str,
        logs: mpsc::Sender<Vec<u8>>,
    ) -> Result<RunHandle, RunnerError>;

    /// Stop and remove the container with force and volume removal. Runs
    /// under its own `grace` deadline so shutdown never leaks a container.
    async fn destroy(&self, id: &str, grace: Duration) -> Result<(), RunnerError>;
}
