// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! anvil-agent: the worker daemon.
//!
//! Fetches the control plane's certificate bundle, connects over TLS, and
//! executes assigned pipeline actions as containers. Connection failures
//! retry forever with randomized backoff; the process exits 0 only on a
//! clean shutdown signal.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use anvil_agent::{
    fetch_server_roots, reconnect_delay, Config, DockerRunner, ServerClient, Worker,
};
use anyhow::Context;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env().context("invalid worker configuration")?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.as_str()))
        .with_writer(std::io::stderr)
        .init();

    info!(
        worker_id = %config.worker_id,
        authority = %config.server_authority,
        "starting anvil-agent"
    );

    let runner = Arc::new(
        DockerRunner::new(config.registry_auth.clone(), config.data_dir.clone())
            .context("failed to connect to the container runtime")?,
    );

    let shutdown = Arc::new(Notify::new());
    let signal_task = {
        let shutdown = Arc::clone(&shutdown);
        tokio::spawn(async move {
            if let Ok(()) = wait_for_shutdown_signal().await {
                shutdown.notify_waiters();
            }
        })
    };

    // Establish credentials and a client, retrying forever: the agent is a
    // daemon and does not exit on connection failures.
    let client = loop {
        info!(url = %config.server_cert_url, "fetching server credentials");
        let roots = match fetch_server_roots(&config.server_cert_url).await {
            Ok(roots) => roots,
            Err(e) => {
                let delay = reconnect_delay();
                warn!(error = %e, retry_in_secs = delay.as_secs(), "failed to obtain server credentials");
                tokio::select! {
                    _ = shutdown.notified() => return Ok(()),
                    _ = tokio::time::sleep(delay) => continue,
                }
            }
        };
        match ServerClient::new(config.server_authority.clone(), roots) {
            Ok(client) => break Arc::new(client),
            Err(e) => return Err(e).context("invalid server authority"),
        }
    };

    let worker = Worker::new(client, runner, config.worker_id.clone());
    worker.run(Arc::clone(&shutdown)).await;

    signal_task.abort();
    info!("anvil-agent stopped");
    Ok(())
}

async fn wait_for_shutdown_signal() -> anyhow::Result<()> {
    let mut term = signal(SignalKind::terminate()).context("failed to install SIGTERM handler")?;
    let mut int = signal(SignalKind::interrupt()).context("failed to install SIGINT handler")?;
    tokio::select! {
        _ = term.recv() => {}
        _ = int.recv() => {}
    }
    Ok(())
}
