// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! anvild: the anvil control-plane daemon.
//!
//! Runs the embedded object store, the pipeline reconciler, and the
//! TLS-secured worker protocol listener in one process.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anvil_controller::Reconciler;
use anvil_core::{SystemClock, UuidIdGen};
use anvil_server::{seed, tls, Listener, WorkflowService};
use anvil_store::MemoryStore;
use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "anvild", about = "anvil provisioning control-plane daemon", version)]
struct Args {
    /// Address to serve the worker protocol on
    #[arg(long, default_value = "0.0.0.0:42113")]
    listen: SocketAddr,

    /// PEM certificate chain for the worker-facing TLS endpoint
    #[arg(long)]
    cert: PathBuf,

    /// PEM private key for the certificate
    #[arg(long)]
    key: PathBuf,

    /// Namespace served to workers
    #[arg(long, default_value = "default")]
    namespace: String,

    /// Log level: trace, debug, or info
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log file path; logs go to stderr when unset
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory of YAML manifests loaded into the embedded store at startup
    #[arg(long)]
    seed_dir: Option<PathBuf>,
}

fn setup_logging(args: &Args) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_new(&args.log_level)
        .with_context(|| format!("invalid log level {:?}", args.log_level))?;

    match &args.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path
                .file_name()
                .context("log file path has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let _log_guard = setup_logging(&args)?;

    info!(listen = %args.listen, namespace = %args.namespace, "starting anvild");

    let store = MemoryStore::new();

    if let Some(dir) = &args.seed_dir {
        let loaded = seed::load_dir(&store, dir)
            .await
            .with_context(|| format!("failed to seed from {}", dir.display()))?;
        info!(count = loaded, dir = %dir.display(), "seeded store");
    }

    let shutdown = Arc::new(Notify::new());

    let reconciler = Arc::new(Reconciler::new(store.clone(), SystemClock, UuidIdGen));
    let reconciler_task = tokio::spawn(reconciler.run(Arc::clone(&shutdown)));

    let acceptor = tls::acceptor(&args.cert, &args.key).context("failed to set up TLS")?;
    let socket = TcpListener::bind(args.listen)
        .await
        .with_context(|| format!("failed to bind {}", args.listen))?;
    let service = Arc::new(WorkflowService::new(
        Arc::new(store),
        SystemClock,
        args.namespace.clone(),
    ));
    let listener = Listener::new(socket, acceptor, service);
    let listener_task = tokio::spawn(listener.run(Arc::clone(&shutdown)));

    wait_for_shutdown_signal().await?;
    info!("shutdown signal received");
    shutdown.notify_waiters();

    let _ = listener_task.await;
    let _ = reconciler_task.await;
    info!("anvild stopped");
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
