// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-plane client.
//!
//! TLS roots come from a PEM bundle fetched over HTTP at startup. Each
//! operation opens a connection, exchanges frames, and closes; the
//! keepalive ping works the same way without an active stream.

use std::sync::Arc;
use std::time::Duration;

use anvil_protocol::{
    read_frame_timeout, write_frame_timeout, ActionReport, ErrorCode, ProtocolError, Request,
    Response, WorkflowAction, WorkflowContext, KEEPALIVE_TIMEOUT,
};
use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use thiserror::Error;

/// Deadline for a single frame exchange.
const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("failed to fetch server certificates from {url}: {message}")]
    CertFetch { url: String, message: String },

    #[error("no usable certificates in the bundle from {0}")]
    EmptyCertBundle(String),

    #[error("invalid server authority {0:?}")]
    InvalidAuthority(String),

    #[error("connect to {authority} failed: {source}")]
    Connect {
        authority: String,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error("server rejected request ({code}): {message}")]
    Rejected { code: ErrorCode, message: String },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl ClientError {
    /// Rejections are authoritative server answers; everything else is a
    /// transport problem the daemon retries with backoff.
    pub fn is_rejection(&self) -> bool {
        matches!(self, ClientError::Rejected { .. })
    }
}

/// Fetch the server's PEM certificate bundle and build a root store.
pub async fn fetch_server_roots(url: &str) -> Result<RootCertStore, ClientError> {
    let fetch_err = |message: String| ClientError::CertFetch {
        url: url.to_string(),
        message,
    };

    let response = reqwest::get(url).await.map_err(|e| fetch_err(e.to_string()))?;
    let pem = response
        .error_for_status()
        .map_err(|e| fetch_err(e.to_string()))?
        .bytes()
        .await
        .map_err(|e| fetch_err(e.to_string()))?;

    let mut reader = std::io::BufReader::new(pem.as_ref());
    let mut roots = RootCertStore::empty();
    let mut added = 0usize;
    for cert in rustls_pemfile::certs(&mut reader) {
        let cert = cert.map_err(|e| fetch_err(e.to_string()))?;
        if roots.add(cert).is_ok() {
            added += 1;
        }
    }
    if added == 0 {
        return Err(ClientError::EmptyCertBundle(url.to_string()));
    }
    Ok(roots)
}

/// Randomized delay between reconnect attempts: uniform in [1, 120] s.
pub fn reconnect_delay() -> Duration {
    use rand::Rng;
    Duration::from_secs(rand::rng().random_range(1..=120))
}

/// The worker's view of the control plane, narrow enough to fake in tests.
#[async_trait]
pub trait StatusReporter: Send + Sync + 'static {
    async fn report_action_status(&self, report: ActionReport) -> Result<(), ClientError>;
}

#[async_trait]
pub trait ControlPlane: StatusReporter {
    async fn workflow_contexts(&self, worker_id: &str)
        -> Result<Vec<WorkflowContext>, ClientError>;

    async fn workflow_actions(&self, workflow_id: &str)
        -> Result<Vec<WorkflowAction>, ClientError>;

    async fn ping(&self) -> Result<(), ClientError>;
}

/// TLS client for the worker↔server protocol.
pub struct ServerClient {
    authority: String,
    server_name: ServerName<'static>,
    connector: TlsConnector,
}

impl ServerClient {
    pub fn new(authority: impl Into<String>, roots: RootCertStore) -> Result<Self, ClientError> {
        let authority = authority.into();
        let host = authority
            .rsplit_once(':')
            .map(|(host, _)| host)
            .unwrap_or(authority.as_str());
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| ClientError::InvalidAuthority(authority.clone()))?;

        let config = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();

        Ok(Self {
            authority,
            server_name,
            connector: TlsConnector::from(Arc::new(config)),
        })
    }

    async fn connect(&self) -> Result<TlsStream<TcpStream>, ClientError> {
        let connect_err = |source: std::io::Error| ClientError::Connect {
            authority: self.authority.clone(),
            source,
        };
        let tcp = TcpStream::connect(&self.authority).await.map_err(connect_err)?;
        self.connector
            .connect(self.server_name.clone(), tcp)
            .await
            .map_err(connect_err)
    }

    /// Open a connection, send one request, and collect the response
    /// frames (a context stream reads until StreamEnd).
    async fn exchange(
        &self,
        request: &Request,
        timeout: Duration,
    ) -> Result<Vec<Response>, ClientError> {
        let stream = self.connect().await?;
        let (mut reader, mut writer) = tokio::io::split(stream);
        write_frame_timeout(&mut writer, request, timeout).await?;

        let mut frames = Vec::new();
        loop {
            let frame: Response = read_frame_timeout(&mut reader, timeout).await?;
            match frame {
                Response::Error { code, message } => {
                    return Err(ClientError::Rejected { code, message })
                }
                Response::StreamEnd => break,
                Response::Context { .. } => frames.push(frame),
                other => {
                    frames.push(other);
                    break;
                }
            }
        }
        Ok(frames)
    }
}

#[async_trait]
impl StatusReporter for ServerClient {
    async fn report_action_status(&self, report: ActionReport) -> Result<(), ClientError> {
        let frames = self
            .exchange(
                &Request::ReportActionStatus { report },
                EXCHANGE_TIMEOUT,
            )
            .await?;
        match frames.first() {
            Some(Response::Ack) => Ok(()),
            other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
        }
    }
}

#[async_trait]
impl ControlPlane for ServerClient {
    async fn workflow_contexts(
        &self,
        worker_id: &str,
    ) -> Result<Vec<WorkflowContext>, ClientError> {
        let frames = self
            .exchange(
                &Request::GetWorkflowContexts {
                    worker_id: worker_id.to_string(),
                },
                EXCHANGE_TIMEOUT,
            )
            .await?;
        Ok(frames
            .into_iter()
            .filter_map(|frame| match frame {
                Response::Context { context } => Some(context),
                _ => None,
            })
            .collect())
    }

    async fn workflow_actions(
        &self,
        workflow_id: &str,
    ) -> Result<Vec<WorkflowAction>, ClientError> {
        let frames = self
            .exchange(
                &Request::GetWorkflowActions {
                    workflow_id: workflow_id.to_string(),
                },
                EXCHANGE_TIMEOUT,
            )
            .await?;
        match frames.into_iter().next() {
            Some(Response::Actions { actions }) => Ok(actions),
            other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
        }
    }

    async fn ping(&self) -> Result<(), ClientError> {
        let frames = self.exchange(&Request::Ping, KEEPALIVE_TIMEOUT).await?;
        match frames.first() {
            Some(Response::Pong) => Ok(()),
            other => Err(ClientError::UnexpectedResponse(format!("{:?}", other))),
        }
    }
}

/// Recording reporter for tests.
#[cfg(any(test, feature = "test-support"))]
#[derive(Clone, Default)]
pub struct FakeReporter {
    reports: Arc<parking_lot::Mutex<Vec<ActionReport>>>,
    rejection: Arc<parking_lot::Mutex<Option<(ErrorCode, String)>>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// All reports received so far.
    pub fn reports(&self) -> Vec<ActionReport> {
        self.reports.lock().clone()
    }

    /// Make every subsequent report fail with the given rejection.
    pub fn reject_with(&self, code: ErrorCode, message: impl Into<String>) {
        *self.rejection.lock() = Some((code, message.into()));
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl StatusReporter for FakeReporter {
    async fn report_action_status(&self, report: ActionReport) -> Result<(), ClientError> {
        if let Some((code, message)) = self.rejection.lock().clone() {
            return Err(ClientError::Rejected { code, message });
        }
        self.reports.lock().push(report);
        Ok(())
    }
}
