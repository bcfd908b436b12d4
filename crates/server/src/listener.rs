// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task for the worker-facing protocol.
//!
//! Accepts TLS connections and handles each in a spawned task without
//! blocking the accept loop. A connection carries one request; context
//! streams write multiple frames before closing.

use std::sync::Arc;
use std::time::Duration;

use anvil_core::{Clock, Pipeline};
use anvil_protocol::{read_frame_timeout, write_frame_timeout, ProtocolError, Request, Response};
use anvil_store::ObjectStore;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Notify;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, warn};

use crate::service::WorkflowService;

/// Deadline for reading the request off a fresh connection. Generous: the
/// worker connects right before it sends.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Deadline for writing each response frame.
const WRITE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct Listener<S, C: Clock> {
    socket: TcpListener,
    acceptor: TlsAcceptor,
    service: Arc<WorkflowService<S, C>>,
}

impl<S, C> Listener<S, C>
where
    S: ObjectStore<Pipeline> + Send + Sync + 'static,
    C: Clock,
{
    pub fn new(
        socket: TcpListener,
        acceptor: TlsAcceptor,
        service: Arc<WorkflowService<S, C>>,
    ) -> Self {
        Self {
            socket,
            acceptor,
            service,
        }
    }

    /// Accept connections until shutdown, spawning a task per connection.
    pub async fn run(self, shutdown: Arc<Notify>) {
        loop {
            tokio::select! {
                _ = shutdown.notified() => {
                    debug!("listener shutting down");
                    break;
                }
                accepted = self.socket.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let acceptor = self.acceptor.clone();
                            let service = Arc::clone(&self.service);
                            tokio::spawn(async move {
                                match acceptor.accept(stream).await {
                                    Ok(tls) => {
                                        if let Err(e) = handle_connection(tls, &service).await {
                                            match e {
                                                ProtocolError::ConnectionClosed => {
                                                    debug!(%peer, "worker disconnected")
                                                }
                                                ProtocolError::Timeout => {
                                                    warn!(%peer, "connection timeout")
                                                }
                                                _ => error!(%peer, error = %e, "connection error"),
                                            }
                                        }
                                    }
                                    Err(e) => warn!(%peer, error = %e, "TLS handshake failed"),
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection<S, C>(
    stream: TlsStream<TcpStream>,
    service: &WorkflowService<S, C>,
) -> Result<(), ProtocolError>
where
    S: ObjectStore<Pipeline>,
    C: Clock,
{
    let (mut reader, mut writer) = tokio::io::split(stream);

    let request: Request = read_frame_timeout(&mut reader, REQUEST_TIMEOUT).await?;
    debug!(request = ?request, "received request");

    for frame in service.handle(request).await {
        write_frame_timeout::<_, Response>(&mut writer, &frame, WRITE_TIMEOUT).await?;
    }

    writer.shutdown().await?;
    Ok(())
}
