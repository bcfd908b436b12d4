// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TLS setup for the worker-facing listener.

use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig;
use tokio_rustls::TlsAcceptor;

#[derive(Debug, Error)]
pub enum TlsError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(String),

    #[error("no private key found in {0}")]
    NoPrivateKey(String),

    #[error("TLS configuration rejected: {0}")]
    Config(#[from] tokio_rustls::rustls::Error),
}

/// Build a TLS acceptor from a PEM certificate chain and private key.
pub fn acceptor(cert_path: &Path, key_path: &Path) -> Result<TlsAcceptor, TlsError> {
    let read = |path: &Path| {
        std::fs::File::open(path).map(BufReader::new).map_err(|source| TlsError::Io {
            path: path.display().to_string(),
            source,
        })
    };

    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut read(cert_path)?)
        .collect::<Result<_, _>>()
        .map_err(|source| TlsError::Io {
            path: cert_path.display().to_string(),
            source,
        })?;
    if certs.is_empty() {
        return Err(TlsError::NoCertificates(cert_path.display().to_string()));
    }

    let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut read(key_path)?)
        .map_err(|source| TlsError::Io {
            path: key_path.display().to_string(),
            source,
        })?
        .ok_or_else(|| TlsError::NoPrivateKey(key_path.display().to_string()))?;

    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)?;
    Ok(TlsAcceptor::from(Arc::new(config)))
}
