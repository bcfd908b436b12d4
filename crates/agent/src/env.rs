// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worker configuration from environment variables.
//!
//! Assembled once at startup into an immutable [`Config`] passed down;
//! nothing reads the environment after that.

use std::collections::HashMap;
use std::path::PathBuf;
use thiserror::Error;

/// Environment variable names.
const SERVER_URL: &str = "TINK_SERVER_URL";
const GRPC_AUTHORITY: &str = "TINK_SERVER_GRPC_AUTHORITY";
const WORKER_ID: &str = "WORKER_ID";
const LOG_LEVEL: &str = "LOG_LEVEL";
const DATA_DIR: &str = "DATA_DIR";
const REGISTRY_AUTH: &str = "REGISTRY_AUTH";

const DEFAULT_DATA_DIR: &str = "/var/lib/anvil";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("{name} is invalid: {message}")]
    Invalid { name: &'static str, message: String },
}

/// Log verbosity accepted from the environment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
}

impl LogLevel {
    fn parse(s: &str) -> Result<Self, ConfigError> {
        match s {
            "trace" => Ok(LogLevel::Trace),
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            other => Err(ConfigError::Invalid {
                name: LOG_LEVEL,
                message: format!("{:?} is not one of trace, debug, info", other),
            }),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
        }
    }
}

/// Immutable worker configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTPS URL serving the server's PEM certificate bundle.
    pub server_cert_url: String,

    /// host:port of the control-plane protocol endpoint.
    pub server_authority: String,

    /// This agent's identity.
    pub worker_id: String,

    pub log_level: LogLevel,

    /// Host directory mounted into each action container at `/workflow`.
    pub data_dir: PathBuf,

    /// Registry prefix to base64 auth token.
    pub registry_auth: HashMap<String, String>,
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration from an arbitrary lookup, for tests.
    pub fn from_lookup(lookup: impl Fn(&'static str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &'static str| -> Result<String, ConfigError> {
            match lookup(name) {
                Some(v) if !v.is_empty() => Ok(v),
                _ => Err(ConfigError::Missing(name)),
            }
        };

        let registry_auth = match lookup(REGISTRY_AUTH) {
            None => HashMap::new(),
            Some(raw) if raw.is_empty() => HashMap::new(),
            Some(raw) => {
                serde_json::from_str(&raw).map_err(|e| ConfigError::Invalid {
                    name: REGISTRY_AUTH,
                    message: format!("not a JSON object of registry to auth token: {}", e),
                })?
            }
        };

        Ok(Self {
            server_cert_url: required(SERVER_URL)?,
            server_authority: required(GRPC_AUTHORITY)?,
            worker_id: required(WORKER_ID)?,
            log_level: match lookup(LOG_LEVEL) {
                Some(level) if !level.is_empty() => LogLevel::parse(&level)?,
                _ => LogLevel::default(),
            },
            data_dir: lookup(DATA_DIR)
                .filter(|d| !d.is_empty())
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR)),
            registry_auth,
        })
    }

    /// Auth token for an image, selected by the longest matching registry
    /// prefix.
    pub fn auth_for_image(&self, image: &str) -> Option<&str> {
        self.registry_auth
            .iter()
            .filter(|(registry, _)| image.starts_with(registry.as_str()))
            .max_by_key(|(registry, _)| registry.len())
            .map(|(_, token)| token.as_str())
    }
}

#[cfg(test)]
#[path = "env_tests.rs"]
mod tests;
