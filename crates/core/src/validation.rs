// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared validation error type and field patterns.

use regex::Regex;
use std::sync::LazyLock;
use thiserror::Error;

/// Validation failure for a stored object.
///
/// Rejections are synchronous; the caller may retry with corrected input.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("invalid name {name:?}: must be a DNS label (lowercase alphanumeric and '-', max 63 chars)")]
    InvalidName { name: String },

    #[error("invalid MAC address {mac:?}: must match ([0-9a-f]{{2}}:){{5}}[0-9a-f]{{2}}")]
    InvalidMac { mac: String },

    #[error("interface {mac}: {message}")]
    InvalidIpam { mac: String, message: String },

    #[error("invalid storage device {path:?}: {message}")]
    InvalidStorageDevice { path: String, message: String },

    #[error("workflow must declare at least one action")]
    NoActions,

    #[error("duplicate action name {name:?}: action names must be unique within a workflow")]
    DuplicateActionName { name: String },

    #[error("action {name:?}: {message}")]
    InvalidAction { name: String, message: String },

    #[error("pipeline must declare at least one workflow entry")]
    NoWorkflows,

    #[error("workflow entry {index}: {message}")]
    InvalidWorkflowEntry { index: usize, message: String },

    #[error("boot options: {message}")]
    InvalidBootOptions { message: String },
}

/// DNS label: object names and namespaces.
// Allow expect here as the regex is compile-time verified to be valid
#[allow(clippy::expect_used)]
pub static NAME_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]([-a-z0-9]*[a-z0-9])?$").expect("constant regex pattern is valid")
});

/// Canonical MAC address form: lowercase colon-separated hex pairs.
#[allow(clippy::expect_used)]
pub static MAC_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([0-9a-f]{2}:){5}[0-9a-f]{2}$").expect("constant regex pattern is valid")
});

/// Rooted absolute Unix path without empty or blank segments.
#[allow(clippy::expect_used)]
pub static DEVICE_PATH_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(/[^/ ]+)+$").expect("constant regex pattern is valid"));

/// Disk device basename that names a partition rather than a whole disk
/// (`sda1`, `vdb2`, `nvme0n1p3`).
#[allow(clippy::expect_used)]
pub static PARTITION_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([shv]d[a-z]+\d+|nvme\d+n\d+p\d+)$").expect("constant regex pattern is valid")
});

/// Validate an object name or namespace as a DNS label.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.len() > 63 || !NAME_PATTERN.is_match(name) {
        return Err(ValidationError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(())
}
