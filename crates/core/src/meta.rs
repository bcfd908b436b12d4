// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Object metadata shared by every stored kind.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::validation::{validate_name, ValidationError};

fn default_namespace() -> String {
    "default".to_string()
}

/// Identity and bookkeeping fields carried by every stored object.
///
/// `resource_version` is the optimistic-concurrency token: the store bumps
/// it on every write and rejects updates whose token does not match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,

    #[serde(default = "default_namespace")]
    pub namespace: String,

    /// Store-assigned unique identifier, set on create.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub uid: String,

    #[serde(default)]
    pub resource_version: u64,

    /// Set instead of removing the object when a delete request arrives for
    /// an object that still needs teardown (pipeline cancellation).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
}

impl ObjectMeta {
    /// Metadata for a named object in a namespace.
    pub fn named(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Self::default()
        }
    }

    /// Store key: `namespace/name`.
    pub fn key(&self) -> String {
        format!("{}/{}", self.namespace, self.name)
    }

    /// True once a delete has been requested for this object.
    pub fn deletion_requested(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    /// Validate name and namespace as DNS labels.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_name(&self.name)?;
        validate_name(&self.namespace)
    }
}

/// A storable kind: serde round-trippable with embedded [`ObjectMeta`].
pub trait Object: Clone + Send + Sync + Serialize + DeserializeOwned + 'static {
    /// Kind name used in logs and store errors.
    const KIND: &'static str;

    fn meta(&self) -> &ObjectMeta;
    fn meta_mut(&mut self) -> &mut ObjectMeta;

    /// Store key: `namespace/name`.
    fn key(&self) -> String {
        self.meta().key()
    }

    /// Kind-specific invariants, enforced by the store on create and update
    /// in addition to metadata validation.
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }

    /// Called when a delete is requested. Returning true keeps the object in
    /// the store with `deletion_timestamp` set so teardown can run first;
    /// returning false lets the store remove it immediately.
    fn begin_deletion(&mut self, _now: DateTime<Utc>) -> bool {
        false
    }
}

#[cfg(test)]
#[path = "meta_tests.rs"]
mod tests;
