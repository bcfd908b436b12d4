// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The object store interface consumed by the control plane.

use anvil_core::Object;
use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors from store operations
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("{kind} {key:?} not found")]
    NotFound { kind: &'static str, key: String },

    #[error("{kind} {key:?} already exists")]
    AlreadyExists { kind: &'static str, key: String },

    #[error("{kind} {key:?} write conflict: resource version {presented} does not match {current}")]
    Conflict {
        kind: &'static str,
        key: String,
        presented: u64,
        current: u64,
    },

    #[error("invalid object: {0}")]
    Invalid(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// A change observed through a watch.
#[derive(Debug, Clone)]
pub enum WatchEvent<T> {
    /// The object was created or updated (including cancellation marks).
    Applied(T),
    /// The object was removed from the store.
    Deleted(T),
}

impl<T: Object> WatchEvent<T> {
    pub fn object(&self) -> &T {
        match self {
            WatchEvent::Applied(o) | WatchEvent::Deleted(o) => o,
        }
    }
}

/// Typed store operations for one kind.
///
/// `update` and `update_status` both replace the stored object under a
/// resource-version match; they are separate entry points because spec and
/// status have different writers, and implementations may enforce that.
#[async_trait]
pub trait ObjectStore<T: Object>: Send + Sync {
    async fn get(&self, namespace: &str, name: &str) -> Result<T, StoreError>;

    async fn list(&self, namespace: &str) -> Result<Vec<T>, StoreError>;

    async fn create(&self, object: T) -> Result<T, StoreError>;

    async fn update(&self, object: T) -> Result<T, StoreError>;

    async fn update_status(&self, object: T) -> Result<T, StoreError>;

    async fn delete(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Subscribe to changes of this kind. Events begin at subscription time.
    fn watch(&self) -> broadcast::Receiver<WatchEvent<T>>;
}
