// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Keyed work queue for reconciliation.
//!
//! Keys are `namespace/name` strings. Delivery is at-least-once; the
//! dispatch loop in the reconciler collapses duplicates and serialises
//! work per key.

use std::time::Duration;
use tokio::sync::mpsc;

/// Producer half of the reconcile queue.
#[derive(Clone)]
pub struct WorkQueue {
    tx: mpsc::UnboundedSender<String>,
}

impl WorkQueue {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a key for reconciliation now.
    pub fn enqueue(&self, key: impl Into<String>) {
        // Send fails only when the dispatch loop is gone, i.e. shutdown.
        let _ = self.tx.send(key.into());
    }

    /// Enqueue a key after a delay.
    pub fn enqueue_after(&self, key: impl Into<String>, delay: Duration) {
        let tx = self.tx.clone();
        let key = key.into();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(key);
        });
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
