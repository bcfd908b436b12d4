// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! anvil-controller: the pipeline control plane.
//!
//! Three cooperating pieces: a pure per-pipeline state machine
//! ([`advance`]), a BMC job coordinator that owns the
//! one-active-job-per-role rule, and the reconciler loop that observes
//! store changes and applies both with a single status write per pass.

pub mod advance;
pub mod bmc;
pub mod queue;
pub mod reconciler;

pub use advance::{advance, AdvanceContext, JobObservations};
pub use bmc::BmcCoordinator;
pub use queue::WorkQueue;
pub use reconciler::{ControlStore, Reconciler, Requeue, MISSING_REFERENCE_RETRY};
