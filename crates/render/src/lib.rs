// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! anvil-render: deterministic rendering of workflow templates.
//!
//! A template is marshalled to YAML, evaluated as a text template against
//! the hardware spec and user params, and unmarshalled back. Missing keys
//! are hard errors; identical inputs produce byte-identical output.

mod functions;
mod render;

pub use render::{render, rendered_yaml, RenderError};
