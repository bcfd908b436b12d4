// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! anvil-protocol: the worker↔server wire protocol.
//!
//! Three operations over a stream transport: context streaming, action list
//! fetch, and action status reports, plus a keepalive ping that works
//! without an active stream. Each connection carries one request;
//! `GetWorkflowContexts` answers with a stream of context frames.

mod types;
mod wire;

pub use types::{
    ActionReport, ErrorCode, ReportedActionState, Request, Response, WorkflowAction,
    WorkflowContext, PROTOCOL_VERSION,
};
pub use wire::{
    decode, encode, read_frame, read_frame_timeout, write_frame, write_frame_timeout,
    ProtocolError, DEFAULT_TIMEOUT, KEEPALIVE_INTERVAL, KEEPALIVE_TIMEOUT, MAX_MESSAGE_SIZE,
};
