// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn requests_tag_by_type() {
    let req = Request::GetWorkflowContexts {
        worker_id: "agent1".to_string(),
    };
    let json = serde_json::to_string(&req).unwrap();
    assert_eq!(
        json,
        r#"{"type":"GetWorkflowContexts","worker_id":"agent1"}"#
    );
    let parsed: Request = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, req);
}

#[test]
fn report_round_trips() {
    let report = ActionReport {
        workflow_id: "deploy".to_string(),
        task_name: "wf1".to_string(),
        action_name: "install".to_string(),
        state: Some(ReportedActionState::Failed),
        worker_id: "agent1".to_string(),
        execution_seconds: 42,
        failure_reason: "ExitCode 2".to_string(),
        message: "container exited with code 2".to_string(),
    };
    let bytes = serde_json::to_vec(&Request::ReportActionStatus {
        report: report.clone(),
    })
    .unwrap();
    match serde_json::from_slice(&bytes).unwrap() {
        Request::ReportActionStatus { report: parsed } => assert_eq!(parsed, report),
        other => panic!("unexpected request: {:?}", other),
    }
}

#[test]
fn stream_end_has_no_payload() {
    let json = serde_json::to_string(&Response::StreamEnd).unwrap();
    assert_eq!(json, r#"{"type":"StreamEnd"}"#);
}

#[test]
fn error_response_carries_code() {
    let resp = Response::Error {
        code: ErrorCode::InvalidArgument,
        message: "invalid action reported".to_string(),
    };
    let json = serde_json::to_string(&resp).unwrap();
    let parsed: Response = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, resp);
    assert_eq!(ErrorCode::InvalidArgument.to_string(), "InvalidArgument");
}
