//! End-to-end scenarios for the bridge operations against a mock session.

use std::path::Path;
use std::sync::Arc;

use matlab_mcp::config::ScratchConfig;
use matlab_mcp::session::{MockBehavior, MockCall, MockSession};
use matlab_mcp::{
    Bridge, ExecutionEngine, ExecutionStage, GetVariableResponse, JsonValue, NativeValue,
    RunCodeResponse, SessionError,
};

fn bridge_with(session: MockSession, scratch_dir: &Path) -> (Bridge, Arc<MockSession>) {
    let session = Arc::new(session);
    let engine = ExecutionEngine::new(ScratchConfig {
        directory: Some(scratch_dir.to_path_buf()),
        ..ScratchConfig::default()
    });
    (Bridge::new(session.clone(), engine), session)
}

fn scratch_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir).unwrap().next().is_none()
}

#[tokio::test]
async fn assignment_runs_as_script() {
    let dir = tempfile::tempdir().unwrap();
    let (bridge, session) = bridge_with(MockSession::new(), dir.path());

    let response = bridge.run_code("x = 5;".to_string()).await;

    match response {
        RunCodeResponse::Success { output } => assert!(output.contains("via script")),
        other => panic!("expected success, got {:?}", other),
    }
    assert_eq!(session.capture_calls(), 0);
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn bare_expression_falls_back_to_capture() {
    let dir = tempfile::tempdir().unwrap();
    let session = MockSession::new()
        .with_script(MockBehavior::Fail(SessionError::Execution(
            "Expression statements are not allowed in this script".to_string(),
        )))
        .with_capture(MockBehavior::Return("\nans =\n\n     2\n\n".to_string()));
    let (bridge, session) = bridge_with(session, dir.path());

    let response = bridge.run_code("1 + 1".to_string()).await;

    match response {
        RunCodeResponse::Success { output } => assert!(output.contains('2')),
        other => panic!("expected success, got {:?}", other),
    }
    let calls = session.calls();
    assert!(matches!(calls[0], MockCall::ExecuteScript { .. }));
    assert_eq!(calls[1], MockCall::EvaluateCapture("1 + 1".to_string()));
    assert!(scratch_is_empty(dir.path()));
}

#[tokio::test]
async fn scratch_io_failure_skips_capture() {
    let dir = tempfile::tempdir().unwrap();
    let (bridge, session) = bridge_with(MockSession::new(), &dir.path().join("missing"));

    let response = bridge.run_code("x = 1;".to_string()).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error_type"], "IOFault");
    assert_eq!(json["stage"], "FileRun");
    assert!(session.calls().is_empty());
    assert!(matches!(
        response,
        RunCodeResponse::Error {
            stage: Some(ExecutionStage::FileRun),
            ..
        }
    ));
}

#[tokio::test]
async fn empty_variable_name_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (bridge, session) = bridge_with(MockSession::new(), dir.path());

    let response = bridge.get_variable(String::new()).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "error");
    assert_eq!(json["error_type"], "InvalidArgument");
    assert!(!json["message"].as_str().unwrap().is_empty());
    assert!(session.calls().is_empty());
}

#[tokio::test]
async fn missing_variable_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let (bridge, session) = bridge_with(MockSession::new(), dir.path());

    let response = bridge.get_variable("x".to_string()).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["error_type"], "NotFound");
    assert!(!session
        .calls()
        .iter()
        .any(|c| matches!(c, MockCall::WorkspaceGet(_))));
}

#[tokio::test]
async fn matrix_variable_round_trips_as_nested_lists() {
    let dir = tempfile::tempdir().unwrap();
    let session = MockSession::new().with_variable(
        "M",
        NativeValue::NumericArray {
            shape: vec![2, 3],
            data: vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
        },
    );
    let (bridge, _) = bridge_with(session, dir.path());

    let response = bridge.get_variable("M".to_string()).await;

    let GetVariableResponse::Success { variable, value } = &response else {
        panic!("expected success, got {:?}", response);
    };
    assert_eq!(variable, "M");
    let JsonValue::List(rows) = value else {
        panic!("expected rows");
    };
    assert_eq!(rows.len(), 2);

    let text = serde_json::to_string(&response).unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(
        parsed["value"],
        serde_json::json!([[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]])
    );
}

#[tokio::test]
async fn struct_variable_degrades_to_string() {
    let dir = tempfile::tempdir().unwrap();
    let session = MockSession::new().with_variable(
        "s",
        NativeValue::Opaque {
            type_tag: "struct".to_string(),
            display: None,
        },
    );
    let (bridge, _) = bridge_with(session, dir.path());

    let response = bridge.get_variable("s".to_string()).await;

    let json = serde_json::to_value(&response).unwrap();
    assert_eq!(json["status"], "success");
    assert_eq!(json["value"], "Unserializable MATLAB type: struct");
}
