//! DAP breakpoint set-reconciliation scenario (spec §8 scenario 5), driven
//! end-to-end through `DebugSessionManager`.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use xcodebuildmcp_debugger::backend::AddBreakpointOptions;
use xcodebuildmcp_debugger::breakpoint::BreakpointSpec;
use xcodebuildmcp_debugger::config::{BackendKind, DebuggerConfig};
use xcodebuildmcp_debugger::error::DebuggerError;
use xcodebuildmcp_debugger::session::{CreateSessionParams, DebugSessionManager};
use xcodebuildmcp_debugger::testing::{dap_response, ScriptedDapProcess, SingleUseSpawner, StaticAdapterExecutor};

fn dap_config() -> DebuggerConfig {
    DebuggerConfig {
        default_backend: BackendKind::Dap,
        dap_request_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

#[tokio::test]
async fn add_three_remove_middle_then_reassigned_ids_still_resolve() {
    let messages = vec![
        dap_response(1, json!({"supportsConfigurationDoneRequest": false})), // initialize
        dap_response(2, json!({})),                                          // attach
        dap_response(3, json!({"breakpoints": [{"id": 101}]})),              // add line 10
        dap_response(4, json!({"breakpoints": [{"id": 101}, {"id": 102}]})), // add line 20
        dap_response(5, json!({"breakpoints": [{"id": 101}, {"id": 102}, {"id": 103}]})), // add line 30
        dap_response(6, json!({"breakpoints": [{"id": 201}, {"id": 202}]})), // remove line 20 -> resend [10, 30]
        dap_response(7, json!({"breakpoints": [{"id": 302}]})),               // remove id 201 (line 10) -> resend [line 30]
    ];
    let spawner = Arc::new(SingleUseSpawner::new(Box::new(ScriptedDapProcess::new(messages))));
    let manager = DebugSessionManager::new(dap_config(), spawner, Arc::new(StaticAdapterExecutor::default()));

    let session = manager
        .create_session(CreateSessionParams { simulator_id: "SIM-A".into(), pid: 1, backend: None, wait_for: false })
        .await
        .unwrap();

    let bp1 = manager
        .add_breakpoint(Some(&session.id), BreakpointSpec::FileLine { file: "/f.c".into(), line: 10 }, AddBreakpointOptions::default())
        .await
        .unwrap();
    let bp2 = manager
        .add_breakpoint(Some(&session.id), BreakpointSpec::FileLine { file: "/f.c".into(), line: 20 }, AddBreakpointOptions::default())
        .await
        .unwrap();
    let bp3 = manager
        .add_breakpoint(Some(&session.id), BreakpointSpec::FileLine { file: "/f.c".into(), line: 30 }, AddBreakpointOptions::default())
        .await
        .unwrap();

    assert_eq!(bp1.id, 101);
    assert_eq!(bp2.id, 102);
    assert_eq!(bp3.id, 103);

    // Remove the middle breakpoint; the adapter reassigns the remaining two.
    manager.remove_breakpoint(Some(&session.id), bp2.id).await.unwrap();

    // The manager's records now point at the reassigned id 201 for line 10;
    // a caller removing by the *new* id must still succeed exactly once.
    manager.remove_breakpoint(Some(&session.id), 201).await.unwrap();

    let err = manager.remove_breakpoint(Some(&session.id), 201).await.unwrap_err();
    assert!(matches!(err, DebuggerError::NotFound(_)), "removing the same id twice must fail the second time");
}
