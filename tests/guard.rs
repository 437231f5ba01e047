//! UI-automation guard scenario (spec §8 scenario 6), driven end-to-end:
//! create a session, let its execution state resolve to stopped via the
//! DAP backend's probe path, then check the guard in each mode.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use xcodebuildmcp_debugger::config::{BackendKind, DebuggerConfig, GuardMode};
use xcodebuildmcp_debugger::guard::{check_ui_automation_guard, GuardVerdict};
use xcodebuildmcp_debugger::session::{CreateSessionParams, DebugSessionManager};
use xcodebuildmcp_debugger::testing::{dap_response, ScriptedDapProcess, SingleUseSpawner, StaticAdapterExecutor};

fn dap_config() -> DebuggerConfig {
    DebuggerConfig {
        default_backend: BackendKind::Dap,
        dap_request_timeout: Duration::from_millis(500),
        ..Default::default()
    }
}

async fn stopped_session_manager() -> (DebugSessionManager, String) {
    let messages = vec![
        dap_response(1, json!({"supportsConfigurationDoneRequest": false})), // initialize
        dap_response(2, json!({})),                                          // attach
        dap_response(3, json!({"threads": [{"id": 9, "name": "main"}]})),    // threads (guard probe)
        dap_response(4, json!({"stackFrames": [{"id": 0, "name": "main", "line": 1}]})), // stackTrace probe succeeds -> stopped
    ];
    let spawner = Arc::new(SingleUseSpawner::new(Box::new(ScriptedDapProcess::new(messages))));
    let manager = DebugSessionManager::new(dap_config(), spawner, Arc::new(StaticAdapterExecutor::default()));

    let session = manager
        .create_session(CreateSessionParams { simulator_id: "SIM-A".into(), pid: 555, backend: None, wait_for: false })
        .await
        .unwrap();
    (manager, session.id)
}

#[tokio::test]
async fn error_mode_blocks_with_expected_detail_fields() {
    let (manager, _id) = stopped_session_manager().await;

    let verdict = check_ui_automation_guard(&manager, "SIM-A", "ui_tap", GuardMode::Error).await.unwrap();
    match verdict {
        GuardVerdict::Blocked { title, detail } => {
            assert!(title.contains("blocked"));
            assert!(detail.contains("tool=ui_tap"));
            assert!(detail.contains("simulatorId=SIM-A"));
            assert!(detail.contains(&format!("backend={:?}", BackendKind::Dap)));
            assert!(detail.contains("pid=555"));
            assert!(detail.contains("state=stopped"));
            assert!(detail.to_lowercase().contains("resume") || detail.to_lowercase().contains("detach"));
        }
        other => panic!("expected Blocked, got {other:?}"),
    }
}

#[tokio::test]
async fn warn_mode_returns_same_details_without_blocking() {
    let (manager, _id) = stopped_session_manager().await;
    let verdict = check_ui_automation_guard(&manager, "SIM-A", "ui_tap", GuardMode::Warn).await.unwrap();
    match verdict {
        GuardVerdict::Warning { detail } => {
            assert!(detail.contains("state=stopped"));
        }
        other => panic!("expected Warning, got {other:?}"),
    }
}

#[tokio::test]
async fn off_mode_never_produces_a_verdict() {
    let (manager, _id) = stopped_session_manager().await;
    assert!(check_ui_automation_guard(&manager, "SIM-A", "ui_tap", GuardMode::Off).await.is_none());
}

#[tokio::test]
async fn unrelated_simulator_produces_no_verdict() {
    let (manager, _id) = stopped_session_manager().await;
    assert!(check_ui_automation_guard(&manager, "SIM-OTHER", "ui_tap", GuardMode::Error).await.is_none());
}
