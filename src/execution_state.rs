use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Running,
    Stopped,
    Unknown,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionState {
    pub status: ExecutionStatus,
    pub reason: Option<String>,
    pub description: Option<String>,
    pub thread_id: Option<i64>,
}

impl ExecutionState {
    pub fn unknown() -> Self {
        Self { status: ExecutionStatus::Unknown, reason: None, description: None, thread_id: None }
    }

    pub fn running() -> Self {
        Self { status: ExecutionStatus::Running, reason: None, description: None, thread_id: None }
    }

    pub fn terminated() -> Self {
        Self { status: ExecutionStatus::Terminated, reason: None, description: None, thread_id: None }
    }

    pub fn stopped(reason: Option<String>, description: Option<String>, thread_id: Option<i64>) -> Self {
        Self { status: ExecutionStatus::Stopped, reason, description, thread_id }
    }
}

/// Classify `process status` output from the LLDB CLI backend. Acknowledged
/// as heuristic: LLDB gives no structured status and this relies on the
/// wording its REPL prints.
pub fn classify_process_status(output: &str) -> ExecutionState {
    let lower = output.to_ascii_lowercase();

    if lower.contains("no process") || lower.contains("exited") || lower.contains("terminated") {
        return ExecutionState::terminated();
    }

    if let Some(idx) = lower.find("stopped") {
        let _ = idx;
        let reason = output
            .lines()
            .find_map(|line| line.trim().strip_prefix("stop reason = ").map(|r| r.to_string()));
        return ExecutionState::stopped(reason, None, None);
    }

    if lower.contains("running") {
        return ExecutionState::running();
    }

    ExecutionState::unknown()
}
