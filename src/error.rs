use thiserror::Error;

pub type DebuggerResult<T> = Result<T, DebuggerError>;

#[derive(Error, Debug)]
pub enum DebuggerError {
    #[error("attach failed: {0}")]
    AttachError(String),

    #[error("backend has no attached session")]
    NotAttached,

    #[error("backend has been disposed")]
    Disposed,

    #[error("{operation} timed out after {budget_ms}ms")]
    Timeout { operation: String, budget_ms: u64 },

    #[error("protocol error: {0}")]
    ProtocolError(String),

    #[error("debug adapter not found: {0} (set XCODEBUILDMCP_DEBUGGER_BACKEND=lldb-cli to use the interactive CLI backend instead)")]
    AdapterMissing(String),

    #[error("operation not supported by this backend: {0}")]
    NotSupported(String),

    #[error("process is running, not stopped: {0}")]
    ProcessRunning(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DebuggerError {
    pub fn attach<S: Into<String>>(msg: S) -> Self {
        Self::AttachError(msg.into())
    }

    pub fn timeout<S: Into<String>>(operation: S, budget_ms: u64) -> Self {
        Self::Timeout { operation: operation.into(), budget_ms }
    }

    pub fn protocol<S: Into<String>>(msg: S) -> Self {
        Self::ProtocolError(msg.into())
    }

    pub fn adapter_missing<S: Into<String>>(msg: S) -> Self {
        Self::AdapterMissing(msg.into())
    }

    pub fn not_supported<S: Into<String>>(msg: S) -> Self {
        Self::NotSupported(msg.into())
    }

    pub fn process_running<S: Into<String>>(msg: S) -> Self {
        Self::ProcessRunning(msg.into())
    }

    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Configuration(msg.into())
    }
}
