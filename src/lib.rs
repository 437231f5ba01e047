//! Debug session manager driving LLDB over an interactive CLI REPL or the
//! Debug Adapter Protocol, behind one uniform backend contract.

pub mod backend;
pub mod breakpoint;
pub mod config;
pub mod error;
pub mod execution_state;
pub mod framing;
pub mod guard;
pub mod process;
pub mod session;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use backend::{
    AddBreakpointOptions, AttachParams, Backend, ExecutionStateOptions, RunCommandOptions,
    ResumeOptions, StackOptions, VariablesOptions,
};
pub use breakpoint::{BreakpointInfo, BreakpointSpec};
pub use config::{BackendKind, DebuggerConfig, GuardMode};
pub use error::{DebuggerError, DebuggerResult};
pub use execution_state::{ExecutionState, ExecutionStatus};
pub use guard::{check_ui_automation_guard, GuardVerdict};
pub use session::{default_debugger_manager, CreateSessionParams, DebugSessionManager, SessionInfo};
