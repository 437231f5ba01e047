pub mod cli;
pub mod dap;
pub mod select;

use async_trait::async_trait;

use crate::breakpoint::{BreakpointInfo, BreakpointSpec};
use crate::error::DebuggerResult;
use crate::execution_state::ExecutionState;

pub struct AttachParams {
    pub pid: u32,
    pub simulator_id: String,
    pub wait_for: bool,
}

#[derive(Default)]
pub struct RunCommandOptions {
    pub timeout_ms: Option<u64>,
}

#[derive(Default)]
pub struct StackOptions {
    pub thread_index: Option<usize>,
    pub max_frames: Option<u32>,
}

#[derive(Default)]
pub struct VariablesOptions {
    pub frame_index: Option<u32>,
}

#[derive(Default)]
pub struct ExecutionStateOptions {
    pub timeout_ms: Option<u64>,
}

#[derive(Default)]
pub struct ResumeOptions {
    pub thread_id: Option<i64>,
}

#[derive(Default)]
pub struct AddBreakpointOptions {
    pub condition: Option<String>,
}

/// The uniform surface both transports implement. The manager routes every
/// session call through this trait without knowing which wire protocol is
/// underneath.
#[async_trait]
pub trait Backend: Send {
    async fn attach(&mut self, params: AttachParams) -> DebuggerResult<()>;

    async fn detach(&mut self) -> DebuggerResult<()>;

    async fn run_command(&mut self, command: &str, opts: RunCommandOptions) -> DebuggerResult<String>;

    async fn add_breakpoint(&mut self, spec: BreakpointSpec, opts: AddBreakpointOptions) -> DebuggerResult<BreakpointInfo>;

    async fn remove_breakpoint(&mut self, id: i64) -> DebuggerResult<()>;

    async fn get_stack(&mut self, opts: StackOptions) -> DebuggerResult<String>;

    async fn get_variables(&mut self, opts: VariablesOptions) -> DebuggerResult<String>;

    async fn get_execution_state(&mut self, opts: ExecutionStateOptions) -> DebuggerResult<ExecutionState>;

    async fn resume(&mut self, opts: ResumeOptions) -> DebuggerResult<()>;

    /// Idempotent: safe to call more than once, and safe to call before attach.
    async fn dispose(&mut self);
}
