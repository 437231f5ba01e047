//! Interactive CLI backend: drives `lldb`'s REPL via the prompt+sentinel
//! framing protocol described in [`crate::framing::sentinel`].

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use std::sync::OnceLock;
use tracing::{debug, info, warn};

use crate::backend::{
    AddBreakpointOptions, AttachParams, Backend, ExecutionStateOptions, RunCommandOptions,
    ResumeOptions, StackOptions, VariablesOptions,
};
use crate::breakpoint::{BreakpointInfo, BreakpointSpec};
use crate::error::{DebuggerError, DebuggerResult};
use crate::execution_state::{classify_process_status, ExecutionState};
use crate::framing::sentinel::{looks_like_error, sentinel_print_command, SentinelBuffer, PROMPT};
use crate::process::{InteractiveProcess, ProcessSpawner};

fn breakpoint_id_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Breakpoint (\d+):").unwrap())
}

pub struct LldbCliBackend {
    spawner: Arc<dyn ProcessSpawner>,
    lldb_path: String,
    process: Option<Box<dyn InteractiveProcess>>,
    buffer: SentinelBuffer,
    attached: bool,
    disposed: bool,
    startup_timeout: Duration,
    command_timeout: Duration,
}

impl LldbCliBackend {
    pub fn new(
        spawner: Arc<dyn ProcessSpawner>,
        lldb_path: String,
        startup_timeout: Duration,
        command_timeout: Duration,
    ) -> Self {
        Self {
            spawner,
            lldb_path,
            process: None,
            buffer: SentinelBuffer::new(),
            attached: false,
            disposed: false,
            startup_timeout,
            command_timeout,
        }
    }

    fn require_process(&mut self) -> DebuggerResult<&mut Box<dyn InteractiveProcess>> {
        if self.disposed {
            return Err(DebuggerError::Disposed);
        }
        self.process.as_mut().ok_or(DebuggerError::NotAttached)
    }

    /// Write a command followed by the sentinel-print request and wait for
    /// the sentinel to come back.
    async fn run_command_raw(&mut self, command: &str, timeout: Duration) -> DebuggerResult<String> {
        {
            let process = self.require_process()?;
            process.write(format!("{command}\n").as_bytes()).await?;
            process.write(format!("{}\n", sentinel_print_command()).as_bytes()).await?;
        }
        self.await_sentinel(timeout, command).await
    }

    async fn await_sentinel(&mut self, timeout: Duration, operation: &str) -> DebuggerResult<String> {
        let deadline = tokio::time::Instant::now() + timeout;

        loop {
            if let Some(output) = self.buffer.take_completed() {
                return Ok(output);
            }

            let remaining = deadline.saturating_duration_since(tokio::time::Instant::now());
            if remaining.is_zero() {
                return Err(DebuggerError::timeout(operation.to_string(), timeout.as_millis() as u64));
            }

            let process = self.require_process()?;
            match tokio::time::timeout(remaining, process.read_chunk()).await {
                Ok(Ok(Some(bytes))) => self.buffer.push(&bytes),
                Ok(Ok(None)) => {
                    self.disposed = true;
                    return Err(DebuggerError::protocol(format!(
                        "lldb process exited unexpectedly while waiting for '{operation}'"
                    )));
                }
                Ok(Err(e)) => return Err(e),
                Err(_) => {
                    return Err(DebuggerError::timeout(operation.to_string(), timeout.as_millis() as u64))
                }
            }
        }
    }

    async fn prime_readiness(&mut self) -> DebuggerResult<()> {
        {
            let process = self.require_process()?;
            process.write(format!("{}\n", sentinel_print_command()).as_bytes()).await?;
        }
        self.await_sentinel(self.startup_timeout, "lldb startup").await?;
        Ok(())
    }
}

#[async_trait]
impl Backend for LldbCliBackend {
    async fn attach(&mut self, params: AttachParams) -> DebuggerResult<()> {
        let prompt_opt = format!("settings set prompt {PROMPT}");
        let process = self
            .spawner
            .spawn(&self.lldb_path, &["--no-lldbinit".to_string(), "-o".to_string(), prompt_opt])
            .await?;
        self.process = Some(process);

        if let Err(e) = self.prime_readiness().await {
            self.dispose().await;
            return Err(e);
        }

        let mut command = format!("process attach --pid {}", params.pid);
        if params.wait_for {
            command.push_str(" --waitfor");
        }

        let output = match self.run_command_raw(&command, self.command_timeout).await {
            Ok(out) => out,
            Err(e) => {
                self.dispose().await;
                return Err(e);
            }
        };

        if looks_like_error(&output) {
            self.dispose().await;
            return Err(DebuggerError::attach(output));
        }

        info!(pid = params.pid, simulator_id = %params.simulator_id, "lldb-cli attached");
        self.attached = true;
        Ok(())
    }

    async fn detach(&mut self) -> DebuggerResult<()> {
        if !self.attached {
            return Err(DebuggerError::NotAttached);
        }
        let output = self.run_command_raw("process detach", self.command_timeout).await?;
        if looks_like_error(&output) {
            warn!(output, "lldb-cli detach reported an error");
        }
        self.attached = false;
        Ok(())
    }

    async fn run_command(&mut self, command: &str, opts: RunCommandOptions) -> DebuggerResult<String> {
        let timeout = opts.timeout_ms.map(Duration::from_millis).unwrap_or(self.command_timeout);
        self.run_command_raw(command, timeout).await
    }

    async fn add_breakpoint(&mut self, spec: BreakpointSpec, opts: AddBreakpointOptions) -> DebuggerResult<BreakpointInfo> {
        let command = match &spec {
            BreakpointSpec::FileLine { file, line } => {
                format!("breakpoint set --file \"{file}\" --line {line}")
            }
            BreakpointSpec::Function { name } => format!("breakpoint set --name \"{name}\""),
        };

        let output = self.run_command_raw(&command, self.command_timeout).await?;
        let id = breakpoint_id_regex()
            .captures(&output)
            .and_then(|c| c.get(1))
            .and_then(|m| m.as_str().parse::<i64>().ok())
            .ok_or_else(|| DebuggerError::protocol(format!("could not parse breakpoint id from: {output}")))?;

        if let Some(condition) = &opts.condition {
            let escaped = condition.replace('\\', "\\\\").replace('"', "\\\"");
            let modify = format!("breakpoint modify -c \"{escaped}\" {id}");
            self.run_command_raw(&modify, self.command_timeout).await?;
        }

        Ok(BreakpointInfo { id, spec, raw_output: output })
    }

    async fn remove_breakpoint(&mut self, id: i64) -> DebuggerResult<()> {
        let output = self.run_command_raw(&format!("breakpoint delete {id}"), self.command_timeout).await?;
        if looks_like_error(&output) {
            return Err(DebuggerError::not_found(format!("breakpoint {id}: {output}")));
        }
        Ok(())
    }

    async fn get_stack(&mut self, opts: StackOptions) -> DebuggerResult<String> {
        let mut command = "thread backtrace".to_string();
        if let Some(max_frames) = opts.max_frames {
            command.push_str(&format!(" -c {max_frames}"));
        }
        if let Some(thread_index) = opts.thread_index {
            command.push_str(&format!(" {thread_index}"));
        }
        self.run_command_raw(&command, self.command_timeout).await
    }

    async fn get_variables(&mut self, opts: VariablesOptions) -> DebuggerResult<String> {
        if let Some(frame_index) = opts.frame_index {
            self.run_command_raw(&format!("frame select {frame_index}"), self.command_timeout).await?;
        }
        self.run_command_raw("frame variable", self.command_timeout).await
    }

    async fn get_execution_state(&mut self, _opts: ExecutionStateOptions) -> DebuggerResult<ExecutionState> {
        let output = self.run_command_raw("process status", self.command_timeout).await?;
        Ok(classify_process_status(&output))
    }

    async fn resume(&mut self, _opts: ResumeOptions) -> DebuggerResult<()> {
        let process = self.require_process()?;
        process.write(b"process continue\n").await?;
        debug!("wrote process continue, not waiting for sentinel");
        Ok(())
    }

    async fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        if let Some(process) = self.process.as_mut() {
            if let Err(e) = process.kill().await {
                debug!(error = %e, "error killing lldb-cli process during dispose");
            }
        }
        self.process = None;
        self.attached = false;
        self.disposed = true;
    }
}
