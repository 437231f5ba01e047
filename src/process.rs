//! Injectable collaborators for talking to child processes.
//!
//! Production code spawns real `tokio::process::Child`s; tests substitute
//! scripted fakes so the backends can be exercised without a real
//! simulator or real `lldb`/`lldb-dap` binaries.

use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, ChildStdout, ChildStderr, Command};
use tracing::debug;

use crate::error::{DebuggerError, DebuggerResult};

/// A long-lived child process driven interactively over stdio, with
/// stdout and stderr merged into a single chunk stream for the caller.
#[async_trait]
pub trait InteractiveProcess: Send {
    async fn write(&mut self, bytes: &[u8]) -> DebuggerResult<()>;

    /// Read the next available chunk of merged stdout/stderr bytes.
    /// `Ok(None)` means the process closed its output streams.
    async fn read_chunk(&mut self) -> DebuggerResult<Option<Vec<u8>>>;

    async fn kill(&mut self) -> DebuggerResult<()>;
}

/// Spawns [`InteractiveProcess`] instances. Exists as a seam so tests can
/// substitute a scripted fake instead of launching `lldb`.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(&self, program: &str, args: &[String]) -> DebuggerResult<Box<dyn InteractiveProcess>>;
}

pub struct TokioProcessSpawner;

#[async_trait]
impl ProcessSpawner for TokioProcessSpawner {
    async fn spawn(&self, program: &str, args: &[String]) -> DebuggerResult<Box<dyn InteractiveProcess>> {
        debug!(program, ?args, "spawning interactive process");
        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stdin = child.stdin.take().ok_or_else(|| DebuggerError::protocol("child has no stdin"))?;
        let stdout = child.stdout.take().ok_or_else(|| DebuggerError::protocol("child has no stdout"))?;
        let stderr = child.stderr.take().ok_or_else(|| DebuggerError::protocol("child has no stderr"))?;

        Ok(Box::new(TokioInteractiveProcess { child, stdin, stdout, stderr }))
    }
}

struct TokioInteractiveProcess {
    child: Child,
    stdin: ChildStdin,
    stdout: ChildStdout,
    stderr: ChildStderr,
}

#[async_trait]
impl InteractiveProcess for TokioInteractiveProcess {
    async fn write(&mut self, bytes: &[u8]) -> DebuggerResult<()> {
        self.stdin.write_all(bytes).await?;
        self.stdin.flush().await?;
        Ok(())
    }

    async fn read_chunk(&mut self) -> DebuggerResult<Option<Vec<u8>>> {
        let mut out_buf = [0u8; 4096];
        let mut err_buf = [0u8; 4096];

        tokio::select! {
            res = self.stdout.read(&mut out_buf) => {
                match res? {
                    0 => Ok(None),
                    n => Ok(Some(out_buf[..n].to_vec())),
                }
            }
            res = self.stderr.read(&mut err_buf) => {
                match res? {
                    0 => Ok(None),
                    n => Ok(Some(err_buf[..n].to_vec())),
                }
            }
        }
    }

    async fn kill(&mut self) -> DebuggerResult<()> {
        self.child.start_kill()?;
        Ok(())
    }
}

/// A single-shot subprocess invocation used for adapter/tool discovery
/// (e.g. `xcrun --find lldb-dap`), as distinct from the long-lived
/// [`InteractiveProcess`] the backends drive commands through.
pub struct CommandOutput {
    pub status: i32,
    pub stdout: String,
    pub stderr: String,
}

#[async_trait]
pub trait CommandExecutor: Send + Sync {
    async fn run(&self, program: &str, args: &[String]) -> DebuggerResult<CommandOutput>;
}

pub struct TokioCommandExecutor;

#[async_trait]
impl CommandExecutor for TokioCommandExecutor {
    async fn run(&self, program: &str, args: &[String]) -> DebuggerResult<CommandOutput> {
        debug!(program, ?args, "running command");
        let output = Command::new(program).args(args).output().await?;
        Ok(CommandOutput {
            status: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Resolve the `lldb-dap` binary path via `xcrun --find lldb-dap`.
pub async fn find_lldb_dap(executor: &dyn CommandExecutor) -> DebuggerResult<String> {
    let output = executor.run("xcrun", &["--find".to_string(), "lldb-dap".to_string()]).await?;
    let path = output.stdout.trim();
    if output.status != 0 || path.is_empty() {
        return Err(DebuggerError::adapter_missing("lldb-dap not found via xcrun"));
    }
    Ok(path.to_string())
}
