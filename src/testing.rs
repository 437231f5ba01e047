//! Scripted fakes for the process/executor seams, shared by unit tests and
//! external integration tests. Gated behind the `test-util` feature so it
//! never ships in a production build, mirroring how `tokio` carries its own
//! `test-util` feature for the same reason.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex as AsyncMutex;

use crate::error::{DebuggerError, DebuggerResult};
use crate::framing::dap::encode;
use crate::process::{CommandExecutor, CommandOutput, InteractiveProcess, ProcessSpawner};

/// Replays a fixed sequence of raw byte chunks on `read_chunk`, recording
/// every write it receives.
pub struct ScriptedProcess {
    chunks: AsyncMutex<VecDeque<Vec<u8>>>,
    writes: AsyncMutex<Vec<String>>,
}

impl ScriptedProcess {
    pub fn new(chunks: Vec<&str>) -> Self {
        Self {
            chunks: AsyncMutex::new(chunks.into_iter().map(|c| c.as_bytes().to_vec()).collect()),
            writes: AsyncMutex::new(Vec::new()),
        }
    }

    pub async fn writes(&self) -> Vec<String> {
        self.writes.lock().await.clone()
    }
}

#[async_trait]
impl InteractiveProcess for ScriptedProcess {
    async fn write(&mut self, bytes: &[u8]) -> DebuggerResult<()> {
        self.writes.lock().await.push(String::from_utf8_lossy(bytes).to_string());
        Ok(())
    }

    async fn read_chunk(&mut self) -> DebuggerResult<Option<Vec<u8>>> {
        Ok(self.chunks.lock().await.pop_front())
    }

    async fn kill(&mut self) -> DebuggerResult<()> {
        Ok(())
    }
}

/// Replays a fixed sequence of already-framed DAP messages on `read_chunk`.
pub struct ScriptedDapProcess {
    chunks: AsyncMutex<VecDeque<Vec<u8>>>,
}

impl ScriptedDapProcess {
    pub fn new(messages: Vec<Value>) -> Self {
        Self { chunks: AsyncMutex::new(messages.into_iter().map(|m| encode(&m)).collect()) }
    }
}

#[async_trait]
impl InteractiveProcess for ScriptedDapProcess {
    async fn write(&mut self, _bytes: &[u8]) -> DebuggerResult<()> {
        Ok(())
    }

    async fn read_chunk(&mut self) -> DebuggerResult<Option<Vec<u8>>> {
        Ok(self.chunks.lock().await.pop_front())
    }

    async fn kill(&mut self) -> DebuggerResult<()> {
        Ok(())
    }
}

/// Never produces a chunk or exit signal; `read_chunk` sleeps far longer
/// than any sane test timeout. Used to exercise the "timeout fires at
/// t >= budget, not before" boundary without needing a real hung process.
pub struct NeverRespondingProcess;

#[async_trait]
impl InteractiveProcess for NeverRespondingProcess {
    async fn write(&mut self, _bytes: &[u8]) -> DebuggerResult<()> {
        Ok(())
    }

    async fn read_chunk(&mut self) -> DebuggerResult<Option<Vec<u8>>> {
        tokio::time::sleep(Duration::from_secs(3600)).await;
        Ok(None)
    }

    async fn kill(&mut self) -> DebuggerResult<()> {
        Ok(())
    }
}

/// Hands out a single pre-built process the first time it is spawned.
pub struct SingleUseSpawner {
    process: AsyncMutex<Option<Box<dyn InteractiveProcess>>>,
}

impl SingleUseSpawner {
    pub fn new(process: Box<dyn InteractiveProcess>) -> Self {
        Self { process: AsyncMutex::new(Some(process)) }
    }
}

#[async_trait]
impl ProcessSpawner for SingleUseSpawner {
    async fn spawn(&self, _program: &str, _args: &[String]) -> DebuggerResult<Box<dyn InteractiveProcess>> {
        self.process.lock().await.take().ok_or_else(|| DebuggerError::protocol("scripted process already spawned"))
    }
}

/// Always reports a fixed adapter path, as if `xcrun --find lldb-dap` had
/// resolved successfully.
pub struct StaticAdapterExecutor {
    pub path: String,
}

impl Default for StaticAdapterExecutor {
    fn default() -> Self {
        Self { path: "/usr/bin/lldb-dap".to_string() }
    }
}

#[async_trait]
impl CommandExecutor for StaticAdapterExecutor {
    async fn run(&self, _program: &str, _args: &[String]) -> DebuggerResult<CommandOutput> {
        Ok(CommandOutput { status: 0, stdout: format!("{}\n", self.path), stderr: String::new() })
    }
}

/// Builds a successful DAP `response` message for the given request seq.
pub fn dap_response(request_seq: i64, body: Value) -> Value {
    serde_json::json!({"seq": request_seq + 1_000_000, "type": "response", "request_seq": request_seq, "success": true, "body": body})
}

/// Builds a failed DAP `response` message for the given request seq.
pub fn dap_error_response(request_seq: i64, message: &str) -> Value {
    serde_json::json!({"seq": request_seq + 1_000_000, "type": "response", "request_seq": request_seq, "success": false, "message": message})
}
