//! The Debug Session Manager: creates, routes through, and tears down
//! debug sessions, hiding which wire transport (CLI REPL or DAP) backs
//! each one.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::cli::LldbCliBackend;
use crate::backend::dap::DapBackend;
use crate::backend::{
    AddBreakpointOptions, AttachParams, Backend, ExecutionStateOptions, RunCommandOptions,
    ResumeOptions, StackOptions, VariablesOptions,
};
use crate::breakpoint::{BreakpointInfo, BreakpointSpec};
use crate::config::{BackendKind, DebuggerConfig};
use crate::error::{DebuggerError, DebuggerResult};
use crate::execution_state::ExecutionState;
use crate::process::{CommandExecutor, ProcessSpawner, TokioCommandExecutor, TokioProcessSpawner};

#[derive(Debug, Clone)]
pub struct SessionInfo {
    pub id: String,
    pub backend_kind: BackendKind,
    pub pid: u32,
    pub simulator_id: String,
    pub created_at: SystemTime,
    pub last_used_at: SystemTime,
}

pub struct CreateSessionParams {
    pub simulator_id: String,
    pub pid: u32,
    pub backend: Option<BackendKind>,
    pub wait_for: bool,
}

struct SessionEntry {
    info: SessionInfo,
    backend: Box<dyn Backend>,
}

pub struct DebugSessionManager {
    config: DebuggerConfig,
    spawner: Arc<dyn ProcessSpawner>,
    executor: Arc<dyn CommandExecutor>,
    sessions: AsyncMutex<HashMap<String, Arc<AsyncMutex<SessionEntry>>>>,
    session_order: AsyncMutex<Vec<String>>,
    current_session_id: AsyncMutex<Option<String>>,
}

impl DebugSessionManager {
    pub fn new(config: DebuggerConfig, spawner: Arc<dyn ProcessSpawner>, executor: Arc<dyn CommandExecutor>) -> Self {
        Self {
            config,
            spawner,
            executor,
            sessions: AsyncMutex::new(HashMap::new()),
            session_order: AsyncMutex::new(Vec::new()),
            current_session_id: AsyncMutex::new(None),
        }
    }

    pub fn config(&self) -> &DebuggerConfig {
        &self.config
    }

    pub async fn create_session(&self, params: CreateSessionParams) -> DebuggerResult<SessionInfo> {
        let backend_kind = self.config.resolve_backend(params.backend);
        let mut backend: Box<dyn Backend> = match backend_kind {
            BackendKind::LldbCli => Box::new(LldbCliBackend::new(
                self.spawner.clone(),
                self.config.lldb_path.clone(),
                self.config.lldb_startup_timeout,
                self.config.command_timeout,
            )),
            BackendKind::Dap => Box::new(DapBackend::new(
                self.spawner.clone(),
                self.executor.clone(),
                self.config.dap_request_timeout,
                self.config.dap_log_events,
            )),
        };

        let attach_params = AttachParams {
            pid: params.pid,
            simulator_id: params.simulator_id.clone(),
            wait_for: params.wait_for,
        };

        if let Err(e) = backend.attach(attach_params).await {
            backend.dispose().await;
            return Err(e);
        }

        let id = Uuid::new_v4().to_string();
        let now = SystemTime::now();
        let info = SessionInfo {
            id: id.clone(),
            backend_kind,
            pid: params.pid,
            simulator_id: params.simulator_id,
            created_at: now,
            last_used_at: now,
        };

        let entry = Arc::new(AsyncMutex::new(SessionEntry { info: info.clone(), backend }));
        self.sessions.lock().await.insert(id.clone(), entry);
        self.session_order.lock().await.push(id.clone());

        info!(session_id = %id, backend = ?backend_kind, pid = info.pid, "session created");
        Ok(info)
    }

    async fn resolve_session_id(&self, id: Option<&str>) -> Option<String> {
        if let Some(id) = id {
            return Some(id.to_string());
        }
        self.current_session_id.lock().await.clone()
    }

    async fn entry_for(&self, resolved: &str) -> DebuggerResult<Arc<AsyncMutex<SessionEntry>>> {
        self.sessions
            .lock()
            .await
            .get(resolved)
            .cloned()
            .ok_or_else(|| DebuggerError::not_found(format!("session {resolved}")))
    }

    pub async fn get_session(&self, id: Option<&str>) -> Option<SessionInfo> {
        let resolved = self.resolve_session_id(id).await?;
        let entry = self.sessions.lock().await.get(&resolved)?.clone();
        Some(entry.lock().await.info.clone())
    }

    pub async fn set_current_session(&self, id: &str) -> DebuggerResult<()> {
        if !self.sessions.lock().await.contains_key(id) {
            return Err(DebuggerError::not_found(format!("session {id}")));
        }
        *self.current_session_id.lock().await = Some(id.to_string());
        Ok(())
    }

    pub async fn find_session_for_simulator(&self, simulator_id: &str) -> Option<SessionInfo> {
        if let Some(current_id) = self.current_session_id.lock().await.clone() {
            if let Some(entry) = self.sessions.lock().await.get(&current_id).cloned() {
                let info = entry.lock().await.info.clone();
                if info.simulator_id == simulator_id {
                    return Some(info);
                }
            }
        }

        let order = self.session_order.lock().await.clone();
        for id in order {
            if let Some(entry) = self.sessions.lock().await.get(&id).cloned() {
                let info = entry.lock().await.info.clone();
                if info.simulator_id == simulator_id {
                    return Some(info);
                }
            }
        }
        None
    }

    pub async fn detach_session(&self, id: Option<&str>) -> DebuggerResult<()> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;

        let entry_arc = self
            .sessions
            .lock()
            .await
            .remove(&resolved)
            .ok_or_else(|| DebuggerError::not_found(format!("session {resolved}")))?;

        self.session_order.lock().await.retain(|x| x != &resolved);
        {
            let mut current = self.current_session_id.lock().await;
            if current.as_deref() == Some(resolved.as_str()) {
                *current = None;
            }
        }

        let mut entry = entry_arc.lock().await;
        let detach_result = entry.backend.detach().await;
        entry.backend.dispose().await;
        debug!(session_id = %resolved, "session detached");
        detach_result
    }

    pub async fn run_command(&self, id: Option<&str>, command: &str, opts: RunCommandOptions) -> DebuggerResult<String> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.run_command(command, opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn add_breakpoint(&self, id: Option<&str>, spec: BreakpointSpec, opts: AddBreakpointOptions) -> DebuggerResult<BreakpointInfo> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.add_breakpoint(spec, opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn remove_breakpoint(&self, id: Option<&str>, breakpoint_id: i64) -> DebuggerResult<()> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.remove_breakpoint(breakpoint_id).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn get_stack(&self, id: Option<&str>, opts: StackOptions) -> DebuggerResult<String> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.get_stack(opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn get_variables(&self, id: Option<&str>, opts: VariablesOptions) -> DebuggerResult<String> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.get_variables(opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn get_execution_state(&self, id: Option<&str>, opts: ExecutionStateOptions) -> DebuggerResult<ExecutionState> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.get_execution_state(opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn resume_session(&self, id: Option<&str>, opts: ResumeOptions) -> DebuggerResult<()> {
        let resolved = self.resolve_session_id(id).await.ok_or(DebuggerError::NotAttached)?;
        let entry_arc = self.entry_for(&resolved).await?;
        let mut entry = entry_arc.lock().await;
        let result = entry.backend.resume(opts).await;
        entry.info.last_used_at = SystemTime::now();
        result
    }

    pub async fn dispose_all(&self) {
        let ids: Vec<String> = self.sessions.lock().await.keys().cloned().collect();
        for id in ids {
            let removed = self.sessions.lock().await.remove(&id);
            if let Some(entry_arc) = removed {
                let mut entry = entry_arc.lock().await;
                if let Err(e) = entry.backend.detach().await {
                    debug!(session_id = %id, error = %e, "best-effort detach failed during dispose_all");
                }
                entry.backend.dispose().await;
            }
        }
        self.session_order.lock().await.clear();
        *self.current_session_id.lock().await = None;
    }

    /// Test-only seam: inject a session with a pre-built backend, bypassing
    /// real attach, so other modules' tests can exercise manager routing
    /// without a scripted transport.
    #[cfg(test)]
    pub async fn create_session_for_test(&self, id: String, simulator_id: String, backend: Box<dyn Backend>) {
        let info = SessionInfo {
            id: id.clone(),
            backend_kind: BackendKind::Dap,
            pid: 1,
            simulator_id,
            created_at: SystemTime::now(),
            last_used_at: SystemTime::now(),
        };
        let entry = Arc::new(AsyncMutex::new(SessionEntry { info, backend }));
        self.sessions.lock().await.insert(id.clone(), entry);
        self.session_order.lock().await.push(id);
    }
}

/// Process-wide singleton so UI-automation tooling can locate active
/// sessions without plumbing a manager handle through every call site.
pub fn default_debugger_manager() -> Arc<DebugSessionManager> {
    static INSTANCE: OnceLock<Arc<DebugSessionManager>> = OnceLock::new();
    INSTANCE
        .get_or_init(|| {
            let config = DebuggerConfig::from_env().unwrap_or_else(|e| {
                warn!(error = %e, "invalid debugger configuration in environment, falling back to defaults");
                DebuggerConfig::default()
            });
            Arc::new(DebugSessionManager::new(
                config,
                Arc::new(TokioProcessSpawner),
                Arc::new(TokioCommandExecutor),
            ))
        })
        .clone()
}
