use std::time::Duration;

use crate::error::{DebuggerError, DebuggerResult};

/// Which transport a session should use to drive LLDB.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    LldbCli,
    Dap,
}

impl BackendKind {
    fn parse(raw: &str) -> DebuggerResult<Self> {
        match raw.to_ascii_lowercase().as_str() {
            "lldb" | "lldb-cli" => Ok(Self::LldbCli),
            "dap" => Ok(Self::Dap),
            other => Err(DebuggerError::config(format!(
                "unknown XCODEBUILDMCP_DEBUGGER_BACKEND value: {other}"
            ))),
        }
    }
}

/// Mode the UI-automation guard runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardMode {
    Error,
    Warn,
    Off,
}

impl GuardMode {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "warn" => Self::Warn,
            "off" => Self::Off,
            _ => Self::Error,
        }
    }
}

/// Resolved, validated settings read once from the environment.
///
/// Backend selection and guard mode are resolved through this struct so the
/// "resolved once per session" rule holds by construction.
#[derive(Debug, Clone)]
pub struct DebuggerConfig {
    pub default_backend: BackendKind,
    pub dap_request_timeout: Duration,
    pub dap_log_events: bool,
    pub guard_mode: GuardMode,
    pub lldb_startup_timeout: Duration,
    pub command_timeout: Duration,
    /// Program name or path used to spawn the CLI backend's `lldb`
    /// process; overridable so a caller (e.g. `--lldb-path`) can point at
    /// a non-default toolchain install.
    pub lldb_path: String,
}

impl DebuggerConfig {
    pub fn from_env() -> DebuggerResult<Self> {
        let default_backend = match env_var("XCODEBUILDMCP_DEBUGGER_BACKEND") {
            Some(raw) => BackendKind::parse(&raw)?,
            None => BackendKind::Dap,
        };

        Ok(Self {
            default_backend,
            dap_request_timeout: duration_ms_env("XCODEBUILDMCP_DAP_REQUEST_TIMEOUT_MS", 30_000),
            dap_log_events: env_var("XCODEBUILDMCP_DAP_LOG_EVENTS")
                .map(|v| v == "true")
                .unwrap_or(false),
            guard_mode: env_var("XCODEBUILDMCP_UI_DEBUGGER_GUARD_MODE")
                .map(|raw| GuardMode::parse(&raw))
                .unwrap_or(GuardMode::Error),
            lldb_startup_timeout: duration_ms_env("XCODEBUILDMCP_LLDB_STARTUP_TIMEOUT_MS", 10_000),
            command_timeout: duration_ms_env("XCODEBUILDMCP_COMMAND_TIMEOUT_MS", 30_000),
            lldb_path: "lldb".to_string(),
        })
    }

    /// Resolve the effective backend for a session: explicit argument wins,
    /// otherwise fall back to the env/default resolved at construction.
    pub fn resolve_backend(&self, explicit: Option<BackendKind>) -> BackendKind {
        explicit.unwrap_or(self.default_backend)
    }
}

impl Default for DebuggerConfig {
    fn default() -> Self {
        Self {
            default_backend: BackendKind::Dap,
            dap_request_timeout: Duration::from_millis(30_000),
            dap_log_events: false,
            guard_mode: GuardMode::Error,
            lldb_startup_timeout: Duration::from_millis(10_000),
            command_timeout: Duration::from_millis(30_000),
            lldb_path: "lldb".to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn duration_ms_env(name: &str, default_ms: u64) -> Duration {
    let ms = env_var(name)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(default_ms);
    Duration::from_millis(ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_kind_parses_known_aliases() {
        assert_eq!(BackendKind::parse("dap").unwrap(), BackendKind::Dap);
        assert_eq!(BackendKind::parse("LLDB").unwrap(), BackendKind::LldbCli);
        assert_eq!(BackendKind::parse("lldb-cli").unwrap(), BackendKind::LldbCli);
    }

    #[test]
    fn backend_kind_rejects_unknown() {
        assert!(BackendKind::parse("gdb").is_err());
    }

    #[test]
    fn resolve_backend_prefers_explicit() {
        let cfg = DebuggerConfig { default_backend: BackendKind::Dap, ..Default::default() };
        assert_eq!(cfg.resolve_backend(Some(BackendKind::LldbCli)), BackendKind::LldbCli);
        assert_eq!(cfg.resolve_backend(None), BackendKind::Dap);
    }
}
