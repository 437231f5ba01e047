use crate::config::BackendKind;

/// Resolve the backend for a new session: explicit argument wins, then the
/// config's env-derived default (see [`crate::config::DebuggerConfig`]).
pub fn resolve(explicit: Option<BackendKind>, default: BackendKind) -> BackendKind {
    explicit.unwrap_or(default)
}
