use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use xcodebuildmcp_debugger::backend::{RunCommandOptions, StackOptions};
use xcodebuildmcp_debugger::config::{BackendKind, DebuggerConfig};
use xcodebuildmcp_debugger::error::DebuggerResult;
use xcodebuildmcp_debugger::process::{TokioCommandExecutor, TokioProcessSpawner};
use xcodebuildmcp_debugger::session::{CreateSessionParams, DebugSessionManager};

/// Attach to a process on an iOS Simulator, run one command, print the
/// stack, then detach. A thin manual harness around the debug session
/// manager; the real entry point is the library.
#[derive(Parser, Debug)]
#[command(name = "xcodebuildmcp-debugger", version)]
struct Cli {
    /// Target process id to attach to.
    #[arg(long)]
    pid: u32,

    /// Simulator identifier the target process is running on.
    #[arg(long, value_name = "ID")]
    simulator_id: String,

    /// Backend transport to use; defaults to the env/config resolution.
    #[arg(long, value_enum)]
    backend: Option<CliBackend>,

    /// Path to the `lldb` binary the CLI backend spawns; defaults to
    /// resolving `lldb` from PATH.
    #[arg(long, value_name = "PATH")]
    lldb_path: Option<String>,

    /// Wait for the process to appear instead of requiring it to exist already.
    #[arg(long)]
    wait_for: bool,

    /// One command to run through the backend after attaching.
    #[arg(long)]
    command: Option<String>,

    /// Enable debug logging.
    #[arg(long, short = 'd')]
    debug: bool,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum CliBackend {
    Dap,
    LldbCli,
}

impl From<CliBackend> for BackendKind {
    fn from(value: CliBackend) -> Self {
        match value {
            CliBackend::Dap => BackendKind::Dap,
            CliBackend::LldbCli => BackendKind::LldbCli,
        }
    }
}

#[tokio::main]
async fn main() -> DebuggerResult<()> {
    let cli = Cli::parse();

    let default_directive = if cli.debug { "xcodebuildmcp_debugger=debug" } else { "xcodebuildmcp_debugger=info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive)))
        .init();

    info!(version = env!("CARGO_PKG_VERSION"), "starting debug session manager");

    let mut config = DebuggerConfig::from_env()?;
    if let Some(lldb_path) = cli.lldb_path {
        config.lldb_path = lldb_path;
    }
    let manager = DebugSessionManager::new(config, std::sync::Arc::new(TokioProcessSpawner), std::sync::Arc::new(TokioCommandExecutor));

    let session = manager
        .create_session(CreateSessionParams {
            simulator_id: cli.simulator_id,
            pid: cli.pid,
            backend: cli.backend.map(Into::into),
            wait_for: cli.wait_for,
        })
        .await?;
    info!(session_id = %session.id, backend = ?session.backend_kind, "attached");

    if let Some(command) = cli.command {
        match manager.run_command(Some(&session.id), &command, RunCommandOptions::default()).await {
            Ok(output) => println!("{output}"),
            Err(e) => error!(error = %e, "command failed"),
        }
    }

    match manager.get_stack(Some(&session.id), StackOptions::default()).await {
        Ok(stack) => println!("{stack}"),
        Err(e) => error!(error = %e, "failed to get stack"),
    }

    manager.detach_session(Some(&session.id)).await?;
    info!(session_id = %session.id, "detached");
    Ok(())
}
