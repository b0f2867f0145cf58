//! `conductor restart`

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use conductor_core::application::constants::{
    DEFAULT_SERVER_EXECUTABLE, DEFAULT_SERVER_LOG, DEFAULT_SETTLE_TIMEOUT, DEFAULT_STARTUP_GRACE,
};
use conductor_core::application::{ProcessSupervisor, SupervisorConfig};
use conductor_core::domain::{InhibitorMode, LaunchSpec, ListenerIdentity};
use conductor_infra_system::{SystemProcessController, SystemProcessFinder};

#[derive(Args, Debug)]
pub struct RestartArgs {
    /// Deployment directory holding the server binary
    #[arg(env = "CONDUCTOR_BASE_DIR")]
    pub base_dir: PathBuf,

    /// TCP port the listener binds; identifies the running instance
    #[arg(env = "CONDUCTOR_PORT")]
    pub port: Option<u16>,

    /// Server executable (default: <BASE_DIR>/peerconnection_server)
    #[arg(long, env = "CONDUCTOR_EXECUTABLE")]
    pub executable: Option<PathBuf>,

    /// Log file for the server's stdout/stderr (default: <BASE_DIR>/signal_server.log)
    #[arg(long, env = "CONDUCTOR_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Launch argument, repeatable; replaces the default --port=<PORT>
    #[arg(long = "arg", value_name = "ARG", allow_hyphen_values = true)]
    pub args: Vec<String>,

    /// Identify running instances by executable path even when a port is given
    #[arg(long)]
    pub by_command: bool,

    /// Keep the host awake (no sleep, no lid-close suspend) while the server runs
    #[arg(long, env = "CONDUCTOR_INHIBIT")]
    pub inhibit: bool,

    /// Max wait for killed instances to exit before relaunching
    #[arg(long, env = "CONDUCTOR_SETTLE_MS", default_value_t = DEFAULT_SETTLE_TIMEOUT.as_millis() as u64)]
    pub settle_ms: u64,

    /// The new instance must survive this long to count as launched
    #[arg(long, env = "CONDUCTOR_GRACE_MS", default_value_t = DEFAULT_STARTUP_GRACE.as_millis() as u64)]
    pub grace_ms: u64,
}

/// Resolve the identity and launch spec from the deployment layout
///
/// Relative paths are anchored to the caller's working directory, since the
/// server itself starts inside `BASE_DIR`.
pub fn plan(args: &RestartArgs) -> Result<(ListenerIdentity, LaunchSpec)> {
    let cwd = std::env::current_dir().context("cannot read the current directory")?;
    let base_dir = cwd.join(&args.base_dir);
    let executable = match &args.executable {
        Some(path) => cwd.join(path),
        None => base_dir.join(DEFAULT_SERVER_EXECUTABLE),
    };
    let log_file = match &args.log_file {
        Some(path) => cwd.join(path),
        None => base_dir.join(DEFAULT_SERVER_LOG),
    };

    let launch_args = match (&args.args[..], args.port) {
        ([], Some(port)) => vec![format!("--port={}", port)],
        (explicit, _) => explicit.to_vec(),
    };

    let identity = match args.port {
        Some(port) if !args.by_command => ListenerIdentity::port(port)?,
        _ => ListenerIdentity::command_substring(executable.to_string_lossy())?,
    };

    let inhibitor = if args.inhibit {
        InhibitorMode::SuppressSleep
    } else {
        InhibitorMode::None
    };

    let spec = LaunchSpec::new(executable, log_file)
        .with_args(launch_args)
        .with_working_dir(&base_dir)
        .with_inhibitor(inhibitor);

    Ok((identity, spec))
}

pub async fn run(args: RestartArgs, json: bool) -> Result<ExitCode> {
    let (identity, spec) = plan(&args)?;

    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        Arc::new(SystemProcessController::new(Duration::from_millis(
            args.grace_ms,
        ))),
        SupervisorConfig {
            settle_timeout: Duration::from_millis(args.settle_ms),
            ..Default::default()
        },
    );

    let report = supervisor
        .ensure_restarted(&identity, &spec)
        .await
        .with_context(|| format!("restart of {} failed", spec.executable.display()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report.pid);
        eprintln!(
            "{} {} restarted (pid {}, replaced {})",
            "✓".green().bold(),
            identity,
            report.pid,
            report.terminated.len()
        );
        if report.discovery_degraded {
            eprintln!(
                "  {} discovery tooling unavailable, old instances may still run",
                "!".yellow()
            );
        }
        if !report.lingering.is_empty() {
            eprintln!("  {} still exiting: {:?}", "!".yellow(), report.lingering);
        }
        if args.inhibit && !report.inhibited {
            eprintln!("  {} sleep inhibitor not applied", "!".yellow());
        }
    }

    Ok(ExitCode::SUCCESS)
}
