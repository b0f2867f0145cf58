//! Conductor CLI - per-trial helpers for the WebRTC streaming experiment
//!
//! Invoked over SSH by the trial orchestrator on the remote host:
//! - `restart`: make sure exactly one fresh signaling server is running
//! - `find`: show which processes currently match a listener identity
//! - `reconcile`: move the single capture artifact to its trial path

mod find;
mod logging;
mod reconcile;
mod restart;

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::process::ExitCode;
use tracing::{error, info};

use conductor_core::domain::artifact::exit_code;
use logging::LogFormat;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Parser)]
#[command(name = "conductor")]
#[command(about = "Trial helpers: listener restart and capture artifact reconciliation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log output format (logs always go to stderr)
    #[arg(
        long,
        global = true,
        value_enum,
        env = "CONDUCTOR_LOG_FORMAT",
        default_value = "pretty"
    )]
    log_format: LogFormat,

    /// Print the result as JSON on stdout
    #[arg(long, global = true, env = "CONDUCTOR_JSON")]
    json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Kill any running listener and launch a fresh detached one
    Restart(restart::RestartArgs),

    /// List processes matching a listener identity
    Find(find::FindArgs),

    /// Move the single capture artifact to its destination
    ///
    /// Exit codes: 0 moved, 1 not found, 2 ambiguous (all matches removed), 3 failure
    Reconcile(reconcile::ReconcileArgs),
}

impl Commands {
    fn name(&self) -> &'static str {
        match self {
            Commands::Restart(_) => "restart",
            Commands::Find(_) => "find",
            Commands::Reconcile(_) => "reconcile",
        }
    }

    /// Exit code for errors, chosen so they never collide with a reconcile outcome
    fn failure_code(&self) -> u8 {
        match self {
            Commands::Restart(_) | Commands::Find(_) => 1,
            Commands::Reconcile(_) => exit_code::FAILURE,
        }
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // clap's own usage-error code (2) would read as "ambiguous" to the orchestrator
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(exit_code::FAILURE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    if let Err(e) = logging::init(cli.log_format) {
        eprintln!("{} {:#}", "✗".red(), e);
        return ExitCode::from(exit_code::FAILURE);
    }

    let name = cli.command.name();
    let failure_code = cli.command.failure_code();
    info!(command = name, "Conductor v{} starting", VERSION);

    let result = match cli.command {
        Commands::Restart(args) => restart::run(args, cli.json).await,
        Commands::Find(args) => find::run(args, cli.json).await,
        Commands::Reconcile(args) => reconcile::run(args, cli.json).await,
    };

    match result {
        Ok(code) => code,
        Err(e) => {
            error!(command = name, error = %format!("{:#}", e), "Command failed");
            eprintln!("{} {} failed: {:#}", "✗".red().bold(), name, e);
            ExitCode::from(failure_code)
        }
    }
}
