//! Logging setup
//!
//! Events go to stderr: stdout is reserved for machine-readable results
//! (pids, moved paths, JSON reports) consumed over SSH by the orchestrator.

use anyhow::{Context, Result};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_FILTER: &str = "conductor=info";

/// Output format for log events
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum LogFormat {
    /// Human-readable, colored when attached to a terminal
    Pretty,
    /// Compact single-line events
    Compact,
    /// JSON structured logging
    Json,
}

/// Initialize the global subscriber
///
/// # Environment Variables
///
/// - `RUST_LOG`: filter directives (default: `conductor=info`)
pub fn init(format: LogFormat) -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(DEFAULT_FILTER))
        .context("Failed to create env filter")?;

    let registry = tracing_subscriber::registry().with(env_filter);

    match format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Compact => registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().pretty().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")
}
