//! `conductor find`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use std::process::ExitCode;
use std::sync::Arc;

use conductor_core::application::{Discovery, ProcessSupervisor, SupervisorConfig};
use conductor_core::domain::ListenerIdentity;
use conductor_infra_system::{SystemProcessController, SystemProcessFinder};

#[derive(Args, Debug)]
#[group(required = true, multiple = false)]
pub struct FindArgs {
    /// Processes listening on this TCP port
    #[arg(long)]
    pub port: Option<u16>,

    /// Processes whose command line contains this text
    #[arg(long)]
    pub command: Option<String>,
}

impl FindArgs {
    pub fn identity(&self) -> Result<ListenerIdentity> {
        let identity = match (self.port, &self.command) {
            (Some(port), _) => ListenerIdentity::port(port)?,
            (None, Some(text)) => ListenerIdentity::command_substring(text.as_str())?,
            (None, None) => anyhow::bail!("either --port or --command is required"),
        };
        Ok(identity)
    }
}

#[derive(Serialize)]
struct FindReport<'a> {
    identity: &'a ListenerIdentity,
    #[serde(flatten)]
    discovery: Discovery,
}

pub async fn run(args: FindArgs, json: bool) -> Result<ExitCode> {
    let identity = args.identity()?;

    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        Arc::new(SystemProcessController::default()),
        SupervisorConfig::default(),
    );
    let discovery = supervisor.discover(&identity).await;

    if json {
        let report = FindReport {
            identity: &identity,
            discovery,
        };
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(ExitCode::SUCCESS);
    }

    for pid in &discovery.pids {
        println!("{}", pid);
    }
    if discovery.degraded {
        eprintln!(
            "{} {}: discovery tooling unavailable",
            "!".yellow().bold(),
            identity
        );
    } else {
        eprintln!(
            "{} {}: {} process(es)",
            "•".cyan(),
            identity,
            discovery.pids.len()
        );
    }

    Ok(ExitCode::SUCCESS)
}
