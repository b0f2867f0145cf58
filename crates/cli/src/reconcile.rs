//! `conductor reconcile`

use anyhow::Result;
use clap::Args;
use colored::Colorize;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use conductor_core::application::constants::DEFAULT_ARTIFACT_PATTERN;
use conductor_core::application::{AmbiguityPolicy, ArtifactReconciler};
use conductor_core::domain::{ArtifactQuery, ReconcileOutcome};
use conductor_infra_system::FsArtifactStore;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Directory the receiver writes captures into
    #[arg(env = "CONDUCTOR_CAPTURE_DIR")]
    pub capture_dir: PathBuf,

    /// Where the single capture should end up for this trial
    pub destination: PathBuf,

    /// File name glob identifying capture files
    #[arg(long, env = "CONDUCTOR_ARTIFACT_PATTERN", default_value = DEFAULT_ARTIFACT_PATTERN)]
    pub pattern: String,

    /// Move ambiguous matches here instead of deleting them
    #[arg(long, env = "CONDUCTOR_ARCHIVE_DIR")]
    pub archive_dir: Option<PathBuf>,
}

impl ReconcileArgs {
    pub fn query(&self) -> ArtifactQuery {
        ArtifactQuery::new(&self.capture_dir, &self.pattern, &self.destination)
    }

    pub fn policy(&self) -> AmbiguityPolicy {
        match &self.archive_dir {
            Some(dir) => AmbiguityPolicy::Archive(dir.clone()),
            None => AmbiguityPolicy::Purge,
        }
    }
}

pub async fn run(args: ReconcileArgs, json: bool) -> Result<ExitCode> {
    let reconciler = ArtifactReconciler::new(Arc::new(FsArtifactStore::new()), args.policy());
    let outcome = reconciler.reconcile(&args.query()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
    } else {
        print_outcome(&outcome);
    }

    Ok(ExitCode::from(outcome.exit_code()))
}

fn print_outcome(outcome: &ReconcileOutcome) {
    match outcome {
        ReconcileOutcome::Success { moved_to, .. } => {
            println!("{}", moved_to.display());
            eprintln!("{} {}", "✓".green().bold(), outcome);
        }
        ReconcileOutcome::NotFound => {
            eprintln!("{} {}", "✗".yellow().bold(), outcome);
        }
        ReconcileOutcome::Ambiguous { deleted_paths, .. } => {
            for path in deleted_paths {
                println!("{}", path.display());
            }
            eprintln!("{} {}", "!".red().bold(), outcome);
        }
    }
}
