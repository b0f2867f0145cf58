// Capture Artifact Domain Model

use serde::Serialize;
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};

/// Exit code contract shared with the trial orchestrator
pub mod exit_code {
    pub const SUCCESS: u8 = 0;
    pub const NOT_FOUND: u8 = 1;
    pub const AMBIGUOUS: u8 = 2;
    /// Move/delete failed or the query was invalid; directory state unknown
    pub const FAILURE: u8 = 3;
}

/// The set of capture files expected in one directory for one trial
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactQuery {
    pub source_dir: PathBuf,
    /// Glob over file names, direct children of `source_dir` only
    pub pattern: String,
    pub destination: PathBuf,
}

impl ArtifactQuery {
    pub fn new(
        source_dir: impl Into<PathBuf>,
        pattern: impl Into<String>,
        destination: impl Into<PathBuf>,
    ) -> Self {
        Self {
            source_dir: source_dir.into(),
            pattern: pattern.into(),
            destination: destination.into(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.pattern.is_empty() {
            return Err(DomainError::InvalidArtifactQuery(
                "pattern is empty".to_string(),
            ));
        }
        if self.pattern.chars().any(std::path::is_separator) {
            return Err(DomainError::InvalidArtifactQuery(format!(
                "pattern '{}' must be a single file name component",
                self.pattern
            )));
        }
        if self.pattern == "." || self.pattern == ".." {
            return Err(DomainError::InvalidArtifactQuery(format!(
                "pattern '{}' does not name files",
                self.pattern
            )));
        }
        if self.destination.as_os_str().is_empty() {
            return Err(DomainError::InvalidArtifactQuery(
                "destination path is empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Result of resolving a directory against its single expected artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReconcileOutcome {
    /// The only match now lives at the destination
    Success {
        moved_from: PathBuf,
        moved_to: PathBuf,
    },
    /// Upstream capture produced nothing; directory untouched
    NotFound,
    /// Several matches; all were removed from the source directory
    Ambiguous {
        deleted_paths: Vec<PathBuf>,
        /// Set when matches were archived instead of deleted
        #[serde(skip_serializing_if = "Option::is_none")]
        archived_to: Option<PathBuf>,
    },
}

impl ReconcileOutcome {
    pub fn exit_code(&self) -> u8 {
        match self {
            ReconcileOutcome::Success { .. } => exit_code::SUCCESS,
            ReconcileOutcome::NotFound => exit_code::NOT_FOUND,
            ReconcileOutcome::Ambiguous { .. } => exit_code::AMBIGUOUS,
        }
    }
}

impl std::fmt::Display for ReconcileOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReconcileOutcome::Success {
                moved_from,
                moved_to,
            } => write!(f, "moved {} -> {}", moved_from.display(), moved_to.display()),
            ReconcileOutcome::NotFound => write!(f, "no matching artifact"),
            ReconcileOutcome::Ambiguous {
                deleted_paths,
                archived_to: Some(dir),
            } => write!(
                f,
                "{} matching artifacts archived to {}",
                deleted_paths.len(),
                dir.display()
            ),
            ReconcileOutcome::Ambiguous { deleted_paths, .. } => {
                write!(f, "{} matching artifacts deleted", deleted_paths.len())
            }
        }
    }
}
