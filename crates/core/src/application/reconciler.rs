// Capture artifact reconciliation
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::domain::{ArtifactQuery, ReconcileOutcome};
use crate::error::{AppError, Result};
use crate::port::{ArtifactStore, StoreError};

/// What to do with matches when more than one artifact is present
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum AmbiguityPolicy {
    /// Delete every match so the next capture starts clean
    #[default]
    Purge,
    /// Move every match into this directory instead of deleting it
    Archive(PathBuf),
}

/// Artifact reconciler
///
/// End states of the source directory:
/// - `Success`: the only match moved to the destination, no matches left
/// - `Ambiguous`: every match removed (deleted or archived), destination untouched
/// - `NotFound`: nothing to do, directory untouched
pub struct ArtifactReconciler {
    store: Arc<dyn ArtifactStore>,
    policy: AmbiguityPolicy,
}

impl ArtifactReconciler {
    pub fn new(store: Arc<dyn ArtifactStore>, policy: AmbiguityPolicy) -> Self {
        Self { store, policy }
    }

    /// Resolve the directory against its single expected artifact
    ///
    /// # Errors
    /// - AppError::Domain / AppError::Validation for a malformed query or glob
    /// - AppError::Artifact if a move or delete fails
    pub async fn reconcile(&self, query: &ArtifactQuery) -> Result<ReconcileOutcome> {
        query.validate()?;

        let mut matches = self
            .store
            .list_matching(&query.source_dir, &query.pattern)
            .await?;

        info!(
            source_dir = %query.source_dir.display(),
            pattern = %query.pattern,
            matches = matches.len(),
            "Scanned capture directory"
        );

        match matches.len() {
            0 => {
                warn!(
                    source_dir = %query.source_dir.display(),
                    pattern = %query.pattern,
                    "No capture artifact found"
                );
                Ok(ReconcileOutcome::NotFound)
            }
            1 => {
                let moved_from = matches.remove(0);
                self.store
                    .move_file(&moved_from, &query.destination)
                    .await?;

                info!(
                    from = %moved_from.display(),
                    to = %query.destination.display(),
                    "Capture artifact moved"
                );
                Ok(ReconcileOutcome::Success {
                    moved_from,
                    moved_to: query.destination.clone(),
                })
            }
            _ => self.clear_ambiguous(query, matches).await,
        }
    }

    /// Remove every match, continuing past failures so as much as possible is cleared
    async fn clear_ambiguous(
        &self,
        query: &ArtifactQuery,
        matches: Vec<PathBuf>,
    ) -> Result<ReconcileOutcome> {
        warn!(
            count = matches.len(),
            paths = ?matches,
            policy = ?self.policy,
            "Multiple capture artifacts found, clearing all of them"
        );

        // One archive subdirectory per trial, named after the destination
        let archive_dir = match &self.policy {
            AmbiguityPolicy::Purge => None,
            AmbiguityPolicy::Archive(root) => Some(trial_archive_dir(root, &query.destination)),
        };

        let mut first_failure: Option<StoreError> = None;
        for path in &matches {
            let result = match &archive_dir {
                None => self.store.remove_file(path).await,
                Some(dir) => self.archive(dir, path).await,
            };

            if let Err(e) = result {
                error!(path = %path.display(), error = %e, "Failed to clear artifact");
                first_failure.get_or_insert(e);
            }
        }

        if let Some(e) = first_failure {
            return Err(AppError::from(e));
        }

        Ok(ReconcileOutcome::Ambiguous {
            deleted_paths: matches,
            archived_to: archive_dir,
        })
    }

    /// Move `path` into `dir` without replacing an earlier archived capture
    async fn archive(&self, dir: &Path, path: &Path) -> std::result::Result<(), StoreError> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "artifact".to_string());

        let mut target = dir.join(&name);
        let mut attempt = 1u32;
        while self.store.exists(&target).await? {
            target = dir.join(numbered_name(&name, attempt));
            attempt += 1;
        }

        if attempt > 1 {
            warn!(
                path = %path.display(),
                target = %target.display(),
                "Archive name taken, keeping both"
            );
        }
        self.store.move_file(path, &target).await
    }
}

fn trial_archive_dir(root: &Path, destination: &Path) -> PathBuf {
    match destination.file_stem() {
        Some(stem) => root.join(stem),
        None => root.to_path_buf(),
    }
}

/// "capture.ivf" -> "capture.1.ivf"
fn numbered_name(name: &str, n: u32) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{}.{}.{}", stem, n, ext),
        _ => format!("{}.{}", name, n),
    }
}
