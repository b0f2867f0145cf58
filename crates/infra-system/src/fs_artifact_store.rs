// Filesystem artifact store
// reason: glob for shell-style file name patterns, tokio::fs for file operations
use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::debug;

use conductor_core::port::artifact_store::{ArtifactStore, StoreError};

// Names are matched one component at a time; hidden files need an explicit dot
const MATCH_OPTIONS: MatchOptions = MatchOptions {
    case_sensitive: true,
    require_literal_separator: true,
    require_literal_leading_dot: true,
};

/// Artifact store over the local filesystem
#[derive(Debug, Default, Clone, Copy)]
pub struct FsArtifactStore;

impl FsArtifactStore {
    pub fn new() -> Self {
        Self
    }
}

async fn ensure_parent(path: &Path) -> Result<(), StoreError> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| StoreError::io(parent, e)),
        _ => Ok(()),
    }
}

#[async_trait]
impl ArtifactStore for FsArtifactStore {
    async fn list_matching(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, StoreError> {
        let compiled = Pattern::new(pattern).map_err(|e| StoreError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(dir = %dir.display(), "Capture directory does not exist");
                return Ok(Vec::new());
            }
            Err(e) => return Err(StoreError::io(dir, e)),
        };

        let mut matches = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| StoreError::io(dir, e))?
        {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if !compiled.matches_with(name, MATCH_OPTIONS) {
                continue;
            }

            // Follows symlinks: a link to a capture counts as the capture
            let path = entry.path();
            match tokio::fs::metadata(&path).await {
                Ok(meta) if meta.is_file() => matches.push(path),
                Ok(_) => debug!(path = %path.display(), "Skipping non-file match"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(path, e)),
            }
        }

        matches.sort();
        Ok(matches)
    }

    async fn move_file(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
        ensure_parent(to).await?;

        match tokio::fs::rename(from, to).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StoreError::io(from, e)),
            Err(e) => {
                // Typically EXDEV: destination on another filesystem
                debug!(
                    from = %from.display(),
                    to = %to.display(),
                    error = %e,
                    "Rename failed, falling back to copy and remove"
                );
                tokio::fs::copy(from, to)
                    .await
                    .map_err(|e| StoreError::io(to, e))?;
                tokio::fs::remove_file(from)
                    .await
                    .map_err(|e| StoreError::io(from, e))
            }
        }
    }

    async fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }

    async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
        match tokio::fs::symlink_metadata(path).await {
            Ok(_) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StoreError::io(path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lists_direct_children_only() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("capture_b.ivf"), b"b").unwrap();
        std::fs::write(dir.path().join("capture_a.ivf"), b"a").unwrap();
        std::fs::write(dir.path().join("capture_a.rtc.log"), b"log").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        std::fs::write(dir.path().join("nested").join("capture_c.ivf"), b"c").unwrap();
        std::fs::create_dir(dir.path().join("capture_dir.ivf")).unwrap();

        let found = FsArtifactStore
            .list_matching(dir.path(), "capture_*.ivf")
            .await
            .unwrap();

        assert_eq!(
            found,
            vec![
                dir.path().join("capture_a.ivf"),
                dir.path().join("capture_b.ivf")
            ]
        );
    }

    #[tokio::test]
    async fn test_hidden_files_need_literal_dot() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".partial.ivf"), b"x").unwrap();

        let found = FsArtifactStore.list_matching(dir.path(), "*.ivf").await.unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_missing_directory_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let found = FsArtifactStore
            .list_matching(&dir.path().join("absent"), "*.ivf")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_glob() {
        let dir = tempfile::tempdir().unwrap();
        let result = FsArtifactStore.list_matching(dir.path(), "capture_[.ivf").await;
        assert!(matches!(result, Err(StoreError::InvalidPattern { .. })));
    }

    #[tokio::test]
    async fn test_move_overwrites_and_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let from = dir.path().join("capture_a.ivf");
        let to = dir.path().join("out").join("trial.ivf");
        std::fs::write(&from, b"fresh").unwrap();
        std::fs::create_dir_all(to.parent().unwrap()).unwrap();
        std::fs::write(&to, b"stale").unwrap();

        FsArtifactStore.move_file(&from, &to).await.unwrap();

        assert!(!from.exists());
        assert_eq!(std::fs::read(&to).unwrap(), b"fresh");
    }

    #[tokio::test]
    async fn test_move_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result = FsArtifactStore
            .move_file(&dir.path().join("nope.ivf"), &dir.path().join("trial.ivf"))
            .await;
        let err = tokio_test::assert_err!(result);
        assert!(matches!(err, StoreError::Io { .. }));
        assert!(!dir.path().join("trial.ivf").exists());
    }

    #[tokio::test]
    async fn test_exists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture_a.ivf");
        assert!(!FsArtifactStore.exists(&path).await.unwrap());

        std::fs::write(&path, b"x").unwrap();
        assert!(FsArtifactStore.exists(&path).await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("capture_a.ivf");
        std::fs::write(&path, b"x").unwrap();

        tokio_test::assert_ok!(FsArtifactStore.remove_file(&path).await);
        tokio_test::assert_ok!(FsArtifactStore.remove_file(&path).await);
        assert!(!path.exists());
    }
}
