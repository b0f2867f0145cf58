// Artifact store port
// Filesystem operations the reconciler needs, kept behind a trait for testing
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Artifact store errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StoreError::Io {
            path: path.into(),
            source,
        }
    }
}

/// Artifact store trait
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Regular files directly inside `dir` whose name matches `pattern`
    ///
    /// A missing directory yields an empty list. Results are sorted.
    async fn list_matching(&self, dir: &Path, pattern: &str) -> Result<Vec<PathBuf>, StoreError>;

    /// Move a file, replacing whatever is at `to` and creating parent directories
    async fn move_file(&self, from: &Path, to: &Path) -> Result<(), StoreError>;

    /// Delete a file; already-absent files are not an error
    async fn remove_file(&self, path: &Path) -> Result<(), StoreError>;

    /// Whether anything occupies `path`
    async fn exists(&self, path: &Path) -> Result<bool, StoreError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::{Mutex, MutexGuard};

    /// In-memory file tree keyed by full path
    #[derive(Default)]
    pub struct InMemoryArtifactStore {
        files: Mutex<BTreeMap<PathBuf, Vec<u8>>>,
        fail_removals: bool,
    }

    impl InMemoryArtifactStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_file(self, path: impl Into<PathBuf>, contents: &[u8]) -> Self {
            self.put(path, contents);
            self
        }

        /// Every remove_file call fails with PermissionDenied
        pub fn failing_removals(mut self) -> Self {
            self.fail_removals = true;
            self
        }

        pub fn put(&self, path: impl Into<PathBuf>, contents: &[u8]) {
            self.files().insert(path.into(), contents.to_vec());
        }

        pub fn read(&self, path: &Path) -> Option<Vec<u8>> {
            self.files().get(path).cloned()
        }

        pub fn paths(&self) -> Vec<PathBuf> {
            self.files().keys().cloned().collect()
        }

        fn files(&self) -> MutexGuard<'_, BTreeMap<PathBuf, Vec<u8>>> {
            self.files.lock().unwrap()
        }
    }

    /// `*` and `?` wildcards only; enough for tests
    pub fn wildcard_match(pattern: &str, name: &str) -> bool {
        fn go(p: &[char], n: &[char]) -> bool {
            match (p.first(), n.first()) {
                (None, None) => true,
                (Some('*'), _) => go(&p[1..], n) || (!n.is_empty() && go(p, &n[1..])),
                (Some('?'), Some(_)) => go(&p[1..], &n[1..]),
                (Some(a), Some(b)) if a == b => go(&p[1..], &n[1..]),
                _ => false,
            }
        }
        let p: Vec<char> = pattern.chars().collect();
        let n: Vec<char> = name.chars().collect();
        go(&p, &n)
    }

    #[async_trait]
    impl ArtifactStore for InMemoryArtifactStore {
        async fn list_matching(
            &self,
            dir: &Path,
            pattern: &str,
        ) -> Result<Vec<PathBuf>, StoreError> {
            if pattern.contains('[') {
                return Err(StoreError::InvalidPattern {
                    pattern: pattern.to_string(),
                    reason: "character classes unsupported in memory".to_string(),
                });
            }

            Ok(self
                .files()
                .keys()
                .filter(|path| path.parent() == Some(dir))
                .filter(|path| {
                    path.file_name()
                        .and_then(|n| n.to_str())
                        .map(|n| wildcard_match(pattern, n))
                        .unwrap_or(false)
                })
                .cloned()
                .collect())
        }

        async fn move_file(&self, from: &Path, to: &Path) -> Result<(), StoreError> {
            let mut files = self.files();
            let contents = files.remove(from).ok_or_else(|| {
                StoreError::io(from, std::io::Error::from(std::io::ErrorKind::NotFound))
            })?;
            files.insert(to.to_path_buf(), contents);
            Ok(())
        }

        async fn remove_file(&self, path: &Path) -> Result<(), StoreError> {
            if self.fail_removals {
                return Err(StoreError::io(
                    path,
                    std::io::Error::from(std::io::ErrorKind::PermissionDenied),
                ));
            }
            self.files().remove(path);
            Ok(())
        }

        async fn exists(&self, path: &Path) -> Result<bool, StoreError> {
            Ok(self.files().contains_key(path))
        }
    }

}
