// Process discovery port
// reason: async-trait, adapters shell out to OS tooling
use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{ListenerIdentity, ProcessId};

/// Discovery errors
///
/// Never fatal for the supervisor: termination is best-effort, so any of these
/// degrades to "no processes found".
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("Discovery tool unavailable: {0}")]
    ToolUnavailable(String),

    #[error("Discovery query failed: {0}")]
    QueryFailed(String),
}

/// Process finder port
///
/// Implementations:
/// - by listening TCP port (socket table)
/// - by command-line substring (process table)
#[async_trait]
pub trait ProcessFinder: Send + Sync {
    /// Resolve running processes matching the identity
    ///
    /// # Returns
    /// PIDs in no particular order; an empty list when nothing matches
    async fn find(&self, identity: &ListenerIdentity) -> Result<Vec<ProcessId>, DiscoveryError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;

    /// Finder with a canned answer
    pub struct StaticProcessFinder {
        answer: Result<Vec<ProcessId>, DiscoveryError>,
    }

    impl StaticProcessFinder {
        pub fn found(pids: &[u32]) -> Self {
            Self {
                answer: Ok(pids.iter().copied().map(ProcessId::new).collect()),
            }
        }

        pub fn unavailable() -> Self {
            Self {
                answer: Err(DiscoveryError::ToolUnavailable("lsof".to_string())),
            }
        }
    }

    #[async_trait]
    impl ProcessFinder for StaticProcessFinder {
        async fn find(
            &self,
            _identity: &ListenerIdentity,
        ) -> Result<Vec<ProcessId>, DiscoveryError> {
            self.answer.clone()
        }
    }
}
