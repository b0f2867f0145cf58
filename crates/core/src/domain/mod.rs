// Domain Layer - Pure entities for the supervisor and the reconciler

pub mod artifact;
pub mod error;
pub mod listener;

// Re-exports
pub use artifact::{ArtifactQuery, ReconcileOutcome};
pub use error::DomainError;
pub use listener::{InhibitorMode, LaunchSpec, ListenerIdentity, ProcessId};
