// Port Layer - Interfaces for external dependencies

pub mod artifact_store;
pub mod process_controller;
pub mod process_finder;

// Re-exports
pub use artifact_store::{ArtifactStore, StoreError};
pub use process_controller::{ControlError, LaunchedProcess, ProcessController};
pub use process_finder::{DiscoveryError, ProcessFinder};
