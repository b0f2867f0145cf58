// Conductor Infrastructure - System Adapters
// Implements: ProcessFinder, ProcessController, ArtifactStore

pub mod fs_artifact_store;
mod inhibitor;
pub mod process_controller_impl;
pub mod process_finder_impl;

pub use fs_artifact_store::FsArtifactStore;
pub use process_controller_impl::SystemProcessController;
pub use process_finder_impl::{CommandLineFinder, SocketTableFinder, SystemProcessFinder};
