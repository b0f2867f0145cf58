// Application Layer - Use Cases

pub mod constants;
pub mod reconciler;
pub mod supervisor;

// Re-exports
pub use reconciler::{AmbiguityPolicy, ArtifactReconciler};
pub use supervisor::{Discovery, ProcessSupervisor, RestartReport, SupervisorConfig};
