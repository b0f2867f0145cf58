// Process Controller Port
// Abstraction for signalling and launching OS processes

use crate::domain::{LaunchSpec, ProcessId};
use async_trait::async_trait;
use thiserror::Error;

/// What the supervisor learns about a freshly launched process
///
/// Deliberately carries no handle: once launched, the process is on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchedProcess {
    pub pid: ProcessId,
    /// True when the launch actually went through a sleep inhibitor
    pub inhibited: bool,
}

/// Process control errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControlError {
    #[error("No such process: {0}")]
    NoSuchProcess(ProcessId),

    #[error("Signal to {pid} failed: {reason}")]
    SignalFailed { pid: ProcessId, reason: String },

    #[error("{0}")]
    LaunchFailed(String),

    #[error("IO error: {0}")]
    Io(String),
}

/// Process Controller trait
#[async_trait]
pub trait ProcessController: Send + Sync {
    /// Send an unconditional termination signal
    ///
    /// # Errors
    /// - ControlError::NoSuchProcess if the process already exited
    /// - ControlError::SignalFailed for anything else (permissions, ...)
    async fn terminate(&self, pid: ProcessId) -> Result<(), ControlError>;

    /// Check if a process is still alive (zombies count as dead)
    fn is_alive(&self, pid: ProcessId) -> bool;

    /// Start a process detached from the caller's session
    ///
    /// # Errors
    /// - ControlError::LaunchFailed if the process cannot start or dies during startup
    async fn launch_detached(&self, spec: &LaunchSpec) -> Result<LaunchedProcess, ControlError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use crate::domain::{InhibitorMode, ListenerIdentity};
    use crate::port::process_finder::{DiscoveryError, ProcessFinder};
    use std::sync::{Mutex, MutexGuard};

    /// Entry in the fake process table
    #[derive(Debug, Clone, PartialEq, Eq)]
    pub struct FakeProcess {
        pub pid: ProcessId,
        pub port: Option<u16>,
        pub command: String,
    }

    #[derive(Default)]
    struct FakeState {
        processes: Vec<FakeProcess>,
        next_pid: u32,
        launch_port: Option<u16>,
        launch_failure: Option<String>,
        discovery_down: bool,
        inhibitor_missing: bool,
        unkillable: Vec<ProcessId>,
        terminated: Vec<ProcessId>,
        launches: Vec<LaunchSpec>,
    }

    /// In-memory process table acting as both finder and controller
    ///
    /// Launched processes show up in later discovery queries, which is what
    /// the restart-twice scenarios rely on.
    pub struct FakeProcessTable {
        state: Mutex<FakeState>,
    }

    impl FakeProcessTable {
        pub fn new() -> Self {
            Self {
                state: Mutex::new(FakeState {
                    next_pid: 1000,
                    ..Default::default()
                }),
            }
        }

        pub fn with_process(mut self, pid: u32, port: Option<u16>, command: &str) -> Self {
            self.state_mut().processes.push(FakeProcess {
                pid: ProcessId::new(pid),
                port,
                command: command.to_string(),
            });
            self
        }

        /// Launched processes bind this port
        pub fn listening_on(mut self, port: u16) -> Self {
            self.state_mut().launch_port = Some(port);
            self
        }

        pub fn failing_launch(mut self, reason: &str) -> Self {
            self.state_mut().launch_failure = Some(reason.to_string());
            self
        }

        pub fn without_discovery(mut self) -> Self {
            self.state_mut().discovery_down = true;
            self
        }

        pub fn without_inhibitor(mut self) -> Self {
            self.state_mut().inhibitor_missing = true;
            self
        }

        /// Signals to this pid fail and it keeps running
        pub fn with_unkillable(mut self, pid: u32) -> Self {
            self.state_mut().unkillable.push(ProcessId::new(pid));
            self
        }

        pub fn running(&self) -> Vec<FakeProcess> {
            self.state().processes.clone()
        }

        pub fn terminated(&self) -> Vec<ProcessId> {
            self.state().terminated.clone()
        }

        pub fn launches(&self) -> Vec<LaunchSpec> {
            self.state().launches.clone()
        }

        fn state(&self) -> MutexGuard<'_, FakeState> {
            self.state.lock().unwrap()
        }

        fn state_mut(&mut self) -> &mut FakeState {
            self.state.get_mut().unwrap()
        }
    }

    impl Default for FakeProcessTable {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ProcessFinder for FakeProcessTable {
        async fn find(
            &self,
            identity: &ListenerIdentity,
        ) -> Result<Vec<ProcessId>, DiscoveryError> {
            let state = self.state();
            if state.discovery_down {
                return Err(DiscoveryError::ToolUnavailable("lsof".to_string()));
            }

            Ok(state
                .processes
                .iter()
                .filter(|p| match identity {
                    ListenerIdentity::Port(port) => p.port == Some(*port),
                    ListenerIdentity::CommandSubstring(text) => p.command.contains(text.as_str()),
                })
                .map(|p| p.pid)
                .collect())
        }
    }

    #[async_trait]
    impl ProcessController for FakeProcessTable {
        async fn terminate(&self, pid: ProcessId) -> Result<(), ControlError> {
            let mut state = self.state();
            if state.unkillable.contains(&pid) {
                return Err(ControlError::SignalFailed {
                    pid,
                    reason: "EPERM".to_string(),
                });
            }

            let before = state.processes.len();
            state.processes.retain(|p| p.pid != pid);
            if state.processes.len() == before {
                return Err(ControlError::NoSuchProcess(pid));
            }

            state.terminated.push(pid);
            Ok(())
        }

        fn is_alive(&self, pid: ProcessId) -> bool {
            self.state().processes.iter().any(|p| p.pid == pid)
        }

        async fn launch_detached(
            &self,
            spec: &LaunchSpec,
        ) -> Result<LaunchedProcess, ControlError> {
            let mut state = self.state();
            state.launches.push(spec.clone());

            if let Some(reason) = state.launch_failure.clone() {
                return Err(ControlError::LaunchFailed(reason));
            }

            let pid = ProcessId::new(state.next_pid);
            state.next_pid += 1;

            let command = std::iter::once(spec.executable.display().to_string())
                .chain(spec.args.iter().cloned())
                .collect::<Vec<_>>()
                .join(" ");
            let port = state.launch_port;
            state.processes.push(FakeProcess { pid, port, command });

            Ok(LaunchedProcess {
                pid,
                inhibited: spec.inhibitor == InhibitorMode::SuppressSleep
                    && !state.inhibitor_missing,
            })
        }
    }
}
