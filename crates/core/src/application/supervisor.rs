// Listener process supervisor: restart-now semantics
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::application::constants::{DEFAULT_SETTLE_TIMEOUT, SETTLE_POLL_INTERVAL};
use crate::domain::{LaunchSpec, ListenerIdentity, ProcessId};
use crate::error::{AppError, Result};
use crate::port::{ControlError, ProcessController, ProcessFinder};

/// Supervisor tuning
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Upper bound on waiting for terminated processes to vanish
    pub settle_timeout: Duration,
    pub poll_interval: Duration,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            settle_timeout: DEFAULT_SETTLE_TIMEOUT,
            poll_interval: SETTLE_POLL_INTERVAL,
        }
    }
}

/// Result of a discovery query, tolerant of missing tooling
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Discovery {
    pub pids: Vec<ProcessId>,
    /// Tooling failed; `pids` is empty and means "unknown", not "none"
    pub degraded: bool,
}

/// What a restart did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestartReport {
    pub identity: ListenerIdentity,
    /// Processes that accepted the termination signal
    pub terminated: Vec<ProcessId>,
    /// Terminated processes still alive when the settle window closed
    pub lingering: Vec<ProcessId>,
    pub pid: ProcessId,
    pub inhibited: bool,
    pub discovery_degraded: bool,
}

/// Process supervisor
///
/// Guarantees one freshly started listener per call. No restart-on-crash:
/// the launched process is not tracked after `ensure_restarted` returns.
pub struct ProcessSupervisor {
    finder: Arc<dyn ProcessFinder>,
    controller: Arc<dyn ProcessController>,
    config: SupervisorConfig,
}

impl ProcessSupervisor {
    /// Create a new supervisor
    ///
    /// # Example
    /// ```ignore
    /// let supervisor = ProcessSupervisor::new(
    ///     Arc::new(SystemProcessFinder::new()),
    ///     Arc::new(SystemProcessController::new(DEFAULT_STARTUP_GRACE)),
    ///     SupervisorConfig::default(),
    /// );
    /// ```
    pub fn new(
        finder: Arc<dyn ProcessFinder>,
        controller: Arc<dyn ProcessController>,
        config: SupervisorConfig,
    ) -> Self {
        Self {
            finder,
            controller,
            config,
        }
    }

    /// Discovery query on its own; failures degrade to an empty result
    pub async fn discover(&self, identity: &ListenerIdentity) -> Discovery {
        match self.finder.find(identity).await {
            Ok(mut pids) => {
                pids.sort();
                pids.dedup();
                debug!(identity = %identity, pids = ?pids, "Discovery completed");
                Discovery {
                    pids,
                    degraded: false,
                }
            }
            Err(e) => {
                warn!(
                    identity = %identity,
                    error = %e,
                    "Process discovery degraded, assuming no running instance"
                );
                Discovery {
                    pids: Vec::new(),
                    degraded: true,
                }
            }
        }
    }

    /// Terminate any instance matching `identity`, then launch a fresh one
    ///
    /// Steps:
    /// 1. Discover matching PIDs (degrades to none on tooling failure)
    /// 2. Kill each one, best-effort
    /// 3. Wait (bounded) for the killed PIDs to disappear
    /// 4. Launch detached with output going to the launch spec's log file
    ///
    /// # Errors
    /// - AppError::Domain if the launch spec is unusable
    /// - AppError::LaunchFailed if the new process cannot start
    pub async fn ensure_restarted(
        &self,
        identity: &ListenerIdentity,
        spec: &LaunchSpec,
    ) -> Result<RestartReport> {
        spec.validate()?;

        info!(
            identity = %identity,
            executable = %spec.executable.display(),
            "Restarting listener"
        );

        let discovery = self.discover(identity).await;
        let terminated = self.terminate_all(&discovery.pids).await;
        let lingering = self.wait_for_exit(&terminated).await;

        let launched = self
            .controller
            .launch_detached(spec)
            .await
            .map_err(AppError::LaunchFailed)?;

        info!(
            identity = %identity,
            pid = %launched.pid,
            terminated = terminated.len(),
            inhibited = launched.inhibited,
            log_path = %spec.log_path.display(),
            "Listener launched"
        );

        Ok(RestartReport {
            identity: identity.clone(),
            terminated,
            lingering,
            pid: launched.pid,
            inhibited: launched.inhibited,
            discovery_degraded: discovery.degraded,
        })
    }

    /// Kill every pid; returns the ones that took the signal
    async fn terminate_all(&self, pids: &[ProcessId]) -> Vec<ProcessId> {
        let mut terminated = Vec::with_capacity(pids.len());

        for &pid in pids {
            match self.controller.terminate(pid).await {
                Ok(()) => {
                    info!(pid = %pid, "Terminated conflicting process");
                    terminated.push(pid);
                }
                Err(ControlError::NoSuchProcess(_)) => {
                    debug!(pid = %pid, "Process already gone");
                }
                Err(e) => {
                    warn!(pid = %pid, error = %e, "Failed to terminate process, continuing");
                }
            }
        }

        terminated
    }

    /// Poll until the pids are gone or the settle window closes
    async fn wait_for_exit(&self, pids: &[ProcessId]) -> Vec<ProcessId> {
        if pids.is_empty() {
            return Vec::new();
        }

        let deadline = Instant::now() + self.config.settle_timeout;
        loop {
            let alive: Vec<ProcessId> = pids
                .iter()
                .copied()
                .filter(|pid| self.controller.is_alive(*pid))
                .collect();

            if alive.is_empty() {
                return alive;
            }

            if Instant::now() >= deadline {
                warn!(pids = ?alive, "Terminated processes still alive after settle window");
                return alive;
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::InhibitorMode;
    use crate::port::process_controller::mocks::FakeProcessTable;
    use crate::port::process_finder::mocks::StaticProcessFinder;

    const SERVER: &str = "/opt/rtc/peerconnection_server";

    fn spec() -> LaunchSpec {
        LaunchSpec::new(SERVER, "/opt/rtc/signal_server.log").with_args(["--port=8888"])
    }

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig {
            settle_timeout: Duration::from_millis(100),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn build_supervisor(table: &Arc<FakeProcessTable>) -> ProcessSupervisor {
        ProcessSupervisor::new(table.clone(), table.clone(), fast_config())
    }

    #[tokio::test]
    async fn test_restart_kills_port_holder_and_launches() {
        let table = Arc::new(
            FakeProcessTable::new()
                .listening_on(8888)
                .with_process(42, Some(8888), SERVER)
                .with_process(43, Some(9000), "/usr/bin/other"),
        );
        let supervisor = build_supervisor(&table);

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await
            .unwrap();

        assert_eq!(report.terminated, vec![ProcessId::new(42)]);
        assert!(report.lingering.is_empty());
        assert!(!report.discovery_degraded);

        // Post-condition verified through the same discovery query
        let after = supervisor.discover(&ListenerIdentity::Port(8888)).await;
        assert_eq!(after.pids, vec![report.pid]);

        // Unrelated process untouched
        assert!(table.running().iter().any(|p| p.pid == ProcessId::new(43)));
    }

    #[tokio::test]
    async fn test_restart_with_nothing_running() {
        let table = Arc::new(FakeProcessTable::new().listening_on(8888));
        let supervisor = build_supervisor(&table);

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await
            .unwrap();

        assert!(report.terminated.is_empty());
        assert_eq!(table.running().len(), 1);
    }

    #[tokio::test]
    async fn test_restart_twice_replaces_first_instance() {
        let table = Arc::new(FakeProcessTable::new());
        let supervisor = build_supervisor(&table);
        let identity = ListenerIdentity::command_substring(SERVER).unwrap();

        let first = supervisor.ensure_restarted(&identity, &spec()).await.unwrap();
        let second = supervisor.ensure_restarted(&identity, &spec()).await.unwrap();

        assert_ne!(first.pid, second.pid);
        assert_eq!(second.terminated, vec![first.pid]);

        let running = table.running();
        assert_eq!(running.len(), 1);
        assert_eq!(running[0].pid, second.pid);
    }

    #[tokio::test]
    async fn test_degraded_discovery_still_launches() {
        let table = Arc::new(FakeProcessTable::new().without_discovery());
        let supervisor = build_supervisor(&table);

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await
            .unwrap();

        assert!(report.discovery_degraded);
        assert!(report.terminated.is_empty());
        assert_eq!(table.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_static_finder_unavailable_is_degraded() {
        let table = Arc::new(FakeProcessTable::new());
        let supervisor = ProcessSupervisor::new(
            Arc::new(StaticProcessFinder::unavailable()),
            table.clone(),
            fast_config(),
        );

        let discovery = supervisor.discover(&ListenerIdentity::Port(8888)).await;
        assert!(discovery.degraded);
        assert!(discovery.pids.is_empty());
    }

    #[tokio::test]
    async fn test_vanished_process_is_not_an_error() {
        // Finder reports a pid the table no longer has
        let table = Arc::new(FakeProcessTable::new());
        let supervisor = ProcessSupervisor::new(
            Arc::new(StaticProcessFinder::found(&[77, 77])),
            table.clone(),
            fast_config(),
        );

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await
            .unwrap();

        assert!(report.terminated.is_empty());
        assert_eq!(table.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_unkillable_process_reported_but_launch_proceeds() {
        let table = Arc::new(
            FakeProcessTable::new()
                .with_process(42, Some(8888), SERVER)
                .with_unkillable(42),
        );
        let supervisor = build_supervisor(&table);

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await
            .unwrap();

        assert!(report.terminated.is_empty());
        assert_eq!(table.terminated(), Vec::<ProcessId>::new());
        assert_eq!(table.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_launch_failure_is_fatal() {
        let table = Arc::new(
            FakeProcessTable::new()
                .with_process(42, Some(8888), SERVER)
                .failing_launch("executable not found"),
        );
        let supervisor = build_supervisor(&table);

        let result = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &spec())
            .await;

        assert!(matches!(result, Err(AppError::LaunchFailed(_))));
        // Termination already happened; no retry
        assert_eq!(table.terminated(), vec![ProcessId::new(42)]);
        assert_eq!(table.launches().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_spec_rejected_before_termination() {
        let table = Arc::new(FakeProcessTable::new().with_process(42, Some(8888), SERVER));
        let supervisor = build_supervisor(&table);

        let result = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &LaunchSpec::new("", "log"))
            .await;

        assert!(matches!(result, Err(AppError::Domain(_))));
        assert!(table.terminated().is_empty());
    }

    #[tokio::test]
    async fn test_inhibitor_reported() {
        let table = Arc::new(FakeProcessTable::new());
        let supervisor = build_supervisor(&table);
        let inhibited = spec().with_inhibitor(InhibitorMode::SuppressSleep);

        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &inhibited)
            .await
            .unwrap();
        assert!(report.inhibited);

        let table = Arc::new(FakeProcessTable::new().without_inhibitor());
        let supervisor = build_supervisor(&table);
        let report = supervisor
            .ensure_restarted(&ListenerIdentity::Port(8888), &inhibited)
            .await
            .unwrap();
        assert!(!report.inhibited);
    }
}
