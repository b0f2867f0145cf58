//! Process supervisor against real processes
//!
//! Each test installs a throwaway listener script under a temp dir and
//! identifies it by its path, so tests never touch unrelated processes.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use conductor_core::application::{ProcessSupervisor, SupervisorConfig};
use conductor_core::domain::{LaunchSpec, ListenerIdentity, ProcessId};
use conductor_core::port::process_finder::mocks::StaticProcessFinder;
use conductor_core::port::ProcessController;
use conductor_core::AppError;
use conductor_infra_system::{SocketTableFinder, SystemProcessController, SystemProcessFinder};

/// Binds the port in argv[1] and idles
const PYTHON_LISTENER: &str = "import socket, sys, time
s = socket.socket()
s.setsockopt(socket.SOL_SOCKET, socket.SO_REUSEADDR, 1)
s.bind(('127.0.0.1', int(sys.argv[1])))
s.listen()
time.sleep(30)";

fn install_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    // Trailing exit keeps the shell from exec-ing its last command and losing its cmdline
    std::fs::write(&path, format!("#!/bin/sh\n{}\nexit 0\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn controller() -> Arc<SystemProcessController> {
    Arc::new(SystemProcessController::new(Duration::from_millis(200)))
}

fn config() -> SupervisorConfig {
    SupervisorConfig {
        settle_timeout: Duration::from_secs(2),
        poll_interval: Duration::from_millis(20),
    }
}

fn on_path(tool: &str) -> bool {
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| dir.join(tool).is_file()))
        .unwrap_or(false)
}

fn free_port() -> u16 {
    let socket = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

/// Poll the socket table until `port` is held by exactly `expected`
async fn wait_for_listener(port: u16, expected: &[ProcessId]) -> bool {
    let finder = SocketTableFinder::new();
    for _ in 0..100 {
        if let Ok(pids) = finder.find_port(port).await {
            if pids == expected {
                return true;
            }
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

fn identity_for(script: &Path) -> ListenerIdentity {
    ListenerIdentity::command_substring(script.to_string_lossy()).unwrap()
}

#[tokio::test]
async fn test_restart_replaces_running_instance() {
    let dir = tempfile::tempdir().unwrap();
    let script = install_script(dir.path(), "listener_replace.sh", "echo listening\nsleep 20");
    let log = dir.path().join("listener.log");
    let controller = controller();
    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        controller.clone(),
        config(),
    );
    let identity = identity_for(&script);
    let spec = LaunchSpec::new(&script, &log).with_working_dir(dir.path());

    // Nothing running yet: a plain start
    let first = supervisor.ensure_restarted(&identity, &spec).await.unwrap();
    assert!(first.terminated.is_empty());
    assert!(controller.is_alive(first.pid));

    // Second call kills the first instance before launching
    let second = supervisor.ensure_restarted(&identity, &spec).await.unwrap();
    assert_eq!(second.terminated, vec![first.pid]);
    assert!(second.lingering.is_empty());
    assert_ne!(second.pid, first.pid);
    assert!(!controller.is_alive(first.pid));
    assert!(controller.is_alive(second.pid));

    // Exactly one instance is left
    let discovery = supervisor.discover(&identity).await;
    assert!(!discovery.degraded);
    assert_eq!(discovery.pids, vec![second.pid]);

    let contents = std::fs::read_to_string(&log).unwrap();
    assert_eq!(contents, "listening\n");

    controller.terminate(second.pid).await.unwrap();
}

#[tokio::test]
async fn test_restart_truncates_previous_log() {
    let dir = tempfile::tempdir().unwrap();
    let script = install_script(dir.path(), "listener_log.sh", "sleep 20");
    let log = dir.path().join("listener.log");
    std::fs::write(&log, "output of the previous trial\n").unwrap();

    let controller = controller();
    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        controller.clone(),
        config(),
    );
    let report = supervisor
        .ensure_restarted(&identity_for(&script), &LaunchSpec::new(&script, &log))
        .await
        .unwrap();

    assert_eq!(std::fs::read_to_string(&log).unwrap(), "");
    controller.terminate(report.pid).await.unwrap();
}

#[tokio::test]
async fn test_restart_reports_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = install_script(dir.path(), "listener_crash.sh", "echo bind failed >&2\nexit 3");
    let log = dir.path().join("listener.log");
    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        controller(),
        config(),
    );

    let result = supervisor
        .ensure_restarted(&identity_for(&script), &LaunchSpec::new(&script, &log))
        .await;

    assert!(matches!(result, Err(AppError::LaunchFailed(_))));
    assert!(std::fs::read_to_string(&log)
        .unwrap()
        .contains("bind failed"));
}

#[tokio::test]
async fn test_restart_proceeds_when_discovery_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let script = install_script(dir.path(), "listener_blind.sh", "sleep 20");
    let controller = controller();
    let supervisor = ProcessSupervisor::new(
        Arc::new(StaticProcessFinder::unavailable()),
        controller.clone(),
        config(),
    );

    let report = supervisor
        .ensure_restarted(
            &identity_for(&script),
            &LaunchSpec::new(&script, dir.path().join("listener.log")),
        )
        .await
        .unwrap();

    assert!(report.discovery_degraded);
    assert!(report.terminated.is_empty());
    assert!(controller.is_alive(report.pid));

    controller.terminate(report.pid).await.unwrap();
}

#[tokio::test]
async fn test_missing_executable_is_launch_failure() {
    let dir = tempfile::tempdir().unwrap();
    let script = dir.path().join("not_installed.sh");
    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        controller(),
        config(),
    );

    let result = supervisor
        .ensure_restarted(
            &identity_for(&script),
            &LaunchSpec::new(&script, dir.path().join("listener.log")),
        )
        .await;

    assert!(matches!(result, Err(AppError::LaunchFailed(_))));
}

#[tokio::test]
async fn test_restart_by_port_replaces_real_listener() {
    if !on_path("python3") || !(on_path("lsof") || on_path("fuser")) {
        eprintln!("skipping: needs python3 and lsof or fuser");
        return;
    }

    let dir = tempfile::tempdir().unwrap();
    let port = free_port();
    let identity = ListenerIdentity::port(port).unwrap();
    let spec = LaunchSpec::new("python3", dir.path().join("listener.log"))
        .with_args(["-c", PYTHON_LISTENER, port.to_string().as_str()])
        .with_working_dir(dir.path());
    let controller = controller();
    let supervisor = ProcessSupervisor::new(
        Arc::new(SystemProcessFinder::new()),
        controller.clone(),
        config(),
    );

    let first = supervisor.ensure_restarted(&identity, &spec).await.unwrap();
    assert!(first.terminated.is_empty());
    assert!(
        wait_for_listener(port, &[first.pid]).await,
        "first instance never showed up on port {}",
        port
    );

    let second = supervisor.ensure_restarted(&identity, &spec).await.unwrap();
    assert_eq!(second.terminated, vec![first.pid]);
    assert!(!controller.is_alive(first.pid));
    assert!(
        wait_for_listener(port, &[second.pid]).await,
        "replacement never took over port {}",
        port
    );

    let discovery = supervisor.discover(&identity).await;
    assert!(!discovery.degraded);
    assert_eq!(discovery.pids, vec![second.pid]);

    controller.terminate(second.pid).await.unwrap();
}
