// Process controller implementation
// reason: nix for signals and setsid, std::process for a spawn we can let go of
use async_trait::async_trait;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;
use tracing::{debug, info, warn};

use conductor_core::application::constants::DEFAULT_STARTUP_GRACE;
use conductor_core::domain::{LaunchSpec, ProcessId};
use conductor_core::port::process_controller::{ControlError, LaunchedProcess, ProcessController};

use crate::inhibitor::{self, WrappedCommand};

/// Signals and launches real OS processes
///
/// Launched processes run in their own session with output going to the
/// spec's log file; the child handle is dropped once the startup grace
/// period has passed, so nothing here keeps them alive or tracks them.
pub struct SystemProcessController {
    startup_grace: Duration,
}

impl SystemProcessController {
    /// Create a new controller
    ///
    /// # Arguments
    /// * `startup_grace` - How long a fresh process must survive to count as launched
    pub fn new(startup_grace: Duration) -> Self {
        Self { startup_grace }
    }

    /// Spawn one command and watch it through the grace period
    async fn spawn_detached(
        &self,
        spec: &LaunchSpec,
        wrapped: &WrappedCommand,
    ) -> Result<ProcessId, StartFailure> {
        let log = open_log(spec)?;
        let log_err = log
            .try_clone()
            .map_err(|e| ControlError::Io(format!("{}: {}", spec.log_path.display(), e)))?;

        let program = resolve_program(&wrapped.program)?;
        let mut child = build_command(&program, spec, wrapped, log, log_err)
            .spawn()
            .map_err(StartFailure::Spawn)?;
        let pid = ProcessId::new(child.id());

        debug!(pid = %pid, grace_ms = self.startup_grace.as_millis() as u64, "Watching startup");
        tokio::time::sleep(self.startup_grace).await;

        match child.try_wait() {
            Ok(None) => Ok(pid),
            Ok(Some(status)) => Err(StartFailure::Exited { pid, status }),
            Err(e) => Err(ControlError::Io(format!("wait on {}: {}", pid, e)).into()),
        }
    }

    /// Launch `wrapped`, falling back to the bare command only when the
    /// inhibitor itself refused to run
    async fn launch_with(
        &self,
        spec: &LaunchSpec,
        wrapped: &WrappedCommand,
    ) -> Result<LaunchedProcess, ControlError> {
        info!(
            program = %wrapped.program.display(),
            args = ?wrapped.args,
            log_path = %spec.log_path.display(),
            inhibited = wrapped.inhibited,
            "Launching detached process"
        );

        match self.spawn_detached(spec, wrapped).await {
            Ok(pid) => Ok(LaunchedProcess {
                pid,
                inhibited: wrapped.inhibited,
            }),
            Err(failure) if wrapped.inhibited && inhibitor_refused(&failure, wrapped, spec) => {
                warn!(
                    tool = %wrapped.program.display(),
                    "Sleep inhibitor refused to start, launching without it"
                );
                let plain = WrappedCommand::plain(spec);
                let pid = self
                    .spawn_detached(spec, &plain)
                    .await
                    .map_err(|f| f.into_control_error(&plain, spec))?;
                Ok(LaunchedProcess {
                    pid,
                    inhibited: false,
                })
            }
            Err(failure) => Err(failure.into_control_error(wrapped, spec)),
        }
    }

    #[cfg(unix)]
    fn send_kill(&self, pid: ProcessId) -> Result<(), ControlError> {
        use nix::errno::Errno;
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        match kill(Pid::from_raw(pid.as_u32() as i32), Signal::SIGKILL) {
            Ok(()) => Ok(()),
            Err(Errno::ESRCH) => Err(ControlError::NoSuchProcess(pid)),
            Err(e) => Err(ControlError::SignalFailed {
                pid,
                reason: e.to_string(),
            }),
        }
    }

    #[cfg(windows)]
    fn send_kill(&self, pid: ProcessId) -> Result<(), ControlError> {
        let output = Command::new("taskkill")
            .args(["/F", "/PID", &pid.to_string()])
            .output()
            .map_err(|e| ControlError::SignalFailed {
                pid,
                reason: e.to_string(),
            })?;

        if output.status.success() {
            return Ok(());
        }
        if !self.is_alive(pid) {
            return Err(ControlError::NoSuchProcess(pid));
        }
        Err(ControlError::SignalFailed {
            pid,
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

impl Default for SystemProcessController {
    fn default() -> Self {
        Self::new(DEFAULT_STARTUP_GRACE)
    }
}

/// Why a spawn did not leave a running process behind
enum StartFailure {
    /// exec itself failed
    Spawn(std::io::Error),
    /// Started, then exited within the grace period
    Exited { pid: ProcessId, status: ExitStatus },
    Control(ControlError),
}

impl From<ControlError> for StartFailure {
    fn from(err: ControlError) -> Self {
        StartFailure::Control(err)
    }
}

impl StartFailure {
    fn into_control_error(self, wrapped: &WrappedCommand, spec: &LaunchSpec) -> ControlError {
        match self {
            StartFailure::Spawn(e) => {
                ControlError::LaunchFailed(format!("{}: {}", wrapped.program.display(), e))
            }
            StartFailure::Exited { pid, status } => ControlError::LaunchFailed(format!(
                "{} (pid {}) exited during startup with {}; see {}",
                wrapped.program.display(),
                pid,
                status,
                spec.log_path.display()
            )),
            StartFailure::Control(e) => e,
        }
    }
}

/// True when the failure belongs to the inhibitor wrapper, not the server
///
/// The wrapper exits with the server's own status once the server runs, so
/// an early exit only counts when the wrapper left its refusal in the log.
fn inhibitor_refused(failure: &StartFailure, wrapped: &WrappedCommand, spec: &LaunchSpec) -> bool {
    match failure {
        StartFailure::Spawn(_) => true,
        StartFailure::Exited { .. } => std::fs::read_to_string(&spec.log_path)
            .map(|log| wrapped.refusal_markers.iter().any(|m| log.contains(m)))
            .unwrap_or(false),
        StartFailure::Control(_) => false,
    }
}

/// Anchor a relative program path to our own working directory
///
/// The child changes into the spec's working directory before exec, which
/// would otherwise resolve the path a second time. Bare names still go
/// through PATH lookup.
fn resolve_program(program: &Path) -> Result<PathBuf, ControlError> {
    if program.is_absolute() || program.components().count() < 2 {
        return Ok(program.to_path_buf());
    }
    let cwd = std::env::current_dir()
        .map_err(|e| ControlError::Io(format!("current directory: {}", e)))?;
    Ok(cwd.join(program))
}

fn build_command(
    program: &Path,
    spec: &LaunchSpec,
    wrapped: &WrappedCommand,
    log: File,
    log_err: File,
) -> Command {
    let mut command = Command::new(program);
    command
        .args(&wrapped.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(log))
        .stderr(Stdio::from(log_err));
    if let Some(dir) = &spec.working_dir {
        command.current_dir(dir);
    }
    detach(&mut command);
    command
}

/// Truncate (or create) the log file, creating parent directories
fn open_log(spec: &LaunchSpec) -> Result<File, ControlError> {
    let io_err = |e: std::io::Error| ControlError::Io(format!("{}: {}", spec.log_path.display(), e));

    if let Some(parent) = spec.log_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    File::create(&spec.log_path).map_err(io_err)
}

/// Put the child in its own session so it outlives the caller's terminal/SSH session
#[cfg(unix)]
fn detach(command: &mut Command) {
    use std::os::unix::process::CommandExt;

    // SAFETY: setsid is async-signal-safe and the closure touches no shared state
    unsafe {
        command.pre_exec(|| {
            nix::unistd::setsid()
                .map(|_| ())
                .map_err(std::io::Error::from)
        });
    }
}

#[cfg(windows)]
fn detach(command: &mut Command) {
    use std::os::windows::process::CommandExt;

    const DETACHED_PROCESS: u32 = 0x0000_0008;
    const CREATE_NEW_PROCESS_GROUP: u32 = 0x0000_0200;
    command.creation_flags(DETACHED_PROCESS | CREATE_NEW_PROCESS_GROUP);
}

#[async_trait]
impl ProcessController for SystemProcessController {
    async fn terminate(&self, pid: ProcessId) -> Result<(), ControlError> {
        info!(pid = %pid, "Sending kill signal");
        self.send_kill(pid)
    }

    fn is_alive(&self, pid: ProcessId) -> bool {
        #[cfg(unix)]
        {
            use nix::errno::Errno;
            use nix::sys::signal::kill;
            use nix::unistd::Pid;

            // Signal 0 checks existence; EPERM means it exists but isn't ours
            match kill(Pid::from_raw(pid.as_u32() as i32), None) {
                Ok(()) | Err(Errno::EPERM) => !crate::process_finder_impl::is_zombie(pid),
                Err(_) => false,
            }
        }

        #[cfg(windows)]
        {
            let output = Command::new("tasklist")
                .args(["/FI", &format!("PID eq {}", pid), "/NH"])
                .output();

            if let Ok(output) = output {
                let output_str = String::from_utf8_lossy(&output.stdout);
                output_str.contains(&pid.to_string())
            } else {
                false
            }
        }
    }

    async fn launch_detached(&self, spec: &LaunchSpec) -> Result<LaunchedProcess, ControlError> {
        let wrapped = inhibitor::wrap(spec);
        self.launch_with(spec, &wrapped).await
    }
}
