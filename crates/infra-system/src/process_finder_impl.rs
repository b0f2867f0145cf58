// Process discovery adapters
// reason: sysinfo for the process table, lsof/fuser for the socket table
use async_trait::async_trait;
use std::collections::HashSet;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessRefreshKind, ProcessStatus, System, UpdateKind};
use tokio::process::Command;
use tracing::debug;

use conductor_core::domain::{ListenerIdentity, ProcessId};
use conductor_core::port::process_finder::{DiscoveryError, ProcessFinder};

/// Finds processes holding a listening TCP socket
///
/// Unix: `lsof`, falling back to `fuser`. Windows: `netstat -ano`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SocketTableFinder;

impl SocketTableFinder {
    pub fn new() -> Self {
        Self
    }

    pub async fn find_port(&self, port: u16) -> Result<Vec<ProcessId>, DiscoveryError> {
        #[cfg(unix)]
        {
            let lsof_args = [
                "-t".to_string(),
                format!("-iTCP:{}", port),
                "-sTCP:LISTEN".to_string(),
            ];
            if let Some(stdout) = run_tool("lsof", &lsof_args).await? {
                return Ok(parse_pid_list(&stdout));
            }

            // fuser prints "8888/tcp:" on stderr and the bare pids on stdout
            if let Some(stdout) = run_tool("fuser", &[format!("{}/tcp", port)]).await? {
                return Ok(parse_pid_list(&stdout));
            }

            Err(DiscoveryError::ToolUnavailable(
                "neither lsof nor fuser is installed".to_string(),
            ))
        }

        #[cfg(windows)]
        {
            let args = ["-ano".to_string(), "-p".to_string(), "TCP".to_string()];
            match run_tool("netstat", &args).await? {
                Some(stdout) => Ok(parse_netstat_listeners(&stdout, port)),
                None => Err(DiscoveryError::ToolUnavailable("netstat".to_string())),
            }
        }
    }
}

/// Run a discovery tool
///
/// Returns Ok(None) when the tool is not installed.
async fn run_tool(program: &str, args: &[String]) -> Result<Option<String>, DiscoveryError> {
    let output = match Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
    {
        Ok(output) => output,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(program = %program, "Discovery tool not installed");
            return Ok(None);
        }
        Err(e) => {
            return Err(DiscoveryError::QueryFailed(format!("{}: {}", program, e)));
        }
    };

    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();

    // lsof and fuser both exit 1 when nothing matches
    let nothing_found = output.status.code() == Some(1) && stdout.trim().is_empty();
    if output.status.success() || nothing_found {
        debug!(program = %program, args = ?args, "Discovery tool completed");
        return Ok(Some(stdout));
    }

    Err(DiscoveryError::QueryFailed(format!(
        "{} exited with {}: {}",
        program,
        output.status,
        String::from_utf8_lossy(&output.stderr).trim()
    )))
}

/// Parse whitespace separated pids, tolerating fuser's access suffixes ("1234e")
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn parse_pid_list(text: &str) -> Vec<ProcessId> {
    text.split_whitespace()
        .filter_map(|token| {
            let digits: String = token.chars().take_while(|c| c.is_ascii_digit()).collect();
            digits.parse::<u32>().ok()
        })
        .filter(|pid| *pid != 0)
        .map(ProcessId::new)
        .collect()
}

/// Pick LISTENING rows bound to `port` out of `netstat -ano` output
#[cfg_attr(not(windows), allow(dead_code))]
pub(crate) fn parse_netstat_listeners(text: &str, port: u16) -> Vec<ProcessId> {
    let suffix = format!(":{}", port);
    text.lines()
        .filter_map(|line| {
            let cols: Vec<&str> = line.split_whitespace().collect();
            match cols.as_slice() {
                [proto, local, _remote, state, pid]
                    if proto.eq_ignore_ascii_case("TCP")
                        && state.eq_ignore_ascii_case("LISTENING")
                        && local.ends_with(&suffix) =>
                {
                    pid.parse::<u32>().ok()
                }
                _ => None,
            }
        })
        .filter(|pid| *pid != 0)
        .map(ProcessId::new)
        .collect()
}

/// Finds processes whose command line or executable path contains a substring
///
/// The calling process and its ancestors are never reported: the shell that
/// launched the conductor usually carries the same path on its command line.
pub struct CommandLineFinder {
    system: Arc<Mutex<System>>,
}

impl CommandLineFinder {
    pub fn new() -> Self {
        Self {
            system: Arc::new(Mutex::new(System::new())),
        }
    }

    pub async fn find_substring(&self, needle: &str) -> Result<Vec<ProcessId>, DiscoveryError> {
        let system = self.system.clone();
        let needle = needle.to_string();

        // Full process table scan is blocking work
        tokio::task::spawn_blocking(move || {
            let mut system = system
                .lock()
                .map_err(|_| DiscoveryError::QueryFailed("process table lock poisoned".into()))?;
            // A plain refresh leaves cmd() empty; the command line is the match target
            system.refresh_processes_specifics(
                ProcessRefreshKind::new()
                    .with_cmd(UpdateKind::Always)
                    .with_exe(UpdateKind::OnlyIfNotSet),
            );

            let excluded = own_lineage(&system);
            let pids = system
                .processes()
                .iter()
                .filter(|(pid, _)| !excluded.contains(*pid))
                .filter(|(_, process)| process.status() != ProcessStatus::Zombie)
                .filter(|(pid, _)| is_thread_group_leader(**pid))
                .filter(|(_, process)| command_matches(process.cmd(), process.exe(), &needle))
                .map(|(pid, _)| ProcessId::new(pid.as_u32()))
                .collect::<Vec<_>>();

            debug!(needle = %needle, matches = pids.len(), "Process table scanned");
            Ok(pids)
        })
        .await
        .map_err(|e| DiscoveryError::QueryFailed(format!("process scan aborted: {}", e)))?
    }
}

impl Default for CommandLineFinder {
    fn default() -> Self {
        Self::new()
    }
}

/// Current pid plus every ancestor visible in the table
fn own_lineage(system: &System) -> HashSet<Pid> {
    let mut lineage = HashSet::new();
    let mut current = sysinfo::get_current_pid().ok();

    while let Some(pid) = current {
        if !lineage.insert(pid) {
            break;
        }
        current = system.process(pid).and_then(|p| p.parent());
    }

    lineage
}

/// Linux exposes threads as tasks sharing their process's command line
#[cfg(target_os = "linux")]
fn is_thread_group_leader(pid: Pid) -> bool {
    let Ok(status) = std::fs::read_to_string(format!("/proc/{}/status", pid)) else {
        return true;
    };
    status
        .lines()
        .find_map(|line| line.strip_prefix("Tgid:"))
        .and_then(|tgid| tgid.trim().parse::<u32>().ok())
        .map_or(true, |tgid| tgid == pid.as_u32())
}

#[cfg(not(target_os = "linux"))]
fn is_thread_group_leader(_pid: Pid) -> bool {
    true
}

pub(crate) fn command_matches(cmd: &[String], exe: Option<&Path>, needle: &str) -> bool {
    if !cmd.is_empty() && cmd.join(" ").contains(needle) {
        return true;
    }
    exe.map(|path| path.to_string_lossy().contains(needle))
        .unwrap_or(false)
}

/// True when the pid exists but has already exited and awaits reaping
#[cfg(unix)]
pub(crate) fn is_zombie(pid: ProcessId) -> bool {
    let mut system = System::new();
    let pid = Pid::from_u32(pid.as_u32());
    if !system.refresh_process(pid) {
        return false;
    }
    system
        .process(pid)
        .map(|p| p.status() == ProcessStatus::Zombie)
        .unwrap_or(false)
}

/// Production finder dispatching on the identity kind
#[derive(Default)]
pub struct SystemProcessFinder {
    sockets: SocketTableFinder,
    command_line: CommandLineFinder,
}

impl SystemProcessFinder {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcessFinder for SystemProcessFinder {
    async fn find(&self, identity: &ListenerIdentity) -> Result<Vec<ProcessId>, DiscoveryError> {
        match identity {
            ListenerIdentity::Port(port) => self.sockets.find_port(*port).await,
            ListenerIdentity::CommandSubstring(text) => self.command_line.find_substring(text).await,
        }
    }
}
