// Host sleep inhibitor wrapping
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

#[cfg(target_os = "linux")]
use conductor_core::application::constants::INHIBITOR_REASON;
use conductor_core::domain::{InhibitorMode, LaunchSpec};

/// Program and arguments to actually exec
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WrappedCommand {
    pub program: PathBuf,
    pub args: Vec<OsString>,
    pub inhibited: bool,
    /// Log lines the wrapper writes when it refuses to run
    pub refusal_markers: &'static [&'static str],
}

impl WrappedCommand {
    pub fn plain(spec: &LaunchSpec) -> Self {
        Self {
            program: spec.executable.clone(),
            args: spec.args.iter().map(OsString::from).collect(),
            inhibited: false,
            refusal_markers: &[],
        }
    }
}

/// Wrap the launch in the platform inhibitor when requested and available
///
/// Missing inhibitor tooling never fails the launch; it just runs unwrapped.
pub(crate) fn wrap(spec: &LaunchSpec) -> WrappedCommand {
    if spec.inhibitor == InhibitorMode::None {
        return WrappedCommand::plain(spec);
    }

    let Some(inhibitor) = platform_inhibitor() else {
        warn!("Sleep inhibitor requested but not supported on this platform");
        return WrappedCommand::plain(spec);
    };

    let Some(program) = find_on_path(inhibitor.tool) else {
        warn!(tool = %inhibitor.tool, "Sleep inhibitor requested but not installed, launching without it");
        return WrappedCommand::plain(spec);
    };

    debug!(tool = %program.display(), "Wrapping launch in sleep inhibitor");

    let mut args: Vec<OsString> = inhibitor.args.into_iter().map(OsString::from).collect();
    args.push(spec.executable.clone().into_os_string());
    args.extend(spec.args.iter().map(OsString::from));

    WrappedCommand {
        program,
        args,
        inhibited: true,
        refusal_markers: inhibitor.refusal_markers,
    }
}

#[cfg_attr(not(any(target_os = "linux", target_os = "macos")), allow(dead_code))]
struct PlatformInhibitor {
    tool: &'static str,
    args: Vec<String>,
    refusal_markers: &'static [&'static str],
}

#[cfg(target_os = "linux")]
fn platform_inhibitor() -> Option<PlatformInhibitor> {
    Some(PlatformInhibitor {
        tool: "systemd-inhibit",
        args: vec![
            "--what=sleep:idle:handle-lid-switch".to_string(),
            "--who=conductor".to_string(),
            format!("--why={}", INHIBITOR_REASON),
            "--mode=block".to_string(),
            "--".to_string(),
        ],
        // No logind, or no system bus to reach it
        refusal_markers: &["Failed to inhibit", "Failed to connect to"],
    })
}

#[cfg(target_os = "macos")]
fn platform_inhibitor() -> Option<PlatformInhibitor> {
    // -i: idle sleep, -s: system sleep on AC power
    Some(PlatformInhibitor {
        tool: "caffeinate",
        args: vec!["-i".to_string(), "-s".to_string()],
        refusal_markers: &[],
    })
}

#[cfg(not(any(target_os = "linux", target_os = "macos")))]
fn platform_inhibitor() -> Option<PlatformInhibitor> {
    None
}

fn find_on_path(tool: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    path.metadata()
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
