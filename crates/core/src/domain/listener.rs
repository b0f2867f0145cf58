// Listener Process Domain Model

use serde::Serialize;
use std::path::PathBuf;

use crate::domain::error::{DomainError, Result};

/// OS process identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ProcessId(u32);

impl ProcessId {
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    pub fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ProcessId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl std::fmt::Display for ProcessId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How a listener process is recognised in the process table
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ListenerIdentity {
    /// Holds a listening TCP socket on this port
    Port(u16),
    /// Command line (or executable path) contains this text
    CommandSubstring(String),
}

impl ListenerIdentity {
    pub fn port(port: u16) -> Result<Self> {
        if port == 0 {
            return Err(DomainError::InvalidIdentity(
                "port 0 cannot identify a listener".to_string(),
            ));
        }
        Ok(Self::Port(port))
    }

    pub fn command_substring(text: impl Into<String>) -> Result<Self> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(DomainError::InvalidIdentity(
                "command substring must not be empty".to_string(),
            ));
        }
        Ok(Self::CommandSubstring(text))
    }
}

impl std::fmt::Display for ListenerIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ListenerIdentity::Port(port) => write!(f, "tcp port {}", port),
            ListenerIdentity::CommandSubstring(text) => write!(f, "command '{}'", text),
        }
    }
}

/// Host power-management request for the launched process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InhibitorMode {
    #[default]
    None,
    /// Block sleep and lid-close suspension while the process runs
    SuppressSleep,
}

/// Everything needed to start a fresh listener instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchSpec {
    pub executable: PathBuf,
    pub args: Vec<String>,
    /// Receives combined stdout/stderr, truncated on every launch
    pub log_path: PathBuf,
    pub working_dir: Option<PathBuf>,
    pub inhibitor: InhibitorMode,
}

impl LaunchSpec {
    pub fn new(executable: impl Into<PathBuf>, log_path: impl Into<PathBuf>) -> Self {
        Self {
            executable: executable.into(),
            args: Vec::new(),
            log_path: log_path.into(),
            working_dir: None,
            inhibitor: InhibitorMode::None,
        }
    }

    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args = args.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_inhibitor(mut self, mode: InhibitorMode) -> Self {
        self.inhibitor = mode;
        self
    }

    /// Reject specs that could never launch
    pub fn validate(&self) -> Result<()> {
        if self.executable.as_os_str().is_empty() {
            return Err(DomainError::InvalidLaunchSpec(
                "executable path is empty".to_string(),
            ));
        }
        if self.log_path.as_os_str().is_empty() {
            return Err(DomainError::InvalidLaunchSpec(
                "log path is empty".to_string(),
            ));
        }
        if self.log_path == self.executable {
            return Err(DomainError::InvalidLaunchSpec(
                "log path would overwrite the executable".to_string(),
            ));
        }
        Ok(())
    }
}
