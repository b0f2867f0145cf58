// Central Error Type for the Application

use thiserror::Error;

use crate::port::{ControlError, StoreError};

/// Application-level error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Domain error: {0}")]
    Domain(#[from] crate::domain::DomainError),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Launch failed: {0}")]
    LaunchFailed(ControlError),

    #[error("Artifact store error: {0}")]
    Artifact(StoreError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

// A bad glob is a caller mistake, everything else is a filesystem failure
impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidPattern { pattern, reason } => {
                AppError::Validation(format!("invalid pattern '{}': {}", pattern, reason))
            }
            other => AppError::Artifact(other),
        }
    }
}

impl AppError {
    /// True for errors caused by bad input rather than the environment
    pub fn is_validation(&self) -> bool {
        matches!(self, AppError::Validation(_) | AppError::Domain(_))
    }
}
