// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum DomainError {
    #[error("Invalid listener identity: {0}")]
    InvalidIdentity(String),

    #[error("Invalid launch spec: {0}")]
    InvalidLaunchSpec(String),

    #[error("Invalid artifact query: {0}")]
    InvalidArtifactQuery(String),
}

pub type Result<T> = std::result::Result<T, DomainError>;
