// ABOUTME: Application-wide error types for sshctl.
// ABOUTME: Uses thiserror for ergonomic error handling.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("file already exists: {0} (use --force to overwrite)")]
    AlreadyExists(PathBuf),

    #[error("configuration file not found: {0} (run `sshctl init` to create one)")]
    ConfigNotFound(PathBuf),

    #[error("could not determine the home directory")]
    HomeDirUnavailable,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown user '{name}' (configured: {available})")]
    UnknownUser { name: String, available: String },

    #[error("unknown jump host '{0}' (use a configured name or 1-based index)")]
    UnknownRelay(String),

    #[error("remote command exited with status {0}")]
    CommandFailed(u32),

    #[error("{failed} of {total} hosts failed")]
    BatchFailed { failed: usize, total: usize },

    #[error(transparent)]
    Endpoint(#[from] crate::endpoint::Error),

    #[error(transparent)]
    Ssh(#[from] crate::ssh::Error),

    #[error(transparent)]
    FanOut(#[from] crate::fanout::Error),

    #[error(transparent)]
    Relay(#[from] crate::relay::RelayError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl Error {
    /// Process exit code: a remote command's own status when there is one.
    pub fn exit_code(&self) -> i32 {
        let status = match self {
            Error::CommandFailed(status) => *status,
            Error::Ssh(crate::ssh::Error::ExitStatus(status)) => *status,
            _ => return 1,
        };
        i32::try_from(status).ok().filter(|s| (1..=255).contains(s)).unwrap_or(1)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
