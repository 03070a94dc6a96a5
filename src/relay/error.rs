// ABOUTME: Stream relay error types with SNAFU pattern.
// ABOUTME: Only startup failures surface; per-connection errors are logged and dropped.

use snafu::Snafu;

/// Failure to start a relay.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RelayError {
    #[snafu(display("failed to listen on {address}: {source}"))]
    Bind {
        address: String,
        source: std::io::Error,
    },

    #[snafu(display("remote listen on {address} failed: {source}"))]
    RemoteListen {
        address: String,
        source: crate::ssh::Error,
    },

    #[snafu(display("invalid forward '{spec}': {reason} (use LOCAL_PORT:REMOTE_HOST:REMOTE_PORT)"))]
    InvalidSpec { spec: String, reason: String },
}

/// Error kind for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayErrorKind {
    /// Local listener could not be bound.
    LocalBind,
    /// The server refused or failed the remote listen request.
    RemoteListen,
    /// Malformed forward specification.
    InvalidSpec,
}

impl RelayError {
    /// Returns the error kind for programmatic handling.
    pub fn kind(&self) -> RelayErrorKind {
        match self {
            RelayError::Bind { .. } => RelayErrorKind::LocalBind,
            RelayError::RemoteListen { .. } => RelayErrorKind::RemoteListen,
            RelayError::InvalidSpec { .. } => RelayErrorKind::InvalidSpec,
        }
    }
}
