// ABOUTME: SSH-specific error types.
// ABOUTME: Covers dialing (direct and via jump host), authentication and session failures.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::endpoint::EndpointSpec;

/// Which leg of a relayed dial failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayStage {
    /// Connecting or authenticating to the jump host itself.
    Relay,
    /// Reaching or authenticating to the final host through the jump host.
    Target,
}

impl fmt::Display for RelayStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelayStage::Relay => f.write_str("jump host"),
            RelayStage::Target => f.write_str("target through jump host"),
        }
    }
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("connection to {target} failed: {reason}")]
    Dial { target: String, reason: String },

    #[error("via jump host {relay}: {stage} failed: {source}")]
    RelayDial {
        relay: String,
        stage: RelayStage,
        #[source]
        source: Box<Error>,
    },

    #[error("authentication failed for {target}: all credentials were rejected{hint}")]
    AuthExhausted { target: String, hint: &'static str },

    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    #[error("failed to load key from {path}: {reason}")]
    KeyLoadFailed { path: PathBuf, reason: String },

    #[error("password prompt failed: {0}")]
    Prompt(String),

    #[error("session failed: {0}")]
    Session(String),

    #[error("remote shell exited with status {0}")]
    ExitStatus(u32),

    #[error("command timed out after {0:?}")]
    CommandTimeout(std::time::Duration),

    #[error("channel closed unexpectedly without exit status")]
    ChannelClosed,

    #[error("remote port forwarding failed: {0}")]
    RemoteForward(String),

    #[error("SSH protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("SSH key error: {0}")]
    Key(#[from] russh::keys::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn dial(target: impl Into<String>, reason: impl fmt::Display) -> Self {
        Error::Dial {
            target: target.into(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn relay(relay: impl Into<String>, stage: RelayStage, source: Error) -> Self {
        Error::RelayDial {
            relay: relay.into(),
            stage,
            source: Box::new(source),
        }
    }

    /// All credentials rejected. Suggests a password only when none was offered.
    pub(crate) fn auth_exhausted(endpoint: &EndpointSpec) -> Self {
        let hint = if endpoint.offers_password() {
            ""
        } else if endpoint.key_files().next().is_none() {
            " (hint: use --ask-password to supply a password)"
        } else {
            " (hint: if the SSH key is not installed on the host, use --ask-password to supply a password)"
        };
        Error::AuthExhausted {
            target: endpoint.to_string(),
            hint,
        }
    }

    /// True for transport-level failures where no session was established.
    pub fn is_dial_failure(&self) -> bool {
        matches!(self, Error::Dial { .. } | Error::RelayDial { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;
