// ABOUTME: Endpoint resolution error types.
// ABOUTME: Malformed tokens are user-correctable and abort only one resolution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid endpoint '{token}': {reason} (use user@host:port, user@host or host)")]
    InvalidFormat { token: String, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
