// ABOUTME: SSH client module: dialing, authentication and session handling.
// ABOUTME: Supports key files, SSH agent and passwords, direct or via a jump host.

mod auth;
mod client;
mod dial;
mod error;
mod forward;
mod keys;
mod session;
pub mod terminal;

pub use client::Connection;
pub use dial::{DialOptions, Dialer, RelayHop};
pub use error::{Error, RelayStage, Result};
pub use forward::{ForwardedConnection, RemoteListener};
pub use keys::{InstallOutcome, KeyInstallError, ensure_public_key, install_public_key, public_key_path};
pub use session::CommandOutput;
