// ABOUTME: Best-effort installation of the local public key into remote authorized_keys.
// ABOUTME: Idempotent: checks for an exact line match before appending.

use super::client::Connection;
use crate::diagnostics::{Diagnostics, Warning};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// What happened when installing the public key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallOutcome {
    Installed,
    AlreadyPresent,
    /// No key file configured, or its `.pub` counterpart is missing or empty.
    Skipped,
}

#[derive(Debug, Error)]
pub enum KeyInstallError {
    #[error("failed to read public key {path}: {source}")]
    ReadPublicKey {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("checking authorized_keys failed: {0}")]
    Check(#[source] super::Error),

    #[error("installing public key failed: {0}")]
    Install(#[source] super::Error),

    #[error("installing public key exited with status {status}: {stderr}")]
    Rejected { status: u32, stderr: String },
}

/// Path of the public half for a private key file.
pub fn public_key_path(private_key: &Path) -> PathBuf {
    let mut path = private_key.as_os_str().to_owned();
    path.push(".pub");
    PathBuf::from(path)
}

/// Single-quote `s` for a POSIX shell.
pub(crate) fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', r"'\''"))
}

pub(crate) fn check_command(public_key: &str) -> String {
    format!(
        "grep -Fxq {} ~/.ssh/authorized_keys 2>/dev/null",
        shell_quote(public_key)
    )
}

pub(crate) fn install_command(public_key: &str) -> String {
    format!(
        "mkdir -p ~/.ssh && chmod 700 ~/.ssh && echo {} >> ~/.ssh/authorized_keys && chmod 600 ~/.ssh/authorized_keys",
        shell_quote(public_key)
    )
}

/// Make sure the public half of `private_key` is in the remote authorized_keys.
pub async fn install_public_key(
    conn: &Connection,
    private_key: &Path,
) -> Result<InstallOutcome, KeyInstallError> {
    let pub_path = public_key_path(private_key);
    let contents = match tokio::fs::read_to_string(&pub_path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(InstallOutcome::Skipped),
        Err(source) => {
            return Err(KeyInstallError::ReadPublicKey {
                path: pub_path,
                source,
            });
        }
    };
    let public_key = contents.trim();
    if public_key.is_empty() {
        return Ok(InstallOutcome::Skipped);
    }

    let present = conn
        .exec(&check_command(public_key))
        .await
        .map_err(KeyInstallError::Check)?;
    if present.success() {
        return Ok(InstallOutcome::AlreadyPresent);
    }

    let installed = conn
        .exec(&install_command(public_key))
        .await
        .map_err(KeyInstallError::Install)?;
    if !installed.success() {
        return Err(KeyInstallError::Rejected {
            status: installed.exit_status,
            stderr: installed.stderr.trim().to_string(),
        });
    }

    tracing::info!(target_host = %conn.endpoint(), key = %pub_path.display(), "installed public key");
    Ok(InstallOutcome::Installed)
}

/// Install the endpoint's first key, downgrading failures to a warning.
pub async fn ensure_public_key(conn: &Connection, diag: &mut Diagnostics) -> InstallOutcome {
    let Some(key) = conn.endpoint().key_files().next().map(Path::to_path_buf) else {
        return InstallOutcome::Skipped;
    };
    match install_public_key(conn, &key).await {
        Ok(outcome) => outcome,
        Err(e) => {
            diag.warn(Warning::key_install(format!(
                "could not install public key on {}: {}",
                conn.endpoint(),
                e
            )));
            InstallOutcome::Skipped
        }
    }
}
