// ABOUTME: Turns credential hints into ordered authentication attempts.
// ABOUTME: Tries key files, agent identities, then a password until the server accepts one.

use super::client::ClientHandler;
use super::error::{Error, Result};
use super::terminal;
use crate::endpoint::{CredentialHint, EndpointSpec};
use russh::client::{AuthResult, Handle};
use russh::keys::{HashAlg, PrivateKey, PrivateKeyWithHashAlg, load_secret_key};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// One way of proving identity, in the order it will be offered.
pub(crate) enum AuthAttempt {
    /// Every readable key file, offered one after another.
    PublicKeys(Vec<Arc<PrivateKey>>),
    Agent(PathBuf),
    Password(SecretString),
    Prompt,
}

impl AuthAttempt {
    fn label(&self) -> &'static str {
        match self {
            AuthAttempt::PublicKeys(_) => "publickey",
            AuthAttempt::Agent(_) => "agent",
            AuthAttempt::Password(_) | AuthAttempt::Prompt => "password",
        }
    }
}

impl std::fmt::Debug for AuthAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthAttempt::PublicKeys(keys) => write!(f, "PublicKeys({})", keys.len()),
            AuthAttempt::Agent(path) => write!(f, "Agent({})", path.display()),
            AuthAttempt::Password(_) => f.write_str("Password(<redacted>)"),
            AuthAttempt::Prompt => f.write_str("Prompt"),
        }
    }
}

/// Build attempts from hints.
///
/// Key files are loaded once and merged into a single attempt placed where
/// the first key hint appeared; unreadable keys are skipped. A prompt is
/// kept only when `allow_prompt` is set.
pub(crate) fn build_attempts(hints: &[CredentialHint], allow_prompt: bool) -> Vec<AuthAttempt> {
    let keys: Vec<Arc<PrivateKey>> = hints
        .iter()
        .filter_map(|hint| match hint {
            CredentialHint::KeyFile(path) => load_key(path).map(Arc::new),
            _ => None,
        })
        .collect();
    let mut keys = Some(keys).filter(|k| !k.is_empty());

    let mut attempts = Vec::new();
    for hint in hints {
        match hint {
            CredentialHint::KeyFile(_) => {
                if let Some(keys) = keys.take() {
                    attempts.push(AuthAttempt::PublicKeys(keys));
                }
            }
            CredentialHint::AgentSocket(path) => attempts.push(AuthAttempt::Agent(path.clone())),
            CredentialHint::PresetPassword(password) => {
                attempts.push(AuthAttempt::Password(password.clone()))
            }
            CredentialHint::InteractivePrompt if allow_prompt => attempts.push(AuthAttempt::Prompt),
            CredentialHint::InteractivePrompt => {}
        }
    }
    attempts
}

fn load_key(path: &Path) -> Option<PrivateKey> {
    match load_secret_key(path, None) {
        Ok(key) => Some(key),
        Err(e) => {
            tracing::debug!(key = %path.display(), error = %e, "skipping unusable key file");
            None
        }
    }
}

/// Run attempts in order until one succeeds.
pub(crate) async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    endpoint: &EndpointSpec,
    attempts: Vec<AuthAttempt>,
) -> Result<()> {
    let rsa_hint = handle
        .best_supported_rsa_hash()
        .await
        .unwrap_or(None)
        .flatten();

    for attempt in attempts {
        let label = attempt.label();
        match try_attempt(handle, endpoint, attempt, rsa_hint).await {
            Ok(true) => {
                tracing::debug!(target_host = %endpoint, method = label, "authentication succeeded");
                return Ok(());
            }
            Ok(false) => {
                tracing::debug!(target_host = %endpoint, method = label, "authentication rejected");
            }
            Err(e) => {
                tracing::debug!(target_host = %endpoint, method = label, error = %e, "authentication attempt failed");
            }
        }
    }

    Err(Error::auth_exhausted(endpoint))
}

async fn try_attempt(
    handle: &mut Handle<ClientHandler>,
    endpoint: &EndpointSpec,
    attempt: AuthAttempt,
    rsa_hint: Option<HashAlg>,
) -> Result<bool> {
    let user = endpoint.user.as_str();
    match attempt {
        AuthAttempt::PublicKeys(keys) => {
            for key in keys {
                let hash_alg = if key.algorithm().is_rsa() { rsa_hint } else { None };
                let result = handle
                    .authenticate_publickey(user, PrivateKeyWithHashAlg::new(key, hash_alg))
                    .await?;
                if result.success() {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        AuthAttempt::Agent(socket) => authenticate_with_agent(handle, user, &socket, rsa_hint).await,
        AuthAttempt::Password(password) => password_auth(handle, user, &password).await,
        AuthAttempt::Prompt => {
            let password = terminal::read_secret(format!("Password for {endpoint}: "))
                .await
                .map_err(|e| Error::Prompt(e.to_string()))?;
            password_auth(handle, user, &password).await
        }
    }
}

async fn password_auth(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    password: &SecretString,
) -> Result<bool> {
    let result: AuthResult = handle
        .authenticate_password(user, password.expose_secret())
        .await?;
    Ok(result.success())
}

#[cfg(unix)]
async fn authenticate_with_agent(
    handle: &mut Handle<ClientHandler>,
    user: &str,
    socket: &Path,
    rsa_hint: Option<HashAlg>,
) -> Result<bool> {
    use russh::keys::agent::client::AgentClient;
    use tokio::net::UnixStream;

    let stream = UnixStream::connect(socket)
        .await
        .map_err(|e| Error::AgentUnavailable(format!("{}: {}", socket.display(), e)))?;
    let mut agent = AgentClient::connect(stream);

    let keys = agent
        .request_identities()
        .await
        .map_err(|e| Error::AgentUnavailable(format!("failed to list agent keys: {}", e)))?;

    for key in keys {
        let hash_alg = if key.algorithm().is_rsa() { rsa_hint } else { None };
        match handle
            .authenticate_publickey_with(user, key, hash_alg, &mut agent)
            .await
        {
            Ok(result) if result.success() => return Ok(true),
            _ => continue,
        }
    }
    Ok(false)
}

#[cfg(not(unix))]
async fn authenticate_with_agent(
    _handle: &mut Handle<ClientHandler>,
    _user: &str,
    socket: &Path,
    _rsa_hint: Option<HashAlg>,
) -> Result<bool> {
    Err(Error::AgentUnavailable(format!(
        "agent sockets are not supported on this platform ({})",
        socket.display()
    )))
}
