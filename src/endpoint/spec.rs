// ABOUTME: Resolved endpoint and relay descriptions handed to the dialer.
// ABOUTME: Carries the ordered credential hints tried during authentication.

use secrecy::{ExposeSecret, SecretString};
use std::fmt;
use std::path::{Path, PathBuf};

/// Default SSH port used when a token or catalog entry omits one.
pub const DEFAULT_PORT: u16 = 22;

/// One candidate authentication method, tried in list order.
#[derive(Debug, Clone)]
pub enum CredentialHint {
    /// Private key file. All key files are offered together in one attempt.
    KeyFile(PathBuf),
    /// SSH agent listening on a Unix socket.
    AgentSocket(PathBuf),
    /// Password supplied before dialing.
    PresetPassword(SecretString),
    /// Ask on the terminal when the server wants a password.
    InteractivePrompt,
}

impl PartialEq for CredentialHint {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::KeyFile(a), Self::KeyFile(b)) => a == b,
            (Self::AgentSocket(a), Self::AgentSocket(b)) => a == b,
            (Self::PresetPassword(a), Self::PresetPassword(b)) => {
                a.expose_secret() == b.expose_secret()
            }
            (Self::InteractivePrompt, Self::InteractivePrompt) => true,
            _ => false,
        }
    }
}

impl Eq for CredentialHint {}

/// A fully resolved connection target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub user: String,
    pub host: String,
    pub port: u16,
    pub credential_hints: Vec<CredentialHint>,
}

impl EndpointSpec {
    pub fn new(user: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            user: user.into(),
            host: host.into(),
            port,
            credential_hints: Vec::new(),
        }
    }

    pub fn with_hints(mut self, hints: Vec<CredentialHint>) -> Self {
        self.credential_hints = hints;
        self
    }

    /// `host:port` as used for the transport dial.
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Key file paths in hint order.
    pub fn key_files(&self) -> impl Iterator<Item = &Path> {
        self.credential_hints.iter().filter_map(|hint| match hint {
            CredentialHint::KeyFile(path) => Some(path.as_path()),
            _ => None,
        })
    }

    /// Whether a password can be offered, either preset or prompted.
    pub fn offers_password(&self) -> bool {
        self.credential_hints.iter().any(|hint| {
            matches!(
                hint,
                CredentialHint::PresetPassword(_) | CredentialHint::InteractivePrompt
            )
        })
    }

    /// Human-readable connection line shown before dialing.
    pub fn banner(&self, relay: Option<&RelaySpec>) -> String {
        let mut line = format!("{}@{}", self.user, self.host);
        if self.port != DEFAULT_PORT {
            line.push_str(&format!(":{}", self.port));
        }

        let keys: Vec<_> = self.key_files().collect();
        match keys.as_slice() {
            [] => {}
            [only] => line.push_str(&format!(" (key: {})", only.display())),
            many => line.push_str(&format!(" (keys: {} configured)", many.len())),
        }

        if let Some(relay) = relay {
            line.push_str(&format!(
                " via {} ({}@{}:{})",
                relay.name, relay.endpoint.user, relay.endpoint.host, relay.endpoint.port
            ));
        }
        line
    }
}

impl fmt::Display for EndpointSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.user, self.host, self.port)
    }
}

/// An intermediary hop. Authentication uses the relay's own hints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelaySpec {
    pub name: String,
    pub endpoint: EndpointSpec,
}

impl fmt::Display for RelaySpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.endpoint)
    }
}
