// ABOUTME: Turns user tokens into endpoint specs and expands @tag groups.
// ABOUTME: Credential hints come from the catalog user plus the session's auth policy.

use super::catalog::{Catalog, RelayRecord, UserRecord};
use super::error::Result;
use super::spec::{CredentialHint, EndpointSpec, RelaySpec};
use super::token::parse_token;
use crate::diagnostics::{Diagnostics, Warning};
use secrecy::SecretString;
use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Prefix marking a group token, e.g. `@web`.
pub const GROUP_MARKER: char = '@';

/// Which non-key credentials get appended after the user's key files.
#[derive(Debug, Clone, Default)]
pub struct AuthPolicy {
    /// Agent socket, normally taken from `SSH_AUTH_SOCK`.
    pub agent_socket: Option<PathBuf>,
    /// Password collected once before dialing.
    pub password: Option<SecretString>,
    /// Whether the dialer may block on a terminal password prompt.
    pub interactive: bool,
}

impl AuthPolicy {
    /// Agent from the environment, interactive prompting allowed.
    pub fn from_env() -> Self {
        let agent_socket = std::env::var_os("SSH_AUTH_SOCK")
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);
        Self {
            agent_socket,
            password: None,
            interactive: true,
        }
    }

    pub fn with_password(mut self, password: Option<SecretString>) -> Self {
        self.password = password;
        self
    }

    /// Disable terminal prompts, as required when many sessions dial at once.
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// Ordered hints: keys, then agent, then preset password or prompt.
    pub fn hints(&self, key_files: &[PathBuf]) -> Vec<CredentialHint> {
        let mut hints: Vec<CredentialHint> = key_files
            .iter()
            .cloned()
            .map(CredentialHint::KeyFile)
            .collect();

        if let Some(socket) = &self.agent_socket {
            hints.push(CredentialHint::AgentSocket(socket.clone()));
        }

        if let Some(password) = &self.password {
            hints.push(CredentialHint::PresetPassword(password.clone()));
        } else if self.interactive {
            hints.push(CredentialHint::InteractivePrompt);
        }
        hints
    }
}

/// Result of expanding group tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpandedTokens {
    /// Endpoint tokens in first-appearance order, without duplicates.
    pub tokens: Vec<String>,
    /// Group names referenced, in first-appearance order.
    pub groups_seen: Vec<String>,
}

/// Resolves tokens against a catalog snapshot. Cheap to clone into workers.
#[derive(Debug, Clone)]
pub struct Resolver {
    catalog: Arc<Catalog>,
    effective_user: Option<UserRecord>,
    auth: AuthPolicy,
}

impl Resolver {
    pub fn new(catalog: Arc<Catalog>, effective_user: Option<UserRecord>) -> Self {
        Self {
            catalog,
            effective_user,
            auth: AuthPolicy::default(),
        }
    }

    pub fn with_auth_policy(mut self, auth: AuthPolicy) -> Self {
        self.auth = auth;
        self
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn auth_policy(&self) -> &AuthPolicy {
        &self.auth
    }

    /// Resolve a catalog name or a literal `[user@]host[:port]` token.
    pub fn resolve(&self, token: &str) -> Result<EndpointSpec> {
        if let Some(entry) = self.catalog.host(token) {
            return Ok(EndpointSpec::new(self.default_user_name(), &entry.host, entry.port)
                .with_hints(self.auth.hints(self.effective_keys())));
        }

        let parsed = parse_token(token)?;
        let effective_name = self.effective_user.as_ref().map(|u| u.name.as_str());

        let (user, keys) = match parsed.user {
            Some(explicit) if Some(explicit) != effective_name => {
                // A different identity never borrows the effective user's keys.
                let keys = self
                    .catalog
                    .user(explicit)
                    .map(|u| u.key_files.clone())
                    .unwrap_or_default();
                (explicit.to_string(), keys)
            }
            _ => (self.default_user_name(), self.effective_keys().to_vec()),
        };

        Ok(EndpointSpec::new(user, parsed.host, parsed.port).with_hints(self.auth.hints(&keys)))
    }

    /// Build the relay spec for a configured jump host.
    pub fn resolve_relay(&self, record: &RelayRecord) -> RelaySpec {
        let keys = self
            .catalog
            .user(&record.user)
            .map(|u| u.key_files.clone())
            .unwrap_or_default();
        RelaySpec {
            name: record.name.clone(),
            endpoint: EndpointSpec::new(&record.user, &record.host, record.port)
                .with_hints(self.auth.hints(&keys)),
        }
    }

    /// Replace `@group` tokens by their members, dropping repeated names.
    ///
    /// Empty groups are reported through `diag` and do not fail the batch.
    pub fn expand_groups<S: AsRef<str>>(&self, raw: &[S], diag: &mut Diagnostics) -> ExpandedTokens {
        let mut expanded = ExpandedTokens::default();
        let mut seen: HashSet<String> = HashSet::new();

        for token in raw {
            let token = token.as_ref();
            match token.strip_prefix(GROUP_MARKER) {
                Some(group) => {
                    if !expanded.groups_seen.iter().any(|g| g == group) {
                        expanded.groups_seen.push(group.to_string());
                    }
                    let members = self.catalog.group(group);
                    if members.is_empty() {
                        diag.warn(Warning::empty_group(group));
                        continue;
                    }
                    for member in members {
                        if seen.insert(member.clone()) {
                            expanded.tokens.push(member.clone());
                        }
                    }
                }
                None => {
                    if seen.insert(token.to_string()) {
                        expanded.tokens.push(token.to_string());
                    }
                }
            }
        }
        expanded
    }

    fn effective_keys(&self) -> &[PathBuf] {
        self.effective_user
            .as_ref()
            .map(|u| u.key_files.as_slice())
            .unwrap_or(&[])
    }

    fn default_user_name(&self) -> String {
        match &self.effective_user {
            Some(user) => user.name.clone(),
            None => system_username(),
        }
    }
}

/// Resolve one token with key-file hints only.
pub fn resolve(token: &str, effective_user: Option<&UserRecord>, catalog: &Catalog) -> Result<EndpointSpec> {
    Resolver::new(Arc::new(catalog.clone()), effective_user.cloned()).resolve(token)
}

/// Login name of the invoking process, or `root` if it can't be determined.
pub fn system_username() -> String {
    whoami::fallible::username().unwrap_or_else(|_| "root".to_string())
}
