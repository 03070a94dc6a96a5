// ABOUTME: Configuration types and parsing for ~/.sshctl/config.yaml.
// ABOUTME: Builds the endpoint catalog and selects the effective user, jump host and proxy.

mod host;
mod init;

pub use host::{HostConfig, JumpHostConfig, UserConfig, expand_home};
pub use init::{CONFIG_DIR, CONFIG_FILENAME, TEMPLATE, default_path, init_config};

use crate::diagnostics::{Diagnostics, Warning};
use crate::endpoint::{Catalog, RelayRecord, UserRecord};
use crate::error::{Error, Result};
use crate::ssh::DialOptions;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(rename = "config", default)]
    pub settings: Settings,

    #[serde(default)]
    pub hosts: Vec<HostConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub default_user: Option<String>,

    /// Local proxy address exposed on the remote side by `connect --proxy`.
    pub proxy: Option<String>,

    /// Port opened on the remote loopback for the proxy.
    pub proxy_port: Option<u16>,

    pub trust_unknown_hosts: bool,

    #[serde(with = "humantime_serde")]
    pub connect_timeout: Duration,

    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,

    /// Drop the session after this long without traffic.
    #[serde(with = "humantime_serde")]
    pub inactivity_timeout: Option<Duration>,

    /// Send keepalives at this interval; unset disables them.
    #[serde(with = "humantime_serde")]
    pub keepalive_interval: Option<Duration>,

    pub install_public_key: bool,

    pub users: Vec<UserConfig>,

    pub jump_hosts: Vec<JumpHostConfig>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_user: None,
            proxy: None,
            proxy_port: None,
            trust_unknown_hosts: true,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(300),
            inactivity_timeout: None,
            keepalive_interval: None,
            install_public_key: true,
            users: Vec::new(),
            jump_hosts: Vec::new(),
        }
    }
}

/// Reverse proxy parameters for `connect --proxy`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Local address connections are relayed to.
    pub local_address: String,
    /// Port the server listens on (loopback).
    pub remote_port: u16,
}

impl Config {
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: Config = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ConfigNotFound(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_yaml(&content)
    }

    fn validate(&self) -> Result<()> {
        let invalid = |msg: String| Err(Error::InvalidConfig(msg));

        let mut names = HashSet::new();
        for host in &self.hosts {
            if host.name.trim().is_empty() {
                return invalid(format!("host entry for '{}' has an empty name", host.host));
            }
            if host.host.trim().is_empty() {
                return invalid(format!("host '{}' has an empty address", host.name));
            }
            if host.port == 0 {
                return invalid(format!("host '{}' has port 0", host.name));
            }
            if !names.insert(host.name.as_str()) {
                return invalid(format!("duplicate host name '{}'", host.name));
            }
        }

        for user in &self.settings.users {
            if user.name.trim().is_empty() {
                return invalid("user entry with an empty name".to_string());
            }
        }

        for jump in &self.settings.jump_hosts {
            if jump.name.trim().is_empty() || jump.host.trim().is_empty() {
                return invalid(format!("jump host '{}' needs a name and an address", jump.name));
            }
            if jump.port == 0 {
                return invalid(format!("jump host '{}' has port 0", jump.name));
            }
        }

        if self.settings.proxy_port == Some(0) {
            return invalid("proxy_port cannot be 0".to_string());
        }
        Ok(())
    }

    /// Read-only catalog snapshot for endpoint resolution.
    pub fn catalog(&self) -> Catalog {
        Catalog::new(
            self.hosts.iter().map(Into::into).collect(),
            self.settings.users.iter().map(Into::into).collect(),
            self.settings.jump_hosts.iter().map(Into::into).collect(),
        )
    }

    /// User for tokens without an explicit user.
    ///
    /// `requested` wins, then `default_user`, then the first configured user.
    /// `None` when no users are configured at all.
    pub fn effective_user(&self, requested: Option<&str>) -> Result<Option<UserRecord>> {
        let users = &self.settings.users;
        if let Some(name) = requested {
            return match users.iter().find(|u| u.name == name) {
                Some(user) => Ok(Some(user.into())),
                None => Err(Error::UnknownUser {
                    name: name.to_string(),
                    available: users
                        .iter()
                        .map(|u| u.name.as_str())
                        .collect::<Vec<_>>()
                        .join(", "),
                }),
            };
        }

        let default = self
            .settings
            .default_user
            .as_deref()
            .filter(|name| !name.is_empty())
            .and_then(|name| users.iter().find(|u| u.name == name));

        match default {
            Some(user) => Ok(Some(user.into())),
            // A default naming no configured user still sets the login name.
            None => match self.settings.default_user.as_deref().filter(|n| !n.is_empty()) {
                Some(name) => Ok(Some(UserRecord {
                    name: name.to_string(),
                    key_files: Vec::new(),
                })),
                None => Ok(users.first().map(Into::into)),
            },
        }
    }

    /// Jump host by name or 1-based index.
    ///
    /// Asking for a jump host when none are configured is only a warning.
    pub fn select_relay(
        &self,
        selector: Option<&str>,
        diag: &mut Diagnostics,
    ) -> Result<Option<RelayRecord>> {
        let Some(selector) = selector else {
            return Ok(None);
        };
        if self.settings.jump_hosts.is_empty() {
            diag.warn(Warning::relay_not_configured());
            return Ok(None);
        }

        let by_name = self.settings.jump_hosts.iter().find(|j| j.name == selector);
        let by_index = || {
            selector
                .parse::<usize>()
                .ok()
                .and_then(|i| i.checked_sub(1))
                .and_then(|i| self.settings.jump_hosts.get(i))
        };

        by_name
            .or_else(by_index)
            .map(|j| Some(j.into()))
            .ok_or_else(|| Error::UnknownRelay(selector.to_string()))
    }

    /// Proxy settings, when both the address and the remote port are set.
    pub fn proxy(&self) -> Option<ProxySettings> {
        let local_address = self.settings.proxy.as_deref().filter(|p| !p.is_empty())?;
        let remote_port = self.settings.proxy_port?;
        Some(ProxySettings {
            local_address: local_address.to_string(),
            remote_port,
        })
    }

    pub fn dial_options(&self) -> DialOptions {
        DialOptions::default()
            .trust_on_first_use(self.settings.trust_unknown_hosts)
            .connect_timeout(self.settings.connect_timeout)
            .command_timeout(self.settings.command_timeout)
            .inactivity_timeout(self.settings.inactivity_timeout)
            .keepalive_interval(self.settings.keepalive_interval)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_is_valid() {
        let config = Config::from_yaml(TEMPLATE).unwrap();
        assert_eq!(config.hosts.len(), 2);
        assert_eq!(config.settings.users.len(), 2);
        assert_eq!(config.settings.jump_hosts.len(), 1);
        assert!(config.proxy().is_none());
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = Config::from_yaml("{}").unwrap();
        assert!(config.hosts.is_empty());
        assert!(config.settings.trust_unknown_hosts);
        assert_eq!(config.settings.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.effective_user(None).unwrap(), None);
    }

    #[test]
    fn default_user_without_entry_keeps_name() {
        let config = Config::from_yaml("config:\n  default_user: admin\n").unwrap();
        let user = config.effective_user(None).unwrap().unwrap();
        assert_eq!(user.name, "admin");
        assert!(user.key_files.is_empty());
    }
}
