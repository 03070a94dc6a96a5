// ABOUTME: Catalog entries from the config file: hosts, users and jump hosts.
// ABOUTME: Converted into endpoint catalog records with `~` expanded in key paths.

use crate::endpoint::{CatalogHost, DEFAULT_PORT, RelayRecord, UserRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct HostConfig {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct UserConfig {
    pub name: String,
    #[serde(default)]
    pub ssh_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct JumpHostConfig {
    pub name: String,
    pub host: String,
    pub user: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl From<&HostConfig> for CatalogHost {
    fn from(h: &HostConfig) -> Self {
        CatalogHost {
            name: h.name.clone(),
            host: h.host.clone(),
            port: h.port,
            tags: h.tags.clone(),
        }
    }
}

impl From<&UserConfig> for UserRecord {
    fn from(u: &UserConfig) -> Self {
        UserRecord {
            name: u.name.clone(),
            key_files: u.ssh_keys.iter().map(|k| expand_home(k)).collect(),
        }
    }
}

impl From<&JumpHostConfig> for RelayRecord {
    fn from(j: &JumpHostConfig) -> Self {
        RelayRecord {
            name: j.name.clone(),
            host: j.host.clone(),
            port: j.port,
            user: j.user.clone(),
        }
    }
}

/// Expand a leading `~` to the home directory. Other paths are unchanged.
pub fn expand_home(path: &str) -> PathBuf {
    let rest = match path.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => &rest[1..],
        _ => return PathBuf::from(path),
    };
    match dirs::home_dir() {
        Some(home) if rest.is_empty() => home,
        Some(home) => home.join(rest),
        None => PathBuf::from(path),
    }
}
