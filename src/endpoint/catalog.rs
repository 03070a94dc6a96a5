// ABOUTME: Read-only snapshot of configured hosts, users and jump hosts.
// ABOUTME: Builds the tag -> member index used for group expansion.

use std::collections::HashMap;
use std::path::PathBuf;

/// A named host entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogHost {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub tags: Vec<String>,
}

/// A user identity with its key files in trial order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub key_files: Vec<PathBuf>,
}

/// A named jump host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayRecord {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
}

/// Lookup tables handed to the resolver. Never mutated after construction.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    hosts: Vec<CatalogHost>,
    users: Vec<UserRecord>,
    relays: Vec<RelayRecord>,
    groups: HashMap<String, Vec<String>>,
}

impl Catalog {
    pub fn new(hosts: Vec<CatalogHost>, users: Vec<UserRecord>, relays: Vec<RelayRecord>) -> Self {
        let mut groups: HashMap<String, Vec<String>> = HashMap::new();
        for host in &hosts {
            for tag in &host.tags {
                let members = groups.entry(tag.clone()).or_default();
                if !members.contains(&host.name) {
                    members.push(host.name.clone());
                }
            }
        }

        Self {
            hosts,
            users,
            relays,
            groups,
        }
    }

    pub fn host(&self, name: &str) -> Option<&CatalogHost> {
        self.hosts.iter().find(|h| h.name == name)
    }

    pub fn hosts(&self) -> &[CatalogHost] {
        &self.hosts
    }

    pub fn user(&self, name: &str) -> Option<&UserRecord> {
        self.users.iter().find(|u| u.name == name)
    }

    pub fn users(&self) -> &[UserRecord] {
        &self.users
    }

    /// Member host names for a tag, in catalog order. Unknown tags are empty.
    pub fn group(&self, name: &str) -> &[String] {
        self.groups.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn relays(&self) -> &[RelayRecord] {
        &self.relays
    }

    /// Find a jump host by name, or by 1-based position in the list.
    pub fn relay(&self, selector: &str) -> Option<&RelayRecord> {
        if let Some(relay) = self.relays.iter().find(|r| r.name == selector) {
            return Some(relay);
        }
        selector
            .parse::<usize>()
            .ok()
            .and_then(|idx| idx.checked_sub(1))
            .and_then(|idx| self.relays.get(idx))
    }
}
