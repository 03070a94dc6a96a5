// ABOUTME: Config scaffolding and default location.
// ABOUTME: Writes the ~/.sshctl/config.yaml template.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub const CONFIG_DIR: &str = ".sshctl";
pub const CONFIG_FILENAME: &str = "config.yaml";

pub const TEMPLATE: &str = r#"config:
  default_user: ubuntu
  # Local HTTP proxy made reachable on the remote host with `connect --proxy`
  # proxy: "192.168.0.1:3128"
  # proxy_port: 9999
  # SSH host key verification: record unknown hosts in ~/.ssh/known_hosts
  trust_unknown_hosts: true
  connect_timeout: 10s
  command_timeout: 5m
  # Drop idle sessions and probe the server while forwarding
  # inactivity_timeout: 30m
  # keepalive_interval: 30s
  install_public_key: true
  users:
    - name: ubuntu
      ssh_keys:
        - ~/.ssh/id_ed25519
        - ~/.ssh/id_rsa
    - name: devops
      ssh_keys:
        - ~/.ssh/id_rsa
  jump_hosts:
    - name: production-jump
      host: jump.production.example.com
      user: ubuntu
      port: 22

hosts:
  - name: dns
    host: 192.168.1.31
    port: 22
    tags: [infra]
  - name: traefik
    host: 192.168.1.32
    port: 22
    tags: [infra, web]
"#;

/// `~/.sshctl/config.yaml`.
pub fn default_path() -> Result<PathBuf> {
    dirs::home_dir()
        .map(|home| home.join(CONFIG_DIR).join(CONFIG_FILENAME))
        .ok_or(Error::HomeDirUnavailable)
}

/// Write the template to `path`, creating parent directories.
pub fn init_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::AlreadyExists(path.to_path_buf()));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, TEMPLATE)?;
    tracing::info!(path = %path.display(), "wrote config template");
    Ok(())
}
