// ABOUTME: Diagnostics accumulator for non-fatal warnings during a run.
// ABOUTME: Collects warnings that shouldn't abort a batch or session but should be shown to users.

/// Collects non-fatal warnings while resolving endpoints and running sessions.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!("{}", warning.message);
        self.warnings.push(warning);
    }

    /// Get all collected warnings.
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Check if any warnings were collected.
    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// A group token expanded to no hosts.
    pub fn empty_group(group: &str) -> Self {
        Self {
            kind: WarningKind::EmptyGroup,
            message: format!("no hosts found with tag '{group}'"),
        }
    }

    /// Installing the public key on the remote host failed.
    pub fn key_install(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::KeyInstall,
            message: message.into(),
        }
    }

    /// Create an SSH disconnect warning.
    pub fn ssh_disconnect(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Disconnect,
            message: message.into(),
        }
    }

    /// Proxy sharing was requested but the config has no proxy.
    pub fn proxy_not_configured() -> Self {
        Self {
            kind: WarningKind::ProxyNotConfigured,
            message: "proxy requested but not configured in config.yaml".to_string(),
        }
    }

    /// A jump host was requested but none is configured.
    pub fn relay_not_configured() -> Self {
        Self {
            kind: WarningKind::RelayNotConfigured,
            message: "jump host requested but none configured; connecting directly".to_string(),
        }
    }
}

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// A `@tag` token matched no hosts.
    EmptyGroup,
    /// Public key auto-install failed (session continues).
    KeyInstall,
    /// Failed to cleanly disconnect SSH session.
    Disconnect,
    /// `--proxy` given without `proxy`/`proxy_port` in the config.
    ProxyNotConfigured,
    /// `--jump` given without any configured jump host.
    RelayNotConfigured,
}
