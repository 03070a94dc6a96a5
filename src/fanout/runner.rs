// ABOUTME: CommandRunner seam between the fan-out executor and SSH.
// ABOUTME: SshRunner dials, optionally installs the key, runs the command and disconnects.

use crate::diagnostics::{Diagnostics, Warning};
use crate::endpoint::{EndpointSpec, RelaySpec};
use crate::ssh::{self, CommandOutput, DialOptions, Dialer};
use async_trait::async_trait;

/// Runs one command on one endpoint.
#[async_trait]
pub trait CommandRunner: Send + Sync + 'static {
    async fn run(
        &self,
        endpoint: &EndpointSpec,
        relay: Option<&RelaySpec>,
        command: &str,
    ) -> ssh::Result<CommandOutput>;
}

/// Real runner backed by a fresh SSH connection per call.
#[derive(Debug, Clone)]
pub struct SshRunner {
    dialer: Dialer,
    install_key: bool,
}

impl SshRunner {
    /// Prompts are always disabled: many sessions dial at once.
    pub fn new(options: DialOptions) -> Self {
        Self {
            dialer: Dialer::new(options.allow_prompt(false)),
            install_key: true,
        }
    }

    pub fn install_key(mut self, install: bool) -> Self {
        self.install_key = install;
        self
    }
}

#[async_trait]
impl CommandRunner for SshRunner {
    async fn run(
        &self,
        endpoint: &EndpointSpec,
        relay: Option<&RelaySpec>,
        command: &str,
    ) -> ssh::Result<CommandOutput> {
        let conn = self.dialer.dial(endpoint, relay).await?;

        let mut diag = Diagnostics::default();
        if self.install_key {
            ssh::ensure_public_key(&conn, &mut diag).await;
        }

        let output = conn.exec(command).await;
        if let Err(e) = conn.close().await {
            diag.warn(Warning::ssh_disconnect(format!("{endpoint}: {e}")));
        }
        output
    }
}
