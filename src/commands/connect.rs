// ABOUTME: Connect command: interactive shell or a single command on one host.
// ABOUTME: Optionally shares the local proxy with the remote host for the shell's lifetime.

use super::{emit_warnings, prepare};
use crate::cli::TargetArgs;
use sshctl::config::{Config, ProxySettings};
use sshctl::diagnostics::{Diagnostics, Warning};
use sshctl::error::{Error, Result};
use sshctl::output::Output;
use sshctl::relay::{self, RelayMode};
use sshctl::ssh::{self, Connection, Dialer};

const PROXY_BIND: &str = "127.0.0.1";

pub async fn connect(
    config: Config,
    token: &str,
    command: Option<&str>,
    proxy: bool,
    args: &TargetArgs,
    output: &Output,
) -> Result<()> {
    let mut diag = Diagnostics::default();
    let result = connect_inner(&config, token, command, proxy, args, output, &mut diag).await;
    emit_warnings(output, &diag);
    result
}

async fn connect_inner(
    config: &Config,
    token: &str,
    command: Option<&str>,
    proxy: bool,
    args: &TargetArgs,
    output: &Output,
    diag: &mut Diagnostics,
) -> Result<()> {
    let target = prepare(config, args, diag).await?;
    let endpoint = target.resolver.resolve(token)?;

    output.progress(&format!(
        "Connecting to {}",
        endpoint.banner(target.relay.as_ref())
    ));

    let dialer = Dialer::new(config.dial_options());
    let conn = dialer.dial(&endpoint, target.relay.as_ref()).await?;

    if config.settings.install_public_key {
        ssh::ensure_public_key(&conn, diag).await;
    }

    if let Some(command) = command {
        let result = run_command(&conn, command).await;
        close(&conn, diag).await;
        return result;
    }

    let proxy = if proxy {
        let settings = config.proxy();
        if settings.is_none() {
            diag.warn(Warning::proxy_not_configured());
        }
        settings
    } else {
        None
    };

    match proxy {
        Some(proxy) => shell_with_proxy(conn, proxy, output).await,
        None => {
            let result = conn.run_interactive().await;
            close(&conn, diag).await;
            result.map_err(Error::from)
        }
    }
}

/// Stream the command's output; a nonzero status fails the process.
async fn run_command(conn: &Connection, command: &str) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    let mut stderr = tokio::io::stderr();
    let status = conn.exec_streaming(command, &mut stdout, &mut stderr).await?;

    if status == 0 {
        Ok(())
    } else {
        Err(Error::CommandFailed(status))
    }
}

async fn shell_with_proxy(conn: Connection, proxy: ProxySettings, output: &Output) -> Result<()> {
    let mode = RelayMode::Remote {
        listen_host: PROXY_BIND.to_string(),
        listen_port: proxy.remote_port,
        target: proxy.local_address.clone(),
    };
    let session = relay::start(conn, mode).await?;

    output.progress(&format!(
        "Proxy {} available on the remote host at http://{}:{}",
        proxy.local_address, PROXY_BIND, proxy.remote_port
    ));

    let result = match session.connection() {
        Some(conn) => conn.run_interactive().await.map_err(Error::from),
        None => Ok(()),
    };

    let stats = relay::stop(session).await;
    tracing::debug!(
        connections = stats.total_connections,
        bytes_up = stats.bytes_up,
        bytes_down = stats.bytes_down,
        "proxy relay stopped"
    );
    result
}

async fn close(conn: &Connection, diag: &mut Diagnostics) {
    if let Err(e) = conn.close().await {
        diag.warn(Warning::ssh_disconnect(format!(
            "{}: {}",
            conn.endpoint(),
            e
        )));
    }
}
