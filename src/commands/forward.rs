// ABOUTME: Forward command: local port forwarding through one host until Ctrl-C.
// ABOUTME: Prints connection and byte totals when the relay stops.

use super::{emit_warnings, prepare};
use crate::cli::TargetArgs;
use sshctl::config::Config;
use sshctl::diagnostics::{Diagnostics, Warning};
use sshctl::error::Result;
use sshctl::output::Output;
use sshctl::relay::{self, ForwardSpec, RelayMode};
use sshctl::ssh::Dialer;
use tokio::sync::broadcast::error::RecvError;

pub async fn forward(
    config: Config,
    token: &str,
    spec: &ForwardSpec,
    args: &TargetArgs,
    output: &Output,
) -> Result<()> {
    let mut diag = Diagnostics::default();
    let result = forward_inner(&config, token, spec, args, output, &mut diag).await;
    emit_warnings(output, &diag);
    result
}

async fn forward_inner(
    config: &Config,
    token: &str,
    spec: &ForwardSpec,
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
    let conn = Dialer::new(config.dial_options())
        .dial(&endpoint, target.relay.as_ref())
        .await?;

    let mut session = relay::start(conn, RelayMode::from(spec)).await?;
    output.progress(&format!(
        "Forwarding {} -> {}:{} via {}",
        session.listen_address(),
        spec.remote_host,
        spec.remote_port,
        endpoint
    ));
    output.progress("Press Ctrl-C to stop");

    let mut events = session.subscribe();
    let mut events_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            signal = &mut ctrl_c => {
                if let Err(e) = signal {
                    tracing::warn!(error = %e, "could not listen for Ctrl-C");
                }
                break;
            }
            _ = session.closed() => {
                diag.warn(Warning::ssh_disconnect(format!("{endpoint}: connection lost")));
                break;
            }
            event = events.recv(), if events_open => match event {
                Ok(event) => output.relay_event(&event),
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "connection log fell behind");
                }
                Err(RecvError::Closed) => events_open = false,
            },
        }
    }

    let stats = relay::stop(session).await;
    output.relay_stats(&stats);
    Ok(())
}
