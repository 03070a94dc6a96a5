// ABOUTME: Run command: one command on many hosts through the fan-out executor.
// ABOUTME: Fails the process when any host could not complete the command.

use super::{emit_warnings, prepare};
use crate::cli::TargetArgs;
use sshctl::config::Config;
use sshctl::diagnostics::Diagnostics;
use sshctl::error::{Error, Result};
use sshctl::fanout::{FanOut, SshRunner};
use sshctl::output::Output;

pub async fn run(
    config: Config,
    tokens: &[String],
    command: &str,
    args: &TargetArgs,
    output: &Output,
) -> Result<()> {
    let mut diag = Diagnostics::default();
    let target = prepare(&config, args, &mut diag).await?;

    let runner = SshRunner::new(config.dial_options())
        .install_key(config.settings.install_public_key);
    let fanout = FanOut::new(target.resolver, runner);

    output.progress(&format!("Running `{command}` on {}...", tokens.join(" ")));
    let report = fanout
        .run_many(tokens, command, target.relay.as_ref(), &mut diag)
        .await;
    emit_warnings(output, &diag);
    let report = report?;

    output.report(&report);

    if report.all_succeeded() {
        Ok(())
    } else {
        Err(Error::BatchFailed {
            failed: report.failure_count(),
            total: report.results.len(),
        })
    }
}
