// ABOUTME: Fan-out executor: runs one command on many endpoints concurrently.
// ABOUTME: One worker per deduplicated token; failures stay inside that token's result.

mod error;
mod report;
mod runner;

pub use error::{Error, Result};
pub use report::{ExecutionResult, FanOutReport, NO_EXIT_STATUS};
pub use runner::{CommandRunner, SshRunner};

use crate::diagnostics::Diagnostics;
use crate::endpoint::{RelaySpec, Resolver};
use nonempty::NonEmpty;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;

/// Runs a command across a batch of endpoint tokens.
pub struct FanOut<R: CommandRunner> {
    resolver: Resolver,
    runner: Arc<R>,
}

impl<R: CommandRunner> FanOut<R> {
    /// The resolver's auth policy is made non-interactive.
    pub fn new(resolver: Resolver, runner: R) -> Self {
        let policy = resolver.auth_policy().clone().non_interactive();
        Self {
            resolver: resolver.with_auth_policy(policy),
            runner: Arc::new(runner),
        }
    }

    /// Expand groups, then run `command` on every resulting token at once.
    ///
    /// Returns one result per deduplicated token, in completion order.
    pub async fn run_many<S: AsRef<str>>(
        &self,
        tokens: &[S],
        command: &str,
        relay: Option<&RelaySpec>,
        diag: &mut Diagnostics,
    ) -> Result<FanOutReport> {
        let started = Instant::now();
        let expanded = self.resolver.expand_groups(tokens, diag);
        let targets = NonEmpty::from_vec(expanded.tokens).ok_or(Error::NoValidEndpoints)?;

        tracing::info!(hosts = targets.len(), %command, "starting fan-out");

        let mut workers = JoinSet::new();
        let mut pending = HashMap::with_capacity(targets.len());
        for token in targets {
            let worker = run_one(
                self.resolver.clone(),
                Arc::clone(&self.runner),
                token.clone(),
                command.to_string(),
                relay.cloned(),
            );
            let handle = workers.spawn(worker);
            pending.insert(handle.id(), token);
        }

        let mut results = Vec::with_capacity(pending.len());
        while let Some(joined) = workers.join_next_with_id().await {
            match joined {
                Ok((id, result)) => {
                    pending.remove(&id);
                    results.push(result);
                }
                Err(e) => {
                    let token = pending.remove(&e.id()).unwrap_or_default();
                    tracing::error!(%token, error = %e, "fan-out worker did not finish");
                    results.push(ExecutionResult::failed(
                        token,
                        format!("worker failed: {e}"),
                        Duration::ZERO,
                    ));
                }
            }
        }

        Ok(FanOutReport {
            results,
            groups: expanded.groups_seen,
            elapsed: started.elapsed(),
        })
    }
}

async fn run_one<R: CommandRunner>(
    resolver: Resolver,
    runner: Arc<R>,
    token: String,
    command: String,
    relay: Option<RelaySpec>,
) -> ExecutionResult {
    let started = Instant::now();

    let endpoint = match resolver.resolve(&token) {
        Ok(endpoint) => endpoint,
        Err(e) => return ExecutionResult::failed(token, e.to_string(), started.elapsed()),
    };

    match runner.run(&endpoint, relay.as_ref(), &command).await {
        Ok(output) => {
            tracing::debug!(%token, exit_status = output.exit_status, "command finished");
            ExecutionResult::completed(token, &output, started.elapsed())
        }
        Err(e) => {
            tracing::debug!(%token, error = %e, "command failed");
            ExecutionResult::failed(token, e.to_string(), started.elapsed())
        }
    }
}
