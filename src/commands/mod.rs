// ABOUTME: Command handlers for the sshctl CLI.
// ABOUTME: Shared setup: config loading, user and jump host selection, password pre-prompt.

mod connect;
mod forward;
mod list;
mod run;

pub use connect::connect;
pub use forward::forward;
pub use list::list;
pub use run::run;

use crate::cli::TargetArgs;
use sshctl::config::{self, Config};
use sshctl::diagnostics::Diagnostics;
use sshctl::endpoint::{AuthPolicy, RelaySpec, Resolver};
use sshctl::error::Result;
use sshctl::output::Output;
use sshctl::ssh::terminal;
use std::path::Path;
use std::sync::Arc;

/// Load the config from `path`, or from `~/.sshctl/config.yaml`.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => Config::load(&config::default_path()?),
    }
}

/// Resolver and optional jump host for one invocation.
struct Target {
    resolver: Resolver,
    relay: Option<RelaySpec>,
}

async fn prepare(config: &Config, args: &TargetArgs, diag: &mut Diagnostics) -> Result<Target> {
    let user = config.effective_user(args.user.as_deref())?;

    let mut policy = AuthPolicy::from_env();
    if args.ask_password {
        let prompt = match &user {
            Some(user) => format!("Password for {}: ", user.name),
            None => "Password: ".to_string(),
        };
        policy = policy.with_password(Some(terminal::read_secret(prompt).await?));
    }

    let resolver = Resolver::new(Arc::new(config.catalog()), user).with_auth_policy(policy);
    let relay = config
        .select_relay(args.jump.as_deref(), diag)?
        .map(|record| resolver.resolve_relay(&record));

    Ok(Target { resolver, relay })
}

fn emit_warnings(output: &Output, diag: &Diagnostics) {
    for warning in diag.warnings() {
        output.warning(warning);
    }
}
