// ABOUTME: Entry point for the sshctl CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

mod cli;
mod commands;

use clap::Parser;
use cli::{Cli, Commands};
use sshctl::config;
use sshctl::error::Result;
use sshctl::output::Output;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // RUST_LOG wins over the verbose flag when set
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if cli.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let mut output = Output::new(cli.output);
    output.start_timer();

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init { force } => {
            let path = match config_path {
                Some(path) => path.to_path_buf(),
                None => config::default_path()?,
            };
            config::init_config(&path, force)?;
            output.success(&format!("Created {}", path.display()));
            Ok(())
        }
        Commands::List => {
            let config = commands::load_config(config_path)?;
            commands::list(&config, output)
        }
        Commands::Connect {
            token,
            command,
            proxy,
            target,
        } => {
            let config = commands::load_config(config_path)?;
            commands::connect(config, &token, command.as_deref(), proxy, &target, output).await
        }
        Commands::Run {
            tokens,
            command,
            target,
        } => {
            let config = commands::load_config(config_path)?;
            commands::run(config, &tokens, &command, &target, output).await
        }
        Commands::Forward {
            token,
            spec,
            target,
        } => {
            let config = commands::load_config(config_path)?;
            commands::forward(config, &token, &spec, &target, output).await
        }
    }
}
