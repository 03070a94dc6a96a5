// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use clap::{Args, Parser, Subcommand};
use sshctl::output::OutputMode;
use sshctl::relay::ForwardSpec;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sshctl")]
#[command(about = "SSH to tagged fleets: jump hosts, fan-out commands and tunnels")]
#[command(version)]
pub struct Cli {
    /// Configuration file (default: ~/.sshctl/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputMode::Normal, global = true)]
    pub output: OutputMode,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every command that dials.
#[derive(Args, Debug, Clone, Default)]
pub struct TargetArgs {
    /// Configured user to log in as
    #[arg(short, long)]
    pub user: Option<String>,

    /// Jump host, by name or 1-based index
    #[arg(short, long)]
    pub jump: Option<String>,

    /// Ask for a password once before connecting
    #[arg(short = 'a', long)]
    pub ask_password: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a shell on a host, or run one command with -c
    Connect {
        /// Host name, user@host[:port] or host[:port]
        token: String,

        /// Command to run instead of a shell
        #[arg(short, long)]
        command: Option<String>,

        /// Share the configured local proxy with the remote host
        #[arg(long)]
        proxy: bool,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Run a command on several hosts at once (@tag selects a group)
    Run {
        /// Hosts and @groups
        #[arg(required = true)]
        tokens: Vec<String>,

        /// Command to run
        #[arg(short, long)]
        command: String,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// Forward a local port through a host
    Forward {
        /// Host name, user@host[:port] or host[:port]
        token: String,

        /// [BIND:]LOCAL_PORT:REMOTE_HOST:REMOTE_PORT
        #[arg(short = 'L', long = "local", value_parser = parse_forward)]
        spec: ForwardSpec,

        #[command(flatten)]
        target: TargetArgs,
    },

    /// List configured jump hosts and hosts
    List,

    /// Write a template configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

fn parse_forward(value: &str) -> Result<ForwardSpec, String> {
    value.parse().map_err(|e: sshctl::relay::RelayError| e.to_string())
}
