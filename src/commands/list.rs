// ABOUTME: List command: shows configured jump hosts and hosts.
// ABOUTME: Text table in normal/quiet mode, one JSON document in JSON mode.

use sshctl::config::{Config, HostConfig, JumpHostConfig};
use sshctl::error::Result;
use sshctl::output::{Output, OutputMode};
use serde::Serialize;
use std::fmt::Write as _;

#[derive(Serialize)]
struct Listing<'a> {
    jump_hosts: &'a [JumpHostConfig],
    hosts: &'a [HostConfig],
}

pub fn list(config: &Config, output: &Output) -> Result<()> {
    let listing = Listing {
        jump_hosts: &config.settings.jump_hosts,
        hosts: &config.hosts,
    };
    if output.mode() == OutputMode::Json {
        println!("{}", serde_json::to_string(&listing).unwrap_or_default());
    } else {
        print!("{}", render(&listing));
    }
    Ok(())
}

fn render(listing: &Listing<'_>) -> String {
    let mut out = String::new();

    if !listing.jump_hosts.is_empty() {
        let _ = writeln!(out, "Jump hosts:");
        for (index, jump) in listing.jump_hosts.iter().enumerate() {
            let _ = writeln!(
                out,
                "  {}. {:<20} {}@{}:{}",
                index + 1,
                jump.name,
                jump.user,
                jump.host,
                jump.port
            );
        }
        out.push('\n');
    }

    if listing.hosts.is_empty() {
        let _ = writeln!(out, "No hosts configured.");
        return out;
    }

    let _ = writeln!(out, "Hosts:");
    for host in listing.hosts {
        let address = format!("{}:{}", host.host, host.port);
        if host.tags.is_empty() {
            let _ = writeln!(out, "  {:<20} {}", host.name, address);
        } else {
            let tags = host
                .tags
                .iter()
                .map(|t| format!("@{t}"))
                .collect::<Vec<_>>()
                .join(" ");
            let _ = writeln!(out, "  {:<20} {:<24} {}", host.name, address, tags);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_numbered_jump_hosts_and_tags() {
        let config = Config::from_yaml(sshctl::config::TEMPLATE).unwrap();
        let text = render(&Listing {
            jump_hosts: &config.settings.jump_hosts,
            hosts: &config.hosts,
        });
        assert!(text.starts_with("Jump hosts:\n  1. production-jump"));
        assert!(text.contains("@infra @web"));
    }

    #[test]
    fn empty_catalog() {
        let text = render(&Listing {
            jump_hosts: &[],
            hosts: &[],
        });
        assert_eq!(text, "No hosts configured.\n");
    }
}
