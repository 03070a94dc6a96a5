// ABOUTME: Parser for local forward specifications.
// ABOUTME: Accepts "LOCAL_PORT:REMOTE_HOST:REMOTE_PORT" with an optional leading bind address.

use super::error::RelayError;
use std::fmt;
use std::str::FromStr;

/// Bind address used when the spec doesn't name one.
pub const DEFAULT_BIND: &str = "127.0.0.1";

/// A `-L` style forward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForwardSpec {
    pub bind: String,
    pub local_port: u16,
    pub remote_host: String,
    pub remote_port: u16,
}

impl ForwardSpec {
    /// `bind:local_port`, suitable for a TCP listener.
    pub fn listen_address(&self) -> String {
        format!("{}:{}", self.bind, self.local_port)
    }
}

impl fmt::Display for ForwardSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} -> {}:{}",
            self.bind, self.local_port, self.remote_host, self.remote_port
        )
    }
}

impl FromStr for ForwardSpec {
    type Err = RelayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| RelayError::InvalidSpec {
            spec: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        let (bind, local, host, remote) = match parts.as_slice() {
            [local, host, remote] => (DEFAULT_BIND, *local, *host, *remote),
            [bind, local, host, remote] if !bind.is_empty() => (*bind, *local, *host, *remote),
            _ => return Err(invalid("expected three or four ':'-separated fields")),
        };

        let local_port = parse_port(local).ok_or_else(|| invalid("invalid local port"))?;
        let remote_port = parse_port(remote).ok_or_else(|| invalid("invalid remote port"))?;
        if host.is_empty() {
            return Err(invalid("remote host is empty"));
        }

        Ok(Self {
            bind: bind.to_string(),
            local_port,
            remote_host: host.to_string(),
            remote_port,
        })
    }
}

fn parse_port(s: &str) -> Option<u16> {
    match s.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}
