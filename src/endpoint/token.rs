// ABOUTME: Parser for literal endpoint tokens.
// ABOUTME: Accepts "host", "user@host", "host:port" and "user@host:port".

use super::error::{Error, Result};
use super::spec::DEFAULT_PORT;

/// Components captured from a literal token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedToken<'a> {
    pub user: Option<&'a str>,
    pub host: &'a str,
    pub port: u16,
}

pub(crate) fn parse_token(token: &str) -> Result<ParsedToken<'_>> {
    let invalid = |reason: &str| Error::InvalidFormat {
        token: token.to_string(),
        reason: reason.to_string(),
    };

    let s = token.trim();
    if s.is_empty() {
        return Err(invalid("token is empty"));
    }

    let (user, rest) = match s.split_once('@') {
        Some((user, rest)) => {
            if user.is_empty() {
                return Err(invalid("user before '@' is empty"));
            }
            (Some(user), rest)
        }
        None => (None, s),
    };

    if rest.contains('@') {
        return Err(invalid("more than one '@'"));
    }

    let (host, port) = match rest.split_once(':') {
        Some((host, port_str)) => {
            let port = parse_port(port_str)
                .ok_or_else(|| invalid(&format!("invalid port '{port_str}'")))?;
            (host, port)
        }
        None => (rest, DEFAULT_PORT),
    };

    if host.is_empty() {
        return Err(invalid("hostname cannot be empty"));
    }
    if host.chars().any(char::is_whitespace) {
        return Err(invalid("hostname contains whitespace"));
    }

    Ok(ParsedToken { user, host, port })
}

/// Digits only, within 1..=65535.
fn parse_port(s: &str) -> Option<u16> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match s.parse::<u16>() {
        Ok(0) | Err(_) => None,
        Ok(port) => Some(port),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_only_uses_default_port() {
        let parsed = parse_token("10.0.0.5").unwrap();
        assert_eq!(parsed.user, None);
        assert_eq!(parsed.host, "10.0.0.5");
        assert_eq!(parsed.port, 22);
    }

    #[test]
    fn full_form_captures_all_parts() {
        let parsed = parse_token("ubuntu@10.0.0.5:2222").unwrap();
        assert_eq!(parsed.user, Some("ubuntu"));
        assert_eq!(parsed.host, "10.0.0.5");
        assert_eq!(parsed.port, 2222);
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let parsed = parse_token("  deploy@web  ").unwrap();
        assert_eq!(parsed.user, Some("deploy"));
        assert_eq!(parsed.host, "web");
    }

    #[test]
    fn rejects_malformed_tokens() {
        for token in [
            "",
            "   ",
            "@host",
            "user@",
            ":22",
            "host:",
            "host:abc",
            "host:0",
            "host:65536",
            "host:99999999999",
            "host:+22",
            "host:22:23",
            "a@b@c",
            "my host",
        ] {
            assert!(
                matches!(parse_token(token), Err(Error::InvalidFormat { .. })),
                "expected InvalidFormat for {token:?}"
            );
        }
    }

    #[test]
    fn accepts_port_bounds() {
        assert_eq!(parse_token("h:1").unwrap().port, 1);
        assert_eq!(parse_token("h:65535").unwrap().port, 65535);
    }
}
