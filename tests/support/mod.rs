// ABOUTME: Test support utilities.
// ABOUTME: Tracing setup and the optional live SSH target taken from the environment.

use std::path::PathBuf;
use std::sync::Once;

static TRACING_INIT: Once = Once::new();

/// Initialize tracing for tests. Safe to call multiple times.
#[allow(dead_code)]
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::EnvFilter;
        let filter = EnvFilter::from_default_env()
            .add_directive("sshctl=debug".parse().unwrap())
            .add_directive("russh=info".parse().unwrap());
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init()
            .ok();
    });
}

/// An SSH server supplied by the environment for live tests.
#[allow(dead_code)]
#[derive(Debug, Clone)]
pub struct LiveTarget {
    pub host: String,
    pub user: String,
    pub port: u16,
    pub key: PathBuf,
}

/// `SSHCTL_TEST_HOST` (plus `_USER`, `_PORT`, `_KEY`), or `None` to skip.
#[allow(dead_code)]
pub fn live_target() -> Option<LiveTarget> {
    let host = std::env::var("SSHCTL_TEST_HOST").ok().filter(|h| !h.is_empty())?;
    let user = std::env::var("SSHCTL_TEST_USER").unwrap_or_else(|_| "root".to_string());
    let port = std::env::var("SSHCTL_TEST_PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(22);
    let key = std::env::var("SSHCTL_TEST_KEY")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/test_key")
        });
    Some(LiveTarget {
        host,
        user,
        port,
        key,
    })
}

/// Path of a key fixture.
#[allow(dead_code)]
pub fn fixture(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name)
}
