// ABOUTME: Library root for sshctl - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod config;
pub mod diagnostics;
pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod output;
pub mod relay;
pub mod ssh;
