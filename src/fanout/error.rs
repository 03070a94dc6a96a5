// ABOUTME: Fan-out error types.
// ABOUTME: Per-endpoint failures live in results; only batch-level problems are errors.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("no valid hosts specified")]
    NoValidEndpoints,
}

pub type Result<T> = std::result::Result<T, Error>;
