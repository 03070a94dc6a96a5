// ABOUTME: Shared relay counters updated by every relay worker.
// ABOUTME: Independent atomics; a snapshot is a point-in-time copy for display.

use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

/// Live counters for one relay.
#[derive(Debug, Default)]
pub struct RelayStats {
    active: AtomicI64,
    total: AtomicI64,
    bytes_up: AtomicI64,
    bytes_down: AtomicI64,
}

/// Copy of the counters at one instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct RelaySnapshot {
    pub active_connections: i64,
    pub total_connections: i64,
    /// Bytes from accepted peers towards the target.
    pub bytes_up: i64,
    /// Bytes from the target back to accepted peers.
    pub bytes_down: i64,
}

impl RelayStats {
    pub fn snapshot(&self) -> RelaySnapshot {
        RelaySnapshot {
            active_connections: self.active.load(Ordering::Relaxed),
            total_connections: self.total.load(Ordering::Relaxed),
            bytes_up: self.bytes_up.load(Ordering::Relaxed),
            bytes_down: self.bytes_down.load(Ordering::Relaxed),
        }
    }

    /// Count a newly accepted connection. It stays active until the guard drops.
    pub(crate) fn open(self: &Arc<Self>) -> ActiveConnection {
        let number = self.total.fetch_add(1, Ordering::Relaxed) + 1;
        self.active.fetch_add(1, Ordering::Relaxed);
        ActiveConnection {
            stats: Arc::clone(self),
            number,
        }
    }

    pub(crate) fn add_up(&self, bytes: u64) {
        self.bytes_up.fetch_add(clamp(bytes), Ordering::Relaxed);
    }

    pub(crate) fn add_down(&self, bytes: u64) {
        self.bytes_down.fetch_add(clamp(bytes), Ordering::Relaxed);
    }
}

fn clamp(bytes: u64) -> i64 {
    i64::try_from(bytes).unwrap_or(i64::MAX)
}

/// One accepted connection, counted as active while alive.
#[derive(Debug)]
pub(crate) struct ActiveConnection {
    stats: Arc<RelayStats>,
    number: i64,
}

impl ActiveConnection {
    /// 1-based sequence number within the relay.
    pub(crate) fn number(&self) -> i64 {
        self.number
    }

    pub(crate) fn stats(&self) -> &RelayStats {
        &self.stats
    }
}

impl Drop for ActiveConnection {
    fn drop(&mut self) {
        self.stats.active.fetch_sub(1, Ordering::Relaxed);
    }
}
