// ABOUTME: RelaySession: accept loop, per-connection workers and shutdown.
// ABOUTME: Generic over Acceptor/Target so local and remote listening share one loop.

use super::bridge::{Transfer, bridge};
use super::stats::{ActiveConnection, RelaySnapshot, RelayStats};
use crate::ssh::Connection;
use async_trait::async_trait;
use chrono::{DateTime, Local};
use serde::Serialize;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Notify, broadcast};
use tokio::task::JoinHandle;

/// How often the accept loop wakes to re-check the stop flag.
const ACCEPT_TICK: Duration = Duration::from_secs(1);
/// Pause after a failed accept before trying again.
const ACCEPT_RETRY_DELAY: Duration = Duration::from_millis(100);
/// Upper bound on waiting for the accept loop to exit.
const STOP_GRACE: Duration = Duration::from_secs(2);
/// Connection log entries kept for slow subscribers.
const EVENT_BUFFER: usize = 64;

/// Source of inbound connections.
#[async_trait]
pub trait Acceptor: Send + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    /// Next connection and its peer description.
    ///
    /// `Ok(None)` means the listener is gone for good. Must be cancel-safe.
    async fn accept(&mut self) -> io::Result<Option<(Self::Stream, String)>>;

    /// Address being listened on, for display.
    fn address(&self) -> String;

    /// True once the listener can no longer produce connections.
    fn is_closed(&self) -> bool {
        false
    }
}

/// Where each accepted connection is relayed to.
#[async_trait]
pub trait Target: Send + Sync + 'static {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn connect(&self) -> io::Result<Self::Stream>;

    /// Address being dialed, for display.
    fn address(&self) -> String;
}

/// Connection log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum RelayEvent {
    Opened {
        number: i64,
        peer: String,
        at: DateTime<Local>,
    },
    Closed {
        number: i64,
        peer: String,
        #[serde(flatten)]
        transfer: Transfer,
        at: DateTime<Local>,
    },
    TargetUnreachable {
        number: i64,
        peer: String,
        error: String,
        at: DateTime<Local>,
    },
}

/// A running relay.
///
/// Stopping closes the listener and the SSH connection; connections already
/// being relayed are not interrupted by the stop itself.
pub struct RelaySession {
    listen_address: String,
    target_address: String,
    stats: Arc<RelayStats>,
    shutdown: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    task: Option<JoinHandle<()>>,
    connection: Option<Arc<Connection>>,
    events: broadcast::Sender<RelayEvent>,
}

impl std::fmt::Debug for RelaySession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelaySession")
            .field("listen_address", &self.listen_address)
            .field("target_address", &self.target_address)
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}

impl RelaySession {
    /// Start accepting on `acceptor` and relaying to `target`.
    pub fn spawn<A: Acceptor, T: Target>(acceptor: A, target: T) -> Self {
        let listen_address = acceptor.address();
        let target_address = target.address();
        let stats = Arc::new(RelayStats::default());
        let shutdown = Arc::new(AtomicBool::new(false));
        let stop_signal = Arc::new(Notify::new());
        let (events, _) = broadcast::channel(EVENT_BUFFER);

        tracing::info!(listen = %listen_address, target = %target_address, "relay started");

        let task = tokio::spawn(accept_loop(
            acceptor,
            Arc::new(target),
            Arc::clone(&stats),
            Arc::clone(&shutdown),
            Arc::clone(&stop_signal),
            events.clone(),
        ));

        Self {
            listen_address,
            target_address,
            stats,
            shutdown,
            stop_signal,
            task: Some(task),
            connection: None,
            events,
        }
    }

    /// Tie the SSH connection's lifetime to this relay.
    pub(crate) fn with_connection(mut self, connection: Arc<Connection>) -> Self {
        self.connection = Some(connection);
        self
    }

    pub fn listen_address(&self) -> &str {
        &self.listen_address
    }

    pub fn target_address(&self) -> &str {
        &self.target_address
    }

    /// The SSH connection carrying this relay, if any.
    pub fn connection(&self) -> Option<&Arc<Connection>> {
        self.connection.as_ref()
    }

    /// Live connection log. Entries sent before subscribing are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<RelayEvent> {
        self.events.subscribe()
    }

    pub fn stats(&self) -> RelaySnapshot {
        self.stats.snapshot()
    }

    /// Whether the accept loop is still running.
    pub fn is_running(&self) -> bool {
        self.task.as_ref().is_some_and(|t| !t.is_finished())
    }

    /// Wait until the accept loop ends on its own (fatal listener error).
    pub async fn closed(&mut self) {
        if let Some(task) = self.task.as_mut() {
            let _ = task.await;
            self.task = None;
        }
    }

    /// Stop accepting, close the listener and the SSH connection.
    pub async fn stop(mut self) -> RelaySnapshot {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stop_signal.notify_waiters();

        if let Some(mut task) = self.task.take()
            && tokio::time::timeout(STOP_GRACE, &mut task).await.is_err()
        {
            tracing::warn!(listen = %self.listen_address, "relay accept loop did not stop in time");
            task.abort();
        }

        if let Some(connection) = self.connection.take()
            && let Err(e) = connection.close().await
        {
            tracing::debug!(error = %e, "closing relay connection failed");
        }

        let snapshot = self.stats.snapshot();
        tracing::info!(
            listen = %self.listen_address,
            total = snapshot.total_connections,
            bytes_up = snapshot.bytes_up,
            bytes_down = snapshot.bytes_down,
            "relay stopped"
        );
        snapshot
    }
}

impl Drop for RelaySession {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.stop_signal.notify_waiters();
    }
}

async fn accept_loop<A: Acceptor, T: Target>(
    mut acceptor: A,
    target: Arc<T>,
    stats: Arc<RelayStats>,
    shutdown: Arc<AtomicBool>,
    stop_signal: Arc<Notify>,
    events: broadcast::Sender<RelayEvent>,
) {
    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        if acceptor.is_closed() {
            tracing::warn!(listen = %acceptor.address(), "relay listener closed");
            break;
        }

        // Wake periodically so a missed stop notification is still seen.
        let accepted = tokio::select! {
            result = acceptor.accept() => result,
            _ = stop_signal.notified() => continue,
            _ = tokio::time::sleep(ACCEPT_TICK) => continue,
        };

        match accepted {
            Ok(Some((stream, peer))) => {
                let active = stats.open();
                tracing::info!(connection = active.number(), %peer, "relay connection opened");
                let _ = events.send(RelayEvent::Opened {
                    number: active.number(),
                    peer: peer.clone(),
                    at: Local::now(),
                });
                tokio::spawn(relay_connection(
                    stream,
                    peer,
                    Arc::clone(&target),
                    active,
                    events.clone(),
                ));
            }
            Ok(None) => {
                tracing::warn!(listen = %acceptor.address(), "relay listener closed");
                break;
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!(error = %e, "relay accept failed");
                tokio::time::sleep(ACCEPT_RETRY_DELAY).await;
            }
        }
    }
}

async fn relay_connection<S, T>(
    inbound: S,
    peer: String,
    target: Arc<T>,
    active: ActiveConnection,
    events: broadcast::Sender<RelayEvent>,
) where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    T: Target,
{
    let outbound = match target.connect().await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::warn!(
                connection = active.number(),
                %peer,
                target = %target.address(),
                error = %e,
                "relay target unreachable"
            );
            let number = active.number();
            drop(active);
            let _ = events.send(RelayEvent::TargetUnreachable {
                number,
                peer,
                error: e.to_string(),
                at: Local::now(),
            });
            return;
        }
    };

    let transfer = bridge(inbound, outbound).await;
    active.stats().add_up(transfer.up);
    active.stats().add_down(transfer.down);

    tracing::info!(
        connection = active.number(),
        %peer,
        bytes_up = transfer.up,
        bytes_down = transfer.down,
        "relay connection closed"
    );
    let number = active.number();
    drop(active);
    let _ = events.send(RelayEvent::Closed {
        number,
        peer,
        transfer,
        at: Local::now(),
    });
}
