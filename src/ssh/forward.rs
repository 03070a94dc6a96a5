// ABOUTME: Remote (server-side) TCP listening over SSH.
// ABOUTME: Routes forwarded-tcpip channels from the client handler to a RemoteListener.

use parking_lot::Mutex;
use russh::ChannelStream;
use russh::client::Msg;
use std::sync::Arc;
use tokio::sync::mpsc;

/// A connection accepted by the server on our behalf.
pub struct ForwardedConnection {
    pub stream: ChannelStream<Msg>,
    /// Remote peer as reported by the server.
    pub originator: String,
}

impl std::fmt::Debug for ForwardedConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ForwardedConnection")
            .field("originator", &self.originator)
            .finish_non_exhaustive()
    }
}

/// Shared slot between the russh handler and the active remote listener.
#[derive(Clone, Default)]
pub(crate) struct ForwardRegistry {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<ForwardedConnection>>>>,
}

impl ForwardRegistry {
    /// Register a new receiver, replacing any previous one.
    pub(crate) fn install(&self) -> mpsc::UnboundedReceiver<ForwardedConnection> {
        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        rx
    }

    pub(crate) fn clear(&self) {
        self.sender.lock().take();
    }

    /// Hand a forwarded connection to the listener. False if nobody is listening.
    pub(crate) fn deliver(&self, conn: ForwardedConnection) -> bool {
        let guard = self.sender.lock();
        match guard.as_ref() {
            Some(tx) => tx.send(conn).is_ok(),
            None => false,
        }
    }
}

/// Listener for connections arriving on a server-side port.
pub struct RemoteListener {
    address: String,
    incoming: mpsc::UnboundedReceiver<ForwardedConnection>,
}

impl RemoteListener {
    pub(crate) fn new(
        address: String,
        incoming: mpsc::UnboundedReceiver<ForwardedConnection>,
    ) -> Self {
        Self { address, incoming }
    }

    /// Address the server is listening on.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Wait for the next connection. `None` once the session has gone away.
    pub async fn accept(&mut self) -> Option<ForwardedConnection> {
        self.incoming.recv().await
    }
}

impl std::fmt::Debug for RemoteListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteListener")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}
