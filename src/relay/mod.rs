// ABOUTME: Stream relay: bridges accepted connections to a peer across an SSH connection.
// ABOUTME: Local mode listens on this machine; remote mode listens on the server.

mod adapters;
mod bridge;
mod error;
mod session;
mod spec;
mod stats;

pub use adapters::{RemoteAcceptor, TcpAcceptor, TcpTarget, TunnelTarget};
pub use bridge::{Transfer, bridge};
pub use error::{RelayError, RelayErrorKind};
pub use session::{Acceptor, RelayEvent, RelaySession, Target};
pub use spec::{DEFAULT_BIND, ForwardSpec};
pub use stats::{RelaySnapshot, RelayStats};

use crate::ssh::Connection;
use error::{BindSnafu, RemoteListenSnafu};
use snafu::ResultExt;
use std::sync::Arc;

/// Which side listens and where accepted connections go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayMode {
    /// Listen on `listen` here; tunnel each connection to `target_host:target_port`
    /// as seen from the server.
    Local {
        listen: String,
        target_host: String,
        target_port: u16,
    },
    /// Ask the server to listen on `listen_host:listen_port`; dial `target`
    /// here for each connection.
    Remote {
        listen_host: String,
        listen_port: u16,
        target: String,
    },
}

impl From<&ForwardSpec> for RelayMode {
    fn from(spec: &ForwardSpec) -> Self {
        RelayMode::Local {
            listen: spec.listen_address(),
            target_host: spec.remote_host.clone(),
            target_port: spec.remote_port,
        }
    }
}

/// Start a relay over `connection`, which the session then owns.
pub async fn start(mut connection: Connection, mode: RelayMode) -> Result<RelaySession, RelayError> {
    match mode {
        RelayMode::Local {
            listen,
            target_host,
            target_port,
        } => {
            let connection = Arc::new(connection);
            let watched = Arc::clone(&connection);
            let acceptor = bind_local(&listen)
                .await?
                .tied_to(move || watched.is_closed());
            let target = TunnelTarget::new(Arc::clone(&connection), target_host, target_port);
            Ok(RelaySession::spawn(acceptor, target).with_connection(connection))
        }
        RelayMode::Remote {
            listen_host,
            listen_port,
            target,
        } => {
            let listener = connection
                .listen_remote(&listen_host, listen_port)
                .await
                .context(RemoteListenSnafu {
                    address: format!("{listen_host}:{listen_port}"),
                })?;
            let connection = Arc::new(connection);
            let acceptor = RemoteAcceptor::new(listener, Arc::clone(&connection));
            Ok(RelaySession::spawn(acceptor, TcpTarget::new(target)).with_connection(connection))
        }
    }
}

async fn bind_local(listen: &str) -> Result<TcpAcceptor, RelayError> {
    TcpAcceptor::bind(listen)
        .await
        .context(BindSnafu { address: listen })
}

/// Stop a relay and return its final counters.
pub async fn stop(session: RelaySession) -> RelaySnapshot {
    session.stop().await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn occupied_port_is_a_bind_error() {
        let taken = bind_local("127.0.0.1:0").await.unwrap();
        let address = taken.address();

        let err = bind_local(&address).await.unwrap_err();
        assert_eq!(err.kind(), RelayErrorKind::LocalBind);
        assert!(err.to_string().contains(&address));
    }
}
