// ABOUTME: Acceptor and Target implementations for TCP sockets and SSH channels.
// ABOUTME: Local forwarding listens on TCP; reverse forwarding listens on the remote side.

use super::session::{Acceptor, Target};
use crate::ssh::{Connection, RemoteListener};
use async_trait::async_trait;
use russh::ChannelStream;
use russh::client::Msg;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};

/// Reports whether whatever a listener depends on has gone away.
type ClosedCheck = Box<dyn Fn() -> bool + Send + Sync>;

/// Plain local TCP listener.
pub struct TcpAcceptor {
    listener: TcpListener,
    local_addr: SocketAddr,
    closed: Option<ClosedCheck>,
}

impl std::fmt::Debug for TcpAcceptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpAcceptor")
            .field("local_addr", &self.local_addr)
            .field("tied", &self.closed.is_some())
            .finish()
    }
}

impl TcpAcceptor {
    pub async fn bind(address: &str) -> io::Result<Self> {
        Self::from_listener(TcpListener::bind(address).await?)
    }

    pub fn from_listener(listener: TcpListener) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        Ok(Self {
            listener,
            local_addr,
            closed: None,
        })
    }

    /// Stop accepting once `closed` returns true, e.g. when the SSH
    /// connection carrying the tunnels has dropped.
    pub fn tied_to(mut self, closed: impl Fn() -> bool + Send + Sync + 'static) -> Self {
        self.closed = Some(Box::new(closed));
        self
    }
}

#[async_trait]
impl Acceptor for TcpAcceptor {
    type Stream = TcpStream;

    async fn accept(&mut self) -> io::Result<Option<(TcpStream, String)>> {
        let (stream, peer) = self.listener.accept().await?;
        Ok(Some((stream, peer.to_string())))
    }

    fn address(&self) -> String {
        self.local_addr.to_string()
    }

    fn is_closed(&self) -> bool {
        self.closed.as_ref().is_some_and(|closed| closed())
    }
}

/// Connections the server accepts on our behalf.
#[derive(Debug)]
pub struct RemoteAcceptor {
    listener: RemoteListener,
    connection: Arc<Connection>,
}

impl RemoteAcceptor {
    pub fn new(listener: RemoteListener, connection: Arc<Connection>) -> Self {
        Self {
            listener,
            connection,
        }
    }
}

#[async_trait]
impl Acceptor for RemoteAcceptor {
    type Stream = ChannelStream<Msg>;

    async fn accept(&mut self) -> io::Result<Option<(ChannelStream<Msg>, String)>> {
        Ok(self
            .listener
            .accept()
            .await
            .map(|forwarded| (forwarded.stream, forwarded.originator)))
    }

    fn address(&self) -> String {
        format!("{} on {}", self.listener.address(), self.connection.endpoint())
    }

    fn is_closed(&self) -> bool {
        self.connection.is_closed()
    }
}

/// Dial a TCP address on this machine.
#[derive(Debug, Clone)]
pub struct TcpTarget {
    address: String,
}

impl TcpTarget {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }
}

#[async_trait]
impl Target for TcpTarget {
    type Stream = TcpStream;

    async fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(&self.address).await
    }

    fn address(&self) -> String {
        self.address.clone()
    }
}

/// Reach `host:port` from the remote side through a `direct-tcpip` channel.
#[derive(Debug, Clone)]
pub struct TunnelTarget {
    connection: Arc<Connection>,
    host: String,
    port: u16,
}

impl TunnelTarget {
    pub fn new(connection: Arc<Connection>, host: impl Into<String>, port: u16) -> Self {
        Self {
            connection,
            host: host.into(),
            port,
        }
    }
}

#[async_trait]
impl Target for TunnelTarget {
    type Stream = ChannelStream<Msg>;

    async fn connect(&self) -> io::Result<ChannelStream<Msg>> {
        self.connection
            .open_tunnel(&self.host, self.port)
            .await
            .map_err(io::Error::other)
    }

    fn address(&self) -> String {
        format!("{}:{} via {}", self.host, self.port, self.connection.endpoint())
    }
}
