// ABOUTME: russh client handler and the authenticated Connection wrapper.
// ABOUTME: Handles known_hosts verification, tunnels and forwarded channels for one session.

use super::error::{Error, Result};
use super::forward::{ForwardRegistry, ForwardedConnection, RemoteListener};
use crate::endpoint::EndpointSpec;
use russh::client::{self, Handle, Msg};
use russh::keys::known_hosts::{
    check_known_hosts, check_known_hosts_path, learn_known_hosts, learn_known_hosts_path,
};
use russh::keys::ssh_key;
use russh::{Channel, ChannelStream, Disconnect};
use std::path::PathBuf;
use std::time::Duration;

/// Host key policy for one dial.
#[derive(Debug, Clone)]
pub(crate) struct HostKeyPolicy {
    pub trust_on_first_use: bool,
    pub known_hosts_path: Option<PathBuf>,
}

/// SSH client handler for russh.
pub(crate) struct ClientHandler {
    host: String,
    port: u16,
    policy: HostKeyPolicy,
    forwards: ForwardRegistry,
}

impl ClientHandler {
    pub(crate) fn new(
        host: impl Into<String>,
        port: u16,
        policy: HostKeyPolicy,
        forwards: ForwardRegistry,
    ) -> Self {
        Self {
            host: host.into(),
            port,
            policy,
            forwards,
        }
    }

    fn learn(&self, key: &ssh_key::PublicKey) {
        let learned = match &self.policy.known_hosts_path {
            Some(path) => learn_known_hosts_path(&self.host, self.port, key, path),
            None => learn_known_hosts(&self.host, self.port, key),
        };
        if let Err(e) = learned {
            tracing::warn!("Failed to save host key to known_hosts: {}", e);
        }
    }
}

impl client::Handler for ClientHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &ssh_key::PublicKey,
    ) -> std::result::Result<bool, Self::Error> {
        let check_result = match &self.policy.known_hosts_path {
            Some(path) => check_known_hosts_path(&self.host, self.port, server_public_key, path),
            None => check_known_hosts(&self.host, self.port, server_public_key),
        };

        match check_result {
            Ok(true) => Ok(true),
            Ok(false) if self.policy.trust_on_first_use => {
                tracing::warn!(
                    "Trust-On-First-Use: accepting unknown host key for {}:{}",
                    self.host,
                    self.port
                );
                self.learn(server_public_key);
                Ok(true)
            }
            Ok(false) => {
                tracing::warn!("Unknown host key for {}:{}", self.host, self.port);
                Ok(false)
            }
            Err(russh::keys::Error::KeyChanged { .. }) => {
                tracing::error!(
                    "Host key for {}:{} changed; refusing to connect",
                    self.host,
                    self.port
                );
                Ok(false)
            }
            // Unreadable known_hosts file: same as an unknown host.
            Err(_) => Ok(self.policy.trust_on_first_use),
        }
    }

    async fn server_channel_open_forwarded_tcpip(
        &mut self,
        channel: Channel<Msg>,
        connected_address: &str,
        connected_port: u32,
        originator_address: &str,
        originator_port: u32,
        _session: &mut client::Session,
    ) -> std::result::Result<(), Self::Error> {
        let originator = format!("{originator_address}:{originator_port}");
        tracing::debug!(
            listen = %format!("{connected_address}:{connected_port}"),
            %originator,
            "remote forwarded connection"
        );
        let delivered = self.forwards.deliver(ForwardedConnection {
            stream: channel.into_stream(),
            originator,
        });
        if !delivered {
            tracing::debug!("no remote listener registered; dropping forwarded channel");
        }
        Ok(())
    }
}

/// An authenticated SSH session to one endpoint.
///
/// When dialed through a jump host the relay connection is owned here and
/// torn down together with this one.
pub struct Connection {
    endpoint: EndpointSpec,
    handle: Handle<ClientHandler>,
    relay: Option<Box<Connection>>,
    forwards: ForwardRegistry,
    command_timeout: Duration,
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("endpoint", &self.endpoint.to_string())
            .field("relay", &self.relay.as_ref().map(|r| r.endpoint.to_string()))
            .field("handle", &"<russh::Handle>")
            .finish()
    }
}

impl Connection {
    pub(crate) fn new(
        endpoint: EndpointSpec,
        handle: Handle<ClientHandler>,
        forwards: ForwardRegistry,
        command_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            handle,
            relay: None,
            forwards,
            command_timeout,
        }
    }

    pub(crate) fn with_relay(mut self, relay: Connection) -> Self {
        self.relay = Some(Box::new(relay));
        self
    }

    pub(crate) fn handle(&self) -> &Handle<ClientHandler> {
        &self.handle
    }

    pub fn endpoint(&self) -> &EndpointSpec {
        &self.endpoint
    }

    pub fn command_timeout(&self) -> Duration {
        self.command_timeout
    }

    /// True once the underlying transport has shut down.
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }

    /// Whether the jump host connection (if any) has shut down.
    pub fn relay_closed(&self) -> Option<bool> {
        self.relay.as_ref().map(|r| r.is_closed())
    }

    /// Open a `direct-tcpip` channel to `host:port` as seen from the remote side.
    pub async fn open_tunnel(&self, host: &str, port: u16) -> Result<ChannelStream<Msg>> {
        let channel = self
            .handle
            .channel_open_direct_tcpip(host, u32::from(port), "127.0.0.1", 0)
            .await
            .map_err(|e| Error::dial(format!("{host}:{port}"), e))?;
        Ok(channel.into_stream())
    }

    /// Ask the server to listen on `bind_host:bind_port` and hand over each
    /// incoming connection through the returned listener.
    pub async fn listen_remote(&mut self, bind_host: &str, bind_port: u16) -> Result<RemoteListener> {
        let incoming = self.forwards.install();
        let assigned = self
            .handle
            .tcpip_forward(bind_host, u32::from(bind_port))
            .await
            .map_err(|e| {
                self.forwards.clear();
                Error::RemoteForward(format!("{bind_host}:{bind_port}: {e}"))
            })?;
        let port = if assigned == 0 {
            u32::from(bind_port)
        } else {
            assigned
        };
        Ok(RemoteListener::new(format!("{bind_host}:{port}"), incoming))
    }

    /// Close this session and then the jump host session, if any.
    pub async fn close(&self) -> Result<()> {
        self.forwards.clear();
        let result = disconnect_handle(&self.handle).await;
        // Jump host connections never carry a relay of their own.
        if let Some(relay) = &self.relay {
            relay.forwards.clear();
            disconnect_handle(&relay.handle).await?;
        }
        result
    }
}

async fn disconnect_handle(handle: &Handle<ClientHandler>) -> Result<()> {
    handle
        .disconnect(Disconnect::ByApplication, "", "en")
        .await
        .map_err(Error::Protocol)
}
