// ABOUTME: Dialer: establishes authenticated connections, directly or via a jump host.
// ABOUTME: Relay chaining goes through the RelayHop seam so failure cleanup is testable.

use super::auth::{authenticate, build_attempts};
use super::client::{ClientHandler, Connection, HostKeyPolicy};
use super::error::{Error, RelayStage, Result};
use super::forward::ForwardRegistry;
use crate::endpoint::{EndpointSpec, RelaySpec};
use async_trait::async_trait;
use russh::ChannelStream;
use russh::client::{self, Config, Msg};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Settings shared by every dial in one invocation.
#[derive(Debug, Clone)]
pub struct DialOptions {
    /// Accept and record unknown host keys.
    pub trust_on_first_use: bool,
    /// Optional path to known_hosts file.
    /// If None, uses the default ~/.ssh/known_hosts.
    pub known_hosts_path: Option<PathBuf>,
    /// Bound on TCP connect plus SSH handshake.
    pub connect_timeout: Duration,
    /// Timeout for command execution (default: 5 minutes).
    pub command_timeout: Duration,
    /// Idle time after which russh drops the session.
    pub inactivity_timeout: Option<Duration>,
    /// Interval between keepalive requests.
    pub keepalive_interval: Option<Duration>,
    /// Whether an interactive password prompt may be shown.
    pub allow_prompt: bool,
}

impl Default for DialOptions {
    fn default() -> Self {
        Self {
            trust_on_first_use: true,
            known_hosts_path: None,
            connect_timeout: Duration::from_secs(10),
            command_timeout: Duration::from_secs(300),
            inactivity_timeout: None,
            keepalive_interval: None,
            allow_prompt: true,
        }
    }
}

impl DialOptions {
    pub fn trust_on_first_use(mut self, tofu: bool) -> Self {
        self.trust_on_first_use = tofu;
        self
    }

    pub fn known_hosts_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.known_hosts_path = Some(path.into());
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn inactivity_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.inactivity_timeout = timeout;
        self
    }

    pub fn keepalive_interval(mut self, interval: Option<Duration>) -> Self {
        self.keepalive_interval = interval;
        self
    }

    pub fn allow_prompt(mut self, allow: bool) -> Self {
        self.allow_prompt = allow;
        self
    }

    fn host_key_policy(&self) -> HostKeyPolicy {
        HostKeyPolicy {
            trust_on_first_use: self.trust_on_first_use,
            known_hosts_path: self.known_hosts_path.clone(),
        }
    }

    fn russh_config(&self) -> Arc<Config> {
        Arc::new(Config {
            inactivity_timeout: self.inactivity_timeout,
            keepalive_interval: self.keepalive_interval,
            ..Default::default()
        })
    }
}

/// A connected hop that can open byte streams to addresses behind it.
#[async_trait]
pub trait RelayHop: Send + Sync {
    type Stream: AsyncRead + AsyncWrite + Unpin + Send + 'static;

    async fn open_tunnel(&self, host: &str, port: u16) -> Result<Self::Stream>;

    /// Tear down the hop. Errors are logged, not returned.
    async fn shutdown(&self);
}

#[async_trait]
impl RelayHop for Connection {
    type Stream = ChannelStream<Msg>;

    async fn open_tunnel(&self, host: &str, port: u16) -> Result<Self::Stream> {
        Connection::open_tunnel(self, host, port).await
    }

    async fn shutdown(&self) {
        if let Err(e) = self.close().await {
            tracing::debug!(error = %e, "closing jump host connection failed");
        }
    }
}

/// Reach `target` through an already established `hop`.
///
/// `handshake` runs the SSH session over the tunnel stream. Any failure shuts
/// the hop down before returning, so nothing outlives a failed dial.
pub(crate) async fn chain_through<H, C, F, Fut>(
    relay_name: &str,
    hop: H,
    target: &EndpointSpec,
    handshake: F,
) -> Result<(H, C)>
where
    H: RelayHop,
    F: FnOnce(H::Stream) -> Fut,
    Fut: Future<Output = Result<C>>,
{
    let stream = match hop.open_tunnel(&target.host, target.port).await {
        Ok(stream) => stream,
        Err(e) => {
            hop.shutdown().await;
            return Err(Error::relay(relay_name, RelayStage::Target, e));
        }
    };

    match handshake(stream).await {
        Ok(conn) => Ok((hop, conn)),
        Err(e) => {
            hop.shutdown().await;
            Err(Error::relay(relay_name, RelayStage::Target, e))
        }
    }
}

/// Establishes authenticated connections.
#[derive(Debug, Clone, Default)]
pub struct Dialer {
    options: DialOptions,
}

impl Dialer {
    pub fn new(options: DialOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &DialOptions {
        &self.options
    }

    /// Connect and authenticate to `endpoint`, through `relay` when given.
    pub async fn dial(&self, endpoint: &EndpointSpec, relay: Option<&RelaySpec>) -> Result<Connection> {
        let Some(relay) = relay else {
            return self.dial_direct(endpoint).await;
        };

        tracing::debug!(relay = %relay.endpoint, target_host = %endpoint, "dialing via jump host");
        let hop = self
            .dial_direct(&relay.endpoint)
            .await
            .map_err(|e| Error::relay(&relay.name, RelayStage::Relay, e))?;

        let (hop, conn) = chain_through(&relay.name, hop, endpoint, |stream| {
            self.handshake_stream(endpoint, stream)
        })
        .await?;
        Ok(conn.with_relay(hop))
    }

    async fn dial_direct(&self, endpoint: &EndpointSpec) -> Result<Connection> {
        let (handler, forwards) = self.handler(endpoint);
        let connect = client::connect(
            self.options.russh_config(),
            (endpoint.host.as_str(), endpoint.port),
            handler,
        );
        self.establish(endpoint, forwards, connect).await
    }

    async fn handshake_stream<S>(&self, endpoint: &EndpointSpec, stream: S) -> Result<Connection>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let (handler, forwards) = self.handler(endpoint);
        let connect = client::connect_stream(self.options.russh_config(), stream, handler);
        self.establish(endpoint, forwards, connect).await
    }

    fn handler(&self, endpoint: &EndpointSpec) -> (ClientHandler, ForwardRegistry) {
        let forwards = ForwardRegistry::default();
        let handler = ClientHandler::new(
            &endpoint.host,
            endpoint.port,
            self.options.host_key_policy(),
            forwards.clone(),
        );
        (handler, forwards)
    }

    /// Bound the handshake by the connect timeout, then authenticate.
    async fn establish<F>(
        &self,
        endpoint: &EndpointSpec,
        forwards: ForwardRegistry,
        connect: F,
    ) -> Result<Connection>
    where
        F: Future<Output = std::result::Result<client::Handle<ClientHandler>, russh::Error>>,
    {
        let attempts = build_attempts(&endpoint.credential_hints, self.options.allow_prompt);

        let mut handle = match tokio::time::timeout(self.options.connect_timeout, connect).await {
            Ok(Ok(handle)) => handle,
            Ok(Err(e)) => return Err(Error::dial(endpoint.address(), e)),
            Err(_) => {
                return Err(Error::dial(
                    endpoint.address(),
                    format!("timed out after {:?}", self.options.connect_timeout),
                ));
            }
        };

        if let Err(e) = authenticate(&mut handle, endpoint, attempts).await {
            let _ = handle
                .disconnect(russh::Disconnect::ByApplication, "", "en")
                .await;
            return Err(e);
        }

        Ok(Connection::new(
            endpoint.clone(),
            handle,
            forwards,
            self.options.command_timeout,
        ))
    }
}
