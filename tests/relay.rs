// ABOUTME: Integration tests for the stream relay over local TCP sockets.
// ABOUTME: Covers byte accounting, connection counters, unreachable targets and stop.

mod support;

use sshctl::relay::{ForwardSpec, RelayEvent, RelaySession, RelaySnapshot, TcpAcceptor, TcpTarget};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Echo server on an ephemeral port; returns its address.
async fn echo_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let address = listener.local_addr().unwrap().to_string();
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let (mut read, mut write) = stream.into_split();
                let _ = tokio::io::copy(&mut read, &mut write).await;
            });
        }
    });
    address
}

/// An address nothing listens on.
async fn dead_address() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().to_string()
}

async fn spawn_relay(target: String) -> RelaySession {
    let acceptor = TcpAcceptor::bind("127.0.0.1:0").await.unwrap();
    RelaySession::spawn(acceptor, TcpTarget::new(target))
}

/// Poll the counters until `done` holds or two seconds pass.
async fn wait_for(session: &RelaySession, done: impl Fn(&RelaySnapshot) -> bool) -> RelaySnapshot {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    loop {
        let stats = session.stats();
        if done(&stats) || tokio::time::Instant::now() >= deadline {
            return stats;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

async fn echo_once(address: &str, payload: &[u8]) {
    let mut client = TcpStream::connect(address).await.unwrap();
    client.write_all(payload).await.unwrap();
    let mut buf = vec![0u8; payload.len()];
    client.read_exact(&mut buf).await.unwrap();
    assert_eq!(buf, payload);
}

mod accounting {
    use super::*;

    /// Test: one connection relayed until the client closes.
    /// Expected: total +1, active back to 0, bytes counted both ways.
    #[tokio::test]
    async fn counts_one_connection() {
        support::init_tracing();
        let session = spawn_relay(echo_server().await).await;
        let before = session.stats();

        echo_once(session.listen_address(), b"hello").await;

        let stats = wait_for(&session, |s| s.total_connections == 1 && s.active_connections == 0).await;
        assert_eq!(stats.total_connections, before.total_connections + 1);
        assert_eq!(stats.active_connections, before.active_connections);

        let final_stats = session.stop().await;
        assert_eq!(final_stats.bytes_up, 5);
        assert_eq!(final_stats.bytes_down, 5);
    }

    /// Test: several clients at the same time.
    /// Expected: every connection is numbered and counted.
    #[tokio::test]
    async fn concurrent_connections() {
        let session = spawn_relay(echo_server().await).await;
        let address = session.listen_address().to_string();

        let clients: Vec<_> = (0..4)
            .map(|i| {
                let address = address.clone();
                tokio::spawn(async move { echo_once(&address, format!("client-{i}").as_bytes()).await })
            })
            .collect();
        for client in clients {
            client.await.unwrap();
        }

        let stats = wait_for(&session, |s| s.total_connections == 4 && s.active_connections == 0).await;
        assert_eq!(stats.total_connections, 4);
        assert_eq!(stats.active_connections, 0);
        assert_eq!(stats.bytes_up, 4 * "client-0".len() as i64);
        session.stop().await;
    }
}

mod connection_log {
    use super::*;
    use tokio::sync::broadcast::Receiver;

    async fn next_event(events: &mut Receiver<RelayEvent>) -> RelayEvent {
        tokio::time::timeout(Duration::from_secs(2), events.recv())
            .await
            .expect("relay event in time")
            .expect("relay still running")
    }

    /// Test: subscribe, then relay one connection.
    /// Expected: an opened entry then a closed entry with the byte counts.
    #[tokio::test]
    async fn opened_then_closed() {
        let session = spawn_relay(echo_server().await).await;
        let mut events = session.subscribe();

        echo_once(session.listen_address(), b"ping").await;

        let opened = next_event(&mut events).await;
        assert!(matches!(opened, RelayEvent::Opened { number: 1, .. }));
        match next_event(&mut events).await {
            RelayEvent::Closed { number, transfer, .. } => {
                assert_eq!(number, 1);
                assert_eq!(transfer.up, 4);
                assert_eq!(transfer.down, 4);
            }
            other => panic!("expected Closed, got {other:?}"),
        }
        session.stop().await;
    }

    /// Test: target refuses.
    /// Expected: a target-unreachable entry for that connection.
    #[tokio::test]
    async fn unreachable_target_is_logged() {
        let session = spawn_relay(dead_address().await).await;
        let mut events = session.subscribe();

        let _client = TcpStream::connect(session.listen_address()).await.unwrap();

        let mut saw_failure = false;
        for _ in 0..2 {
            if let RelayEvent::TargetUnreachable { number, .. } = next_event(&mut events).await {
                assert_eq!(number, 1);
                saw_failure = true;
            }
        }
        assert!(saw_failure);
        session.stop().await;
    }
}

mod failures {
    use super::*;

    /// Test: target refuses the connection.
    /// Expected: that client is closed, the relay keeps listening.
    #[tokio::test]
    async fn unreachable_target_drops_only_that_connection() {
        let session = spawn_relay(dead_address().await).await;

        let mut client = TcpStream::connect(session.listen_address()).await.unwrap();
        let mut buf = [0u8; 8];
        let read = tokio::time::timeout(Duration::from_secs(2), client.read(&mut buf))
            .await
            .expect("relay should close the client");
        assert!(matches!(read, Ok(0) | Err(_)));

        let stats = wait_for(&session, |s| s.active_connections == 0).await;
        assert_eq!(stats.total_connections, 1);
        assert_eq!(stats.bytes_up, 0);
        assert!(session.is_running());

        // Still accepting.
        assert!(TcpStream::connect(session.listen_address()).await.is_ok());
        session.stop().await;
    }

    /// Test: stop the relay.
    /// Expected: the listener is gone afterwards.
    #[tokio::test]
    async fn stop_closes_listener() {
        let session = spawn_relay(echo_server().await).await;
        let address = session.listen_address().to_string();
        echo_once(&address, b"x").await;

        let stats = session.stop().await;
        assert!(stats.total_connections >= 1);
        assert!(TcpStream::connect(&address).await.is_err());
    }

    /// Test: the link the listener is tied to goes away.
    /// Expected: the accept loop ends on its own and `closed` returns.
    #[tokio::test]
    async fn tied_listener_ends_when_link_drops() {
        let link_down = Arc::new(AtomicBool::new(false));
        let watched = Arc::clone(&link_down);
        let acceptor = TcpAcceptor::bind("127.0.0.1:0")
            .await
            .unwrap()
            .tied_to(move || watched.load(Ordering::SeqCst));
        let mut session = RelaySession::spawn(acceptor, TcpTarget::new(echo_server().await));

        echo_once(session.listen_address(), b"up").await;
        assert!(session.is_running());

        link_down.store(true, Ordering::SeqCst);
        tokio::time::timeout(Duration::from_secs(3), session.closed())
            .await
            .expect("relay should stop once its link is gone");
        assert!(!session.is_running());

        let stats = session.stop().await;
        assert_eq!(stats.total_connections, 1);
    }
}

mod forward_spec {
    use super::*;
    use sshctl::relay::{RelayErrorKind, RelayMode};

    #[test]
    fn local_mode_from_spec() {
        let spec: ForwardSpec = "8080:db.internal:5432".parse().unwrap();
        assert_eq!(
            RelayMode::from(&spec),
            RelayMode::Local {
                listen: "127.0.0.1:8080".to_string(),
                target_host: "db.internal".to_string(),
                target_port: 5432,
            }
        );
    }

    #[test]
    fn explicit_bind_address() {
        let spec: ForwardSpec = "0.0.0.0:8080:localhost:80".parse().unwrap();
        assert_eq!(spec.listen_address(), "0.0.0.0:8080");
        assert_eq!(spec.to_string(), "0.0.0.0:8080 -> localhost:80");
    }

    #[test]
    fn malformed_specs() {
        for bad in ["8080", "8080:db", "x:db:1", "8080:db:0", "1:2:3:4:5"] {
            let err = bad.parse::<ForwardSpec>().unwrap_err();
            assert_eq!(err.kind(), RelayErrorKind::InvalidSpec, "{bad}");
        }
    }
}
