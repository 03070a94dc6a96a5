// ABOUTME: Integration tests for the SSH module.
// ABOUTME: Local failure paths always run; live tests need SSHCTL_TEST_HOST and skip otherwise.

mod support;

use sshctl::diagnostics::Diagnostics;
use sshctl::endpoint::{CredentialHint, EndpointSpec, RelaySpec};
use sshctl::relay::{self, RelayMode};
use sshctl::ssh::{DialOptions, Dialer, Error, InstallOutcome, RelayStage};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn dead_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

fn dialer(known_hosts: &tempfile::TempDir) -> Dialer {
    Dialer::new(
        DialOptions::default()
            .known_hosts_path(known_hosts.path().join("known_hosts"))
            .connect_timeout(Duration::from_secs(5))
            .allow_prompt(false),
    )
}

mod failures {
    use super::*;

    /// Test: nothing listens on the port.
    /// Expected: Dial error naming the address.
    #[tokio::test]
    async fn refused_connection_is_a_dial_error() {
        let known_hosts = tempfile::tempdir().unwrap();
        let port = dead_port().await;
        let endpoint = EndpointSpec::new("nobody", "127.0.0.1", port);

        let err = dialer(&known_hosts).dial(&endpoint, None).await.unwrap_err();
        assert!(err.is_dial_failure());
        assert!(err.to_string().contains(&format!("127.0.0.1:{port}")));
    }

    /// Test: the jump host itself is unreachable.
    /// Expected: RelayDial at the relay stage, wrapping the dial error.
    #[tokio::test]
    async fn unreachable_relay_names_relay_stage() {
        let known_hosts = tempfile::tempdir().unwrap();
        let relay = RelaySpec {
            name: "edge".to_string(),
            endpoint: EndpointSpec::new("nobody", "127.0.0.1", dead_port().await),
        };
        let endpoint = EndpointSpec::new("nobody", "10.255.255.1", 22);

        match dialer(&known_hosts).dial(&endpoint, Some(&relay)).await {
            Err(Error::RelayDial { relay, stage, source }) => {
                assert_eq!(relay, "edge");
                assert_eq!(stage, RelayStage::Relay);
                assert!(matches!(*source, Error::Dial { .. }));
            }
            other => panic!("expected RelayDial, got {:?}", other.map(|_| ())),
        }
    }

    /// Test: the peer accepts TCP but never speaks SSH.
    /// Expected: the connect timeout bounds the handshake.
    #[tokio::test]
    async fn silent_peer_times_out() {
        let known_hosts = tempfile::tempdir().unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((stream, _)) = listener.accept().await {
                held.push(stream);
            }
        });

        let dialer = Dialer::new(
            DialOptions::default()
                .known_hosts_path(known_hosts.path().join("known_hosts"))
                .connect_timeout(Duration::from_millis(300)),
        );
        let err = dialer
            .dial(&EndpointSpec::new("nobody", "127.0.0.1", port), None)
            .await
            .unwrap_err();
        assert!(err.is_dial_failure());
        assert!(err.to_string().contains("timed out"));
    }
}

/// Live tests against the server named by SSHCTL_TEST_HOST.
mod live {
    use super::*;

    fn endpoint(target: &support::LiveTarget) -> EndpointSpec {
        EndpointSpec::new(&target.user, &target.host, target.port)
            .with_hints(vec![CredentialHint::KeyFile(target.key.clone())])
    }

    macro_rules! live_target {
        () => {
            match support::live_target() {
                Some(target) => target,
                None => {
                    eprintln!("SSHCTL_TEST_HOST not set, skipping");
                    return;
                }
            }
        };
    }

    /// Test: run `echo hello`.
    /// Expected: "hello", exit 0.
    #[tokio::test]
    async fn execute_echo() {
        support::init_tracing();
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = dialer(&known_hosts).dial(&endpoint(&target), None).await.unwrap();
        let output = conn.exec("echo hello").await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
        conn.close().await.unwrap();
    }

    /// Test: nonzero exit with stderr.
    /// Expected: status kept, stdout then stderr in combined output.
    #[tokio::test]
    async fn nonzero_exit_is_not_an_error() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = dialer(&known_hosts).dial(&endpoint(&target), None).await.unwrap();
        let output = conn.exec("echo out; echo err >&2; exit 7").await.unwrap();
        assert_eq!(output.exit_status, 7);
        assert_eq!(output.combined(), "out\nerr\n");
        conn.close().await.unwrap();
    }

    /// Test: streaming execution outlives the batch command timeout.
    /// Expected: output written to the sinks, status returned.
    #[tokio::test]
    async fn streaming_exec_ignores_command_timeout() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = Dialer::new(
            DialOptions::default()
                .known_hosts_path(known_hosts.path().join("known_hosts"))
                .command_timeout(Duration::from_millis(100))
                .allow_prompt(false),
        )
        .dial(&endpoint(&target), None)
        .await
        .unwrap();

        let mut out = Vec::new();
        let mut err = Vec::new();
        let status = conn
            .exec_streaming("sleep 1; echo tick; echo tock >&2; exit 2", &mut out, &mut err)
            .await
            .unwrap();
        assert_eq!(status, 2);
        assert_eq!(out, b"tick\n");
        assert_eq!(err, b"tock\n");
        conn.close().await.unwrap();
    }

    /// Test: command longer than its timeout.
    #[tokio::test]
    async fn command_timeout() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = dialer(&known_hosts).dial(&endpoint(&target), None).await.unwrap();
        let err = conn
            .exec_with_timeout("sleep 5", Duration::from_millis(200))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout(_)));
    }

    /// Test: no usable credentials.
    /// Expected: AuthExhausted with the password hint.
    #[tokio::test]
    async fn no_credentials_exhausts_auth() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let endpoint = EndpointSpec::new(&target.user, &target.host, target.port);
        let err = dialer(&known_hosts).dial(&endpoint, None).await.unwrap_err();
        assert!(matches!(err, Error::AuthExhausted { .. }));
        assert!(err.to_string().contains("--ask-password"));
    }

    /// Test: the server is its own jump host.
    /// Expected: commands run through the relay.
    #[tokio::test]
    async fn dial_through_relay() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();
        let relay = RelaySpec {
            name: "self".to_string(),
            endpoint: endpoint(&target),
        };
        let inner = EndpointSpec::new(&target.user, "127.0.0.1", 22)
            .with_hints(vec![CredentialHint::KeyFile(target.key.clone())]);

        let conn = dialer(&known_hosts).dial(&inner, Some(&relay)).await.unwrap();
        assert_eq!(conn.exec("echo via").await.unwrap().stdout.trim(), "via");
        assert_eq!(conn.relay_closed(), Some(false));
        conn.close().await.unwrap();
    }

    /// Test: installing the key that was just used to log in.
    /// Expected: already present.
    #[tokio::test]
    async fn key_install_is_idempotent() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = dialer(&known_hosts).dial(&endpoint(&target), None).await.unwrap();
        let mut diag = Diagnostics::default();
        let outcome = sshctl::ssh::ensure_public_key(&conn, &mut diag).await;
        assert!(matches!(
            outcome,
            InstallOutcome::AlreadyPresent | InstallOutcome::Installed | InstallOutcome::Skipped
        ));
        assert!(!diag.has_warnings());
    }

    /// Test: local forward to the server's own SSH port.
    /// Expected: the SSH banner comes back through the relay.
    #[tokio::test]
    async fn local_forward_reaches_remote_port() {
        let target = live_target!();
        let known_hosts = tempfile::tempdir().unwrap();

        let conn = dialer(&known_hosts).dial(&endpoint(&target), None).await.unwrap();
        let mode = RelayMode::Local {
            listen: "127.0.0.1:0".to_string(),
            target_host: "127.0.0.1".to_string(),
            target_port: 22,
        };
        let session = relay::start(conn, mode).await.unwrap();

        let mut client = TcpStream::connect(session.listen_address()).await.unwrap();
        let mut banner = [0u8; 4];
        client.read_exact(&mut banner).await.unwrap();
        assert_eq!(&banner, b"SSH-");
        client.shutdown().await.unwrap();
        drop(client);

        let stats = session.stop().await;
        assert_eq!(stats.total_connections, 1);
    }
}
