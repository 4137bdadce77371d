//! Integration tests for the TCP relay server.
//!
//! These tests run a real `ChatServer` on an ephemeral loopback port and
//! talk to it through framed TCP clients, covering registration, groups,
//! relays, the roster, disconnects, and operator shutdown.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use huddle_protocol::message::{ACK_FAILURE, ACK_SUCCESS, DUPLICATE_NAME, SERVER_SHUTDOWN};
use huddle_protocol::FrameCodec;
use huddled::config::ServerConfig;
use huddled::server::{ChatServer, ServerError};
use tokio::io::{AsyncWriteExt, DuplexStream};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::codec::Framed;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

/// Maximum time to wait for an expected frame
const RECV_TIMEOUT: Duration = Duration::from_secs(2);

/// How long to watch for a frame that must not arrive
const SILENCE_WINDOW: Duration = Duration::from_millis(100);

/// Grace period for server shutdown
const SHUTDOWN_GRACE_PERIOD: Duration = Duration::from_secs(2);

// ============================================================================
// Test Helpers
// ============================================================================

/// Test server context that manages server lifecycle.
struct TestServer {
    addr: std::net::SocketAddr,
    console: DuplexStream,
    cancel_token: CancellationToken,
    task: JoinHandle<Result<(), ServerError>>,
}

impl TestServer {
    /// Spawns a new test server in the background.
    async fn spawn() -> Self {
        let config = ServerConfig {
            host: "127.0.0.1".to_string(),
            shutdown_grace_ms: 200,
            ..ServerConfig::default()
        };
        let cancel_token = CancellationToken::new();
        let server = ChatServer::bind(config, cancel_token.clone())
            .await
            .expect("bind test server");
        let addr = server.local_addr().expect("local addr");

        let (console, server_console) = tokio::io::duplex(256);
        let task = tokio::spawn(server.run(server_console));

        Self {
            addr,
            console,
            cancel_token,
            task,
        }
    }

    /// Opens a raw connection without registering.
    async fn connect(&self) -> TestClient {
        let stream = TcpStream::connect(self.addr).await.expect("connect to server");
        TestClient {
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// Connects and registers `name`, asserting the server accepts it.
    async fn register(&self, name: &str) -> TestClient {
        let mut client = self.connect().await;
        client.send(name).await;
        assert_eq!(client.recv().await, ACK_SUCCESS, "registering {name}");
        client
    }

    /// Types a line on the operator console.
    async fn type_console(&mut self, line: &str) {
        self.console.write_all(line.as_bytes()).await.unwrap();
        self.console.write_all(b"\n").await.unwrap();
    }

    /// Waits for the server task to finish.
    async fn join(self) -> Result<(), ServerError> {
        timeout(SHUTDOWN_GRACE_PERIOD, self.task)
            .await
            .expect("server did not stop in time")
            .expect("server task panicked")
    }

    /// Shuts down the server through the cancellation token.
    async fn shutdown(self) {
        self.cancel_token.cancel();
        self.join().await.unwrap();
    }
}

/// Test client connection speaking the framed protocol.
struct TestClient {
    framed: Framed<TcpStream, FrameCodec>,
}

impl TestClient {
    /// Sends one frame.
    async fn send(&mut self, payload: &str) {
        self.framed.send(payload).await.unwrap();
    }

    /// Receives one frame as text.
    async fn recv(&mut self) -> String {
        let frame = timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for a frame")
            .expect("connection closed")
            .expect("framing error");
        String::from_utf8(frame.to_vec()).unwrap()
    }

    /// Sends a request and returns the single reply.
    async fn request(&mut self, payload: &str) -> String {
        self.send(payload).await;
        self.recv().await
    }

    /// Asserts nothing arrives for a short while.
    async fn expect_silence(&mut self) {
        if let Ok(frame) = timeout(SILENCE_WINDOW, self.framed.next()).await {
            panic!("expected no frame, got {frame:?}");
        }
    }

    /// Asserts the server closes the connection.
    async fn expect_closed(&mut self) {
        let next = timeout(RECV_TIMEOUT, self.framed.next())
            .await
            .expect("timed out waiting for close");
        assert!(next.is_none(), "expected close, got {next:?}");
    }
}

// ============================================================================
// Registration
// ============================================================================

#[tokio::test]
async fn test_register_and_who() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;

    assert_eq!(alice.request("who").await, "alice");

    server.shutdown().await;
}

#[tokio::test]
async fn test_duplicate_name_rejected() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut imposter = server.connect().await;

    imposter.send("alice").await;

    assert_eq!(imposter.recv().await, DUPLICATE_NAME);
    imposter.expect_closed().await;

    // First client remains registered and usable
    assert_eq!(alice.request("who").await, "alice");

    server.shutdown().await;
}

#[tokio::test]
async fn test_group_name_cannot_register() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let _bob = server.register("bob").await;
    assert_eq!(alice.request("create_group team bob").await, ACK_SUCCESS);

    let mut late = server.connect().await;
    late.send("team").await;

    assert_eq!(late.recv().await, DUPLICATE_NAME);
    late.expect_closed().await;

    server.shutdown().await;
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_to_client() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;

    assert_eq!(alice.request("send bob hello   bob").await, ACK_SUCCESS);

    assert_eq!(bob.recv().await, "send alice hello   bob");
    bob.expect_silence().await;
    alice.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_send_to_unknown_fails() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;

    assert_eq!(alice.request("send zoe hi").await, ACK_FAILURE);
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_send_to_group_as_non_member_fails() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    let mut dave = server.register("dave").await;
    assert_eq!(alice.request("create_group team bob").await, ACK_SUCCESS);

    assert_eq!(dave.request("send team hi").await, ACK_FAILURE);

    alice.expect_silence().await;
    bob.expect_silence().await;

    server.shutdown().await;
}

#[tokio::test]
async fn test_invalid_command_fails() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;

    assert_eq!(alice.request("shout hello").await, ACK_FAILURE);
    assert_eq!(alice.request("create_group").await, ACK_FAILURE);

    server.shutdown().await;
}

// ============================================================================
// Roster
// ============================================================================

#[tokio::test]
async fn test_who_sorted_without_groups() {
    let server = TestServer::spawn().await;
    let mut carol = server.register("carol").await;
    let _alice = server.register("alice").await;
    let _bob = server.register("bob").await;
    assert_eq!(carol.request("create_group g1 alice,bob").await, ACK_SUCCESS);

    assert_eq!(carol.request("who").await, "alice,bob,carol");

    server.shutdown().await;
}

#[tokio::test]
async fn test_disconnect_removes_client() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let bob = server.register("bob").await;

    drop(bob);

    // Abrupt close is processed like an exit; poll until it lands
    let deadline = tokio::time::Instant::now() + RECV_TIMEOUT;
    loop {
        let roster = alice.request("who").await;
        if roster == "alice" {
            break;
        }
        assert!(tokio::time::Instant::now() < deadline, "bob never left: {roster}");
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    // Name is free again
    let _bob = server.register("bob").await;

    server.shutdown().await;
}

// ============================================================================
// End-to-end
// ============================================================================

#[tokio::test]
async fn test_team_scenario() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;
    let mut carol = server.register("carol").await;

    assert_eq!(alice.request("create_group team bob,carol").await, ACK_SUCCESS);

    assert_eq!(bob.request("send team hi").await, ACK_SUCCESS);
    assert_eq!(alice.recv().await, "send bob hi");
    assert_eq!(carol.recv().await, "send bob hi");
    bob.expect_silence().await;

    carol.send("exit").await;
    carol.expect_closed().await;
    assert_eq!(alice.request("who").await, "alice,bob");

    assert_eq!(bob.request("send team hi2").await, ACK_SUCCESS);
    assert_eq!(alice.recv().await, "send bob hi2");
    alice.expect_silence().await;

    server.shutdown().await;
}

// ============================================================================
// Shutdown
// ============================================================================

#[tokio::test]
async fn test_console_exit_notifies_clients() {
    let mut server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;
    let mut bob = server.register("bob").await;

    server.type_console("status").await;
    assert_eq!(alice.request("who").await, "alice,bob");

    server.type_console("EXIT").await;

    assert_eq!(alice.recv().await, SERVER_SHUTDOWN);
    assert_eq!(bob.recv().await, SERVER_SHUTDOWN);
    alice.expect_closed().await;
    bob.expect_closed().await;
    server.join().await.unwrap();
}

#[tokio::test]
async fn test_cancel_notifies_clients() {
    let server = TestServer::spawn().await;
    let mut alice = server.register("alice").await;

    server.shutdown().await;

    assert_eq!(alice.recv().await, SERVER_SHUTDOWN);
    alice.expect_closed().await;
}
