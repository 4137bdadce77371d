//! Event dispatcher: the single owner of registry state.
//!
//! The server loop feeds three kinds of input into the dispatcher:
//! - newly accepted connections ([`Dispatcher::admit`])
//! - connection events from reader tasks ([`Dispatcher::handle_event`])
//! - operator console lines ([`Dispatcher::handle_console_line`])
//!
//! Every input is handled to completion before the next one is taken.
//! For a `send`, relay frames are queued to all recipients first, then the
//! requester's ack, so a request never observes a half-applied state.
//!
//! # Connection states
//!
//! ```text
//!   admit ──▶ pending ──name frame──▶ registered ──exit / close──▶ gone
//!                │                        │
//!                └──rejected──▶ gone      └──shutdown──▶ gone
//! ```
//!
//! All methods are synchronous so tests can drive the dispatcher directly
//! with in-memory outboxes.

use std::collections::HashMap;

use bytes::Bytes;
use tracing::{debug, info, warn};

use huddle_core::ClientName;
use huddle_protocol::message::{Ack, HandshakeReply, SERVER_SHUTDOWN};
use huddle_protocol::Command;

use crate::display::{self, ConsoleLine};
use crate::registry::{Registry, Rejected};
use crate::router::route_send;
use crate::server::{ConnectionEvent, ConnectionHandle, ConnectionId};

/// What the server loop should do after a console line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Applies connection and console events to the registry.
#[derive(Debug)]
pub struct Dispatcher {
    /// Registered clients and groups
    registry: Registry,

    /// Accepted connections that have not sent their name yet
    pending: HashMap<ConnectionId, ConnectionHandle>,

    /// Console line that shuts the server down
    shutdown_keyword: String,
}

impl Dispatcher {
    /// Creates a dispatcher with an empty registry.
    pub fn new(shutdown_keyword: impl Into<String>) -> Self {
        Self {
            registry: Registry::new(),
            pending: HashMap::new(),
            shutdown_keyword: shutdown_keyword.into(),
        }
    }

    /// Read access to the registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Number of connections still waiting to declare a name.
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Takes ownership of a freshly accepted connection.
    ///
    /// Its first frame is treated as the client's name.
    pub fn admit(&mut self, handle: ConnectionHandle) {
        debug!(connection = handle.id(), "Awaiting client name");
        self.pending.insert(handle.id(), handle);
    }

    /// Handles one event from a connection's reader task.
    pub fn handle_event(&mut self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Frame { id, payload } => self.handle_frame(id, payload),
            ConnectionEvent::Closed { id, error } => {
                if let Some(e) = error {
                    debug!(connection = id, error = %e, "Connection failed");
                }
                self.handle_closed(id);
            }
        }
    }

    /// Handles one operator console line.
    ///
    /// Only the shutdown keyword has an effect; the caller is expected to
    /// call [`Dispatcher::shutdown`] when this returns [`Flow::Shutdown`].
    pub fn handle_console_line(&mut self, line: &str) -> Flow {
        if line == self.shutdown_keyword {
            display::show(ConsoleLine::ShuttingDown {
                keyword: &self.shutdown_keyword,
            });
            Flow::Shutdown
        } else {
            debug!(line, "Ignoring console input");
            Flow::Continue
        }
    }

    /// Notifies every client that the server is going away and closes all
    /// connections, pending ones included.
    ///
    /// Returns the number of clients that were notified.
    pub fn shutdown(&mut self) -> usize {
        let clients = self.registry.drain_clients();
        let notified = clients.len();

        for (client, handle) in clients {
            if !handle.send(SERVER_SHUTDOWN) {
                debug!(client = %client, "Client writer already stopped");
            }
            handle.close();
        }
        for (_, handle) in self.pending.drain() {
            handle.close();
        }

        info!(clients = notified, "All connections closed");
        notified
    }

    // ------------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------------

    fn handle_frame(&mut self, id: ConnectionId, payload: Bytes) {
        if let Some(handle) = self.pending.remove(&id) {
            self.handle_handshake(handle, &payload);
            return;
        }

        let Some(client) = self.registry.client_of(id).cloned() else {
            // Frames already in flight when the connection was unregistered
            debug!(connection = id, "Dropping frame from closed connection");
            return;
        };

        let command = match std::str::from_utf8(&payload) {
            Ok(text) => Command::parse(text),
            Err(_) => Command::Invalid,
        };
        debug!(client = %client, command = command.kind(), "Handling command");

        self.handle_command(id, &client, command);
    }

    fn handle_handshake(&mut self, handle: ConnectionHandle, payload: &[u8]) {
        let id = handle.id();
        let name = String::from_utf8_lossy(payload);

        match self.registry.register(&name, handle) {
            Ok(client) => {
                self.reply(id, HandshakeReply::Accepted.as_payload());
                info!(client = %client, connection = id, "Client registered");
                display::show(ConsoleLine::Connected {
                    client: client.as_str(),
                });
            }
            Err(rejected) => {
                let Rejected { reason, handle } = *rejected;
                info!(connection = id, error = %reason, "Registration rejected");
                if !handle.send(HandshakeReply::Rejected.as_payload()) {
                    debug!(connection = id, "Writer already stopped before rejection");
                }
                handle.close();
            }
        }
    }

    fn handle_command(&mut self, id: ConnectionId, client: &ClientName, command: Command) {
        match command {
            Command::CreateGroup { group, members } => {
                let result = self.registry.create_group(client, &group, &members);
                let line = match &result {
                    Ok(_) => ConsoleLine::GroupCreated {
                        client: client.as_str(),
                        group: &group,
                    },
                    Err(e) => {
                        debug!(client = %client, error = %e, "create_group failed");
                        ConsoleLine::GroupFailed {
                            client: client.as_str(),
                            group: &group,
                        }
                    }
                };
                display::show(line);
                self.reply(id, Ack::from(result.is_ok()).as_payload());
            }
            Command::Send { dest, body } => {
                let result = route_send(&self.registry, client, &dest, &body);
                let line = match &result {
                    Ok(delivered) => {
                        debug!(client = %client, to = %dest, delivered, "Message relayed");
                        ConsoleLine::Sent {
                            client: client.as_str(),
                            body: &body,
                            dest: &dest,
                        }
                    }
                    Err(e) => {
                        debug!(client = %client, error = %e, "send failed");
                        ConsoleLine::SendFailed {
                            client: client.as_str(),
                            body: &body,
                            dest: &dest,
                        }
                    }
                };
                display::show(line);
                self.reply(id, Ack::from(result.is_ok()).as_payload());
            }
            Command::Who => {
                display::show(ConsoleLine::RosterRequested {
                    client: client.as_str(),
                });
                let roster = self.registry.roster();
                self.reply(id, roster);
            }
            Command::Exit => self.handle_closed(id),
            Command::Invalid => {
                warn!(client = %client, "Invalid command");
                self.reply(id, Ack::Failure.as_payload());
            }
        }
    }

    /// Treats a clean close, a framing error, and an explicit `exit` alike.
    fn handle_closed(&mut self, id: ConnectionId) {
        if let Some(handle) = self.pending.remove(&id) {
            debug!(connection = id, "Connection closed before registering");
            handle.close();
            return;
        }

        match self.registry.unregister(id) {
            Ok(client) => {
                info!(client = %client, connection = id, "Client left");
                display::show(ConsoleLine::Unregistered {
                    client: client.as_str(),
                });
            }
            Err(e) => debug!(error = %e, "Already unregistered"),
        }
    }

    fn reply(&self, id: ConnectionId, payload: impl Into<String>) {
        match self.registry.connection(id) {
            Some(handle) => {
                if !handle.send(payload) {
                    debug!(connection = id, "Reply dropped, writer stopped");
                }
            }
            None => debug!(connection = id, "Reply dropped, connection gone"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::OUTBOX_CAPACITY;
    use huddle_protocol::message::{ACK_FAILURE, ACK_SUCCESS, DUPLICATE_NAME};
    use tokio::sync::mpsc;
    use tokio::sync::mpsc::error::TryRecvError;
    use tokio_util::sync::CancellationToken;

    struct TestConnection {
        id: ConnectionId,
        outbox: mpsc::Receiver<String>,
        cancel: CancellationToken,
    }

    impl TestConnection {
        fn recv(&mut self) -> Option<String> {
            self.outbox.try_recv().ok()
        }

        fn drain(&mut self) -> Vec<String> {
            std::iter::from_fn(|| self.recv()).collect()
        }

        fn is_closed(&mut self) -> bool {
            self.cancel.is_cancelled()
                && matches!(self.outbox.try_recv(), Err(TryRecvError::Disconnected))
        }
    }

    fn create_dispatcher() -> Dispatcher {
        Dispatcher::new("EXIT")
    }

    fn connect(dispatcher: &mut Dispatcher, id: ConnectionId) -> TestConnection {
        let (tx, rx) = mpsc::channel(OUTBOX_CAPACITY);
        let cancel = CancellationToken::new();
        dispatcher.admit(ConnectionHandle::new(id, tx, cancel.clone()));
        TestConnection {
            id,
            outbox: rx,
            cancel,
        }
    }

    fn frame(conn: &TestConnection, text: &str) -> ConnectionEvent {
        ConnectionEvent::Frame {
            id: conn.id,
            payload: Bytes::copy_from_slice(text.as_bytes()),
        }
    }

    fn register(dispatcher: &mut Dispatcher, id: ConnectionId, name: &str) -> TestConnection {
        let mut conn = connect(dispatcher, id);
        dispatcher.handle_event(frame(&conn, name));
        assert_eq!(conn.recv().as_deref(), Some(ACK_SUCCESS));
        conn
    }

    #[test]
    fn test_handshake_registers_client() {
        let mut dispatcher = create_dispatcher();
        let mut conn = connect(&mut dispatcher, 1);
        assert_eq!(dispatcher.pending_count(), 1);

        dispatcher.handle_event(frame(&conn, "alice"));

        assert_eq!(conn.recv().as_deref(), Some("0"));
        assert_eq!(dispatcher.pending_count(), 0);
        assert!(dispatcher.registry().is_client("alice"));
    }

    #[test]
    fn test_duplicate_name_rejected_and_closed() {
        let mut dispatcher = create_dispatcher();
        let mut first = register(&mut dispatcher, 1, "alice");
        let mut second = connect(&mut dispatcher, 2);

        dispatcher.handle_event(frame(&second, "alice"));

        assert_eq!(second.recv().as_deref(), Some(DUPLICATE_NAME));
        assert!(second.is_closed());
        assert_eq!(dispatcher.registry().client_count(), 1);

        // First client still usable
        dispatcher.handle_event(frame(&first, "who"));
        assert_eq!(first.recv().as_deref(), Some("alice"));
    }

    #[test]
    fn test_invalid_name_rejected() {
        let mut dispatcher = create_dispatcher();
        let mut conn = connect(&mut dispatcher, 1);

        dispatcher.handle_event(frame(&conn, "not valid"));

        assert_eq!(conn.recv().as_deref(), Some(DUPLICATE_NAME));
        assert!(conn.is_closed());
        assert_eq!(dispatcher.registry().client_count(), 0);
    }

    #[test]
    fn test_create_group_replies() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let _bob = register(&mut dispatcher, 2, "bob");

        dispatcher.handle_event(frame(&alice, "create_group team bob"));
        assert_eq!(alice.recv().as_deref(), Some(ACK_SUCCESS));

        dispatcher.handle_event(frame(&alice, "create_group team bob"));
        assert_eq!(alice.recv().as_deref(), Some(ACK_FAILURE));

        dispatcher.handle_event(frame(&alice, "create_group solo alice"));
        assert_eq!(alice.recv().as_deref(), Some(ACK_FAILURE));
        assert_eq!(dispatcher.registry().group_count(), 1);
    }

    #[test]
    fn test_send_relays_before_ack() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let mut bob = register(&mut dispatcher, 2, "bob");

        dispatcher.handle_event(frame(&alice, "send bob hello  bob"));

        assert_eq!(bob.drain(), vec!["send alice hello  bob"]);
        assert_eq!(alice.drain(), vec![ACK_SUCCESS]);
    }

    #[test]
    fn test_send_unknown_fails() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let mut bob = register(&mut dispatcher, 2, "bob");

        dispatcher.handle_event(frame(&alice, "send zoe hi"));

        assert_eq!(alice.drain(), vec![ACK_FAILURE]);
        assert!(bob.drain().is_empty());
    }

    #[test]
    fn test_send_too_long_to_relay_fails() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let mut b = register(&mut dispatcher, 2, "b");
        let request = format!("send b {}", "x".repeat(9992));
        assert_eq!(request.len(), 9999);

        dispatcher.handle_event(frame(&alice, &request));

        assert_eq!(alice.drain(), vec![ACK_FAILURE]);
        assert!(b.drain().is_empty());
    }

    #[test]
    fn test_who_roster_excludes_groups() {
        let mut dispatcher = create_dispatcher();
        let mut carol = register(&mut dispatcher, 1, "carol");
        let _alice = register(&mut dispatcher, 2, "alice");
        let _bob = register(&mut dispatcher, 3, "bob");
        dispatcher.handle_event(frame(&carol, "create_group g1 alice"));
        carol.drain();

        dispatcher.handle_event(frame(&carol, "who"));

        assert_eq!(carol.recv().as_deref(), Some("alice,bob,carol"));
    }

    #[test]
    fn test_invalid_command_fails() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");

        dispatcher.handle_event(frame(&alice, "dance"));
        dispatcher.handle_event(ConnectionEvent::Frame {
            id: alice.id,
            payload: Bytes::from_static(&[0xff, 0xfe]),
        });

        assert_eq!(alice.drain(), vec![ACK_FAILURE, ACK_FAILURE]);
    }

    #[test]
    fn test_exit_unregisters_without_reply() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");

        dispatcher.handle_event(frame(&alice, "exit"));

        assert!(alice.is_closed());
        assert_eq!(dispatcher.registry().client_count(), 0);

        // Reader reports the close afterwards; nothing changes
        dispatcher.handle_event(ConnectionEvent::Closed {
            id: alice.id,
            error: None,
        });
        assert_eq!(dispatcher.registry().client_count(), 0);
    }

    #[test]
    fn test_framing_error_treated_as_exit() {
        let mut dispatcher = create_dispatcher();
        let alice = register(&mut dispatcher, 1, "alice");
        let mut bob = register(&mut dispatcher, 2, "bob");
        dispatcher.handle_event(frame(&bob, "create_group team alice"));
        bob.drain();

        dispatcher.handle_event(ConnectionEvent::Closed {
            id: alice.id,
            error: Some(huddle_protocol::FrameError::Truncated {
                expected: 10,
                received: 3,
            }),
        });

        assert!(!dispatcher.registry().is_client("alice"));
        let members = dispatcher.registry().group_members("team").unwrap();
        assert_eq!(members.len(), 1);
    }

    #[test]
    fn test_close_before_handshake() {
        let mut dispatcher = create_dispatcher();
        let mut conn = connect(&mut dispatcher, 1);

        dispatcher.handle_event(ConnectionEvent::Closed {
            id: conn.id,
            error: None,
        });

        assert_eq!(dispatcher.pending_count(), 0);
        assert!(conn.is_closed());
    }

    #[test]
    fn test_console_keyword() {
        let mut dispatcher = create_dispatcher();

        assert_eq!(dispatcher.handle_console_line("hello"), Flow::Continue);
        assert_eq!(dispatcher.handle_console_line("exit"), Flow::Continue);
        assert_eq!(dispatcher.handle_console_line("EXIT"), Flow::Shutdown);
    }

    #[test]
    fn test_shutdown_notifies_clients() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let mut bob = register(&mut dispatcher, 2, "bob");
        let mut pending = connect(&mut dispatcher, 3);

        assert_eq!(dispatcher.shutdown(), 2);

        assert_eq!(alice.recv().as_deref(), Some(SERVER_SHUTDOWN));
        assert_eq!(bob.recv().as_deref(), Some(SERVER_SHUTDOWN));
        assert!(alice.is_closed());
        assert!(bob.is_closed());
        assert!(pending.recv().is_none());
        assert!(pending.is_closed());
        assert_eq!(dispatcher.registry().client_count(), 0);
    }

    #[test]
    fn test_team_scenario() {
        let mut dispatcher = create_dispatcher();
        let mut alice = register(&mut dispatcher, 1, "alice");
        let mut bob = register(&mut dispatcher, 2, "bob");
        let mut carol = register(&mut dispatcher, 3, "carol");

        dispatcher.handle_event(frame(&alice, "create_group team bob,carol"));
        assert_eq!(alice.drain(), vec![ACK_SUCCESS]);

        dispatcher.handle_event(frame(&bob, "send team hi"));
        assert_eq!(alice.drain(), vec!["send bob hi"]);
        assert_eq!(carol.drain(), vec!["send bob hi"]);
        assert_eq!(bob.drain(), vec![ACK_SUCCESS]);

        dispatcher.handle_event(frame(&carol, "exit"));
        assert!(!dispatcher.registry().is_client("carol"));

        dispatcher.handle_event(frame(&bob, "send team hi2"));
        assert_eq!(alice.drain(), vec!["send bob hi2"]);
        assert_eq!(bob.drain(), vec![ACK_SUCCESS]);
    }
}
