//! Reserved payloads exchanged outside the command grammar.
//!
//! These are matched as whole frame payloads, never parsed as commands:
//!
//! | payload          | direction        | meaning                              |
//! |------------------|------------------|--------------------------------------|
//! | `0`              | server -> client | request succeeded (registration ack) |
//! | `1`              | server -> client | request failed                       |
//! | `dupConnection`  | server -> client | name rejected at handshake           |
//! | `serverEXIT`     | server -> client | server is shutting down              |
//! | `send <s> <body>`| server -> client | relay of a message from `<s>`        |

use huddle_core::ClientName;

use crate::command::{Command, SEND};

/// Payload acknowledging a successful request.
pub const ACK_SUCCESS: &str = "0";

/// Payload reporting a failed request.
pub const ACK_FAILURE: &str = "1";

/// Payload rejecting a handshake because the name is taken.
pub const DUPLICATE_NAME: &str = "dupConnection";

/// Payload pushed to every client when the server shuts down.
pub const SERVER_SHUTDOWN: &str = "serverEXIT";

// ============================================================================
// Acknowledgements
// ============================================================================

/// Outcome reported to a requester for `create_group` and `send`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    Success,
    Failure,
}

impl Ack {
    /// The frame payload for this ack.
    pub fn as_payload(self) -> &'static str {
        match self {
            Self::Success => ACK_SUCCESS,
            Self::Failure => ACK_FAILURE,
        }
    }

    /// Interprets a response payload. Anything but the success code is a failure.
    pub fn from_payload(payload: &str) -> Self {
        if payload == ACK_SUCCESS {
            Self::Success
        } else {
            Self::Failure
        }
    }

    /// Returns true for [`Ack::Success`].
    #[must_use]
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

impl From<bool> for Ack {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

// ============================================================================
// Handshake
// ============================================================================

/// Server's answer to a client's declared name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeReply {
    Accepted,
    Rejected,
}

impl HandshakeReply {
    /// The frame payload for this reply.
    pub fn as_payload(self) -> &'static str {
        match self {
            Self::Accepted => ACK_SUCCESS,
            Self::Rejected => DUPLICATE_NAME,
        }
    }

    /// Interprets the handshake response. Only the rejection sentinel rejects.
    pub fn from_payload(payload: &str) -> Self {
        if payload == DUPLICATE_NAME {
            Self::Rejected
        } else {
            Self::Accepted
        }
    }
}

// ============================================================================
// Relays and server pushes
// ============================================================================

/// Builds the payload relayed to recipients of a message from `sender`.
///
/// The payload reuses the `send` grammar with the sender in the destination
/// slot, so receivers parse it with [`Command::parse`].
pub fn relay_payload(sender: &ClientName, body: &str) -> String {
    format!("{SEND} {sender} {body}")
}

/// A frame the server pushed without being asked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerPush {
    /// The server is shutting down.
    Shutdown,

    /// A message relayed from another client.
    Relay { sender: String, body: String },

    /// Anything else; not expected outside a request.
    Unexpected(String),
}

impl ServerPush {
    /// Classifies an unsolicited frame payload.
    pub fn classify(payload: &str) -> Self {
        if payload == SERVER_SHUTDOWN {
            return Self::Shutdown;
        }

        match Command::parse(payload) {
            Command::Send { dest, body } => Self::Relay { sender: dest, body },
            _ => Self::Unexpected(payload.to_string()),
        }
    }
}
