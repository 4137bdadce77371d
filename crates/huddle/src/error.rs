//! Error types for the huddle client.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io;

use huddle_protocol::FrameError;
use thiserror::Error;
use tokio_util::codec::LinesCodecError;

// ============================================================================
// Session Error Type
// ============================================================================

/// Errors that end a client session.
///
/// A server-initiated shutdown is not an error; it is reported as
/// [`SessionEnd::ServerShutdown`](crate::session::SessionEnd).
#[derive(Error, Debug)]
pub enum SessionError {
    /// Could not open the TCP connection.
    #[error("Failed to connect to {addr}: {source}")]
    Connect {
        /// Address that was dialled
        addr: String,
        #[source]
        source: io::Error,
    },

    /// The server refused the client's name at the handshake.
    #[error("Client name {0} is already in use")]
    NameInUse(String),

    /// The server closed the connection without a shutdown notice.
    #[error("Server closed the connection")]
    ConnectionClosed,

    /// A frame could not be read or written.
    #[error("Framing error: {0}")]
    Frame(#[from] FrameError),

    /// Reading the console failed.
    #[error("Console error: {0}")]
    Console(#[from] LinesCodecError),

    /// Writing to the console failed.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

// ============================================================================
// Result Type Alias
// ============================================================================

/// Convenience Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;
