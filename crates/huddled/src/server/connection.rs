//! Per-connection I/O tasks.
//!
//! Each accepted connection is split into two tasks:
//! - a reader that decodes frames with [`FrameCodec`] and forwards them to
//!   the dispatcher as [`ConnectionEvent`]s
//! - a writer that drains the connection's outbox into the socket
//!
//! The dispatcher never touches a socket directly. It holds a
//! [`ConnectionHandle`] and queues payloads into the outbox, so a slow peer
//! only ever delays its own writer. Outboxes are bounded by
//! [`OUTBOX_CAPACITY`]; a peer that lets its outbox fill up is dropped.
//!
//! # Lifecycle
//!
//! ```text
//!   accept ──▶ spawn_connection ──▶ ConnectionHandle (dispatcher)
//!                 │          │
//!                 ▼          ▼
//!            read_frames  write_frames
//!                 │          ▲
//!   Frame/Closed  │          │ outbox (mpsc::Sender<String>)
//!                 ▼          │
//!             dispatcher ────┘
//! ```
//!
//! Closing a handle cancels the reader and drops the outbox sender. The
//! writer then flushes whatever is still queued, shuts down the write half,
//! and exits. A full outbox aborts both tasks without flushing, and the
//! reader reports the connection as closed.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Channel send failures mean the other side is gone and end the task

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinSet;
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use huddle_protocol::{FrameCodec, FrameError};

/// Payloads a connection may have queued before it counts as stalled.
pub const OUTBOX_CAPACITY: usize = 256;

/// Server-assigned identifier of one accepted connection.
pub type ConnectionId = u64;

/// Something that happened on a connection, reported by its reader task.
#[derive(Debug)]
pub enum ConnectionEvent {
    /// A complete frame arrived.
    Frame {
        /// Connection the frame arrived on
        id: ConnectionId,
        /// Raw frame payload
        payload: Bytes,
    },

    /// The connection ended. `error` is `None` for a clean close.
    Closed {
        /// Connection that ended
        id: ConnectionId,
        /// Framing or I/O failure, if any
        error: Option<FrameError>,
    },
}

impl ConnectionEvent {
    /// The connection this event belongs to.
    pub fn id(&self) -> ConnectionId {
        match self {
            Self::Frame { id, .. } | Self::Closed { id, .. } => *id,
        }
    }
}

// ============================================================================
// Connection Handle
// ============================================================================

/// The dispatcher's end of a connection.
///
/// Deliberately not `Clone`: dropping the single handle is what lets the
/// writer task finish.
#[derive(Debug)]
pub struct ConnectionHandle {
    id: ConnectionId,
    outbox: mpsc::Sender<String>,
    cancel: CancellationToken,
    abort: CancellationToken,
}

impl ConnectionHandle {
    /// Wraps an outbox and the reader's cancellation token.
    pub fn new(id: ConnectionId, outbox: mpsc::Sender<String>, cancel: CancellationToken) -> Self {
        Self::with_abort(id, outbox, cancel, CancellationToken::new())
    }

    fn with_abort(
        id: ConnectionId,
        outbox: mpsc::Sender<String>,
        cancel: CancellationToken,
        abort: CancellationToken,
    ) -> Self {
        Self {
            id,
            outbox,
            cancel,
            abort,
        }
    }

    /// Connection identifier.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Queues one frame payload for the writer.
    ///
    /// Returns false if the writer has already stopped, or if the outbox is
    /// full. A full outbox aborts the connection.
    pub fn send(&self, payload: impl Into<String>) -> bool {
        match self.outbox.try_send(payload.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                warn!(connection = self.id, "Outbox full, dropping connection");
                self.abort.cancel();
                self.cancel.cancel();
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }


    /// Stops the reader and releases the outbox.
    ///
    /// Payloads queued before this call are still written.
    pub fn close(self) {
        self.cancel.cancel();
    }
}

// ============================================================================
// Tasks
// ============================================================================

/// Spawns the reader and writer tasks for one connection onto `tasks`.
///
/// Generic over the stream halves so tests can drive a connection over an
/// in-memory duplex pipe.
pub fn spawn_connection<R, W>(
    id: ConnectionId,
    reader: R,
    writer: W,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    tasks: &mut JoinSet<()>,
) -> ConnectionHandle
where
    R: AsyncRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let (outbox_tx, outbox_rx) = mpsc::channel(OUTBOX_CAPACITY);
    let cancel = CancellationToken::new();
    let abort = CancellationToken::new();

    tasks.spawn(read_frames(
        id,
        FramedRead::new(reader, FrameCodec::new()),
        events,
        cancel.clone(),
    ));
    tasks.spawn(write_frames(
        id,
        FramedWrite::new(writer, FrameCodec::new()),
        outbox_rx,
        abort.clone(),
    ));

    ConnectionHandle::with_abort(id, outbox_tx, cancel, abort)
}

/// Forwards decoded frames to the dispatcher until the peer goes away or
/// the connection is closed by the server. Either way the dispatcher gets a
/// final `Closed` event.
async fn read_frames<R>(
    id: ConnectionId,
    mut frames: FramedRead<R, FrameCodec>,
    events: mpsc::UnboundedSender<ConnectionEvent>,
    cancel: CancellationToken,
) where
    R: AsyncRead + Unpin,
{
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!(connection = id, "Reader cancelled");
                ConnectionEvent::Closed { id, error: None }
            }
            frame = frames.next() => match frame {
                Some(Ok(payload)) => ConnectionEvent::Frame { id, payload },
                Some(Err(e)) => ConnectionEvent::Closed { id, error: Some(e) },
                None => ConnectionEvent::Closed { id, error: None },
            },
        };

        let closed = matches!(event, ConnectionEvent::Closed { .. });
        if events.send(event).is_err() {
            // Dispatcher gone
            return;
        }
        if closed {
            return;
        }
    }
}

/// Writes queued payloads until every sender is dropped, then shuts down
/// the write half. Stops at once, without flushing, when aborted.
async fn write_frames<W>(
    id: ConnectionId,
    mut sink: FramedWrite<W, FrameCodec>,
    mut outbox: mpsc::Receiver<String>,
    abort: CancellationToken,
) where
    W: AsyncWrite + Unpin,
{
    loop {
        let payload = tokio::select! {
            _ = abort.cancelled() => {
                debug!(connection = id, "Writer aborted");
                return;
            }
            payload = outbox.recv() => match payload {
                Some(payload) => payload,
                None => break,
            },
        };

        let result = tokio::select! {
            _ = abort.cancelled() => {
                debug!(connection = id, "Writer aborted");
                return;
            }
            result = sink.send(payload) => result,
        };

        match result {
            Ok(()) => {}
            Err(FrameError::TooLong { len }) => {
                // Nothing was written for this payload; the stream is intact
                warn!(connection = id, len, "Dropping payload too long to frame");
            }
            Err(e) => {
                debug!(connection = id, error = %e, "Write failed, stopping writer");
                return;
            }
        }
    }

    if let Err(e) = SinkExt::<String>::close(&mut sink).await {
        debug!(connection = id, error = %e, "Failed to shut down write half");
    }
    debug!(connection = id, "Writer finished");
}
