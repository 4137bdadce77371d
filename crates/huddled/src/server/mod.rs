//! TCP relay server.
//!
//! The server:
//! - Listens on a TCP port for client connections
//! - Spawns reader/writer tasks for each connection
//! - Reads shutdown commands from the operator console
//! - Feeds everything into one [`Dispatcher`], one event at a time
//! - Supports graceful shutdown via CancellationToken
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                ChatServer::run               │
//! │                                              │
//! │  select! {                                   │
//! │    cancel_token.cancelled()  ──▶ shutdown    │
//! │    listener.accept()         ──▶ admit       │
//! │    console line              ──▶ keyword?    │
//! │    ConnectionEvent           ──▶ dispatch    │
//! │    finished task             ──▶ reap        │
//! │  }                                           │
//! └──────────────────────────────────────────────┘
//! ```
//!
//! On shutdown every client is sent the shutdown notice, every connection
//! is closed, and writers get the configured grace period to flush.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Bind, accept and console failures are returned as [`ServerError`]

mod connection;

pub use connection::{
    spawn_connection, ConnectionEvent, ConnectionHandle, ConnectionId, OUTBOX_CAPACITY,
};

use std::net::SocketAddr;

use futures::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ServerConfig;
use crate::dispatcher::{Dispatcher, Flow};

/// Relay server bound to a TCP listener.
pub struct ChatServer {
    /// Bound listener
    listener: TcpListener,

    /// Server settings
    config: ServerConfig,

    /// Cancellation token for graceful shutdown
    cancel_token: CancellationToken,
}

impl ChatServer {
    /// Binds the listener described by `config`.
    pub async fn bind(
        config: ServerConfig,
        cancel_token: CancellationToken,
    ) -> Result<Self, ServerError> {
        let addr = config.bind_addr();
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;

        Ok(Self {
            listener,
            config,
            cancel_token,
        })
    }

    /// Address the listener is actually bound to.
    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        self.listener.local_addr().map_err(ServerError::LocalAddr)
    }

    /// Runs the server until the shutdown keyword is read from `console`,
    /// the cancellation token fires, or a fatal error occurs.
    ///
    /// When `console` reaches end of input the server keeps running and
    /// only the cancellation token can stop it.
    pub async fn run<C>(self, console: C) -> Result<(), ServerError>
    where
        C: AsyncRead + Unpin,
    {
        let Self {
            listener,
            config,
            cancel_token,
        } = self;

        if let Ok(addr) = listener.local_addr() {
            info!(addr = %addr, "Relay server listening");
        }

        let mut console = FramedRead::new(console, LinesCodec::new());
        let mut console_open = true;
        let (event_tx, mut event_rx) = mpsc::unbounded_channel();
        let mut tasks = JoinSet::new();
        let mut dispatcher = Dispatcher::new(config.shutdown_keyword.as_str());
        let mut next_id: ConnectionId = 0;

        let outcome = loop {
            tokio::select! {
                _ = cancel_token.cancelled() => {
                    info!("Server shutdown requested");
                    break Ok(());
                }

                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let id = next_id;
                            next_id += 1;
                            debug!(connection = id, peer = %peer, "Accepted connection");
                            let (reader, writer) = stream.into_split();
                            let handle =
                                spawn_connection(id, reader, writer, event_tx.clone(), &mut tasks);
                            dispatcher.admit(handle);
                        }
                        Err(e) => {
                            error!(error = %e, "Failed to accept connection");
                            break Err(ServerError::Accept(e));
                        }
                    }
                }

                line = console.next(), if console_open => {
                    match line {
                        Some(Ok(line)) => {
                            if dispatcher.handle_console_line(&line) == Flow::Shutdown {
                                break Ok(());
                            }
                        }
                        Some(Err(e)) => {
                            error!(error = %e, "Failed to read operator console");
                            break Err(ServerError::Console(e));
                        }
                        None => {
                            info!("Operator console closed");
                            console_open = false;
                        }
                    }
                }

                Some(event) = event_rx.recv() => {
                    dispatcher.handle_event(event);
                }

                Some(joined) = tasks.join_next(), if !tasks.is_empty() => {
                    if let Err(e) = joined {
                        warn!(error = %e, "Connection task failed");
                    }
                }
            }
        };

        drop(listener);
        dispatcher.shutdown();
        drain_tasks(&mut tasks, &config).await;

        info!("Relay server stopped");
        outcome
    }
}

/// Waits for connection tasks to finish, aborting whatever is left once the
/// grace period runs out.
async fn drain_tasks(tasks: &mut JoinSet<()>, config: &ServerConfig) {
    let grace = config.shutdown_grace();
    let drained = timeout(grace, async {
        while tasks.join_next().await.is_some() {}
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = tasks.len(),
            grace_ms = config.shutdown_grace_ms,
            "Connections did not drain in time, aborting"
        );
        tasks.shutdown().await;
    }
}

/// Errors that can occur in server operations.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read listener address: {0}")]
    LocalAddr(#[source] std::io::Error),

    #[error("Failed to accept connection: {0}")]
    Accept(#[source] std::io::Error),

    #[error("Failed to read operator console: {0}")]
    Console(#[source] LinesCodecError),
}
