//! Client session: handshake and the console/server loop.
//!
//! ```text
//!   CONNECTING ──handshake ok──▶ CONNECTED ⇄ AWAITING_RESPONSE
//!        │                          │               │
//!        └──name in use──▶ CLOSED ◀─┴── exit / serverEXIT / error
//! ```
//!
//! Requests are strictly one in flight: after sending a command the session
//! reads frames until the reply arrives. Relays that arrive in the meantime
//! are shown immediately and do not count as the reply.
//!
//! **Panic-Free Policy:** This module follows the project's panic-free guidelines.
//! No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, or `todo!()`.

use std::io::Write;

use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_util::codec::{Framed, FramedRead, LinesCodec};
use tracing::{debug, info, warn};

use huddle_core::ClientName;
use huddle_protocol::command::EXIT;
use huddle_protocol::message::{Ack, HandshakeReply, ServerPush};
use huddle_protocol::{Command, FrameCodec};

use crate::config::SessionConfig;
use crate::display::Notice;
use crate::error::{Result, SessionError};
use crate::input::{prepare, Prepared};

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user typed `exit` (or closed the console).
    UserExit,

    /// The server announced it is shutting down.
    ServerShutdown,
}

impl SessionEnd {
    /// Process exit status for this outcome.
    pub fn exit_code(self) -> i32 {
        match self {
            Self::UserExit => 0,
            Self::ServerShutdown => 1,
        }
    }
}

/// What the loop should do next.
enum Step {
    Continue,
    End(SessionEnd),
}

/// A reply to a request, or the shutdown notice that pre-empted it.
enum Reply {
    Payload(String),
    Shutdown,
}

/// One client's connection to the relay.
pub struct Session<S> {
    name: ClientName,
    framed: Framed<S, FrameCodec>,
}

impl Session<TcpStream> {
    /// Opens a TCP connection to the configured server.
    pub async fn connect(config: &SessionConfig) -> Result<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))
            .await
            .map_err(|source| SessionError::Connect {
                addr: config.addr(),
                source,
            })?;
        debug!(addr = %config.addr(), "Connected to server");

        Ok(Self::new(config.name.clone(), stream))
    }
}

impl<S> Session<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wraps an established stream.
    pub fn new(name: ClientName, stream: S) -> Self {
        Self {
            name,
            framed: Framed::new(stream, FrameCodec::new()),
        }
    }

    /// The name this session registers under.
    pub fn name(&self) -> &ClientName {
        &self.name
    }

    /// Declares the client's name and waits for the server's answer.
    ///
    /// # Errors
    /// - `SessionError::NameInUse` if the server rejects the name
    /// - `SessionError::ConnectionClosed` / `Frame` on transport failure
    pub async fn handshake<W: Write>(&mut self, out: &mut W) -> Result<()> {
        self.framed.send(self.name.as_str()).await?;
        let reply = self.next_payload().await?;

        match HandshakeReply::from_payload(&reply) {
            HandshakeReply::Accepted => {
                info!(client = %self.name, "Registered with server");
                writeln!(out, "{}", Notice::Connected)?;
                Ok(())
            }
            HandshakeReply::Rejected => {
                writeln!(out, "{}", Notice::NameInUse)?;
                Err(SessionError::NameInUse(self.name.to_string()))
            }
        }
    }

    /// Runs the session until the user exits, the server shuts down, or
    /// the connection fails.
    ///
    /// End of console input is treated like typing `exit`.
    pub async fn run<C, W>(&mut self, console: C, out: &mut W) -> Result<SessionEnd>
    where
        C: AsyncRead + Unpin,
        W: Write,
    {
        let mut lines = FramedRead::new(console, LinesCodec::new());

        loop {
            let step = tokio::select! {
                line = lines.next() => match line {
                    Some(Ok(line)) => self.handle_line(&line, out).await?,
                    Some(Err(e)) => return Err(e.into()),
                    None => {
                        debug!("Console closed, leaving");
                        self.leave(out).await?
                    }
                },
                frame = self.framed.next() => match frame {
                    Some(Ok(payload)) => self.handle_push(&String::from_utf8_lossy(&payload), out)?,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Err(SessionError::ConnectionClosed),
                },
            };

            if let Step::End(end) = step {
                return Ok(end);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Console
    // ------------------------------------------------------------------------

    async fn handle_line<W: Write>(&mut self, line: &str, out: &mut W) -> Result<Step> {
        match prepare(line, &self.name) {
            Prepared::Skip => Ok(Step::Continue),
            Prepared::Rejected(notice) => {
                writeln!(out, "{notice}")?;
                Ok(Step::Continue)
            }
            Prepared::Exit => self.leave(out).await,
            Prepared::Request(command) => self.request(command, out).await,
        }
    }

    async fn request<W: Write>(&mut self, command: Command, out: &mut W) -> Result<Step> {
        let Some(payload) = command.to_payload() else {
            return Ok(Step::Continue);
        };
        debug!(command = command.kind(), "Sending request");
        self.framed.send(payload).await?;

        let reply = match self.await_reply(&command, out).await? {
            Reply::Payload(reply) => reply,
            Reply::Shutdown => return Ok(Step::End(SessionEnd::ServerShutdown)),
        };

        let notice = match command {
            Command::CreateGroup { group, .. } => {
                if Ack::from_payload(&reply).is_success() {
                    Notice::GroupCreated { group }
                } else {
                    Notice::GroupFailed { group }
                }
            }
            Command::Send { .. } => {
                if Ack::from_payload(&reply).is_success() {
                    Notice::Sent
                } else {
                    Notice::SendFailed
                }
            }
            Command::Who => Notice::Roster(reply),
            Command::Exit | Command::Invalid => return Ok(Step::Continue),
        };
        writeln!(out, "{notice}")?;

        Ok(Step::Continue)
    }

    async fn leave<W: Write>(&mut self, out: &mut W) -> Result<Step> {
        self.framed.send(EXIT).await?;
        writeln!(out, "{}", Notice::Unregistered)?;
        info!(client = %self.name, "Left the relay");
        Ok(Step::End(SessionEnd::UserExit))
    }

    // ------------------------------------------------------------------------
    // Server
    // ------------------------------------------------------------------------

    /// Reads frames until the reply to the outstanding request arrives,
    /// showing any relays on the way.
    ///
    /// A roster always includes the requester, so a `who` reply equal to our
    /// own name is the roster even when that name is the shutdown sentinel.
    async fn await_reply<W: Write>(&mut self, command: &Command, out: &mut W) -> Result<Reply> {
        loop {
            let payload = self.next_payload().await?;
            if matches!(command, Command::Who) && payload == self.name.as_str() {
                return Ok(Reply::Payload(payload));
            }
            match ServerPush::classify(&payload) {
                ServerPush::Shutdown => return Ok(Reply::Shutdown),
                ServerPush::Relay { sender, body } => {
                    writeln!(out, "{}", Notice::Relay { sender, body })?;
                }
                ServerPush::Unexpected(_) => return Ok(Reply::Payload(payload)),
            }
        }
    }

    fn handle_push<W: Write>(&mut self, payload: &str, out: &mut W) -> Result<Step> {
        match ServerPush::classify(payload) {
            ServerPush::Shutdown => {
                info!("Server is shutting down");
                Ok(Step::End(SessionEnd::ServerShutdown))
            }
            ServerPush::Relay { sender, body } => {
                writeln!(out, "{}", Notice::Relay { sender, body })?;
                Ok(Step::Continue)
            }
            ServerPush::Unexpected(payload) => {
                warn!(payload = %payload, "Ignoring unexpected frame from server");
                Ok(Step::Continue)
            }
        }
    }

    async fn next_payload(&mut self) -> Result<String> {
        match self.framed.next().await {
            Some(Ok(payload)) => Ok(String::from_utf8_lossy(&payload).into_owned()),
            Some(Err(e)) => Err(e.into()),
            None => Err(SessionError::ConnectionClosed),
        }
    }
}
