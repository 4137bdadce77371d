//! Command grammar carried inside frames.
//!
//! One frame holds one command line with no trailing line terminator.
//! The first space-separated token selects the command:
//!
//! ```text
//! create_group <group> <member1,member2,...>
//! send <destination> <body...>
//! who
//! exit
//! ```
//!
//! Parsing is purely syntactic. Whether names are alphanumeric, registered,
//! or collide with each other is decided by the caller (the client's local
//! pre-checks, the server's registry).

use std::fmt;

/// Keyword for the group creation command.
pub const CREATE_GROUP: &str = "create_group";

/// Keyword for the send command (also the relay payload prefix).
pub const SEND: &str = "send";

/// Keyword for the roster query.
pub const WHO: &str = "who";

/// Keyword for leaving the relay.
pub const EXIT: &str = "exit";

/// A parsed command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Create a group named `group` containing `members` plus the requester.
    ///
    /// Members are listed as given; duplicates are collapsed later.
    CreateGroup { group: String, members: Vec<String> },

    /// Send `body` to a client or group. The body keeps its internal spacing.
    Send { dest: String, body: String },

    /// List the names of connected clients.
    Who,

    /// Leave the relay.
    Exit,

    /// Anything that does not match the grammar.
    Invalid,
}

impl Command {
    /// Parses one command line.
    ///
    /// Never fails: input that does not match the grammar becomes
    /// [`Command::Invalid`].
    pub fn parse(line: &str) -> Self {
        let (keyword, rest) = line.split_once(' ').unwrap_or((line, ""));

        match keyword {
            CREATE_GROUP => Self::parse_create_group(rest),
            SEND => Self::parse_send(rest),
            WHO => Self::Who,
            EXIT => Self::Exit,
            _ => Self::Invalid,
        }
    }

    fn parse_create_group(rest: &str) -> Self {
        let (group, members) = rest.split_once(' ').unwrap_or((rest, ""));
        if group.is_empty() {
            return Self::Invalid;
        }

        Self::CreateGroup {
            group: group.to_string(),
            members: members
                .split(',')
                .filter(|member| !member.is_empty())
                .map(str::to_string)
                .collect(),
        }
    }

    fn parse_send(rest: &str) -> Self {
        let Some((dest, body)) = rest.split_once(' ') else {
            return Self::Invalid;
        };
        // A body made only of spaces carries no token, so there is nothing to send
        if dest.is_empty() || body.trim_start_matches(' ').is_empty() {
            return Self::Invalid;
        }

        Self::Send {
            dest: dest.to_string(),
            body: body.to_string(),
        }
    }

    /// Renders the command as a frame payload.
    ///
    /// Returns `None` for [`Command::Invalid`], which is never put on the wire.
    pub fn to_payload(&self) -> Option<String> {
        match self {
            Self::CreateGroup { group, members } => {
                Some(format!("{CREATE_GROUP} {group} {}", members.join(",")))
            }
            Self::Send { dest, body } => Some(format!("{SEND} {dest} {body}")),
            Self::Who => Some(WHO.to_string()),
            Self::Exit => Some(EXIT.to_string()),
            Self::Invalid => None,
        }
    }

    /// Short name of the command kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::CreateGroup { .. } => CREATE_GROUP,
            Self::Send { .. } => SEND,
            Self::Who => WHO,
            Self::Exit => EXIT,
            Self::Invalid => "invalid",
        }
    }
}

impl From<&str> for Command {
    fn from(line: &str) -> Self {
        Self::parse(line)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_payload() {
            Some(payload) => f.write_str(&payload),
            None => f.write_str("<invalid>"),
        }
    }
}
