//! Operator console output.
//!
//! These lines form the server's user-facing transcript on stdout, one per
//! handled request. Diagnostics go through `tracing` to stderr instead.

use std::fmt;

/// One line of the operator transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleLine<'a> {
    Connected { client: &'a str },
    GroupCreated { client: &'a str, group: &'a str },
    GroupFailed { client: &'a str, group: &'a str },
    Sent { client: &'a str, body: &'a str, dest: &'a str },
    SendFailed { client: &'a str, body: &'a str, dest: &'a str },
    RosterRequested { client: &'a str },
    Unregistered { client: &'a str },
    ShuttingDown { keyword: &'a str },
}

impl fmt::Display for ConsoleLine<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected { client } => write!(f, "{client} connected."),
            Self::GroupCreated { client, group } => {
                write!(f, "{client}: Group \"{group}\" was created successfully.")
            }
            Self::GroupFailed { client, group } => {
                write!(f, "{client}: ERROR: failed to create group \"{group}\"")
            }
            Self::Sent { client, body, dest } => {
                write!(f, "{client}: \"{body}\" was sent successfully to {dest}.")
            }
            Self::SendFailed { client, body, dest } => {
                write!(f, "{client}: ERROR: failed to send \"{body}\" to {dest}.")
            }
            Self::RosterRequested { client } => {
                write!(f, "{client}: Requests the currently connected client names.")
            }
            Self::Unregistered { client } => write!(f, "{client}: Unregistered successfully."),
            Self::ShuttingDown { keyword } => {
                write!(f, "{keyword} command is typed: server is shutting down")
            }
        }
    }
}

/// Prints a transcript line to stdout.
pub fn show(line: ConsoleLine<'_>) {
    println!("{line}");
}
