//! Console input handling.
//!
//! Each console line is parsed with the shared command grammar and checked
//! locally before anything is sent, so requests that cannot succeed never
//! cost a round trip.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

use huddle_core::{is_valid_name, ClientName};
use huddle_protocol::{Command, MAX_FRAME_LEN};

use crate::display::Notice;

// ============================================================================
// Prepared Input
// ============================================================================

/// What to do with one console line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Prepared {
    /// Empty line; nothing to do.
    Skip,

    /// Send this command and wait for the reply.
    Request(Command),

    /// Send `exit` and end the session.
    Exit,

    /// Refused locally; show the notice without contacting the server.
    Rejected(Notice),
}

/// Validates one console line for the client named `me`.
pub fn prepare(line: &str, me: &ClientName) -> Prepared {
    if line.is_empty() {
        return Prepared::Skip;
    }

    match Command::parse(line) {
        Command::CreateGroup { group, members } => {
            if group_is_valid(&group, &members, me) {
                let command = Command::CreateGroup {
                    group: group.clone(),
                    members,
                };
                if fits_in_frame(&command) {
                    return Prepared::Request(command);
                }
            }
            Prepared::Rejected(Notice::GroupFailed { group })
        }
        Command::Send { dest, body } => {
            let valid = is_valid_name(&dest) && dest != me.as_str();
            let command = Command::Send { dest, body };
            if valid && fits_in_frame(&command) {
                Prepared::Request(command)
            } else {
                Prepared::Rejected(Notice::SendFailed)
            }
        }
        Command::Who => Prepared::Request(Command::Who),
        Command::Exit => Prepared::Exit,
        Command::Invalid => Prepared::Rejected(Notice::InvalidInput),
    }
}

fn fits_in_frame(command: &Command) -> bool {
    command
        .to_payload()
        .is_some_and(|payload| payload.len() <= MAX_FRAME_LEN)
}

/// Group name and every member alphanumeric, no member named like the
/// group, and at least one member other than `me`.
fn group_is_valid(group: &str, members: &[String], me: &ClientName) -> bool {
    if !is_valid_name(group) || members.is_empty() {
        return false;
    }

    let mut has_other = false;
    for member in members {
        if !is_valid_name(member) || member == group {
            return false;
        }
        if member != me.as_str() {
            has_other = true;
        }
    }
    has_other
}
