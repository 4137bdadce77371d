//! Console messages shown to the user.

use std::fmt;

/// One line of client output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Connected,
    NameInUse,
    ConnectFailed,
    GroupCreated { group: String },
    GroupFailed { group: String },
    Sent,
    SendFailed,
    Roster(String),
    Unregistered,
    Relay { sender: String, body: String },
    InvalidInput,
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connected => f.write_str("Connected Successfully."),
            Self::NameInUse => f.write_str("Client name is already in use."),
            Self::ConnectFailed => f.write_str("Failed to connect the server"),
            Self::GroupCreated { group } => write!(f, "Group \"{group}\" was created successfully."),
            Self::GroupFailed { group } => write!(f, "ERROR: failed to create group \"{group}\"."),
            Self::Sent => f.write_str("Sent successfully."),
            Self::SendFailed => f.write_str("ERROR: failed to send."),
            Self::Roster(names) => f.write_str(names),
            Self::Unregistered => f.write_str("Unregistered successfully."),
            Self::Relay { sender, body } => write!(f, "{sender}: {body}"),
            Self::InvalidInput => f.write_str("ERROR: Invalid input."),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_notices() {
        let group = "team".to_string();
        assert_eq!(
            Notice::GroupCreated { group: group.clone() }.to_string(),
            "Group \"team\" was created successfully."
        );
        assert_eq!(
            Notice::GroupFailed { group }.to_string(),
            "ERROR: failed to create group \"team\"."
        );
    }

    #[test]
    fn test_relay_notice() {
        let notice = Notice::Relay {
            sender: "bob".to_string(),
            body: "hi  there".to_string(),
        };
        assert_eq!(notice.to_string(), "bob: hi  there");
    }

    #[test]
    fn test_roster_printed_verbatim() {
        assert_eq!(Notice::Roster("alice,bob".to_string()).to_string(), "alice,bob");
    }
}
