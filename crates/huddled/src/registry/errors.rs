//! Registry errors.

use huddle_core::DomainError;
use thiserror::Error;

use crate::server::ConnectionId;

// ============================================================================
// Registry Errors
// ============================================================================

/// Errors that can occur during registry operations.
///
/// None of these are fatal to the server. The dispatcher turns each one into
/// a failure reply for the requester, and the registry is left unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The name is already used by a connected client or by a group.
    #[error("name already in use: {0}")]
    DuplicateName(String),

    /// The name is empty or contains characters other than letters and digits.
    #[error(transparent)]
    InvalidName(#[from] DomainError),

    /// A `create_group` request did not satisfy the group rules.
    #[error("cannot create group {group}: {reason}")]
    InvalidGroup {
        /// Requested group name
        group: String,
        /// Which rule was violated
        reason: &'static str,
    },

    /// The requester sent to a group it does not belong to.
    #[error("{client} is not a member of group {group}")]
    NotAMember {
        /// Requesting client
        client: String,
        /// Destination group
        group: String,
    },

    /// The destination is neither a connected client nor a group.
    #[error("unknown destination: {0}")]
    UnknownDestination(String),

    /// The relayed message would not fit in a single frame.
    #[error("relay payload too long: {len} bytes")]
    RelayTooLong {
        /// Encoded relay payload length
        len: usize,
    },

    /// No registered client is bound to this connection.
    #[error("no client registered on connection {0}")]
    UnknownConnection(ConnectionId),
}

impl RegistryError {
    pub(crate) fn invalid_group(group: &str, reason: &'static str) -> Self {
        Self::InvalidGroup {
            group: group.to_string(),
            reason,
        }
    }
}
