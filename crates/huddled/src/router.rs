//! Destination resolution and relay delivery.
//!
//! A `send` destination is resolved client name first, then group name.
//! Relays are queued on the recipients' outboxes; the requester's ack is
//! left to the caller so it always follows the relays it reports on.

use tracing::debug;

use huddle_core::ClientName;
use huddle_protocol::frame::MAX_FRAME_LEN;
use huddle_protocol::message::relay_payload;

use crate::registry::{Registry, RegistryError};

/// Relays `body` from `requester` to `dest`.
///
/// Returns the number of relay frames queued:
/// - `dest` is a connected client: 1, even when it is the requester itself
/// - `dest` is a group the requester belongs to: one per other member
///
/// # Errors
/// - `RegistryError::NotAMember` if `dest` is a group without the requester
/// - `RegistryError::UnknownDestination` if `dest` is neither
/// - `RegistryError::RelayTooLong` if `send <requester> <body>` exceeds a frame
///
/// On error nothing is queued.
pub fn route_send(
    registry: &Registry,
    requester: &ClientName,
    dest: &str,
    body: &str,
) -> Result<usize, RegistryError> {
    let payload = relay_payload(requester, body);
    if payload.len() > MAX_FRAME_LEN {
        return Err(RegistryError::RelayTooLong { len: payload.len() });
    }

    if let Some(handle) = registry.handle_of(dest) {
        if !handle.send(payload) {
            debug!(to = dest, "Recipient writer already stopped");
        }
        return Ok(1);
    }

    let members = registry
        .group_members(dest)
        .ok_or_else(|| RegistryError::UnknownDestination(dest.to_string()))?;

    if !members.contains(requester) {
        return Err(RegistryError::NotAMember {
            client: requester.to_string(),
            group: dest.to_string(),
        });
    }

    let mut delivered = 0;
    for member in members.iter().filter(|member| *member != requester) {
        match registry.handle_of(member.as_str()) {
            Some(handle) => {
                if !handle.send(payload.as_str()) {
                    debug!(to = %member, "Recipient writer already stopped");
                }
                delivered += 1;
            }
            None => debug!(to = %member, group = dest, "Group member has no connection"),
        }
    }

    Ok(delivered)
}
