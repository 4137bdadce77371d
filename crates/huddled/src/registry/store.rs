//! Registry state: client bindings and groups.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use huddle_core::{ClientName, GroupName};
use tracing::debug;

use super::errors::RegistryError;
use crate::server::{ConnectionHandle, ConnectionId};

/// A registration that was refused, handing the connection back to the caller.
///
/// The caller still owns the connection and must send the rejection reply
/// before closing it.
#[derive(Debug)]
pub struct Rejected {
    /// Why the name was refused
    pub reason: RegistryError,
    /// The connection that tried to register
    pub handle: ConnectionHandle,
}

/// Authoritative server state.
///
/// Holds the bijection between client names and connections, plus every
/// group created so far. Client names and group names share one namespace.
///
/// Groups are never deleted. A departing client is removed from every member
/// set, but the group name stays reserved even once its set is empty.
#[derive(Debug, Default)]
pub struct Registry {
    /// Name → connection. Ordered, so the roster comes out sorted.
    clients: BTreeMap<ClientName, ConnectionId>,

    /// Connection → (name, handle). Inverse of `clients`.
    connections: HashMap<ConnectionId, (ClientName, ConnectionHandle)>,

    /// Group → members (requester included).
    groups: BTreeMap<GroupName, BTreeSet<ClientName>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `name` is taken by a client or a group.
    #[must_use]
    pub fn is_name_taken(&self, name: &str) -> bool {
        self.clients.contains_key(name) || self.groups.contains_key(name)
    }

    // ------------------------------------------------------------------------
    // Clients
    // ------------------------------------------------------------------------

    /// Binds `name` to the connection behind `handle`.
    ///
    /// # Errors
    /// - `RegistryError::InvalidName` if the name is empty or not alphanumeric
    /// - `RegistryError::DuplicateName` if a client or group already uses it
    ///
    /// On error nothing is stored and the handle is returned in [`Rejected`].
    pub fn register(
        &mut self,
        name: &str,
        handle: ConnectionHandle,
    ) -> Result<ClientName, Box<Rejected>> {
        let client = match ClientName::parse(name) {
            Ok(client) => client,
            Err(e) => {
                return Err(Box::new(Rejected {
                    reason: e.into(),
                    handle,
                }))
            }
        };

        if self.is_name_taken(name) {
            return Err(Box::new(Rejected {
                reason: RegistryError::DuplicateName(name.to_string()),
                handle,
            }));
        }

        let id = handle.id();
        self.clients.insert(client.clone(), id);
        self.connections.insert(id, (client.clone(), handle));
        debug!(client = %client, connection = id, "Client registered");

        Ok(client)
    }

    /// Removes the client bound to `id` from the registry and every group,
    /// then closes its connection.
    ///
    /// Calling this again for the same connection is a no-op that reports
    /// `RegistryError::UnknownConnection`.
    pub fn unregister(&mut self, id: ConnectionId) -> Result<ClientName, RegistryError> {
        let (client, handle) = self
            .connections
            .remove(&id)
            .ok_or(RegistryError::UnknownConnection(id))?;

        self.clients.remove(&client);
        for members in self.groups.values_mut() {
            members.remove(&client);
        }
        handle.close();
        debug!(client = %client, connection = id, "Client unregistered");

        Ok(client)
    }

    /// Looks up the client bound to a connection.
    pub fn client_of(&self, id: ConnectionId) -> Option<&ClientName> {
        self.connections.get(&id).map(|(client, _)| client)
    }

    /// Looks up the handle of a registered connection.
    pub fn connection(&self, id: ConnectionId) -> Option<&ConnectionHandle> {
        self.connections.get(&id).map(|(_, handle)| handle)
    }

    /// Looks up the connection of a connected client.
    pub fn handle_of(&self, name: &str) -> Option<&ConnectionHandle> {
        let id = self.clients.get(name)?;
        self.connections.get(id).map(|(_, handle)| handle)
    }

    /// Returns true if `name` is a connected client.
    #[must_use]
    pub fn is_client(&self, name: &str) -> bool {
        self.clients.contains_key(name)
    }

    /// Number of connected clients.
    pub fn client_count(&self) -> usize {
        self.clients.len()
    }

    /// Connected client names, sorted and comma-joined.
    ///
    /// Group names are never included.
    pub fn roster(&self) -> String {
        self.clients
            .keys()
            .map(ClientName::as_str)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Removes every client, handing back their connections for a final
    /// message. Groups are left in place.
    pub fn drain_clients(&mut self) -> Vec<(ClientName, ConnectionHandle)> {
        self.clients.clear();
        for members in self.groups.values_mut() {
            members.clear();
        }
        self.connections.drain().map(|(_, entry)| entry).collect()
    }

    // ------------------------------------------------------------------------
    // Groups
    // ------------------------------------------------------------------------

    /// Creates `group` with `members` plus the requester.
    ///
    /// Valid only when:
    /// - `group` is alphanumeric and not used by any client or group
    /// - every listed member is alphanumeric and a connected client
    /// - at least one listed member differs from `requester`
    ///
    /// Duplicates in `members` collapse. On error nothing is stored.
    pub fn create_group(
        &mut self,
        requester: &ClientName,
        group: &str,
        members: &[String],
    ) -> Result<GroupName, RegistryError> {
        let group_name = GroupName::parse(group)?;
        if self.is_name_taken(group) {
            return Err(RegistryError::DuplicateName(group.to_string()));
        }
        if members.is_empty() {
            return Err(RegistryError::invalid_group(group, "no members listed"));
        }

        let mut member_set = BTreeSet::new();
        for member in members {
            let client = ClientName::parse(member)?;
            if !self.clients.contains_key(&client) {
                return Err(RegistryError::invalid_group(group, "member is not connected"));
            }
            member_set.insert(client);
        }

        if member_set.iter().all(|member| member == requester) {
            return Err(RegistryError::invalid_group(
                group,
                "no member other than the requester",
            ));
        }

        member_set.insert(requester.clone());
        debug!(group = %group_name, members = member_set.len(), "Group created");
        self.groups.insert(group_name.clone(), member_set);

        Ok(group_name)
    }

    /// Members of `group`, or `None` if no such group exists.
    pub fn group_members(&self, group: &str) -> Option<&BTreeSet<ClientName>> {
        self.groups.get(group)
    }

    /// Number of groups ever created (empty ones included).
    pub fn group_count(&self) -> usize {
        self.groups.len()
    }
}
