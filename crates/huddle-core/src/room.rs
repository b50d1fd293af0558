//! Rooms.
//!
//! Each room guards its membership with its own lock, held only for a
//! single map operation and never across an `.await`.

use huddle_protocol::{ClientSummary, RoomSummary};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, trace};

use crate::client::{ClientHandle, ClientId, ConnectionId};

/// A room identifier, assigned by whoever creates the room.
pub type RoomId = String;

/// A named set of clients sharing a broadcast scope.
#[derive(Debug)]
pub struct Room {
    id: RoomId,
    name: String,
    members: RwLock<HashMap<ClientId, ClientHandle>>,
}

impl Room {
    /// Create an empty room.
    #[must_use]
    pub fn new(id: impl Into<RoomId>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            members: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    // A panic elsewhere cannot leave the map half-updated, so a poisoned
    // lock is still safe to use.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ClientId, ClientHandle>> {
        self.members.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ClientId, ClientHandle>> {
        self.members.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Add a member unless one with the same client id is already present.
    ///
    /// Returns `true` if the client was inserted. A rejected handle is
    /// dropped, which closes its mailbox.
    pub(crate) fn insert_if_absent(&self, client: ClientHandle) -> bool {
        let mut members = self.write();
        if members.contains_key(client.id()) {
            trace!(room = %self.id, client = %client.id(), "Already a member");
            return false;
        }

        debug!(room = %self.id, client = %client.id(), connection = %client.connection(), "Member added");
        members.insert(client.id().to_string(), client);
        true
    }

    /// Remove a member if it is present under the given connection.
    ///
    /// A member with the same client id but a different connection token is
    /// left in place.
    pub(crate) fn remove_if_present(
        &self,
        client_id: &str,
        connection: ConnectionId,
    ) -> Option<ClientHandle> {
        let mut members = self.write();
        match members.get(client_id) {
            Some(member) if member.connection() == connection => {
                debug!(room = %self.id, client = %client_id, connection = %connection, "Member removed");
                members.remove(client_id)
            }
            _ => None,
        }
    }

    /// Copy of the current membership, taken under a short read lock.
    pub(crate) fn snapshot(&self) -> Vec<ClientHandle> {
        self.read().values().cloned().collect()
    }

    /// Control-plane view of the current membership.
    #[must_use]
    pub fn members(&self) -> Vec<ClientSummary> {
        self.read()
            .values()
            .map(|member| member.info().summary())
            .collect()
    }

    /// Control-plane view of the room.
    #[must_use]
    pub fn summary(&self) -> RoomSummary {
        RoomSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientInfo;

    fn handle(id: &str, username: &str) -> ClientHandle {
        let (handle, _mailbox) = ClientHandle::new(ClientInfo::new(id, username, "r1"), 4);
        handle
    }

    #[test]
    fn test_room_creation() {
        let room = Room::new("r1", "lobby");
        assert_eq!(room.id(), "r1");
        assert_eq!(room.name(), "lobby");
        assert!(room.is_empty());
        assert_eq!(
            room.summary(),
            RoomSummary {
                id: "r1".into(),
                name: "lobby".into()
            }
        );
    }

    #[test]
    fn test_insert_if_absent() {
        let room = Room::new("r1", "lobby");

        assert!(room.insert_if_absent(handle("A", "Alice")));
        assert!(!room.insert_if_absent(handle("A", "Alice again")));
        assert_eq!(room.len(), 1);

        let members = room.members();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].username, "Alice");
    }

    #[test]
    fn test_remove_requires_matching_connection() {
        let room = Room::new("r1", "lobby");
        let alice = handle("A", "Alice");
        let connection = alice.connection();
        room.insert_if_absent(alice);

        let stale = ClientInfo::new("A", "Alice", "r1");
        assert!(room.remove_if_present("A", stale.connection).is_none());
        assert_eq!(room.len(), 1);

        assert!(room.remove_if_present("A", connection).is_some());
        assert!(room.remove_if_present("A", connection).is_none());
        assert!(room.is_empty());
    }

    #[test]
    fn test_snapshot_is_detached() {
        let room = Room::new("r1", "lobby");
        room.insert_if_absent(handle("A", "Alice"));
        room.insert_if_absent(handle("B", "Bob"));

        let snapshot = room.snapshot();
        for member in &snapshot {
            room.remove_if_present(member.id(), member.connection());
        }

        assert_eq!(snapshot.len(), 2);
        assert!(room.is_empty());
    }
}
