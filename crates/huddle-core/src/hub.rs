//! The hub: room directory and serialized broadcast coordinator.
//!
//! Directory reads and room creation hit a concurrent map directly.
//! Membership changes and broadcasts are serialized through one actor task.

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use huddle_protocol::{ClientSummary, Message, RoomSummary};
use metrics::counter;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, trace, warn};

use crate::client::{ClientHandle, ClientInfo, DeliveryError};
use crate::room::{Room, RoomId};

/// Content of the notification sent to a room when a member leaves.
pub const DEPARTURE_CONTENT: &str = "user left";

/// Content of the notification sent when a member is admitted and
/// [`HubConfig::announce_joins`] is set.
pub const ARRIVAL_CONTENT: &str = "A new user has joined the room";

/// Metric names recorded by the hub.
pub mod names {
    pub const BROADCASTS_TOTAL: &str = "huddle_broadcasts_total";
    pub const BROADCASTS_DROPPED: &str = "huddle_broadcasts_dropped_total";
    pub const DELIVERIES_TOTAL: &str = "huddle_deliveries_total";
    pub const EVICTIONS_TOTAL: &str = "huddle_evictions_total";
}

/// Hub errors.
#[derive(Debug, Error)]
pub enum HubError {
    /// The actor loop is no longer running.
    #[error("Hub is not running")]
    Closed,
}

/// Outcome of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    /// The client is now a member of its room.
    Admitted,
    /// A client with the same id is already a member; nothing changed.
    AlreadyMember,
    /// The client's room does not exist; nothing changed.
    RoomNotFound,
}

/// Hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Capacity of the actor's event queue.
    pub event_capacity: usize,
    /// Broadcast an arrival notification when a member is admitted.
    pub announce_joins: bool,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            event_capacity: 1024,
            announce_joins: false,
        }
    }
}

/// Hub statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HubStats {
    /// Number of rooms.
    pub rooms: usize,
    /// Number of members across all rooms.
    pub clients: usize,
}

#[derive(Debug)]
enum HubEvent {
    Register {
        client: ClientHandle,
        reply: oneshot::Sender<Admission>,
    },
    Unregister(Arc<ClientInfo>),
    Broadcast(Arc<Message>),
}

/// The room directory. Outside this crate, membership only changes
/// through a [`HubHandle`].
pub struct Hub {
    rooms: DashMap<RoomId, Arc<Room>>,
    config: HubConfig,
}

impl Hub {
    /// Create a hub without starting its actor loop.
    #[must_use]
    pub fn new(config: HubConfig) -> Self {
        debug!("Creating hub with config: {:?}", config);
        Self {
            rooms: DashMap::new(),
            config,
        }
    }

    /// Create a hub and spawn its actor loop on the current runtime.
    ///
    /// The loop runs until every [`HubHandle`] has been dropped.
    #[must_use]
    pub fn spawn(config: HubConfig) -> HubHandle {
        let (tx, rx) = mpsc::channel(config.event_capacity.max(1));
        let hub = Arc::new(Self::new(config));

        tokio::spawn(run(Arc::clone(&hub), rx));

        HubHandle { hub, events: tx }
    }

    /// Create a room, or return the existing room with this id unchanged.
    pub fn create_room(&self, id: impl Into<RoomId>, name: impl Into<String>) -> Arc<Room> {
        let id = id.into();
        match self.rooms.entry(id) {
            Entry::Occupied(entry) => {
                debug!(room = %entry.key(), "Room already exists");
                Arc::clone(entry.get())
            }
            Entry::Vacant(entry) => {
                let room = Arc::new(Room::new(entry.key().clone(), name));
                info!(room = %room.id(), name = %room.name(), "Created room");
                entry.insert(Arc::clone(&room));
                room
            }
        }
    }

    /// Look up a room.
    #[must_use]
    pub fn room(&self, id: &str) -> Option<Arc<Room>> {
        self.rooms.get(id).map(|entry| Arc::clone(entry.value()))
    }

    /// Check if a room exists.
    #[must_use]
    pub fn room_exists(&self, id: &str) -> bool {
        self.rooms.contains_key(id)
    }

    /// List all rooms, without membership.
    #[must_use]
    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.rooms.iter().map(|entry| entry.summary()).collect()
    }

    /// List the members of a room. Unknown rooms have no members.
    #[must_use]
    pub fn clients(&self, room_id: &str) -> Vec<ClientSummary> {
        self.room(room_id)
            .map(|room| room.members())
            .unwrap_or_default()
    }

    /// Get hub statistics.
    #[must_use]
    pub fn stats(&self) -> HubStats {
        let rooms: Vec<Arc<Room>> = self.rooms.iter().map(|e| Arc::clone(e.value())).collect();
        HubStats {
            rooms: rooms.len(),
            clients: rooms.iter().map(|room| room.len()).sum(),
        }
    }

    /// Admit a client into its room.
    pub(crate) fn admit(&self, client: ClientHandle) -> Admission {
        let info = Arc::clone(client.info());

        let Some(room) = self.room(&info.room_id) else {
            warn!(room = %info.room_id, client = %info.id, "Client tried to join non-existent room");
            return Admission::RoomNotFound;
        };

        let lifecycle = client.lifecycle().clone();
        if !room.insert_if_absent(client) {
            debug!(room = %info.room_id, client = %info.id, "Duplicate registration ignored");
            return Admission::AlreadyMember;
        }

        lifecycle.join();
        info!(room = %room.id(), client = %info.id, username = %info.username, "Client joined room");

        if self.config.announce_joins {
            self.fan_out(Arc::new(Message::new(
                ARRIVAL_CONTENT,
                info.room_id.clone(),
                info.username.clone(),
            )));
        }

        Admission::Admitted
    }

    /// Remove a client from its room.
    ///
    /// Returns `true` if the client was a member. Remaining members are
    /// sent a departure notification. Calling this again is a no-op.
    pub(crate) fn depart(&self, info: &ClientInfo) -> bool {
        let Some(room) = self.room(&info.room_id) else {
            return false;
        };

        let Some(handle) = room.remove_if_present(&info.id, info.connection) else {
            trace!(room = %info.room_id, client = %info.id, "Unregister for non-member ignored");
            return false;
        };
        // Dropping the stored handle closes the mailbox.
        drop(handle);

        info!(room = %room.id(), client = %info.id, username = %info.username, "Client left room");

        if !room.is_empty() {
            self.fan_out(Arc::new(Message::new(
                DEPARTURE_CONTENT,
                info.room_id.clone(),
                info.username.clone(),
            )));
        }

        true
    }

    /// Offer a message to every current member of its room.
    ///
    /// Members whose mailbox is full are evicted. Returns the number of
    /// mailboxes the message was placed in.
    pub(crate) fn fan_out(&self, message: Arc<Message>) -> usize {
        let Some(room) = self.room(&message.room_id) else {
            warn!(room = %message.room_id, "Message sent to non-existent room");
            counter!(names::BROADCASTS_DROPPED).increment(1);
            return 0;
        };

        let members = room.snapshot();
        let mut delivered = 0;

        for member in &members {
            match member.try_deliver(&message) {
                Ok(()) => delivered += 1,
                // The writer is gone and its unregister is queued behind us;
                // that path removes the member and tells the room.
                Err(DeliveryError::Closed) => {
                    trace!(room = %room.id(), client = %member.id(), "Skipping closed mailbox");
                }
                Err(DeliveryError::Full) => {
                    if room
                        .remove_if_present(member.id(), member.connection())
                        .is_some()
                    {
                        member.lifecycle().evict();
                        counter!(names::EVICTIONS_TOTAL).increment(1);
                        warn!(
                            room = %room.id(),
                            client = %member.id(),
                            connection = %member.connection(),
                            "Evicting client, mailbox full"
                        );
                    }
                }
            }
        }

        counter!(names::BROADCASTS_TOTAL).increment(1);
        counter!(names::DELIVERIES_TOTAL).increment(delivered as u64);
        trace!(room = %room.id(), recipients = delivered, "Broadcast message");

        delivered
    }
}

async fn run(hub: Arc<Hub>, mut events: mpsc::Receiver<HubEvent>) {
    debug!("Hub actor started");

    while let Some(event) = events.recv().await {
        match event {
            HubEvent::Register { client, reply } => {
                let admission = hub.admit(client);
                // The registering client may have gone away meanwhile.
                let _ = reply.send(admission);
            }
            HubEvent::Unregister(info) => {
                hub.depart(&info);
            }
            HubEvent::Broadcast(message) => {
                hub.fan_out(message);
            }
        }
    }

    debug!("Hub actor stopped");
}

/// Cloneable handle to a running hub.
#[derive(Clone)]
pub struct HubHandle {
    hub: Arc<Hub>,
    events: mpsc::Sender<HubEvent>,
}

impl HubHandle {
    /// Register a client and wait for the hub's decision.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor loop is no longer running.
    pub async fn register(&self, client: ClientHandle) -> Result<Admission, HubError> {
        let (reply, decision) = oneshot::channel();
        self.events
            .send(HubEvent::Register { client, reply })
            .await
            .map_err(|_| HubError::Closed)?;
        decision.await.map_err(|_| HubError::Closed)
    }

    /// Ask the hub to remove a client from its room.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor loop is no longer running.
    pub async fn unregister(&self, client: Arc<ClientInfo>) -> Result<(), HubError> {
        self.events
            .send(HubEvent::Unregister(client))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Queue a message for delivery to its room. Messages for unknown
    /// rooms are dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if the actor loop is no longer running.
    pub async fn broadcast(&self, message: Message) -> Result<(), HubError> {
        self.events
            .send(HubEvent::Broadcast(Arc::new(message)))
            .await
            .map_err(|_| HubError::Closed)
    }

    /// Create a room, or return the existing room with this id unchanged.
    pub fn create_room(&self, id: impl Into<RoomId>, name: impl Into<String>) -> Arc<Room> {
        self.hub.create_room(id, name)
    }

    #[must_use]
    pub fn room_exists(&self, id: &str) -> bool {
        self.hub.room_exists(id)
    }

    #[must_use]
    pub fn rooms(&self) -> Vec<RoomSummary> {
        self.hub.rooms()
    }

    #[must_use]
    pub fn clients(&self, room_id: &str) -> Vec<ClientSummary> {
        self.hub.clients(room_id)
    }

    #[must_use]
    pub fn stats(&self) -> HubStats {
        self.hub.stats()
    }
}
