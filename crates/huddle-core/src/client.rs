//! Client identity, mailbox, and lifecycle.
//!
//! A [`ClientHandle`] is what a room stores; its [`Mailbox`] is drained by
//! one writer loop and closes when the last handle drops.

use huddle_protocol::{ClientSummary, Message};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
#[cfg(test)]
use tokio::sync::mpsc::error::TryRecvError;

use crate::room::RoomId;

/// A client identifier, supplied by the transport adapter.
pub type ClientId = String;

static CONNECTION_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Process-unique token for one accepted connection.
///
/// Two connections may claim the same [`ClientId`]; the token tells them
/// apart so a stale connection cannot remove a newer one from a room.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocate the next connection token.
    #[must_use]
    pub fn next() -> Self {
        Self(CONNECTION_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Identity of a connected participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientInfo {
    /// Client id claimed by the participant.
    pub id: ClientId,
    /// Display name; not a proof of identity.
    pub username: String,
    /// The single room this client belongs to.
    pub room_id: RoomId,
    /// Connection token.
    pub connection: ConnectionId,
}

impl ClientInfo {
    /// Create client info with a fresh connection token.
    #[must_use]
    pub fn new(
        id: impl Into<ClientId>,
        username: impl Into<String>,
        room_id: impl Into<RoomId>,
    ) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            room_id: room_id.into(),
            connection: ConnectionId::next(),
        }
    }

    /// Control-plane view of this client.
    #[must_use]
    pub fn summary(&self) -> ClientSummary {
        ClientSummary {
            id: self.id.clone(),
            username: self.username.clone(),
        }
    }
}

/// Lifecycle states of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ClientState {
    /// Transport upgraded, not yet admitted.
    Connecting = 0,
    /// Admitted into its room.
    Joined = 1,
    /// Reader loop exited.
    Leaving = 2,
    /// Removed by the hub because its mailbox overflowed.
    Evicted = 3,
    /// Mailbox and transport closed.
    Closed = 4,
}

impl ClientState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => ClientState::Connecting,
            1 => ClientState::Joined,
            2 => ClientState::Leaving,
            3 => ClientState::Evicted,
            _ => ClientState::Closed,
        }
    }
}

/// Lifecycle shared between the hub and a client actor.
#[derive(Debug, Clone)]
pub struct Lifecycle(Arc<AtomicU8>);

impl Lifecycle {
    fn new() -> Self {
        Self(Arc::new(AtomicU8::new(ClientState::Connecting as u8)))
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> ClientState {
        ClientState::from_u8(self.0.load(Ordering::Acquire))
    }

    fn transition(&self, from: ClientState, to: ClientState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// `Connecting -> Joined`.
    pub(crate) fn join(&self) -> bool {
        self.transition(ClientState::Connecting, ClientState::Joined)
    }

    /// `Joined -> Evicted`.
    pub(crate) fn evict(&self) -> bool {
        self.transition(ClientState::Joined, ClientState::Evicted)
    }

    /// `Joined | Connecting -> Leaving`. An evicted client stays evicted.
    pub(crate) fn leave(&self) -> bool {
        self.transition(ClientState::Joined, ClientState::Leaving)
            || self.transition(ClientState::Connecting, ClientState::Leaving)
    }

    /// Move to `Closed`, returning the state it was in before.
    pub(crate) fn close(&self) -> ClientState {
        ClientState::from_u8(self.0.swap(ClientState::Closed as u8, Ordering::AcqRel))
    }
}

/// Why a message could not be placed in a mailbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryError {
    /// Mailbox is at capacity.
    Full,
    /// The writer side has gone away.
    Closed,
}

impl fmt::Display for DeliveryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeliveryError::Full => f.write_str("mailbox full"),
            DeliveryError::Closed => f.write_str("mailbox closed"),
        }
    }
}

/// A room member as stored by the hub.
#[derive(Debug, Clone)]
pub struct ClientHandle {
    info: Arc<ClientInfo>,
    mailbox: mpsc::Sender<Arc<Message>>,
    lifecycle: Lifecycle,
}

impl ClientHandle {
    /// Create a handle and its mailbox.
    #[must_use]
    pub fn new(info: ClientInfo, capacity: usize) -> (Self, Mailbox) {
        Self::from_shared(Arc::new(info), capacity)
    }

    /// Create a handle and its mailbox from shared client info.
    #[must_use]
    pub fn from_shared(info: Arc<ClientInfo>, capacity: usize) -> (Self, Mailbox) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (
            Self {
                info,
                mailbox: tx,
                lifecycle: Lifecycle::new(),
            },
            Mailbox { rx },
        )
    }

    #[must_use]
    pub fn info(&self) -> &Arc<ClientInfo> {
        &self.info
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.info.id
    }

    #[must_use]
    pub fn connection(&self) -> ConnectionId {
        self.info.connection
    }

    #[must_use]
    pub fn lifecycle(&self) -> &Lifecycle {
        &self.lifecycle
    }

    /// Try to enqueue a message without waiting.
    pub(crate) fn try_deliver(&self, message: &Arc<Message>) -> Result<(), DeliveryError> {
        self.mailbox
            .try_send(Arc::clone(message))
            .map_err(|e| match e {
                TrySendError::Full(_) => DeliveryError::Full,
                TrySendError::Closed(_) => DeliveryError::Closed,
            })
    }
}

/// Receiving side of a client's mailbox.
#[derive(Debug)]
pub struct Mailbox {
    rx: mpsc::Receiver<Arc<Message>>,
}

impl Mailbox {
    /// Wait for the next message.
    ///
    /// Returns `None` once the mailbox has been closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Message>> {
        self.rx.recv().await
    }

    #[cfg(test)]
    pub(crate) fn try_recv(&mut self) -> Result<Arc<Message>, TryRecvError> {
        self.rx.try_recv()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connection_ids_unique() {
        let a = ClientInfo::new("A", "Alice", "r1");
        let b = ClientInfo::new("A", "Alice", "r1");
        assert_ne!(a.connection, b.connection);
        assert!(a.connection.to_string().starts_with("conn-"));
    }

    #[test]
    fn test_lifecycle_transitions() {
        let lifecycle = Lifecycle::new();
        assert_eq!(lifecycle.state(), ClientState::Connecting);

        assert!(lifecycle.join());
        assert!(!lifecycle.join());
        assert!(lifecycle.evict());

        // Eviction wins over a later leave.
        assert!(!lifecycle.leave());
        assert_eq!(lifecycle.close(), ClientState::Evicted);
        assert_eq!(lifecycle.state(), ClientState::Closed);
    }

    #[test]
    fn test_lifecycle_leave_before_join() {
        let lifecycle = Lifecycle::new();
        assert!(lifecycle.leave());
        assert!(!lifecycle.evict());
        assert_eq!(lifecycle.state(), ClientState::Leaving);
    }

    #[test]
    fn test_mailbox_full_and_closed() {
        let (handle, mut mailbox) = ClientHandle::new(ClientInfo::new("A", "Alice", "r1"), 1);
        let msg = Arc::new(Message::new("hi", "r1", "Bob"));

        assert_eq!(handle.try_deliver(&msg), Ok(()));
        assert_eq!(handle.try_deliver(&msg), Err(DeliveryError::Full));

        assert_eq!(mailbox.try_recv().unwrap().content, "hi");
        drop(mailbox);
        assert_eq!(handle.try_deliver(&msg), Err(DeliveryError::Closed));
    }

    #[test]
    fn test_dropping_handle_closes_mailbox() {
        let (handle, mut mailbox) = ClientHandle::new(ClientInfo::new("A", "Alice", "r1"), 4);
        handle
            .try_deliver(&Arc::new(Message::new("queued", "r1", "Bob")))
            .unwrap();
        drop(handle);

        assert_eq!(mailbox.try_recv().unwrap().content, "queued");
        assert_eq!(mailbox.try_recv(), Err(TryRecvError::Disconnected));
    }
}
