//! # huddle-core
//!
//! Room-scoped message broadcast for the Huddle chat server.
//!
//! - **Hub** - Owns the room directory and serializes every membership
//!   change and broadcast through one actor loop
//! - **Room** - A named membership set with its own reader/writer lock
//! - **Client** - Per-connection handle, bounded mailbox, and lifecycle
//! - **ClientActor** - Reader and writer loops for one connection
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐ register/unregister ┌─────────────┐     ┌─────────────┐
//! │ ClientActor │────────────────────▶│  Hub actor  │────▶│    Room     │
//! │  (reader)   │      broadcast      └─────────────┘     └─────────────┘
//! └─────────────┘                            │ try_send
//!        ▲                                   ▼
//! ┌─────────────┐                     ┌─────────────┐
//! │ ClientActor │◀────────────────────│   Mailbox   │
//! │  (writer)   │                     └─────────────┘
//! └─────────────┘
//! ```
//!
//! A member whose mailbox is full when a broadcast arrives is evicted on
//! the spot; broadcasting never waits on a slow consumer.

pub mod actor;
pub mod client;
pub mod hub;
pub mod room;

pub use actor::{ClientActor, ClientConfig, Departure, ReadError};
pub use client::{
    ClientHandle, ClientId, ClientInfo, ClientState, ConnectionId, DeliveryError, Lifecycle,
    Mailbox,
};
pub use huddle_protocol::Message;
pub use hub::{Admission, Hub, HubConfig, HubError, HubHandle, HubStats};
pub use room::{Room, RoomId};
