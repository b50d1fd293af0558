//! # huddle-protocol
//!
//! Wire and control-plane types for the Huddle room broadcast hub.
//!
//! - **Message** - The chat frame exchanged with every room member
//! - **codec** - JSON encoding with frame size limits
//! - **api** - Request and response bodies for the HTTP control plane
//!
//! ## Example
//!
//! ```rust
//! use huddle_protocol::{codec, Message};
//!
//! let message = Message::new("hi", "r1", "Alice");
//! let encoded = codec::encode(&message).unwrap();
//! assert_eq!(encoded, r#"{"content":"hi","roomId":"r1","username":"Alice"}"#);
//! ```

pub mod api;
pub mod codec;
pub mod message;

pub use api::{
    validate_room_id, ClientSummary, CreateRoomRequest, JoinParams, RoomSummary,
    MAX_ROOM_ID_LENGTH,
};
pub use codec::{decode, encode, ProtocolError, DEFAULT_MAX_MESSAGE_SIZE, MAX_FRAME_SIZE};
pub use message::Message;
