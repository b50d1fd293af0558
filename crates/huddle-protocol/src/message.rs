//! The chat message frame.
//!
//! The same structure travels in both directions on the wire and is
//! fanned out to every member of a room.

use serde::{Deserialize, Serialize};

/// A chat message scoped to one room.
///
/// Once built a message is never mutated; the hub shares it between
/// mailboxes behind an `Arc`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// Message body, taken verbatim from the sender.
    pub content: String,
    /// Room the message belongs to.
    pub room_id: String,
    /// Display name of the sender.
    pub username: String,
}

impl Message {
    /// Create a new message.
    #[must_use]
    pub fn new(
        content: impl Into<String>,
        room_id: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            content: content.into(),
            room_id: room_id.into(),
            username: username.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_wire_keys() {
        let msg = Message::new("hi", "r1", "Alice");
        let value = serde_json::to_value(&msg).unwrap();

        assert_eq!(value["content"], "hi");
        assert_eq!(value["roomId"], "r1");
        assert_eq!(value["username"], "Alice");
        assert!(value.get("room_id").is_none());
    }

    #[test]
    fn test_message_from_wire() {
        let msg: Message =
            serde_json::from_str(r#"{"content":"user left","roomId":"r1","username":"Bob"}"#)
                .unwrap();
        assert_eq!(msg, Message::new("user left", "r1", "Bob"));
    }
}
