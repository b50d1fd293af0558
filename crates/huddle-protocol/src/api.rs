//! Control-plane request and response bodies.

use serde::{Deserialize, Serialize};

/// Maximum room id length.
pub const MAX_ROOM_ID_LENGTH: usize = 256;

/// Validate a room id supplied by a caller.
///
/// # Errors
///
/// Returns an error message if the id is unusable as a path segment.
pub fn validate_room_id(id: &str) -> Result<(), &'static str> {
    if id.is_empty() {
        return Err("Room id cannot be empty");
    }
    if id.len() > MAX_ROOM_ID_LENGTH {
        return Err("Room id too long");
    }
    // Unreserved URL characters only, so the id needs no escaping in a path.
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '~'))
    {
        return Err("Room id may only contain letters, digits, '-', '_', '.' and '~'");
    }
    Ok(())
}

/// Body of a create-room request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateRoomRequest {
    /// Caller-assigned room id.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// A room as listed by the control plane (membership omitted).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoomSummary {
    pub id: String,
    pub name: String,
}

/// A room member as listed by the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientSummary {
    pub id: String,
    pub username: String,
}

/// Query parameters of a join request.
///
/// Both fields are optional here so the adapter can answer a missing
/// value with its own error instead of a generic extractor rejection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinParams {
    pub user_id: Option<String>,
    pub username: Option<String>,
}

impl JoinParams {
    /// Return `(user_id, username)` when both are present and non-empty.
    #[must_use]
    pub fn identity(&self) -> Option<(&str, &str)> {
        match (self.user_id.as_deref(), self.username.as_deref()) {
            (Some(id), Some(name)) if !id.is_empty() && !name.is_empty() => Some((id, name)),
            _ => None,
        }
    }
}
