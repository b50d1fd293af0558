//! Shared fixtures for the Huddle benchmarks.

use huddle_core::{Admission, ClientHandle, ClientInfo, HubError, HubHandle, Mailbox};

/// Create `room` and register `members` clients directly against the hub,
/// returning their mailboxes in registration order.
///
/// # Errors
///
/// Returns an error if the hub is no longer running.
pub async fn populated_room(
    hub: &HubHandle,
    room: &str,
    members: usize,
    capacity: usize,
) -> Result<Vec<Mailbox>, HubError> {
    hub.create_room(room, room);

    let mut mailboxes = Vec::with_capacity(members);
    for i in 0..members {
        let info = ClientInfo::new(format!("member-{i}"), format!("user-{i}"), room);
        let (handle, mailbox) = ClientHandle::new(info, capacity);
        if hub.register(handle).await? == Admission::Admitted {
            mailboxes.push(mailbox);
        }
    }
    Ok(mailboxes)
}
