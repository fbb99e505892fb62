//! View-state derivation.
//!
//! Pure functions over [`RoomSnapshot`]: nothing here mutates room state or
//! caches across snapshots, so the derived values can never go stale.

use crate::broker::Participant;
use crate::state::RoomSnapshot;

/// The local/remote split of the visible gallery.
#[derive(Debug, Clone, Default)]
pub struct GalleryPartition {
    /// The local user's own participant record, when visible.
    pub local: Option<Participant>,
    /// Everyone else.
    pub remote: Vec<Participant>,
}

/// The durable roster entry whose live attendee binding matches the focused
/// attendee id.
#[must_use]
pub fn focused_user(snapshot: &RoomSnapshot) -> Option<&Participant> {
    let focused = snapshot.focused_attendee_id.as_deref()?;
    snapshot
        .roster
        .iter()
        .find(|p| p.attendee_id.as_deref() == Some(focused))
}

/// The visible-roster entry for the focused attendee.
#[must_use]
pub fn focused_participant(snapshot: &RoomSnapshot) -> Option<&Participant> {
    let user = focused_user(snapshot)?;
    snapshot.present.iter().find(|p| p.user_pk == user.user_pk)
}

/// Label for the focused attendee: username, falling back to display name.
#[must_use]
pub fn focused_nickname(snapshot: &RoomSnapshot) -> Option<&str> {
    focused_participant(snapshot).and_then(Participant::nickname)
}

/// Split the visible participants into the local user and everyone else,
/// purely by comparing user ids against the session's own identity.
#[must_use]
pub fn gallery_partition(snapshot: &RoomSnapshot) -> GalleryPartition {
    let mut partition = GalleryPartition::default();
    for participant in &snapshot.present {
        if participant.user_pk == snapshot.self_user_pk {
            partition.local = Some(participant.clone());
        } else {
            partition.remote.push(participant.clone());
        }
    }
    partition
}
