//! Message types for the room actor.
//!
//! User-triggered actions flow in as [`RoomCommand`] over `tokio::sync::mpsc`
//! with `oneshot` request-reply; coarse change notifications flow out as
//! [`RoomUpdate`] over a broadcast channel so a rendering layer knows when to
//! re-derive its view state.

use tokio::sync::oneshot;

use crate::broker::Participant;
use crate::errors::RoomError;
use crate::state::RoomSnapshot;

/// Commands sent to the `RoomActor`.
#[derive(Debug)]
pub enum RoomCommand {
    /// Send a chat message. Whitespace-only text is a no-op.
    SendChat {
        text: String,
        /// Response channel; resolves once the message is appended locally.
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Focus an attendee for large-view display, or clear the focus.
    SetFocus {
        attendee_id: Option<String>,
        /// Whether the focus change was applied.
        respond_to: oneshot::Sender<bool>,
    },

    /// Get a render-ready snapshot of the room.
    GetState {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },

    /// Leave the room, running the full cleanup path.
    Leave {
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Internal: a roster refetch completed (`None` when the fetch failed).
    RosterLoaded {
        participants: Option<Vec<Participant>>,
    },
}

/// Change notifications published by the `RoomActor`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomUpdate {
    /// Tiles, roster, presence, mic/video or focus state changed.
    StateChanged,

    /// A chat message arrived. The embedder plays its notification sound
    /// off this update.
    ChatReceived { sender_id: String },

    /// The recording flag transitioned.
    RecordingChanged { recording: bool },

    /// Cleanup completed and the room is back to idle.
    Left,
}
