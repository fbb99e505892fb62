//! Room state owned by the room actor.
//!
//! All mutation happens through the methods here, driven by the actor's
//! event handlers and user commands; nothing else holds a mutable reference.
//! The methods are synchronous and side-effect free beyond the struct
//! itself, so the event-ordering properties are unit-testable without a
//! transport.

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::broker::Participant;
use crate::transport::{content_share_owner, is_content_attendee};

/// Lifecycle phase of one room entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RoomPhase {
    /// No session requested yet, or cleanup has completed.
    Idle,
    /// Session acquisition in flight.
    Joining,
    /// Session bound, events flowing.
    Active,
    /// Cleanup running.
    Leaving,
}

/// One active video surface, bound to exactly one attendee.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VideoTile {
    pub tile_id: u64,
    pub attendee_id: String,
}

/// One chat message. Append-only, session-scoped, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub sender_id: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

/// Outcome of a presence event, so the actor knows which side effects
/// (volume subscription, roster refetch) to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceOutcome {
    /// Content attendee or self-attendee join handshake; nothing to do.
    Ignored,
    /// Attendee resolved and now visible; begin volume subscription.
    Joined,
    /// Attendee removed from the visible roster; end volume subscription.
    Left,
    /// Present attendee with no roster entry; a roster refetch may resolve it.
    Unresolved,
}

/// Render-ready snapshot of the room, cloned out of the actor on request.
#[derive(Debug, Clone, Serialize)]
pub struct RoomSnapshot {
    pub phase: RoomPhase,
    pub self_attendee_id: String,
    pub self_user_pk: String,
    pub video_tiles: Vec<VideoTile>,
    pub mic_states: HashMap<String, bool>,
    pub video_states: HashMap<String, bool>,
    /// Durable participant roster for the discussion.
    pub roster: Vec<Participant>,
    /// Participants currently visible in the room.
    pub present: Vec<Participant>,
    pub messages: Vec<ChatMessage>,
    pub recording: bool,
    pub focused_attendee_id: Option<String>,
    pub remote_content_tile_owner: Option<String>,
}

/// Mutable room state.
#[derive(Debug)]
pub struct RoomState {
    phase: RoomPhase,
    self_attendee_id: String,
    self_user_pk: String,
    /// tile id -> attendee id, used to resolve removal signals that carry
    /// only the tile id.
    tile_to_attendee: HashMap<u64, String>,
    /// Live tile set, insertion-ordered.
    video_tiles: Vec<VideoTile>,
    /// content tile id -> owning attendee id.
    content_tiles: HashMap<u64, String>,
    /// Attendees currently connected, gating mic/video map writes so no
    /// stale entry survives a departure.
    live_attendees: HashSet<String>,
    mic_states: HashMap<String, bool>,
    video_states: HashMap<String, bool>,
    roster: Vec<Participant>,
    present: Vec<Participant>,
    messages: Vec<ChatMessage>,
    recording: bool,
    focused_attendee_id: Option<String>,
    remote_content_tile_owner: Option<String>,
}

impl RoomState {
    /// Create state for one room entry, still in the joining phase.
    ///
    /// The visible roster seeds from the durable roster; presence events
    /// keep it live from here on. The self attendee starts muted.
    #[must_use]
    pub fn new(self_attendee_id: String, self_user_pk: String, roster: Vec<Participant>) -> Self {
        let mut mic_states = HashMap::new();
        mic_states.insert(self_attendee_id.clone(), false);
        let mut live_attendees = HashSet::new();
        live_attendees.insert(self_attendee_id.clone());

        Self {
            phase: RoomPhase::Joining,
            self_attendee_id,
            self_user_pk,
            tile_to_attendee: HashMap::new(),
            video_tiles: Vec::new(),
            content_tiles: HashMap::new(),
            live_attendees,
            mic_states,
            video_states: HashMap::new(),
            present: roster.clone(),
            roster,
            messages: Vec::new(),
            recording: false,
            focused_attendee_id: None,
            remote_content_tile_owner: None,
        }
    }

    pub fn phase(&self) -> RoomPhase {
        self.phase
    }

    pub fn set_phase(&mut self, phase: RoomPhase) {
        self.phase = phase;
    }

    pub fn self_attendee_id(&self) -> &str {
        &self.self_attendee_id
    }

    /// A tile was bound or its activity changed.
    ///
    /// Content-share tiles feed only the remote-content-owner field; real
    /// tiles go through the tile map and live set. Adding an already-known
    /// tile is idempotent.
    pub fn apply_tile_update(
        &mut self,
        tile_id: u64,
        attendee_id: &str,
        is_content: bool,
        active: bool,
    ) {
        if tile_id == 0 || attendee_id.is_empty() {
            return;
        }

        if is_content || is_content_attendee(attendee_id) {
            let owner = content_share_owner(attendee_id).to_string();
            self.content_tiles.insert(tile_id, owner.clone());
            if owner != self.self_attendee_id {
                self.remote_content_tile_owner = Some(owner);
            }
            return;
        }

        self.tile_to_attendee.insert(tile_id, attendee_id.to_string());
        if !self.video_tiles.iter().any(|t| t.tile_id == tile_id) {
            self.video_tiles.push(VideoTile {
                tile_id,
                attendee_id: attendee_id.to_string(),
            });
        }
        if self.live_attendees.contains(attendee_id) || attendee_id == self.self_attendee_id {
            self.video_states.insert(attendee_id.to_string(), active);
        }
    }

    /// A tile was removed. Unknown tiles are a no-op.
    pub fn apply_tile_removed(&mut self, tile_id: u64) {
        if let Some(owner) = self.content_tiles.remove(&tile_id) {
            if self.remote_content_tile_owner.as_deref() == Some(owner.as_str()) {
                self.remote_content_tile_owner = None;
            }
            return;
        }

        let Some(attendee_id) = self.tile_to_attendee.remove(&tile_id) else {
            return;
        };

        // Only connected attendees keep a video flag; a removal signal that
        // trails a departure must not resurrect the entry.
        if self.live_attendees.contains(&attendee_id) || attendee_id == self.self_attendee_id {
            self.video_states.insert(attendee_id.clone(), false);
        }
        self.video_tiles.retain(|t| t.tile_id != tile_id);

        // Focus must point at a present tile; clear it when the focused
        // attendee's last tile disappears.
        if self.focused_attendee_id.as_deref() == Some(attendee_id.as_str())
            && !self
                .video_tiles
                .iter()
                .any(|t| t.attendee_id == attendee_id)
        {
            self.focused_attendee_id = None;
        }
    }

    /// An attendee became present or left.
    pub fn apply_presence(&mut self, attendee_id: &str, present: bool) -> PresenceOutcome {
        if is_content_attendee(attendee_id) {
            return PresenceOutcome::Ignored;
        }
        // The self attendee flaps "not present" during its own join
        // handshake; that does not mean the local user left.
        if attendee_id == self.self_attendee_id && !present {
            return PresenceOutcome::Ignored;
        }

        if present {
            self.live_attendees.insert(attendee_id.to_string());
            let Some(participant) = self.resolve_attendee(attendee_id) else {
                return PresenceOutcome::Unresolved;
            };
            if !self.present.iter().any(|p| p.user_pk == participant.user_pk) {
                self.present.push(participant);
            }
            PresenceOutcome::Joined
        } else {
            self.live_attendees.remove(attendee_id);
            self.mic_states.remove(attendee_id);
            self.video_states.remove(attendee_id);
            if let Some(participant) = self.resolve_attendee(attendee_id) {
                self.present.retain(|p| p.user_pk != participant.user_pk);
            }
            PresenceOutcome::Left
        }
    }

    /// Volume/mute indication for a connected attendee. Indications without
    /// a mute value, or for attendees that already left, are dropped.
    pub fn apply_volume(&mut self, attendee_id: &str, muted: Option<bool>) {
        let Some(muted) = muted else { return };
        if !self.live_attendees.contains(attendee_id) {
            return;
        }
        self.mic_states.insert(attendee_id.to_string(), !muted);
    }

    /// Append a chat message. The log is append-only and ordered by arrival.
    pub fn append_chat(&mut self, sender_id: String, text: String, timestamp: DateTime<Utc>) {
        self.messages.push(ChatMessage {
            sender_id,
            text,
            timestamp,
        });
    }

    /// Recording-status signal. Only the exact payloads `"start"` and
    /// `"stop"` transition the flag; anything else leaves it unchanged.
    pub fn apply_recording_signal(&mut self, payload: &str) -> bool {
        match payload {
            "start" => {
                let changed = !self.recording;
                self.recording = true;
                changed
            }
            "stop" => {
                let changed = self.recording;
                self.recording = false;
                changed
            }
            _ => false,
        }
    }

    /// Replace the durable roster after a (re)fetch. The visible roster is
    /// reset to the fetched list; subsequent presence events re-derive it.
    pub fn set_roster(&mut self, roster: Vec<Participant>) {
        self.present = roster.clone();
        self.roster = roster;
    }

    /// Focus an attendee for large-view display, or clear the focus.
    /// Focusing an attendee without a present video tile is rejected.
    pub fn set_focus(&mut self, attendee_id: Option<String>) -> bool {
        match attendee_id {
            None => {
                self.focused_attendee_id = None;
                true
            }
            Some(id) => {
                if self.video_tiles.iter().any(|t| t.attendee_id == id) {
                    self.focused_attendee_id = Some(id);
                    true
                } else {
                    false
                }
            }
        }
    }

    /// Clear session-scoped view state during cleanup.
    pub fn clear_session_view_state(&mut self) {
        self.remote_content_tile_owner = None;
        self.focused_attendee_id = None;
        self.video_tiles.clear();
        self.tile_to_attendee.clear();
        self.content_tiles.clear();
        self.mic_states.clear();
        self.video_states.clear();
        self.live_attendees.clear();
    }

    /// Resolve an attendee to its durable participant record, if the roster
    /// has caught up. Callers must tolerate `None` for a known attendee.
    #[must_use]
    pub fn resolve_attendee(&self, attendee_id: &str) -> Option<Participant> {
        self.roster
            .iter()
            .find(|p| p.attendee_id.as_deref() == Some(attendee_id))
            .cloned()
    }

    /// Connected attendees the roster cannot resolve yet. Used by the actor
    /// to remember which attendees a completed refetch failed to resolve.
    #[must_use]
    pub fn unresolved_live_attendees(&self) -> Vec<String> {
        self.live_attendees
            .iter()
            .filter(|a| a.as_str() != self.self_attendee_id && self.resolve_attendee(a).is_none())
            .cloned()
            .collect()
    }

    /// Clone out a render-ready snapshot.
    #[must_use]
    pub fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            phase: self.phase,
            self_attendee_id: self.self_attendee_id.clone(),
            self_user_pk: self.self_user_pk.clone(),
            video_tiles: self.video_tiles.clone(),
            mic_states: self.mic_states.clone(),
            video_states: self.video_states.clone(),
            roster: self.roster.clone(),
            present: self.present.clone(),
            messages: self.messages.clone(),
            recording: self.recording,
            focused_attendee_id: self.focused_attendee_id.clone(),
            remote_content_tile_owner: self.remote_content_tile_owner.clone(),
        }
    }
}
