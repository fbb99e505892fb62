//! Shape-tolerant normalization of the broker join response.
//!
//! Deployments answer join requests in more than one key-casing convention:
//! `snake_case`, `PascalCase`, and either of those wrapped in a `data`
//! envelope. Normalization maps every known spelling into one canonical
//! record and fails only when no recognized spelling carries a required
//! field. This tolerance is contract, not accident.

use std::fmt;

use serde_json::Value;

use super::Participant;
use crate::errors::JoinInfoError;

/// Media placement URLs for the real-time transport.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaPlacement {
    pub audio_host_url: String,
    pub audio_fallback_url: String,
    pub screen_data_url: String,
    pub screen_sharing_url: String,
    pub screen_viewing_url: String,
    pub signaling_url: String,
    pub turn_control_url: String,
}

/// Canonical meeting record from the broker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeetingInfo {
    pub meeting_id: String,
    pub media_region: String,
    pub media_placement: MediaPlacement,
}

/// Canonical attendee credentials from the broker.
///
/// The join token is an opaque secret; it is redacted in Debug output.
#[derive(Clone, PartialEq, Eq)]
pub struct AttendeeInfo {
    pub attendee_id: String,
    pub external_user_id: String,
    pub join_token: String,
}

impl fmt::Debug for AttendeeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AttendeeInfo")
            .field("attendee_id", &self.attendee_id)
            .field("external_user_id", &self.external_user_id)
            .field("join_token", &"[REDACTED]")
            .finish()
    }
}

/// Normalized join credentials for one room entry.
#[derive(Debug, Clone)]
pub struct JoinInfo {
    pub meeting: MeetingInfo,
    pub attendee: AttendeeInfo,
    /// Initial roster, when the broker includes one in the join response.
    pub participants: Option<Vec<Participant>>,
}

impl JoinInfo {
    /// Normalize a raw broker response.
    ///
    /// Accepts `meeting`/`Meeting`, `attendee`/`Attendee`, and
    /// `participants`/`Participants`, each at the top level or nested under
    /// a `data` envelope. Fails with [`JoinInfoError`] when the meeting or
    /// attendee object (or a required field inside them) cannot be found
    /// under any recognized spelling.
    pub fn from_raw(raw: &Value) -> Result<Self, JoinInfoError> {
        let meeting_obj =
            pick_enveloped(raw, &["meeting", "Meeting"]).ok_or(JoinInfoError::MissingMeeting)?;
        let attendee_obj =
            pick_enveloped(raw, &["attendee", "Attendee"]).ok_or(JoinInfoError::MissingAttendee)?;

        let meeting = MeetingInfo {
            meeting_id: require_str(meeting_obj, &["meeting_id", "MeetingId"], "meeting_id")?,
            media_region: optional_str(meeting_obj, &["media_region", "MediaRegion"]),
            media_placement: normalize_placement(meeting_obj),
        };

        let attendee = AttendeeInfo {
            attendee_id: require_str(attendee_obj, &["attendee_id", "AttendeeId"], "attendee_id")?,
            external_user_id: require_str(
                attendee_obj,
                &["external_user_id", "ExternalUserId"],
                "external_user_id",
            )?,
            join_token: require_str(attendee_obj, &["join_token", "JoinToken"], "join_token")?,
        };

        // The roster list is optional and best-effort: an unparseable list
        // is dropped, the initial roster fetch covers it.
        let participants = pick_enveloped(raw, &["participants", "Participants"])
            .and_then(|v| serde_json::from_value::<Vec<Participant>>(v.clone()).ok());

        Ok(JoinInfo {
            meeting,
            attendee,
            participants,
        })
    }
}

/// Media placement URLs are not load-bearing for the controller itself, so
/// unresolvable entries fall back to empty strings rather than failing.
fn normalize_placement(meeting: &Value) -> MediaPlacement {
    let placement = pick(meeting, &["media_placement", "MediaPlacement"]);
    let Some(placement) = placement else {
        return MediaPlacement::default();
    };

    MediaPlacement {
        audio_host_url: optional_str(placement, &["audio_host_url", "AudioHostUrl"]),
        audio_fallback_url: optional_str(placement, &["audio_fallback_url", "AudioFallbackUrl"]),
        screen_data_url: optional_str(placement, &["screen_data_url", "ScreenDataUrl"]),
        screen_sharing_url: optional_str(placement, &["screen_sharing_url", "ScreenSharingUrl"]),
        screen_viewing_url: optional_str(placement, &["screen_viewing_url", "ScreenViewingUrl"]),
        signaling_url: optional_str(placement, &["signaling_url", "SignalingUrl"]),
        turn_control_url: optional_str(placement, &["turn_control_url", "TurnControlUrl"]),
    }
}

/// Look up the first present spelling of a key.
fn pick<'a>(obj: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(k)).filter(|v| !v.is_null())
}

/// Look up a key at the top level or nested under a `data` envelope.
fn pick_enveloped<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    pick(raw, keys).or_else(|| raw.get("data").and_then(|data| pick(data, keys)))
}

fn require_str(
    obj: &Value,
    keys: &[&str],
    field: &'static str,
) -> Result<String, JoinInfoError> {
    pick(obj, keys)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .ok_or(JoinInfoError::MissingField(field))
}

fn optional_str(obj: &Value, keys: &[&str]) -> String {
    pick(obj, keys)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
