//! Pre-built participants and broker responses for tests.

use serde_json::{json, Value};

use room_session::broker::Participant;

/// Attendee id the default join response binds to the local session.
pub const SELF_ATTENDEE_ID: &str = "att-self";

/// User key carried as the local attendee's external user id.
pub const SELF_USER_PK: &str = "u-self";

/// A connected participant with a live transport identity.
#[must_use]
pub fn participant(user_pk: &str, attendee_id: &str) -> Participant {
    Participant {
        user_pk: user_pk.to_string(),
        author_username: Some(format!("user-{user_pk}")),
        author_display_name: None,
        author_profile_url: None,
        attendee_id: Some(attendee_id.to_string()),
    }
}

/// A roster entry without a live transport identity.
#[must_use]
pub fn offline_participant(user_pk: &str) -> Participant {
    Participant {
        user_pk: user_pk.to_string(),
        author_username: Some(format!("user-{user_pk}")),
        author_display_name: None,
        author_profile_url: None,
        attendee_id: None,
    }
}

/// The local participant matching [`SELF_ATTENDEE_ID`].
#[must_use]
pub fn self_participant() -> Participant {
    participant(SELF_USER_PK, SELF_ATTENDEE_ID)
}

/// Join response in the broker's snake_case shape.
#[must_use]
pub fn join_response_snake_case() -> Value {
    json!({
        "meeting": {
            "meeting_id": "m-1",
            "media_region": "ap-northeast-2",
            "media_placement": {
                "audio_host_url": "wss://audio.test.invalid",
                "signaling_url": "wss://signal.test.invalid"
            }
        },
        "attendee": {
            "attendee_id": SELF_ATTENDEE_ID,
            "external_user_id": SELF_USER_PK,
            "join_token": "tok-test"
        }
    })
}

/// Join response in the upstream PascalCase shape.
#[must_use]
pub fn join_response_pascal_case() -> Value {
    json!({
        "Meeting": {
            "MeetingId": "m-1",
            "MediaRegion": "ap-northeast-2",
            "MediaPlacement": {
                "AudioHostUrl": "wss://audio.test.invalid",
                "SignalingUrl": "wss://signal.test.invalid"
            }
        },
        "Attendee": {
            "AttendeeId": SELF_ATTENDEE_ID,
            "ExternalUserId": SELF_USER_PK,
            "JoinToken": "tok-test"
        }
    })
}

/// Snake_case join response wrapped in a `data` envelope, with a seeded
/// roster list.
#[must_use]
pub fn join_response_enveloped_with_roster(roster: &[Participant]) -> Value {
    let mut inner = join_response_snake_case();
    if let Value::Object(map) = &mut inner {
        map.insert(
            "participants".to_string(),
            serde_json::to_value(roster).unwrap_or(Value::Null),
        );
    }
    json!({ "data": inner })
}
