//! Meeting broker boundary.
//!
//! The broker is the remote service that issues join credentials for the
//! real-time transport and tracks the durable participant roster for a
//! discussion. It is a remote procedure boundary returning JSON; the join
//! response is normalized through [`join_info`] because deployments answer
//! in more than one key-casing convention.
//!
//! - [`MeetingBroker`] - the trait the controller depends on
//! - [`HttpMeetingBroker`](http::HttpMeetingBroker) - reqwest implementation

pub mod http;
pub mod join_info;

pub use http::HttpMeetingBroker;
pub use join_info::{AttendeeInfo, JoinInfo, MediaPlacement, MeetingInfo};

use crate::errors::RoomError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A durable application-level user record for a discussion.
///
/// Distinct from an attendee: a participant exists independently of any live
/// transport connection. When the participant is currently connected,
/// `attendee_id` carries the transport identity their media streams are
/// bound to; it is the key that resolves attendee → participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Participant {
    /// Stable user identifier.
    pub user_pk: String,

    /// Username, preferred for display labels.
    #[serde(default)]
    pub author_username: Option<String>,

    /// Display name, fallback label.
    #[serde(default)]
    pub author_display_name: Option<String>,

    /// Avatar URL.
    #[serde(default)]
    pub author_profile_url: Option<String>,

    /// Live transport attendee id, present only while connected.
    #[serde(default, alias = "participant_id")]
    pub attendee_id: Option<String>,
}

impl Participant {
    /// Display label: username, falling back to display name.
    #[must_use]
    pub fn nickname(&self) -> Option<&str> {
        self.author_username
            .as_deref()
            .or(self.author_display_name.as_deref())
    }
}

/// The remote meeting broker.
///
/// `join_meeting` failures are fatal to room entry; `notify_exit` is
/// best-effort and its failures are swallowed by the cleanup path.
#[async_trait]
pub trait MeetingBroker: Send + Sync {
    /// Obtain join credentials for a (space, discussion) pair.
    async fn join_meeting(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<JoinInfo, RoomError>;

    /// Notify the broker that this participant has exited the room, so
    /// server-side roster state converges without waiting for a presence
    /// timeout.
    async fn notify_exit(&self, space_pk: &str, discussion_pk: &str) -> Result<(), RoomError>;

    /// Fetch the durable participant roster for a discussion.
    async fn fetch_participants(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<Vec<Participant>, RoomError>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_nickname_prefers_username() {
        let p = Participant {
            user_pk: "u-1".into(),
            author_username: Some("alice".into()),
            author_display_name: Some("Alice A".into()),
            author_profile_url: None,
            attendee_id: None,
        };
        assert_eq!(p.nickname(), Some("alice"));
    }

    #[test]
    fn test_nickname_falls_back_to_display_name() {
        let p = Participant {
            user_pk: "u-1".into(),
            author_username: None,
            author_display_name: Some("Alice A".into()),
            author_profile_url: None,
            attendee_id: None,
        };
        assert_eq!(p.nickname(), Some("Alice A"));
    }

    #[test]
    fn test_participant_id_alias() {
        let p: Participant = serde_json::from_value(serde_json::json!({
            "user_pk": "u-1",
            "participant_id": "att-1"
        }))
        .unwrap();
        assert_eq!(p.attendee_id.as_deref(), Some("att-1"));
    }
}
