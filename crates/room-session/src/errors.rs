//! Room session error types.
//!
//! Only acquisition failures are fatal to room entry and propagate to the
//! caller. Everything that happens after the session is bound (device
//! failures, cleanup-step failures, malformed event payloads) is recovered
//! locally and logged, never thrown.

use thiserror::Error;

/// Room session error type.
#[derive(Debug, Error)]
pub enum RoomError {
    /// Broker request failed (network error, non-success status).
    #[error("Broker error: {0}")]
    Broker(String),

    /// Broker join response could not be normalized into join credentials.
    #[error("Malformed join info: {0}")]
    MalformedJoinInfo(JoinInfoError),

    /// Media transport operation failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Room entry was attempted more than once on the same entry guard.
    #[error("Room already entered")]
    AlreadyEntered,

    /// The room actor has already shut down.
    #[error("Room is not active")]
    NotActive,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error (actor channel closed unexpectedly).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Join-info normalization errors.
///
/// The broker is allowed to answer in several key-casing conventions; these
/// errors fire only when no recognized spelling carries a required field.
#[derive(Debug, Error)]
pub enum JoinInfoError {
    /// The `meeting` object is missing in every recognized spelling.
    #[error("missing meeting object")]
    MissingMeeting,

    /// The `attendee` object is missing in every recognized spelling.
    #[error("missing attendee object")]
    MissingAttendee,

    /// A required field inside meeting/attendee is missing.
    #[error("missing field `{0}`")]
    MissingField(&'static str),
}

impl From<JoinInfoError> for RoomError {
    fn from(err: JoinInfoError) -> Self {
        RoomError::MalformedJoinInfo(err)
    }
}

impl From<crate::config::ConfigError> for RoomError {
    fn from(err: crate::config::ConfigError) -> Self {
        RoomError::Config(err.to_string())
    }
}

impl RoomError {
    /// Whether this error is fatal to room entry.
    ///
    /// Fatal errors surface to the caller as a visible error state; the room
    /// is not entered and no partial session state is retained.
    #[must_use]
    pub fn is_fatal_to_entry(&self) -> bool {
        matches!(
            self,
            RoomError::Broker(_)
                | RoomError::MalformedJoinInfo(_)
                | RoomError::Transport(_)
                | RoomError::AlreadyEntered
                | RoomError::Config(_)
        )
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_join_info_error_conversion() {
        let err: RoomError = JoinInfoError::MissingMeeting.into();
        assert!(matches!(err, RoomError::MalformedJoinInfo(_)));
        assert!(err.is_fatal_to_entry());
    }

    #[test]
    fn test_display_formatting() {
        assert_eq!(
            format!("{}", RoomError::Broker("timeout".to_string())),
            "Broker error: timeout"
        );
        assert_eq!(
            format!(
                "{}",
                RoomError::MalformedJoinInfo(JoinInfoError::MissingField("join_token"))
            ),
            "Malformed join info: missing field `join_token`"
        );
    }

    #[test]
    fn test_fatality_classification() {
        assert!(RoomError::Broker("down".into()).is_fatal_to_entry());
        assert!(!RoomError::NotActive.is_fatal_to_entry());
        assert!(!RoomError::Internal("channel closed".into()).is_fatal_to_entry());
    }
}
