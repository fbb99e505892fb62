//! Room entry: credential acquisition and session bring-up.
//!
//! [`RoomEntry`] drives the join sequence for one discussion room:
//! broker join, roster seed, transport connect, session start, then hands
//! everything to a spawned [`RoomActor`](crate::actors::RoomActor). The
//! sequence is one-shot per entry; a second `enter` call on the same value
//! fails with [`RoomError::AlreadyEntered`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{info, instrument, warn};

use crate::actors::{RoomActor, RoomHandle};
use crate::broker::MeetingBroker;
use crate::errors::RoomError;
use crate::state::{RoomPhase, RoomState};
use crate::transport::MediaConnector;

/// One-shot room entry point.
pub struct RoomEntry {
    broker: Arc<dyn MeetingBroker>,
    connector: Arc<dyn MediaConnector>,
    data_message_lifetime: Duration,
    entered: AtomicBool,
}

impl RoomEntry {
    #[must_use]
    pub fn new(
        broker: Arc<dyn MeetingBroker>,
        connector: Arc<dyn MediaConnector>,
        data_message_lifetime: Duration,
    ) -> Self {
        Self {
            broker,
            connector,
            data_message_lifetime,
            entered: AtomicBool::new(false),
        }
    }

    /// Join a discussion room and start the media session.
    ///
    /// Broker join and transport connect failures are fatal; a failed roster
    /// fetch is not, the room starts with an empty roster and catches up via
    /// refetch. On failure the entry guard is released so the caller can
    /// retry with the same value.
    #[instrument(skip(self), name = "room.enter")]
    pub async fn enter(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<(RoomHandle, JoinHandle<()>), RoomError> {
        if self
            .entered
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(RoomError::AlreadyEntered);
        }

        match self.enter_inner(space_pk, discussion_pk).await {
            Ok(handles) => Ok(handles),
            Err(e) => {
                self.entered.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn enter_inner(
        &self,
        space_pk: &str,
        discussion_pk: &str,
    ) -> Result<(RoomHandle, JoinHandle<()>), RoomError> {
        info!(target: "room.entry", "Joining room");
        let join_info = self.broker.join_meeting(space_pk, discussion_pk).await?;

        // Seed the roster from the join response when present, otherwise
        // fetch it. Neither is load-bearing for entry itself.
        let roster = match join_info.participants.clone() {
            Some(list) => list,
            None => match self.broker.fetch_participants(space_pk, discussion_pk).await {
                Ok(list) => list,
                Err(e) => {
                    warn!(target: "room.entry", error = %e, "Initial roster fetch failed, starting empty");
                    Vec::new()
                }
            },
        };

        let connected = self.connector.connect(&join_info).await?;

        // Start audio/video before exposing a handle; a room that never
        // started must not look joined.
        if let Err(e) = connected.session.start().await {
            warn!(target: "room.entry", error = %e, "Session start failed, tearing down");
            connected.session.stop().await;
            connected.devices.destroy().await;
            return Err(e);
        }

        let mut state = RoomState::new(
            join_info.attendee.attendee_id.clone(),
            join_info.attendee.external_user_id.clone(),
            roster,
        );
        state.set_phase(RoomPhase::Active);

        info!(
            target: "room.entry",
            meeting_id = %join_info.meeting.meeting_id,
            attendee_id = %join_info.attendee.attendee_id,
            "Room joined"
        );

        Ok(RoomActor::spawn(
            space_pk.to_string(),
            discussion_pk.to_string(),
            connected.session,
            connected.devices,
            Arc::clone(&self.broker),
            connected.events,
            state,
            self.data_message_lifetime,
        ))
    }
}
