//! `RoomActor` - per-room-entry actor that owns the session and all derived
//! state.
//!
//! Each `RoomActor`:
//! - Exclusively owns the media session, device controller and room state
//! - Bridges the transport event stream into state mutations
//! - Serves user commands (chat, focus, snapshot, leave)
//! - Guarantees the ordered cleanup path runs exactly once, from every exit
//!   trigger (explicit leave, cancellation, transport stream end)
//!
//! # Ordering
//!
//! Commands and transport events are two mailboxes drained by one
//! `tokio::select!` loop, so handlers never run concurrently; within each
//! mailbox, arrival order is preserved. Handlers are idempotent with respect
//! to cross-mailbox interleaving.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use super::messages::{RoomCommand, RoomUpdate};
use super::metrics::RoomMetrics;
use crate::broker::MeetingBroker;
use crate::config::{CHAT_TOPIC, RECORDING_STATUS_TOPIC};
use crate::errors::RoomError;
use crate::state::{PresenceOutcome, RoomPhase, RoomSnapshot, RoomState};
use crate::transport::{DeviceController, MediaSession, TransportEvent};

/// Buffer size for the command mailbox.
const ROOM_COMMAND_BUFFER: usize = 64;

/// Buffer size for the update broadcast channel.
const ROOM_UPDATE_BUFFER: usize = 128;

/// Handle to a `RoomActor`.
#[derive(Clone)]
pub struct RoomHandle {
    sender: mpsc::Sender<RoomCommand>,
    updates: broadcast::Sender<RoomUpdate>,
    cancel_token: CancellationToken,
    metrics: Arc<RoomMetrics>,
}

impl RoomHandle {
    /// Send a chat message. Whitespace-only text is a no-op: nothing is
    /// appended and nothing goes over the wire.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::SendChat {
                text: text.into(),
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::NotActive)?;
        rx.await.map_err(|_| RoomError::NotActive)?
    }

    /// Focus an attendee for large-view display (or clear with `None`).
    /// Returns whether the change was applied.
    pub async fn set_focus(&self, attendee_id: Option<String>) -> Result<bool, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::SetFocus {
                attendee_id,
                respond_to: tx,
            })
            .await
            .map_err(|_| RoomError::NotActive)?;
        rx.await.map_err(|_| RoomError::NotActive)
    }

    /// Get a render-ready snapshot of the room.
    pub async fn snapshot(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(RoomCommand::GetState { respond_to: tx })
            .await
            .map_err(|_| RoomError::NotActive)?;
        rx.await.map_err(|_| RoomError::NotActive)
    }

    /// Leave the room. Every exit trigger converges here; calling it after
    /// the room already left is a harmless success.
    pub async fn leave(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(RoomCommand::Leave { respond_to: tx })
            .await
            .is_err()
        {
            // Actor already gone: cleanup has run.
            return Ok(());
        }
        match rx.await {
            Ok(result) => result,
            Err(_) => Ok(()),
        }
    }

    /// Subscribe to change notifications.
    #[must_use]
    pub fn subscribe_updates(&self) -> broadcast::Receiver<RoomUpdate> {
        self.updates.subscribe()
    }

    /// Cancel the room actor; cleanup runs before it exits.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    /// Check if the actor is cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Shared actor counters.
    #[must_use]
    pub fn metrics(&self) -> &Arc<RoomMetrics> {
        &self.metrics
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    space_pk: String,
    discussion_pk: String,
    receiver: mpsc::Receiver<RoomCommand>,
    /// Clone handed to roster refetch tasks so results land back in the
    /// mailbox.
    self_sender: mpsc::Sender<RoomCommand>,
    events: mpsc::Receiver<TransportEvent>,
    cancel_token: CancellationToken,
    session: Arc<dyn MediaSession>,
    devices: Arc<dyn DeviceController>,
    broker: Arc<dyn MeetingBroker>,
    state: RoomState,
    updates: broadcast::Sender<RoomUpdate>,
    /// Attendees with an active volume subscription.
    volume_subscribed: HashSet<String>,
    /// Single-flight guard for roster refetches.
    roster_refetch_inflight: bool,
    /// Attendees a completed refetch still could not resolve; they do not
    /// trigger another refetch until the roster changes again.
    unresolved_attendees: HashSet<String>,
    data_message_lifetime: Duration,
    cleanup_done: bool,
    metrics: Arc<RoomMetrics>,
}

/// What the run loop should do after a command.
#[derive(PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

impl RoomActor {
    /// Spawn a room actor around an established session.
    ///
    /// Returns a handle and the task join handle.
    #[allow(clippy::too_many_arguments)]
    pub fn spawn(
        space_pk: String,
        discussion_pk: String,
        session: Arc<dyn MediaSession>,
        devices: Arc<dyn DeviceController>,
        broker: Arc<dyn MeetingBroker>,
        events: mpsc::Receiver<TransportEvent>,
        state: RoomState,
        data_message_lifetime: Duration,
    ) -> (RoomHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_COMMAND_BUFFER);
        let (updates, _) = broadcast::channel(ROOM_UPDATE_BUFFER);
        let cancel_token = CancellationToken::new();
        let metrics = RoomMetrics::new();

        let actor = Self {
            space_pk,
            discussion_pk,
            receiver,
            self_sender: sender.clone(),
            events,
            cancel_token: cancel_token.clone(),
            session,
            devices,
            broker,
            state,
            updates: updates.clone(),
            volume_subscribed: HashSet::new(),
            roster_refetch_inflight: false,
            unresolved_attendees: HashSet::new(),
            data_message_lifetime,
            cleanup_done: false,
            metrics: Arc::clone(&metrics),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomHandle {
            sender,
            updates,
            cancel_token,
            metrics,
        };

        (handle, task_handle)
    }

    /// Run the actor loop.
    #[instrument(skip_all, name = "room.actor", fields(space_pk = %self.space_pk, discussion_pk = %self.discussion_pk))]
    async fn run(mut self) {
        info!(target: "room.actor", "RoomActor started");

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(target: "room.actor", "RoomActor received cancellation signal");
                    self.cleanup().await;
                    break;
                }

                cmd = self.receiver.recv() => {
                    match cmd {
                        Some(command) => {
                            if self.handle_command(command).await == Flow::Stop {
                                break;
                            }
                        }
                        None => {
                            info!(target: "room.actor", "Command channel closed, leaving room");
                            self.cleanup().await;
                            break;
                        }
                    }
                }

                event = self.events.recv() => {
                    match event {
                        Some(event) => {
                            self.handle_event(event).await;
                            self.metrics.record_event_processed();
                        }
                        None => {
                            warn!(target: "room.actor", "Transport event stream ended, leaving room");
                            self.cleanup().await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "room.actor",
            events_processed = self.metrics.events_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single command.
    async fn handle_command(&mut self, command: RoomCommand) -> Flow {
        match command {
            RoomCommand::SendChat { text, respond_to } => {
                let result = self.handle_send_chat(&text).await;
                let _ = respond_to.send(result);
                Flow::Continue
            }

            RoomCommand::SetFocus {
                attendee_id,
                respond_to,
            } => {
                let applied = self.state.set_focus(attendee_id);
                if applied {
                    self.publish(RoomUpdate::StateChanged);
                }
                let _ = respond_to.send(applied);
                Flow::Continue
            }

            RoomCommand::GetState { respond_to } => {
                let _ = respond_to.send(self.state.snapshot());
                Flow::Continue
            }

            RoomCommand::Leave { respond_to } => {
                self.cleanup().await;
                let _ = respond_to.send(Ok(()));
                Flow::Stop
            }

            RoomCommand::RosterLoaded { participants } => {
                self.handle_roster_loaded(participants);
                Flow::Continue
            }
        }
    }

    /// Send a chat message: local append first, then the data channel.
    /// A send failure is logged, not surfaced; the local log keeps the entry.
    async fn handle_send_chat(&mut self, text: &str) -> Result<(), RoomError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Ok(());
        }

        self.state.append_chat(
            self.state.self_attendee_id().to_string(),
            trimmed.to_string(),
            chrono::Utc::now(),
        );
        self.metrics.record_chat_message();
        self.publish(RoomUpdate::ChatReceived {
            sender_id: self.state.self_attendee_id().to_string(),
        });

        if let Err(e) = self
            .session
            .send_data(
                CHAT_TOPIC,
                Bytes::copy_from_slice(trimmed.as_bytes()),
                self.data_message_lifetime,
            )
            .await
        {
            warn!(target: "room.actor", error = %e, "Failed to send chat message");
        }
        Ok(())
    }

    /// Handle a single transport event.
    async fn handle_event(&mut self, event: TransportEvent) {
        match event {
            TransportEvent::TileUpdated {
                tile_id,
                attendee_id,
                is_content,
                active,
            } => {
                self.state
                    .apply_tile_update(tile_id, &attendee_id, is_content, active);
                self.publish(RoomUpdate::StateChanged);
            }

            TransportEvent::TileRemoved { tile_id } => {
                self.state.apply_tile_removed(tile_id);
                self.publish(RoomUpdate::StateChanged);
            }

            TransportEvent::Presence {
                attendee_id,
                present,
            } => {
                self.handle_presence(attendee_id, present).await;
            }

            TransportEvent::VolumeChanged { attendee_id, muted } => {
                self.state.apply_volume(&attendee_id, muted);
                self.publish(RoomUpdate::StateChanged);
            }

            TransportEvent::DataMessage {
                topic,
                sender_attendee_id,
                data,
            } => {
                self.handle_data_message(&topic, sender_attendee_id, &data);
            }
        }
    }

    /// Presence transition: keep the visible roster and the volume
    /// subscriptions in step with connected attendees.
    async fn handle_presence(&mut self, attendee_id: String, present: bool) {
        let outcome = self.state.apply_presence(&attendee_id, present);
        match outcome {
            PresenceOutcome::Ignored => {}

            PresenceOutcome::Joined | PresenceOutcome::Unresolved => {
                // Volume indication does not depend on roster resolution.
                if self.volume_subscribed.insert(attendee_id.clone()) {
                    self.session.subscribe_volume(&attendee_id).await;
                }
                if outcome == PresenceOutcome::Unresolved {
                    self.maybe_refetch_roster(&attendee_id);
                }
                self.publish(RoomUpdate::StateChanged);
            }

            PresenceOutcome::Left => {
                if self.volume_subscribed.remove(&attendee_id) {
                    self.session.unsubscribe_volume(&attendee_id).await;
                }
                self.publish(RoomUpdate::StateChanged);
            }
        }
    }

    /// Data-channel dispatch by topic.
    fn handle_data_message(&mut self, topic: &str, sender_attendee_id: String, data: &Bytes) {
        match topic {
            CHAT_TOPIC => {
                let text = String::from_utf8_lossy(data).into_owned();
                self.state
                    .append_chat(sender_attendee_id.clone(), text, chrono::Utc::now());
                self.metrics.record_chat_message();
                self.publish(RoomUpdate::ChatReceived {
                    sender_id: sender_attendee_id,
                });
            }

            RECORDING_STATUS_TOPIC => {
                let payload = String::from_utf8_lossy(data);
                if self.state.apply_recording_signal(&payload) {
                    let recording = self.state.snapshot().recording;
                    self.publish(RoomUpdate::RecordingChanged { recording });
                } else {
                    debug!(
                        target: "room.actor",
                        payload = %payload,
                        "Ignoring unrecognized recording-status payload"
                    );
                }
            }

            other => {
                debug!(target: "room.actor", topic = %other, "Ignoring data message on unknown topic");
            }
        }
    }

    /// Trigger a roster refetch for an attendee the roster cannot resolve.
    ///
    /// Refetches are single-flight, and attendees that stayed unresolved
    /// after a completed refetch are remembered so they cannot spin a
    /// refetch loop.
    fn maybe_refetch_roster(&mut self, attendee_id: &str) {
        if self.roster_refetch_inflight || self.unresolved_attendees.contains(attendee_id) {
            return;
        }
        self.roster_refetch_inflight = true;
        self.metrics.record_roster_refetch();

        let broker = Arc::clone(&self.broker);
        let sender = self.self_sender.clone();
        let space_pk = self.space_pk.clone();
        let discussion_pk = self.discussion_pk.clone();

        tokio::spawn(async move {
            let participants = match broker.fetch_participants(&space_pk, &discussion_pk).await {
                Ok(list) => Some(list),
                Err(e) => {
                    warn!(target: "room.actor", error = %e, "Roster refetch failed");
                    None
                }
            };
            let _ = sender.send(RoomCommand::RosterLoaded { participants }).await;
        });
    }

    /// A roster refetch completed.
    fn handle_roster_loaded(&mut self, participants: Option<Vec<crate::broker::Participant>>) {
        self.roster_refetch_inflight = false;
        if let Some(roster) = participants {
            self.state.set_roster(roster);
            self.unresolved_attendees = self
                .state
                .unresolved_live_attendees()
                .into_iter()
                .collect();
            self.publish(RoomUpdate::StateChanged);
        }
    }

    /// Release all resources for this room entry.
    ///
    /// Runs at most once; every step is best-effort and executes even when
    /// an earlier one failed. Subscriptions come down before the session
    /// reference is released.
    async fn cleanup(&mut self) {
        if self.cleanup_done {
            debug!(target: "room.cleanup", "Cleanup already ran, skipping");
            return;
        }
        self.cleanup_done = true;
        self.metrics.record_cleanup_run();
        self.state.set_phase(RoomPhase::Leaving);

        info!(
            target: "room.cleanup",
            space_pk = %self.space_pk,
            discussion_pk = %self.discussion_pk,
            "Leaving room"
        );

        for attendee_id in self.volume_subscribed.drain().collect::<Vec<_>>() {
            self.session.unsubscribe_volume(&attendee_id).await;
        }

        // 1. Stop the local tile and the audio/video transport.
        self.session.stop_local_video().await;
        self.session.stop().await;

        // 2. Force-release still-open camera captures; transport stop alone
        //    does not release the camera everywhere.
        match self.devices.list_video_inputs().await {
            Ok(devices) => {
                for device in devices {
                    if let Err(e) = self.devices.release_capture(&device).await {
                        debug!(
                            target: "room.cleanup",
                            device_id = %device.device_id,
                            error = %e,
                            "Failed to release video capture"
                        );
                    }
                }
            }
            Err(e) => {
                debug!(target: "room.cleanup", error = %e, "Failed to enumerate video devices");
            }
        }

        // 3. Destroy the device controller.
        self.devices.destroy().await;

        // 4. Tell the broker we are gone so server-side roster state
        //    converges without waiting for a presence timeout.
        if let Err(e) = self
            .broker
            .notify_exit(&self.space_pk, &self.discussion_pk)
            .await
        {
            debug!(target: "room.cleanup", error = %e, "Exit notification failed");
        }

        // 5. Clear session-scoped view state.
        self.state.clear_session_view_state();
        self.state.set_phase(RoomPhase::Idle);

        self.publish(RoomUpdate::Left);
        info!(target: "room.cleanup", "Cleanup complete");
    }

    fn publish(&self, update: RoomUpdate) {
        // No receivers is fine; updates are advisory.
        let _ = self.updates.send(update);
    }
}
