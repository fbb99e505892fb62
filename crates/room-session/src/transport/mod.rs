//! Real-time media transport boundary.
//!
//! The actual media transport (signaling, negotiation, frames) lives outside
//! this repository. The controller depends only on the capability interface
//! here, so its logic runs unchanged against a fake transport in tests.
//!
//! The transport's callback-style event sources are bridged into one
//! [`TransportEvent`] mpsc channel. A single queue preserves arrival order
//! within each topic, which is the only ordering the controller relies on;
//! handlers stay idempotent with respect to cross-topic interleaving.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use crate::broker::JoinInfo;
use crate::errors::RoomError;

/// Buffer size for the transport event channel.
pub const TRANSPORT_EVENT_BUFFER: usize = 256;

/// Marker segment in attendee ids that denotes a synthetic content-share
/// attendee rather than a real participant.
pub const CONTENT_ATTENDEE_MARKER: &str = "#content";

/// A raw event delivered by the transport.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A video tile was created or its activity changed.
    TileUpdated {
        tile_id: u64,
        attendee_id: String,
        /// Whether this tile carries a content share rather than a camera.
        is_content: bool,
        /// Whether the tile currently has an active video stream.
        active: bool,
    },

    /// A video tile was removed. Carries only the tile id; the controller
    /// resolves the owning attendee through its tile map.
    TileRemoved { tile_id: u64 },

    /// An attendee became present or left.
    Presence { attendee_id: String, present: bool },

    /// Volume/mute indication for a subscribed attendee. `muted` is absent
    /// when the transport cannot tell.
    VolumeChanged {
        attendee_id: String,
        muted: Option<bool>,
    },

    /// A data-channel message arrived on a topic.
    DataMessage {
        topic: String,
        sender_attendee_id: String,
        data: Bytes,
    },
}

/// A local video capture device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoInputDevice {
    pub device_id: String,
    pub label: String,
}

/// One active real-time session, exclusively owned by the room controller.
#[async_trait]
pub trait MediaSession: Send + Sync {
    /// The local identity this session is bound to.
    fn self_attendee_id(&self) -> &str;

    /// Start the audio/video transport.
    async fn start(&self) -> Result<(), RoomError>;

    /// Stop the audio/video transport.
    async fn stop(&self);

    /// Stop the local video tile.
    async fn stop_local_video(&self);

    /// Begin volume/mute indication for an attendee.
    async fn subscribe_volume(&self, attendee_id: &str);

    /// End volume/mute indication for an attendee.
    async fn unsubscribe_volume(&self, attendee_id: &str);

    /// Send a data-channel message on a topic.
    async fn send_data(
        &self,
        topic: &str,
        data: Bytes,
        lifetime: Duration,
    ) -> Result<(), RoomError>;
}

/// Local media device control, separate from the session so cleanup can
/// release captures after the transport has stopped.
#[async_trait]
pub trait DeviceController: Send + Sync {
    /// Enumerate local video capture devices.
    async fn list_video_inputs(&self) -> Result<Vec<VideoInputDevice>, RoomError>;

    /// Forcibly release a still-open capture. Some platforms do not release
    /// the camera on transport stop alone.
    async fn release_capture(&self, device: &VideoInputDevice) -> Result<(), RoomError>;

    /// Destroy the controller, releasing any remaining handles.
    async fn destroy(&self);
}

/// Everything the connector hands back for one room entry.
pub struct ConnectedSession {
    pub session: Arc<dyn MediaSession>,
    pub devices: Arc<dyn DeviceController>,
    pub events: mpsc::Receiver<TransportEvent>,
}

/// Builds a session from join credentials.
///
/// A connector implementation binds the default audio output sink and
/// registers the lazy device-permission trigger before returning; device or
/// permission failures there are non-fatal and leave the affected
/// capability off.
#[async_trait]
pub trait MediaConnector: Send + Sync {
    async fn connect(&self, join_info: &JoinInfo) -> Result<ConnectedSession, RoomError>;
}

/// Whether an attendee id denotes a synthetic content-share attendee.
#[must_use]
pub fn is_content_attendee(attendee_id: &str) -> bool {
    attendee_id.contains(CONTENT_ATTENDEE_MARKER)
}

/// The real attendee that owns a content-share attendee id.
#[must_use]
pub fn content_share_owner(attendee_id: &str) -> &str {
    attendee_id
        .split(CONTENT_ATTENDEE_MARKER)
        .next()
        .unwrap_or(attendee_id)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_content_attendee_detection() {
        assert!(is_content_attendee("att-1#content"));
        assert!(!is_content_attendee("att-1"));
    }

    #[test]
    fn test_content_share_owner() {
        assert_eq!(content_share_owner("att-1#content"), "att-1");
        assert_eq!(content_share_owner("att-1"), "att-1");
    }
}
