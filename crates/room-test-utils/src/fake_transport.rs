//! Scripted media transport for controller tests.
//!
//! `FakeConnector` hands the controller a session plus event stream; the
//! test keeps a [`TransportDriver`] to push transport events and the
//! `FakeSession`/`FakeDeviceController` handles to assert on teardown
//! behavior.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use room_session::broker::JoinInfo;
use room_session::errors::RoomError;
use room_session::transport::{
    ConnectedSession, DeviceController, MediaConnector, MediaSession, TransportEvent,
    VideoInputDevice, TRANSPORT_EVENT_BUFFER,
};

/// Test-side handle that feeds events into the controller.
#[derive(Clone)]
pub struct TransportDriver {
    sender: mpsc::Sender<TransportEvent>,
}

impl TransportDriver {
    pub async fn tile_updated(&self, tile_id: u64, attendee_id: &str, is_content: bool, active: bool) {
        self.send(TransportEvent::TileUpdated {
            tile_id,
            attendee_id: attendee_id.to_string(),
            is_content,
            active,
        })
        .await;
    }

    pub async fn tile_removed(&self, tile_id: u64) {
        self.send(TransportEvent::TileRemoved { tile_id }).await;
    }

    pub async fn presence(&self, attendee_id: &str, present: bool) {
        self.send(TransportEvent::Presence {
            attendee_id: attendee_id.to_string(),
            present,
        })
        .await;
    }

    pub async fn volume(&self, attendee_id: &str, muted: Option<bool>) {
        self.send(TransportEvent::VolumeChanged {
            attendee_id: attendee_id.to_string(),
            muted,
        })
        .await;
    }

    pub async fn data_message(&self, topic: &str, sender_attendee_id: &str, data: &[u8]) {
        self.send(TransportEvent::DataMessage {
            topic: topic.to_string(),
            sender_attendee_id: sender_attendee_id.to_string(),
            data: Bytes::copy_from_slice(data),
        })
        .await;
    }

    async fn send(&self, event: TransportEvent) {
        let _ = self.sender.send(event).await;
    }
}

/// Recorded fake session.
#[derive(Debug, Default)]
pub struct FakeSession {
    self_attendee_id: String,
    started: AtomicBool,
    stopped: AtomicBool,
    local_video_stopped: AtomicBool,
    fail_send_data: AtomicBool,
    volume_subscriptions: Mutex<Vec<String>>,
    volume_unsubscriptions: Mutex<Vec<String>>,
    sent_messages: Mutex<Vec<(String, Bytes)>>,
}

impl FakeSession {
    #[must_use]
    pub fn started(&self) -> bool {
        self.started.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn local_video_stopped(&self) -> bool {
        self.local_video_stopped.load(Ordering::SeqCst)
    }

    /// Make subsequent `send_data` calls fail.
    pub fn fail_send_data(&self) {
        self.fail_send_data.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn volume_subscriptions(&self) -> Vec<String> {
        lock(&self.volume_subscriptions).clone()
    }

    #[must_use]
    pub fn volume_unsubscriptions(&self) -> Vec<String> {
        lock(&self.volume_unsubscriptions).clone()
    }

    /// Data messages sent over the wire, as `(topic, payload)` pairs.
    #[must_use]
    pub fn sent_messages(&self) -> Vec<(String, Bytes)> {
        lock(&self.sent_messages).clone()
    }
}

#[async_trait]
impl MediaSession for FakeSession {
    fn self_attendee_id(&self) -> &str {
        &self.self_attendee_id
    }

    async fn start(&self) -> Result<(), RoomError> {
        self.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
    }

    async fn stop_local_video(&self) {
        self.local_video_stopped.store(true, Ordering::SeqCst);
    }

    async fn subscribe_volume(&self, attendee_id: &str) {
        lock(&self.volume_subscriptions).push(attendee_id.to_string());
    }

    async fn unsubscribe_volume(&self, attendee_id: &str) {
        lock(&self.volume_unsubscriptions).push(attendee_id.to_string());
    }

    async fn send_data(
        &self,
        topic: &str,
        data: Bytes,
        _lifetime: Duration,
    ) -> Result<(), RoomError> {
        if self.fail_send_data.load(Ordering::SeqCst) {
            return Err(RoomError::Transport("data channel closed".to_string()));
        }
        lock(&self.sent_messages).push((topic.to_string(), data));
        Ok(())
    }
}

/// Recorded fake device controller.
#[derive(Debug, Default)]
pub struct FakeDeviceController {
    devices: Mutex<Vec<VideoInputDevice>>,
    fail_enumeration: AtomicBool,
    released: Mutex<Vec<String>>,
    destroyed: AtomicBool,
}

impl FakeDeviceController {
    /// Seed the devices enumeration will return.
    pub fn set_devices(&self, devices: Vec<VideoInputDevice>) {
        *lock(&self.devices) = devices;
    }

    /// Make enumeration fail, exercising the best-effort cleanup path.
    pub fn fail_enumeration(&self) {
        self.fail_enumeration.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn released(&self) -> Vec<String> {
        lock(&self.released).clone()
    }

    #[must_use]
    pub fn destroyed(&self) -> bool {
        self.destroyed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceController for FakeDeviceController {
    async fn list_video_inputs(&self) -> Result<Vec<VideoInputDevice>, RoomError> {
        if self.fail_enumeration.load(Ordering::SeqCst) {
            return Err(RoomError::Transport("enumeration denied".to_string()));
        }
        Ok(lock(&self.devices).clone())
    }

    async fn release_capture(&self, device: &VideoInputDevice) -> Result<(), RoomError> {
        lock(&self.released).push(device.device_id.clone());
        Ok(())
    }

    async fn destroy(&self) {
        self.destroyed.store(true, Ordering::SeqCst);
    }
}

/// Fake connector: single-use, scripted from the outside.
pub struct FakeConnector {
    session: Arc<FakeSession>,
    devices: Arc<FakeDeviceController>,
    driver: TransportDriver,
    events: Mutex<Option<mpsc::Receiver<TransportEvent>>>,
    fail_connect: AtomicBool,
}

impl Default for FakeConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeConnector {
    /// Connector whose session identity matches the default join fixture.
    #[must_use]
    pub fn new() -> Self {
        Self::with_attendee_id(crate::fixtures::SELF_ATTENDEE_ID)
    }

    /// Connector with an explicit session identity.
    #[must_use]
    pub fn with_attendee_id(attendee_id: &str) -> Self {
        let (sender, receiver) = mpsc::channel(TRANSPORT_EVENT_BUFFER);
        Self {
            session: Arc::new(FakeSession {
                self_attendee_id: attendee_id.to_string(),
                ..FakeSession::default()
            }),
            devices: Arc::new(FakeDeviceController::default()),
            driver: TransportDriver { sender },
            events: Mutex::new(Some(receiver)),
            fail_connect: AtomicBool::new(false),
        }
    }

    /// Make `connect` fail, exercising fatal acquisition errors.
    pub fn fail_connect(&self) {
        self.fail_connect.store(true, Ordering::SeqCst);
    }

    /// Driver used by the test to push transport events.
    #[must_use]
    pub fn driver(&self) -> TransportDriver {
        self.driver.clone()
    }

    #[must_use]
    pub fn session(&self) -> Arc<FakeSession> {
        Arc::clone(&self.session)
    }

    #[must_use]
    pub fn devices(&self) -> Arc<FakeDeviceController> {
        Arc::clone(&self.devices)
    }
}

#[async_trait]
impl MediaConnector for FakeConnector {
    async fn connect(&self, _join_info: &JoinInfo) -> Result<ConnectedSession, RoomError> {
        if self.fail_connect.load(Ordering::SeqCst) {
            return Err(RoomError::Transport("connect refused".to_string()));
        }
        let events = lock(&self.events)
            .take()
            .ok_or_else(|| RoomError::Transport("connector already used".to_string()))?;

        Ok(ConnectedSession {
            session: Arc::clone(&self.session) as Arc<dyn MediaSession>,
            devices: Arc::clone(&self.devices) as Arc<dyn DeviceController>,
            events,
        })
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
