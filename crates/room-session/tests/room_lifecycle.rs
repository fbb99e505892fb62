//! End-to-end room lifecycle tests against fake broker and transport.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use room_session::actors::{RoomHandle, RoomUpdate};
use room_session::broker::MeetingBroker;
use room_session::errors::{JoinInfoError, RoomError};
use room_session::state::{RoomPhase, RoomSnapshot};
use room_session::transport::{MediaConnector, VideoInputDevice};
use room_session::RoomEntry;
use room_test_utils::{fixtures, FakeBroker, FakeConnector};

const SPACE: &str = "space-1";
const DISCUSSION: &str = "disc-1";
const DATA_LIFETIME: Duration = Duration::from_millis(10_000);

struct Harness {
    broker: Arc<FakeBroker>,
    connector: Arc<FakeConnector>,
    entry: RoomEntry,
}

fn harness(broker: FakeBroker) -> Harness {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();

    let broker = Arc::new(broker);
    let connector = Arc::new(FakeConnector::new());
    let entry = RoomEntry::new(
        Arc::clone(&broker) as Arc<dyn MeetingBroker>,
        Arc::clone(&connector) as Arc<dyn MediaConnector>,
        DATA_LIFETIME,
    );
    Harness {
        broker,
        connector,
        entry,
    }
}

/// Poll snapshots until `pred` holds. Commands and transport events live in
/// separate mailboxes, so a snapshot request can overtake an event.
async fn wait_for<F>(handle: &RoomHandle, pred: F) -> RoomSnapshot
where
    F: Fn(&RoomSnapshot) -> bool,
{
    for _ in 0..200 {
        if let Ok(snap) = handle.snapshot().await {
            if pred(&snap) {
                return snap;
            }
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("room never reached expected state");
}

#[tokio::test]
async fn test_enter_fetches_roster_and_starts_session() {
    let h = harness(FakeBroker::new().with_roster(vec![
        fixtures::self_participant(),
        fixtures::participant("u-a", "att-a"),
    ]));

    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    assert!(h.connector.session().started());
    assert_eq!(h.broker.join_calls(), 1);
    assert_eq!(h.broker.roster_fetches(), 1);

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::Active);
    assert_eq!(snap.self_attendee_id, fixtures::SELF_ATTENDEE_ID);
    assert_eq!(snap.self_user_pk, fixtures::SELF_USER_PK);
    assert_eq!(snap.roster.len(), 2);
    // Self attendee seeds muted.
    assert_eq!(snap.mic_states.get(fixtures::SELF_ATTENDEE_ID), Some(&false));

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_enter_seeds_roster_from_join_response() {
    let roster = vec![
        fixtures::self_participant(),
        fixtures::participant("u-a", "att-a"),
    ];
    let h = harness(
        FakeBroker::new()
            .with_join_response(fixtures::join_response_enveloped_with_roster(&roster)),
    );

    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    // The join response carried the roster, so no fetch was needed.
    assert_eq!(h.broker.roster_fetches(), 0);
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.roster.len(), 2);

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_enter_accepts_pascal_case_join_response() {
    let h = harness(
        FakeBroker::new().with_join_response(fixtures::join_response_pascal_case()),
    );

    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    // The upstream casing normalizes to the same canonical identities.
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::Active);
    assert_eq!(snap.self_attendee_id, fixtures::SELF_ATTENDEE_ID);
    assert_eq!(snap.self_user_pk, fixtures::SELF_USER_PK);

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_enter_tolerates_failed_roster_fetch() {
    let h = harness(FakeBroker::new().failing_fetch());

    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.phase, RoomPhase::Active);
    assert!(snap.roster.is_empty());

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_second_enter_rejected_while_entered() {
    let h = harness(FakeBroker::new());

    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let second = h.entry.enter(SPACE, DISCUSSION).await;
    assert!(matches!(second, Err(RoomError::AlreadyEntered)));

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_failed_join_releases_entry_guard() {
    let h = harness(FakeBroker::new().failing_join());

    let first = h.entry.enter(SPACE, DISCUSSION).await;
    assert!(matches!(first, Err(RoomError::Broker(_))));

    // The guard was released; the retry reaches the broker again instead of
    // failing with AlreadyEntered.
    let second = h.entry.enter(SPACE, DISCUSSION).await;
    assert!(matches!(second, Err(RoomError::Broker(_))));
    assert_eq!(h.broker.join_calls(), 2);
}

#[tokio::test]
async fn test_malformed_join_response_rejected() {
    let h = harness(FakeBroker::new().with_join_response(json!({
        "attendee": {
            "attendee_id": "a",
            "external_user_id": "u",
            "join_token": "t"
        }
    })));

    let result = h.entry.enter(SPACE, DISCUSSION).await;
    assert!(matches!(
        result,
        Err(RoomError::MalformedJoinInfo(JoinInfoError::MissingMeeting))
    ));
    assert!(!h.connector.session().started());
}

#[tokio::test]
async fn test_connect_failure_is_fatal() {
    let h = harness(FakeBroker::new());
    h.connector.fail_connect();

    let result = h.entry.enter(SPACE, DISCUSSION).await;
    assert!(matches!(result, Err(RoomError::Transport(_))));
    assert!(!h.connector.session().started());
}

#[tokio::test]
async fn test_leave_runs_full_cleanup_once() {
    let h = harness(FakeBroker::new());
    let (handle, join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let mut updates = handle.subscribe_updates();

    handle.leave().await.unwrap();
    join.await.unwrap();

    let session = h.connector.session();
    assert!(session.local_video_stopped());
    assert!(session.stopped());
    assert!(h.connector.devices().destroyed());
    assert_eq!(h.broker.exit_notifications(), 1);

    // The Left notification reaches subscribers.
    loop {
        match updates.recv().await {
            Ok(RoomUpdate::Left) => break,
            Ok(_) => {}
            Err(e) => panic!("updates channel closed before Left: {e}"),
        }
    }

    // Leaving again is a harmless success, and cleanup does not rerun.
    handle.leave().await.unwrap();
    assert_eq!(h.broker.exit_notifications(), 1);
    assert_eq!(handle.metrics().cleanup_runs(), 1);

    // The room is gone; state queries fail cleanly.
    assert!(matches!(
        handle.snapshot().await,
        Err(RoomError::NotActive)
    ));
}

#[tokio::test]
async fn test_cleanup_releases_open_captures() {
    let h = harness(FakeBroker::new());
    let (handle, join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    h.connector.devices().set_devices(vec![
        VideoInputDevice {
            device_id: "cam-0".to_string(),
            label: "Front camera".to_string(),
        },
        VideoInputDevice {
            device_id: "cam-1".to_string(),
            label: "Rear camera".to_string(),
        },
    ]);

    handle.leave().await.unwrap();
    join.await.unwrap();

    let devices = h.connector.devices();
    assert_eq!(
        devices.released(),
        vec!["cam-0".to_string(), "cam-1".to_string()]
    );
    assert!(devices.destroyed());
}

#[tokio::test]
async fn test_cleanup_continues_past_failed_device_enumeration() {
    let h = harness(FakeBroker::new());
    let (handle, join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let devices = h.connector.devices();
    devices.set_devices(vec![VideoInputDevice {
        device_id: "cam-0".to_string(),
        label: "Front camera".to_string(),
    }]);
    devices.fail_enumeration();
    let mut updates = handle.subscribe_updates();

    handle.leave().await.unwrap();
    join.await.unwrap();

    // The release step was skipped, but every later step still ran.
    assert!(devices.released().is_empty());
    assert!(devices.destroyed());
    assert!(h.connector.session().stopped());
    assert_eq!(h.broker.exit_notifications(), 1);
    loop {
        match updates.recv().await {
            Ok(RoomUpdate::Left) => break,
            Ok(_) => {}
            Err(e) => panic!("updates channel closed before Left: {e}"),
        }
    }
}

#[tokio::test]
async fn test_cancellation_runs_cleanup() {
    let h = harness(FakeBroker::new());
    let (handle, join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    handle.cancel();
    join.await.unwrap();

    assert!(h.connector.session().stopped());
    assert_eq!(h.broker.exit_notifications(), 1);
}

#[tokio::test]
async fn test_event_stream_end_runs_cleanup() {
    let h = harness(FakeBroker::new());
    let (_handle, join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();

    let session = h.connector.session();
    let broker = Arc::clone(&h.broker);

    // Drop every event sender: the driver inside the connector and the
    // entry's connector reference.
    drop(h.connector);
    drop(h.entry);
    join.await.unwrap();

    assert!(session.stopped());
    assert_eq!(broker.exit_notifications(), 1);
}

#[tokio::test]
async fn test_presence_drives_volume_subscription_lifecycle() {
    let h = harness(FakeBroker::new().with_roster(vec![
        fixtures::self_participant(),
        fixtures::participant("u-a", "att-a"),
        fixtures::offline_participant("u-off"),
    ]));
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();
    let session = h.connector.session();

    driver.presence("att-a", true).await;
    wait_for(&handle, |s| s.present.iter().any(|p| p.user_pk == "u-a")).await;
    assert_eq!(session.volume_subscriptions(), vec!["att-a".to_string()]);

    driver.volume("att-a", Some(false)).await;
    wait_for(&handle, |s| s.mic_states.get("att-a") == Some(&true)).await;

    driver.presence("att-a", false).await;
    let snap = wait_for(&handle, |s| !s.present.iter().any(|p| p.user_pk == "u-a")).await;
    assert!(!snap.mic_states.contains_key("att-a"));
    assert_eq!(session.volume_unsubscriptions(), vec!["att-a".to_string()]);

    // The disconnected roster member sits in the visible roster untouched:
    // no live attendee binding, no mic entry, no subscription traffic.
    assert!(snap.present.iter().any(|p| p.user_pk == "u-off"));
    assert_eq!(snap.mic_states.len(), 1, "only the self seed remains");

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_chat_send_and_receive() {
    let h = harness(FakeBroker::new());
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();
    let session = h.connector.session();

    // Whitespace-only input goes nowhere.
    handle.send_chat("   \n  ").await.unwrap();
    assert!(session.sent_messages().is_empty());
    assert!(handle.snapshot().await.unwrap().messages.is_empty());

    handle.send_chat("  hello  ").await.unwrap();
    let snap = wait_for(&handle, |s| s.messages.len() == 1).await;
    assert_eq!(snap.messages[0].text, "hello");
    assert_eq!(snap.messages[0].sender_id, fixtures::SELF_ATTENDEE_ID);

    let sent = session.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "chat");
    assert_eq!(&sent[0].1[..], b"hello");

    driver.data_message("chat", "att-a", b"hi there").await;
    let snap = wait_for(&handle, |s| s.messages.len() == 2).await;
    assert_eq!(snap.messages[1].sender_id, "att-a");
    assert_eq!(snap.messages[1].text, "hi there");

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_chat_send_failure_keeps_local_entry() {
    let h = harness(FakeBroker::new());
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    h.connector.session().fail_send_data();

    handle.send_chat("hello").await.unwrap();
    let snap = wait_for(&handle, |s| s.messages.len() == 1).await;
    assert_eq!(snap.messages[0].text, "hello");

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_recording_status_transitions_and_notifies() {
    let h = harness(FakeBroker::new());
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();
    let mut updates = handle.subscribe_updates();

    driver.data_message("recording-status", "att-a", b"start").await;
    wait_for(&handle, |s| s.recording).await;
    loop {
        match updates.recv().await.unwrap() {
            RoomUpdate::RecordingChanged { recording } => {
                assert!(recording);
                break;
            }
            _ => {}
        }
    }

    // Unrecognized payloads are ignored.
    driver.data_message("recording-status", "att-a", b"paused").await;
    driver.data_message("recording-status", "att-a", b"Start").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle.snapshot().await.unwrap().recording);

    driver.data_message("recording-status", "att-a", b"stop").await;
    wait_for(&handle, |s| !s.recording).await;

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_unknown_topic_ignored() {
    let h = harness(FakeBroker::new());
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();

    driver.data_message("reactions", "att-a", b"wave").await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    let snap = handle.snapshot().await.unwrap();
    assert!(snap.messages.is_empty());
    assert!(!snap.recording);

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_unresolved_presence_triggers_single_refetch() {
    let h = harness(FakeBroker::new().with_roster(vec![fixtures::self_participant()]));
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();
    // Entry already fetched once.
    assert_eq!(h.broker.roster_fetches(), 1);

    // The roster catches up server-side before the unknown attendee appears.
    h.broker.set_roster(vec![
        fixtures::self_participant(),
        fixtures::participant("u-new", "att-new"),
    ]);

    driver.presence("att-new", true).await;
    wait_for(&handle, |s| s.roster.iter().any(|p| p.user_pk == "u-new")).await;
    assert_eq!(h.broker.roster_fetches(), 2);

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_attendee_unresolved_after_refetch_does_not_loop() {
    let h = harness(FakeBroker::new().with_roster(vec![fixtures::self_participant()]));
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();

    // "att-ghost" never appears in the broker roster.
    driver.presence("att-ghost", true).await;
    for _ in 0..200 {
        if h.broker.roster_fetches() == 2 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(h.broker.roster_fetches(), 2);

    // Flapping presence for the same unresolved attendee does not refetch.
    driver.presence("att-ghost", false).await;
    driver.presence("att-ghost", true).await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(h.broker.roster_fetches(), 2);

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_remote_content_share_lifecycle() {
    let h = harness(FakeBroker::new().with_roster(vec![
        fixtures::self_participant(),
        fixtures::participant("u-a", "att-a"),
    ]));
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();

    // Local share never sets the remote owner.
    driver
        .tile_updated(10, "att-self#content", true, true)
        .await;
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert!(handle
        .snapshot()
        .await
        .unwrap()
        .remote_content_tile_owner
        .is_none());

    driver.tile_updated(11, "att-a#content", true, true).await;
    wait_for(&handle, |s| {
        s.remote_content_tile_owner.as_deref() == Some("att-a")
    })
    .await;

    driver.tile_removed(11).await;
    wait_for(&handle, |s| s.remote_content_tile_owner.is_none()).await;

    handle.leave().await.unwrap();
}

#[tokio::test]
async fn test_focus_follows_tiles() {
    let h = harness(FakeBroker::new().with_roster(vec![
        fixtures::self_participant(),
        fixtures::participant("u-a", "att-a"),
    ]));
    let (handle, _join) = h.entry.enter(SPACE, DISCUSSION).await.unwrap();
    let driver = h.connector.driver();

    // No tile yet: focus rejected.
    assert!(!handle.set_focus(Some("att-a".to_string())).await.unwrap());

    driver.presence("att-a", true).await;
    driver.tile_updated(5, "att-a", false, true).await;
    wait_for(&handle, |s| !s.video_tiles.is_empty()).await;

    assert!(handle.set_focus(Some("att-a".to_string())).await.unwrap());
    let snap = handle.snapshot().await.unwrap();
    assert_eq!(snap.focused_attendee_id.as_deref(), Some("att-a"));

    // The focused attendee's last tile disappears; focus clears with it.
    driver.tile_removed(5).await;
    wait_for(&handle, |s| s.focused_attendee_id.is_none()).await;

    handle.leave().await.unwrap();
}
