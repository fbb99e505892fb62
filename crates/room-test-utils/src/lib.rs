//! # Room Test Utilities
//!
//! Fake implementations of the room-session boundaries for isolated
//! controller testing without a broker deployment or a real media
//! transport.
//!
//! ## Modules
//!
//! - `fake_broker` - in-memory [`MeetingBroker`](room_session::broker::MeetingBroker)
//!   with configurable join responses and roster
//! - `fake_transport` - scripted [`MediaConnector`](room_session::transport::MediaConnector)
//!   whose event sender the test drives directly
//! - `fixtures` - pre-built participants and join responses
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::{FakeBroker, FakeConnector, fixtures};
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let broker = FakeBroker::new().with_roster(vec![fixtures::participant("u-1", "att-1")]);
//!     let connector = FakeConnector::new();
//!     let driver = connector.driver();
//!
//!     // enter the room, then push transport events:
//!     // driver.presence("att-1", true).await;
//! }
//! ```

pub mod fake_broker;
pub mod fake_transport;
pub mod fixtures;

pub use fake_broker::FakeBroker;
pub use fake_transport::{FakeConnector, FakeDeviceController, FakeSession, TransportDriver};
