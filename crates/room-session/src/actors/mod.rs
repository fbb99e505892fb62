//! Actor layer: one `RoomActor` per room entry.

pub mod messages;
pub mod metrics;
pub mod room;

pub use messages::{RoomCommand, RoomUpdate};
pub use metrics::RoomMetrics;
pub use room::{RoomActor, RoomHandle};
