//! # Room Session
//!
//! Session controller for real-time discussion rooms. Joins a room through
//! a meeting broker, drives a media transport session, and maintains the
//! render-ready room state: video tiles, presence, mute indication, chat,
//! and recording status.
//!
//! ## Architecture
//!
//! - [`entry::RoomEntry`] - one-shot join sequence: broker join, roster
//!   seed, transport connect, session start
//! - [`actors::RoomActor`] - per-entry actor owning the session and state,
//!   driven by user commands and the transport event stream
//! - [`broker`] - the remote broker boundary and its shape-tolerant join
//!   response normalization
//! - [`transport`] - the media transport boundary: session, devices, events
//! - [`state`] / [`view`] - room state mutations and pure view derivations
//!
//! The actor owns everything mutable; callers interact through a cloneable
//! [`actors::RoomHandle`] and a broadcast stream of
//! [`actors::RoomUpdate`] notifications.

pub mod actors;
pub mod broker;
pub mod config;
pub mod entry;
pub mod errors;
pub mod state;
pub mod transport;
pub mod view;

pub use actors::{RoomHandle, RoomUpdate};
pub use entry::RoomEntry;
pub use errors::RoomError;
