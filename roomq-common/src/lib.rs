//! # RoomQ Common Library
//!
//! Shared code for the RoomQ services including:
//! - Room, track and requester value types
//! - Event types (RoomEvent enum) and the EventBus
//! - Append-only JSON event log
//! - Configuration file discovery
//! - Human-readable clock and progress bar formatting

pub mod config;
pub mod error;
pub mod event_log;
pub mod events;
pub mod human_time;
pub mod track;

pub use error::{Error, Result};
pub use track::{Requester, RoomId, SourceRef, Track};
