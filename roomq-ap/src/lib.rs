//! # RoomQ Audio Player (roomq-ap)
//!
//! Per-room sequential playback orchestration: an ordered queue with play
//! history and loop modes, exactly one playback session per room, a live
//! progress display and background population of playlists.
//!
//! **Architecture:** in-process state machine per room behind an HTTP/SSE
//! control surface; media resolution, voice transport and display rendering
//! are pluggable collaborators ([`services`]).

pub mod adapters;
pub mod api;
pub mod config;
pub mod error;
pub mod playback;
pub mod services;

pub use error::{Error, Result};
