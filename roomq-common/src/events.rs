//! Event types for the RoomQ event system
//!
//! Provides the shared [`RoomEvent`] definitions and the [`EventBus`] used by
//! the player to fan events out to SSE clients and other listeners.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use crate::track::RoomId;

/// Why a room's pending queue changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum QueueChangeTrigger {
    UserEnqueue,
    BackgroundEnqueue,
    LoopRefill,
    TrackStarted,
    Disconnect,
}

impl std::fmt::Display for QueueChangeTrigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QueueChangeTrigger::UserEnqueue => write!(f, "UserEnqueue"),
            QueueChangeTrigger::BackgroundEnqueue => write!(f, "BackgroundEnqueue"),
            QueueChangeTrigger::LoopRefill => write!(f, "LoopRefill"),
            QueueChangeTrigger::TrackStarted => write!(f, "TrackStarted"),
            QueueChangeTrigger::Disconnect => write!(f, "Disconnect"),
        }
    }
}

/// RoomQ event types
///
/// Events are broadcast via [`EventBus`] and serialized for SSE transmission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoomEvent {
    /// A new playback session began
    TrackStarted {
        room: RoomId,
        /// Session token bound to this playback
        token: u64,
        title: String,
        source: String,
        requester: String,
        /// None for live streams
        duration_secs: Option<u64>,
        artist: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// A playback session ended, naturally, by skip or by transport error
    TrackFinished {
        room: RoomId,
        token: u64,
        title: String,
        /// Transport error text when the track did not end cleanly
        error: Option<String>,
        timestamp: DateTime<Utc>,
    },

    /// Pending queue length changed
    QueueChanged {
        room: RoomId,
        pending: usize,
        trigger: QueueChangeTrigger,
        timestamp: DateTime<Utc>,
    },

    /// Loop flags changed
    LoopModeChanged {
        room: RoomId,
        loop_song: bool,
        loop_queue: bool,
        timestamp: DateTime<Utc>,
    },

    /// Queue ran dry; nothing is playing
    QueueIdle {
        room: RoomId,
        timestamp: DateTime<Utc>,
    },

    /// Room torn down by disconnect
    RoomClosed {
        room: RoomId,
        timestamp: DateTime<Utc>,
    },

    /// User-facing text notification
    Notice {
        room: RoomId,
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// A "now playing" panel was posted
    DisplayRendered {
        room: RoomId,
        display_id: String,
        title: String,
        requester: String,
        artist: Option<String>,
        thumbnail: Option<String>,
        clock: String,
        bar: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress line of a panel was refreshed
    DisplayProgress {
        room: RoomId,
        display_id: String,
        elapsed_secs: u64,
        total_secs: Option<u64>,
        clock: String,
        bar: String,
        timestamp: DateTime<Utc>,
    },

    /// Panel buttons were removed
    DisplayControlsCleared {
        room: RoomId,
        display_id: String,
        timestamp: DateTime<Utc>,
    },

    /// Panel was deleted
    DisplayDeleted {
        room: RoomId,
        display_id: String,
        timestamp: DateTime<Utc>,
    },
}

impl RoomEvent {
    /// Event type name used as the SSE `event:` field
    pub fn event_type(&self) -> &'static str {
        match self {
            RoomEvent::TrackStarted { .. } => "TrackStarted",
            RoomEvent::TrackFinished { .. } => "TrackFinished",
            RoomEvent::QueueChanged { .. } => "QueueChanged",
            RoomEvent::LoopModeChanged { .. } => "LoopModeChanged",
            RoomEvent::QueueIdle { .. } => "QueueIdle",
            RoomEvent::RoomClosed { .. } => "RoomClosed",
            RoomEvent::Notice { .. } => "Notice",
            RoomEvent::DisplayRendered { .. } => "DisplayRendered",
            RoomEvent::DisplayProgress { .. } => "DisplayProgress",
            RoomEvent::DisplayControlsCleared { .. } => "DisplayControlsCleared",
            RoomEvent::DisplayDeleted { .. } => "DisplayDeleted",
        }
    }

    /// Room the event belongs to
    pub fn room(&self) -> &RoomId {
        match self {
            RoomEvent::TrackStarted { room, .. }
            | RoomEvent::TrackFinished { room, .. }
            | RoomEvent::QueueChanged { room, .. }
            | RoomEvent::LoopModeChanged { room, .. }
            | RoomEvent::QueueIdle { room, .. }
            | RoomEvent::RoomClosed { room, .. }
            | RoomEvent::Notice { room, .. }
            | RoomEvent::DisplayRendered { room, .. }
            | RoomEvent::DisplayProgress { room, .. }
            | RoomEvent::DisplayControlsCleared { room, .. }
            | RoomEvent::DisplayDeleted { room, .. } => room,
        }
    }
}

/// One-to-many event broadcaster
///
/// Thin wrapper over `tokio::sync::broadcast`. Slow subscribers lag and lose
/// the oldest events; emitters are never blocked.
pub struct EventBus {
    tx: broadcast::Sender<RoomEvent>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus with the given channel capacity
    ///
    /// ```
    /// use roomq_common::events::EventBus;
    ///
    /// let bus = EventBus::new(256);
    /// assert_eq!(bus.capacity(), 256);
    /// ```
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity);
        Self { tx, capacity }
    }

    /// Subscribe to all future events
    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.tx.subscribe()
    }

    /// Emit an event to all subscribers
    ///
    /// Returns `Err` if no subscribers are listening.
    #[allow(clippy::result_large_err)]
    pub fn emit(&self, event: RoomEvent) -> Result<usize, broadcast::error::SendError<RoomEvent>> {
        self.tx.send(event)
    }

    /// Emit an event, ignoring if no subscribers are listening
    pub fn emit_lossy(&self, event: RoomEvent) {
        let _ = self.tx.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
