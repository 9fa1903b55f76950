//! Event-backed presenter and notifier
//!
//! "Now playing" panels and notices are published on the [`EventBus`] for SSE
//! clients (chat bridges, web UI) to draw.

use async_trait::async_trait;
use chrono::Utc;
use roomq_common::events::{EventBus, RoomEvent};
use roomq_common::RoomId;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::services::{DisplayHandle, Notifier, NowPlaying, Presenter, Progress};

pub struct EventPresenter {
    events: Arc<EventBus>,
}

impl EventPresenter {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }
}

#[async_trait]
impl Presenter for EventPresenter {
    async fn render(&self, room: &RoomId, now_playing: &NowPlaying) -> Result<Arc<dyn DisplayHandle>> {
        let panel = EventDisplay {
            room: room.clone(),
            id: Uuid::new_v4().to_string(),
            events: self.events.clone(),
            deleted: AtomicBool::new(false),
        };

        debug!(room = %room, display_id = %panel.id, "Rendering now playing panel");
        self.events.emit_lossy(RoomEvent::DisplayRendered {
            room: room.clone(),
            display_id: panel.id.clone(),
            title: now_playing.title.clone(),
            requester: now_playing.requester.name.clone(),
            artist: now_playing.artist.clone(),
            thumbnail: now_playing.thumbnail.clone(),
            clock: now_playing.progress.clock.clone(),
            bar: now_playing.progress.bar.clone(),
            timestamp: Utc::now(),
        });

        Ok(Arc::new(panel))
    }
}

/// Panel that exists only as a stream of events
pub struct EventDisplay {
    room: RoomId,
    id: String,
    events: Arc<EventBus>,
    deleted: AtomicBool,
}

impl EventDisplay {
    fn ensure_live(&self) -> Result<()> {
        if self.deleted.load(Ordering::SeqCst) {
            Err(Error::DisplayStale)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DisplayHandle for EventDisplay {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn update(&self, progress: &Progress) -> Result<()> {
        self.ensure_live()?;
        self.events.emit_lossy(RoomEvent::DisplayProgress {
            room: self.room.clone(),
            display_id: self.id.clone(),
            elapsed_secs: progress.elapsed_secs,
            total_secs: progress.total_secs,
            clock: progress.clock.clone(),
            bar: progress.bar.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn clear_controls(&self) -> Result<()> {
        self.ensure_live()?;
        self.events.emit_lossy(RoomEvent::DisplayControlsCleared {
            room: self.room.clone(),
            display_id: self.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.deleted.swap(true, Ordering::SeqCst) {
            return Err(Error::DisplayStale);
        }
        self.events.emit_lossy(RoomEvent::DisplayDeleted {
            room: self.room.clone(),
            display_id: self.id.clone(),
            timestamp: Utc::now(),
        });
        Ok(())
    }
}

pub struct EventNotifier {
    events: Arc<EventBus>,
}

impl EventNotifier {
    pub fn new(events: Arc<EventBus>) -> Self {
        Self { events }
    }
}

impl Notifier for EventNotifier {
    fn emit(&self, room: &RoomId, message: &str) {
        info!(room = %room, "Notice: {}", message);
        self.events.emit_lossy(RoomEvent::Notice {
            room: room.clone(),
            message: message.to_string(),
            timestamp: Utc::now(),
        });
    }
}
