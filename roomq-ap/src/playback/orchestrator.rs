//! Playback orchestrator
//!
//! One logical state machine per room:
//!
//! ```text
//! Enqueue ──► StartIfIdle ──► resolve ──► Session(token) ──► transport.play
//!                 ▲                                             │
//!                 │                                    Completion (oneshot)
//!                 │                                             ▼
//!                 └──── RepeatSong / Refill / Continue ◄──── Advance ──► Idle
//! ```
//!
//! All mutation of a room happens inside its lock; every collaborator call
//! (resolver, transport, display, notifier, event log) happens outside it.
//! A session is identified by its token. Retiring a session moves the room's
//! token forward, which is the only cancellation signal progress reporters
//! ever see.

use chrono::Utc;
use roomq_common::event_log::LogRecord;
use roomq_common::events::{QueueChangeTrigger, RoomEvent};
use roomq_common::{RoomId, Track};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{oneshot, Mutex};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::progress::{ProgressReporter, ReporterGauge};
use super::queue::{AdvanceDecision, LoopFlags, LoopMode, UpcomingEntry};
use super::room::{Room, RoomPhase};
use super::session::Session;
use crate::config::PlaybackConfig;
use crate::error::{Error, Result};
use crate::services::{Completion, CompletionOutcome, NowPlaying, Progress, Resolved, Services};

/// Sent when a room runs out of tracks
pub const IDLE_NOTICE: &str = "The queue has finished. Add more songs or use disconnect.";

/// Sent after a disconnect tears a room down
pub const DISCONNECT_NOTICE: &str = "Disconnected and cleared the queue.";

/// Currently playing entry of a [`QueueSnapshot`]
#[derive(Debug, Clone, Serialize)]
pub struct NowPlayingSummary {
    pub title: String,
    pub requester: String,
    pub token: u64,
    pub elapsed_secs: u64,
    pub duration_secs: Option<u64>,
    pub paused: bool,
}

/// Read-only queue listing
#[derive(Debug, Clone, Serialize)]
pub struct QueueSnapshot {
    pub room: RoomId,
    pub now_playing: Option<NowPlayingSummary>,
    pub loop_song: bool,
    pub loop_queue: bool,
    /// First entries of pending, in play order
    pub upcoming: Vec<UpcomingEntry>,
    /// Pending entries beyond `upcoming`
    pub remaining: usize,
    pub pending: usize,
    pub history: usize,
    pub token: u64,
}

impl QueueSnapshot {
    fn empty(room: &RoomId) -> Self {
        Self {
            room: room.clone(),
            now_playing: None,
            loop_song: false,
            loop_queue: false,
            upcoming: Vec::new(),
            remaining: 0,
            pending: 0,
            history: 0,
            token: 0,
        }
    }
}

/// Per-room playback state machine over a shared registry
pub struct PlaybackOrchestrator {
    rooms: Mutex<HashMap<RoomId, Arc<Room>>>,
    services: Services,
    config: PlaybackConfig,
    reporters: ReporterGauge,
}

impl PlaybackOrchestrator {
    pub fn new(services: Services, config: PlaybackConfig) -> Arc<Self> {
        Arc::new(Self {
            rooms: Mutex::new(HashMap::new()),
            services,
            config,
            reporters: ReporterGauge::default(),
        })
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Progress reporters that have not yet stopped
    pub fn active_reporters(&self) -> usize {
        self.reporters.active()
    }

    pub async fn room(&self, room_id: &RoomId) -> Option<Arc<Room>> {
        self.rooms.lock().await.get(room_id).cloned()
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.lock().await.len()
    }

    async fn room_or_create(&self, room_id: &RoomId) -> Arc<Room> {
        let mut rooms = self.rooms.lock().await;
        rooms
            .entry(room_id.clone())
            .or_insert_with(|| {
                debug!(room = %room_id, "Creating room state");
                Arc::new(Room::new(room_id.clone()))
            })
            .clone()
    }

    fn emit(&self, event: RoomEvent) {
        self.services.events.emit_lossy(event);
    }

    /// Append a track, creating the room if needed
    ///
    /// Returns the track's 1-based position in pending.
    pub async fn enqueue(&self, room_id: &RoomId, mut track: Track) -> usize {
        loop {
            let room = self.room_or_create(room_id).await;
            match self
                .append(&room, track, QueueChangeTrigger::UserEnqueue)
                .await
            {
                Ok(position) => return position,
                // Lost a race with disconnect; wait it out, then the next
                // lookup creates a fresh room
                Err(returned) => {
                    track = returned;
                    let this = self;
                    let closed = &room;
                    room.wait_torn_down(move || async move { !this.is_registered(closed).await })
                        .await;
                }
            }
        }
    }

    async fn is_registered(&self, room: &Arc<Room>) -> bool {
        self.rooms
            .lock()
            .await
            .get(room.id())
            .is_some_and(|registered| Arc::ptr_eq(registered, room))
    }

    /// Append to a specific room instance; hands the track back if it closed
    pub(crate) async fn append(
        &self,
        room: &Room,
        track: Track,
        trigger: QueueChangeTrigger,
    ) -> std::result::Result<usize, Track> {
        let title = track.title().to_string();
        let position = {
            let mut state = room.lock().await;
            if state.closed {
                return Err(track);
            }
            state.queue.push_back(track)
        };

        debug!(room = %room.id(), position, %trigger, "Queued {}", title);
        self.emit(RoomEvent::QueueChanged {
            room: room.id().clone(),
            pending: position,
            trigger,
            timestamp: Utc::now(),
        });
        Ok(position)
    }

    /// Start the next pending track unless the room is busy
    ///
    /// Returns true when a new session was bound.
    pub async fn start_if_idle(self: &Arc<Self>, room_id: &RoomId) -> bool {
        match self.room(room_id).await {
            Some(room) => self.start_room(&room).await,
            None => false,
        }
    }

    async fn start_room(self: &Arc<Self>, room: &Arc<Room>) -> bool {
        let budget = {
            let mut state = room.lock().await;
            if state.closed || state.phase != RoomPhase::Idle || state.queue.pending_len() == 0 {
                return false;
            }
            state.phase = RoomPhase::Starting;
            state
                .queue
                .pending_len()
                .min(self.config.max_consecutive_failures)
                .max(1)
        };

        let mut failures = 0;
        loop {
            let track = {
                let mut state = room.lock().await;
                if state.closed {
                    return false;
                }
                match state.queue.pop_front() {
                    Some(track) => track,
                    None => {
                        state.phase = RoomPhase::Idle;
                        drop(state);
                        self.announce_idle(room.id());
                        return false;
                    }
                }
            };

            match self.services.resolver.resolve(track.source()).await {
                Ok(resolved) => return self.begin_session(room, track, resolved).await,
                Err(e) => {
                    warn!(room = %room.id(), source = %track.source(), "Resolution failed: {}", e);
                    self.services
                        .notifier
                        .emit(room.id(), &format!("Error playing track: {}", e));
                    failures += 1;
                }
            }

            if failures >= budget {
                let remaining = {
                    let mut state = room.lock().await;
                    if state.closed {
                        return false;
                    }
                    state.phase = RoomPhase::Idle;
                    state.queue.pending_len()
                };

                if remaining == 0 {
                    self.announce_idle(room.id());
                } else {
                    warn!(room = %room.id(), failures, remaining, "Giving up on start attempt");
                    self.services.notifier.emit(
                        room.id(),
                        &format!(
                            "Skipped {} tracks that failed to play; {} still queued. Play something to retry.",
                            failures, remaining
                        ),
                    );
                    self.emit(RoomEvent::QueueIdle {
                        room: room.id().clone(),
                        timestamp: Utc::now(),
                    });
                }
                return false;
            }
        }
    }

    async fn begin_session(self: &Arc<Self>, room: &Arc<Room>, track: Track, resolved: Resolved) -> bool {
        let (session, pending) = {
            let mut state = room.lock().await;
            if state.closed {
                debug!(room = %room.id(), "Room closed during resolution; discarding {}", track.title());
                return false;
            }
            let token = state.bind_token();
            let session = Session::new(track, token, &resolved, Instant::now());
            state.session = Some(session.clone());
            state.phase = RoomPhase::Playing;
            (session, state.queue.pending_len())
        };
        let token = session.token();
        let room_id = room.id();

        info!(room = %room_id, token, "Now playing: {}", session.title());

        let (completion, done) = Completion::channel();
        if let Err(e) = self
            .services
            .transport
            .play(room_id, &resolved.stream, completion)
            .await
        {
            warn!(room = %room_id, token, "Transport refused playback: {}", e);
            self.spawn_advance(room.clone(), token, CompletionOutcome::Failed(e.to_string()));
            return true;
        }
        self.spawn_completion_watcher(room.clone(), token, done);

        self.emit(RoomEvent::TrackStarted {
            room: room_id.clone(),
            token,
            title: session.title().to_string(),
            source: session.track().source().to_string(),
            requester: session.track().requester().name.clone(),
            duration_secs: session.duration_secs(),
            artist: session.artist().map(str::to_string),
            timestamp: Utc::now(),
        });
        self.emit(RoomEvent::QueueChanged {
            room: room_id.clone(),
            pending,
            trigger: QueueChangeTrigger::TrackStarted,
            timestamp: Utc::now(),
        });

        let now_playing = NowPlaying {
            title: session.title().to_string(),
            requester: session.track().requester().clone(),
            artist: session.artist().map(str::to_string),
            thumbnail: session.thumbnail().map(str::to_string),
            progress: Progress::new(0, session.duration_secs(), self.config.bar_length),
        };
        let display = match self.services.presenter.render(room_id, &now_playing).await {
            Ok(handle) => {
                let superseded = {
                    let mut state = room.lock().await;
                    if state.is_current(token) {
                        state.display = Some(handle.clone());
                        false
                    } else {
                        true
                    }
                };
                if superseded {
                    // Session ended while the panel was being posted
                    if let Err(e) = handle.delete().await {
                        debug!(room = %room_id, token, "Display already gone: {}", e);
                    }
                    None
                } else {
                    Some(handle)
                }
            }
            Err(e) => {
                warn!(room = %room_id, token, "Failed to render now playing: {}", e);
                None
            }
        };

        let record = LogRecord::song_played(room_id, session.track());
        if let Err(e) = self.services.event_log.append(&record).await {
            warn!(room = %room_id, "Failed to write event log: {}", e);
        }

        if let Some(display) = display {
            ProgressReporter::new(
                room.clone(),
                token,
                display,
                &self.config,
                self.reporters.clone(),
            )
            .spawn();
        }

        true
    }

    // Completion continuations run in their own tasks, never inline.
    fn spawn_completion_watcher(
        self: &Arc<Self>,
        room: Arc<Room>,
        token: u64,
        done: oneshot::Receiver<CompletionOutcome>,
    ) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let outcome = done.await.unwrap_or(CompletionOutcome::Finished);
            this.advance_room(&room, token, outcome).await;
        });
    }

    fn spawn_advance(self: &Arc<Self>, room: Arc<Room>, token: u64, outcome: CompletionOutcome) {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.advance_room(&room, token, outcome).await;
        });
    }

    /// Handle the end of the session bound to `token`
    ///
    /// Ends for a token that is no longer current are ignored.
    pub async fn advance(self: &Arc<Self>, room_id: &RoomId, token: u64, outcome: CompletionOutcome) {
        if let Some(room) = self.room(room_id).await {
            self.advance_room(&room, token, outcome).await;
        }
    }

    async fn advance_room(self: &Arc<Self>, room: &Arc<Room>, token: u64, outcome: CompletionOutcome) {
        let (finished, display, decision, pending) = {
            let mut state = room.lock().await;
            if state.closed || !state.is_current(token) {
                debug!(room = %room.id(), token, "Ignoring stale completion");
                return;
            }
            let Some(session) = state.session.take() else {
                return;
            };
            state.retire_token();
            state.phase = RoomPhase::Idle;
            let display = state.display.take();

            let failures = match outcome.error() {
                Some(_) => state.transport_failures + 1,
                None => 0,
            };
            let decision = if failures >= self.config.max_consecutive_failures.max(1) {
                // The failing track is dropped instead of looping back in
                state.transport_failures = 0;
                None
            } else {
                state.transport_failures = failures;
                Some(state.queue.advance(Some(session.track().clone())))
            };
            (session, display, decision, state.queue.pending_len())
        };
        let room_id = room.id();

        if let Some(error) = outcome.error() {
            warn!(room = %room_id, token, "Playback error: {}", error);
            self.services
                .notifier
                .emit(room_id, &format!("Playback error: {}", error));
        }
        debug!(room = %room_id, token, ?decision, "Track ended: {}", finished.title());

        self.emit(RoomEvent::TrackFinished {
            room: room_id.clone(),
            token,
            title: finished.title().to_string(),
            error: outcome.error().map(str::to_string),
            timestamp: Utc::now(),
        });

        if let Some(display) = display {
            if let Err(e) = display.delete().await {
                debug!(room = %room_id, "Display already gone: {}", e);
            }
        }

        let Some(decision) = decision else {
            warn!(room = %room_id, pending, "Giving up after repeated playback errors");
            self.services.notifier.emit(
                room_id,
                &format!(
                    "Stopped after {} tracks in a row failed to play; {} still queued. Play something to retry.",
                    self.config.max_consecutive_failures.max(1),
                    pending
                ),
            );
            self.emit(RoomEvent::QueueIdle {
                room: room_id.clone(),
                timestamp: Utc::now(),
            });
            return;
        };

        match decision {
            AdvanceDecision::Idle => self.announce_idle(room_id),
            AdvanceDecision::RefillFromHistory => {
                info!(room = %room_id, pending, "Queue loop refilled from history");
                self.emit(RoomEvent::QueueChanged {
                    room: room_id.clone(),
                    pending,
                    trigger: QueueChangeTrigger::LoopRefill,
                    timestamp: Utc::now(),
                });
            }
            AdvanceDecision::RepeatSong | AdvanceDecision::Continue => {}
        }

        if decision.starts_next() {
            self.start_room(room).await;
        }
    }

    fn announce_idle(&self, room_id: &RoomId) {
        info!(room = %room_id, "Queue finished");
        self.services.notifier.emit(room_id, IDLE_NOTICE);
        self.emit(RoomEvent::QueueIdle {
            room: room_id.clone(),
            timestamp: Utc::now(),
        });
    }

    /// Stop the current track; its completion drives the next step
    ///
    /// Returns false when nothing is playing.
    pub async fn skip(&self, room_id: &RoomId) -> Result<bool> {
        let Some(room) = self.room(room_id).await else {
            return Ok(false);
        };
        let token = {
            let state = room.lock().await;
            match state.session() {
                Some(session) => session.token(),
                None => return Ok(false),
            }
        };

        info!(room = %room_id, token, "Skipping current track");
        self.services.transport.stop(room_id).await?;
        Ok(true)
    }

    pub async fn set_loop_mode(&self, room_id: &RoomId, mode: LoopMode) -> Result<LoopFlags> {
        let room = match self.room(room_id).await {
            Some(room) => room,
            None if mode.requires_session() => {
                return Err(Error::InvalidModeRequest(
                    "I'm not playing anything right now".to_string(),
                ));
            }
            None if mode == LoopMode::QueueOn => self.room_or_create(room_id).await,
            // Nothing to clear
            None => return Ok(LoopFlags::default()),
        };

        let flags = {
            let mut state = room.lock().await;
            if state.closed {
                return Err(Error::InvalidState("Room was disconnected".to_string()));
            }
            if mode.requires_session() && state.session.is_none() {
                return Err(Error::InvalidModeRequest(
                    "I'm not playing anything right now".to_string(),
                ));
            }
            state.queue.set_loop_mode(mode)
        };

        info!(
            room = %room_id,
            %mode,
            loop_song = flags.loop_song,
            loop_queue = flags.loop_queue,
            "Loop mode changed"
        );
        self.emit(RoomEvent::LoopModeChanged {
            room: room_id.clone(),
            loop_song: flags.loop_song,
            loop_queue: flags.loop_queue,
            timestamp: Utc::now(),
        });
        Ok(flags)
    }

    pub async fn pause(&self, room_id: &RoomId) -> Result<()> {
        let room = self.room(room_id).await.ok_or_else(nothing_playing)?;
        let token = {
            let state = room.lock().await;
            let session = state.session().ok_or_else(nothing_playing)?;
            if session.is_paused() {
                return Err(Error::InvalidState("Playback is already paused".to_string()));
            }
            session.token()
        };

        self.services.transport.pause(room_id).await?;

        let mut state = room.lock().await;
        if state.is_current(token) {
            if let Some(session) = state.session.as_mut() {
                session.pause(Instant::now());
            }
        }
        info!(room = %room_id, token, "Playback paused");
        Ok(())
    }

    pub async fn resume(&self, room_id: &RoomId) -> Result<()> {
        let room = self.room(room_id).await.ok_or_else(nothing_playing)?;
        let token = {
            let state = room.lock().await;
            let session = state.session().ok_or_else(nothing_playing)?;
            if !session.is_paused() {
                return Err(Error::InvalidState("Playback is not paused".to_string()));
            }
            session.token()
        };

        self.services.transport.resume(room_id).await?;

        let mut state = room.lock().await;
        if state.is_current(token) {
            if let Some(session) = state.session.as_mut() {
                session.resume(Instant::now());
            }
        }
        info!(room = %room_id, token, "Playback resumed");
        Ok(())
    }

    /// Queue listing with at most `limit` upcoming entries
    pub async fn snapshot(&self, room_id: &RoomId, limit: usize) -> QueueSnapshot {
        let Some(room) = self.room(room_id).await else {
            return QueueSnapshot::empty(room_id);
        };
        let state = room.lock().await;
        let flags = state.queue().flags();
        let pending = state.queue().pending_len();
        let upcoming = state.queue().upcoming(limit);
        let now = Instant::now();

        QueueSnapshot {
            room: room_id.clone(),
            now_playing: state.session().map(|session| NowPlayingSummary {
                title: session.title().to_string(),
                requester: session.track().requester().name.clone(),
                token: session.token(),
                elapsed_secs: session.elapsed(now).as_secs(),
                duration_secs: session.duration_secs(),
                paused: session.is_paused(),
            }),
            loop_song: flags.loop_song,
            loop_queue: flags.loop_queue,
            remaining: pending - upcoming.len(),
            upcoming,
            pending,
            history: state.queue().history_len(),
            token: state.current_token(),
        }
    }

    /// Tear a room down completely
    ///
    /// Safe to call on a room with no state; returns whether one existed.
    /// The closed room stays registered until its transport is released, so
    /// a request racing the teardown waits instead of starting a room that
    /// the release would cut off.
    pub async fn disconnect(&self, room_id: &RoomId) -> bool {
        let Some(room) = self.room(room_id).await else {
            debug!(room = %room_id, "Disconnect for room without state");
            return false;
        };

        let display = {
            let mut state = room.lock().await;
            if state.closed {
                debug!(room = %room_id, "Room already disconnecting");
                return false;
            }
            state.closed = true;
            state.retire_token();
            state.session = None;
            state.phase = RoomPhase::Idle;
            state.transport_failures = 0;
            state.queue.clear();
            state.display.take()
        };

        // Stop fires the old completion, which is now stale and ignored
        if let Err(e) = self.services.transport.stop(room_id).await {
            debug!(room = %room_id, "Transport stop during disconnect: {}", e);
        }
        if let Err(e) = self.services.transport.release(room_id).await {
            warn!(room = %room_id, "Failed to release transport: {}", e);
        }
        if let Some(display) = display {
            if let Err(e) = display.delete().await {
                debug!(room = %room_id, "Display already gone: {}", e);
            }
        }

        {
            let mut rooms = self.rooms.lock().await;
            if rooms
                .get(room_id)
                .is_some_and(|registered| Arc::ptr_eq(registered, &room))
            {
                rooms.remove(room_id);
            }
        }
        room.mark_torn_down();

        info!(room = %room_id, "Room disconnected");
        self.services.notifier.emit(room_id, DISCONNECT_NOTICE);
        self.emit(RoomEvent::QueueChanged {
            room: room_id.clone(),
            pending: 0,
            trigger: QueueChangeTrigger::Disconnect,
            timestamp: Utc::now(),
        });
        self.emit(RoomEvent::RoomClosed {
            room: room_id.clone(),
            timestamp: Utc::now(),
        });
        true
    }
}

fn nothing_playing() -> Error {
    Error::InvalidState("Nothing is playing".to_string())
}
