//! Fake collaborators for roomq-ap integration tests
//!
//! - FakeResolver / FakeCatalog: scripted failures and delays
//! - FakeTransport: holds completions until a test finishes or fails a track
//! - FakePresenter / FakeDisplay: record every panel mutation
//! - RecordingNotifier: captures notices per room

#![allow(dead_code)]

use async_trait::async_trait;
use roomq_ap::config::PlaybackConfig;
use roomq_ap::playback::PlaybackOrchestrator;
use roomq_ap::services::{
    CatalogService, Completion, DisplayHandle, Expansion, Notifier, NowPlaying, Presenter,
    Progress, Resolved, Resolver, SearchHit, Services, StreamHandle, Transport,
};
use roomq_ap::{Error, Result};
use roomq_common::event_log::EventLog;
use roomq_common::events::{EventBus, RoomEvent};
use roomq_common::{Requester, RoomId, SourceRef, Track};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast;

pub fn requester() -> Requester {
    Requester::new("u1", "alice")
}

/// Track whose source is its own name
pub fn track(name: &str) -> Track {
    Track::new(SourceRef::new(name), name, requester())
}

pub fn room(id: &str) -> RoomId {
    RoomId::new(id)
}

/// Let spawned tasks run to quiescence
///
/// Under a paused clock the runtime only advances time once every task is
/// idle, so a short sleep doubles as "wait for everything runnable".
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

// ============================================================================
// Resolver
// ============================================================================

#[derive(Default)]
pub struct FakeResolver {
    failing: Mutex<HashSet<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    durations: Mutex<HashMap<String, Option<u64>>>,
    calls: AtomicUsize,
}

impl FakeResolver {
    pub fn fail(&self, source: &str) {
        self.failing.lock().unwrap().insert(source.to_string());
    }

    pub fn delay(&self, source: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(source.to_string(), delay);
    }

    /// Defaults to 180 seconds
    pub fn duration(&self, source: &str, duration_secs: Option<u64>) {
        self.durations
            .lock()
            .unwrap()
            .insert(source.to_string(), duration_secs);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Resolver for FakeResolver {
    async fn resolve(&self, source: &SourceRef) -> Result<Resolved> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = source.as_str();

        let delay = self.delays.lock().unwrap().get(key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(key) {
            return Err(Error::Resolution(format!("{} is unavailable", key)));
        }

        let duration_secs = self
            .durations
            .lock()
            .unwrap()
            .get(key)
            .copied()
            .unwrap_or(Some(180));
        Ok(Resolved {
            stream: StreamHandle::new(format!("stream://{}", key)),
            title: key.to_string(),
            duration_secs,
            artist: Some("Artist".to_string()),
            thumbnail: None,
        })
    }
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    expansions: Mutex<HashMap<String, Expansion>>,
    misses: Mutex<HashSet<String>>,
    search_delays: Mutex<HashMap<String, Duration>>,
}

impl FakeCatalog {
    pub fn add_expansion(&self, link: &str, expansion: Expansion) {
        self.expansions
            .lock()
            .unwrap()
            .insert(link.to_string(), expansion);
    }

    pub fn miss(&self, query: &str) {
        self.misses.lock().unwrap().insert(query.to_string());
    }

    pub fn search_delay(&self, query: &str, delay: Duration) {
        self.search_delays
            .lock()
            .unwrap()
            .insert(query.to_string(), delay);
    }
}

#[async_trait]
impl CatalogService for FakeCatalog {
    async fn expand(&self, link: &str) -> Result<Expansion> {
        self.expansions
            .lock()
            .unwrap()
            .get(link)
            .cloned()
            .ok_or_else(|| Error::Catalog(format!("Unknown link {}", link)))
    }

    async fn search(&self, query: &str) -> Result<Option<SearchHit>> {
        let delay = self.search_delays.lock().unwrap().get(query).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.misses.lock().unwrap().contains(query) {
            return Ok(None);
        }
        Ok(Some(SearchHit {
            source: SourceRef::new(query),
            title: Some(query.to_string()),
        }))
    }
}

// ============================================================================
// Transport
// ============================================================================

#[derive(Default)]
pub struct FakeTransport {
    active: Mutex<HashMap<RoomId, Completion>>,
    plays: Mutex<Vec<(RoomId, String)>>,
    paused: Mutex<HashSet<RoomId>>,
    released: Mutex<Vec<RoomId>>,
    refuse: AtomicBool,
    stop_delay: Mutex<Option<Duration>>,
}

impl FakeTransport {
    /// Natural end of the room's current track
    pub fn finish(&self, room: &RoomId) -> bool {
        match self.active.lock().unwrap().remove(room) {
            Some(completion) => {
                completion.finished();
                true
            }
            None => false,
        }
    }

    pub fn fail(&self, room: &RoomId, error: &str) -> bool {
        match self.active.lock().unwrap().remove(room) {
            Some(completion) => {
                completion.failed(error);
                true
            }
            None => false,
        }
    }

    /// Make the next `play` calls return an error
    pub fn refuse_playback(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Make `stop` take this long before cutting the track
    pub fn slow_stop(&self, delay: Duration) {
        *self.stop_delay.lock().unwrap() = Some(delay);
    }

    /// Stream locators played in a room, in order
    pub fn plays(&self, room: &RoomId) -> Vec<String> {
        self.plays
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, s)| s.clone())
            .collect()
    }

    pub fn is_paused(&self, room: &RoomId) -> bool {
        self.paused.lock().unwrap().contains(room)
    }

    pub fn released(&self, room: &RoomId) -> bool {
        self.released.lock().unwrap().contains(room)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn play(&self, room: &RoomId, stream: &StreamHandle, completion: Completion) -> Result<()> {
        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::Transport("voice connection lost".to_string()));
        }
        self.plays
            .lock()
            .unwrap()
            .push((room.clone(), stream.as_str().to_string()));
        if let Some(previous) = self.active.lock().unwrap().insert(room.clone(), completion) {
            previous.finished();
        }
        Ok(())
    }

    async fn stop(&self, room: &RoomId) -> Result<()> {
        let delay = *self.stop_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.paused.lock().unwrap().remove(room);
        self.finish(room);
        Ok(())
    }

    async fn pause(&self, room: &RoomId) -> Result<()> {
        self.paused.lock().unwrap().insert(room.clone());
        Ok(())
    }

    async fn resume(&self, room: &RoomId) -> Result<()> {
        self.paused.lock().unwrap().remove(room);
        Ok(())
    }

    async fn is_active(&self, room: &RoomId) -> bool {
        self.active.lock().unwrap().contains_key(room)
    }

    async fn release(&self, room: &RoomId) -> Result<()> {
        self.finish(room);
        self.released.lock().unwrap().push(room.clone());
        Ok(())
    }
}

// ============================================================================
// Display
// ============================================================================

pub struct FakeDisplay {
    pub id: String,
    pub room: RoomId,
    pub title: String,
    pub updates: Mutex<Vec<Progress>>,
    pub controls_cleared: AtomicBool,
    pub deleted: AtomicBool,
    // Mutations attempted after deletion
    pub stale_calls: AtomicUsize,
}

impl FakeDisplay {
    pub fn update_count(&self) -> usize {
        self.updates.lock().unwrap().len()
    }

    pub fn last_update(&self) -> Option<Progress> {
        self.updates.lock().unwrap().last().cloned()
    }

    pub fn is_deleted(&self) -> bool {
        self.deleted.load(Ordering::SeqCst)
    }

    fn check_live(&self) -> Result<()> {
        if self.is_deleted() {
            self.stale_calls.fetch_add(1, Ordering::SeqCst);
            Err(Error::DisplayStale)
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DisplayHandle for FakeDisplay {
    fn id(&self) -> String {
        self.id.clone()
    }

    async fn update(&self, progress: &Progress) -> Result<()> {
        self.check_live()?;
        self.updates.lock().unwrap().push(progress.clone());
        Ok(())
    }

    async fn clear_controls(&self) -> Result<()> {
        self.check_live()?;
        self.controls_cleared.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn delete(&self) -> Result<()> {
        if self.deleted.swap(true, Ordering::SeqCst) {
            self.stale_calls.fetch_add(1, Ordering::SeqCst);
            return Err(Error::DisplayStale);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakePresenter {
    displays: Mutex<Vec<Arc<FakeDisplay>>>,
}

impl FakePresenter {
    /// Every panel rendered so far, oldest first
    pub fn displays(&self) -> Vec<Arc<FakeDisplay>> {
        self.displays.lock().unwrap().clone()
    }

    pub fn latest(&self) -> Option<Arc<FakeDisplay>> {
        self.displays.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Presenter for FakePresenter {
    async fn render(&self, room: &RoomId, now_playing: &NowPlaying) -> Result<Arc<dyn DisplayHandle>> {
        let mut displays = self.displays.lock().unwrap();
        let display = Arc::new(FakeDisplay {
            id: format!("display-{}", displays.len() + 1),
            room: room.clone(),
            title: now_playing.title.clone(),
            updates: Mutex::new(Vec::new()),
            controls_cleared: AtomicBool::new(false),
            deleted: AtomicBool::new(false),
            stale_calls: AtomicUsize::new(0),
        });
        displays.push(display.clone());
        Ok(display)
    }
}

// ============================================================================
// Notifier
// ============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<(RoomId, String)>>,
}

impl RecordingNotifier {
    pub fn notices(&self, room: &RoomId) -> Vec<String> {
        self.notices
            .lock()
            .unwrap()
            .iter()
            .filter(|(r, _)| r == room)
            .map(|(_, m)| m.clone())
            .collect()
    }

    pub fn contains(&self, room: &RoomId, needle: &str) -> bool {
        self.notices(room).iter().any(|m| m.contains(needle))
    }
}

impl Notifier for RecordingNotifier {
    fn emit(&self, room: &RoomId, message: &str) {
        self.notices
            .lock()
            .unwrap()
            .push((room.clone(), message.to_string()));
    }
}

// ============================================================================
// Harness
// ============================================================================

pub struct TestHarness {
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub resolver: Arc<FakeResolver>,
    pub catalog: Arc<FakeCatalog>,
    pub transport: Arc<FakeTransport>,
    pub presenter: Arc<FakePresenter>,
    pub notifier: Arc<RecordingNotifier>,
    pub events: Arc<EventBus>,
    pub event_log: Arc<EventLog>,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(PlaybackConfig::default())
    }

    pub fn with_config(config: PlaybackConfig) -> Self {
        Self::build(config, EventLog::disabled())
    }

    pub fn with_event_log(event_log: EventLog) -> Self {
        Self::build(PlaybackConfig::default(), event_log)
    }

    fn build(config: PlaybackConfig, event_log: EventLog) -> Self {
        let resolver = Arc::new(FakeResolver::default());
        let catalog = Arc::new(FakeCatalog::default());
        let transport = Arc::new(FakeTransport::default());
        let presenter = Arc::new(FakePresenter::default());
        let notifier = Arc::new(RecordingNotifier::default());
        let events = Arc::new(EventBus::new(1024));
        let event_log = Arc::new(event_log);

        let services = Services {
            resolver: resolver.clone(),
            catalog: catalog.clone(),
            transport: transport.clone(),
            presenter: presenter.clone(),
            notifier: notifier.clone(),
            event_log: event_log.clone(),
            events: events.clone(),
        };

        Self {
            orchestrator: PlaybackOrchestrator::new(services, config),
            resolver,
            catalog,
            transport,
            presenter,
            notifier,
            events,
            event_log,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoomEvent> {
        self.events.subscribe()
    }

    /// Enqueue each named track in order
    pub async fn enqueue_all(&self, room: &RoomId, names: &[&str]) {
        for name in names {
            self.orchestrator.enqueue(room, track(name)).await;
        }
    }

    /// Title of the live session, if any
    pub async fn now_playing(&self, room: &RoomId) -> Option<String> {
        self.orchestrator
            .snapshot(room, 0)
            .await
            .now_playing
            .map(|n| n.title)
    }

    /// Pending titles in play order
    pub async fn pending(&self, room: &RoomId) -> Vec<String> {
        match self.orchestrator.room(room).await {
            Some(r) => r
                .lock()
                .await
                .queue()
                .pending()
                .map(|t| t.title().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn history(&self, room: &RoomId) -> Vec<String> {
        match self.orchestrator.room(room).await {
            Some(r) => r
                .lock()
                .await
                .queue()
                .history()
                .iter()
                .map(|t| t.title().to_string())
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn token(&self, room: &RoomId) -> u64 {
        self.orchestrator.snapshot(room, 0).await.token
    }
}

/// Drain whatever is buffered on a subscription
pub fn drain(rx: &mut broadcast::Receiver<RoomEvent>) -> Vec<RoomEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
