//! Collaborator interfaces
//!
//! The player core only talks to the outside world through these traits:
//! media resolution, catalog lookups, the voice transport, the "now playing"
//! display and user-facing notifications. Implementations must be safe to call
//! concurrently from many rooms.
//!
//! Shipping implementations live in [`crate::adapters`]; tests use fakes.

use async_trait::async_trait;
use roomq_common::event_log::EventLog;
use roomq_common::events::EventBus;
use roomq_common::human_time::{progress_bar, progress_clock};
use roomq_common::{Requester, RoomId, SourceRef};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::error::Result;

/// Playable stream locator returned by a [`Resolver`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamHandle(String);

impl StreamHandle {
    pub fn new(locator: impl Into<String>) -> Self {
        Self(locator.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Result of resolving a source reference
#[derive(Debug, Clone)]
pub struct Resolved {
    pub stream: StreamHandle,
    pub title: String,
    /// None (or zero) for live streams
    pub duration_secs: Option<u64>,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
}

/// Turns a source reference into a playable stream plus metadata
///
/// Retry and timeout policy belong to the implementation; the player treats
/// any error as a single failed attempt.
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, source: &SourceRef) -> Result<Resolved>;
}

/// Reference carried by a catalog entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryRef {
    /// Directly resolvable media
    Source(SourceRef),
    /// Text that must be searched before it can be queued
    Query(String),
}

/// One unresolved member of an expansion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogEntry {
    pub reference: EntryRef,
    pub title: Option<String>,
}

impl CatalogEntry {
    pub fn source(source: impl Into<String>, title: Option<String>) -> Self {
        Self {
            reference: EntryRef::Source(SourceRef::new(source)),
            title,
        }
    }

    pub fn query(query: impl Into<String>) -> Self {
        Self {
            reference: EntryRef::Query(query.into()),
            title: None,
        }
    }
}

/// Whether a link named one item or a collection of them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpansionKind {
    Single,
    Collection,
}

/// Ordered entries behind a catalog or media link
#[derive(Debug, Clone)]
pub struct Expansion {
    pub kind: ExpansionKind,
    /// Playlist or album name, when the link has one
    pub title: Option<String>,
    pub entries: Vec<CatalogEntry>,
}

/// Best match for a free-text search
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub source: SourceRef,
    pub title: Option<String>,
}

/// Playlist/catalog expansion and free-text search
#[async_trait]
pub trait CatalogService: Send + Sync {
    async fn expand(&self, link: &str) -> Result<Expansion>;

    /// `Ok(None)` when nothing matched
    async fn search(&self, query: &str) -> Result<Option<SearchHit>>;
}

/// How a playback ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompletionOutcome {
    Finished,
    Failed(String),
}

impl CompletionOutcome {
    pub fn error(&self) -> Option<&str> {
        match self {
            CompletionOutcome::Finished => None,
            CompletionOutcome::Failed(e) => Some(e),
        }
    }
}

/// One-shot end-of-track signal handed to [`Transport::play`]
///
/// Firing it (or dropping it) is the only thing that advances a room. A
/// dropped completion counts as a clean finish.
#[derive(Debug)]
pub struct Completion {
    tx: oneshot::Sender<CompletionOutcome>,
}

impl Completion {
    pub fn channel() -> (Self, oneshot::Receiver<CompletionOutcome>) {
        let (tx, rx) = oneshot::channel();
        (Self { tx }, rx)
    }

    pub fn finished(self) {
        let _ = self.tx.send(CompletionOutcome::Finished);
    }

    pub fn failed(self, error: impl Into<String>) {
        let _ = self.tx.send(CompletionOutcome::Failed(error.into()));
    }
}

/// Voice output for a room
///
/// At most one stream plays per room. `stop` must fire the active
/// completion; `release` drops the room's connection entirely.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn play(&self, room: &RoomId, stream: &StreamHandle, completion: Completion)
        -> Result<()>;
    async fn stop(&self, room: &RoomId) -> Result<()>;
    async fn pause(&self, room: &RoomId) -> Result<()>;
    async fn resume(&self, room: &RoomId) -> Result<()>;
    async fn is_active(&self, room: &RoomId) -> bool;
    async fn release(&self, room: &RoomId) -> Result<()>;
}

/// Elapsed/total indicator rendered onto a display
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Progress {
    pub elapsed_secs: u64,
    pub total_secs: Option<u64>,
    /// `MM:SS / MM:SS`
    pub clock: String,
    pub bar: String,
}

impl Progress {
    pub fn new(elapsed_secs: u64, total_secs: Option<u64>, bar_length: usize) -> Self {
        Self {
            elapsed_secs,
            total_secs,
            clock: progress_clock(elapsed_secs, total_secs),
            bar: progress_bar(elapsed_secs, total_secs, bar_length),
        }
    }
}

/// Content of a freshly posted "now playing" panel
#[derive(Debug, Clone)]
pub struct NowPlaying {
    pub title: String,
    pub requester: Requester,
    pub artist: Option<String>,
    pub thumbnail: Option<String>,
    pub progress: Progress,
}

/// Live "now playing" panel tied to exactly one session
///
/// Operations on a deleted panel return [`crate::Error::DisplayStale`].
#[async_trait]
pub trait DisplayHandle: Send + Sync {
    fn id(&self) -> String;
    async fn update(&self, progress: &Progress) -> Result<()>;
    async fn clear_controls(&self) -> Result<()>;
    async fn delete(&self) -> Result<()>;
}

/// Posts "now playing" panels
#[async_trait]
pub trait Presenter: Send + Sync {
    async fn render(&self, room: &RoomId, now_playing: &NowPlaying)
        -> Result<Arc<dyn DisplayHandle>>;
}

/// Fire-and-forget user-facing text
pub trait Notifier: Send + Sync {
    fn emit(&self, room: &RoomId, message: &str);
}

/// External collaborators shared by every room
#[derive(Clone)]
pub struct Services {
    pub resolver: Arc<dyn Resolver>,
    pub catalog: Arc<dyn CatalogService>,
    pub transport: Arc<dyn Transport>,
    pub presenter: Arc<dyn Presenter>,
    pub notifier: Arc<dyn Notifier>,
    pub event_log: Arc<EventLog>,
    pub events: Arc<EventBus>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_formats_clock_and_bar() {
        let progress = Progress::new(75, Some(200), 10);
        assert_eq!(progress.clock, "01:15 / 03:20");
        assert_eq!(progress.bar.chars().count(), 10);

        let live = Progress::new(5, None, 10);
        assert_eq!(live.clock, "00:05 / LIVE");
        assert_eq!(live.bar, "LIVE");
    }

    #[tokio::test]
    async fn test_completion_delivers_outcome() {
        let (completion, rx) = Completion::channel();
        completion.failed("decoder crashed");
        assert_eq!(
            rx.await.unwrap(),
            CompletionOutcome::Failed("decoder crashed".to_string())
        );
    }

    #[tokio::test]
    async fn test_dropped_completion_closes_channel() {
        let (completion, rx) = Completion::channel();
        drop(completion);
        assert!(rx.await.is_err());
    }
}
