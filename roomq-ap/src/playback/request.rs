//! Play request intake
//!
//! Classifies a user's search term, expands it into entries, queues the first
//! entry eagerly, starts playback if the room is idle and hands the remainder
//! of a collection to a [`BackgroundEnqueuer`].

use roomq_common::{Requester, RoomId};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info};
use url::Url;

use super::background::{materialize, BackgroundEnqueuer};
use super::orchestrator::PlaybackOrchestrator;
use crate::error::{Error, Result};
use crate::services::{CatalogEntry, EntryRef, Expansion, ExpansionKind};

const CATALOG_HOST: &str = "open.spotify.com";
const CATALOG_KINDS: [&str; 3] = ["track", "album", "playlist"];

/// What a search term refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Music catalog link (track, album or playlist)
    CatalogLink,
    /// Any other http(s) link
    MediaLink,
    FreeText,
}

impl RequestKind {
    pub fn classify(term: &str) -> Self {
        let Ok(url) = Url::parse(term.trim()) else {
            return RequestKind::FreeText;
        };
        if !matches!(url.scheme(), "http" | "https") {
            return RequestKind::FreeText;
        }

        let is_catalog = url.host_str() == Some(CATALOG_HOST)
            && url
                .path_segments()
                .and_then(|mut segments| {
                    // Localized links look like /intl-de/track/<id>
                    segments.find(|s| CATALOG_KINDS.contains(s))
                })
                .is_some();

        if is_catalog {
            RequestKind::CatalogLink
        } else {
            RequestKind::MediaLink
        }
    }
}

/// Reply material for the requester
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// One track was added
    Queued { title: String, position: usize },
    /// First entry of a collection was added; the rest are queuing
    PlaylistStarted { title: String, remaining: usize },
}

impl SubmitOutcome {
    pub fn message(&self) -> String {
        match self {
            SubmitOutcome::Queued { title, .. } => format!("Added {} to the queue.", title),
            SubmitOutcome::PlaylistStarted { title, .. } => format!(
                "Playing first song from {}. Queuing the rest in the background...",
                title
            ),
        }
    }
}

/// A user's `play` request
#[derive(Debug, Clone)]
pub struct PlayRequest {
    pub room: RoomId,
    pub term: String,
    pub requester: Requester,
}

impl PlayRequest {
    pub fn new(room: RoomId, term: impl Into<String>, requester: Requester) -> Self {
        Self {
            room,
            term: term.into(),
            requester,
        }
    }

    pub fn kind(&self) -> RequestKind {
        RequestKind::classify(&self.term)
    }

    pub async fn submit(self, orchestrator: &Arc<PlaybackOrchestrator>) -> Result<SubmitOutcome> {
        let term = self.term.trim().to_string();
        if term.is_empty() {
            return Err(Error::NotFound("Nothing to search for".to_string()));
        }

        let kind = self.kind();
        debug!(room = %self.room, ?kind, "Play request: {}", term);

        let services = orchestrator.services();
        let expansion = match kind {
            RequestKind::FreeText => Expansion {
                kind: ExpansionKind::Single,
                title: None,
                entries: vec![CatalogEntry::query(term.clone())],
            },
            RequestKind::CatalogLink | RequestKind::MediaLink => {
                services.catalog.expand(&term).await?
            }
        };

        if expansion.entries.is_empty() {
            return Err(Error::NotFound(match kind {
                RequestKind::CatalogLink => {
                    "This playlist or album appears to be empty or private.".to_string()
                }
                _ => "Could not find any playable tracks in the link.".to_string(),
            }));
        }

        let mut entries = expansion.entries;
        let first = entries.remove(0);
        let first_label = match (&first.title, &first.reference) {
            (Some(title), _) => title.clone(),
            (None, EntryRef::Query(query)) => query.clone(),
            (None, EntryRef::Source(source)) => source.to_string(),
        };

        let track = materialize(services, first, &self.requester)
            .await?
            .ok_or_else(|| match kind {
                RequestKind::FreeText => {
                    Error::NotFound(format!("Could not find anything for '{}'", term))
                }
                _ => Error::NotFound(format!("Couldn't find the first track '{}'", first_label)),
            })?;
        let title = track.title().to_string();

        let position = orchestrator.enqueue(&self.room, track).await;

        let outcome = match expansion.kind {
            ExpansionKind::Single => SubmitOutcome::Queued { title, position },
            ExpansionKind::Collection => {
                let label = expansion.title.unwrap_or_else(|| "playlist".to_string());
                let remaining = entries.len();
                if remaining > 0 {
                    BackgroundEnqueuer::new(
                        orchestrator.clone(),
                        self.room.clone(),
                        self.requester.clone(),
                        label.clone(),
                        entries,
                    )
                    .spawn();
                }
                SubmitOutcome::PlaylistStarted {
                    title: label,
                    remaining,
                }
            }
        };

        info!(room = %self.room, requester = %self.requester.name, "{}", outcome.message());
        orchestrator.start_if_idle(&self.room).await;
        Ok(outcome)
    }
}
