//! Background batch enqueuer
//!
//! Bulk adds (playlists, albums) queue their first entry eagerly and hand the
//! rest to a [`BackgroundEnqueuer`], which resolves entries one by one and
//! appends them in batch order. It never starts playback itself.

use roomq_common::events::QueueChangeTrigger;
use roomq_common::{Requester, RoomId, Track};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::orchestrator::PlaybackOrchestrator;
use crate::error::Result;
use crate::services::{CatalogEntry, EntryRef, Services};

/// Outcome of one batch
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub queued: usize,
    pub dropped: usize,
    /// Room was disconnected before the batch finished
    pub aborted: bool,
}

/// Turn a catalog entry into a queueable track
///
/// Queries are searched; sources without a title are resolved for one.
/// `Ok(None)` means the search found nothing.
pub(crate) async fn materialize(
    services: &Services,
    entry: CatalogEntry,
    requester: &Requester,
) -> Result<Option<Track>> {
    match entry.reference {
        EntryRef::Query(query) => {
            let Some(hit) = services.catalog.search(&query).await? else {
                return Ok(None);
            };
            let title = hit.title.or(entry.title).unwrap_or(query);
            Ok(Some(Track::new(hit.source, title, requester.clone())))
        }
        EntryRef::Source(source) => {
            let title = match entry.title {
                Some(title) => title,
                None => services.resolver.resolve(&source).await?.title,
            };
            Ok(Some(Track::new(source, title, requester.clone())))
        }
    }
}

pub struct BackgroundEnqueuer {
    orchestrator: Arc<PlaybackOrchestrator>,
    room_id: RoomId,
    requester: Requester,
    label: String,
    entries: Vec<CatalogEntry>,
}

impl BackgroundEnqueuer {
    pub fn new(
        orchestrator: Arc<PlaybackOrchestrator>,
        room_id: RoomId,
        requester: Requester,
        label: impl Into<String>,
        entries: Vec<CatalogEntry>,
    ) -> Self {
        Self {
            orchestrator,
            room_id,
            requester,
            label: label.into(),
            entries,
        }
    }

    pub fn spawn(self) -> JoinHandle<BatchReport> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> BatchReport {
        let mut report = BatchReport::default();
        let total = self.entries.len();

        // Bound to the room instance that exists now; a disconnect retires it
        let Some(room) = self.orchestrator.room(&self.room_id).await else {
            debug!(room = %self.room_id, "Room gone before batch started");
            report.aborted = true;
            return report;
        };

        info!(room = %self.room_id, total, "Queuing {} in the background", self.label);

        let services = self.orchestrator.services().clone();
        for entry in self.entries {
            let track = match materialize(&services, entry, &self.requester).await {
                Ok(Some(track)) => track,
                Ok(None) => {
                    debug!(room = %self.room_id, "No match for batch entry");
                    report.dropped += 1;
                    continue;
                }
                Err(e) => {
                    warn!(room = %self.room_id, "Dropping batch entry: {}", e);
                    report.dropped += 1;
                    continue;
                }
            };

            if self
                .orchestrator
                .append(&room, track, QueueChangeTrigger::BackgroundEnqueue)
                .await
                .is_err()
            {
                info!(room = %self.room_id, queued = report.queued, "Room disconnected; batch stopped");
                report.aborted = true;
                return report;
            }
            report.queued += 1;
        }

        info!(
            room = %self.room_id,
            queued = report.queued,
            dropped = report.dropped,
            "Background batch finished"
        );
        services.notifier.emit(
            &self.room_id,
            &format!("Finished queuing {} more tracks from {}", report.queued, self.label),
        );
        report
    }
}
