//! Progress reporter
//!
//! One reporter per session. It captures the session token on spawn and ticks
//! on a fixed interval, re-reading the room's token each time. A mismatch
//! means the session was superseded and the reporter stops without touching
//! the display again. No other cancellation signal exists.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, warn};

use super::room::Room;
use crate::config::PlaybackConfig;
use crate::error::Error;
use crate::services::{DisplayHandle, Progress};

/// Why a reporter stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReporterExit {
    /// The room's token moved past this reporter's session
    Superseded,
    /// Elapsed time passed the known duration plus grace
    Overran,
    /// The display was deleted by someone else
    DisplayStale,
}

/// Count of live reporters
#[derive(Debug, Clone, Default)]
pub struct ReporterGauge(Arc<AtomicUsize>);

impl ReporterGauge {
    pub fn active(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn enter(&self) -> ReporterGuard {
        self.0.fetch_add(1, Ordering::SeqCst);
        ReporterGuard(self.0.clone())
    }
}

struct ReporterGuard(Arc<AtomicUsize>);

impl Drop for ReporterGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct ProgressReporter {
    room: Arc<Room>,
    token: u64,
    display: Arc<dyn DisplayHandle>,
    interval: Duration,
    grace: Duration,
    bar_length: usize,
    _guard: ReporterGuard,
}

impl ProgressReporter {
    /// Counted as active from construction until the reporter is dropped
    pub fn new(
        room: Arc<Room>,
        token: u64,
        display: Arc<dyn DisplayHandle>,
        config: &PlaybackConfig,
        gauge: ReporterGauge,
    ) -> Self {
        Self {
            room,
            token,
            display,
            interval: config.progress_interval(),
            grace: config.grace(),
            bar_length: config.bar_length,
            _guard: gauge.enter(),
        }
    }

    pub fn spawn(self) -> JoinHandle<ReporterExit> {
        tokio::spawn(self.run())
    }

    pub async fn run(self) -> ReporterExit {
        let mut ticker = time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The panel was just rendered at 00:00
        ticker.tick().await;

        debug!(room = %self.room.id(), token = self.token, "Progress reporter started");

        let exit = loop {
            ticker.tick().await;

            let sample = {
                let state = self.room.lock().await;
                state.sample(self.token, Instant::now(), self.grace)
            };
            let Some(sample) = sample else {
                break ReporterExit::Superseded;
            };

            if sample.overran {
                self.clear_if_current().await;
                break ReporterExit::Overran;
            }
            if sample.paused {
                continue;
            }

            let progress = Progress::new(sample.elapsed_secs, sample.duration_secs, self.bar_length);
            match self.display.update(&progress).await {
                Ok(()) => {}
                Err(Error::DisplayStale) => break ReporterExit::DisplayStale,
                Err(e) => warn!(room = %self.room.id(), token = self.token, "Progress update failed: {}", e),
            }
        };

        debug!(room = %self.room.id(), token = self.token, ?exit, "Progress reporter stopped");
        exit
    }

    // Controls go; the panel itself stays until the next session replaces it
    async fn clear_if_current(&self) {
        let current = self.room.lock().await.is_current(self.token);
        if current {
            if let Err(e) = self.display.clear_controls().await {
                debug!(room = %self.room.id(), "Could not clear controls: {}", e);
            }
        }
    }
}
