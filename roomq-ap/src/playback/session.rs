//! Playback session
//!
//! One in-flight playback attempt. A session is only meaningful while its
//! token equals the owning room's current token.

use roomq_common::Track;
use std::time::Duration;
use tokio::time::Instant;

use crate::services::Resolved;

/// One continuous playback of a track
#[derive(Debug, Clone)]
pub struct Session {
    track: Track,
    token: u64,
    title: String,
    started_at: Instant,
    duration_secs: Option<u64>,
    artist: Option<String>,
    thumbnail: Option<String>,
    paused_at: Option<Instant>,
    paused_total: Duration,
}

impl Session {
    pub fn new(track: Track, token: u64, resolved: &Resolved, started_at: Instant) -> Self {
        let title = if resolved.title.trim().is_empty() {
            track.title().to_string()
        } else {
            resolved.title.clone()
        };

        Self {
            track,
            token,
            title,
            started_at,
            duration_secs: resolved.duration_secs.filter(|d| *d > 0),
            artist: resolved.artist.clone(),
            thumbnail: resolved.thumbnail.clone(),
            paused_at: None,
            paused_total: Duration::ZERO,
        }
    }

    pub fn track(&self) -> &Track {
        &self.track
    }

    pub fn token(&self) -> u64 {
        self.token
    }

    /// Resolved title, falling back to the queued title
    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn duration_secs(&self) -> Option<u64> {
        self.duration_secs
    }

    pub fn artist(&self) -> Option<&str> {
        self.artist.as_deref()
    }

    pub fn thumbnail(&self) -> Option<&str> {
        self.thumbnail.as_deref()
    }

    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Playing time, excluding paused spans
    pub fn elapsed(&self, now: Instant) -> Duration {
        let wall = now.saturating_duration_since(self.started_at);
        let current_pause = self
            .paused_at
            .map(|at| now.saturating_duration_since(at))
            .unwrap_or(Duration::ZERO);
        wall.saturating_sub(self.paused_total + current_pause)
    }

    /// Returns false if already paused
    pub fn pause(&mut self, now: Instant) -> bool {
        if self.paused_at.is_some() {
            return false;
        }
        self.paused_at = Some(now);
        true
    }

    /// Returns false if not paused
    pub fn resume(&mut self, now: Instant) -> bool {
        match self.paused_at.take() {
            Some(at) => {
                self.paused_total += now.saturating_duration_since(at);
                true
            }
            None => false,
        }
    }

    /// True once a known duration has been exceeded by more than `grace`
    pub fn overran(&self, now: Instant, grace: Duration) -> bool {
        match self.duration_secs {
            Some(total) => self.elapsed(now) >= Duration::from_secs(total) + grace,
            None => false,
        }
    }
}

/// Point-in-time view of a session taken under the room lock
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSample {
    pub elapsed_secs: u64,
    pub duration_secs: Option<u64>,
    pub paused: bool,
    pub overran: bool,
}

impl SessionSample {
    pub fn take(session: &Session, now: Instant, grace: Duration) -> Self {
        Self {
            elapsed_secs: session.elapsed(now).as_secs(),
            duration_secs: session.duration_secs(),
            paused: session.is_paused(),
            overran: session.overran(now, grace),
        }
    }
}
