//! Per-room queue
//!
//! Ordered pending tracks, play history and the two loop flags. The queue is
//! plain data; the orchestrator serializes every mutation behind the room
//! lock.

use roomq_common::Track;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Loop mode request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopMode {
    SongOn,
    SongOff,
    QueueOn,
    QueueOff,
    AllOff,
    /// Flip song loop
    SongToggle,
}

impl LoopMode {
    /// Modes that only make sense while something is playing
    pub fn requires_session(self) -> bool {
        matches!(self, LoopMode::SongOn | LoopMode::SongToggle)
    }
}

impl std::fmt::Display for LoopMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoopMode::SongOn => write!(f, "song_on"),
            LoopMode::SongOff => write!(f, "song_off"),
            LoopMode::QueueOn => write!(f, "queue_on"),
            LoopMode::QueueOff => write!(f, "queue_off"),
            LoopMode::AllOff => write!(f, "all_off"),
            LoopMode::SongToggle => write!(f, "song_toggle"),
        }
    }
}

/// Current loop flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoopFlags {
    pub loop_song: bool,
    pub loop_queue: bool,
}

/// What the room does after a track ends
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvanceDecision {
    /// Finished track was pushed back to the front
    RepeatSong,
    /// Pending was refilled from history
    RefillFromHistory,
    /// Pending has more tracks
    Continue,
    /// Nothing left to play
    Idle,
}

impl AdvanceDecision {
    pub fn starts_next(self) -> bool {
        !matches!(self, AdvanceDecision::Idle)
    }
}

/// Queue listing entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEntry {
    /// 1-based position in pending
    pub position: usize,
    pub title: String,
    pub requester: String,
}

#[derive(Debug, Default)]
pub struct RoomQueue {
    pending: VecDeque<Track>,
    history: Vec<Track>,
    loop_song: bool,
    loop_queue: bool,
}

impl RoomQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a track, returning its 1-based position
    pub fn push_back(&mut self, track: Track) -> usize {
        self.pending.push_back(track);
        self.pending.len()
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.pending.pop_front()
    }

    pub fn pending(&self) -> impl Iterator<Item = &Track> {
        self.pending.iter()
    }

    pub fn history(&self) -> &[Track] {
        &self.history
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    pub fn flags(&self) -> LoopFlags {
        LoopFlags {
            loop_song: self.loop_song,
            loop_queue: self.loop_queue,
        }
    }

    /// Apply a loop mode; setting one flag clears the other
    ///
    /// Whether a mode is allowed without a live session is the caller's call.
    pub fn set_loop_mode(&mut self, mode: LoopMode) -> LoopFlags {
        match mode {
            LoopMode::SongOn => {
                self.loop_song = true;
                self.loop_queue = false;
            }
            LoopMode::SongOff => self.loop_song = false,
            LoopMode::QueueOn => {
                self.loop_queue = true;
                self.loop_song = false;
            }
            LoopMode::QueueOff => self.loop_queue = false,
            LoopMode::AllOff => {
                self.loop_song = false;
                self.loop_queue = false;
            }
            LoopMode::SongToggle => {
                self.loop_song = !self.loop_song;
                if self.loop_song {
                    self.loop_queue = false;
                }
            }
        }
        debug_assert!(!(self.loop_song && self.loop_queue));
        self.flags()
    }

    /// Decide what follows the end of `finished`
    ///
    /// With song loop on, the finished track goes back to the front and
    /// history is untouched. Otherwise it is recorded in history first, so a
    /// queue-loop refill replays it too.
    pub fn advance(&mut self, finished: Option<Track>) -> AdvanceDecision {
        if let Some(track) = finished {
            if self.loop_song {
                self.pending.push_front(track);
                return AdvanceDecision::RepeatSong;
            }
            self.history.push(track);
        }

        if !self.pending.is_empty() {
            return AdvanceDecision::Continue;
        }

        if self.loop_queue && !self.history.is_empty() {
            self.pending.extend(self.history.drain(..));
            return AdvanceDecision::RefillFromHistory;
        }

        AdvanceDecision::Idle
    }

    /// First `limit` pending entries
    pub fn upcoming(&self, limit: usize) -> Vec<UpcomingEntry> {
        self.pending
            .iter()
            .take(limit)
            .enumerate()
            .map(|(i, track)| UpcomingEntry {
                position: i + 1,
                title: track.title().to_string(),
                requester: track.requester().name.clone(),
            })
            .collect()
    }

    /// Drop everything, including loop flags
    pub fn clear(&mut self) {
        self.pending.clear();
        self.history.clear();
        self.loop_song = false;
        self.loop_queue = false;
    }
}
