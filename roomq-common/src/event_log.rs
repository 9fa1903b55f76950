//! Append-only JSON event log
//!
//! One JSON object per line. The player writes `song_played` records when a
//! session starts and `control_pressed` records when a user hits a control.
//! Nothing in RoomQ reads the log back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::info;

use crate::track::{Requester, RoomId, Track};
use crate::Result;

/// Kind of logged event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    SongPlayed,
    ControlPressed,
}

/// A single event log line
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: DateTime<Utc>,
    pub kind: LogKind,
    pub room: RoomId,
    /// Track title or control name
    pub subject: String,
    /// Display name of the acting user
    pub actor: String,
    pub actor_id: String,
    /// Source reference for song records
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl LogRecord {
    pub fn song_played(room: &RoomId, track: &Track) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: LogKind::SongPlayed,
            room: room.clone(),
            subject: track.title().to_string(),
            actor: track.requester().name.clone(),
            actor_id: track.requester().id.clone(),
            source: Some(track.source().to_string()),
        }
    }

    pub fn control_pressed(room: &RoomId, control: &str, actor: &Requester) -> Self {
        Self {
            timestamp: Utc::now(),
            kind: LogKind::ControlPressed,
            room: room.clone(),
            subject: format!("{control}_button"),
            actor: actor.name.clone(),
            actor_id: actor.id.clone(),
            source: None,
        }
    }
}

/// JSON Lines writer; a disabled log accepts and discards records
pub struct EventLog {
    path: Option<PathBuf>,
    // Serializes appends so concurrent rooms never interleave partial lines
    write_lock: Mutex<()>,
}

impl EventLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            write_lock: Mutex::new(()),
        }
    }

    pub fn disabled() -> Self {
        Self {
            path: None,
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append one record as a single line
    pub async fn append(&self, record: &LogRecord) -> Result<()> {
        info!(
            kind = ?record.kind,
            room = %record.room,
            actor = %record.actor,
            "{}",
            record.subject
        );

        let Some(path) = &self.path else {
            return Ok(());
        };

        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let _guard = self.write_lock.lock().await;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(&line).await?;
        file.flush().await?;
        Ok(())
    }
}
