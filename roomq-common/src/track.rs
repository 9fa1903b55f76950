//! Room, source and track value types
//!
//! These are plain values shared by the player, the event log and the API.
//! A [`Track`] cannot be modified after construction; queue operations move
//! and clone tracks but never edit them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of an isolated playback tenant (one voice/chat destination)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoomId(String);

impl RoomId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RoomId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RoomId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Opaque resolvable reference to a piece of media (URL or catalog handle)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SourceRef(String);

impl SourceRef {
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The user who asked for a track
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    /// Stable platform identity
    pub id: String,
    /// Display name at request time
    pub name: String,
}

impl Requester {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }
}

/// A queued piece of media
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    source: SourceRef,
    title: String,
    requester: Requester,
}

impl Track {
    pub fn new(source: SourceRef, title: impl Into<String>, requester: Requester) -> Self {
        Self {
            source,
            title: title.into(),
            requester,
        }
    }

    pub fn source(&self) -> &SourceRef {
        &self.source
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn requester(&self) -> &Requester {
        &self.requester
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_id_display_and_from() {
        let room = RoomId::from("guild-42");
        assert_eq!(room.to_string(), "guild-42");
        assert_eq!(room.as_str(), "guild-42");
        assert_eq!(room, RoomId::new("guild-42".to_string()));
    }

    #[test]
    fn test_track_accessors() {
        let track = Track::new(
            SourceRef::new("https://youtu.be/abc"),
            "Song",
            Requester::new("7", "alice"),
        );
        assert_eq!(track.source().as_str(), "https://youtu.be/abc");
        assert_eq!(track.title(), "Song");
        assert_eq!(track.requester().name, "alice");
    }

    #[test]
    fn test_transparent_serialization() {
        let json = serde_json::to_string(&RoomId::new("r1")).unwrap();
        assert_eq!(json, "\"r1\"");

        let track = Track::new(SourceRef::new("s"), "t", Requester::new("1", "bob"));
        let value = serde_json::to_value(&track).unwrap();
        assert_eq!(value["source"], "s");
        assert_eq!(value["requester"]["id"], "1");
    }
}
