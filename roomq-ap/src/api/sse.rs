//! Server-Sent Events (SSE) broadcaster
//!
//! Streams room events to connected clients, optionally filtered to one room.

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
};
use futures::stream::{Stream, StreamExt};
use roomq_common::RoomId;
use serde::Deserialize;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, warn};

use super::AppState;

#[derive(Debug, Deserialize)]
pub struct EventFilter {
    pub room: Option<String>,
}

/// GET /events[?room=ID] - SSE event stream
pub async fn event_stream(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let room = filter.room.map(RoomId::new);
    debug!(room = ?room, "New SSE client connected");

    let rx = state.events.subscribe();

    let stream = BroadcastStream::new(rx).filter_map(move |result| {
        let room = room.clone();
        async move {
            let event = match result {
                Ok(event) => event,
                Err(e) => {
                    // Lagged subscribers lose the oldest events
                    warn!("SSE stream error: {:?}", e);
                    return None;
                }
            };

            if room.as_ref().is_some_and(|r| r != event.room()) {
                return None;
            }

            match serde_json::to_string(&event) {
                Ok(json) => Some(Ok(Event::default().event(event.event_type()).data(json))),
                Err(e) => {
                    warn!("Failed to serialize event: {}", e);
                    None
                }
            }
        }
    });

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}
