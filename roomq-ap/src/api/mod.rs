//! HTTP control surface for roomq-ap
//!
//! Room commands map one-to-one onto [`PlaybackOrchestrator`] operations;
//! `/events` streams every [`roomq_common::events::RoomEvent`] over SSE.

pub mod handlers;
pub mod sse;

use axum::{
    routing::{get, post},
    Router,
};
use roomq_common::event_log::EventLog;
use roomq_common::events::EventBus;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::playback::PlaybackOrchestrator;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<PlaybackOrchestrator>,
    pub events: Arc<EventBus>,
    pub event_log: Arc<EventLog>,
    pub port: u16,
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        // Room commands
        .route("/rooms/:room/play", post(handlers::play))
        .route("/rooms/:room/enqueue", post(handlers::enqueue))
        .route("/rooms/:room/skip", post(handlers::skip))
        .route("/rooms/:room/pause", post(handlers::pause))
        .route("/rooms/:room/resume", post(handlers::resume))
        .route("/rooms/:room/loop", post(handlers::set_loop))
        .route("/rooms/:room/disconnect", post(handlers::disconnect))
        .route("/rooms/:room/queue", get(handlers::get_queue))
        // SSE events
        .route("/events", get(sse::event_stream))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
