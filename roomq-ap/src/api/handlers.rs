//! HTTP request handlers
//!
//! Every room command answers with JSON. Failures become a
//! [`StatusResponse`] whose `status` is the user-facing message.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use roomq_common::event_log::LogRecord;
use roomq_common::{Requester, RoomId, SourceRef, Track};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::AppState;
use crate::error::Error;
use crate::playback::{LoopFlags, LoopMode, PlayRequest, QueueSnapshot, SubmitOutcome};

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<StatusResponse>)>;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    status: String,
    module: String,
    version: String,
    port: u16,
    rooms: usize,
    active_reporters: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatusResponse {
    pub status: String,
}

impl StatusResponse {
    fn ok() -> Json<Self> {
        Json(Self {
            status: "ok".to_string(),
        })
    }
}

/// Acting user; anonymous callers are logged as `api`
#[derive(Debug, Deserialize)]
pub struct ControlRequest {
    #[serde(default = "default_user")]
    pub user_id: String,
    #[serde(default = "default_user")]
    pub user_name: String,
}

impl ControlRequest {
    fn requester(&self) -> Requester {
        Requester::new(self.user_id.clone(), self.user_name.clone())
    }
}

fn default_user() -> String {
    "api".to_string()
}

#[derive(Debug, Deserialize)]
pub struct PlayRequestBody {
    pub term: String,
    #[serde(flatten)]
    pub user: ControlRequest,
}

#[derive(Debug, Serialize)]
pub struct PlayResponse {
    #[serde(flatten)]
    outcome: SubmitOutcome,
    message: String,
}

/// Pre-resolved track, bypassing catalog lookup
#[derive(Debug, Deserialize)]
pub struct EnqueueRequest {
    pub source: String,
    pub title: String,
    #[serde(flatten)]
    pub user: ControlRequest,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    position: usize,
    started: bool,
}

#[derive(Debug, Serialize)]
pub struct SkipResponse {
    skipped: bool,
}

#[derive(Debug, Deserialize)]
pub struct LoopRequest {
    pub mode: LoopMode,
    #[serde(flatten)]
    pub user: ControlRequest,
}

#[derive(Debug, Serialize)]
pub struct DisconnectResponse {
    disconnected: bool,
}

#[derive(Debug, Deserialize)]
pub struct QueueQuery {
    pub limit: Option<usize>,
}

fn error_response(e: Error) -> (StatusCode, Json<StatusResponse>) {
    let status = match &e {
        Error::NotFound(_) => StatusCode::NOT_FOUND,
        Error::InvalidModeRequest(_) | Error::InvalidState(_) => StatusCode::CONFLICT,
        Error::Resolution(_) | Error::Catalog(_) | Error::Transport(_) => StatusCode::BAD_GATEWAY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    if status.is_server_error() {
        error!("Request failed: {}", e);
    }

    // Domain errors carry the user-facing text directly
    let message = match e {
        Error::NotFound(m) | Error::InvalidModeRequest(m) | Error::InvalidState(m) => m,
        other => other.to_string(),
    };
    (status, Json(StatusResponse { status: message }))
}

async fn log_control(state: &AppState, room: &RoomId, control: &str, user: &ControlRequest) {
    let record = LogRecord::control_pressed(room, control, &user.requester());
    if let Err(e) = state.event_log.append(&record).await {
        warn!(room = %room, "Failed to write event log: {}", e);
    }
}

// ============================================================================
// Health Endpoint
// ============================================================================

/// GET /health
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "roomq-ap".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        port: state.port,
        rooms: state.orchestrator.room_count().await,
        active_reporters: state.orchestrator.active_reporters(),
    })
}

// ============================================================================
// Room Commands
// ============================================================================

/// POST /rooms/:room/play - search term or link
pub async fn play(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<PlayRequestBody>,
) -> ApiResult<PlayResponse> {
    let room = RoomId::new(room);
    let outcome = PlayRequest::new(room, req.term, req.user.requester())
        .submit(&state.orchestrator)
        .await
        .map_err(error_response)?;

    Ok(Json(PlayResponse {
        message: outcome.message(),
        outcome,
    }))
}

/// POST /rooms/:room/enqueue
pub async fn enqueue(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<EnqueueRequest>,
) -> ApiResult<EnqueueResponse> {
    let room = RoomId::new(room);
    let track = Track::new(SourceRef::new(req.source), req.title, req.user.requester());

    let position = state.orchestrator.enqueue(&room, track).await;
    let started = state.orchestrator.start_if_idle(&room).await;
    info!(room = %room, position, started, "Track enqueued via API");

    Ok(Json(EnqueueResponse { position, started }))
}

/// POST /rooms/:room/skip
pub async fn skip(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(user): Json<ControlRequest>,
) -> ApiResult<SkipResponse> {
    let room = RoomId::new(room);
    log_control(&state, &room, "skip", &user).await;

    let skipped = state.orchestrator.skip(&room).await.map_err(error_response)?;
    Ok(Json(SkipResponse { skipped }))
}

/// POST /rooms/:room/pause
pub async fn pause(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(user): Json<ControlRequest>,
) -> ApiResult<StatusResponse> {
    let room = RoomId::new(room);
    log_control(&state, &room, "pause", &user).await;

    state.orchestrator.pause(&room).await.map_err(error_response)?;
    Ok(StatusResponse::ok())
}

/// POST /rooms/:room/resume
pub async fn resume(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(user): Json<ControlRequest>,
) -> ApiResult<StatusResponse> {
    let room = RoomId::new(room);
    log_control(&state, &room, "resume", &user).await;

    state.orchestrator.resume(&room).await.map_err(error_response)?;
    Ok(StatusResponse::ok())
}

/// POST /rooms/:room/loop
pub async fn set_loop(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(req): Json<LoopRequest>,
) -> ApiResult<LoopFlags> {
    let room = RoomId::new(room);
    log_control(&state, &room, "loop", &req.user).await;

    let flags = state
        .orchestrator
        .set_loop_mode(&room, req.mode)
        .await
        .map_err(error_response)?;
    Ok(Json(flags))
}

/// POST /rooms/:room/disconnect
pub async fn disconnect(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Json(user): Json<ControlRequest>,
) -> ApiResult<DisconnectResponse> {
    let room = RoomId::new(room);
    log_control(&state, &room, "disconnect", &user).await;

    let disconnected = state.orchestrator.disconnect(&room).await;
    Ok(Json(DisconnectResponse { disconnected }))
}

/// GET /rooms/:room/queue?limit=N
pub async fn get_queue(
    State(state): State<AppState>,
    Path(room): Path<String>,
    Query(query): Query<QueueQuery>,
) -> Json<QueueSnapshot> {
    let limit = query
        .limit
        .unwrap_or(state.orchestrator.config().listing_limit);
    Json(state.orchestrator.snapshot(&RoomId::new(room), limit).await)
}
