//! Room playback
//!
//! [`PlaybackOrchestrator`] owns the room registry and drives each room's
//! queue, session and progress reporter. Play requests and background
//! batches feed it through [`PlayRequest`] and [`BackgroundEnqueuer`].

pub mod background;
pub mod orchestrator;
pub mod progress;
pub mod queue;
pub mod request;
pub mod room;
pub mod session;

pub use background::{BackgroundEnqueuer, BatchReport};
pub use orchestrator::{
    NowPlayingSummary, PlaybackOrchestrator, QueueSnapshot, DISCONNECT_NOTICE, IDLE_NOTICE,
};
pub use progress::{ProgressReporter, ReporterExit};
pub use queue::{AdvanceDecision, LoopFlags, LoopMode, RoomQueue, UpcomingEntry};
pub use request::{PlayRequest, RequestKind, SubmitOutcome};
pub use room::{Room, RoomPhase, RoomState};
pub use session::Session;
