//! Shipping collaborator implementations
//!
//! - [`YtDlp`]: resolver and catalog backed by the `yt-dlp` executable
//! - [`SimulatedTransport`]: timer-driven stand-in for a voice connection
//! - [`EventPresenter`] / [`EventNotifier`]: panels and notices as SSE events

pub mod display;
pub mod transport;
pub mod ytdlp;

pub use display::{EventDisplay, EventNotifier, EventPresenter};
pub use transport::SimulatedTransport;
pub use ytdlp::YtDlp;
