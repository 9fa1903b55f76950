//! Error types for roomq-ap
//!
//! Every error is scoped to one room and one operation; none is fatal to the
//! process.

use thiserror::Error;

/// Main error type for roomq-ap
#[derive(Error, Debug)]
pub enum Error {
    /// Resolver could not turn a source reference into a playable stream
    #[error("Resolution failed: {0}")]
    Resolution(String),

    /// Catalog expansion or search failed
    #[error("Catalog error: {0}")]
    Catalog(String),

    /// Voice transport failure
    #[error("Transport error: {0}")]
    Transport(String),

    /// Loop mode request that cannot apply to the room's current state
    #[error("Invalid loop mode request: {0}")]
    InvalidModeRequest(String),

    /// Invalid state for operation
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Display handle was deleted out from under its owner
    #[error("Display no longer exists")]
    DisplayStale,

    /// Nothing matched a play request
    #[error("Not found: {0}")]
    NotFound(String),

    /// Configuration file loading errors
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenience Result type using roomq-ap Error
pub type Result<T> = std::result::Result<T, Error>;
