use thiserror::Error;

use crate::config::ConfigError;
use crate::transport::{CodecError, TransportError};

/// Top-level error type for the streaming ingestion engine.
///
/// Per-item failures reported by the server are never surfaced through this
/// type; they accumulate in the session's error maps. Only configuration
/// mistakes, submission-seam misuse, and permanent connection failure are
/// user-visible errors.
#[derive(Error, Debug)]
pub enum StreamError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Encoding error: {0}")]
    Codec(#[from] CodecError),

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Duplicate object id within this submission: {0}")]
    DuplicateObjectId(String),

    #[error("Session was stopped; no further items are accepted")]
    SessionStopped,

    #[error("Connection lost and {attempts} reconnect attempts exhausted")]
    ReconnectExhausted { attempts: u32 },

    #[error("Session task failed: {0}")]
    Task(String),
}
