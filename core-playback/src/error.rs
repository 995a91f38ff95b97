//! # Playback Error Types
//!
//! [`PlaybackError`] is what the engine's internals return. It never crosses
//! the command boundary: the controller converts it into a
//! [`PlaybackFailure`] which is stored in `TransportState::error` and handed
//! back from a failed load.

use bridge_traits::BridgeError;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Errors that can occur inside the playback engine.
#[derive(Error, Debug)]
pub enum PlaybackError {
    // ========================================================================
    // Resolution Errors
    // ========================================================================
    /// The catalog could not produce a URL the decoder can open.
    #[error("Stream URL unavailable for {item_id}: {message}")]
    StreamUrlUnavailable { item_id: String, message: String },

    /// The requested media source is absent or offers no delivery path.
    #[error("No compatible media source {media_source_id} for {item_id}")]
    NoCompatibleSource {
        item_id: String,
        media_source_id: String,
    },

    // ========================================================================
    // Backend Errors
    // ========================================================================
    /// The decoder backend could not be created or refused the media.
    #[error("Decoder backend failed to initialize: {0}")]
    BackendInit(String),

    /// The backend reported a fault after a successful load.
    #[error("Playback fault: {0}")]
    Fault(String),

    /// A transport command was rejected by the backend.
    #[error("Backend command failed: {0}")]
    Command(String),

    /// The requested track is not known to the active backend.
    #[error("Track unavailable: {0}")]
    TrackUnavailable(String),

    // ========================================================================
    // Collaborator Errors
    // ========================================================================
    /// A collaborator call failed.
    #[error("Bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Tile bytes could not be decoded into an image.
    #[error("Image decode failed: {0}")]
    ImageDecode(String),

    // ========================================================================
    // Engine Errors
    // ========================================================================
    /// Invalid engine configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// The controller task has exited.
    #[error("Playback engine is shut down")]
    EngineShutdown,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PlaybackError {
    /// Stable code for errors that surface to callers.
    pub fn code(&self) -> ErrorCode {
        match self {
            PlaybackError::StreamUrlUnavailable { .. } => ErrorCode::StreamUrlUnavailable,
            PlaybackError::NoCompatibleSource { .. } => ErrorCode::NoCompatibleSource,
            PlaybackError::BackendInit(_) => ErrorCode::BackendInitFailed,
            PlaybackError::EngineShutdown => ErrorCode::EngineShutdown,
            _ => ErrorCode::PlaybackFault,
        }
    }

    /// Returns `true` if re-issuing the same load may succeed.
    ///
    /// Resolution failures need a different source or track selection.
    pub fn is_retryable(&self) -> bool {
        self.code().is_retryable()
    }
}

/// Stable error code surfaced in transport state and events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    StreamUrlUnavailable,
    NoCompatibleSource,
    BackendInitFailed,
    PlaybackFault,
    EngineShutdown,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::StreamUrlUnavailable => "stream_url_unavailable",
            ErrorCode::NoCompatibleSource => "no_compatible_source",
            ErrorCode::BackendInitFailed => "backend_init_failed",
            ErrorCode::PlaybackFault => "playback_fault",
            ErrorCode::EngineShutdown => "engine_shutdown",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorCode::BackendInitFailed | ErrorCode::PlaybackFault)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Fatal condition recorded in transport state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackFailure {
    pub code: ErrorCode,
    pub message: String,
}

impl PlaybackFailure {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.code.is_retryable()
    }
}

impl From<&PlaybackError> for PlaybackFailure {
    fn from(error: &PlaybackError) -> Self {
        Self::new(error.code(), error.to_string())
    }
}

impl From<PlaybackError> for PlaybackFailure {
    fn from(error: PlaybackError) -> Self {
        Self::from(&error)
    }
}

impl fmt::Display for PlaybackFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for PlaybackFailure {}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;
