//! Host decoder contracts.
//!
//! Two families of decoder exist on the platforms we ship to, and the engine
//! wraps each behind its own backend:
//!
//! - [`ManagedPipeline`]: a high-level player that owns its render surface
//!   and subtitle renderer (ExoPlayer/Media3, AVPlayer). It reports coarse
//!   state transitions and must be polled for position.
//! - [`NativePlayer`]: a property/command driven library (libmpv). It needs
//!   decode hints before initialisation and exposes tracks through a track
//!   list that is only valid after the file has loaded.
//!
//! Both factories receive an unbounded sender. Hosts push events from their
//! decoder threads; the engine drains them on its own task.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use async_trait::async_trait;
use core_async::sync::mpsc::UnboundedSender;

use crate::error::Result;
use crate::media::StreamKind;

// ============================================================================
// Managed pipeline
// ============================================================================

/// External subtitle handed to a managed pipeline at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleConfiguration {
    pub url: String,
    pub mime_type: Option<String>,
    pub language: Option<String>,
    pub label: Option<String>,
}

/// What a managed pipeline is asked to open.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineMediaItem {
    pub url: String,
    pub start_position_ms: u64,
    pub subtitles: Vec<SubtitleConfiguration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PipelineState {
    Idle,
    Buffering,
    Ready,
    Ended,
}

/// Callback surface of a managed pipeline.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StateChanged(PipelineState),
    IsPlayingChanged(bool),
    /// Position jumped (seek or period transition).
    PositionDiscontinuity { position_ms: u64 },
    Error { message: String },
}

#[async_trait]
pub trait ManagedPipeline: Send + Sync {
    async fn set_media_item(&self, item: PipelineMediaItem) -> Result<()>;

    async fn prepare(&self) -> Result<()>;

    async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()>;

    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Volume in `0.0..=1.0`.
    async fn set_volume(&self, volume: f32) -> Result<()>;

    async fn set_playback_speed(&self, speed: f32) -> Result<()>;

    /// Window brightness in `0.0..=1.0`.
    async fn set_screen_brightness(&self, brightness: f32) -> Result<()>;

    /// Select the `ordinal`-th track group of `kind`, or disable the kind when
    /// `ordinal` is `None`. Text groups list embedded tracks before the
    /// subtitle configurations supplied at load.
    async fn select_track(&self, kind: StreamKind, ordinal: Option<usize>) -> Result<()>;

    fn current_position_ms(&self) -> u64;

    fn duration_ms(&self) -> Option<u64>;

    async fn stop(&self) -> Result<()>;

    /// Free the surface and codec resources. The pipeline is unusable afterwards.
    async fn release(&self) -> Result<()>;
}

pub trait ManagedPipelineFactory: Send + Sync {
    fn create(&self, events: UnboundedSender<PipelineEvent>) -> Result<Arc<dyn ManagedPipeline>>;
}

// ============================================================================
// Native player
// ============================================================================

/// Property value as exchanged with the native library.
#[derive(Debug, Clone, PartialEq)]
pub enum NativeValue {
    Flag(bool),
    Int(i64),
    Double(f64),
    Str(String),
    None,
}

impl NativeValue {
    pub fn as_flag(&self) -> Option<bool> {
        match self {
            NativeValue::Flag(value) => Some(*value),
            _ => None,
        }
    }

    /// Numeric value as floating point, accepting either numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            NativeValue::Double(value) => Some(*value),
            NativeValue::Int(value) => Some(*value as f64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndFileReason {
    Eof,
    Stop,
    Quit,
    Error,
    Redirect,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    PropertyChanged { name: String, value: NativeValue },
    FileLoaded,
    EndFile {
        reason: EndFileReason,
        error: Option<String>,
    },
    Shutdown,
}

/// Entry of the native track list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeTrack {
    /// Library-assigned id, unique per kind.
    pub id: i64,
    pub kind: StreamKind,
    pub external: bool,
    pub language: Option<String>,
    pub title: Option<String>,
}

/// Synchronous property/command interface of a native playback library.
pub trait NativePlayer: Send + Sync {
    /// Set an option. Only valid before [`NativePlayer::initialize`].
    fn set_option(&self, name: &str, value: &str) -> Result<()>;

    fn initialize(&self) -> Result<()>;

    fn observe_property(&self, name: &str) -> Result<()>;

    fn command(&self, args: &[&str]) -> Result<()>;

    fn set_property(&self, name: &str, value: NativeValue) -> Result<()>;

    fn get_property(&self, name: &str) -> Result<NativeValue>;

    fn track_list(&self) -> Result<Vec<NativeTrack>>;

    /// Destroy the native handle. Must be called at most once.
    fn destroy(&self);
}

pub trait NativePlayerFactory: Send + Sync {
    fn create(&self, events: UnboundedSender<NativeEvent>) -> Result<Arc<dyn NativePlayer>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn native_value_accessors() {
        assert_eq!(NativeValue::Flag(true).as_flag(), Some(true));
        assert_eq!(NativeValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(NativeValue::Double(1.5).as_f64(), Some(1.5));
        assert_eq!(NativeValue::Str("x".into()).as_f64(), None);
        assert_eq!(NativeValue::None.as_flag(), None);
    }
}
