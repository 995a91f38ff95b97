//! # Decoder Backends
//!
//! One capability interface, [`DecoderBackend`], with two implementations:
//!
//! - [`ManagedBackend`]: wraps a host `ManagedPipeline` that renders its own
//!   surface and subtitles.
//! - [`NativeBackend`]: wraps a host `NativePlayer` driven by properties and
//!   commands.
//!
//! Backends never touch transport state. They translate host callbacks into
//! [`BackendEvent`]s and push them through a [`BackendEventSink`], which tags
//! every event with the session generation it belongs to. The controller
//! drops events whose generation is stale.
//!
//! [`HostBackendFactory::create`] is the only place that looks at
//! [`BackendKind`].

mod managed;
mod native;

pub use managed::ManagedBackend;
pub use native::NativeBackend;

use crate::config::{BackendKind, EngineConfig};
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{BridgeError, ManagedPipelineFactory, NativePlayerFactory, StreamKind};
use core_async::sync::mpsc::UnboundedSender;
use core_runtime::config::CoreConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

/// Lifecycle and property signals every backend emits.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendEvent {
    /// Media is loaded and playable; duration when the backend knows it.
    Ready { duration_ms: Option<u64> },
    Buffering(bool),
    Paused(bool),
    /// Nothing is loaded (or something is again).
    Idle(bool),
    Position(u64),
    Duration(u64),
    /// End of media reached.
    Ended,
    /// Unrecoverable error after a successful load.
    Fault(String),
}

/// A backend event tagged with the generation of the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct TaggedEvent {
    pub generation: u64,
    pub event: BackendEvent,
}

/// Sending half handed to a backend at construction.
#[derive(Debug, Clone)]
pub struct BackendEventSink {
    generation: u64,
    tx: UnboundedSender<TaggedEvent>,
}

impl BackendEventSink {
    pub fn new(generation: u64, tx: UnboundedSender<TaggedEvent>) -> Self {
        Self { generation, tx }
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `false` once the controller is gone.
    pub fn send(&self, event: BackendEvent) -> bool {
        self.tx
            .send(TaggedEvent {
                generation: self.generation,
                event,
            })
            .is_ok()
    }
}

/// Subtitle file attached next to the main stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleTrack {
    pub url: String,
    pub language: Option<String>,
    pub title: Option<String>,
    pub mime_type: Option<String>,
}

/// What a backend is asked to open.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadSpec {
    pub url: String,
    pub start_position_ms: u64,
    /// External subtitles, in the order their track positions were assigned.
    pub subtitles: Vec<SubtitleTrack>,
}

/// Capability interface shared by every decoder backend.
///
/// Track selection takes a position within the kind as computed by
/// [`TrackMap`](crate::tracks::TrackMap); `None` disables the kind.
#[async_trait]
pub trait DecoderBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn load(&self, spec: LoadSpec) -> Result<()>;

    async fn play(&self) -> Result<()>;

    async fn pause(&self) -> Result<()>;

    async fn seek_to(&self, position_ms: u64) -> Result<()>;

    /// Volume in `0..=100`.
    async fn set_volume(&self, volume: u8) -> Result<()>;

    /// Brightness in `0.0..=1.0`.
    async fn set_brightness(&self, brightness: f32) -> Result<()>;

    async fn set_playback_speed(&self, speed: f32) -> Result<()>;

    async fn select_track(&self, kind: StreamKind, position: Option<usize>) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Release native resources. Safe to call more than once.
    async fn release(&self);
}

/// Constructs backends for the controller.
pub trait BackendFactory: Send + Sync {
    fn create(&self, kind: BackendKind, events: BackendEventSink) -> Result<Box<dyn DecoderBackend>>;
}

/// Builds backends from the host factories in [`CoreConfig`].
pub struct HostBackendFactory {
    managed: Option<Arc<dyn ManagedPipelineFactory>>,
    native: Option<Arc<dyn NativePlayerFactory>>,
    hardware_codecs: Vec<String>,
    position_poll_interval: Duration,
}

impl HostBackendFactory {
    pub fn from_config(core: &CoreConfig, engine: &EngineConfig) -> Self {
        Self {
            managed: core.managed_pipeline_factory.clone(),
            native: core.native_player_factory.clone(),
            hardware_codecs: engine.hardware_codecs.clone(),
            position_poll_interval: engine.position_poll_interval,
        }
    }

    fn available(&self, kind: BackendKind) -> bool {
        match kind {
            BackendKind::Managed => self.managed.is_some(),
            BackendKind::Native => self.native.is_some(),
        }
    }
}

impl BackendFactory for HostBackendFactory {
    fn create(&self, kind: BackendKind, events: BackendEventSink) -> Result<Box<dyn DecoderBackend>> {
        let kind = if self.available(kind) {
            kind
        } else if self.available(kind.other()) {
            warn!(
                "{} backend requested but not provided; falling back to {}",
                kind,
                kind.other()
            );
            kind.other()
        } else {
            return Err(PlaybackError::BackendInit(
                "no decoder factory configured".to_string(),
            ));
        };

        match (kind, &self.managed, &self.native) {
            (BackendKind::Managed, Some(factory), _) => Ok(Box::new(ManagedBackend::new(
                factory.as_ref(),
                events,
                self.position_poll_interval,
            )?)),
            (BackendKind::Native, _, Some(factory)) => Ok(Box::new(NativeBackend::new(
                factory.as_ref(),
                events,
                &self.hardware_codecs,
            )?)),
            _ => Err(PlaybackError::Internal(format!(
                "{} backend vanished during selection",
                kind
            ))),
        }
    }
}

fn init_error(err: BridgeError) -> PlaybackError {
    PlaybackError::BackendInit(err.to_string())
}

fn command_error(err: BridgeError) -> PlaybackError {
    PlaybackError::Command(err.to_string())
}
