//! # Playback Engine
//!
//! Owns one playback session at a time on top of interchangeable decoder
//! backends.
//!
//! ## Overview
//!
//! This crate handles:
//! - Transport state: the observable snapshot, replaced wholesale on change
//! - Decoder backends: managed pipelines and native libraries behind one trait
//! - Session control: a single controller task folding commands and backend
//!   events into transport state
//! - Segment skipping: intro/outro/recap affordances
//! - Trickplay: seek-preview thumbnails sliced from tiled sheets
//! - Play queue: cross-season episode queues with autoplay hand-off
//! - Progress reporting: best-effort start/progress/stop reports
//!
//! ## Example
//!
//! ```ignore
//! use core_playback::{EngineConfig, LoadRequest, PlaybackEngine};
//! use core_runtime::events::EventBus;
//!
//! let handle = PlaybackEngine::spawn(&core_config, EngineConfig::default(), EventBus::default())?;
//! handle.load_media(LoadRequest::new(episode)).await?;
//! handle.pause().await?;
//! ```

pub mod backend;
pub mod config;
pub mod controller;
pub mod error;
pub mod preferences;
pub mod queue;
pub mod reporter;
pub mod segments;
pub mod state;
pub mod tracks;
pub mod trickplay;

pub use backend::{BackendEvent, BackendFactory, DecoderBackend, HostBackendFactory};
pub use config::{BackendKind, EngineConfig};
pub use controller::{LoadRequest, PlaybackEngine, PlaybackHandle, SeekPreview};
pub use error::{ErrorCode, PlaybackError, PlaybackFailure, Result};
pub use preferences::PlaybackPreferences;
pub use queue::{PlaylistManager, QueueEntry, QueueSnapshot};
pub use segments::{MonitorState, SegmentMonitor, SkipChange};
pub use state::TransportState;
pub use trickplay::TrickplayImages;
