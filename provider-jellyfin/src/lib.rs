//! # Jellyfin Provider
//!
//! Implements the playback engine's server collaborators against the
//! Jellyfin HTTP API.
//!
//! ## Overview
//!
//! This crate provides:
//! - `MediaCatalog`: playback info, stream URL resolution, media segments,
//!   seasons and episodes
//! - `ProgressSink`: session start/progress/stop reports
//! - `TrickplaySource`: tiled seek-preview sheets
//! - Exponential backoff for rate limiting and server errors
//!
//! ```ignore
//! use provider_jellyfin::{DeviceInfo, JellyfinClient, ServerSession};
//!
//! let session = ServerSession::new("https://media.example.com", user_id, token, DeviceInfo::default());
//! let client = Arc::new(JellyfinClient::new(http_client, session));
//! let config = CoreConfig::builder()
//!     .catalog(client.clone())
//!     .progress_sink(client.clone())
//!     .trickplay_source(client)
//!     .build()?;
//! ```

mod catalog;
pub mod client;
pub mod error;
mod reporting;
mod trickplay;
pub mod types;

pub use client::{DeviceInfo, JellyfinClient, ServerSession};
pub use error::{JellyfinError, Result};
