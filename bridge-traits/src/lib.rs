//! # Host Bridge Traits
//!
//! Contracts between the playback core and everything it does not own: the
//! host platform (HTTP, settings, logging, decoders) and the media server
//! collaborators (catalog, progress, trickplay).
//!
//! ## Traits
//!
//! ### Networking & storage
//! - [`HttpClient`](http::HttpClient) - async HTTP with retry policy
//! - [`SettingsStore`](storage::SettingsStore) - key-value preferences
//! - [`LoggerSink`](logger::LoggerSink) - forward structured logs to the host
//!
//! ### Media server collaborators
//! - [`MediaCatalog`](media::MediaCatalog) - stream URLs, sources, segments, episodes
//! - [`ProgressSink`](media::ProgressSink) - start/progress/stop reports
//! - [`TrickplaySource`](media::TrickplaySource) - seek-preview tiles
//!
//! ### Decoders
//! - [`ManagedPipelineFactory`](playback::ManagedPipelineFactory) - self-rendering pipelines
//! - [`NativePlayerFactory`](playback::NativePlayerFactory) - property/command libraries
//!
//! ## Error Handling
//!
//! Every trait returns [`BridgeError`](error::BridgeError). Implementations
//! convert their platform errors at the boundary and keep messages actionable.
//!
//! ## Thread Safety
//!
//! All traits require `Send + Sync`; decoder callbacks are delivered through
//! channels rather than by calling back into the core.

pub mod error;
pub mod http;
pub mod logger;
pub mod media;
pub mod playback;
pub mod storage;

pub use error::BridgeError;

pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use logger::{ConsoleLogger, LogEntry, LogLevel, LoggerSink};
pub use media::{
    ItemKind, MediaCatalog, MediaItem, MediaSegment, MediaSource, MediaStream, PlaybackReport,
    ProgressSink, SegmentType, StreamHints, StreamKind, TrickplaySheet, TrickplaySource,
};
pub use playback::{
    EndFileReason, ManagedPipeline, ManagedPipelineFactory, NativeEvent, NativePlayer,
    NativePlayerFactory, NativeTrack, NativeValue, PipelineEvent, PipelineMediaItem,
    PipelineState, SubtitleConfiguration,
};
pub use storage::SettingsStore;
