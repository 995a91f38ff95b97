//! # Engine Configuration
//!
//! Timing and backend settings for the playback engine. Every field has a
//! serde default so hosts can ship a partial JSON document.

use crate::error::{PlaybackError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// Which decoder backend family to construct.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Self-rendering platform pipeline (ExoPlayer/Media3, AVPlayer).
    Managed,
    /// Property/command driven library (libmpv).
    Native,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Managed => "managed",
            BackendKind::Native => "native",
        }
    }

    pub fn other(&self) -> BackendKind {
        match self {
            BackendKind::Managed => BackendKind::Native,
            BackendKind::Native => BackendKind::Managed,
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playback engine configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Period of the progress-report loop.
    ///
    /// Default: 10 seconds.
    #[serde(default = "default_progress_interval")]
    pub progress_interval: Duration,

    /// Period of the segment-poll loop.
    ///
    /// Default: 1 second.
    #[serde(default = "default_segment_poll_interval")]
    pub segment_poll_interval: Duration,

    /// Delay after load before the first segment poll.
    ///
    /// Default: 2 seconds.
    #[serde(default = "default_segment_grace_delay")]
    pub segment_grace_delay: Duration,

    /// A segment stops being skippable this many milliseconds before its end.
    ///
    /// Default: 1000.
    #[serde(default = "default_segment_end_epsilon_ms")]
    pub segment_end_epsilon_ms: u64,

    /// An end-of-media signal within this window of the duration counts as a
    /// natural end and may trigger autoplay.
    ///
    /// Default: 5000.
    #[serde(default = "default_natural_end_tolerance_ms")]
    pub natural_end_tolerance_ms: u64,

    /// How often managed pipelines are polled for position.
    ///
    /// Default: 500 ms.
    #[serde(default = "default_position_poll_interval")]
    pub position_poll_interval: Duration,

    /// Backend used when a load does not ask for one.
    ///
    /// Default: managed.
    #[serde(default = "default_preferred_backend")]
    pub preferred_backend: BackendKind,

    /// Codecs the native backend may hand to hardware decoders.
    #[serde(default = "default_hardware_codecs")]
    pub hardware_codecs: Vec<String>,

    /// Capacity of the controller's command queue.
    ///
    /// Default: 64.
    #[serde(default = "default_command_capacity")]
    pub command_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            progress_interval: default_progress_interval(),
            segment_poll_interval: default_segment_poll_interval(),
            segment_grace_delay: default_segment_grace_delay(),
            segment_end_epsilon_ms: default_segment_end_epsilon_ms(),
            natural_end_tolerance_ms: default_natural_end_tolerance_ms(),
            position_poll_interval: default_position_poll_interval(),
            preferred_backend: default_preferred_backend(),
            hardware_codecs: default_hardware_codecs(),
            command_capacity: default_command_capacity(),
        }
    }
}

impl EngineConfig {
    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        if self.progress_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "progress_interval must be > 0".to_string(),
            ));
        }

        if self.segment_poll_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "segment_poll_interval must be > 0".to_string(),
            ));
        }

        if self.position_poll_interval.is_zero() {
            return Err(PlaybackError::InvalidConfig(
                "position_poll_interval must be > 0".to_string(),
            ));
        }

        if self.command_capacity == 0 {
            return Err(PlaybackError::InvalidConfig(
                "command_capacity must be > 0".to_string(),
            ));
        }

        if self.hardware_codecs.iter().any(|codec| codec.trim().is_empty()) {
            return Err(PlaybackError::InvalidConfig(
                "hardware_codecs cannot contain empty entries".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_preferred_backend(mut self, backend: BackendKind) -> Self {
        self.preferred_backend = backend;
        self
    }

    pub fn with_natural_end_tolerance_ms(mut self, tolerance_ms: u64) -> Self {
        self.natural_end_tolerance_ms = tolerance_ms;
        self
    }
}

// ============================================================================
// Default Functions (for serde)
// ============================================================================

fn default_progress_interval() -> Duration {
    Duration::from_secs(10)
}

fn default_segment_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_segment_grace_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_segment_end_epsilon_ms() -> u64 {
    1_000
}

fn default_natural_end_tolerance_ms() -> u64 {
    5_000
}

fn default_position_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_preferred_backend() -> BackendKind {
    BackendKind::Managed
}

fn default_hardware_codecs() -> Vec<String> {
    ["h264", "hevc", "vp9", "av1"]
        .iter()
        .map(|codec| codec.to_string())
        .collect()
}

fn default_command_capacity() -> usize {
    64
}
