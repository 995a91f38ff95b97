//! # Transport State
//!
//! The observable snapshot of playback. The controller owns the only
//! mutable copy and replaces it wholesale through the reducers below; every
//! reducer consumes the old snapshot and returns the next one.
//!
//! `is_playing` is always derived, never assigned by callers, which keeps
//! `is_playing => !is_paused` true for every reachable state.

use crate::error::PlaybackFailure;
use serde::{Deserialize, Serialize};

pub const MIN_PLAYBACK_SPEED: f32 = 0.25;
pub const MAX_PLAYBACK_SPEED: f32 = 4.0;
pub const MAX_VOLUME: u8 = 100;

/// Clamp a requested volume into `0..=100`.
pub fn clamp_volume(volume: i32) -> u8 {
    volume.clamp(0, MAX_VOLUME as i32) as u8
}

/// Clamp a brightness into `0.0..=1.0`. NaN maps to full brightness.
pub fn clamp_brightness(brightness: f32) -> f32 {
    if brightness.is_nan() {
        return 1.0;
    }
    brightness.clamp(0.0, 1.0)
}

/// Clamp a playback rate into `0.25..=4.0`. NaN maps to normal speed.
pub fn clamp_speed(speed: f32) -> f32 {
    if speed.is_nan() {
        return 1.0;
    }
    speed.clamp(MIN_PLAYBACK_SPEED, MAX_PLAYBACK_SPEED)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransportState {
    /// Item currently loaded; `None` while idle.
    pub current_item: Option<String>,
    pub media_source_id: Option<String>,
    pub session_id: Option<String>,
    pub position_ms: u64,
    pub duration_ms: u64,
    pub is_playing: bool,
    pub is_paused: bool,
    pub is_buffering: bool,
    pub is_loading: bool,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    /// 0-100
    pub volume: u8,
    /// 0.0-1.0
    pub brightness: f32,
    pub playback_speed: f32,
    /// Last fatal condition; cleared by the next successful load.
    pub error: Option<PlaybackFailure>,
}

impl Default for TransportState {
    fn default() -> Self {
        Self {
            current_item: None,
            media_source_id: None,
            session_id: None,
            position_ms: 0,
            duration_ms: 0,
            is_playing: false,
            is_paused: false,
            is_buffering: false,
            is_loading: false,
            audio_stream_index: None,
            subtitle_stream_index: None,
            volume: MAX_VOLUME,
            brightness: 1.0,
            playback_speed: 1.0,
            error: None,
        }
    }
}

impl TransportState {
    /// Whether a session is loaded and has not faulted.
    pub fn is_active(&self) -> bool {
        self.session_id.is_some() && self.current_item.is_some() && self.error.is_none()
    }

    /// Rest state. Device-level settings (volume, brightness, speed) survive.
    pub fn rest(self) -> Self {
        Self {
            volume: self.volume,
            brightness: self.brightness,
            playback_speed: self.playback_speed,
            ..Self::default()
        }
    }

    /// A new load began: the previous item's fields are dropped.
    pub fn loading(self, item_id: &str, media_source_id: &str) -> Self {
        Self {
            current_item: Some(item_id.to_string()),
            media_source_id: Some(media_source_id.to_string()),
            is_loading: true,
            ..self.rest()
        }
    }

    /// The backend accepted the media; a session id is assigned.
    pub fn started(
        self,
        session_id: &str,
        start_position_ms: u64,
        audio_stream_index: Option<i32>,
        subtitle_stream_index: Option<i32>,
    ) -> Self {
        Self {
            session_id: Some(session_id.to_string()),
            position_ms: start_position_ms,
            audio_stream_index,
            subtitle_stream_index,
            ..self
        }
    }

    /// The backend is ready to play.
    pub fn ready(self, duration_ms: Option<u64>) -> Self {
        Self {
            is_loading: false,
            is_buffering: false,
            duration_ms: duration_ms.unwrap_or(self.duration_ms),
            ..self
        }
        .derive_playing()
    }

    pub fn paused(self, paused: bool) -> Self {
        Self {
            is_paused: paused,
            ..self
        }
        .derive_playing()
    }

    pub fn buffering(self, buffering: bool) -> Self {
        Self {
            is_buffering: buffering,
            ..self
        }
        .derive_playing()
    }

    /// The backend went idle (nothing loaded) or left idle.
    pub fn idle(self, idle: bool) -> Self {
        if idle {
            Self {
                is_playing: false,
                is_buffering: false,
                ..self
            }
        } else {
            self.derive_playing()
        }
    }

    pub fn position(self, position_ms: u64) -> Self {
        Self {
            position_ms,
            ..self
        }
    }

    pub fn duration(self, duration_ms: u64) -> Self {
        Self {
            duration_ms,
            ..self
        }
    }

    /// Mid-playback fault or failed load: halted, error recorded.
    pub fn failed(self, failure: PlaybackFailure) -> Self {
        Self {
            error: Some(failure),
            is_playing: false,
            is_buffering: false,
            is_loading: false,
            ..self
        }
    }

    pub fn volume(self, volume: i32) -> Self {
        Self {
            volume: clamp_volume(volume),
            ..self
        }
    }

    pub fn brightness(self, brightness: f32) -> Self {
        Self {
            brightness: clamp_brightness(brightness),
            ..self
        }
    }

    pub fn speed(self, speed: f32) -> Self {
        Self {
            playback_speed: clamp_speed(speed),
            ..self
        }
    }

    pub fn audio_track(self, index: Option<i32>) -> Self {
        Self {
            audio_stream_index: index,
            ..self
        }
    }

    pub fn subtitle_track(self, index: Option<i32>) -> Self {
        Self {
            subtitle_stream_index: index,
            ..self
        }
    }

    fn derive_playing(self) -> Self {
        let is_playing = self.current_item.is_some()
            && self.error.is_none()
            && !self.is_loading
            && !self.is_paused
            && !self.is_buffering;
        Self { is_playing, ..self }
    }
}
