//! Jellyfin API wire types
//!
//! Jellyfin speaks PascalCase JSON. These structures cover the subset of
//! the item, playback info, segment and session models the playback engine
//! uses, plus conversions into the bridge types.

use bridge_traits::{
    ItemKind, MediaItem, MediaSegment, MediaSource, MediaStream, PlaybackReport, SegmentType,
    StreamKind, TrickplaySheet,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

// ============================================================================
// Items
// ============================================================================

/// `BaseItemDto`, trimmed to the fields the engine reads.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct BaseItemDto {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    /// Item type, e.g. `Episode`, `Movie`, `Season`
    #[serde(rename = "Type", default)]
    pub item_type: Option<String>,

    #[serde(default)]
    pub series_id: Option<String>,

    #[serde(default)]
    pub season_id: Option<String>,

    #[serde(default)]
    pub parent_index_number: Option<i32>,

    #[serde(default)]
    pub index_number: Option<i32>,

    #[serde(default)]
    pub run_time_ticks: Option<i64>,

    #[serde(default)]
    pub media_sources: Option<Vec<MediaSourceInfo>>,

    /// Media source id → thumbnail width → sheet descriptor
    #[serde(default)]
    pub trickplay: Option<HashMap<String, HashMap<String, TrickplayInfo>>>,
}

/// `QueryResult<T>` envelope returned by list endpoints.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct QueryResult<T> {
    #[serde(default = "Vec::new")]
    pub items: Vec<T>,

    #[serde(default)]
    pub total_record_count: Option<u32>,
}

fn item_kind(item_type: Option<&str>) -> ItemKind {
    match item_type {
        Some("Movie") => ItemKind::Movie,
        Some("Episode") => ItemKind::Episode,
        Some("Series") => ItemKind::Series,
        Some("Season") => ItemKind::Season,
        Some("Video") | Some("MusicVideo") => ItemKind::Video,
        Some("Audio") => ItemKind::Audio,
        _ => ItemKind::Other,
    }
}

impl BaseItemDto {
    /// Convert into the bridge model. Relative subtitle delivery URLs are
    /// resolved against `base_url`.
    pub fn into_media_item(self, base_url: &str) -> MediaItem {
        let kind = item_kind(self.item_type.as_deref());
        let name = self.name.unwrap_or_default();
        let mut item = MediaItem::new(self.id, name, kind);
        item.series_id = self.series_id;
        item.season_id = self.season_id;
        item.parent_index_number = self.parent_index_number;
        item.index_number = self.index_number;
        item.run_time_ticks = self.run_time_ticks;
        item.media_sources = self
            .media_sources
            .unwrap_or_default()
            .into_iter()
            .map(|source| source.into_media_source(base_url))
            .collect();
        item
    }
}

// ============================================================================
// Playback info
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackInfoResponse {
    #[serde(default)]
    pub media_sources: Vec<MediaSourceInfo>,

    #[serde(default)]
    pub play_session_id: Option<String>,

    /// Set when the server refuses playback, e.g. `NotAllowed`
    #[serde(default)]
    pub error_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSourceInfo {
    pub id: String,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub container: Option<String>,

    #[serde(default)]
    pub supports_direct_play: bool,

    #[serde(default)]
    pub supports_direct_stream: bool,

    #[serde(default)]
    pub supports_transcoding: bool,

    /// Server-relative, e.g. `/videos/{id}/master.m3u8?...`
    #[serde(default)]
    pub transcoding_url: Option<String>,

    #[serde(default)]
    pub run_time_ticks: Option<i64>,

    #[serde(default)]
    pub media_streams: Vec<MediaStreamInfo>,
}

impl MediaSourceInfo {
    pub fn into_media_source(self, base_url: &str) -> MediaSource {
        MediaSource {
            id: self.id,
            name: self.name,
            container: self.container,
            supports_direct_play: self.supports_direct_play,
            supports_direct_stream: self.supports_direct_stream,
            supports_transcoding: self.supports_transcoding,
            transcoding_url: self.transcoding_url,
            run_time_ticks: self.run_time_ticks,
            streams: self
                .media_streams
                .into_iter()
                .map(|stream| stream.into_media_stream(base_url))
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaStreamInfo {
    pub index: i32,

    /// `Video`, `Audio`, `Subtitle`, `EmbeddedImage`, ...
    #[serde(rename = "Type")]
    pub stream_type: String,

    #[serde(default)]
    pub codec: Option<String>,

    #[serde(default)]
    pub language: Option<String>,

    #[serde(default)]
    pub display_title: Option<String>,

    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub is_external: bool,

    #[serde(default)]
    pub delivery_url: Option<String>,
}

impl MediaStreamInfo {
    pub fn into_media_stream(self, base_url: &str) -> MediaStream {
        let kind = match self.stream_type.as_str() {
            "Video" => StreamKind::Video,
            "Audio" => StreamKind::Audio,
            "Subtitle" => StreamKind::Subtitle,
            _ => StreamKind::Other,
        };
        MediaStream {
            index: self.index,
            kind,
            codec: self.codec,
            language: self.language,
            title: self.display_title.or(self.title),
            is_default: self.is_default,
            is_external: self.is_external,
            delivery_url: self.delivery_url.map(|url| absolute_url(base_url, &url)),
        }
    }
}

/// Join a server-relative path onto `base_url`; absolute URLs pass through.
pub fn absolute_url(base_url: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!(
        "{}/{}",
        base_url.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

// ============================================================================
// Segments
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MediaSegmentDto {
    #[serde(rename = "Type", default)]
    pub segment_type: Option<String>,

    pub start_ticks: i64,

    pub end_ticks: i64,
}

impl From<MediaSegmentDto> for MediaSegment {
    fn from(dto: MediaSegmentDto) -> Self {
        let segment_type = match dto.segment_type.as_deref() {
            Some("Intro") => SegmentType::Intro,
            Some("Outro") => SegmentType::Outro,
            Some("Recap") => SegmentType::Recap,
            Some("Commercial") => SegmentType::Commercial,
            Some("Preview") => SegmentType::Preview,
            _ => SegmentType::Unknown,
        };
        MediaSegment::new(segment_type, dto.start_ticks, dto.end_ticks)
    }
}

// ============================================================================
// Trickplay
// ============================================================================

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TrickplayInfo {
    pub width: u32,
    pub height: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub thumbnail_count: u32,
    /// Milliseconds between thumbnails
    pub interval: u64,
}

impl From<TrickplayInfo> for TrickplaySheet {
    fn from(info: TrickplayInfo) -> Self {
        TrickplaySheet {
            width: info.width,
            height: info.height,
            tile_width: info.tile_width,
            tile_height: info.tile_height,
            thumbnail_count: info.thumbnail_count,
            interval_ms: info.interval,
        }
    }
}

// ============================================================================
// Session reports
// ============================================================================

/// Body of `POST /Sessions/Playing`, `/Progress` and `/Stopped`.
///
/// The server accepts the same shape on all three endpoints and ignores
/// fields an endpoint does not use.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct PlaybackReportBody {
    pub item_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_source_id: Option<String>,

    pub play_session_id: String,

    pub position_ticks: i64,

    pub is_paused: bool,

    pub is_muted: bool,

    pub volume_level: u8,

    pub playback_rate: f32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_stream_index: Option<i32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle_stream_index: Option<i32>,

    pub can_seek: bool,

    pub failed: bool,
}

impl From<&PlaybackReport> for PlaybackReportBody {
    fn from(report: &PlaybackReport) -> Self {
        Self {
            item_id: report.item_id.clone(),
            media_source_id: report.media_source_id.clone(),
            play_session_id: report.session_id.clone(),
            position_ticks: report.position_ticks,
            is_paused: report.is_paused,
            is_muted: report.is_muted,
            volume_level: report.volume_level,
            playback_rate: report.playback_rate,
            audio_stream_index: report.audio_stream_index,
            subtitle_stream_index: report.subtitle_stream_index,
            can_seek: true,
            failed: report.failed,
        }
    }
}
