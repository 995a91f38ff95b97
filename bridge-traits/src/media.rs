//! Media server collaborator contracts.
//!
//! The playback engine never talks to the media server directly. It asks a
//! [`MediaCatalog`] for stream URLs, sources, segments and episode lists,
//! pushes progress through a [`ProgressSink`], and pulls seek-preview tiles
//! from a [`TrickplaySource`]. The data types here are the minimal projection
//! of the server's item model the engine needs.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Server time unit: one tick is 100 nanoseconds.
pub const TICKS_PER_MILLISECOND: i64 = 10_000;

/// Convert server ticks to milliseconds, flooring negative values to zero.
pub fn ticks_to_ms(ticks: i64) -> u64 {
    (ticks.max(0) / TICKS_PER_MILLISECOND) as u64
}

/// Convert milliseconds to server ticks.
pub fn ms_to_ticks(ms: u64) -> i64 {
    (ms as i64).saturating_mul(TICKS_PER_MILLISECOND)
}

// ============================================================================
// Items
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    Movie,
    Episode,
    Series,
    Season,
    Video,
    Audio,
    Other,
}

/// A playable (or browsable) catalog item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaItem {
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    pub series_id: Option<String>,
    pub season_id: Option<String>,
    /// Season number for episodes.
    pub parent_index_number: Option<i32>,
    /// Episode number within the season.
    pub index_number: Option<i32>,
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub media_sources: Vec<MediaSource>,
}

impl MediaItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            series_id: None,
            season_id: None,
            parent_index_number: None,
            index_number: None,
            run_time_ticks: None,
            media_sources: Vec::new(),
        }
    }

    /// Series this item belongs to, if it is an episode of one.
    pub fn series(&self) -> Option<&str> {
        match self.kind {
            ItemKind::Episode => self.series_id.as_deref(),
            _ => None,
        }
    }

    pub fn duration_ms(&self) -> Option<u64> {
        self.run_time_ticks.map(ticks_to_ms)
    }
}

/// One playable variant of an item (a file, an edition, a version).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaSource {
    pub id: String,
    pub name: Option<String>,
    pub container: Option<String>,
    pub supports_direct_play: bool,
    pub supports_direct_stream: bool,
    pub supports_transcoding: bool,
    /// Server-relative transcoding URL, when the server offered one.
    pub transcoding_url: Option<String>,
    pub run_time_ticks: Option<i64>,
    #[serde(default)]
    pub streams: Vec<MediaStream>,
}

impl MediaSource {
    /// Whether any delivery path exists for this source.
    pub fn is_playable(&self) -> bool {
        self.supports_direct_play
            || self.supports_direct_stream
            || (self.supports_transcoding && self.transcoding_url.is_some())
    }

    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &MediaStream> {
        self.streams.iter().filter(move |stream| stream.kind == kind)
    }

    /// Subtitle streams delivered as separate files.
    pub fn external_subtitles(&self) -> impl Iterator<Item = &MediaStream> {
        self.streams_of(StreamKind::Subtitle)
            .filter(|stream| stream.is_external && stream.delivery_url.is_some())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Other,
}

/// A single elementary stream inside a media source.
///
/// `index` is the server's stable identifier for the stream; the engine
/// translates it to whatever numbering the active decoder uses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaStream {
    pub index: i32,
    pub kind: StreamKind,
    pub codec: Option<String>,
    pub language: Option<String>,
    pub title: Option<String>,
    pub is_default: bool,
    pub is_external: bool,
    /// Absolute URL for externally delivered subtitles.
    pub delivery_url: Option<String>,
}

/// Track preferences forwarded to stream URL resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamHints {
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    pub start_position_ticks: i64,
}

// ============================================================================
// Segments
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentType {
    Intro,
    Outro,
    Recap,
    Commercial,
    Preview,
    Unknown,
}

impl SegmentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentType::Intro => "intro",
            SegmentType::Outro => "outro",
            SegmentType::Recap => "recap",
            SegmentType::Commercial => "commercial",
            SegmentType::Preview => "preview",
            SegmentType::Unknown => "unknown",
        }
    }
}

/// A labelled skippable range `[start_ticks, end_ticks)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSegment {
    pub segment_type: SegmentType,
    pub start_ticks: i64,
    pub end_ticks: i64,
}

impl MediaSegment {
    pub fn new(segment_type: SegmentType, start_ticks: i64, end_ticks: i64) -> Self {
        Self {
            segment_type,
            start_ticks,
            end_ticks,
        }
    }

    pub fn start_ms(&self) -> u64 {
        ticks_to_ms(self.start_ticks)
    }

    pub fn end_ms(&self) -> u64 {
        ticks_to_ms(self.end_ticks)
    }
}

// ============================================================================
// Trickplay
// ============================================================================

/// Descriptor of a tiled thumbnail sheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrickplaySheet {
    /// Pixel width of one thumbnail.
    pub width: u32,
    /// Pixel height of one thumbnail.
    pub height: u32,
    /// Thumbnails per tile row.
    pub tile_width: u32,
    /// Thumbnail rows per tile.
    pub tile_height: u32,
    pub thumbnail_count: u32,
    pub interval_ms: u64,
}

impl TrickplaySheet {
    pub fn thumbnails_per_tile(&self) -> u32 {
        self.tile_width.saturating_mul(self.tile_height)
    }

    /// Number of tile images needed to cover every thumbnail.
    pub fn tile_count(&self) -> u32 {
        let per_tile = self.thumbnails_per_tile();
        if per_tile == 0 {
            return 0;
        }
        self.thumbnail_count.div_ceil(per_tile)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Snapshot pushed to the server at session start, periodically, and at stop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackReport {
    pub item_id: String,
    pub media_source_id: Option<String>,
    pub session_id: String,
    pub position_ticks: i64,
    pub is_paused: bool,
    pub is_muted: bool,
    pub volume_level: u8,
    pub playback_rate: f32,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    /// Set on stop reports when the session ended in a fault.
    pub failed: bool,
}

// ============================================================================
// Collaborator traits
// ============================================================================

/// Catalog and metadata provider.
#[async_trait]
pub trait MediaCatalog: Send + Sync {
    /// Resolve a URL the decoder can open for the given source.
    async fn resolve_stream_url(
        &self,
        item_id: &str,
        media_source_id: &str,
        hints: &StreamHints,
    ) -> Result<String>;

    /// List the playable sources of an item, including their streams.
    async fn get_media_sources(&self, item_id: &str) -> Result<Vec<MediaSource>>;

    /// Skippable segments of an item. Items without segments return an empty list.
    async fn get_segments(&self, item_id: &str) -> Result<Vec<MediaSegment>>;

    /// Seasons of a series, in server order.
    async fn get_seasons(&self, series_id: &str) -> Result<Vec<MediaItem>>;

    /// Episodes of a series, optionally restricted to one season.
    async fn get_episodes(&self, series_id: &str, season_id: Option<&str>)
        -> Result<Vec<MediaItem>>;
}

/// Server-side playback progress tracking.
#[async_trait]
pub trait ProgressSink: Send + Sync {
    async fn report_start(&self, report: &PlaybackReport) -> Result<()>;

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()>;

    async fn report_stop(&self, report: &PlaybackReport) -> Result<()>;
}

/// Source of tiled seek-preview images.
#[async_trait]
pub trait TrickplaySource: Send + Sync {
    /// Sheet descriptor for an item, or `None` when the server has none.
    async fn trickplay_info(&self, item_id: &str) -> Result<Option<TrickplaySheet>>;

    /// Raw encoded bytes of one tile, or `None` when the tile does not exist.
    async fn get_tile(&self, item_id: &str, width: u32, tile_index: u32)
        -> Result<Option<Bytes>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subtitle(index: i32, external: bool) -> MediaStream {
        MediaStream {
            index,
            kind: StreamKind::Subtitle,
            codec: Some("subrip".into()),
            language: Some("eng".into()),
            title: None,
            is_default: false,
            is_external: external,
            delivery_url: external.then(|| format!("https://srv/sub/{index}.srt")),
        }
    }

    #[test]
    fn tick_conversions() {
        assert_eq!(ticks_to_ms(300_000_000), 30_000);
        assert_eq!(ticks_to_ms(-5), 0);
        assert_eq!(ms_to_ticks(1_500), 15_000_000);
    }

    #[test]
    fn tile_count_rounds_up() {
        let sheet = TrickplaySheet {
            width: 320,
            height: 180,
            tile_width: 10,
            tile_height: 10,
            thumbnail_count: 101,
            interval_ms: 10_000,
        };
        assert_eq!(sheet.thumbnails_per_tile(), 100);
        assert_eq!(sheet.tile_count(), 2);

        let empty = TrickplaySheet {
            tile_width: 0,
            ..sheet
        };
        assert_eq!(empty.tile_count(), 0);
    }

    #[test]
    fn series_only_for_episodes() {
        let mut episode = MediaItem::new("e1", "Pilot", ItemKind::Episode);
        episode.series_id = Some("s1".into());
        assert_eq!(episode.series(), Some("s1"));

        let mut movie = MediaItem::new("m1", "Film", ItemKind::Movie);
        movie.series_id = Some("s1".into());
        assert_eq!(movie.series(), None);
    }

    #[test]
    fn external_subtitles_require_delivery_url() {
        let mut source = MediaSource {
            id: "src".into(),
            name: None,
            container: Some("mkv".into()),
            supports_direct_play: true,
            supports_direct_stream: true,
            supports_transcoding: false,
            transcoding_url: None,
            run_time_ticks: None,
            streams: vec![subtitle(2, false), subtitle(5, true)],
        };
        let mut orphan = subtitle(6, true);
        orphan.delivery_url = None;
        source.streams.push(orphan);

        let external: Vec<i32> = source.external_subtitles().map(|s| s.index).collect();
        assert_eq!(external, vec![5]);
        assert!(source.is_playable());
    }
}
