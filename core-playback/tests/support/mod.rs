//! Shared fakes for core-playback integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::media::ms_to_ticks;
use bridge_traits::{
    BridgeError, ItemKind, ManagedPipeline, ManagedPipelineFactory, MediaCatalog, MediaItem,
    MediaSegment, MediaSource, MediaStream, PipelineEvent, PipelineMediaItem, PlaybackReport,
    ProgressSink, StreamHints, StreamKind, TrickplaySheet, TrickplaySource,
};
use bytes::Bytes;
use core_async::sync::mpsc::UnboundedSender;
use core_runtime::events::{CoreEvent, Receiver};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

// ============================================================================
// Fixtures
// ============================================================================

/// Playable source: video 0, audio 1 and 2, embedded subtitle 3, external
/// subtitle 4.
pub fn source(id: &str) -> MediaSource {
    let stream = |index: i32, kind: StreamKind, external: bool| MediaStream {
        index,
        kind,
        codec: Some(if kind == StreamKind::Subtitle { "srt" } else { "h264" }.to_string()),
        language: Some("eng".to_string()),
        title: None,
        is_default: index == 1,
        is_external: external,
        delivery_url: external.then(|| format!("https://media.test/subs/{id}/{index}.srt")),
    };
    MediaSource {
        id: id.to_string(),
        name: None,
        container: Some("mkv".to_string()),
        supports_direct_play: true,
        supports_direct_stream: true,
        supports_transcoding: false,
        transcoding_url: None,
        run_time_ticks: Some(ms_to_ticks(1_200_000)),
        streams: vec![
            stream(0, StreamKind::Video, false),
            stream(1, StreamKind::Audio, false),
            stream(2, StreamKind::Audio, false),
            stream(3, StreamKind::Subtitle, false),
            stream(4, StreamKind::Subtitle, true),
        ],
    }
}

pub fn movie(id: &str) -> MediaItem {
    let mut item = MediaItem::new(id, format!("Movie {id}"), ItemKind::Movie);
    item.run_time_ticks = Some(ms_to_ticks(1_200_000));
    item.media_sources = vec![source(id)];
    item
}

pub fn season(id: &str, number: i32) -> MediaItem {
    let mut item = MediaItem::new(id, format!("Season {number}"), ItemKind::Season);
    item.series_id = Some("show".to_string());
    item.index_number = Some(number);
    item
}

pub fn episode(id: &str, season_id: &str, season_number: i32, number: i32) -> MediaItem {
    let mut item = MediaItem::new(id, format!("Episode {number}"), ItemKind::Episode);
    item.series_id = Some("show".to_string());
    item.season_id = Some(season_id.to_string());
    item.parent_index_number = Some(season_number);
    item.index_number = Some(number);
    item.run_time_ticks = Some(ms_to_ticks(1_200_000));
    item
}

// ============================================================================
// Catalog
// ============================================================================

#[derive(Default)]
pub struct FakeCatalog {
    pub sources: Mutex<HashMap<String, Vec<MediaSource>>>,
    pub segments: Mutex<HashMap<String, Vec<MediaSegment>>>,
    pub seasons: Mutex<Vec<MediaItem>>,
    pub episodes: Mutex<HashMap<String, Vec<MediaItem>>>,
    pub fail_stream_url: AtomicBool,
    pub fail_sources: AtomicBool,
    pub fail_seasons: AtomicBool,
    pub source_calls: AtomicUsize,
}

impl FakeCatalog {
    /// Two seasons of three and two episodes, every episode playable.
    pub fn with_series() -> Self {
        let catalog = Self::default();
        *catalog.seasons.lock() = vec![season("s1", 1), season("s2", 2)];
        let mut episodes = HashMap::new();
        // Server order deliberately scrambled.
        episodes.insert(
            "s1".to_string(),
            vec![
                episode("s1e2", "s1", 1, 2),
                episode("s1e1", "s1", 1, 1),
                episode("s1e3", "s1", 1, 3),
            ],
        );
        episodes.insert(
            "s2".to_string(),
            vec![episode("s2e2", "s2", 2, 2), episode("s2e1", "s2", 2, 1)],
        );
        for id in ["s1e1", "s1e2", "s1e3", "s2e1", "s2e2"] {
            catalog.sources.lock().insert(id.to_string(), vec![source(id)]);
        }
        *catalog.episodes.lock() = episodes;
        catalog
    }
}

#[async_trait]
impl MediaCatalog for FakeCatalog {
    async fn resolve_stream_url(
        &self,
        item_id: &str,
        media_source_id: &str,
        _hints: &StreamHints,
    ) -> Result<String> {
        if self.fail_stream_url.load(Ordering::SeqCst) {
            return Err(BridgeError::Http {
                status: 500,
                message: "playback info failed".to_string(),
            });
        }
        Ok(format!(
            "https://media.test/Videos/{item_id}/stream?static=true&mediaSourceId={media_source_id}"
        ))
    }

    async fn get_media_sources(&self, item_id: &str) -> Result<Vec<MediaSource>> {
        self.source_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_sources.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("sources unavailable".to_string()));
        }
        self.sources
            .lock()
            .get(item_id)
            .cloned()
            .ok_or_else(|| BridgeError::NotFound(item_id.to_string()))
    }

    async fn get_segments(&self, item_id: &str) -> Result<Vec<MediaSegment>> {
        Ok(self.segments.lock().get(item_id).cloned().unwrap_or_default())
    }

    async fn get_seasons(&self, _series_id: &str) -> Result<Vec<MediaItem>> {
        if self.fail_seasons.load(Ordering::SeqCst) {
            return Err(BridgeError::Http {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.seasons.lock().clone())
    }

    async fn get_episodes(
        &self,
        _series_id: &str,
        season_id: Option<&str>,
    ) -> Result<Vec<MediaItem>> {
        let episodes = self.episodes.lock();
        Ok(match season_id {
            Some(season_id) => episodes.get(season_id).cloned().unwrap_or_default(),
            None => episodes.values().flatten().cloned().collect(),
        })
    }
}

// ============================================================================
// Progress sink
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct Reported {
    pub kind: &'static str,
    pub session_id: String,
    pub item_id: String,
    pub failed: bool,
}

#[derive(Default)]
pub struct RecordingSink {
    pub reports: Mutex<Vec<Reported>>,
}

impl RecordingSink {
    fn record(&self, kind: &'static str, report: &PlaybackReport) -> Result<()> {
        self.reports.lock().push(Reported {
            kind,
            session_id: report.session_id.clone(),
            item_id: report.item_id.clone(),
            failed: report.failed,
        });
        Ok(())
    }

    pub fn of_kind(&self, kind: &str) -> Vec<Reported> {
        self.reports
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn all(&self) -> Vec<Reported> {
        self.reports.lock().clone()
    }
}

#[async_trait]
impl ProgressSink for RecordingSink {
    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        self.record("start", report)
    }

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        self.record("progress", report)
    }

    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        self.record("stop", report)
    }
}

// ============================================================================
// Managed pipeline
// ============================================================================

#[derive(Default)]
pub struct FakePipeline {
    pub calls: Mutex<Vec<String>>,
    pub items: Mutex<Vec<PipelineMediaItem>>,
    pub position_ms: AtomicU64,
    pub duration_ms: AtomicU64,
    pub releases: AtomicUsize,
    /// Seeks fail without moving the position.
    pub reject_seeks: AtomicBool,
}

impl FakePipeline {
    fn record(&self, call: String) {
        self.calls.lock().push(call);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub fn set_position(&self, position_ms: u64) {
        self.position_ms.store(position_ms, Ordering::SeqCst);
    }
}

#[async_trait]
impl ManagedPipeline for FakePipeline {
    async fn set_media_item(&self, item: PipelineMediaItem) -> Result<()> {
        self.position_ms.store(item.start_position_ms, Ordering::SeqCst);
        self.items.lock().push(item);
        self.record("set_media_item".to_string());
        Ok(())
    }

    async fn prepare(&self) -> Result<()> {
        self.record("prepare".to_string());
        Ok(())
    }

    async fn set_play_when_ready(&self, play_when_ready: bool) -> Result<()> {
        self.record(format!("play_when_ready:{play_when_ready}"));
        Ok(())
    }

    async fn seek_to(&self, position_ms: u64) -> Result<()> {
        if self.reject_seeks.load(Ordering::SeqCst) {
            return Err(BridgeError::OperationFailed("seek rejected".to_string()));
        }
        self.position_ms.store(position_ms, Ordering::SeqCst);
        self.record(format!("seek:{position_ms}"));
        Ok(())
    }

    async fn set_volume(&self, volume: f32) -> Result<()> {
        self.record(format!("volume:{volume}"));
        Ok(())
    }

    async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.record(format!("speed:{speed}"));
        Ok(())
    }

    async fn set_screen_brightness(&self, brightness: f32) -> Result<()> {
        self.record(format!("brightness:{brightness}"));
        Ok(())
    }

    async fn select_track(&self, kind: StreamKind, ordinal: Option<usize>) -> Result<()> {
        self.record(format!("track:{kind:?}:{ordinal:?}"));
        Ok(())
    }

    fn current_position_ms(&self) -> u64 {
        self.position_ms.load(Ordering::SeqCst)
    }

    fn duration_ms(&self) -> Option<u64> {
        match self.duration_ms.load(Ordering::SeqCst) {
            0 => None,
            duration => Some(duration),
        }
    }

    async fn stop(&self) -> Result<()> {
        self.record("stop".to_string());
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Hands out a fresh [`FakePipeline`] per backend and keeps the host-side
/// event sender so tests can play the decoder.
#[derive(Default)]
pub struct FakePipelineFactory {
    created: Mutex<Vec<(Arc<FakePipeline>, UnboundedSender<PipelineEvent>)>>,
    pub fail: AtomicBool,
}

impl FakePipelineFactory {
    pub fn count(&self) -> usize {
        self.created.lock().len()
    }

    pub fn pipeline(&self, index: usize) -> Arc<FakePipeline> {
        self.created.lock()[index].0.clone()
    }

    pub fn latest(&self) -> Arc<FakePipeline> {
        self.created.lock().last().expect("no pipeline created").0.clone()
    }

    /// Push an event as the host decoder of the latest pipeline would.
    pub fn send(&self, event: PipelineEvent) {
        let created = self.created.lock();
        let (_, host) = created.last().expect("no pipeline created");
        host.send(event).ok();
    }

    pub fn send_to(&self, index: usize, event: PipelineEvent) {
        self.created.lock()[index].1.send(event).ok();
    }
}

impl ManagedPipelineFactory for FakePipelineFactory {
    fn create(&self, events: UnboundedSender<PipelineEvent>) -> Result<Arc<dyn ManagedPipeline>> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(BridgeError::NotAvailable("decoder surface busy".to_string()));
        }
        let pipeline = Arc::new(FakePipeline {
            duration_ms: AtomicU64::new(1_200_000),
            ..FakePipeline::default()
        });
        self.created.lock().push((pipeline.clone(), events));
        Ok(pipeline)
    }
}

// ============================================================================
// Trickplay
// ============================================================================

/// Serves tiles synthesised from `sheet`; each thumbnail's red channel is
/// its global index modulo 256.
pub struct FakeTrickplay {
    pub sheet: Option<TrickplaySheet>,
    /// Tiles at or after this index fail to fetch.
    pub fail_from: Option<u32>,
    /// Tiles at or after this index are absent.
    pub missing_from: Option<u32>,
    pub fetches: AtomicUsize,
}

impl FakeTrickplay {
    pub fn new(sheet: TrickplaySheet) -> Self {
        Self {
            sheet: Some(sheet),
            fail_from: None,
            missing_from: None,
            fetches: AtomicUsize::new(0),
        }
    }
}

pub fn tile_bytes(sheet: &TrickplaySheet, tile_index: u32) -> Bytes {
    let per_tile = sheet.thumbnails_per_tile();
    let mut tile = RgbaImage::new(sheet.width * sheet.tile_width, sheet.height * sheet.tile_height);
    for (x, y, pixel) in tile.enumerate_pixels_mut() {
        let cell = (y / sheet.height) * sheet.tile_width + x / sheet.width;
        let global = tile_index * per_tile + cell;
        *pixel = Rgba([(global % 256) as u8, 0, 0, 255]);
    }
    let mut out = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(tile)
        .write_to(&mut out, ImageFormat::Png)
        .expect("encode tile");
    Bytes::from(out.into_inner())
}

#[async_trait]
impl TrickplaySource for FakeTrickplay {
    async fn trickplay_info(&self, _item_id: &str) -> Result<Option<TrickplaySheet>> {
        Ok(self.sheet)
    }

    async fn get_tile(&self, _item_id: &str, width: u32, tile_index: u32) -> Result<Option<Bytes>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let sheet = self.sheet.expect("tile requested without a sheet");
        assert_eq!(width, sheet.width);
        if self.fail_from.is_some_and(|from| tile_index >= from) {
            return Err(BridgeError::Http {
                status: 502,
                message: "bad gateway".to_string(),
            });
        }
        if self.missing_from.is_some_and(|from| tile_index >= from) {
            return Ok(None);
        }
        Ok(Some(tile_bytes(&sheet, tile_index)))
    }
}

// ============================================================================
// Event helpers
// ============================================================================

/// Next event on the bus matching `predicate`, failing after a minute of
/// (virtual) time.
pub async fn next_event<F>(rx: &mut Receiver<CoreEvent>, mut predicate: F) -> CoreEvent
where
    F: FnMut(&CoreEvent) -> bool,
{
    tokio::time::timeout(Duration::from_secs(60), async {
        loop {
            match rx.recv().await {
                Ok(event) if predicate(&event) => return event,
                Ok(_) => continue,
                Err(err) => panic!("event bus failed: {err}"),
            }
        }
    })
    .await
    .expect("timed out waiting for event")
}
