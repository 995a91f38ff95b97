//! Caller-facing command surface.

use crate::config::BackendKind;
use crate::error::{ErrorCode, PlaybackError, PlaybackFailure, Result};
use crate::queue::QueueSnapshot;
use crate::state::TransportState;
use bridge_traits::MediaItem;
use core_async::sync::{mpsc, oneshot, watch};
use core_runtime::events::{EventBus, EventStream, Receiver};
use image::RgbaImage;
use std::fmt;
use std::sync::Arc;

/// Everything `load_media` needs to start a session.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadRequest {
    pub item: MediaItem,
    /// Source variant to play; the first playable source when `None`.
    pub media_source_id: Option<String>,
    pub audio_stream_index: Option<i32>,
    pub subtitle_stream_index: Option<i32>,
    pub start_position_ms: u64,
    /// Overrides the configured preferred backend for this load.
    pub backend: Option<BackendKind>,
}

impl LoadRequest {
    pub fn new(item: MediaItem) -> Self {
        Self {
            item,
            media_source_id: None,
            audio_stream_index: None,
            subtitle_stream_index: None,
            start_position_ms: 0,
            backend: None,
        }
    }

    pub fn with_media_source(mut self, media_source_id: impl Into<String>) -> Self {
        self.media_source_id = Some(media_source_id.into());
        self
    }

    pub fn with_audio_stream(mut self, index: i32) -> Self {
        self.audio_stream_index = Some(index);
        self
    }

    pub fn with_subtitle_stream(mut self, index: i32) -> Self {
        self.subtitle_stream_index = Some(index);
        self
    }

    pub fn with_start_position_ms(mut self, position_ms: u64) -> Self {
        self.start_position_ms = position_ms;
        self
    }

    pub fn with_backend(mut self, backend: BackendKind) -> Self {
        self.backend = Some(backend);
        self
    }
}

/// Thumbnail served for a scrub position.
#[derive(Debug, Clone)]
pub struct SeekPreview {
    pub position_ms: u64,
    pub thumbnail_index: usize,
    pub image: Arc<RgbaImage>,
}

type Reply<T = ()> = oneshot::Sender<T>;

pub(crate) enum Command {
    Load {
        request: Box<LoadRequest>,
        reply: Reply<std::result::Result<(), PlaybackFailure>>,
    },
    Play(Reply),
    Pause(Reply),
    Stop(Reply),
    SeekTo {
        position_ms: u64,
        reply: Reply,
    },
    SeekRelative {
        delta_ms: i64,
        reply: Reply,
    },
    SetVolume {
        volume: i32,
        reply: Reply,
    },
    SetBrightness {
        brightness: f32,
        reply: Reply,
    },
    SetPlaybackSpeed {
        speed: f32,
        reply: Reply,
    },
    SelectAudioTrack {
        index: i32,
        reply: Reply,
    },
    SelectSubtitleTrack {
        index: Option<i32>,
        reply: Reply,
    },
    SkipSegment(Reply<bool>),
    SeekPreview {
        position_ms: u64,
        reply: Reply<Option<SeekPreview>>,
    },
    QueueNext(Reply<Option<MediaItem>>),
    QueuePrevious(Reply<Option<MediaItem>>),
    JumpToItem {
        item_id: String,
        reply: Reply<Option<MediaItem>>,
    },
    QueueSnapshot(Reply<QueueSnapshot>),
    ReportStart(Reply),
    ReportProgress(Reply),
    ReportStop(Reply<bool>),
    Shutdown(Reply),
}

/// Cloneable handle to a running engine.
///
/// Every method enqueues one command on the controller and waits for its
/// acknowledgement. Once the engine has shut down every call returns
/// [`PlaybackError::EngineShutdown`].
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<Command>,
    state: watch::Receiver<TransportState>,
    events: EventBus,
}

impl fmt::Debug for PlaybackHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PlaybackHandle")
            .field("closed", &self.commands.is_closed())
            .field("state", &*self.state.borrow())
            .finish()
    }
}

impl PlaybackHandle {
    pub(crate) fn new(
        commands: mpsc::Sender<Command>,
        state: watch::Receiver<TransportState>,
        events: EventBus,
    ) -> Self {
        Self {
            commands,
            state,
            events,
        }
    }

    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(build(tx))
            .await
            .map_err(|_| PlaybackError::EngineShutdown)?;
        rx.await.map_err(|_| PlaybackError::EngineShutdown)
    }

    /// Start a new session. Any current session is torn down first.
    ///
    /// Failures are also recorded in the transport state's `error` field.
    pub async fn load_media(&self, request: LoadRequest) -> std::result::Result<(), PlaybackFailure> {
        let request = Box::new(request);
        match self
            .request(|reply| Command::Load { request, reply })
            .await
        {
            Ok(outcome) => outcome,
            Err(_) => Err(PlaybackFailure::new(
                ErrorCode::EngineShutdown,
                "playback engine is shut down",
            )),
        }
    }

    pub async fn play(&self) -> Result<()> {
        self.request(Command::Play).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.request(Command::Pause).await
    }

    /// End the session. A no-op when nothing is loaded.
    pub async fn stop(&self) -> Result<()> {
        self.request(Command::Stop).await
    }

    pub async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.request(|reply| Command::SeekTo { position_ms, reply })
            .await
    }

    pub async fn seek_relative(&self, delta_ms: i64) -> Result<()> {
        self.request(|reply| Command::SeekRelative { delta_ms, reply })
            .await
    }

    /// Volume in `0..=100`; out-of-range values are clamped.
    pub async fn set_volume(&self, volume: i32) -> Result<()> {
        self.request(|reply| Command::SetVolume { volume, reply })
            .await
    }

    pub async fn set_brightness(&self, brightness: f32) -> Result<()> {
        self.request(|reply| Command::SetBrightness { brightness, reply })
            .await
    }

    pub async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.request(|reply| Command::SetPlaybackSpeed { speed, reply })
            .await
    }

    /// Select an audio stream by its server stream index.
    pub async fn select_audio_track(&self, index: i32) -> Result<()> {
        self.request(|reply| Command::SelectAudioTrack { index, reply })
            .await
    }

    /// Select a subtitle stream by its server stream index; `None` turns
    /// subtitles off.
    pub async fn select_subtitle_track(&self, index: Option<i32>) -> Result<()> {
        self.request(|reply| Command::SelectSubtitleTrack { index, reply })
            .await
    }

    /// Skip the segment whose affordance is showing. `false` when none is.
    pub async fn skip_segment(&self) -> Result<bool> {
        self.request(Command::SkipSegment).await
    }

    pub async fn seek_preview(&self, position_ms: u64) -> Result<Option<SeekPreview>> {
        self.request(|reply| Command::SeekPreview { position_ms, reply })
            .await
    }

    pub async fn queue_next(&self) -> Result<Option<MediaItem>> {
        self.request(Command::QueueNext).await
    }

    pub async fn queue_previous(&self) -> Result<Option<MediaItem>> {
        self.request(Command::QueuePrevious).await
    }

    pub async fn jump_to_item(&self, item_id: impl Into<String>) -> Result<Option<MediaItem>> {
        let item_id = item_id.into();
        self.request(|reply| Command::JumpToItem { item_id, reply })
            .await
    }

    pub async fn queue_snapshot(&self) -> Result<QueueSnapshot> {
        self.request(Command::QueueSnapshot).await
    }

    pub async fn report_playback_start(&self) -> Result<()> {
        self.request(Command::ReportStart).await
    }

    pub async fn report_playback_progress(&self) -> Result<()> {
        self.request(Command::ReportProgress).await
    }

    /// Returns whether a stop report was sent; `false` if this session
    /// already reported its stop.
    pub async fn report_playback_stop(&self) -> Result<bool> {
        self.request(Command::ReportStop).await
    }

    /// Latest transport snapshot.
    pub fn state(&self) -> TransportState {
        self.state.borrow().clone()
    }

    pub fn subscribe_state(&self) -> watch::Receiver<TransportState> {
        self.state.clone()
    }

    pub fn subscribe_events(&self) -> Receiver<core_runtime::events::CoreEvent> {
        self.events.subscribe()
    }

    pub fn event_stream(&self) -> EventStream {
        self.events.stream()
    }

    /// Tear down the session and stop the controller task.
    pub async fn shutdown(&self) -> Result<()> {
        self.request(Command::Shutdown).await
    }
}
