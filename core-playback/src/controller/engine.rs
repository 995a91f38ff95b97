//! Controller task.
//!
//! One task owns the transport state, the active backend and the play queue.
//! It multiplexes three inputs:
//!
//! - caller commands from [`PlaybackHandle`]s,
//! - backend events tagged with a session generation,
//! - results of session-scoped background work (segment ticks, trickplay
//!   and queue builds), also tagged with the generation.
//!
//! Anything tagged with an older generation belongs to a torn-down session
//! and is dropped.

use super::handle::{Command, LoadRequest, PlaybackHandle, SeekPreview};
use crate::backend::{
    BackendEvent, BackendEventSink, BackendFactory, DecoderBackend, HostBackendFactory, LoadSpec,
    SubtitleTrack, TaggedEvent,
};
use crate::config::EngineConfig;
use crate::error::{PlaybackError, PlaybackFailure, Result};
use crate::preferences::PlaybackPreferences;
use crate::queue::PlaylistManager;
use crate::reporter::{run_progress_loop, ProgressReporter};
use crate::segments::{SegmentMonitor, SkipChange};
use crate::state::TransportState;
use crate::tracks::{subtitle_mime_type, TrackMap};
use crate::trickplay::{self, TrickplayImages};
use bridge_traits::media::ms_to_ticks;
use bridge_traits::{
    MediaCatalog, MediaItem, MediaSource, SettingsStore, StreamHints, StreamKind, TrickplaySource,
};
use core_async::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use core_async::sync::{watch, CancellationToken};
use core_async::task::{self, JoinHandle};
use core_async::time::delayed_interval;
use core_runtime::config::{CoreConfig, FeatureFlags};
use core_runtime::events::{CoreEvent, EventBus, PlaybackEvent, QueueEvent, SkipEvent};
use std::sync::Arc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// Results of background work, routed back onto the controller task.
enum Internal {
    SegmentTick {
        generation: u64,
    },
    TrickplayBuilt {
        generation: u64,
        images: Option<TrickplayImages>,
    },
    QueueBuilt {
        generation: u64,
        queue: PlaylistManager,
    },
}

/// Everything tied to one loaded item.
struct Session {
    generation: u64,
    session_id: String,
    item: MediaItem,
    backend: Box<dyn DecoderBackend>,
    tracks: TrackMap,
    preferences: PlaybackPreferences,
    token: CancellationToken,
    progress: Option<JoinHandle<()>>,
    tasks: Vec<JoinHandle<()>>,
    trickplay: Option<TrickplayImages>,
    failed: bool,
}

/// Builder for the controller task.
pub struct PlaybackEngine {
    catalog: Arc<dyn MediaCatalog>,
    trickplay_source: Option<Arc<dyn TrickplaySource>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
    reporter: ProgressReporter,
    factory: Arc<dyn BackendFactory>,
    queue: PlaylistManager,
    config: EngineConfig,
    bus: EventBus,
}

impl PlaybackEngine {
    /// Validates `config` and captures the collaborators from `core`.
    pub fn new(core: &CoreConfig, config: EngineConfig, bus: EventBus) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            catalog: Arc::clone(&core.catalog),
            trickplay_source: core.trickplay_source.clone(),
            settings_store: core.settings_store.clone(),
            features: core.features,
            reporter: ProgressReporter::new(Arc::clone(&core.progress_sink)),
            factory: Arc::new(HostBackendFactory::from_config(core, &config)),
            queue: PlaylistManager::new(),
            config,
            bus,
        })
    }

    /// Start from an existing queue instead of an empty one.
    pub fn with_queue(mut self, queue: PlaylistManager) -> Self {
        self.queue = queue;
        self
    }

    /// Replace the factory built from the host decoder factories.
    pub fn with_backend_factory(mut self, factory: Arc<dyn BackendFactory>) -> Self {
        self.factory = factory;
        self
    }

    /// Spawn the controller task. Must be called inside a Tokio runtime.
    pub fn start(self) -> PlaybackHandle {
        let (command_tx, command_rx) = mpsc::channel(self.config.command_capacity);
        let (state_tx, state_rx) = watch::channel(TransportState::default());
        let (backend_tx, backend_rx) = mpsc::unbounded_channel();
        let (internal_tx, internal_rx) = mpsc::unbounded_channel();

        let handle = PlaybackHandle::new(command_tx, state_rx, self.bus.clone());
        let controller = Controller {
            catalog: self.catalog,
            trickplay_source: self.trickplay_source,
            settings_store: self.settings_store,
            features: self.features,
            reporter: self.reporter,
            factory: self.factory,
            queue: self.queue,
            monitor: SegmentMonitor::new(self.config.segment_end_epsilon_ms),
            config: self.config,
            bus: self.bus,
            state: TransportState::default(),
            state_tx,
            commands: command_rx,
            backend_tx,
            backend_rx,
            internal_tx,
            internal_rx,
            generation: 0,
            session: None,
        };

        task::spawn(controller.run());
        handle
    }

    /// `new(...)` followed by `start()`.
    pub fn spawn(core: &CoreConfig, config: EngineConfig, bus: EventBus) -> Result<PlaybackHandle> {
        Ok(Self::new(core, config, bus)?.start())
    }
}

struct Controller {
    catalog: Arc<dyn MediaCatalog>,
    trickplay_source: Option<Arc<dyn TrickplaySource>>,
    settings_store: Option<Arc<dyn SettingsStore>>,
    features: FeatureFlags,
    reporter: ProgressReporter,
    factory: Arc<dyn BackendFactory>,
    queue: PlaylistManager,
    monitor: SegmentMonitor,
    config: EngineConfig,
    bus: EventBus,
    state: TransportState,
    state_tx: watch::Sender<TransportState>,
    commands: mpsc::Receiver<Command>,
    backend_tx: UnboundedSender<TaggedEvent>,
    backend_rx: UnboundedReceiver<TaggedEvent>,
    internal_tx: UnboundedSender<Internal>,
    internal_rx: UnboundedReceiver<Internal>,
    generation: u64,
    session: Option<Session>,
}

impl Controller {
    async fn run(mut self) {
        info!("Playback controller started");

        loop {
            core_async::select! {
                command = self.commands.recv() => match command {
                    Some(command) => {
                        if !self.handle_command(command).await {
                            break;
                        }
                    }
                    None => {
                        debug!("All playback handles dropped");
                        self.end_session().await;
                        break;
                    }
                },
                Some(tagged) = self.backend_rx.recv() => self.handle_backend_event(tagged).await,
                Some(internal) = self.internal_rx.recv() => self.handle_internal(internal),
            }
            self.publish();
        }

        self.publish();
        info!("Playback controller stopped");
    }

    // ========================================================================
    // State plumbing
    // ========================================================================

    fn update(&mut self, reduce: impl FnOnce(TransportState) -> TransportState) {
        let current = std::mem::take(&mut self.state);
        self.state = reduce(current);
    }

    fn publish(&self) {
        let state = &self.state;
        self.state_tx.send_if_modified(|published| {
            if published == state {
                return false;
            }
            *published = state.clone();
            true
        });
    }

    fn emit(&self, event: CoreEvent) {
        self.bus.emit(event).ok();
    }

    fn current_item_id(&self) -> Option<String> {
        self.session.as_ref().map(|session| session.item.id.clone())
    }

    // ========================================================================
    // Commands
    // ========================================================================

    /// Returns `false` when the controller should exit.
    async fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Load { request, reply } => {
                let outcome = self.load(*request).await;
                reply.send(outcome).ok();
            }
            Command::Play(reply) => {
                self.set_paused(false).await;
                reply.send(()).ok();
            }
            Command::Pause(reply) => {
                self.set_paused(true).await;
                reply.send(()).ok();
            }
            Command::Stop(reply) => {
                self.stop().await;
                reply.send(()).ok();
            }
            Command::SeekTo { position_ms, reply } => {
                self.seek_to(position_ms).await;
                reply.send(()).ok();
            }
            Command::SeekRelative { delta_ms, reply } => {
                let target = (self.state.position_ms as i64).saturating_add(delta_ms).max(0);
                self.seek_to(target as u64).await;
                reply.send(()).ok();
            }
            Command::SetVolume { volume, reply } => {
                self.set_volume(volume).await;
                reply.send(()).ok();
            }
            Command::SetBrightness { brightness, reply } => {
                self.set_brightness(brightness).await;
                reply.send(()).ok();
            }
            Command::SetPlaybackSpeed { speed, reply } => {
                self.set_playback_speed(speed).await;
                reply.send(()).ok();
            }
            Command::SelectAudioTrack { index, reply } => {
                self.select_track(StreamKind::Audio, Some(index)).await;
                reply.send(()).ok();
            }
            Command::SelectSubtitleTrack { index, reply } => {
                self.select_track(StreamKind::Subtitle, index).await;
                reply.send(()).ok();
            }
            Command::SkipSegment(reply) => {
                let skipped = self.skip_segment().await;
                reply.send(skipped).ok();
            }
            Command::SeekPreview { position_ms, reply } => {
                reply.send(self.seek_preview(position_ms)).ok();
            }
            Command::QueueNext(reply) => {
                let item = self.queue.next().cloned();
                self.announce_queue_position(item.as_ref());
                reply.send(item).ok();
            }
            Command::QueuePrevious(reply) => {
                let item = self.queue.previous().cloned();
                self.announce_queue_position(item.as_ref());
                reply.send(item).ok();
            }
            Command::JumpToItem { item_id, reply } => {
                let item = self.queue.jump_to_item(&item_id).cloned();
                self.announce_queue_position(item.as_ref());
                reply.send(item).ok();
            }
            Command::QueueSnapshot(reply) => {
                reply.send(self.queue.snapshot()).ok();
            }
            Command::ReportStart(reply) => {
                self.reporter.report_start(&self.state).await;
                reply.send(()).ok();
            }
            Command::ReportProgress(reply) => {
                self.reporter.report_progress(&self.state).await;
                reply.send(()).ok();
            }
            Command::ReportStop(reply) => {
                self.halt_progress().await;
                let failed = self.session.as_ref().is_some_and(|s| s.failed);
                let sent = self.reporter.report_stop(&self.state, failed).await;
                reply.send(sent).ok();
            }
            Command::Shutdown(reply) => {
                self.end_session().await;
                reply.send(()).ok();
                return false;
            }
        }
        true
    }

    fn announce_queue_position(&self, item: Option<&MediaItem>) {
        if let (Some(item), Some(index)) = (item, self.queue.current_index()) {
            self.emit(CoreEvent::Queue(QueueEvent::CurrentChanged {
                item_id: item.id.clone(),
                index,
            }));
        }
    }

    #[instrument(skip(self, request), fields(item_id = %request.item.id))]
    async fn load(&mut self, request: LoadRequest) -> std::result::Result<(), PlaybackFailure> {
        self.generation += 1;
        let generation = self.generation;

        // Only one decoder may hold the device: the old one goes first.
        self.end_session().await;

        let item_id = request.item.id.clone();
        let requested_source = request.media_source_id.clone().unwrap_or_default();
        self.update(|state| state.loading(&item_id, &requested_source));
        self.publish();

        match self.start_session(request, generation).await {
            Ok(()) => Ok(()),
            Err(err) => {
                let failure = PlaybackFailure::from(&err);
                error!("Failed to load item: {}", err);
                self.update(|state| state.failed(failure.clone()));
                self.emit(CoreEvent::Playback(PlaybackEvent::Error {
                    item_id: Some(item_id),
                    code: failure.code.to_string(),
                    message: failure.message.clone(),
                    recoverable: failure.is_retryable(),
                }));
                Err(failure)
            }
        }
    }

    async fn start_session(&mut self, request: LoadRequest, generation: u64) -> Result<()> {
        let LoadRequest {
            item,
            media_source_id,
            audio_stream_index,
            subtitle_stream_index,
            start_position_ms,
            backend,
        } = request;

        let source = self.select_source(&item, media_source_id.as_deref()).await?;
        let source_id = source.id.clone();
        self.update(|state| TransportState {
            media_source_id: Some(source_id),
            ..state
        });

        let tracks = TrackMap::build(&source);
        let hints = StreamHints {
            audio_stream_index,
            subtitle_stream_index,
            start_position_ticks: ms_to_ticks(start_position_ms),
        };
        let url = match self
            .catalog
            .resolve_stream_url(&item.id, &source.id, &hints)
            .await
        {
            Ok(url) if !url.trim().is_empty() => url,
            Ok(_) => {
                return Err(PlaybackError::StreamUrlUnavailable {
                    item_id: item.id.clone(),
                    message: "catalog returned an empty URL".to_string(),
                })
            }
            Err(err) => {
                return Err(PlaybackError::StreamUrlUnavailable {
                    item_id: item.id.clone(),
                    message: err.to_string(),
                })
            }
        };

        let subtitles = source
            .external_subtitles()
            .filter_map(|stream| {
                Some(SubtitleTrack {
                    url: stream.delivery_url.clone()?,
                    language: stream.language.clone(),
                    title: stream.title.clone(),
                    mime_type: subtitle_mime_type(stream).map(str::to_string),
                })
            })
            .collect();

        let kind = backend.unwrap_or(self.config.preferred_backend);
        let sink = BackendEventSink::new(generation, self.backend_tx.clone());
        let backend = self.factory.create(kind, sink)?;

        let spec = LoadSpec {
            url,
            start_position_ms,
            subtitles,
        };
        if let Err(err) = backend.load(spec).await {
            backend.release().await;
            return Err(match err {
                PlaybackError::BackendInit(message) => PlaybackError::BackendInit(message),
                other => PlaybackError::BackendInit(other.to_string()),
            });
        }

        let session_id = Uuid::new_v4().to_string();
        self.update(|state| {
            state.started(
                &session_id,
                start_position_ms,
                audio_stream_index,
                subtitle_stream_index,
            )
        });
        self.apply_device_settings(backend.as_ref()).await;
        self.publish();

        let preferences = PlaybackPreferences::load(self.settings_store.as_deref()).await;
        self.reporter.reset();
        self.reporter.report_start(&self.state).await;

        let token = CancellationToken::new();
        let progress = task::spawn(run_progress_loop(
            self.reporter.sink(),
            self.state_tx.subscribe(),
            session_id.clone(),
            self.config.progress_interval,
            token.child_token(),
        ));
        let mut tasks = Vec::new();

        if self.features.enable_segment_skip {
            let segments = self.fetch_segments(&item.id).await;
            self.monitor.load(segments);
            if self.monitor.needs_polling() {
                tasks.push(self.spawn_segment_ticker(generation, token.child_token()));
            }
        }

        if self.features.enable_trickplay {
            if let Some(source) = &self.trickplay_source {
                tasks.push(self.spawn_trickplay_build(
                    Arc::clone(source),
                    item.id.clone(),
                    generation,
                ));
            }
        }

        self.sync_queue(&item, generation);

        info!(
            session_id = %session_id,
            "Started {} playback of {} at {} ms",
            backend.kind(),
            item.id,
            start_position_ms
        );
        self.emit(CoreEvent::Playback(PlaybackEvent::SessionStarted {
            item_id: item.id.clone(),
            session_id: session_id.clone(),
            media_source_id: source.id.clone(),
            backend: backend.kind().to_string(),
        }));

        self.session = Some(Session {
            generation,
            session_id,
            item,
            backend,
            tracks,
            preferences,
            token,
            progress: Some(progress),
            tasks,
            trickplay: None,
            failed: false,
        });
        Ok(())
    }

    async fn select_source(
        &self,
        item: &MediaItem,
        media_source_id: Option<&str>,
    ) -> Result<MediaSource> {
        let sources = if item.media_sources.is_empty() {
            self.catalog
                .get_media_sources(&item.id)
                .await
                .map_err(|err| PlaybackError::StreamUrlUnavailable {
                    item_id: item.id.clone(),
                    message: format!("media sources unavailable: {}", err),
                })?
        } else {
            item.media_sources.clone()
        };

        let found = match media_source_id {
            Some(id) => sources.into_iter().find(|source| source.id == id),
            None => sources.into_iter().find(MediaSource::is_playable),
        };

        found
            .filter(MediaSource::is_playable)
            .ok_or_else(|| PlaybackError::NoCompatibleSource {
                item_id: item.id.clone(),
                media_source_id: media_source_id.unwrap_or("<any>").to_string(),
            })
    }

    async fn fetch_segments(&self, item_id: &str) -> Vec<bridge_traits::MediaSegment> {
        match self.catalog.get_segments(item_id).await {
            Ok(segments) => segments,
            Err(err) => {
                warn!("Failed to fetch segments for {}: {}", item_id, err);
                Vec::new()
            }
        }
    }

    /// Carry volume, brightness and speed over to a fresh backend.
    async fn apply_device_settings(&self, backend: &dyn DecoderBackend) {
        let defaults = TransportState::default();
        let mut outcomes = Vec::new();
        if self.state.volume != defaults.volume {
            outcomes.push(backend.set_volume(self.state.volume).await);
        }
        if self.state.brightness != defaults.brightness {
            outcomes.push(backend.set_brightness(self.state.brightness).await);
        }
        if self.state.playback_speed != defaults.playback_speed {
            outcomes.push(backend.set_playback_speed(self.state.playback_speed).await);
        }
        for err in outcomes.into_iter().filter_map(|outcome| outcome.err()) {
            warn!("Failed to carry device setting to new backend: {}", err);
        }
    }

    fn spawn_segment_ticker(&self, generation: u64, token: CancellationToken) -> JoinHandle<()> {
        let internal = self.internal_tx.clone();
        let mut ticker = delayed_interval(
            self.config.segment_grace_delay,
            self.config.segment_poll_interval,
        );
        task::spawn(async move {
            loop {
                core_async::select! {
                    _ = token.cancelled() => break,
                    _ = ticker.tick() => {}
                }
                if internal.send(Internal::SegmentTick { generation }).is_err() {
                    break;
                }
            }
        })
    }

    fn spawn_trickplay_build(
        &self,
        source: Arc<dyn TrickplaySource>,
        item_id: String,
        generation: u64,
    ) -> JoinHandle<()> {
        let internal = self.internal_tx.clone();
        task::spawn(async move {
            let images = trickplay::load(source.as_ref(), &item_id).await;
            internal
                .send(Internal::TrickplayBuilt { generation, images })
                .ok();
        })
    }

    /// Keep the queue when the item belongs to it, otherwise rebuild it in
    /// the background around the item.
    fn sync_queue(&mut self, item: &MediaItem, generation: u64) {
        let same_series = match item.series() {
            Some(series_id) => self.queue.series_id() == Some(series_id),
            None => self.queue.series_id().is_none(),
        };
        if same_series && self.queue.contains(&item.id) {
            let item = self.queue.jump_to_item(&item.id).cloned();
            self.announce_queue_position(item.as_ref());
            return;
        }

        let catalog = Arc::clone(&self.catalog);
        let internal = self.internal_tx.clone();
        let item = item.clone();
        // Not tied to the session token: a queue outlives pause/fault, and a
        // stale result is dropped by generation.
        task::spawn(async move {
            let queue = PlaylistManager::build(catalog.as_ref(), &item).await;
            internal.send(Internal::QueueBuilt { generation, queue }).ok();
        });
    }

    async fn set_paused(&mut self, paused: bool) {
        let Some(session) = &self.session else {
            return;
        };
        let outcome = if paused {
            session.backend.pause().await
        } else {
            session.backend.play().await
        };
        match outcome {
            Ok(()) => self.fold_paused(paused),
            Err(err) => warn!("Backend rejected {}: {}", if paused { "pause" } else { "play" }, err),
        }
    }

    /// Apply a pause flag and announce the transition.
    fn fold_paused(&mut self, paused: bool) {
        let was_paused = self.state.is_paused;
        self.update(|state| state.paused(paused));
        if was_paused == paused {
            return;
        }
        if let Some(item_id) = self.current_item_id() {
            let position_ms = self.state.position_ms;
            let event = if paused {
                PlaybackEvent::Paused {
                    item_id,
                    position_ms,
                }
            } else {
                PlaybackEvent::Resumed {
                    item_id,
                    position_ms,
                }
            };
            self.emit(CoreEvent::Playback(event));
        }
    }

    async fn seek_to(&mut self, position_ms: u64) {
        let Some(session) = &self.session else {
            return;
        };
        let target = if self.state.duration_ms > 0 {
            position_ms.min(self.state.duration_ms)
        } else {
            position_ms
        };
        match session.backend.seek_to(target).await {
            Ok(()) => self.update(|state| state.position(target)),
            Err(err) => warn!("Backend rejected seek to {} ms: {}", target, err),
        }
    }

    async fn set_volume(&mut self, volume: i32) {
        let Some(session) = &self.session else {
            return;
        };
        let volume = crate::state::clamp_volume(volume);
        match session.backend.set_volume(volume).await {
            Ok(()) => self.update(|state| state.volume(i32::from(volume))),
            Err(err) => warn!("Backend rejected volume {}: {}", volume, err),
        }
    }

    async fn set_brightness(&mut self, brightness: f32) {
        let Some(session) = &self.session else {
            return;
        };
        let brightness = crate::state::clamp_brightness(brightness);
        match session.backend.set_brightness(brightness).await {
            Ok(()) => self.update(|state| state.brightness(brightness)),
            Err(err) => warn!("Backend rejected brightness {}: {}", brightness, err),
        }
    }

    async fn set_playback_speed(&mut self, speed: f32) {
        let Some(session) = &self.session else {
            return;
        };
        let speed = crate::state::clamp_speed(speed);
        match session.backend.set_playback_speed(speed).await {
            Ok(()) => self.update(|state| state.speed(speed)),
            Err(err) => warn!("Backend rejected speed {}: {}", speed, err),
        }
    }

    /// Record the selection and, once the media is ready, forward it.
    ///
    /// While loading the index is only recorded; the ready handler applies
    /// it.
    async fn select_track(&mut self, kind: StreamKind, index: Option<i32>) {
        let Some(session) = &self.session else {
            return;
        };

        let position = match index {
            Some(index) => match session.tracks.position(kind, index) {
                Some(position) => Some(position),
                None => {
                    warn!("Stream index {} is not a known {:?} track", index, kind);
                    return;
                }
            },
            None => None,
        };

        if !self.state.is_loading {
            if let Err(err) = session.backend.select_track(kind, position).await {
                warn!("Backend rejected {:?} track {:?}: {}", kind, index, err);
                return;
            }
        }

        match kind {
            StreamKind::Audio => self.update(|state| state.audio_track(index)),
            _ => self.update(|state| state.subtitle_track(index)),
        }
    }

    /// Re-send the last requested tracks once the backend is ready.
    async fn reapply_tracks(&self) {
        let Some(session) = &self.session else {
            return;
        };
        let selections = [
            (StreamKind::Audio, self.state.audio_stream_index),
            (StreamKind::Subtitle, self.state.subtitle_stream_index),
        ];
        for (kind, index) in selections {
            let position = match index {
                Some(index) => session.tracks.position(kind, index),
                // Leave the backend's default audio alone.
                None if kind == StreamKind::Audio => continue,
                None => None,
            };
            if index.is_some() && position.is_none() {
                continue;
            }
            if let Err(err) = session.backend.select_track(kind, position).await {
                warn!("Failed to re-apply {:?} track {:?}: {}", kind, index, err);
            }
        }
    }

    /// Seek past the active segment. The affordance stays up when the
    /// backend rejects the seek, so the skip can be retried.
    async fn skip_segment(&mut self) -> bool {
        let Some(session) = &self.session else {
            return false;
        };
        let Some(segment) = self.monitor.active() else {
            return false;
        };

        let target_ms = segment.end_ms();
        if let Err(err) = session.backend.seek_to(target_ms).await {
            warn!("Failed to seek past {} segment: {}", segment.segment_type.as_str(), err);
            return false;
        }
        let item_id = session.item.id.clone();
        self.monitor.skip();
        self.update(|state| state.position(target_ms));
        self.emit(CoreEvent::Skip(SkipEvent::Skipped {
            item_id,
            segment_type: segment.segment_type,
            target_ms,
        }));
        true
    }

    fn seek_preview(&self, position_ms: u64) -> Option<SeekPreview> {
        let session = self.session.as_ref()?;
        let images = session.trickplay.as_ref()?;
        let thumbnail_index = images.index_for_position(position_ms)?;
        let image = images.thumbnail_for_position(position_ms)?;

        self.emit(CoreEvent::Playback(PlaybackEvent::SeekPreview {
            item_id: session.item.id.clone(),
            position_ms,
            thumbnail_index,
        }));
        Some(SeekPreview {
            position_ms,
            thumbnail_index,
            image,
        })
    }

    // ========================================================================
    // Session teardown
    // ========================================================================

    /// Join the progress loop so no progress report can follow a stop report.
    async fn halt_progress(&mut self) {
        let Some(handle) = self
            .session
            .as_mut()
            .and_then(|session| session.progress.take())
        else {
            return;
        };
        if let Err(err) = task::abort_and_join(handle).await {
            warn!("Progress loop panicked: {}", err);
        }
    }

    /// Explicit stop. A no-op without a session.
    async fn stop(&mut self) {
        if self.session.is_none() {
            debug!("Stop requested with nothing loaded");
            return;
        }
        self.end_session().await;
    }

    /// Cancel the loops, send the final stop report, release the backend and
    /// return the transport state to rest.
    async fn end_session(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        session.token.cancel();
        let progress = session.progress.take();
        for handle in session.tasks.drain(..).chain(progress) {
            if let Err(err) = task::abort_and_join(handle).await {
                warn!("Session task panicked: {}", err);
            }
        }
        if let Some(segment) = self.monitor.active() {
            debug!("Hiding {} affordance at session end", segment.segment_type.as_str());
            self.emit(CoreEvent::Skip(SkipEvent::Hidden {
                item_id: session.item.id.clone(),
            }));
        }
        self.monitor.clear();

        // Loops are gone: nothing can report after this.
        self.reporter.report_stop(&self.state, session.failed).await;

        if let Err(err) = session.backend.stop().await {
            debug!("Backend stop during teardown failed: {}", err);
        }
        session.backend.release().await;

        info!(
            session_id = %session.session_id,
            position_ms = self.state.position_ms,
            "Ended playback of {}",
            session.item.id
        );
        self.emit(CoreEvent::Playback(PlaybackEvent::Stopped {
            item_id: session.item.id.clone(),
            session_id: session.session_id.clone(),
            position_ms: self.state.position_ms,
        }));
        self.update(TransportState::rest);
    }

    // ========================================================================
    // Backend events
    // ========================================================================

    async fn handle_backend_event(&mut self, tagged: TaggedEvent) {
        let current = self
            .session
            .as_ref()
            .filter(|session| session.generation == tagged.generation);
        let Some(session) = current else {
            debug!(
                generation = tagged.generation,
                "Dropping backend event from a previous session: {:?}", tagged.event
            );
            return;
        };
        if session.failed {
            return;
        }

        match tagged.event {
            BackendEvent::Ready { duration_ms } => {
                let fallback = session.item.duration_ms();
                self.update(|state| state.ready(duration_ms.or(fallback)));
                self.reapply_tracks().await;
            }
            BackendEvent::Buffering(buffering) => self.update(|state| state.buffering(buffering)),
            BackendEvent::Paused(paused) => self.fold_paused(paused),
            BackendEvent::Idle(idle) => self.update(|state| state.idle(idle)),
            BackendEvent::Position(position_ms) => self.update(|state| state.position(position_ms)),
            BackendEvent::Duration(duration_ms) => self.update(|state| state.duration(duration_ms)),
            BackendEvent::Ended => self.handle_ended().await,
            BackendEvent::Fault(message) => self.handle_fault(message).await,
        }
    }

    fn is_natural_end(&self) -> bool {
        let duration = self.state.duration_ms;
        duration > 0
            && self
                .state
                .position_ms
                .saturating_add(self.config.natural_end_tolerance_ms)
                >= duration
    }

    async fn handle_ended(&mut self) {
        let natural = self.is_natural_end();
        let Some(session) = &self.session else {
            return;
        };
        let item_id = session.item.id.clone();
        let autoplay = session.preferences.autoplay_next;

        self.end_session().await;
        if !natural {
            debug!("Media ended short of its duration; treating as stop");
            return;
        }

        if autoplay && self.queue.has_next() {
            if let (Some(next), Some(index)) = (self.queue.next().cloned(), self.queue.current_index())
            {
                info!("Autoplay hands off from {} to {}", item_id, next.id);
                self.emit(CoreEvent::Queue(QueueEvent::NextItemReady {
                    item_id: next.id,
                    index,
                }));
                return;
            }
        }
        self.emit(CoreEvent::Playback(PlaybackEvent::Completed { item_id }));
    }

    /// Halt in place. The session, backend and queue stay so the caller can
    /// retry; the stop report is sent when the session ends.
    async fn handle_fault(&mut self, message: String) {
        let Some(session) = self.session.as_mut() else {
            return;
        };
        session.failed = true;
        session.token.cancel();
        let progress = session.progress.take();
        let tasks: Vec<_> = session.tasks.drain(..).chain(progress).collect();
        let item_id = session.item.id.clone();

        for handle in tasks {
            if let Err(err) = task::abort_and_join(handle).await {
                warn!("Session task panicked: {}", err);
            }
        }
        if self.monitor.active().is_some() {
            self.emit(CoreEvent::Skip(SkipEvent::Hidden {
                item_id: item_id.clone(),
            }));
        }
        self.monitor.clear();

        let failure = PlaybackFailure::from(PlaybackError::Fault(message));
        error!("Playback fault on {}: {}", item_id, failure.message);
        self.update(|state| state.failed(failure.clone()));
        self.emit(CoreEvent::Playback(PlaybackEvent::Error {
            item_id: Some(item_id),
            code: failure.code.to_string(),
            message: failure.message,
            recoverable: true,
        }));
    }

    // ========================================================================
    // Background results
    // ========================================================================

    fn handle_internal(&mut self, internal: Internal) {
        match internal {
            Internal::SegmentTick { generation } => self.on_segment_tick(generation),
            Internal::TrickplayBuilt { generation, images } => {
                let Some(session) = self
                    .session
                    .as_mut()
                    .filter(|session| session.generation == generation)
                else {
                    return;
                };
                let Some(images) = images.filter(|images| !images.is_empty()) else {
                    return;
                };
                let item_id = session.item.id.clone();
                let thumbnail_count = images.len();
                session.trickplay = Some(images);
                self.emit(CoreEvent::Playback(PlaybackEvent::TrickplayReady {
                    item_id,
                    thumbnail_count,
                }));
            }
            Internal::QueueBuilt { generation, queue } => {
                if generation != self.generation {
                    debug!("Dropping queue built for a previous load");
                    return;
                }
                self.queue = queue;
                self.emit(CoreEvent::Queue(QueueEvent::Built {
                    size: self.queue.len(),
                    current_index: self.queue.current_index().unwrap_or(0),
                    series_id: self.queue.series_id().map(str::to_string),
                }));
            }
        }
    }

    fn on_segment_tick(&mut self, generation: u64) {
        let Some(session) = self
            .session
            .as_ref()
            .filter(|session| session.generation == generation && !session.failed)
        else {
            return;
        };
        if self.state.is_loading {
            return;
        }

        let item_id = session.item.id.clone();
        let preferences = session.preferences;
        let event = match self.monitor.evaluate(self.state.position_ms, &preferences) {
            Some(SkipChange::Shown(segment)) => SkipEvent::Shown {
                item_id,
                segment_type: segment.segment_type,
                start_ms: segment.start_ms(),
                end_ms: segment.end_ms(),
            },
            Some(SkipChange::Hidden(_)) => SkipEvent::Hidden { item_id },
            None => return,
        };
        self.emit(CoreEvent::Skip(event));
    }
}
