//! Managed-pipeline backend.
//!
//! The host pipeline renders video and external subtitles itself. It reports
//! coarse state transitions but never pushes position, so a poller samples
//! `current_position_ms` while media is ready.

use super::{
    command_error, init_error, BackendEvent, BackendEventSink, DecoderBackend, LoadSpec,
};
use crate::config::BackendKind;
use crate::error::Result;
use async_trait::async_trait;
use bridge_traits::{
    ManagedPipeline, ManagedPipelineFactory, PipelineEvent, PipelineMediaItem, PipelineState,
    StreamKind, SubtitleConfiguration,
};
use core_async::sync::mpsc::{self, UnboundedReceiver};
use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use core_async::time::{interval, MissedTickBehavior};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

pub struct ManagedBackend {
    pipeline: Arc<dyn ManagedPipeline>,
    events: BackendEventSink,
    flags: Arc<PipelineFlags>,
    poll_interval: Duration,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

#[derive(Default)]
struct PipelineFlags {
    play_when_ready: AtomicBool,
    ready: AtomicBool,
}

impl ManagedBackend {
    pub fn new(
        factory: &dyn ManagedPipelineFactory,
        events: BackendEventSink,
        poll_interval: Duration,
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let pipeline = factory.create(tx).map_err(init_error)?;
        let flags = Arc::new(PipelineFlags::default());
        let cancel = CancellationToken::new();

        let pump = task::spawn(pump_events(
            rx,
            Arc::clone(&pipeline),
            events.clone(),
            Arc::clone(&flags),
            cancel.child_token(),
        ));

        debug!(generation = events.generation(), "Managed pipeline created");

        Ok(Self {
            pipeline,
            events,
            flags,
            poll_interval,
            cancel,
            pump: Mutex::new(Some(pump)),
            poller: Mutex::new(None),
            released: AtomicBool::new(false),
        })
    }

    fn start_poller(&self) {
        let handle = task::spawn(poll_position(
            Arc::clone(&self.pipeline),
            self.events.clone(),
            Arc::clone(&self.flags),
            self.poll_interval,
            self.cancel.child_token(),
        ));
        if let Some(previous) = self.poller.lock().replace(handle) {
            previous.abort();
        }
    }

    fn stop_poller(&self) {
        if let Some(poller) = self.poller.lock().take() {
            poller.abort();
        }
    }
}

async fn pump_events(
    mut rx: UnboundedReceiver<PipelineEvent>,
    pipeline: Arc<dyn ManagedPipeline>,
    events: BackendEventSink,
    flags: Arc<PipelineFlags>,
    cancel: CancellationToken,
) {
    loop {
        let event = core_async::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else { break };

        let translated = match event {
            PipelineEvent::StateChanged(PipelineState::Buffering) => {
                Some(BackendEvent::Buffering(true))
            }
            PipelineEvent::StateChanged(PipelineState::Ready) => {
                if flags.ready.swap(true, Ordering::SeqCst) {
                    Some(BackendEvent::Buffering(false))
                } else {
                    Some(BackendEvent::Ready {
                        duration_ms: pipeline.duration_ms(),
                    })
                }
            }
            PipelineEvent::StateChanged(PipelineState::Ended) => Some(BackendEvent::Ended),
            PipelineEvent::StateChanged(PipelineState::Idle) => flags
                .ready
                .load(Ordering::SeqCst)
                .then_some(BackendEvent::Idle(true)),
            PipelineEvent::IsPlayingChanged(true) => Some(BackendEvent::Paused(false)),
            // Not playing while still wanting to play is buffering or end of
            // media; both arrive as state changes of their own.
            PipelineEvent::IsPlayingChanged(false) => (!flags
                .play_when_ready
                .load(Ordering::SeqCst))
            .then_some(BackendEvent::Paused(true)),
            PipelineEvent::PositionDiscontinuity { position_ms } => {
                Some(BackendEvent::Position(position_ms))
            }
            PipelineEvent::Error { message } => Some(BackendEvent::Fault(message)),
        };

        if let Some(event) = translated {
            if !events.send(event) {
                break;
            }
        }
    }
    debug!(generation = events.generation(), "Managed pipeline event pump exited");
}

async fn poll_position(
    pipeline: Arc<dyn ManagedPipeline>,
    events: BackendEventSink,
    flags: Arc<PipelineFlags>,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut last_duration = None;

    loop {
        core_async::select! {
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !flags.ready.load(Ordering::SeqCst) {
            continue;
        }

        let duration = pipeline.duration_ms();
        if duration.is_some() && duration != last_duration {
            last_duration = duration;
            if let Some(duration_ms) = duration {
                events.send(BackendEvent::Duration(duration_ms));
            }
        }

        if !events.send(BackendEvent::Position(pipeline.current_position_ms())) {
            break;
        }
    }
}

#[async_trait]
impl DecoderBackend for ManagedBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Managed
    }

    async fn load(&self, spec: LoadSpec) -> Result<()> {
        let subtitles = spec
            .subtitles
            .into_iter()
            .map(|subtitle| SubtitleConfiguration {
                url: subtitle.url,
                mime_type: subtitle.mime_type,
                language: subtitle.language,
                label: subtitle.title,
            })
            .collect();

        self.flags.ready.store(false, Ordering::SeqCst);
        self.pipeline
            .set_media_item(PipelineMediaItem {
                url: spec.url,
                start_position_ms: spec.start_position_ms,
                subtitles,
            })
            .await
            .map_err(init_error)?;
        self.pipeline.prepare().await.map_err(init_error)?;

        self.flags.play_when_ready.store(true, Ordering::SeqCst);
        self.pipeline
            .set_play_when_ready(true)
            .await
            .map_err(init_error)?;

        self.start_poller();
        Ok(())
    }

    async fn play(&self) -> Result<()> {
        self.flags.play_when_ready.store(true, Ordering::SeqCst);
        self.pipeline
            .set_play_when_ready(true)
            .await
            .map_err(command_error)
    }

    async fn pause(&self) -> Result<()> {
        self.flags.play_when_ready.store(false, Ordering::SeqCst);
        self.pipeline
            .set_play_when_ready(false)
            .await
            .map_err(command_error)
    }

    async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.pipeline.seek_to(position_ms).await.map_err(command_error)
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.pipeline
            .set_volume(f32::from(volume) / 100.0)
            .await
            .map_err(command_error)
    }

    async fn set_brightness(&self, brightness: f32) -> Result<()> {
        self.pipeline
            .set_screen_brightness(brightness)
            .await
            .map_err(command_error)
    }

    async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.pipeline
            .set_playback_speed(speed)
            .await
            .map_err(command_error)
    }

    async fn select_track(&self, kind: StreamKind, position: Option<usize>) -> Result<()> {
        // Text groups are embedded tracks followed by the configured
        // subtitles, which is the order positions were assigned in.
        self.pipeline
            .select_track(kind, position)
            .await
            .map_err(command_error)
    }

    async fn stop(&self) -> Result<()> {
        self.flags.play_when_ready.store(false, Ordering::SeqCst);
        self.stop_poller();
        self.pipeline.stop().await.map_err(command_error)
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        let pump = self.pump.lock().take();
        let poller = self.poller.lock().take();
        for handle in [pump, poller].into_iter().flatten() {
            if let Err(err) = task::abort_and_join(handle).await {
                warn!("Managed pipeline task panicked: {}", err);
            }
        }

        if let Err(err) = self.pipeline.release().await {
            warn!("Managed pipeline release failed: {}", err);
        }
        debug!(generation = self.events.generation(), "Managed pipeline released");
    }
}

impl Drop for ManagedBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{SubtitleTrack, TaggedEvent};
    use bridge_traits::error::Result as BridgeResult;
    use bridge_traits::BridgeError;
    use core_async::sync::mpsc::UnboundedSender;
    use std::sync::atomic::AtomicU64;

    #[derive(Default)]
    struct FakePipeline {
        calls: Mutex<Vec<String>>,
        items: Mutex<Vec<PipelineMediaItem>>,
        position_ms: AtomicU64,
        releases: AtomicU64,
    }

    impl FakePipeline {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().push(call.into());
        }
    }

    #[async_trait]
    impl ManagedPipeline for FakePipeline {
        async fn set_media_item(&self, item: PipelineMediaItem) -> BridgeResult<()> {
            self.items.lock().push(item);
            self.record("set_media_item");
            Ok(())
        }
        async fn prepare(&self) -> BridgeResult<()> {
            self.record("prepare");
            Ok(())
        }
        async fn set_play_when_ready(&self, play: bool) -> BridgeResult<()> {
            self.record(format!("play_when_ready:{play}"));
            Ok(())
        }
        async fn seek_to(&self, position_ms: u64) -> BridgeResult<()> {
            self.record(format!("seek:{position_ms}"));
            Ok(())
        }
        async fn set_volume(&self, volume: f32) -> BridgeResult<()> {
            self.record(format!("volume:{volume}"));
            Ok(())
        }
        async fn set_playback_speed(&self, speed: f32) -> BridgeResult<()> {
            self.record(format!("speed:{speed}"));
            Ok(())
        }
        async fn set_screen_brightness(&self, brightness: f32) -> BridgeResult<()> {
            self.record(format!("brightness:{brightness}"));
            Ok(())
        }
        async fn select_track(&self, kind: StreamKind, ordinal: Option<usize>) -> BridgeResult<()> {
            self.record(format!("track:{kind:?}:{ordinal:?}"));
            Ok(())
        }
        fn current_position_ms(&self) -> u64 {
            self.position_ms.load(Ordering::SeqCst)
        }
        fn duration_ms(&self) -> Option<u64> {
            Some(120_000)
        }
        async fn stop(&self) -> BridgeResult<()> {
            self.record("stop");
            Ok(())
        }
        async fn release(&self) -> BridgeResult<()> {
            self.releases.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeFactory {
        pipeline: Arc<FakePipeline>,
        host_tx: Mutex<Option<UnboundedSender<PipelineEvent>>>,
        fail: bool,
    }

    impl FakeFactory {
        fn new() -> Self {
            Self {
                pipeline: Arc::new(FakePipeline::default()),
                host_tx: Mutex::new(None),
                fail: false,
            }
        }

        fn host(&self) -> UnboundedSender<PipelineEvent> {
            self.host_tx.lock().clone().unwrap()
        }
    }

    impl ManagedPipelineFactory for FakeFactory {
        fn create(
            &self,
            events: UnboundedSender<PipelineEvent>,
        ) -> BridgeResult<Arc<dyn ManagedPipeline>> {
            if self.fail {
                return Err(BridgeError::NotAvailable("surface in use".into()));
            }
            *self.host_tx.lock() = Some(events);
            Ok(self.pipeline.clone())
        }
    }

    fn backend(
        factory: &FakeFactory,
    ) -> (ManagedBackend, mpsc::UnboundedReceiver<TaggedEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let backend = ManagedBackend::new(
            factory,
            BackendEventSink::new(7, tx),
            Duration::from_millis(500),
        )
        .unwrap();
        (backend, rx)
    }

    fn spec() -> LoadSpec {
        LoadSpec {
            url: "https://srv/Videos/ep1/stream?static=true".into(),
            start_position_ms: 12_000,
            subtitles: vec![SubtitleTrack {
                url: "https://srv/sub/3.srt".into(),
                language: Some("eng".into()),
                title: Some("English".into()),
                mime_type: Some("application/x-subrip".into()),
            }],
        }
    }

    #[tokio::test]
    async fn load_hands_subtitles_to_the_pipeline() {
        let factory = FakeFactory::new();
        let (backend, _rx) = backend(&factory);

        backend.load(spec()).await.unwrap();

        let items = factory.pipeline.items.lock().clone();
        assert_eq!(items[0].start_position_ms, 12_000);
        assert_eq!(items[0].subtitles[0].label.as_deref(), Some("English"));
        assert_eq!(
            *factory.pipeline.calls.lock(),
            vec!["set_media_item", "prepare", "play_when_ready:true"]
        );
        backend.release().await;
    }

    #[tokio::test]
    async fn first_ready_is_ready_to_play_then_buffering_toggles() {
        let factory = FakeFactory::new();
        let (backend, mut rx) = backend(&factory);
        backend.load(spec()).await.unwrap();

        let host = factory.host();
        host.send(PipelineEvent::StateChanged(PipelineState::Buffering)).unwrap();
        host.send(PipelineEvent::StateChanged(PipelineState::Ready)).unwrap();
        host.send(PipelineEvent::StateChanged(PipelineState::Buffering)).unwrap();
        host.send(PipelineEvent::StateChanged(PipelineState::Ready)).unwrap();
        host.send(PipelineEvent::StateChanged(PipelineState::Ended)).unwrap();

        let mut seen = Vec::new();
        while seen.len() < 5 {
            let tagged = rx.recv().await.unwrap();
            assert_eq!(tagged.generation, 7);
            if !matches!(
                tagged.event,
                BackendEvent::Position(_) | BackendEvent::Duration(_)
            ) {
                seen.push(tagged.event);
            }
        }
        assert_eq!(
            seen,
            vec![
                BackendEvent::Buffering(true),
                BackendEvent::Ready {
                    duration_ms: Some(120_000)
                },
                BackendEvent::Buffering(true),
                BackendEvent::Buffering(false),
                BackendEvent::Ended,
            ]
        );
        backend.release().await;
    }

    #[tokio::test]
    async fn not_playing_counts_as_pause_only_when_paused_by_us() {
        let factory = FakeFactory::new();
        let (backend, mut rx) = backend(&factory);
        backend.load(spec()).await.unwrap();
        let host = factory.host();

        // Still wants to play: a stall, not a pause.
        host.send(PipelineEvent::IsPlayingChanged(false)).unwrap();
        backend.pause().await.unwrap();
        host.send(PipelineEvent::IsPlayingChanged(false)).unwrap();

        let tagged = rx.recv().await.unwrap();
        assert_eq!(tagged.event, BackendEvent::Paused(true));
        backend.release().await;
    }

    #[tokio::test(start_paused = true)]
    async fn position_is_polled_once_ready() {
        let factory = FakeFactory::new();
        let (backend, mut rx) = backend(&factory);
        backend.load(spec()).await.unwrap();

        factory.pipeline.position_ms.store(42_000, Ordering::SeqCst);
        factory
            .host()
            .send(PipelineEvent::StateChanged(PipelineState::Ready))
            .unwrap();

        let mut position = None;
        while position.is_none() {
            if let BackendEvent::Position(ms) = rx.recv().await.unwrap().event {
                position = Some(ms);
            }
        }
        assert_eq!(position, Some(42_000));
        backend.release().await;
    }

    #[tokio::test]
    async fn volume_is_scaled_for_the_pipeline() {
        let factory = FakeFactory::new();
        let (backend, _rx) = backend(&factory);
        backend.set_volume(50).await.unwrap();
        backend.select_track(StreamKind::Subtitle, None).await.unwrap();
        assert_eq!(
            *factory.pipeline.calls.lock(),
            vec!["volume:0.5", "track:Subtitle:None"]
        );
        backend.release().await;
    }

    #[tokio::test]
    async fn release_is_idempotent() {
        let factory = FakeFactory::new();
        let (backend, _rx) = backend(&factory);
        backend.release().await;
        backend.release().await;
        assert_eq!(factory.pipeline.releases.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn factory_failure_is_an_init_error() {
        let mut factory = FakeFactory::new();
        factory.fail = true;
        let (tx, _rx) = mpsc::unbounded_channel();
        let result = ManagedBackend::new(&factory, BackendEventSink::new(1, tx), Duration::from_millis(500));
        assert!(matches!(
            result,
            Err(crate::error::PlaybackError::BackendInit(_))
        ));
    }
}
