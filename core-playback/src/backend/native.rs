//! Native-library backend.
//!
//! Drives a property/command player. Decode hints go in as options before
//! the handle is initialised; external subtitles are attached with `sub-add`
//! once the file has loaded, and only then is the track list read back to
//! resolve positions into library track ids.

use super::{
    command_error, init_error, BackendEvent, BackendEventSink, DecoderBackend, LoadSpec,
    SubtitleTrack,
};
use crate::config::BackendKind;
use crate::error::{PlaybackError, Result};
use async_trait::async_trait;
use bridge_traits::{
    EndFileReason, NativeEvent, NativePlayer, NativePlayerFactory, NativeTrack, NativeValue,
    StreamKind,
};
use core_async::sync::mpsc::{self, UnboundedReceiver};
use core_async::sync::CancellationToken;
use core_async::task::{self, JoinHandle};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

const OBSERVED_PROPERTIES: [&str; 6] = [
    "time-pos",
    "duration",
    "pause",
    "paused-for-cache",
    "seeking",
    "idle-active",
];

pub struct NativeBackend {
    player: Arc<dyn NativePlayer>,
    shared: Arc<Shared>,
    cancel: CancellationToken,
    pump: Mutex<Option<JoinHandle<()>>>,
    released: AtomicBool,
}

#[derive(Default)]
struct Shared {
    tracks: Mutex<Vec<NativeTrack>>,
    pending_subtitles: Mutex<Vec<SubtitleTrack>>,
}

impl NativeBackend {
    pub fn new(
        factory: &dyn NativePlayerFactory,
        events: BackendEventSink,
        hardware_codecs: &[String],
    ) -> Result<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        let player = factory.create(tx).map_err(init_error)?;

        if let Err(err) = configure(player.as_ref(), hardware_codecs) {
            player.destroy();
            return Err(init_error(err));
        }

        let shared = Arc::new(Shared::default());
        let cancel = CancellationToken::new();
        let pump = task::spawn(pump_events(
            rx,
            Arc::clone(&player),
            Arc::clone(&shared),
            events.clone(),
            cancel.child_token(),
        ));

        debug!(
            generation = events.generation(),
            "Native player initialised with {} hardware codecs",
            hardware_codecs.len()
        );

        Ok(Self {
            player,
            shared,
            cancel,
            pump: Mutex::new(Some(pump)),
            released: AtomicBool::new(false),
        })
    }

    fn set_property(&self, name: &str, value: NativeValue) -> Result<()> {
        self.player.set_property(name, value).map_err(command_error)
    }

    fn command(&self, args: &[&str]) -> Result<()> {
        self.player.command(args).map_err(command_error)
    }

    /// Library track id for the `position`-th track of `kind`.
    ///
    /// Embedded tracks come first, then externally added ones, each in the
    /// order the library lists them.
    fn track_id(&self, kind: StreamKind, position: usize) -> Option<i64> {
        let tracks = self.shared.tracks.lock();
        let mut of_kind: Vec<&NativeTrack> =
            tracks.iter().filter(|track| track.kind == kind).collect();
        of_kind.sort_by_key(|track| track.external);
        of_kind.get(position).map(|track| track.id)
    }
}

fn configure(
    player: &dyn NativePlayer,
    hardware_codecs: &[String],
) -> bridge_traits::error::Result<()> {
    if hardware_codecs.is_empty() {
        player.set_option("hwdec", "no")?;
    } else {
        player.set_option("hwdec", "auto-safe")?;
        player.set_option("hwdec-codecs", &hardware_codecs.join(","))?;
    }
    player.set_option("keep-open", "no")?;
    player.initialize()?;
    for property in OBSERVED_PROPERTIES {
        player.observe_property(property)?;
    }
    Ok(())
}

fn seconds_to_ms(value: &NativeValue) -> Option<u64> {
    let seconds = value.as_f64()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1000.0).round() as u64)
}

fn ms_to_seconds(ms: u64) -> String {
    format!("{:.3}", ms as f64 / 1000.0)
}

async fn pump_events(
    mut rx: UnboundedReceiver<NativeEvent>,
    player: Arc<dyn NativePlayer>,
    shared: Arc<Shared>,
    events: BackendEventSink,
    cancel: CancellationToken,
) {
    let mut cache_stalled = false;
    let mut seeking = false;

    loop {
        let event = core_async::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => event,
        };
        let Some(event) = event else { break };

        let translated = match event {
            NativeEvent::PropertyChanged { name, value } => match name.as_str() {
                "time-pos" => seconds_to_ms(&value).map(BackendEvent::Position),
                "duration" => seconds_to_ms(&value).map(BackendEvent::Duration),
                "pause" => value.as_flag().map(BackendEvent::Paused),
                "paused-for-cache" | "seeking" => {
                    let flag = value.as_flag().unwrap_or(false);
                    if name == "seeking" {
                        seeking = flag;
                    } else {
                        cache_stalled = flag;
                    }
                    Some(BackendEvent::Buffering(cache_stalled || seeking))
                }
                "idle-active" => value.as_flag().map(BackendEvent::Idle),
                _ => None,
            },
            NativeEvent::FileLoaded => {
                Some(on_file_loaded(player.as_ref(), shared.as_ref()))
            }
            NativeEvent::EndFile {
                reason: EndFileReason::Eof,
                ..
            } => Some(BackendEvent::Ended),
            NativeEvent::EndFile {
                reason: EndFileReason::Error,
                error,
            } => Some(BackendEvent::Fault(
                error.unwrap_or_else(|| "playback ended with an error".to_string()),
            )),
            NativeEvent::EndFile { reason, .. } => {
                debug!("Native player ended file: {:?}", reason);
                None
            }
            NativeEvent::Shutdown => break,
        };

        if let Some(event) = translated {
            if !events.send(event) {
                break;
            }
        }
    }
    debug!(generation = events.generation(), "Native player event pump exited");
}

fn on_file_loaded(player: &dyn NativePlayer, shared: &Shared) -> BackendEvent {
    let subtitles = std::mem::take(&mut *shared.pending_subtitles.lock());
    for subtitle in &subtitles {
        let title = subtitle.title.as_deref().unwrap_or("");
        let language = subtitle.language.as_deref().unwrap_or("");
        if let Err(err) = player.command(&["sub-add", &subtitle.url, "auto", title, language]) {
            warn!("Failed to attach subtitle {}: {}", subtitle.url, err);
        }
    }

    match player.track_list() {
        Ok(tracks) => *shared.tracks.lock() = tracks,
        Err(err) => warn!("Failed to read native track list: {}", err),
    }

    let duration_ms = player
        .get_property("duration")
        .ok()
        .and_then(|value| seconds_to_ms(&value));
    BackendEvent::Ready { duration_ms }
}

#[async_trait]
impl DecoderBackend for NativeBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Native
    }

    async fn load(&self, spec: LoadSpec) -> Result<()> {
        *self.shared.pending_subtitles.lock() = spec.subtitles;
        self.shared.tracks.lock().clear();

        self.player
            .set_property("start", NativeValue::Str(ms_to_seconds(spec.start_position_ms)))
            .map_err(init_error)?;
        self.player
            .command(&["loadfile", &spec.url, "replace"])
            .map_err(init_error)?;
        self.player
            .set_property("pause", NativeValue::Flag(false))
            .map_err(init_error)
    }

    async fn play(&self) -> Result<()> {
        self.set_property("pause", NativeValue::Flag(false))
    }

    async fn pause(&self) -> Result<()> {
        self.set_property("pause", NativeValue::Flag(true))
    }

    async fn seek_to(&self, position_ms: u64) -> Result<()> {
        self.command(&["seek", &ms_to_seconds(position_ms), "absolute"])
    }

    async fn set_volume(&self, volume: u8) -> Result<()> {
        self.set_property("volume", NativeValue::Double(f64::from(volume)))
    }

    async fn set_brightness(&self, brightness: f32) -> Result<()> {
        // The library's brightness filter is centred on 0 in -100..=100.
        let level = ((f64::from(brightness) - 1.0) * 100.0).round() as i64;
        self.set_property("brightness", NativeValue::Int(level))
    }

    async fn set_playback_speed(&self, speed: f32) -> Result<()> {
        self.set_property("speed", NativeValue::Double(f64::from(speed)))
    }

    async fn select_track(&self, kind: StreamKind, position: Option<usize>) -> Result<()> {
        let property = match kind {
            StreamKind::Audio => "aid",
            StreamKind::Subtitle => "sid",
            StreamKind::Video => "vid",
            StreamKind::Other => {
                return Err(PlaybackError::TrackUnavailable(format!("{:?}", kind)))
            }
        };

        let value = match position {
            None => NativeValue::Str("no".to_string()),
            Some(position) => match self.track_id(kind, position) {
                Some(id) => NativeValue::Int(id),
                None => {
                    return Err(PlaybackError::TrackUnavailable(format!(
                        "{:?} track at position {}",
                        kind, position
                    )))
                }
            },
        };
        self.set_property(property, value)
    }

    async fn stop(&self) -> Result<()> {
        self.command(&["stop"])
    }

    async fn release(&self) {
        if self.released.swap(true, Ordering::SeqCst) {
            return;
        }

        self.cancel.cancel();
        let pump = self.pump.lock().take();
        if let Some(pump) = pump {
            if let Err(err) = task::abort_and_join(pump).await {
                warn!("Native player event pump panicked: {}", err);
            }
        }
        self.player.destroy();
        debug!("Native player destroyed");
    }
}

impl Drop for NativeBackend {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
