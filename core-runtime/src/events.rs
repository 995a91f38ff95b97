//! # Event Bus System
//!
//! Typed engine events delivered over `tokio::sync::broadcast`.
//!
//! The transport snapshot itself is published on a `watch` channel by the
//! playback engine; this bus carries the discrete signals a UI reacts to
//! once: a session started, the skip button should appear, the next episode
//! is ready for autoplay.
//!
//! ```text
//! ┌──────────────────┐   emit    ┌───────────┐  subscribe  ┌────────────┐
//! │ Session control  ├──────────>│           ├────────────>│ UI layer   │
//! ├──────────────────┤           │ EventBus  │             └────────────┘
//! │ Segment monitor  ├──────────>│ (broadcast│  subscribe  ┌────────────┐
//! ├──────────────────┤           │  channel) ├────────────>│ Analytics  │
//! │ Playlist manager ├──────────>│           │             └────────────┘
//! └──────────────────┘           └───────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use core_runtime::events::{CoreEvent, EventBus, QueueEvent};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let bus = EventBus::new(32);
//! let mut rx = bus.subscribe();
//!
//! bus.emit(CoreEvent::Queue(QueueEvent::NextItemReady {
//!     item_id: "episode-2".to_string(),
//!     index: 1,
//! }))
//! .ok();
//!
//! assert!(matches!(rx.recv().await, Ok(CoreEvent::Queue(_))));
//! # }
//! ```
//!
//! ## Error Handling
//!
//! - `RecvError::Lagged(n)`: the subscriber missed `n` events and may continue.
//! - `RecvError::Closed`: every sender is gone; treat it as shutdown.
//!
//! `emit` fails only when nobody is subscribed, which publishers ignore.

use bridge_traits::SegmentType;
use core_async::sync::broadcast;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use core_async::sync::broadcast::error::{RecvError, SendError};
pub use core_async::sync::broadcast::Receiver;

/// Default buffer size for the event bus channel.
pub const DEFAULT_EVENT_BUFFER_SIZE: usize = 100;

// ============================================================================
// Core Event Types
// ============================================================================

/// Top-level event published on the bus.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "payload")]
pub enum CoreEvent {
    /// Session lifecycle and transport transitions
    Playback(PlaybackEvent),
    /// Skip affordance visibility
    Skip(SkipEvent),
    /// Play queue changes and autoplay hand-offs
    Queue(QueueEvent),
}

impl CoreEvent {
    /// Returns a human-readable description of the event.
    pub fn description(&self) -> &str {
        match self {
            CoreEvent::Playback(e) => e.description(),
            CoreEvent::Skip(e) => e.description(),
            CoreEvent::Queue(e) => e.description(),
        }
    }

    /// Returns the severity level of the event.
    pub fn severity(&self) -> EventSeverity {
        match self {
            CoreEvent::Playback(PlaybackEvent::Error {
                recoverable: false,
                ..
            }) => EventSeverity::Error,
            CoreEvent::Playback(PlaybackEvent::Error { .. }) => EventSeverity::Warning,
            CoreEvent::Playback(PlaybackEvent::SessionStarted { .. })
            | CoreEvent::Playback(PlaybackEvent::Completed { .. })
            | CoreEvent::Queue(QueueEvent::NextItemReady { .. }) => EventSeverity::Info,
            _ => EventSeverity::Debug,
        }
    }
}

/// Event severity levels for filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventSeverity {
    Debug,
    Info,
    Warning,
    Error,
}

// ============================================================================
// Playback Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum PlaybackEvent {
    /// A load succeeded and a new session id was assigned.
    SessionStarted {
        item_id: String,
        session_id: String,
        media_source_id: String,
        /// `managed` or `native`.
        backend: String,
    },
    Paused {
        item_id: String,
        position_ms: u64,
    },
    Resumed {
        item_id: String,
        position_ms: u64,
    },
    /// Session ended by an explicit stop or by natural end.
    Stopped {
        item_id: String,
        session_id: String,
        position_ms: u64,
    },
    /// Media reached its natural end and nothing is queued to follow.
    Completed { item_id: String },
    Error {
        item_id: Option<String>,
        /// Stable error code, e.g. `stream_url_unavailable`.
        code: String,
        message: String,
        /// Whether re-issuing the load may succeed.
        recoverable: bool,
    },
    /// Seek-preview thumbnails for the current item are decoded.
    TrickplayReady {
        item_id: String,
        thumbnail_count: usize,
    },
    /// A seek preview was served for the given scrub position.
    SeekPreview {
        item_id: String,
        position_ms: u64,
        thumbnail_index: usize,
    },
}

impl PlaybackEvent {
    fn description(&self) -> &str {
        match self {
            PlaybackEvent::SessionStarted { .. } => "Playback session started",
            PlaybackEvent::Paused { .. } => "Playback paused",
            PlaybackEvent::Resumed { .. } => "Playback resumed",
            PlaybackEvent::Stopped { .. } => "Playback stopped",
            PlaybackEvent::Completed { .. } => "Item completed",
            PlaybackEvent::Error { .. } => "Playback error",
            PlaybackEvent::TrickplayReady { .. } => "Seek previews ready",
            PlaybackEvent::SeekPreview { .. } => "Seek preview served",
        }
    }
}

// ============================================================================
// Skip Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum SkipEvent {
    /// Position entered a skippable segment; show the skip button.
    Shown {
        item_id: String,
        segment_type: SegmentType,
        start_ms: u64,
        end_ms: u64,
    },
    /// The active segment was left; hide the skip button.
    Hidden { item_id: String },
    /// The user skipped; playback jumped to the segment end.
    Skipped {
        item_id: String,
        segment_type: SegmentType,
        target_ms: u64,
    },
}

impl SkipEvent {
    fn description(&self) -> &str {
        match self {
            SkipEvent::Shown { .. } => "Skip affordance shown",
            SkipEvent::Hidden { .. } => "Skip affordance hidden",
            SkipEvent::Skipped { .. } => "Segment skipped",
        }
    }
}

// ============================================================================
// Queue Events
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum QueueEvent {
    Built {
        size: usize,
        current_index: usize,
        series_id: Option<String>,
    },
    CurrentChanged { item_id: String, index: usize },
    /// Natural end with autoplay enabled: the caller should load `item_id`.
    NextItemReady { item_id: String, index: usize },
}

impl QueueEvent {
    fn description(&self) -> &str {
        match self {
            QueueEvent::Built { .. } => "Play queue built",
            QueueEvent::CurrentChanged { .. } => "Queue position changed",
            QueueEvent::NextItemReady { .. } => "Next item ready for autoplay",
        }
    }
}

// ============================================================================
// Event Bus
// ============================================================================

/// Central event bus for publishing and subscribing to events.
///
/// Cloning the bus clones the sender; every `subscribe()` gets an
/// independent receiver that sees events emitted after it subscribed.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CoreEvent>,
}

impl EventBus {
    /// Creates a new event bus buffering up to `capacity` events per subscriber.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publishes an event to all subscribers.
    ///
    /// Returns the number of subscribers that received the event, or an
    /// error if there are none.
    pub fn emit(&self, event: CoreEvent) -> Result<usize, SendError<CoreEvent>> {
        self.sender.send(event)
    }

    /// Creates a new subscriber. Past events are not replayed.
    pub fn subscribe(&self) -> Receiver<CoreEvent> {
        self.sender.subscribe()
    }

    /// Subscribe and wrap the receiver in an [`EventStream`].
    pub fn stream(&self) -> EventStream {
        EventStream::new(self.subscribe())
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_BUFFER_SIZE)
    }
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

// ============================================================================
// Event Stream Wrapper
// ============================================================================

type EventFilter = Box<dyn Fn(&CoreEvent) -> bool + Send + Sync>;

/// A `broadcast::Receiver` with an optional predicate.
///
/// ```rust
/// use core_runtime::events::{CoreEvent, EventBus};
///
/// let bus = EventBus::new(16);
/// let skips = bus.stream().filter(|event| matches!(event, CoreEvent::Skip(_)));
/// # drop(skips);
/// ```
pub struct EventStream {
    receiver: Receiver<CoreEvent>,
    filter: Option<EventFilter>,
}

impl EventStream {
    pub fn new(receiver: Receiver<CoreEvent>) -> Self {
        Self {
            receiver,
            filter: None,
        }
    }

    /// Only events matching `predicate` are returned from `recv`/`try_recv`.
    pub fn filter<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&CoreEvent) -> bool + Send + Sync + 'static,
    {
        self.filter = Some(Box::new(predicate));
        self
    }

    fn accepts(&self, event: &CoreEvent) -> bool {
        self.filter.as_ref().map_or(true, |filter| filter(event))
    }

    /// Receives the next event that passes the filter.
    ///
    /// # Errors
    ///
    /// `RecvError::Lagged(n)` when the subscriber fell behind by `n` events,
    /// `RecvError::Closed` when all senders have been dropped.
    pub async fn recv(&mut self) -> Result<CoreEvent, RecvError> {
        loop {
            let event = self.receiver.recv().await?;
            if self.accepts(&event) {
                return Ok(event);
            }
        }
    }

    /// Non-blocking receive. `None` means nothing matching is buffered.
    pub fn try_recv(&mut self) -> Option<Result<CoreEvent, RecvError>> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if self.accepts(&event) {
                        return Some(Ok(event));
                    }
                }
                Err(broadcast::error::TryRecvError::Empty) => return None,
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    return Some(Err(RecvError::Lagged(n)))
                }
                Err(broadcast::error::TryRecvError::Closed) => return Some(Err(RecvError::Closed)),
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("has_filter", &self.filter.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn shown() -> CoreEvent {
        CoreEvent::Skip(SkipEvent::Shown {
            item_id: "ep-1".to_string(),
            segment_type: SegmentType::Intro,
            start_ms: 0,
            end_ms: 30_000,
        })
    }

    #[tokio::test]
    async fn test_event_emission_no_subscribers() {
        let bus = EventBus::new(10);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.emit(shown()).is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers_receive_same_event() {
        let bus = EventBus::new(10);
        let mut sub1 = bus.subscribe();
        let mut sub2 = bus.subscribe();

        let event = CoreEvent::Queue(QueueEvent::Built {
            size: 5,
            current_index: 3,
            series_id: Some("series-1".to_string()),
        });
        assert_eq!(bus.emit(event.clone()).unwrap(), 2);

        assert_eq!(sub1.recv().await.unwrap(), event);
        assert_eq!(sub2.recv().await.unwrap(), event);
    }

    #[tokio::test]
    async fn test_event_stream_with_filter() {
        let bus = EventBus::new(10);
        let mut stream = bus
            .stream()
            .filter(|event| matches!(event, CoreEvent::Queue(_)));

        bus.emit(shown()).ok();
        let next = CoreEvent::Queue(QueueEvent::NextItemReady {
            item_id: "ep-2".to_string(),
            index: 1,
        });
        bus.emit(next.clone()).ok();

        assert_eq!(stream.recv().await.unwrap(), next);
    }

    #[tokio::test]
    async fn test_try_recv_skips_filtered_events() {
        let bus = EventBus::new(10);
        let mut stream = bus
            .stream()
            .filter(|event| matches!(event, CoreEvent::Playback(_)));
        assert!(stream.try_recv().is_none());

        bus.emit(shown()).ok();
        assert!(stream.try_recv().is_none());

        let started = CoreEvent::Playback(PlaybackEvent::Completed {
            item_id: "movie".to_string(),
        });
        bus.emit(started.clone()).ok();
        assert_eq!(stream.try_recv().unwrap().unwrap(), started);
    }

    #[tokio::test]
    async fn test_lagged_subscriber() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for _ in 0..5 {
            bus.emit(shown()).ok();
        }
        assert!(matches!(sub.recv().await, Err(RecvError::Lagged(_))));
    }

    #[test]
    fn test_event_severity() {
        let fatal = CoreEvent::Playback(PlaybackEvent::Error {
            item_id: None,
            code: "no_compatible_source".to_string(),
            message: "no source".to_string(),
            recoverable: false,
        });
        assert_eq!(fatal.severity(), EventSeverity::Error);

        let retryable = CoreEvent::Playback(PlaybackEvent::Error {
            item_id: Some("a".to_string()),
            code: "backend_init_failed".to_string(),
            message: "decoder busy".to_string(),
            recoverable: true,
        });
        assert_eq!(retryable.severity(), EventSeverity::Warning);

        let handoff = CoreEvent::Queue(QueueEvent::NextItemReady {
            item_id: "b".to_string(),
            index: 4,
        });
        assert_eq!(handoff.severity(), EventSeverity::Info);
        assert_eq!(shown().severity(), EventSeverity::Debug);
        assert_eq!(handoff.description(), "Next item ready for autoplay");
    }

    #[test]
    fn test_event_serialization_shape() {
        let json = serde_json::to_value(shown()).unwrap();
        assert_eq!(json["type"], "Skip");
        assert_eq!(json["payload"]["event"], "Shown");
        assert_eq!(json["payload"]["segment_type"], "Intro");

        let back: CoreEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, shown());
    }
}
