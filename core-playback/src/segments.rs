//! # Segment Monitor
//!
//! Tracks the skippable ranges of the loaded item and decides when a skip
//! affordance should be visible.
//!
//! ```text
//!   load(non-empty)        position inside window
//! Idle ───────────────> Armed ─────────────────────> Active(segment)
//!   ^                     ^ <──────────────────────── │
//!   │ clear()             │  left window / skip()    │
//!   └─────────────────────┴──────────────────────────┘
//! ```
//!
//! A segment is skippable in `[start, end - epsilon)`. Skipping seeks to the
//! segment end and never chains into an adjacent segment: the skipped one is
//! dismissed until the position leaves it, and the next one is picked up on
//! a later tick like any other.

use crate::preferences::PlaybackPreferences;
use bridge_traits::MediaSegment;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    /// No segments loaded; nothing to poll.
    Idle,
    /// Segments loaded, none active.
    Armed,
    Active(MediaSegment),
}

/// Visibility change produced by one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipChange {
    Shown(MediaSegment),
    Hidden(MediaSegment),
}

#[derive(Debug, Clone)]
pub struct SegmentMonitor {
    segments: Vec<MediaSegment>,
    state: MonitorState,
    epsilon_ms: u64,
    dismissed: Option<MediaSegment>,
}

impl SegmentMonitor {
    pub fn new(epsilon_ms: u64) -> Self {
        Self {
            segments: Vec::new(),
            state: MonitorState::Idle,
            epsilon_ms,
            dismissed: None,
        }
    }

    /// Replace the segment list for a newly loaded item.
    pub fn load(&mut self, mut segments: Vec<MediaSegment>) {
        segments.retain(|segment| segment.end_ticks > segment.start_ticks);
        segments.sort_by_key(|segment| segment.start_ticks);
        self.state = if segments.is_empty() {
            MonitorState::Idle
        } else {
            MonitorState::Armed
        };
        self.segments = segments;
        self.dismissed = None;
    }

    /// Drop everything; used when the item changes or the session ends.
    pub fn clear(&mut self) {
        self.segments.clear();
        self.state = MonitorState::Idle;
        self.dismissed = None;
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn active(&self) -> Option<MediaSegment> {
        match self.state {
            MonitorState::Active(segment) => Some(segment),
            _ => None,
        }
    }

    pub fn needs_polling(&self) -> bool {
        self.state != MonitorState::Idle
    }

    pub fn segments(&self) -> &[MediaSegment] {
        &self.segments
    }

    fn contains(&self, segment: &MediaSegment, position_ms: u64) -> bool {
        let end = segment.end_ms().saturating_sub(self.epsilon_ms);
        position_ms >= segment.start_ms() && position_ms < end
    }

    /// Fold one position sample into the state machine.
    pub fn evaluate(
        &mut self,
        position_ms: u64,
        preferences: &PlaybackPreferences,
    ) -> Option<SkipChange> {
        if self.state == MonitorState::Idle {
            return None;
        }

        if let Some(dismissed) = self.dismissed {
            if !self.contains(&dismissed, position_ms) {
                self.dismissed = None;
            }
        }

        let candidate = self
            .segments
            .iter()
            .copied()
            .filter(|segment| Some(*segment) != self.dismissed)
            .filter(|segment| preferences.skip_enabled(segment.segment_type))
            .find(|segment| self.contains(segment, position_ms));

        match (self.state, candidate) {
            (MonitorState::Active(current), Some(next)) if current == next => None,
            (MonitorState::Active(current), Some(next)) => {
                // Moved straight from one window into another; the caller
                // sees the new segment, which replaces the old affordance.
                tracing::debug!(
                    "Segment {} gave way to {}",
                    current.segment_type.as_str(),
                    next.segment_type.as_str()
                );
                self.state = MonitorState::Active(next);
                Some(SkipChange::Shown(next))
            }
            (MonitorState::Active(current), None) => {
                self.state = MonitorState::Armed;
                Some(SkipChange::Hidden(current))
            }
            (_, Some(next)) => {
                self.state = MonitorState::Active(next);
                Some(SkipChange::Shown(next))
            }
            (_, None) => None,
        }
    }

    /// Consume the active segment. Returns it so the caller can seek to its
    /// end; `None` when nothing is active.
    pub fn skip(&mut self) -> Option<MediaSegment> {
        let segment = self.active()?;
        self.state = MonitorState::Armed;
        self.dismissed = Some(segment);
        Some(segment)
    }
}
