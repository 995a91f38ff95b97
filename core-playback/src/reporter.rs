//! # Progress Reporter
//!
//! Pushes transport snapshots to the server's [`ProgressSink`]. Reporting is
//! best-effort: failures are logged and dropped, never retried and never
//! surfaced to the caller.
//!
//! The stop report is exactly-once per session. [`ProgressReporter`] holds
//! the guard; only [`ProgressReporter::reset`], called at the next load, can
//! re-arm it.

use crate::state::TransportState;
use bridge_traits::media::ms_to_ticks;
use bridge_traits::{PlaybackReport, ProgressSink};
use core_async::sync::{watch, CancellationToken};
use core_async::time::{delayed_interval, Duration};
use std::sync::Arc;
use tracing::{debug, warn};

/// Build a report from a snapshot. `None` when no session is loaded.
pub fn report_for(state: &TransportState, failed: bool) -> Option<PlaybackReport> {
    let item_id = state.current_item.clone()?;
    let session_id = state.session_id.clone()?;
    Some(PlaybackReport {
        item_id,
        media_source_id: state.media_source_id.clone(),
        session_id,
        position_ticks: ms_to_ticks(state.position_ms),
        is_paused: state.is_paused,
        is_muted: state.volume == 0,
        volume_level: state.volume,
        playback_rate: state.playback_speed,
        audio_stream_index: state.audio_stream_index,
        subtitle_stream_index: state.subtitle_stream_index,
        failed,
    })
}

pub struct ProgressReporter {
    sink: Arc<dyn ProgressSink>,
    stop_reported: bool,
}

impl ProgressReporter {
    pub fn new(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            sink,
            stop_reported: false,
        }
    }

    pub fn sink(&self) -> Arc<dyn ProgressSink> {
        Arc::clone(&self.sink)
    }

    /// Re-arm the stop guard for a new session.
    pub fn reset(&mut self) {
        self.stop_reported = false;
    }

    pub fn stop_reported(&self) -> bool {
        self.stop_reported
    }

    pub async fn report_start(&self, state: &TransportState) {
        let Some(report) = report_for(state, false) else {
            return;
        };
        if let Err(err) = self.sink.report_start(&report).await {
            warn!(
                session_id = %report.session_id,
                "Failed to report playback start: {}", err
            );
        }
    }

    /// No-op once this session's stop report went out.
    pub async fn report_progress(&self, state: &TransportState) {
        if self.stop_reported {
            debug!("Progress after stop report ignored");
            return;
        }
        report_progress(self.sink.as_ref(), state).await;
    }

    /// Send the stop report unless this session already sent one.
    ///
    /// Returns whether a report was attempted. The guard flips before the
    /// network call, so a failed stop report is not retried either.
    pub async fn report_stop(&mut self, state: &TransportState, failed: bool) -> bool {
        if self.stop_reported {
            debug!("Stop already reported for this session");
            return false;
        }
        let Some(report) = report_for(state, failed) else {
            return false;
        };
        self.stop_reported = true;

        if let Err(err) = self.sink.report_stop(&report).await {
            warn!(
                session_id = %report.session_id,
                "Failed to report playback stop: {}", err
            );
        }
        true
    }
}

async fn report_progress(sink: &dyn ProgressSink, state: &TransportState) {
    let Some(report) = report_for(state, false) else {
        return;
    };
    if let Err(err) = sink.report_progress(&report).await {
        warn!(
            session_id = %report.session_id,
            position_ms = state.position_ms,
            "Failed to report playback progress: {}", err
        );
    }
}

/// Periodic progress loop for one session.
///
/// Reads the latest snapshot on every tick and skips ticks where the
/// snapshot belongs to another session or is not playing (paused,
/// buffering, loading or faulted). Exits when
/// `token` is cancelled or the state channel closes.
pub async fn run_progress_loop(
    sink: Arc<dyn ProgressSink>,
    state_rx: watch::Receiver<TransportState>,
    session_id: String,
    period: Duration,
    token: CancellationToken,
) {
    let mut ticker = delayed_interval(period, period);

    loop {
        core_async::select! {
            _ = token.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if state_rx.has_changed().is_err() {
            break;
        }

        let snapshot = state_rx.borrow().clone();
        if snapshot.session_id.as_deref() != Some(session_id.as_str()) || !snapshot.is_active()
            || !snapshot.is_playing
        {
            continue;
        }

        // A stop may have cancelled us while the snapshot was read.
        if token.is_cancelled() {
            break;
        }
        report_progress(sink.as_ref(), &snapshot).await;
    }
    debug!(session_id = %session_id, "Progress loop exited");
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bridge_traits::error::Result;
    use bridge_traits::BridgeError;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        calls: Mutex<Vec<(String, String)>>,
        fail: bool,
    }

    impl RecordingSink {
        fn record(&self, kind: &str, report: &PlaybackReport) -> Result<()> {
            self.calls
                .lock()
                .push((kind.to_string(), report.session_id.clone()));
            if self.fail {
                return Err(BridgeError::Http {
                    status: 503,
                    message: "unavailable".into(),
                });
            }
            Ok(())
        }

        fn count(&self, kind: &str) -> usize {
            self.calls.lock().iter().filter(|(k, _)| k == kind).count()
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

    fn active(session: &str) -> TransportState {
        TransportState::default()
            .loading("ep1", "src1")
            .started(session, 1_500, Some(1), None)
            .ready(Some(60_000))
    }

    #[test]
    fn report_uses_ticks_and_requires_a_session() {
        let report = report_for(&active("s1").volume(0), true).unwrap();
        assert_eq!(report.position_ticks, 15_000_000);
        assert!(report.is_muted);
        assert!(report.failed);
        assert_eq!(report.audio_stream_index, Some(1));

        assert!(report_for(&TransportState::default(), false).is_none());
    }

    #[tokio::test]
    async fn stop_is_reported_once_until_reset() {
        let sink = Arc::new(RecordingSink::default());
        let mut reporter = ProgressReporter::new(sink.clone());
        let state = active("s1");

        assert!(reporter.report_stop(&state, false).await);
        assert!(!reporter.report_stop(&state, false).await);
        assert!(!reporter.report_stop(&state, true).await);
        assert_eq!(sink.count("stop"), 1);
        reporter.report_progress(&state).await;
        assert_eq!(sink.count("progress"), 0);

        reporter.reset();
        assert!(reporter.report_stop(&active("s2"), false).await);
        assert_eq!(sink.count("stop"), 2);
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let mut reporter = ProgressReporter::new(sink.clone());
        let state = active("s1");

        reporter.report_start(&state).await;
        reporter.report_progress(&state).await;
        assert!(reporter.report_stop(&state, false).await);
        // Failed stop is not retried.
        assert!(!reporter.report_stop(&state, false).await);
        assert_eq!(sink.calls.lock().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn loop_reports_on_period_and_skips_stale_sessions() {
        let sink = Arc::new(RecordingSink::default());
        let (tx, rx) = watch::channel(active("s1"));
        let token = CancellationToken::new();

        let handle = core_async::task::spawn(run_progress_loop(
            sink.clone(),
            rx,
            "s1".to_string(),
            Duration::from_secs(10),
            token.clone(),
        ));

        core_async::time::sleep(Duration::from_secs(25)).await;
        assert_eq!(sink.count("progress"), 2);

        tx.send(active("s1").paused(true)).unwrap();
        core_async::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.count("progress"), 2);

        tx.send(active("s2")).unwrap();
        core_async::time::sleep(Duration::from_secs(20)).await;
        assert_eq!(sink.count("progress"), 2);

        token.cancel();
        handle.await.unwrap();
        assert!(sink.calls.lock().iter().all(|(_, session)| session == "s1"));
    }
}
