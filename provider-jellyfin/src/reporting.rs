//! `ProgressSink` over the Jellyfin session endpoints.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{PlaybackReport, ProgressSink};
use tracing::{debug, instrument};

use crate::client::JellyfinClient;
use crate::types::PlaybackReportBody;

#[async_trait]
impl ProgressSink for JellyfinClient {
    #[instrument(skip(self, report), fields(item_id = %report.item_id, session_id = %report.session_id))]
    async fn report_start(&self, report: &PlaybackReport) -> Result<()> {
        self.post_json("/Sessions/Playing", &PlaybackReportBody::from(report))
            .await?;
        debug!("Reported playback start");
        Ok(())
    }

    async fn report_progress(&self, report: &PlaybackReport) -> Result<()> {
        self.post_json("/Sessions/Playing/Progress", &PlaybackReportBody::from(report))
            .await?;
        Ok(())
    }

    #[instrument(skip(self, report), fields(item_id = %report.item_id, session_id = %report.session_id))]
    async fn report_stop(&self, report: &PlaybackReport) -> Result<()> {
        self.post_json("/Sessions/Playing/Stopped", &PlaybackReportBody::from(report))
            .await?;
        debug!(failed = report.failed, "Reported playback stop");
        Ok(())
    }
}
