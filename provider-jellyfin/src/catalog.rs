//! `MediaCatalog` over the Jellyfin item and playback-info endpoints.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::{MediaCatalog, MediaItem, MediaSegment, MediaSource, StreamHints};
use tracing::{debug, info, instrument};

use crate::client::{with_query, JellyfinClient};
use crate::error::JellyfinError;
use crate::types::{
    absolute_url, BaseItemDto, MediaSegmentDto, MediaSourceInfo, PlaybackInfoResponse, QueryResult,
};

impl JellyfinClient {
    async fn playback_info(
        &self,
        item_id: &str,
        media_source_id: Option<&str>,
        hints: Option<&StreamHints>,
    ) -> crate::error::Result<PlaybackInfoResponse> {
        let path = with_query(
            &format!("/Items/{}/PlaybackInfo", item_id),
            &[
                ("UserId", Some(self.user_id().to_string())),
                ("MediaSourceId", media_source_id.map(str::to_string)),
                (
                    "AudioStreamIndex",
                    hints.and_then(|h| h.audio_stream_index).map(|i| i.to_string()),
                ),
                (
                    "SubtitleStreamIndex",
                    hints.and_then(|h| h.subtitle_stream_index).map(|i| i.to_string()),
                ),
                (
                    "StartTimeTicks",
                    hints
                        .filter(|h| h.start_position_ticks > 0)
                        .map(|h| h.start_position_ticks.to_string()),
                ),
            ],
        );
        let info: PlaybackInfoResponse = self.get_json(&path).await?;
        if let Some(reason) = info.error_code.clone() {
            return Err(JellyfinError::PlaybackRefused { reason });
        }
        Ok(info)
    }

    /// Direct stream when the server allows it, otherwise its transcoding URL.
    fn stream_url(
        &self,
        item_id: &str,
        source: &MediaSourceInfo,
        play_session_id: Option<&str>,
    ) -> crate::error::Result<String> {
        if source.supports_direct_play || source.supports_direct_stream {
            let path = with_query(
                &format!("/Videos/{}/stream", item_id),
                &[
                    ("static", Some("true".to_string())),
                    ("mediaSourceId", Some(source.id.clone())),
                    ("playSessionId", play_session_id.map(str::to_string)),
                    ("api_key", Some(self.access_token().to_string())),
                ],
            );
            return Ok(self.url(&path));
        }

        match source.transcoding_url.as_deref() {
            Some(url) if source.supports_transcoding && !url.is_empty() => {
                Ok(absolute_url(self.base_url(), url))
            }
            _ => Err(JellyfinError::NoDeliveryPath {
                media_source_id: source.id.clone(),
            }),
        }
    }

    async fn list_items(&self, path: &str) -> crate::error::Result<Vec<MediaItem>> {
        let result: QueryResult<BaseItemDto> = self.get_json(path).await?;
        Ok(result
            .items
            .into_iter()
            .map(|item| item.into_media_item(self.base_url()))
            .collect())
    }
}

#[async_trait]
impl MediaCatalog for JellyfinClient {
    #[instrument(skip(self, hints))]
    async fn resolve_stream_url(
        &self,
        item_id: &str,
        media_source_id: &str,
        hints: &StreamHints,
    ) -> Result<String> {
        let info = self
            .playback_info(item_id, Some(media_source_id), Some(hints))
            .await?;
        let source = info
            .media_sources
            .iter()
            .find(|source| source.id == media_source_id)
            .ok_or_else(|| JellyfinError::NotFound {
                resource: format!("media source {} of {}", media_source_id, item_id),
            })?;

        let url = self.stream_url(item_id, source, info.play_session_id.as_deref())?;
        debug!(
            direct = source.supports_direct_play || source.supports_direct_stream,
            "Resolved stream URL"
        );
        Ok(url)
    }

    #[instrument(skip(self))]
    async fn get_media_sources(&self, item_id: &str) -> Result<Vec<MediaSource>> {
        let info = self.playback_info(item_id, None, None).await?;
        Ok(info
            .media_sources
            .into_iter()
            .map(|source| source.into_media_source(self.base_url()))
            .collect())
    }

    #[instrument(skip(self))]
    async fn get_segments(&self, item_id: &str) -> Result<Vec<MediaSegment>> {
        let path = format!("/MediaSegments/{}", item_id);
        match self.get_json::<QueryResult<MediaSegmentDto>>(&path).await {
            Ok(result) => Ok(result.items.into_iter().map(MediaSegment::from).collect()),
            // Servers without segment support answer 404.
            Err(JellyfinError::NotFound { .. }) => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    #[instrument(skip(self))]
    async fn get_seasons(&self, series_id: &str) -> Result<Vec<MediaItem>> {
        let path = with_query(
            &format!("/Shows/{}/Seasons", series_id),
            &[("UserId", Some(self.user_id().to_string()))],
        );
        let seasons = self.list_items(&path).await?;
        info!("Fetched {} seasons", seasons.len());
        Ok(seasons)
    }

    #[instrument(skip(self))]
    async fn get_episodes(
        &self,
        series_id: &str,
        season_id: Option<&str>,
    ) -> Result<Vec<MediaItem>> {
        let path = with_query(
            &format!("/Shows/{}/Episodes", series_id),
            &[
                ("UserId", Some(self.user_id().to_string())),
                ("SeasonId", season_id.map(str::to_string)),
                ("Fields", Some("MediaSources".to_string())),
            ],
        );
        let episodes = self.list_items(&path).await?;
        info!("Fetched {} episodes", episodes.len());
        Ok(episodes)
    }
}
