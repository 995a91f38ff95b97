//! `TrickplaySource` over the item's `Trickplay` map and the tile endpoint.

use async_trait::async_trait;
use bridge_traits::error::Result;
use bridge_traits::http::HttpMethod;
use bridge_traits::{TrickplaySheet, TrickplaySource};
use bytes::Bytes;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::client::{with_query, JellyfinClient};
use crate::error::JellyfinError;
use crate::types::{BaseItemDto, TrickplayInfo};

/// Pick the sheet for `item_id`: the entry keyed by the item's own source
/// when present, otherwise the first source by key; within it the smallest
/// width.
fn select_sheet(
    item_id: &str,
    trickplay: &HashMap<String, HashMap<String, TrickplayInfo>>,
) -> Option<TrickplaySheet> {
    let widths = trickplay.get(item_id).or_else(|| {
        let mut keys: Vec<&String> = trickplay.keys().collect();
        keys.sort();
        keys.first().and_then(|key| trickplay.get(*key))
    })?;
    widths
        .values()
        .filter(|info| info.width > 0 && info.thumbnail_count > 0)
        .min_by_key(|info| info.width)
        .map(|info| TrickplaySheet::from(*info))
}

#[async_trait]
impl TrickplaySource for JellyfinClient {
    #[instrument(skip(self))]
    async fn trickplay_info(&self, item_id: &str) -> Result<Option<TrickplaySheet>> {
        let path = format!("/Users/{}/Items/{}", self.user_id(), item_id);
        let item: BaseItemDto = self.get_json(&path).await?;
        let sheet = item
            .trickplay
            .as_ref()
            .and_then(|trickplay| select_sheet(item_id, trickplay));
        debug!(found = sheet.is_some(), "Trickplay descriptor fetched");
        Ok(sheet)
    }

    async fn get_tile(&self, item_id: &str, width: u32, tile_index: u32) -> Result<Option<Bytes>> {
        let path = with_query(
            &format!("/Videos/{}/Trickplay/{}/{}.jpg", item_id, width, tile_index),
            &[("api_key", Some(self.access_token().to_string()))],
        );
        let request = self
            .request(HttpMethod::Get, &path)
            .header("Accept", "image/*");
        match self.send(request).await {
            Ok(response) => Ok(Some(response.body)),
            Err(JellyfinError::NotFound { .. }) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(width: u32) -> TrickplayInfo {
        TrickplayInfo {
            width,
            height: width * 9 / 16,
            tile_width: 10,
            tile_height: 10,
            thumbnail_count: 240,
            interval: 10_000,
        }
    }

    #[test]
    fn test_select_smallest_width_of_own_source() {
        let mut trickplay = HashMap::new();
        trickplay.insert(
            "ep1".to_string(),
            HashMap::from([("320".to_string(), info(320)), ("160".to_string(), info(160))]),
        );
        trickplay.insert(
            "alt".to_string(),
            HashMap::from([("96".to_string(), info(96))]),
        );

        let sheet = select_sheet("ep1", &trickplay).unwrap();
        assert_eq!(sheet.width, 160);
        assert_eq!(sheet.interval_ms, 10_000);
    }

    #[test]
    fn test_select_falls_back_to_first_source() {
        let trickplay = HashMap::from([(
            "other".to_string(),
            HashMap::from([("320".to_string(), info(320))]),
        )]);
        assert_eq!(select_sheet("ep1", &trickplay).unwrap().width, 320);
        assert!(select_sheet("ep1", &HashMap::new()).is_none());
    }
}
