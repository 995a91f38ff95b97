//! # Playlist Manager
//!
//! Ordered play queue with a cursor. A series episode expands to every
//! episode of the series across seasons; anything else is a queue of one.
//!
//! Building never fails. When the catalog cannot produce a usable episode
//! list the queue degrades to the starting item alone.
//!
//! The manager is an owned value: the engine holds one and replaces it when
//! a load starts outside the current series.

use bridge_traits::{MediaCatalog, MediaItem};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

#[derive(Debug, Clone, PartialEq)]
pub struct QueueEntry {
    pub item: MediaItem,
    /// Whether source metadata was fetched for this entry. Entries without
    /// it are kept; the engine resolves sources again at load.
    pub sources_resolved: bool,
}

impl QueueEntry {
    fn resolved(item: MediaItem) -> Self {
        let sources_resolved = !item.media_sources.is_empty();
        Self {
            item,
            sources_resolved,
        }
    }
}

/// Serializable view of the queue for callers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueueSnapshot {
    pub item_ids: Vec<String>,
    pub current_index: Option<usize>,
    pub series_id: Option<String>,
    pub has_next: bool,
    pub has_previous: bool,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PlaylistManager {
    entries: Vec<QueueEntry>,
    current_index: usize,
    series_id: Option<String>,
}

impl PlaylistManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue holding only `item`.
    pub fn single(item: MediaItem) -> Self {
        Self {
            entries: vec![QueueEntry::resolved(item)],
            current_index: 0,
            series_id: None,
        }
    }

    /// Build a queue around `starting`.
    pub async fn build(catalog: &dyn MediaCatalog, starting: &MediaItem) -> Self {
        let mut manager = Self::new();
        manager.initialize(catalog, starting).await;
        manager
    }

    /// Rebuild this queue around `starting`. Never fails; see module docs.
    #[instrument(skip(self, catalog, starting), fields(item_id = %starting.id))]
    pub async fn initialize(&mut self, catalog: &dyn MediaCatalog, starting: &MediaItem) {
        let Some(series_id) = starting.series().map(str::to_string) else {
            *self = Self::single(starting.clone());
            return;
        };

        let episodes = match fetch_series(catalog, &series_id).await {
            Some(episodes) => episodes,
            None => {
                *self = Self::single(starting.clone());
                return;
            }
        };

        let Some(mut entries) = enrich(catalog, episodes).await else {
            warn!("Episode enrichment failed entirely; queueing starting item alone");
            *self = Self::single(starting.clone());
            return;
        };

        let current_index = match entries.iter().position(|e| e.item.id == starting.id) {
            Some(index) => index,
            None => {
                let index = insertion_point(&entries, starting);
                entries.insert(index, QueueEntry::resolved(starting.clone()));
                index
            }
        };

        info!(
            "Built play queue of {} items for series {} (current {})",
            entries.len(),
            series_id,
            current_index
        );
        *self = Self {
            entries,
            current_index,
            series_id: Some(series_id),
        };
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn series_id(&self) -> Option<&str> {
        self.series_id.as_deref()
    }

    pub fn current_index(&self) -> Option<usize> {
        (!self.entries.is_empty()).then_some(self.current_index)
    }

    pub fn current(&self) -> Option<&MediaItem> {
        self.entries.get(self.current_index).map(|entry| &entry.item)
    }

    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn contains(&self, item_id: &str) -> bool {
        self.entries.iter().any(|entry| entry.item.id == item_id)
    }

    pub fn has_next(&self) -> bool {
        !self.entries.is_empty() && self.current_index < self.entries.len() - 1
    }

    pub fn has_previous(&self) -> bool {
        !self.entries.is_empty() && self.current_index > 0
    }

    pub fn next(&mut self) -> Option<&MediaItem> {
        if !self.has_next() {
            return None;
        }
        self.current_index += 1;
        self.current()
    }

    pub fn previous(&mut self) -> Option<&MediaItem> {
        if !self.has_previous() {
            return None;
        }
        self.current_index -= 1;
        self.current()
    }

    pub fn jump_to_item(&mut self, item_id: &str) -> Option<&MediaItem> {
        let index = self
            .entries
            .iter()
            .position(|entry| entry.item.id == item_id)?;
        self.current_index = index;
        self.current()
    }

    pub fn snapshot(&self) -> QueueSnapshot {
        QueueSnapshot {
            item_ids: self.entries.iter().map(|e| e.item.id.clone()).collect(),
            current_index: self.current_index(),
            series_id: self.series_id.clone(),
            has_next: self.has_next(),
            has_previous: self.has_previous(),
        }
    }
}

/// All episodes of a series sorted by (season, episode), or `None` when any
/// catalog call fails.
async fn fetch_series(catalog: &dyn MediaCatalog, series_id: &str) -> Option<Vec<MediaItem>> {
    let seasons = match catalog.get_seasons(series_id).await {
        Ok(seasons) => seasons,
        Err(err) => {
            warn!("Failed to fetch seasons for series {}: {}", series_id, err);
            return None;
        }
    };

    let mut episodes = Vec::new();
    if seasons.is_empty() {
        match catalog.get_episodes(series_id, None).await {
            Ok(found) => episodes.extend(found),
            Err(err) => {
                warn!("Failed to fetch episodes for series {}: {}", series_id, err);
                return None;
            }
        }
    }
    for season in &seasons {
        match catalog.get_episodes(series_id, Some(&season.id)).await {
            Ok(found) => episodes.extend(found.into_iter().map(|mut episode| {
                if episode.parent_index_number.is_none() {
                    episode.parent_index_number = season.index_number;
                }
                episode
            })),
            Err(err) => {
                warn!("Failed to fetch episodes of season {}: {}", season.id, err);
                return None;
            }
        }
    }

    episodes.sort_by_key(|episode| sort_key(episode));
    debug!("Fetched {} episodes across {} seasons", episodes.len(), seasons.len());
    Some(episodes)
}

fn sort_key(item: &MediaItem) -> (i32, i32) {
    (
        item.parent_index_number.unwrap_or(i32::MAX),
        item.index_number.unwrap_or(i32::MAX),
    )
}

fn insertion_point(entries: &[QueueEntry], item: &MediaItem) -> usize {
    let key = sort_key(item);
    entries
        .iter()
        .position(|entry| sort_key(&entry.item) > key)
        .unwrap_or(entries.len())
}

/// Episodes whose sources are fetched concurrently during enrichment.
const SOURCE_FETCH_CONCURRENCY: usize = 4;

/// Attach source metadata to each episode, keeping order. Returns `None` when
/// every attempted fetch failed and no episode already carried sources.
async fn enrich(catalog: &dyn MediaCatalog, episodes: Vec<MediaItem>) -> Option<Vec<QueueEntry>> {
    let attempted = episodes
        .iter()
        .filter(|episode| episode.media_sources.is_empty())
        .count();

    let results: Vec<(QueueEntry, bool)> = stream::iter(episodes)
        .map(|mut episode| async move {
            if !episode.media_sources.is_empty() {
                return (QueueEntry::resolved(episode), false);
            }
            match catalog.get_media_sources(&episode.id).await {
                Ok(sources) => {
                    episode.media_sources = sources;
                    (QueueEntry::resolved(episode), false)
                }
                Err(err) => {
                    debug!("No sources for episode {}: {}", episode.id, err);
                    (QueueEntry::resolved(episode), true)
                }
            }
        })
        .buffered(SOURCE_FETCH_CONCURRENCY)
        .collect()
        .await;

    let failed = results.iter().filter(|(_, failed)| *failed).count();
    let entries: Vec<QueueEntry> = results.into_iter().map(|(entry, _)| entry).collect();

    let any_resolved = entries.iter().any(|entry| entry.sources_resolved);
    if entries.is_empty() || (attempted > 0 && failed == attempted && !any_resolved) {
        return None;
    }
    Some(entries)
}
