mod support;

use core_playback::PlaylistManager;
use std::sync::atomic::Ordering;
use support::*;

fn ids(manager: &PlaylistManager) -> Vec<String> {
    manager.snapshot().item_ids
}

#[tokio::test]
async fn series_queue_spans_seasons_in_order() {
    let catalog = FakeCatalog::with_series();
    let manager = PlaylistManager::build(&catalog, &episode("s2e1", "s2", 2, 1)).await;

    assert_eq!(ids(&manager), ["s1e1", "s1e2", "s1e3", "s2e1", "s2e2"]);
    assert_eq!(manager.current_index(), Some(3));
    assert_eq!(manager.series_id(), Some("show"));
    assert!(manager.has_next());
    assert!(manager.has_previous());
    assert!(manager.entries().iter().all(|entry| entry.sources_resolved));
}

#[tokio::test]
async fn season_number_is_filled_from_the_season() {
    let catalog = FakeCatalog::with_series();
    for episode in catalog.episodes.lock().get_mut("s2").unwrap() {
        episode.parent_index_number = None;
    }

    let manager = PlaylistManager::build(&catalog, &episode("s1e1", "s1", 1, 1)).await;
    assert_eq!(ids(&manager), ["s1e1", "s1e2", "s1e3", "s2e1", "s2e2"]);
    assert_eq!(manager.entries()[4].item.parent_index_number, Some(2));
}

#[tokio::test]
async fn failed_source_lookup_keeps_the_episode_unresolved() {
    let catalog = FakeCatalog::with_series();
    catalog.sources.lock().remove("s1e2");

    let manager = PlaylistManager::build(&catalog, &episode("s1e1", "s1", 1, 1)).await;
    assert_eq!(manager.len(), 5);
    let unresolved: Vec<_> = manager
        .entries()
        .iter()
        .filter(|entry| !entry.sources_resolved)
        .map(|entry| entry.item.id.as_str())
        .collect();
    assert_eq!(unresolved, ["s1e2"]);
}

#[tokio::test]
async fn total_enrichment_failure_queues_the_starting_item() {
    let catalog = FakeCatalog::with_series();
    catalog.fail_sources.store(true, Ordering::SeqCst);

    let start = episode("s1e2", "s1", 1, 2);
    let manager = PlaylistManager::build(&catalog, &start).await;
    assert_eq!(ids(&manager), ["s1e2"]);
    assert_eq!(manager.current_index(), Some(0));
    assert!(!manager.has_next());
    assert!(!manager.has_previous());
}

#[tokio::test]
async fn season_lookup_failure_queues_the_starting_item() {
    let catalog = FakeCatalog::with_series();
    catalog.fail_seasons.store(true, Ordering::SeqCst);

    let manager = PlaylistManager::build(&catalog, &episode("s2e2", "s2", 2, 2)).await;
    assert_eq!(ids(&manager), ["s2e2"]);
    assert_eq!(manager.series_id(), None);
}

#[tokio::test]
async fn non_episode_is_a_queue_of_one() {
    let catalog = FakeCatalog::with_series();
    let manager = PlaylistManager::build(&catalog, &movie("m1")).await;

    assert_eq!(ids(&manager), ["m1"]);
    assert_eq!(catalog.source_calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn starting_item_missing_from_listing_is_inserted_in_order() {
    let catalog = FakeCatalog::with_series();
    let mut special = episode("s1e4", "s1", 1, 4);
    special.media_sources = vec![source("s1e4")];

    let manager = PlaylistManager::build(&catalog, &special).await;
    assert_eq!(ids(&manager), ["s1e1", "s1e2", "s1e3", "s1e4", "s2e1", "s2e2"]);
    assert_eq!(manager.current_index(), Some(3));
}

#[tokio::test]
async fn series_without_seasons_lists_all_episodes() {
    let catalog = FakeCatalog::with_series();
    catalog.seasons.lock().clear();

    let manager = PlaylistManager::build(&catalog, &episode("s1e3", "s1", 1, 3)).await;
    assert_eq!(ids(&manager), ["s1e1", "s1e2", "s1e3", "s2e1", "s2e2"]);
    assert_eq!(manager.current_index(), Some(2));
}

#[tokio::test]
async fn snapshot_serializes_for_hosts() {
    let catalog = FakeCatalog::with_series();
    let mut manager = PlaylistManager::build(&catalog, &episode("s1e3", "s1", 1, 3)).await;
    manager.next();

    let json = serde_json::to_value(manager.snapshot()).unwrap();
    assert_eq!(json["current_index"], 3);
    assert_eq!(json["series_id"], "show");
    assert_eq!(json["has_next"], true);
}
