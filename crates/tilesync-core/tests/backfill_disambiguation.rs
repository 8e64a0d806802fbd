//! Backfill and disambiguation behavior over the in-memory cache.

use std::collections::HashMap;

use proptest::prelude::*;

use tilesync_core::identity;
use tilesync_core::tracking::CapturingSink;
use tilesync_core::{
    Attachment, Dataset, FeedTile, MemoryPinnedCache, PinnedTile, ReconciliationEngine,
    TileConfig, UrlGuess,
};

fn feed_tile(id: &str, url: &str, label: &str, location: &str) -> FeedTile {
    FeedTile {
        id: id.to_string(),
        url: url.to_string(),
        label: label.to_string(),
        attachment: Some(Attachment {
            location: Some(location.to_string()),
        }),
    }
}

fn engine(
    cache: MemoryPinnedCache,
) -> ReconciliationEngine<MemoryPinnedCache, CapturingSink> {
    ReconciliationEngine::new(TileConfig::default(), cache, CapturingSink::new())
}

/// A cached tile whose thumbnail lives under the given prefix but carries
/// no position marker.
fn markerless_tile(url: &str, thumbnail_name: &str) -> PinnedTile {
    PinnedTile {
        url: url.to_string(),
        label: format!("cached {url}"),
        asset_url: Some(format!(
            "https://offlintab.firefoxchina.cn/data/thumbnails/{thumbnail_name}"
        )),
    }
}

#[tokio::test]
async fn url_match_backfills_exactly_one_slot() {
    let config = TileConfig::default();
    let upstream = feed_tile("5", "https://m5", "M5", "/a5.png");
    // Same url as upstream, managed asset, but no recoverable marker.
    let stranded = PinnedTile {
        url: "https://m5".to_string(),
        label: "Old label".to_string(),
        asset_url: Some(format!("{}/legacy/shot.png", config.attachment_base)),
    };
    let cache =
        MemoryPinnedCache::with_pins(vec![None, None, None, Some(stranded)]);
    let engine = engine(cache);
    let mut dataset = Dataset {
        current: vec![upstream.clone()],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    assert_eq!(
        engine.cache().pins()[3].as_ref(),
        Some(&identity::normalize(&config, &upstream))
    );
    assert_eq!(
        engine.tracking().values_for("backfill"),
        vec![("defaultPosition".to_string(), "3".to_string())]
    );
    assert_eq!(engine.cache().expire_count(), 1);
    assert_eq!(engine.cache().refreshes(), vec![true]);
}

#[tokio::test]
async fn ambiguous_guess_blocks_the_backfill() {
    // Thumbnail prefix shipped at four historical positions.
    let cache = MemoryPinnedCache::with_pins(vec![Some(markerless_tile(
        "https://cached",
        "70199cba-reused.png",
    ))]);
    let engine = engine(cache);
    let pins_before = engine.cache().pins();
    let mut dataset = Dataset {
        current: vec![feed_tile("4", "https://m4", "M4", "/a4.png")],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    assert!(dataset.updated.is_empty());
    assert_eq!(engine.cache().pins(), pins_before);
    assert_eq!(
        engine.tracking().values_for("backfill"),
        vec![
            ("status".to_string(), "0|0".to_string()),
            ("blocked".to_string(), "1|0|0|0".to_string()),
        ]
    );
}

#[tokio::test]
async fn unknown_prefix_blocks_and_is_reported() {
    let cache = MemoryPinnedCache::with_pins(vec![Some(markerless_tile(
        "https://cached",
        "deadbeef-unknown.png",
    ))]);
    let engine = engine(cache);
    let mut dataset = Dataset {
        current: vec![feed_tile("4", "https://m4", "M4", "/a4.png")],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    assert!(dataset.updated.is_empty());
    assert_eq!(
        engine.tracking().values_for("backfill"),
        vec![
            ("unknownPrefix".to_string(), "deadbeef".to_string()),
            ("status".to_string(), "0|1".to_string()),
            ("blocked".to_string(), "0|0|0|1".to_string()),
        ]
    );
}

#[tokio::test]
async fn singular_ambiguity_is_corrected_and_reconciled_once() {
    let config = TileConfig::default();
    let placed = feed_tile("0", "https://m0", "M0", "/a0.png");
    let missing = feed_tile("1", "https://m1", "M1", "/a1.png");
    let cache = MemoryPinnedCache::with_pins(vec![
        // Marker resolves: this tile is already placed.
        Some(identity::normalize(&config, &placed)),
        // Ambiguous prefix, no marker: the troublesome guess.
        Some(markerless_tile("https://legacy", "70199cba-reused.png")),
    ]);
    let engine = engine(cache);
    let mut dataset = Dataset {
        current: vec![placed, missing.clone()],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    // The one unresolved guess was rewritten to the one still-missing
    // position, turned into a rename hint, and reconciled.
    assert_eq!(dataset.updated.len(), 1);
    assert_eq!(dataset.updated[0].old_url, "https://legacy");
    assert_eq!(dataset.updated[0].new_id, "1");
    assert_eq!(
        engine.cache().pins()[1].as_ref(),
        Some(&identity::normalize(&config, &missing))
    );
    assert_eq!(
        engine.tracking().values_for("backfill"),
        vec![
            ("missing1".to_string(), "1".to_string()),
            ("status".to_string(), "-1|0".to_string()),
            ("handled".to_string(), "1".to_string()),
        ]
    );
    assert_eq!(
        engine.tracking().values_for("update"),
        vec![("0|1|0|1|0".to_string(), String::new())]
    );
}

#[tokio::test]
async fn duplicate_matches_are_reported_and_never_acted_on() {
    let cache = MemoryPinnedCache::with_pins(vec![
        Some(markerless_tile("https://first", "05d144db-a.png")),
        Some(markerless_tile("https://second", "05d144db-b.png")),
    ]);
    let engine = engine(cache);
    let pins_before = engine.cache().pins();
    let mut dataset = Dataset {
        current: vec![feed_tile("6", "https://m6", "M6", "/a6.png")],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    assert!(dataset.updated.is_empty());
    assert_eq!(engine.cache().pins(), pins_before);
    assert_eq!(
        engine.tracking().values_for("backfill"),
        vec![
            ("status".to_string(), "0|0".to_string()),
            ("duplicated".to_string(), "6".to_string()),
        ]
    );
}

#[tokio::test]
async fn backfill_without_evidence_is_a_no_op() {
    let cache = MemoryPinnedCache::with_pins(vec![Some(PinnedTile {
        url: "https://user".to_string(),
        label: "Mine".to_string(),
        asset_url: None,
    })]);
    let engine = engine(cache);
    let pins_before = engine.cache().pins();
    let mut dataset = Dataset {
        current: vec![feed_tile("4", "https://m4", "M4", "/a4.png")],
        updated: Vec::new(),
    };

    engine.handle_backfill(&mut dataset).await.unwrap();

    assert_eq!(engine.cache().pins(), pins_before);
    assert!(engine.tracking().events().is_empty());
    assert!(dataset.updated.is_empty());
}

proptest! {
    /// With two or more unresolved guesses the precondition can never
    /// hold: the dataset must stay unmutated and the pass must not be
    /// re-run.
    #[test]
    fn multiple_unresolved_guesses_never_mutate_the_dataset(
        ambiguous_count in 2usize..6,
        missing_count in 1usize..4,
    ) {
        let config = TileConfig::default();
        let engine = ReconciliationEngine::new(
            config.clone(),
            MemoryPinnedCache::with_pins(vec![None]),
            CapturingSink::new(),
        );

        let current: Vec<FeedTile> = (0..missing_count)
            .map(|i| feed_tile(&i.to_string(), &format!("https://m{i}"), "M", "/m.png"))
            .collect();
        let missing_by_id: HashMap<String, PinnedTile> = current
            .iter()
            .map(|tile| (tile.id.clone(), identity::normalize(&config, tile)))
            .collect();
        let guesses: Vec<UrlGuess> = (0..ambiguous_count)
            .map(|i| UrlGuess {
                url: format!("https://guess{i}"),
                positions: Some(vec![0, 1]),
            })
            .collect();

        let mut dataset = Dataset { current, updated: Vec::new() };
        let mutated = futures::executor::block_on(engine.maybe_fake_update(
            &mut dataset,
            guesses,
            &missing_by_id,
        ))
        .unwrap();

        prop_assert!(!mutated);
        prop_assert!(dataset.updated.is_empty());
        // Blocked diagnostics are reported instead.
        prop_assert_eq!(engine.tracking().values_for("backfill").len(), 2);
    }
}
