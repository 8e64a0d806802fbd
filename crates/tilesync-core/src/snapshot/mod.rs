//! Lookup maps over one upstream snapshot, restricted to managed tiles.

use std::collections::HashMap;

use crate::config::TileConfig;
use crate::identity;
use crate::model::{FeedTile, PinnedTile};

/// Indexes the `current` half of a dataset for one reconciliation pass.
///
/// Only tiles whose [`identity::normalize`] result carries an asset
/// reference are included; everything else is outside this engine's remit.
/// Later duplicate ids or urls overwrite earlier ones (last-write-wins):
/// upstream lists at most one canonical tile per id, and callers must not
/// rely on input ordering.
#[derive(Debug, Default)]
pub struct SnapshotIndex {
    /// Normalized tile per upstream id.
    pub by_id: HashMap<String, PinnedTile>,

    /// Upstream id per tile url.
    pub id_by_url: HashMap<String, String>,
}

impl SnapshotIndex {
    /// Builds both maps over `current`.
    #[must_use]
    pub fn build(config: &TileConfig, current: &[FeedTile]) -> Self {
        let mut index = Self::default();
        for tile in current {
            let normalized = identity::normalize(config, tile);
            if normalized.asset_url.is_none() {
                continue;
            }

            index.id_by_url.insert(tile.url.clone(), tile.id.clone());
            index.by_id.insert(tile.id.clone(), normalized);
        }
        index
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Attachment;

    fn feed_tile(id: &str, url: &str, location: Option<&str>) -> FeedTile {
        FeedTile {
            id: id.to_string(),
            url: url.to_string(),
            label: format!("label-{id}"),
            attachment: location.map(|location| Attachment {
                location: Some(location.to_string()),
            }),
        }
    }

    #[test]
    fn unmanaged_tiles_are_excluded() {
        let config = TileConfig::default();
        let current = vec![
            feed_tile("0", "https://a", Some("/a.png")),
            feed_tile("1", "https://b", None),
        ];

        let index = SnapshotIndex::build(&config, &current);

        assert_eq!(index.by_id.len(), 1);
        assert!(index.by_id.contains_key("0"));
        assert_eq!(index.id_by_url.get("https://a"), Some(&"0".to_string()));
        assert!(!index.id_by_url.contains_key("https://b"));
    }

    #[test]
    fn later_duplicates_win() {
        let config = TileConfig::default();
        let current = vec![
            feed_tile("0", "https://a", Some("/first.png")),
            feed_tile("0", "https://b", Some("/second.png")),
        ];

        let index = SnapshotIndex::build(&config, &current);

        let tile = index.by_id.get("0").expect("id should be indexed");
        assert_eq!(tile.url, "https://b");
        assert_eq!(index.id_by_url.len(), 2);
        assert_eq!(index.id_by_url.get("https://b"), Some(&"0".to_string()));
    }
}
