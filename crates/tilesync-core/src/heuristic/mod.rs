//! Prefix-table position guessing for tiles without a recoverable marker.
//!
//! Used only when a pass has no explicit id or rename evidence for a cached
//! slot. The guess maps the first eight characters of the thumbnail filename
//! to the configured candidate positions; more than one candidate is an
//! explicit ambiguity signal, not an error.

use crate::config::TileConfig;
use crate::model::PinnedTile;

/// Prefix reported when the asset does not live under any known thumbnail
/// path root.
pub const UNKNOWN_PREFIX: &str = "(notset)";

/// Result of one prefix lookup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixGuess {
    /// Candidate default positions; `None` when the prefix is not in the
    /// table (callers must report this, never drop it silently).
    pub positions: Option<Vec<usize>>,

    /// The eight-character thumbnail prefix, or [`UNKNOWN_PREFIX`].
    pub prefix: String,
}

/// Guesses the default positions a cached tile may have been shipped at.
#[must_use]
pub fn guess_default_position(config: &TileConfig, tile: &PinnedTile) -> PrefixGuess {
    let asset = tile.asset_url.as_deref().unwrap_or_default();

    for path in &config.thumbnail_paths {
        let root = format!("{}{}", config.attachment_base, path);
        if let Some(rest) = asset.strip_prefix(&root) {
            let prefix: String = rest.chars().take(8).collect();
            return PrefixGuess {
                positions: config.backfill_prefixes.get(&prefix).cloned(),
                prefix,
            };
        }
    }

    PrefixGuess {
        positions: None,
        prefix: UNKNOWN_PREFIX.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cached_tile(asset_url: &str) -> PinnedTile {
        PinnedTile {
            url: "https://cached.example".to_string(),
            label: "cached".to_string(),
            asset_url: Some(asset_url.to_string()),
        }
    }

    #[test]
    fn known_prefix_yields_candidates() {
        let config = TileConfig::default();
        let tile = cached_tile(
            "https://offlintab.firefoxchina.cn/data/thumbnails/05d144db-anything.png",
        );

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.prefix, "05d144db");
        assert_eq!(guess.positions, Some(vec![6]));
    }

    #[test]
    fn reused_thumbnail_is_ambiguous() {
        let config = TileConfig::default();
        let tile = cached_tile(
            "https://offlintab.firefoxchina.cn/data/thumbnails/70199cba-reused.png",
        );

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.positions, Some(vec![4, 6, 7, 5]));
    }

    #[test]
    fn icon_path_root_is_recognized() {
        let config = TileConfig::default();
        let tile = cached_tile(
            "https://offlintab.firefoxchina.cn/static/img/as-icons/910f7dca-icon.png",
        );

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.prefix, "910f7dca");
        assert_eq!(guess.positions, Some(vec![2]));
    }

    #[test]
    fn unknown_prefix_has_no_candidates() {
        let config = TileConfig::default();
        let tile = cached_tile(
            "https://offlintab.firefoxchina.cn/data/thumbnails/deadbeef-unknown.png",
        );

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.prefix, "deadbeef");
        assert_eq!(guess.positions, None);
    }

    #[test]
    fn foreign_path_is_notset() {
        let config = TileConfig::default();
        let tile = cached_tile("https://offlintab.firefoxchina.cn/elsewhere/x.png");

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.prefix, UNKNOWN_PREFIX);
        assert_eq!(guess.positions, None);
    }

    #[test]
    fn short_filename_is_looked_up_as_is() {
        let config = TileConfig::default();
        let tile = cached_tile("https://offlintab.firefoxchina.cn/data/thumbnails/ab");

        let guess = guess_default_position(&config, &tile);

        assert_eq!(guess.prefix, "ab");
        assert_eq!(guess.positions, None);
    }
}
