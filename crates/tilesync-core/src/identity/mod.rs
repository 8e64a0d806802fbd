//! Identity mapping between upstream tiles and managed pinned tiles.
//!
//! A managed tile's asset reference embeds the tile's default position as a
//! query parameter, so a later pass can recover the originating upstream id
//! even after the feed republishes the tile under a different identifier.
//! The marker must round-trip: [`default_position`] applied to a
//! [`normalize`] result yields the original id.

use url::Url;

use crate::config::TileConfig;
use crate::model::{FeedTile, PinnedTile};

/// Query parameter carrying the default-position marker.
pub const POSITION_PARAM: &str = "pos";

/// Converts one upstream tile into the pinned shape this engine manages.
///
/// Produces `asset_url = None` when the tile has no attachment location or
/// no id; such tiles are unmanaged and must never be treated as manageable.
/// Pure, side-effect-free.
#[must_use]
pub fn normalize(config: &TileConfig, tile: &FeedTile) -> PinnedTile {
    let asset_url = tile
        .attachment_location()
        .filter(|location| !location.is_empty() && !tile.id.is_empty())
        .map(|location| {
            format!(
                "{}{}?{}={}",
                config.attachment_base, location, POSITION_PARAM, tile.id
            )
        });

    PinnedTile {
        url: tile.url.clone(),
        label: tile.label.clone(),
        asset_url,
    }
}

/// Extracts the default-position marker embedded in a tile's asset
/// reference. Any parse failure, missing marker, or empty marker value
/// yields `None`.
#[must_use]
pub fn default_position(tile: &PinnedTile) -> Option<String> {
    let asset = tile.asset_url.as_deref()?;
    let parsed = Url::parse(asset).ok()?;
    parsed
        .query_pairs()
        .find(|(key, _)| key == POSITION_PARAM)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

/// True when the tile's asset reference was generated by this engine.
///
/// Unmanaged tiles (user-supplied asset, or none at all) are opaque to
/// reconciliation and never mutated.
#[must_use]
pub fn is_managed(config: &TileConfig, tile: &PinnedTile) -> bool {
    tile.asset_url
        .as_deref()
        .is_some_and(|asset| asset.starts_with(&config.attachment_base))
}
