//! Wire and cache data model shared by the reconciliation engine.
//!
//! `FeedTile`, `RenameHint` and `Dataset` mirror what the upstream feed
//! delivers for one pass; `PinnedTile` is the shape persisted per slot by the
//! host's tile storage. A `Dataset` is ephemeral and only valid for the pass
//! it was delivered for.

use serde::{Deserialize, Serialize};

/// One pinned slot as persisted by the host's tile storage.
///
/// Slots are held in an ordered sequence (`Vec<Option<PinnedTile>>`); the
/// index is the display position and holes are empty slots. Reconciliation
/// only ever overwrites slots in place, never reorders them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PinnedTile {
    /// Destination the tile points at.
    pub url: String,

    /// Display label.
    pub label: String,

    /// Generated asset reference, carrying the embedded default-position
    /// marker. `None` marks a user-edited tile that reconciliation must
    /// never touch.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_url: Option<String>,
}

/// Attachment metadata on an upstream tile.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    /// Path of the tile's thumbnail under the attachment host.
    #[serde(default)]
    pub location: Option<String>,
}

/// One tile as delivered in the upstream snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedTile {
    /// Upstream identifier; doubles as the default slot position.
    pub id: String,

    /// Destination url.
    pub url: String,

    /// Display label.
    pub label: String,

    /// Thumbnail attachment; absent for tiles this engine does not manage.
    #[serde(default)]
    pub attachment: Option<Attachment>,
}

/// An explicit claim from the feed that the tile previously reachable at
/// `old_url` is now identified by `new_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenameHint {
    /// Url the renamed tile was previously published under.
    pub old_url: String,

    /// Identifier the tile is now published under.
    pub new_id: String,
}

/// One upstream dataset event: the canonical snapshot plus any rename hints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dataset {
    /// The full current snapshot, in upstream order.
    #[serde(default)]
    pub current: Vec<FeedTile>,

    /// Rename hints observed since the last snapshot. Empty means the pass
    /// has no explicit identity evidence and may fall back to backfill.
    #[serde(default)]
    pub updated: Vec<RenameHint>,
}

impl FeedTile {
    /// Attachment location, when present and usable.
    #[must_use]
    pub fn attachment_location(&self) -> Option<&str> {
        self.attachment.as_ref().and_then(|a| a.location.as_deref())
    }
}
