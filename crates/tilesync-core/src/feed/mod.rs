//! Upstream dial-feed parsing and change detection.
//!
//! The feed publishes a JSON object keyed by index whose values are raw
//! "dial" records. This module converts those into [`FeedTile`]s and turns
//! observed old/new record pairs into the [`RenameHint`]s a pass consumes.
//! Fetch scheduling and retry live with the transport, not here.

use std::collections::BTreeMap;

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::model::{Attachment, FeedTile, RenameHint};

/// Errors raised while decoding the upstream payload.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FeedError {
    /// The dial payload is not the expected JSON shape.
    #[error("dial payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Raw dial record as published by the upstream feed.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DialRecord {
    /// Destination url.
    pub url: String,

    /// Display title.
    pub title: String,

    /// Thumbnail path under the attachment host.
    #[serde(default)]
    pub thumbnail: Option<String>,

    /// One-based default position, as a string.
    pub defaultposition: String,
}

/// One stored-record change as observed by the feed collector.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ChangeRecord {
    /// Record before the change; absent for newly created entries.
    #[serde(default)]
    pub old: Option<FeedTile>,

    /// Record after the change; absent for deleted entries.
    #[serde(default)]
    pub new: Option<FeedTile>,
}

/// Parses the upstream payload (an object keyed by numeric index) into feed
/// tiles, in index order.
pub fn parse_dials(payload: &str) -> Result<Vec<FeedTile>, FeedError> {
    let dials: BTreeMap<usize, DialRecord> = serde_json::from_str(payload)?;
    Ok(dials.into_values().map(convert_dial).collect())
}

/// Converts one raw dial into the tile shape the engine consumes.
///
/// Upstream positions are one-based; slot ids are zero-based. A position
/// that does not parse yields an empty id, which normalization already
/// treats as unmanaged.
#[must_use]
pub fn convert_dial(dial: DialRecord) -> FeedTile {
    let id = dial
        .defaultposition
        .trim()
        .parse::<i64>()
        .map(|position| (position - 1).to_string())
        .unwrap_or_default();

    FeedTile {
        id,
        url: dial.url,
        label: dial.title,
        attachment: dial.thumbnail.map(|location| Attachment {
            location: Some(location),
        }),
    }
}

/// True when a change pair carries a real difference worth reconciling.
///
/// Pairs without an old record are new entries and route through the
/// created path instead of an update.
#[must_use]
pub fn is_really_updated(change: &ChangeRecord) -> bool {
    let Some(old) = &change.old else {
        return false;
    };
    let Some(new) = &change.new else {
        return true;
    };

    !(old.id == new.id
        && old.label == new.label
        && old.url == new.url
        && old.attachment_location() == new.attachment_location())
}

/// Converts observed change pairs into the rename hints for one pass.
///
/// Deleted entries (no new record) carry no id to point at and produce no
/// hint.
#[must_use]
pub fn rename_hints(changes: &[ChangeRecord]) -> Vec<RenameHint> {
    changes
        .iter()
        .filter(|change| is_really_updated(change))
        .filter_map(|change| {
            let old = change.old.as_ref()?;
            let Some(new) = change.new.as_ref() else {
                debug!(url = %old.url, "dropped change pair without a new record");
                return None;
            };
            Some(RenameHint {
                old_url: old.url.clone(),
                new_id: new.id.clone(),
            })
        })
        .collect()
}
