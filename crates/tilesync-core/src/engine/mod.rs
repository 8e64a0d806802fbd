//! Reconciliation passes over the persisted pinned-slot cache.
//!
//! One upstream dataset event drives one pass. The engine routes the event
//! (first population vs. update), classifies every cached slot, applies the
//! minimal set of in-place writes, and reports aggregate diagnostics. When
//! a pass has no explicit rename evidence it falls back to backfill, which
//! may invoke a single bounded disambiguation step.
//!
//! # Design Principles
//!
//! - **User-edited slots are opaque**: a slot without an engine-generated
//!   asset reference is never mutated, whatever upstream says.
//! - **Fail open per slot, fail closed on ambiguity**: a failed slot write
//!   is logged and isolated; an ambiguous backfill guess blocks the whole
//!   backfill for the pass.
//! - **Slot order is display order**: reconciliation overwrites slots in
//!   place and never reorders them.
//!
//! # Invariants
//!
//! - [INV-PASS-001] Every classified slot is either left untouched or
//!   written back exactly once per pass.
//! - [INV-PASS-002] Disambiguation mutates the dataset only in the single
//!   fully-determined case, and re-runs reconciliation at most once.
//! - [INV-PASS-003] The aggregate `update` diagnostic is emitted exactly
//!   once per direct-reconciliation pass, whether or not the pass failed.

mod backfill;
mod counts;
mod disambiguate;

pub use counts::{SlotDisposition, UpdateCounts};
pub use disambiguate::UrlGuess;

use std::collections::HashMap;

use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, warn};

use crate::cache::{CacheError, PinnedCache};
use crate::config::TileConfig;
use crate::identity;
use crate::model::{Dataset, PinnedTile};
use crate::snapshot::SnapshotIndex;
use crate::tracking::{TRACKING_CATEGORY, TRACKING_SUBJECT, TrackingSink};

/// Errors that abort a reconciliation pass.
///
/// Per-slot write failures are not here: they are logged, isolated, and
/// absorbed into the pass diagnostics.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum EngineError {
    /// The pinned cache failed outside an isolated slot write.
    #[error("pinned cache operation failed: {0}")]
    Cache(#[from] CacheError),
}

/// Reconciles the persisted pinned slots against upstream dataset events.
pub struct ReconciliationEngine<C, T> {
    config: TileConfig,
    cache: C,
    tracking: T,
}

impl<C: PinnedCache, T: TrackingSink> ReconciliationEngine<C, T> {
    /// Creates an engine over the given collaborators.
    pub fn new(config: TileConfig, cache: C, tracking: T) -> Self {
        Self {
            config,
            cache,
            tracking,
        }
    }

    /// The engine's configuration.
    pub fn config(&self) -> &TileConfig {
        &self.config
    }

    /// The pinned cache this engine writes through.
    pub fn cache(&self) -> &C {
        &self.cache
    }

    /// The tracking sink this engine reports through.
    pub fn tracking(&self) -> &T {
        &self.tracking
    }

    /// Entry point for one upstream dataset event.
    ///
    /// An absent payload is a no-op. A cache that was never populated (or
    /// holds the empty-sequence sentinel) routes to first population;
    /// everything else routes to an update pass.
    pub async fn handle_event(&self, dataset: Option<Dataset>) -> Result<(), EngineError> {
        let Some(mut dataset) = dataset else {
            debug!("empty dataset event, nothing to reconcile");
            return Ok(());
        };

        if self.cache.is_populated().await? {
            self.handle_updated(&mut dataset).await
        } else {
            self.handle_created(&dataset).await
        }
    }

    /// First population: places every managed tile at its id-named slot and
    /// persists the sparse sequence as the new baseline.
    pub async fn handle_created(&self, dataset: &Dataset) -> Result<(), EngineError> {
        let mut pinned: Vec<Option<PinnedTile>> = Vec::new();
        for tile in &dataset.current {
            let normalized = identity::normalize(&self.config, tile);
            if normalized.asset_url.is_none() {
                continue;
            }

            let Ok(slot) = tile.id.parse::<usize>() else {
                warn!(id = %tile.id, "current tile id is not a slot index, skipped");
                continue;
            };
            if pinned.len() <= slot {
                pinned.resize(slot + 1, None);
            }
            pinned[slot] = Some(normalized);
        }

        self.cache.store_baseline(&pinned).await?;
        self.cache.expire().await?;
        self.cache.refresh(true).await?;
        Ok(())
    }

    /// Update pass: explicit rename evidence goes through direct
    /// reconciliation, otherwise the pass tries to backfill.
    pub async fn handle_updated(&self, dataset: &mut Dataset) -> Result<(), EngineError> {
        if dataset.updated.is_empty() {
            self.handle_backfill(dataset).await
        } else {
            self.reconcile_direct(dataset).await
        }
    }

    /// Classifies and rewrites every cached slot against the snapshot,
    /// suspending profile sync of the baseline for the duration.
    async fn reconcile_direct(&self, dataset: &Dataset) -> Result<(), EngineError> {
        let index = SnapshotIndex::build(&self.config, &dataset.current);
        let renamed_id_by_old_url: HashMap<&str, &str> = dataset
            .updated
            .iter()
            .map(|hint| (hint.old_url.as_str(), hint.new_id.as_str()))
            .collect();

        // Keep sync from replicating the intermediate slot states below.
        let previous_sync = match self.cache.set_sync(false).await {
            Ok(previous) => Some(previous),
            Err(error) => {
                warn!(%error, "could not suspend pinned sync");
                None
            }
        };

        let result = self.reconcile_slots(&index, &renamed_id_by_old_url).await;

        if let Some(previous) = previous_sync {
            if let Err(error) = self.cache.set_sync(previous).await {
                warn!(%error, "could not restore pinned sync");
            }
        }

        let counts = match &result {
            Ok(counts) => *counts,
            Err(_) => UpdateCounts::default(),
        };
        self.send_tracking("update", &counts.as_metric(), "");

        result.map(|_| ())
    }

    async fn reconcile_slots(
        &self,
        index: &SnapshotIndex,
        renamed_id_by_old_url: &HashMap<&str, &str>,
    ) -> Result<UpdateCounts, EngineError> {
        let cached = self.cache.request().await?;

        // Writes target disjoint slots; issue them together and let each
        // failure stay its own.
        let dispositions = join_all(
            cached
                .into_iter()
                .enumerate()
                .map(|(slot, tile)| self.reconcile_slot(slot, tile, index, renamed_id_by_old_url)),
        )
        .await;

        let mut counts = UpdateCounts::default();
        for disposition in dispositions.into_iter().flatten() {
            counts.tally(disposition);
        }
        Ok(counts)
    }

    /// Classifies one slot and applies its write, if any. Returns `None`
    /// when a write failed, so the slot contributes nothing to the counts.
    async fn reconcile_slot(
        &self,
        slot: usize,
        cached: Option<PinnedTile>,
        index: &SnapshotIndex,
        renamed_id_by_old_url: &HashMap<&str, &str>,
    ) -> Option<SlotDisposition> {
        let Some(cached) = cached else {
            return Some(SlotDisposition::UserEdited);
        };
        if !identity::is_managed(&self.config, &cached) {
            return Some(SlotDisposition::UserEdited);
        }
        let cached_asset = cached.asset_url.as_deref().unwrap_or_default();

        if cached_asset == self.config.corrupt_asset_url() {
            let repaired = PinnedTile {
                url: cached.url.clone(),
                label: cached.label.clone(),
                asset_url: None,
            };
            return match self.cache.write(slot, repaired).await {
                Ok(()) => Some(SlotDisposition::KnownDefect),
                Err(error) => {
                    warn!(slot, %error, "repair of corrupt slot failed");
                    None
                }
            };
        }

        let resolved_id = identity::default_position(&cached)
            .or_else(|| {
                renamed_id_by_old_url
                    .get(cached.url.as_str())
                    .map(|id| (*id).to_string())
            })
            .or_else(|| index.id_by_url.get(&cached.url).cloned());
        let Some(tile) = resolved_id.as_deref().and_then(|id| index.by_id.get(id)) else {
            return Some(SlotDisposition::NoMatch);
        };

        let fresh_asset = tile.asset_url.as_deref().unwrap_or_default();
        if fresh_asset.starts_with(cached_asset)
            && tile.label == cached.label
            && tile.url == cached.url
        {
            return Some(SlotDisposition::Current);
        }

        debug!(slot, from = %cached.url, to = %tile.url, "rewriting stale pinned slot");
        match self.cache.write(slot, tile.clone()).await {
            Ok(()) => Some(SlotDisposition::Updated),
            Err(error) => {
                warn!(slot, %error, "slot write failed");
                None
            }
        }
    }

    pub(crate) fn send_tracking(&self, event: &str, value: &str, extra: &str) {
        self.tracking
            .record(TRACKING_CATEGORY, event, TRACKING_SUBJECT, value, extra);
    }
}
