//! Backfill: assigning still-unplaced managed tiles to unresolved slots.
//!
//! Runs only when a pass carries no explicit rename evidence. At most one
//! slot is backfilled per pass; everything else either resolves through its
//! embedded marker, matches by url, or becomes a prefix guess for the
//! disambiguation step.

use crate::cache::PinnedCache;
use crate::engine::disambiguate::UrlGuess;
use crate::engine::{EngineError, ReconciliationEngine};
use crate::heuristic;
use crate::identity;
use crate::model::{Dataset, PinnedTile};
use crate::snapshot::SnapshotIndex;
use crate::tracking::TrackingSink;

struct BackfillCandidate {
    slot: usize,
    tile: PinnedTile,
}

impl<C: PinnedCache, T: TrackingSink> ReconciliationEngine<C, T> {
    /// Backfill pass: computes the managed tiles missing from the cache and
    /// either places exactly one of them or hands the ambiguity to
    /// disambiguation.
    pub async fn handle_backfill(&self, dataset: &mut Dataset) -> Result<(), EngineError> {
        let index = SnapshotIndex::build(&self.config, &dataset.current);
        let mut missing_by_id = index.by_id.clone();
        let mut candidate: Option<BackfillCandidate> = None;
        let mut guesses: Vec<UrlGuess> = Vec::new();

        let cached = self.cache.request().await?;
        for (slot, cached_tile) in cached.iter().enumerate() {
            let Some(tile) = cached_tile else { continue };
            if !identity::is_managed(&self.config, tile) {
                continue;
            }

            // A recoverable marker means the tile is already placed.
            if let Some(position) = identity::default_position(tile) {
                missing_by_id.remove(&position);
                continue;
            }

            if let Some(id) = index.id_by_url.get(&tile.url) {
                if let Some(missing_tile) = missing_by_id.get(id).cloned() {
                    missing_by_id.remove(id);
                    // One backfill per pass; the first match in slot order wins.
                    if candidate.is_none() {
                        candidate = Some(BackfillCandidate {
                            slot,
                            tile: missing_tile,
                        });
                    }
                    continue;
                }
            }

            let guess = heuristic::guess_default_position(&self.config, tile);
            if guess.positions.is_none() {
                self.send_tracking("backfill", "unknownPrefix", &guess.prefix);
            }
            guesses.push(UrlGuess {
                url: tile.url.clone(),
                positions: guess.positions,
            });
        }

        if !guesses.is_empty()
            && self
                .maybe_fake_update(dataset, guesses, &missing_by_id)
                .await?
        {
            // Disambiguation already reconciled the pass.
            return Ok(());
        }
        let Some(candidate) = candidate else {
            return Ok(());
        };

        self.cache.write(candidate.slot, candidate.tile).await?;
        self.send_tracking("backfill", "defaultPosition", &candidate.slot.to_string());
        self.cache.expire().await?;
        self.cache.refresh(true).await?;
        Ok(())
    }
}
