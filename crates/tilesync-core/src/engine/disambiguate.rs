//! Single-step disambiguation of ambiguous backfill guesses.
//!
//! Guesses that cannot be applied directly (multiple candidates, a
//! candidate that is not missing, or no candidate at all) normally block
//! the backfill. There is exactly one shape the engine will self-correct:
//! one troublesome guess, every other missing tile accounted for, and a
//! single still-missing position that the troublesome guess must therefore
//! mean. That case is rewritten into an explicit rename hint and the pass
//! re-runs direct reconciliation once. Everything else is reported and
//! left alone; ambiguity is never guessed at scale.

use std::collections::{BTreeMap, HashMap};

use crate::cache::PinnedCache;
use crate::engine::{EngineError, ReconciliationEngine};
use crate::model::{Dataset, FeedTile, PinnedTile, RenameHint};
use crate::tracking::TrackingSink;

/// One cached slot's position guess, keyed by the slot's url.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlGuess {
    /// Url of the cached tile the guess is for.
    pub url: String,

    /// Candidate positions from the prefix table; `None` when the prefix
    /// was unknown.
    pub positions: Option<Vec<usize>>,
}

/// Tally of one round of guesses against the missing set.
struct GuessTally {
    /// Urls whose guess has more than one candidate.
    ambiguous: Vec<String>,

    /// Urls whose single candidate is not missing.
    conflict: Vec<String>,

    /// Urls with no candidate at all.
    no_idea: Vec<String>,

    /// Guess multiplicity per matched missing position.
    matched: BTreeMap<usize, u32>,

    /// Per-position row over `current`: `0` missing and unguessed, digits
    /// count guesses on a missing position (capped at 9), `-` placed, `*`
    /// guessed on a placed position.
    status: Vec<char>,
}

impl GuessTally {
    fn over(
        current: &[FeedTile],
        guesses: &[UrlGuess],
        missing_by_id: &HashMap<String, PinnedTile>,
    ) -> Self {
        let status = current
            .iter()
            .map(|tile| {
                if missing_by_id.contains_key(&tile.id) {
                    '0'
                } else {
                    '-'
                }
            })
            .collect();
        let mut tally = Self {
            ambiguous: Vec::new(),
            conflict: Vec::new(),
            no_idea: Vec::new(),
            matched: BTreeMap::new(),
            status,
        };

        for guess in guesses {
            let Some(positions) = guess.positions.as_deref().filter(|p| !p.is_empty()) else {
                tally.no_idea.push(guess.url.clone());
                continue;
            };
            if positions.len() > 1 {
                tally.ambiguous.push(guess.url.clone());
                continue;
            }
            let position = positions[0];

            if let Some(cell) = tally.status.get_mut(position) {
                *cell = match *cell {
                    '-' | '*' => '*',
                    digit => digit
                        .to_digit(10)
                        .and_then(|count| char::from_digit((count + 1).min(9), 10))
                        .unwrap_or('9'),
                };
            }

            if missing_by_id.contains_key(&position.to_string()) {
                *tally.matched.entry(position).or_insert(0) += 1;
            } else {
                tally.conflict.push(guess.url.clone());
            }
        }

        tally
    }

    fn unresolved(&self) -> usize {
        self.ambiguous.len() + self.conflict.len() + self.no_idea.len()
    }

    /// The troublesome url, meaningful when exactly one guess is unresolved.
    fn troublesome_url(&self) -> Option<&str> {
        self.ambiguous
            .first()
            .or_else(|| self.conflict.first())
            .or_else(|| self.no_idea.first())
            .map(String::as_str)
    }

    /// Index of the single still-unaccounted position, when the round is
    /// one correction away from fully determined.
    fn implied_position(&self, missing_by_id: &HashMap<String, PinnedTile>) -> Option<usize> {
        if self.unresolved() != 1
            || self.matched.len() + 1 != missing_by_id.len()
            || self.status.iter().filter(|&&cell| cell == '0').count() != 1
        {
            return None;
        }

        let implied = self.status.iter().position(|&cell| cell == '0')?;
        if !missing_by_id.contains_key(&implied.to_string()) || self.matched.contains_key(&implied)
        {
            return None;
        }
        Some(implied)
    }
}

impl<C: PinnedCache, T: TrackingSink> ReconciliationEngine<C, T> {
    /// Resolves the single fully-determined ambiguous case, if any, by
    /// synthesizing rename hints and re-running direct reconciliation.
    ///
    /// Returns `true` when the dataset was mutated and reconciled; `false`
    /// leaves `dataset.updated` untouched. The corrective rewrite happens
    /// at most once per pass, as an explicit loop bound rather than
    /// recursion.
    pub async fn maybe_fake_update(
        &self,
        dataset: &mut Dataset,
        mut guesses: Vec<UrlGuess>,
        missing_by_id: &HashMap<String, PinnedTile>,
    ) -> Result<bool, EngineError> {
        let mut corrected = false;
        let tally = loop {
            let tally = GuessTally::over(&dataset.current, &guesses, missing_by_id);
            if corrected {
                break tally;
            }

            let Some(implied) = tally.implied_position(missing_by_id) else {
                break tally;
            };
            let Some(url) = tally.troublesome_url().map(str::to_string) else {
                break tally;
            };
            let Some(guess) = guesses.iter_mut().find(|guess| guess.url == url) else {
                break tally;
            };

            // One guess unresolved, one position unaccounted for: the guess
            // must mean that position. Rewrite it and tally once more.
            guess.positions = Some(vec![implied]);
            self.send_tracking("backfill", "missing1", &implied.to_string());
            corrected = true;
        };

        let status_row: String = tally.status.iter().collect();
        self.send_tracking(
            "backfill",
            "status",
            &format!("{status_row}|{}", tally.no_idea.len()),
        );

        if tally.unresolved() > 0 {
            let matched_sum: u32 = tally.matched.values().sum();
            self.send_tracking(
                "backfill",
                "blocked",
                &format!(
                    "{}|{}|{}|{}",
                    tally.ambiguous.len(),
                    tally.conflict.len(),
                    matched_sum,
                    tally.no_idea.len()
                ),
            );
            return Ok(false);
        }

        let duplicated: Vec<String> = tally
            .matched
            .iter()
            .filter(|&(_, &multiplicity)| multiplicity > 1)
            .map(|(position, _)| position.to_string())
            .collect();
        if !duplicated.is_empty() {
            self.send_tracking("backfill", "duplicated", &duplicated.join("|"));
            return Ok(false);
        }

        // Every guess now has exactly one matched candidate; turn them into
        // the rename hints a direct pass understands.
        for guess in &guesses {
            let Some(position) = guess.positions.as_deref().and_then(|p| p.first().copied())
            else {
                continue;
            };
            dataset.updated.push(RenameHint {
                old_url: guess.url.clone(),
                new_id: position.to_string(),
            });
        }
        if dataset.updated.is_empty() {
            return Ok(false);
        }

        self.reconcile_direct(dataset).await?;
        self.send_tracking("backfill", "handled", &dataset.updated.len().to_string());
        Ok(true)
    }
}
