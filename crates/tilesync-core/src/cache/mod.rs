//! Persisted pinned-slot cache contract and in-memory implementation.
//!
//! The host keeps the pinned baseline in layered storage (preference value
//! plus derived caches). This module models all of it as one collaborator:
//! an ordered slot sequence with in-place writes, whole-baseline
//! replacement, cache expiry, and a display-refresh request. The engine is
//! the single writer; `request` must return a snapshot that stays stable
//! for the duration of one pass.

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;

use crate::model::PinnedTile;

/// Errors raised by a pinned cache implementation.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum CacheError {
    /// The backing storage could not be reached at all.
    #[error("pinned storage unavailable: {reason}")]
    Unavailable {
        /// Implementation-specific cause.
        reason: String,
    },

    /// A single slot write was rejected; sibling writes are unaffected.
    #[error("write to slot {index} rejected: {reason}")]
    WriteRejected {
        /// Slot the write targeted.
        index: usize,
        /// Implementation-specific cause.
        reason: String,
    },
}

/// Async contract over the host's pinned-slot storage.
///
/// One reconciliation pass runs at a time; implementations are not expected
/// to tolerate concurrent external mutation during a pass.
#[allow(async_fn_in_trait)]
pub trait PinnedCache: Send + Sync {
    /// True once a baseline has been stored and is not the empty-sequence
    /// sentinel. Routing uses this to pick the created or updated path.
    async fn is_populated(&self) -> Result<bool, CacheError>;

    /// Current pinned slots ordered by display position; holes are `None`.
    /// The returned snapshot must be stable for the duration of one pass.
    async fn request(&self) -> Result<Vec<Option<PinnedTile>>, CacheError>;

    /// Overwrites a single slot in place. Targets disjoint slots, so calls
    /// may be issued concurrently.
    async fn write(&self, index: usize, tile: PinnedTile) -> Result<(), CacheError>;

    /// Replaces the entire baseline with `pins`.
    async fn store_baseline(&self, pins: &[Option<PinnedTile>]) -> Result<(), CacheError>;

    /// Drops every derived cache of the baseline.
    async fn expire(&self) -> Result<(), CacheError>;

    /// Asks the display layer to re-read, optionally broadcasting to all
    /// open surfaces.
    async fn refresh(&self, broadcast: bool) -> Result<(), CacheError>;

    /// Enables or disables profile sync of the baseline, returning the
    /// previous state so callers can restore it.
    async fn set_sync(&self, enabled: bool) -> Result<bool, CacheError>;
}

#[derive(Debug, Default)]
struct MemoryState {
    pins: Vec<Option<PinnedTile>>,
    populated: bool,
    sync_enabled: bool,
    expired: usize,
    refreshes: Vec<bool>,
    fail_slots: HashSet<usize>,
}

/// In-memory [`PinnedCache`] for tests and embedding.
///
/// Slot writes can be made to fail individually via [`fail_slot`] to
/// exercise write-isolation paths.
///
/// [`fail_slot`]: MemoryPinnedCache::fail_slot
#[derive(Debug, Default)]
pub struct MemoryPinnedCache {
    state: Mutex<MemoryState>,
}

impl MemoryPinnedCache {
    /// Creates an empty, never-populated cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a populated cache holding `pins` as its baseline.
    #[must_use]
    pub fn with_pins(pins: Vec<Option<PinnedTile>>) -> Self {
        let cache = Self::new();
        {
            let mut state = cache.lock();
            state.pins = pins;
            state.populated = true;
            state.sync_enabled = true;
        }
        cache
    }

    /// Makes every subsequent write to `index` fail.
    pub fn fail_slot(&self, index: usize) {
        self.lock().fail_slots.insert(index);
    }

    /// Snapshot of the stored slots.
    #[must_use]
    pub fn pins(&self) -> Vec<Option<PinnedTile>> {
        self.lock().pins.clone()
    }

    /// Number of times `expire` was called.
    #[must_use]
    pub fn expire_count(&self) -> usize {
        self.lock().expired
    }

    /// Broadcast flags of every `refresh` call, in order.
    #[must_use]
    pub fn refreshes(&self) -> Vec<bool> {
        self.lock().refreshes.clone()
    }

    /// Current sync toggle state.
    #[must_use]
    pub fn sync_enabled(&self) -> bool {
        self.lock().sync_enabled
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl PinnedCache for MemoryPinnedCache {
    async fn is_populated(&self) -> Result<bool, CacheError> {
        let state = self.lock();
        Ok(state.populated && !state.pins.is_empty())
    }

    async fn request(&self) -> Result<Vec<Option<PinnedTile>>, CacheError> {
        Ok(self.lock().pins.clone())
    }

    async fn write(&self, index: usize, tile: PinnedTile) -> Result<(), CacheError> {
        let mut state = self.lock();
        if state.fail_slots.contains(&index) {
            return Err(CacheError::WriteRejected {
                index,
                reason: "injected failure".to_string(),
            });
        }

        if state.pins.len() <= index {
            state.pins.resize(index + 1, None);
        }
        state.pins[index] = Some(tile);
        Ok(())
    }

    async fn store_baseline(&self, pins: &[Option<PinnedTile>]) -> Result<(), CacheError> {
        let mut state = self.lock();
        state.pins = pins.to_vec();
        state.populated = true;
        Ok(())
    }

    async fn expire(&self) -> Result<(), CacheError> {
        self.lock().expired += 1;
        Ok(())
    }

    async fn refresh(&self, broadcast: bool) -> Result<(), CacheError> {
        self.lock().refreshes.push(broadcast);
        Ok(())
    }

    async fn set_sync(&self, enabled: bool) -> Result<bool, CacheError> {
        let mut state = self.lock();
        let previous = state.sync_enabled;
        state.sync_enabled = enabled;
        Ok(previous)
    }
}
