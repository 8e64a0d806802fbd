//! Reconciliation of locally pinned new-tab tiles against an upstream
//! default-dial feed.
//!
//! The upstream feed periodically republishes its canonical tile dataset,
//! possibly under changed identifiers. This crate keeps the host's
//! positionally-indexed pinned-slot cache in step with it: each cached slot
//! is classified as user-customized (left alone), stale-but-identifiable
//! (updated in place), newly backfillable (assigned a default tile), or
//! unresolvable (reported and left alone).
//!
//! # Components
//!
//! - [`identity`] — normalizes upstream tiles and embeds/extracts the
//!   default-position marker that makes them re-identifiable.
//! - [`snapshot`] — lookup maps over one upstream snapshot.
//! - [`heuristic`] — prefix-table position guessing when no marker or
//!   rename evidence exists.
//! - [`engine`] — the pass orchestrator: routing, direct reconciliation,
//!   backfill, and bounded disambiguation.
//! - [`cache`] / [`tracking`] — collaborator contracts for the host's
//!   layered pinned storage and the diagnostics sink, with in-memory
//!   implementations.
//! - [`feed`] — raw dial-record parsing and change detection for the
//!   collector side.
//!
//! # Example
//!
//! ```rust
//! use tilesync_core::{
//!     Dataset, MemoryPinnedCache, ReconciliationEngine, TileConfig, TracingSink,
//! };
//!
//! # async fn run() -> Result<(), tilesync_core::EngineError> {
//! let engine = ReconciliationEngine::new(
//!     TileConfig::default(),
//!     MemoryPinnedCache::new(),
//!     TracingSink,
//! );
//! engine.handle_event(Some(Dataset::default())).await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod feed;
pub mod heuristic;
pub mod identity;
pub mod model;
pub mod snapshot;
pub mod tracking;

pub use cache::{CacheError, MemoryPinnedCache, PinnedCache};
pub use config::{ConfigError, TileConfig};
pub use engine::{EngineError, ReconciliationEngine, SlotDisposition, UpdateCounts, UrlGuess};
pub use model::{Attachment, Dataset, FeedTile, PinnedTile, RenameHint};
pub use tracking::{CapturingSink, TracingSink, TrackingEvent, TrackingSink};
