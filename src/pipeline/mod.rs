//! Sync pipeline.
//!
//! - [`CatalogBuilder`]: fetch pages and assemble a catalog
//! - [`calculate_diff`]: compare catalogs by `quest_key`
//! - [`CircuitBreaker`]: refuse catalogs that shrank sharply
//! - [`SyncOrchestrator`]: build, diff, reconcile, commit
//! - [`SyncWorker`]: run a sync in the background with progress and cancel

pub mod build;
pub mod circuit_breaker;
pub mod diff;
pub mod sync;
pub mod worker;

pub use build::{BuildOutcome, BuildStats, CatalogBuilder, UNCATEGORIZED_SECTION};
pub use circuit_breaker::{CircuitBreaker, CircuitBreakerResult};
pub use diff::{CampaignDiff, CatalogDiff, DiffCalculator, Move, Rename, calculate_diff};
pub use sync::{ProfileSyncResult, SyncOrchestrator, SyncReport};
pub use worker::{CancelFlag, ProgressReporter, SyncJob, SyncProgress, SyncWorker};
