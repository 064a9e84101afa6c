// src/models/mod.rs

//! Domain models for the quest tracker.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod campaign;
mod catalog;
mod config;
mod profile;
mod quest;
mod seed;

// Re-export all public types
pub use campaign::Campaign;
pub use catalog::{CATALOG_FORMAT_VERSION, CampaignCatalog, Catalog, Section};
pub use config::{
    CacheConfig, Config, ExtractorConfig, FetcherConfig, PageSpec, ShapeHint, SyncConfig,
};
pub use profile::{
    CompletionEvent, MAX_PROFILE_NAME_LEN, PROFILE_SCHEMA_VERSION, Profile, ProgressEntry,
    QuestStatus, ReconcileStats, StatusChange, validate_profile_name,
};
pub use quest::{QuestKind, QuestRecord, quest_key, title_slug};
pub use seed::{Seed, SeedQuest};
