//! Storage for pages, the catalog, and profiles.
//!
//! All documents are JSON files under the data directory, written with
//! write-to-temp-then-rename so a crash mid-write never corrupts the
//! previously committed document.

pub mod catalog;
pub mod local;
pub mod page_cache;
pub mod profiles;

pub use catalog::CatalogStore;
pub use local::LocalStore;
pub use page_cache::{CacheEntry, CachedPage, PageCache, PageSource};
pub use profiles::{ImportFormat, ImportReport, ProfileStore};
