// src/services/mod.rs

//! Services for fetching wiki pages, extracting quests, and reading legacy
//! profile documents.

pub mod extractor;
pub mod fetcher;
pub mod legacy;

pub use extractor::{Diagnostic, Extraction, PageContext, QuestExtractor, StructuralHints};
pub use fetcher::{FetchOutcome, FetchedPage, Fetcher, HttpFetcher};
pub use legacy::{LegacyFormat, LegacyImport, MappedRecord, SkippedRecord, map_legacy};
