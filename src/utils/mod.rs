//! Utility functions and helpers.

pub mod text;
pub mod url;

pub use text::{canonical_title, normalize_section, truncate};
pub use url::{article_url, canonical_url, resolve, wiki_search_url};
