//! TTL cache of raw wiki pages keyed by canonical URL.
//!
//! Entries are never evicted; freshness is decided per call from `max_age`.
//! A failed refetch falls back to the stale entry, so a page that was ever
//! fetched keeps contributing to builds while the wiki is unreachable.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::FetchError;
use crate::services::{FetchOutcome, Fetcher};
use crate::storage::LocalStore;
use crate::utils::canonical_url;

/// Prefix of validators computed locally rather than sent by the server.
const HASH_PREFIX: &str = "sha256:";

/// One cached page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Canonical URL
    pub url: String,
    pub raw_content: String,
    pub fetched_at: DateTime<Utc>,
    /// Server `ETag`, or a `sha256:` hash of the content
    #[serde(default)]
    pub etag_or_hash: Option<String>,
}

impl CacheEntry {
    /// Server validator usable for `If-None-Match`, if any.
    fn etag(&self) -> Option<&str> {
        self.etag_or_hash
            .as_deref()
            .filter(|tag| !tag.starts_with(HASH_PREFIX))
    }
}

/// Where a page's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageSource {
    /// Fresh cache hit; no request made
    Cache,
    /// Downloaded now
    Network,
    /// Server confirmed the cached copy
    Revalidated,
    /// Refetch failed; cached copy served past its max age
    Stale,
}

/// Content returned by [`PageCache::get_or_fetch`].
#[derive(Debug, Clone)]
pub struct CachedPage {
    pub url: String,
    pub content: String,
    pub source: PageSource,
}

impl CachedPage {
    /// Whether the content was served from the cache.
    pub fn from_cache(&self) -> bool {
        self.source != PageSource::Network
    }

    /// Whether a request went out for this page.
    pub fn contacted_network(&self) -> bool {
        self.source != PageSource::Cache
    }
}

fn content_hash(content: &str) -> String {
    format!("{HASH_PREFIX}{}", hex::encode(Sha256::digest(content.as_bytes())))
}

/// Page cache in front of a [`Fetcher`].
#[derive(Clone)]
pub struct PageCache {
    store: LocalStore,
    fetcher: Arc<dyn Fetcher>,
}

impl PageCache {
    pub fn new(store: LocalStore, fetcher: Arc<dyn Fetcher>) -> Self {
        Self { store, fetcher }
    }

    /// Cache file for a canonical URL.
    fn key(url: &str) -> String {
        format!("{}.json", hex::encode(Sha256::digest(url.as_bytes())))
    }

    /// Cached entry for `url`. Unreadable entries count as missing.
    pub async fn entry(&self, url: &str) -> Option<CacheEntry> {
        let url = canonical_url(url);
        match self.store.read_json::<CacheEntry>(&Self::key(&url)).await {
            Ok(entry) => entry.filter(|e| e.url == url),
            Err(e) => {
                log::warn!("Ignoring unreadable cache entry for {url}: {e}");
                None
            }
        }
    }

    async fn put(&self, entry: &CacheEntry) {
        if let Err(e) = self.store.write_json(&Self::key(&entry.url), entry).await {
            log::warn!("Failed to cache {}: {}", entry.url, e);
        }
    }

    /// Cached content if younger than `max_age`, otherwise a refetch.
    ///
    /// Fails only when the fetch fails and nothing is cached for `url`.
    pub async fn get_or_fetch(
        &self,
        url: &str,
        max_age: Duration,
    ) -> Result<CachedPage, FetchError> {
        let url = canonical_url(url);
        let cached = self.entry(&url).await;
        let now = Utc::now();

        if let Some(entry) = &cached {
            if now - entry.fetched_at < max_age {
                log::debug!("Cache hit for {url}");
                return Ok(CachedPage {
                    url,
                    content: entry.raw_content.clone(),
                    source: PageSource::Cache,
                });
            }
        }

        let etag = cached.as_ref().and_then(CacheEntry::etag);
        match self.fetcher.fetch(&url, etag).await {
            Ok(FetchOutcome::Fresh(page)) => {
                let etag_or_hash = page.etag.unwrap_or_else(|| content_hash(&page.body));
                if cached
                    .as_ref()
                    .is_some_and(|c| c.etag_or_hash.as_deref() == Some(etag_or_hash.as_str()))
                {
                    log::debug!("Refetched {url}: content unchanged");
                }
                let entry = CacheEntry {
                    url: url.clone(),
                    raw_content: page.body,
                    fetched_at: now,
                    etag_or_hash: Some(etag_or_hash),
                };
                self.put(&entry).await;
                Ok(CachedPage {
                    url,
                    content: entry.raw_content,
                    source: PageSource::Network,
                })
            }
            Ok(FetchOutcome::NotModified) => match cached {
                Some(mut entry) => {
                    log::debug!("Revalidated {url}");
                    entry.fetched_at = now;
                    self.put(&entry).await;
                    Ok(CachedPage {
                        url,
                        content: entry.raw_content,
                        source: PageSource::Revalidated,
                    })
                }
                None => Err(FetchError::Status { url, status: 304 }),
            },
            Err(error) => match cached {
                Some(entry) => {
                    log::warn!(
                        "Refetch of {} failed ({}); using copy from {}",
                        url,
                        error,
                        entry.fetched_at
                    );
                    Ok(CachedPage {
                        url,
                        content: entry.raw_content,
                        source: PageSource::Stale,
                    })
                }
                None => Err(error),
            },
        }
    }
}
