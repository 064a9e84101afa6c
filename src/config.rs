// src/config.rs

//! Configuration loading and data directory layout.
//!
//! Everything the application persists lives under one data directory; see
//! [`crate::storage::local`] for the layout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::models::Config;
use crate::pipeline::{SyncOrchestrator, SyncWorker};
use crate::services::HttpFetcher;
use crate::storage::{CatalogStore, LocalStore, PageCache, ProfileStore};

/// Paths inside a data directory.
#[derive(Debug, Clone)]
pub struct DataLayout {
    root: PathBuf,
}

impl DataLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> PathBuf {
        self.root.join("config.toml")
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.root.join("catalog.json")
    }

    pub fn profiles_dir(&self) -> PathBuf {
        self.root.join("profiles")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.root.join("cache")
    }

    pub fn catalog_store(&self) -> CatalogStore {
        CatalogStore::new(LocalStore::new(&self.root))
    }

    pub fn profile_store(&self) -> ProfileStore {
        ProfileStore::new(LocalStore::new(self.profiles_dir()))
    }

    /// Page cache backed by the HTTP fetcher.
    pub fn page_cache(&self, config: &Config) -> Result<PageCache> {
        let fetcher = HttpFetcher::new(&config.fetcher)?;
        Ok(PageCache::new(
            LocalStore::new(self.cache_dir()),
            Arc::new(fetcher),
        ))
    }

    /// Orchestrator wired to this directory.
    pub fn orchestrator(&self, config: Arc<Config>) -> Result<SyncOrchestrator> {
        let cache = self.page_cache(&config)?;
        Ok(SyncOrchestrator::new(
            config,
            cache,
            self.catalog_store(),
            self.profile_store(),
        ))
    }

    /// Background worker wired to this directory.
    pub fn worker(&self, config: Arc<Config>) -> Result<SyncWorker> {
        Ok(SyncWorker::new(Arc::new(self.orchestrator(config)?)))
    }
}

/// Load configuration from a TOML file.
///
/// A missing file yields the defaults; an unreadable or malformed one falls
/// back to defaults with a warning. The result is validated either way.
pub fn load_config(path: &Path) -> Result<Config> {
    let config = if path.exists() {
        Config::load_or_default(path)
    } else {
        log::debug!("No config at {}; using defaults", path.display());
        Config::default()
    };
    config
        .validate()
        .map_err(|e| AppError::config(format!("{}: {e}", path.display())))?;
    Ok(config)
}

/// Write `config` as TOML, replacing any existing file atomically.
pub async fn write_config(path: &Path, config: &Config) -> Result<()> {
    let text = toml::to_string_pretty(config)
        .map_err(|e| AppError::config(format!("cannot serialise config: {e}")))?;
    crate::storage::local::write_atomic(path, text.as_bytes()).await
}
