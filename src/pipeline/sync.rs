// src/pipeline/sync.rs

//! Sync orchestration.
//!
//! A run builds a fresh catalog, diffs it against the committed one, checks
//! the shrink guard, and reconciles every profile. Nothing is written until
//! every profile has been reconciled in memory; the commit then persists the
//! profiles and finally replaces the catalog.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt, TryStreamExt};

use crate::error::{AppError, Result};
use crate::models::{Catalog, Config, Profile};
use crate::pipeline::{
    BuildStats, CancelFlag, CatalogBuilder, CatalogDiff, CircuitBreaker, ProgressReporter,
    calculate_diff,
};
use crate::storage::{CatalogStore, PageCache, ProfileStore};

/// Profiles loaded concurrently during the dry run.
const PROFILE_CONCURRENCY: usize = 4;

/// Per-profile outcome of a committed sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileSyncResult {
    pub name: String,
    /// NotStarted entries added for new quests
    pub inserted: usize,
    /// Entries kept although their quest left the catalog
    pub orphaned: usize,
}

/// Summary of a committed sync.
#[derive(Debug, Clone)]
pub struct SyncReport {
    pub version: u64,
    pub previous_version: Option<u64>,
    pub quest_count: usize,
    pub diff: CatalogDiff,
    pub build: BuildStats,
    pub profiles: Vec<ProfileSyncResult>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    /// One-line human summary.
    pub fn summary(&self) -> String {
        format!(
            "catalog v{}: {} quests, {} added, {} removed, {} renamed, {} profiles reconciled",
            self.version,
            self.quest_count,
            self.diff.added(),
            self.diff.removed(),
            self.diff.renamed().count(),
            self.profiles.len()
        )
    }
}

/// Drives sync runs against one data directory.
pub struct SyncOrchestrator {
    config: Arc<Config>,
    builder: CatalogBuilder,
    breaker: CircuitBreaker,
    catalogs: CatalogStore,
    profiles: ProfileStore,
}

impl SyncOrchestrator {
    pub fn new(
        config: Arc<Config>,
        cache: PageCache,
        catalogs: CatalogStore,
        profiles: ProfileStore,
    ) -> Self {
        Self {
            builder: CatalogBuilder::new(Arc::clone(&config), cache),
            breaker: CircuitBreaker::new(config.sync.clone()),
            config,
            catalogs,
            profiles,
        }
    }

    pub fn profiles(&self) -> &ProfileStore {
        &self.profiles
    }

    /// The committed catalog, if any.
    pub async fn load_current(&self) -> Result<Option<Catalog>> {
        self.catalogs.load().await
    }

    /// Run one sync against `current`, the committed catalog.
    ///
    /// On any error, including cancellation and the shrink guard, nothing is
    /// committed and `current` stays authoritative.
    pub async fn run_sync(
        &self,
        current: Option<&Catalog>,
        cancel: &CancelFlag,
        progress: &ProgressReporter,
    ) -> Result<SyncReport> {
        log::info!(
            "Sync started (committed catalog: {})",
            current.map_or_else(|| "none".to_string(), |c| format!("v{}", c.version))
        );
        progress.report(0, "Starting sync");

        let outcome = self
            .builder
            .build(
                &self.config.pages,
                self.config.cache.max_age(),
                cancel,
                progress,
            )
            .await?;

        let previous_version = current.map(|c| c.version);
        let version = previous_version.map_or(1, |v| v + 1);
        let catalog = outcome.catalog.with_version(version);

        let diff = calculate_diff(current, &catalog);
        log::info!(
            "Diff: {} added, {} removed, {} unchanged",
            diff.added(),
            diff.removed(),
            diff.unchanged()
        );
        for rename in diff.renamed() {
            log::info!("Renamed: {} -> {}", rename.from_key, rename.to_key);
        }

        self.breaker.validate(&catalog, current)?;

        progress.report(85, "Reconciling profiles...");
        let names = self.profiles.list_profiles().await?;
        let dry_run: Vec<ProfileSyncResult> = stream::iter(names)
            .map(|name| {
                let catalog = &catalog;
                async move {
                    let mut profile = self
                        .profiles
                        .get(&name)
                        .await?
                        .unwrap_or_else(|| Profile::new(name.as_str()));
                    let stats = profile.reconcile(catalog);
                    Ok::<_, AppError>(ProfileSyncResult {
                        name,
                        inserted: stats.inserted,
                        orphaned: stats.orphaned,
                    })
                }
            })
            .buffered(PROFILE_CONCURRENCY)
            .try_collect()
            .await?;

        cancel.check()?;
        progress.report(90, "Committing...");

        let mut results = Vec::with_capacity(dry_run.len());
        for planned in dry_run {
            // Profiles deleted since the dry run stay deleted
            if let Some(stats) = self.profiles.reconcile(&planned.name, &catalog).await? {
                results.push(ProfileSyncResult {
                    name: planned.name,
                    inserted: stats.inserted,
                    orphaned: stats.orphaned,
                });
            }
        }
        self.catalogs.save(&catalog).await?;

        let report = SyncReport {
            version,
            previous_version,
            quest_count: catalog.quest_count(),
            diff,
            build: outcome.stats,
            profiles: results,
            finished_at: Utc::now(),
        };
        log::info!("Sync complete: {}", report.summary());
        progress.report(100, "Sync complete");
        Ok(report)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::models::{Campaign, PageSpec, Seed};
    use crate::services::fetcher::testing::ScriptedFetcher;
    use crate::storage::LocalStore;
    use std::path::Path;

    pub const LIST_URL: &str = "https://wiki.example/wiki/List_of_Nightfall_quests";

    /// A quest table page listing `titles` under one region heading.
    pub fn quest_page(titles: &[&str]) -> String {
        let rows: String = titles
            .iter()
            .map(|t| {
                format!(
                    "<tr><td><a href=\"/wiki/{}\">{}</a></td><td>Kamadan</td></tr>",
                    t.replace(' ', "_"),
                    t
                )
            })
            .collect();
        format!(
            "<div id=\"mw-content-text\"><h2>Istan</h2><table>\
             <tr><th>Quest</th><th>Location</th></tr>{rows}</table></div>"
        )
    }

    /// Orchestrator over `dir` scraping [`LIST_URL`] with no seed quests.
    pub fn orchestrator(dir: &Path, fetcher: Arc<ScriptedFetcher>) -> SyncOrchestrator {
        let mut config = Config::default();
        config.fetcher.request_delay_ms = 0;
        config.wiki_base_url = "https://wiki.example".into();
        config.pages = vec![PageSpec::new(Campaign::Nightfall, LIST_URL)];
        config.seed = Seed { quests: Vec::new() };
        config.cache.max_age_hours = 1;

        SyncOrchestrator::new(
            Arc::new(config),
            PageCache::new(LocalStore::new(dir.join("cache")), fetcher),
            CatalogStore::new(LocalStore::new(dir)),
            ProfileStore::new(LocalStore::new(dir.join("profiles"))),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::models::QuestStatus;
    use crate::services::fetcher::testing::{Scripted, ScriptedFetcher};
    use tempfile::TempDir;

    fn page(titles: &[&str]) -> Scripted {
        Scripted::Page {
            body: quest_page(titles),
            etag: None,
        }
    }

    async fn sync(orchestrator: &SyncOrchestrator) -> Result<SyncReport> {
        let current = orchestrator.load_current().await?;
        orchestrator
            .run_sync(
                current.as_ref(),
                &CancelFlag::new(),
                &ProgressReporter::silent(),
            )
            .await
    }

    #[tokio::test]
    async fn test_first_sync_commits_version_one() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set(LIST_URL, page(&["K1", "K2"]));
        let orchestrator = orchestrator(dir.path(), fetcher);
        orchestrator.profiles().load("Ranger").await.unwrap();

        let report = sync(&orchestrator).await.unwrap();
        assert_eq!(report.version, 1);
        assert_eq!(report.previous_version, None);
        assert_eq!(report.diff.added(), 2);
        assert_eq!(report.profiles[0].inserted, 2);

        let stored = orchestrator.load_current().await.unwrap().unwrap();
        assert_eq!(stored.version, 1);
        let profile = orchestrator.profiles().get("Ranger").await.unwrap().unwrap();
        assert_eq!(profile.status("nightfall:k1"), QuestStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_resync_keeps_progress_and_orphans() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set(LIST_URL, page(&["K1", "K2"]));
        let orchestrator = orchestrator(dir.path(), fetcher.clone());
        orchestrator.profiles().load("Ranger").await.unwrap();
        sync(&orchestrator).await.unwrap();
        orchestrator
            .profiles()
            .set_status("Ranger", "nightfall:k1", QuestStatus::Completed)
            .await
            .unwrap();

        // Drop cached pages so the new content is fetched
        std::fs::remove_dir_all(dir.path().join("cache")).unwrap();
        fetcher.set(LIST_URL, page(&["K1", "K3"]));

        let report = sync(&orchestrator).await.unwrap();
        assert_eq!(report.version, 2);
        assert_eq!(report.diff.added(), 1);
        assert_eq!(report.diff.removed(), 1);
        assert_eq!(report.profiles[0].inserted, 1);
        assert_eq!(report.profiles[0].orphaned, 1);

        let profile = orchestrator
            .profiles()
            .get("Ranger")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(profile.status("nightfall:k1"), QuestStatus::Completed);
        assert!(profile.entry("nightfall:k2").is_some());
        assert_eq!(profile.status("nightfall:k3"), QuestStatus::NotStarted);
    }

    #[tokio::test]
    async fn test_build_failure_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set(LIST_URL, Scripted::Fail(503));
        let orchestrator = orchestrator(dir.path(), fetcher);

        let err = sync(&orchestrator).await.unwrap_err();
        assert!(matches!(err, AppError::Build(_)));
        assert!(orchestrator.load_current().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancelled_run_commits_nothing() {
        let dir = TempDir::new().unwrap();
        let fetcher = Arc::new(ScriptedFetcher::new());
        fetcher.set(LIST_URL, page(&["K1"]));
        let orchestrator = orchestrator(dir.path(), fetcher);
        let cancel = CancelFlag::new();
        cancel.cancel();

        let err = orchestrator
            .run_sync(None, &cancel, &ProgressReporter::silent())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Cancelled));
        assert!(orchestrator.load_current().await.unwrap().is_none());
    }
}
