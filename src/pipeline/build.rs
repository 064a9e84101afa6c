//! Catalog builder.
//!
//! Fetches every configured page through the [`PageCache`], extracts quests,
//! de-duplicates them by `quest_key`, and assembles a [`Catalog`]. Builds are
//! never incremental; every run starts from the seed quests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use chrono::{Duration, Utc};

use crate::error::{AppError, Result};
use crate::models::{Campaign, Catalog, Config, PageSpec, QuestRecord, ShapeHint};
use crate::pipeline::{CancelFlag, ProgressReporter};
use crate::services::{Diagnostic, PageContext, QuestExtractor};
use crate::storage::{PageCache, PageSource};
use crate::utils::canonical_url;

/// Section used for quests extracted without any grouping.
pub const UNCATEGORIZED_SECTION: &str = "Uncategorized";

/// Share of the overall sync progress spent building.
const BUILD_PROGRESS_SPAN: usize = 80;

/// Counters collected during a build.
#[derive(Debug, Clone, Default)]
pub struct BuildStats {
    /// Pages attempted, including followed sub-pages
    pub pages_total: usize,
    /// Pages whose content was available, fresh or cached
    pub pages_obtained: usize,
    pub pages_failed: usize,
    pub from_network: usize,
    pub from_cache: usize,
    /// Pages served stale after a failed refetch
    pub stale: usize,
    pub subpages_followed: usize,
    pub seeded: usize,
    pub candidates: usize,
    /// Candidates dropped as duplicates of an earlier `quest_key`
    pub duplicates: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// A built, not yet versioned catalog.
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub catalog: Catalog,
    pub stats: BuildStats,
}

/// One page queued for fetching.
struct PageJob {
    campaign: Campaign,
    url: String,
    shape: Option<ShapeHint>,
    /// Followed from an index page
    linked: bool,
}

/// Keep one record per `quest_key`.
///
/// A record with a section beats one without; otherwise the first seen wins
/// and a differing section is logged. Positions follow first appearance.
fn dedup(records: Vec<QuestRecord>) -> (Vec<QuestRecord>, usize) {
    let mut kept: Vec<QuestRecord> = Vec::with_capacity(records.len());
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut duplicates = 0;

    for record in records {
        let Some(&idx) = index.get(&record.quest_key) else {
            index.insert(record.quest_key.clone(), kept.len());
            kept.push(record);
            continue;
        };

        duplicates += 1;
        let existing = &mut kept[idx];
        if existing.region_or_section.is_empty() && !record.region_or_section.is_empty() {
            *existing = record;
        } else if !record.region_or_section.is_empty()
            && existing.region_or_section != record.region_or_section
        {
            log::warn!(
                "Duplicate quest {} in '{}' and '{}'; keeping '{}'",
                record.quest_key,
                existing.region_or_section,
                record.region_or_section,
                existing.region_or_section
            );
        }
    }

    for record in &mut kept {
        if record.region_or_section.is_empty() {
            record.region_or_section = UNCATEGORIZED_SECTION.to_string();
        }
    }
    (kept, duplicates)
}

/// Builds catalogs from the wiki.
pub struct CatalogBuilder {
    config: Arc<Config>,
    cache: PageCache,
    extractor: QuestExtractor,
}

impl CatalogBuilder {
    pub fn new(config: Arc<Config>, cache: PageCache) -> Self {
        let extractor = QuestExtractor::new(config.extractor.clone());
        Self {
            config,
            cache,
            extractor,
        }
    }

    /// Build a catalog from `pages`.
    ///
    /// Pages that cannot be obtained contribute nothing; the build fails
    /// only when none could be obtained. Cancellation is checked before
    /// every fetch.
    pub async fn build(
        &self,
        pages: &[PageSpec],
        max_age: Duration,
        cancel: &CancelFlag,
        progress: &ProgressReporter,
    ) -> Result<BuildOutcome> {
        let now = Utc::now();
        let mut stats = BuildStats::default();
        let mut records = self.config.seed.records(&self.config.wiki_base_url, now);
        stats.seeded = records.len();

        let mut queue: VecDeque<PageJob> = pages
            .iter()
            .map(|p| PageJob {
                campaign: p.campaign,
                url: p.url.clone(),
                shape: p.shape,
                linked: false,
            })
            .collect();
        let mut visited: HashSet<String> = HashSet::new();
        let mut done = 0usize;
        let mut planned = queue.len();
        let delay = self.config.fetcher.request_delay();

        while let Some(job) = queue.pop_front() {
            cancel.check()?;
            if !visited.insert(canonical_url(&job.url)) {
                planned = planned.saturating_sub(1);
                continue;
            }

            stats.pages_total += 1;
            let percent = done * BUILD_PROGRESS_SPAN / planned.max(1);
            progress.report(percent as u8, format!("Scanning {}...", job.campaign));

            let page = match self.cache.get_or_fetch(&job.url, max_age).await {
                Ok(page) => page,
                Err(e) => {
                    log::warn!("Skipping {} page {}: {}", job.campaign, job.url, e);
                    stats.pages_failed += 1;
                    done += 1;
                    continue;
                }
            };
            stats.pages_obtained += 1;
            match page.source {
                PageSource::Cache | PageSource::Revalidated => stats.from_cache += 1,
                PageSource::Network => stats.from_network += 1,
                PageSource::Stale => stats.stale += 1,
            }

            let ctx = PageContext {
                url: &page.url,
                campaign: job.campaign,
                extracted_at: now,
            };
            let extraction = self.extractor.extract(&ctx, &page.content, job.shape);
            stats.candidates += extraction.candidates.len();
            stats.diagnostics.extend(extraction.diagnostics);
            records.extend(extraction.candidates);

            if !job.linked && self.config.extractor.follow_index_links {
                let linked = extraction
                    .hints
                    .subpages
                    .into_iter()
                    .filter(|url| !visited.contains(url))
                    .take(self.config.extractor.max_linked_pages);
                for url in linked {
                    log::debug!("Following {} from {}", url, page.url);
                    stats.subpages_followed += 1;
                    planned += 1;
                    queue.push_back(PageJob {
                        campaign: job.campaign,
                        url,
                        shape: None,
                        linked: true,
                    });
                }
            }
            done += 1;

            if page.contacted_network() && !queue.is_empty() && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
        }

        if stats.pages_obtained == 0 {
            return Err(AppError::build(format!(
                "no wiki pages reachable ({} attempted)",
                stats.pages_total
            )));
        }
        cancel.check()?;

        let (records, duplicates) = dedup(records);
        stats.duplicates = duplicates;
        let catalog = Catalog::from_records(0, now, records)?;

        log::info!(
            "Built catalog: {} quests from {}/{} pages ({} network, {} cached, {} stale, {} duplicates dropped)",
            catalog.quest_count(),
            stats.pages_obtained,
            stats.pages_total,
            stats.from_network,
            stats.from_cache,
            stats.stale,
            stats.duplicates
        );
        progress.report(BUILD_PROGRESS_SPAN as u8, "Catalog built");
        Ok(BuildOutcome { catalog, stats })
    }
}
