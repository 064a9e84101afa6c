//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Campaign, Seed};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP fetch behaviour
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// Page cache freshness
    #[serde(default)]
    pub cache: CacheConfig,

    /// Quest extraction heuristics
    #[serde(default)]
    pub extractor: ExtractorConfig,

    /// Sync commit guard
    #[serde(default)]
    pub sync: SyncConfig,

    /// Base URL of the wiki, used for search links
    #[serde(default = "defaults::wiki_base_url")]
    pub wiki_base_url: String,

    /// Campaign pages scraped on every sync
    #[serde(default = "defaults::pages")]
    pub pages: Vec<PageSpec>,

    /// Quests added to every build ahead of the scraped ones
    #[serde(default)]
    pub seed: Seed,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.fetcher.user_agent.trim().is_empty() {
            return Err(AppError::validation("fetcher.user_agent is empty"));
        }
        if self.fetcher.timeout_secs == 0 {
            return Err(AppError::validation("fetcher.timeout_secs must be > 0"));
        }
        if self.cache.max_age_hours == 0 {
            return Err(AppError::validation("cache.max_age_hours must be > 0"));
        }
        if self.extractor.max_title_len == 0 || self.extractor.max_section_len == 0 {
            return Err(AppError::validation(
                "extractor length limits must be > 0",
            ));
        }
        if self.sync.max_drop_percent > 100 {
            return Err(AppError::validation(
                "sync.max_drop_percent must be between 0 and 100",
            ));
        }
        if self.pages.is_empty() {
            return Err(AppError::validation("No pages defined"));
        }
        for page in &self.pages {
            url::Url::parse(&page.url).map_err(|e| {
                AppError::validation(format!("invalid page url '{}': {e}", page.url))
            })?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fetcher: FetcherConfig::default(),
            cache: CacheConfig::default(),
            extractor: ExtractorConfig::default(),
            sync: SyncConfig::default(),
            wiki_base_url: defaults::wiki_base_url(),
            pages: defaults::pages(),
            seed: Seed::default(),
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Delay between network fetches in milliseconds
    #[serde(default = "defaults::request_delay")]
    pub request_delay_ms: u64,
}

impl FetcherConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn request_delay(&self) -> Duration {
        Duration::from_millis(self.request_delay_ms)
    }
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            request_delay_ms: defaults::request_delay(),
        }
    }
}

/// Page cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cached pages older than this are refetched
    #[serde(default = "defaults::max_age_hours")]
    pub max_age_hours: u64,
}

impl CacheConfig {
    pub fn max_age(&self) -> chrono::Duration {
        // capped at roughly a century so the conversion cannot overflow
        let hours = self.max_age_hours.min(876_000) as i64;
        chrono::Duration::hours(hours)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_age_hours: defaults::max_age_hours(),
        }
    }
}

/// Extraction heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractorConfig {
    /// Titles longer than this are truncated
    #[serde(default = "defaults::max_title_len")]
    pub max_title_len: usize,

    /// Section names longer than this are truncated
    #[serde(default = "defaults::max_section_len")]
    pub max_section_len: usize,

    /// Link texts that are never quests (compared lowercase, trailing colon stripped)
    #[serde(default = "defaults::ignore_titles")]
    pub ignore_titles: Vec<String>,

    /// Follow sub-page links found on campaign index pages
    #[serde(default = "defaults::follow_index_links")]
    pub follow_index_links: bool,

    /// Most sub-pages followed per index page
    #[serde(default = "defaults::max_linked_pages")]
    pub max_linked_pages: usize,
}

impl ExtractorConfig {
    /// Whether `title` is on the ignore list.
    pub fn is_ignored(&self, title: &str) -> bool {
        let check = title.trim().trim_end_matches(':').to_lowercase();
        self.ignore_titles.iter().any(|t| t.to_lowercase() == check)
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            max_title_len: defaults::max_title_len(),
            max_section_len: defaults::max_section_len(),
            ignore_titles: defaults::ignore_titles(),
            follow_index_links: defaults::follow_index_links(),
            max_linked_pages: defaults::max_linked_pages(),
        }
    }
}

/// Guard applied before a sync is committed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Refuse to commit catalogs that shrank sharply
    #[serde(default = "defaults::circuit_breaker")]
    pub circuit_breaker: bool,

    /// Maximum allowed drop in quest count (0-100)
    #[serde(default = "defaults::max_drop_percent")]
    pub max_drop_percent: u8,

    /// Previous catalogs smaller than this skip the drop check
    #[serde(default = "defaults::min_baseline")]
    pub min_baseline: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            circuit_breaker: defaults::circuit_breaker(),
            max_drop_percent: defaults::max_drop_percent(),
            min_baseline: defaults::min_baseline(),
        }
    }
}

/// Page layout the extractor should assume instead of detecting it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeHint {
    MissionList,
    QuestTable,
    CampaignIndex,
}

/// One campaign page to scrape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageSpec {
    pub campaign: Campaign,
    pub url: String,
    #[serde(default)]
    pub shape: Option<ShapeHint>,
}

impl PageSpec {
    pub fn new(campaign: Campaign, url: impl Into<String>) -> Self {
        Self {
            campaign,
            url: url.into(),
            shape: None,
        }
    }
}

mod defaults {
    use super::PageSpec;
    use crate::models::Campaign;

    // Fetcher defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; questlog/0.1)".into()
    }
    pub fn timeout() -> u64 {
        15
    }
    pub fn request_delay() -> u64 {
        1000
    }

    // Cache defaults
    pub fn max_age_hours() -> u64 {
        24
    }

    // Extractor defaults
    pub fn max_title_len() -> usize {
        128
    }
    pub fn max_section_len() -> usize {
        64
    }
    pub fn follow_index_links() -> bool {
        true
    }
    pub fn max_linked_pages() -> usize {
        25
    }
    pub fn ignore_titles() -> Vec<String> {
        [
            "quest",
            "name",
            "location",
            "type",
            "given by",
            "level",
            "reward",
            "experience",
            "gold",
            "core",
            "logic",
            "mechanics",
            "user interface",
            "controls",
            "game mechanics",
            "terminology",
            "professions",
            "attributes",
            "skills",
            "builds",
            "edit",
            "logs",
            "history",
            "recent changes",
            "random page",
            "help",
            "donate",
            "what links here",
            "related changes",
            "special pages",
            "printable version",
            "permanent link",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }

    // Sync defaults
    pub fn circuit_breaker() -> bool {
        true
    }
    pub fn max_drop_percent() -> u8 {
        50
    }
    pub fn min_baseline() -> usize {
        20
    }

    pub fn wiki_base_url() -> String {
        "https://wiki.guildwars.com".into()
    }

    pub fn pages() -> Vec<PageSpec> {
        vec![
            PageSpec::new(
                Campaign::Prophecies,
                "https://wiki.guildwars.com/wiki/List_of_Prophecies_quests",
            ),
            PageSpec::new(
                Campaign::Factions,
                "https://wiki.guildwars.com/wiki/List_of_Factions_quests",
            ),
            PageSpec::new(
                Campaign::Nightfall,
                "https://wiki.guildwars.com/wiki/List_of_Nightfall_quests",
            ),
            PageSpec::new(
                Campaign::Eotn,
                "https://wiki.guildwars.com/wiki/List_of_Eye_of_the_North_quests",
            ),
        ]
    }
}
