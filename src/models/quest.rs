//! Quest record data structure.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::Campaign;
use crate::utils::truncate;

/// What sort of catalog entry a quest is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestKind {
    Mission,
    SideQuest,
    Milestone,
}

/// One quest in the catalog.
///
/// Produced fresh on every build and never mutated afterwards; identity is
/// `quest_key`, not the wiki URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestRecord {
    /// Stable identity derived from campaign and canonical title
    pub quest_key: String,

    /// Normalised display title
    pub title: String,

    /// Campaign the quest belongs to
    pub campaign: Campaign,

    /// Region or section header the quest was grouped under
    pub region_or_section: String,

    /// Mission, side quest, or milestone
    pub kind: QuestKind,

    /// Wiki article for the quest (may change between syncs)
    pub wiki_url: String,

    /// When the record was extracted
    pub extracted_at: DateTime<Utc>,
}

impl QuestRecord {
    /// Create a record, deriving `quest_key` from campaign and title.
    pub fn new(
        campaign: Campaign,
        title: impl Into<String>,
        region_or_section: impl Into<String>,
        kind: QuestKind,
        wiki_url: impl Into<String>,
        extracted_at: DateTime<Utc>,
    ) -> Self {
        let title = title.into();
        Self {
            quest_key: quest_key(campaign, &title),
            title,
            campaign,
            region_or_section: region_or_section.into(),
            kind,
            wiki_url: wiki_url.into(),
            extracted_at,
        }
    }

    /// Shorten the display title to `max_len` graphemes.
    ///
    /// `quest_key` keeps the full title, so long titles sharing a prefix
    /// stay distinct.
    pub fn with_title_limit(mut self, max_len: usize) -> Self {
        self.title = truncate(&self.title, max_len);
        self
    }

    /// Same quest content ignoring extraction time.
    pub fn same_content(&self, other: &QuestRecord) -> bool {
        self.quest_key == other.quest_key
            && self.title == other.title
            && self.region_or_section == other.region_or_section
            && self.kind == other.kind
            && self.wiki_url == other.wiki_url
    }
}

/// Derive the stable key for a quest: `<campaign-slug>:<title-slug>`.
///
/// The title slug is the lowercase alphanumeric runs of the title joined by
/// `-`, so punctuation, case, and whitespace churn do not change identity.
pub fn quest_key(campaign: Campaign, title: &str) -> String {
    format!("{}:{}", campaign.slug(), title_slug(title))
}

/// Lowercase alphanumeric runs joined by `-`.
pub fn title_slug(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars() {
        if ch.is_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.extend(ch.to_lowercase());
        } else if ch != '\'' && ch != '\u{2019}' {
            pending_dash = true;
        }
    }
    slug
}
