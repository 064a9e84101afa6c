//! Render-ready views over a catalog and one profile.
//!
//! Everything here is a pure function of its inputs; the presentation layer
//! re-runs [`query`] whenever the search box, filter, or profile changes.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::AppError;
use crate::models::{Campaign, Catalog, Profile, QuestKind, QuestRecord, QuestStatus};

/// Status filter of the quest view.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum StatusFilter {
    #[default]
    All,
    Only(QuestStatus),
}

impl StatusFilter {
    pub fn matches(self, status: QuestStatus) -> bool {
        match self {
            StatusFilter::All => true,
            StatusFilter::Only(wanted) => wanted == status,
        }
    }
}

impl FromStr for StatusFilter {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.trim().eq_ignore_ascii_case("all") {
            return Ok(StatusFilter::All);
        }
        s.parse().map(StatusFilter::Only)
    }
}

impl fmt::Display for StatusFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusFilter::All => f.write_str("All"),
            StatusFilter::Only(status) => write!(f, "{status}"),
        }
    }
}

/// One quest as shown in the list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestRow {
    pub quest_key: String,
    pub title: String,
    pub kind: QuestKind,
    pub wiki_url: String,
    pub status: QuestStatus,
    pub completed_at: Option<DateTime<Utc>>,
    pub notes: Option<String>,
}

impl QuestRow {
    fn new(quest: &QuestRecord, profile: &Profile) -> Self {
        let entry = profile.entry(&quest.quest_key);
        Self {
            quest_key: quest.quest_key.clone(),
            title: quest.title.clone(),
            kind: quest.kind,
            wiki_url: quest.wiki_url.clone(),
            status: entry.map(|e| e.status).unwrap_or_default(),
            completed_at: entry.and_then(|e| e.completed_at),
            notes: entry.and_then(|e| e.notes.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SectionGroup {
    pub name: String,
    pub quests: Vec<QuestRow>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignGroup {
    pub campaign: Campaign,
    pub sections: Vec<SectionGroup>,
}

/// Filtered catalog; never contains an empty group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct GroupedResult {
    pub campaigns: Vec<CampaignGroup>,
}

impl GroupedResult {
    pub fn is_empty(&self) -> bool {
        self.campaigns.is_empty()
    }

    /// Number of quests that passed the filters.
    pub fn quest_count(&self) -> usize {
        self.campaigns
            .iter()
            .flat_map(|c| c.sections.iter())
            .map(|s| s.quests.len())
            .sum()
    }

    pub fn rows(&self) -> impl Iterator<Item = &QuestRow> {
        self.campaigns
            .iter()
            .flat_map(|c| c.sections.iter())
            .flat_map(|s| s.quests.iter())
    }
}

/// Filter and group `catalog` for `profile`.
///
/// A quest passes when its title contains `search_term` (case-insensitive;
/// an empty term matches everything) and its status passes `filter`. Keys
/// the profile has not seen yet count as NotStarted. Catalog order is kept.
pub fn query(
    catalog: &Catalog,
    profile: &Profile,
    search_term: &str,
    filter: StatusFilter,
) -> GroupedResult {
    let needle = search_term.trim().to_lowercase();

    let campaigns = catalog
        .campaigns
        .iter()
        .filter_map(|campaign| {
            let sections: Vec<SectionGroup> = campaign
                .sections
                .iter()
                .filter_map(|section| {
                    let quests: Vec<QuestRow> = section
                        .quests
                        .iter()
                        .filter(|q| needle.is_empty() || q.title.to_lowercase().contains(&needle))
                        .filter(|q| filter.matches(profile.status(&q.quest_key)))
                        .map(|q| QuestRow::new(q, profile))
                        .collect();
                    (!quests.is_empty()).then(|| SectionGroup {
                        name: section.name.clone(),
                        quests,
                    })
                })
                .collect();
            (!sections.is_empty()).then_some(CampaignGroup {
                campaign: campaign.campaign,
                sections,
            })
        })
        .collect();

    GroupedResult { campaigns }
}

/// Completion counts for one campaign.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CampaignProgress {
    pub campaign: Option<Campaign>,
    pub total: usize,
    pub in_progress: usize,
    pub completed: usize,
}

impl CampaignProgress {
    pub fn percent_complete(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            self.completed as f64 * 100.0 / self.total as f64
        }
    }

    fn count(&mut self, status: QuestStatus) {
        self.total += 1;
        match status {
            QuestStatus::NotStarted => {}
            QuestStatus::InProgress => self.in_progress += 1,
            QuestStatus::Completed => self.completed += 1,
        }
    }
}

/// Per-campaign and overall progress over the catalog.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSummary {
    pub campaigns: Vec<CampaignProgress>,
    pub overall: CampaignProgress,
    /// Entries for quests the catalog no longer has; not counted above
    pub orphaned: usize,
}

/// Summarise `profile` against `catalog`.
pub fn progress_summary(catalog: &Catalog, profile: &Profile) -> ProgressSummary {
    let mut summary = ProgressSummary::default();
    for campaign in &catalog.campaigns {
        let mut progress = CampaignProgress {
            campaign: Some(campaign.campaign),
            ..CampaignProgress::default()
        };
        for quest in campaign.quests() {
            let status = profile.status(&quest.quest_key);
            progress.count(status);
            summary.overall.count(status);
        }
        summary.campaigns.push(progress);
    }
    summary.orphaned = profile.orphaned_keys(catalog).len();
    summary
}
