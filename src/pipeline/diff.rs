//! Catalog diff by `quest_key`.
//!
//! `added` and `removed` are plain key-set differences per campaign. Renames
//! (a removed and an added key sharing a wiki article) and moves (same key,
//! different section) are reported on top of them, never instead of them.

use std::collections::{BTreeSet, HashMap};

use serde::Serialize;

use crate::models::{Campaign, Catalog, QuestRecord};

/// A quest that reappeared under a new key at the same wiki article.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Rename {
    pub from_key: String,
    pub to_key: String,
    pub wiki_url: String,
}

/// A quest whose section changed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Move {
    pub quest_key: String,
    pub from_section: String,
    pub to_section: String,
}

/// Changes within one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CampaignDiff {
    pub campaign: Campaign,
    /// Keys only in the new catalog, in its order
    pub added: Vec<String>,
    /// Keys only in the previous catalog, in its order
    pub removed: Vec<String>,
    pub unchanged: usize,
    pub renamed: Vec<Rename>,
    pub moved: Vec<Move>,
    /// Same key with a different title, kind, or article
    pub updated: Vec<String>,
}

impl CampaignDiff {
    fn new(campaign: Campaign) -> Self {
        Self {
            campaign,
            added: Vec::new(),
            removed: Vec::new(),
            unchanged: 0,
            renamed: Vec::new(),
            moved: Vec::new(),
            updated: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.added.is_empty()
            || !self.removed.is_empty()
            || !self.moved.is_empty()
            || !self.updated.is_empty()
    }
}

/// Diff between two catalogs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CatalogDiff {
    /// One entry per campaign present in either catalog, in catalog order
    pub campaigns: Vec<CampaignDiff>,
}

impl CatalogDiff {
    pub fn has_changes(&self) -> bool {
        self.campaigns.iter().any(CampaignDiff::has_changes)
    }

    pub fn added(&self) -> usize {
        self.campaigns.iter().map(|c| c.added.len()).sum()
    }

    pub fn removed(&self) -> usize {
        self.campaigns.iter().map(|c| c.removed.len()).sum()
    }

    pub fn unchanged(&self) -> usize {
        self.campaigns.iter().map(|c| c.unchanged).sum()
    }

    pub fn renamed(&self) -> impl Iterator<Item = &Rename> {
        self.campaigns.iter().flat_map(|c| c.renamed.iter())
    }

    pub fn campaign(&self, campaign: Campaign) -> Option<&CampaignDiff> {
        self.campaigns.iter().find(|c| c.campaign == campaign)
    }
}

/// Calculator for computing diffs between catalogs.
#[derive(Debug, Clone)]
pub struct DiffCalculator {
    /// Whether to pair removed and added keys by wiki article
    detect_renames: bool,
}

impl Default for DiffCalculator {
    fn default() -> Self {
        Self::new()
    }
}

impl DiffCalculator {
    pub fn new() -> Self {
        Self {
            detect_renames: true,
        }
    }

    /// Calculator that only reports key-set changes, moves and updates.
    pub fn without_renames() -> Self {
        Self {
            detect_renames: false,
        }
    }

    /// Diff `current` against `previous`; no previous catalog means every
    /// key is added.
    pub fn calculate(&self, previous: Option<&Catalog>, current: &Catalog) -> CatalogDiff {
        let campaigns: BTreeSet<Campaign> = previous
            .into_iter()
            .flat_map(|c| c.campaigns.iter())
            .chain(current.campaigns.iter())
            .map(|c| c.campaign)
            .collect();

        let mut ordered: Vec<Campaign> = campaigns.into_iter().collect();
        ordered.sort_by_key(|c| c.ordinal());

        CatalogDiff {
            campaigns: ordered
                .into_iter()
                .map(|campaign| {
                    let prev: Vec<&QuestRecord> = previous
                        .and_then(|c| c.campaign(campaign))
                        .map(|c| c.quests().collect())
                        .unwrap_or_default();
                    let curr: Vec<&QuestRecord> = current
                        .campaign(campaign)
                        .map(|c| c.quests().collect())
                        .unwrap_or_default();
                    self.campaign_diff(campaign, &prev, &curr)
                })
                .collect(),
        }
    }

    fn campaign_diff(
        &self,
        campaign: Campaign,
        previous: &[&QuestRecord],
        current: &[&QuestRecord],
    ) -> CampaignDiff {
        let prev_map: HashMap<&str, &QuestRecord> = previous
            .iter()
            .map(|q| (q.quest_key.as_str(), *q))
            .collect();
        let curr_map: HashMap<&str, &QuestRecord> = current
            .iter()
            .map(|q| (q.quest_key.as_str(), *q))
            .collect();

        let mut diff = CampaignDiff::new(campaign);

        for quest in current {
            match prev_map.get(quest.quest_key.as_str()) {
                None => diff.added.push(quest.quest_key.clone()),
                Some(prev) => {
                    diff.unchanged += 1;
                    if prev.region_or_section != quest.region_or_section {
                        diff.moved.push(Move {
                            quest_key: quest.quest_key.clone(),
                            from_section: prev.region_or_section.clone(),
                            to_section: quest.region_or_section.clone(),
                        });
                    }
                    if prev.title != quest.title
                        || prev.kind != quest.kind
                        || prev.wiki_url != quest.wiki_url
                    {
                        diff.updated.push(quest.quest_key.clone());
                    }
                }
            }
        }
        diff.removed = previous
            .iter()
            .filter(|q| !curr_map.contains_key(q.quest_key.as_str()))
            .map(|q| q.quest_key.clone())
            .collect();

        if self.detect_renames {
            let added_by_url: HashMap<&str, &str> = diff
                .added
                .iter()
                .filter_map(|k| curr_map.get(k.as_str()))
                .map(|q| (q.wiki_url.as_str(), q.quest_key.as_str()))
                .collect();
            diff.renamed = diff
                .removed
                .iter()
                .filter_map(|k| prev_map.get(k.as_str()))
                .filter_map(|q| {
                    added_by_url.get(q.wiki_url.as_str()).map(|to| Rename {
                        from_key: q.quest_key.clone(),
                        to_key: to.to_string(),
                        wiki_url: q.wiki_url.clone(),
                    })
                })
                .collect();
        }

        diff
    }
}

/// Convenience function to calculate a diff.
pub fn calculate_diff(previous: Option<&Catalog>, current: &Catalog) -> CatalogDiff {
    DiffCalculator::new().calculate(previous, current)
}
