//! Versioned quest catalog: campaigns → sections → quests.

use std::collections::{BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Campaign, QuestRecord};

/// Current on-disk catalog format.
pub const CATALOG_FORMAT_VERSION: u32 = 1;

/// A region or section header and its quests, in wiki order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    pub name: String,
    pub quests: Vec<QuestRecord>,
}

/// All sections of one campaign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignCatalog {
    pub campaign: Campaign,
    pub sections: Vec<Section>,
}

impl CampaignCatalog {
    /// Iterate this campaign's quests in stored order.
    pub fn quests(&self) -> impl Iterator<Item = &QuestRecord> {
        self.sections.iter().flat_map(|s| s.quests.iter())
    }

    /// Number of quests in this campaign.
    pub fn quest_count(&self) -> usize {
        self.sections.iter().map(|s| s.quests.len()).sum()
    }
}

/// Immutable, version-tagged quest catalog.
///
/// `quest_key` is unique across the whole catalog; [`Catalog::from_records`]
/// and [`Catalog::validate`] enforce it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// On-disk format version
    #[serde(default = "default_format_version")]
    pub format_version: u32,

    /// Monotonic catalog version, bumped on every committed sync
    pub version: u64,

    /// When the catalog was built
    pub built_at: DateTime<Utc>,

    /// Campaigns in [`Campaign::ALL`] order
    pub campaigns: Vec<CampaignCatalog>,
}

fn default_format_version() -> u32 {
    CATALOG_FORMAT_VERSION
}

impl Catalog {
    /// An empty catalog.
    pub fn empty(version: u64, built_at: DateTime<Utc>) -> Self {
        Self {
            format_version: CATALOG_FORMAT_VERSION,
            version,
            built_at,
            campaigns: Vec::new(),
        }
    }

    /// Assemble a catalog from de-duplicated records.
    ///
    /// Campaigns follow [`Campaign::ALL`]; sections and quests keep the order
    /// in which they first appear in `records`. Fails if two records share a
    /// `quest_key`.
    pub fn from_records(
        version: u64,
        built_at: DateTime<Utc>,
        records: Vec<QuestRecord>,
    ) -> Result<Self> {
        let mut campaigns: Vec<CampaignCatalog> = Vec::new();
        let mut seen: BTreeSet<String> = BTreeSet::new();

        for record in records {
            if !seen.insert(record.quest_key.clone()) {
                return Err(AppError::validation(format!(
                    "duplicate quest_key '{}' in catalog",
                    record.quest_key
                )));
            }

            let campaign_idx = match campaigns.iter().position(|c| c.campaign == record.campaign) {
                Some(idx) => idx,
                None => {
                    campaigns.push(CampaignCatalog {
                        campaign: record.campaign,
                        sections: Vec::new(),
                    });
                    campaigns.len() - 1
                }
            };
            let sections = &mut campaigns[campaign_idx].sections;
            match sections
                .iter_mut()
                .find(|s| s.name == record.region_or_section)
            {
                Some(section) => section.quests.push(record),
                None => sections.push(Section {
                    name: record.region_or_section.clone(),
                    quests: vec![record],
                }),
            }
        }

        campaigns.sort_by_key(|c| c.campaign.ordinal());

        Ok(Self {
            format_version: CATALOG_FORMAT_VERSION,
            version,
            built_at,
            campaigns,
        })
    }

    /// Copy of this catalog tagged with another version.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Iterate every quest in stored order.
    pub fn quests(&self) -> impl Iterator<Item = &QuestRecord> {
        self.campaigns.iter().flat_map(|c| c.quests())
    }

    /// Total number of quests.
    pub fn quest_count(&self) -> usize {
        self.campaigns.iter().map(|c| c.quest_count()).sum()
    }

    /// Set of all quest keys.
    pub fn quest_keys(&self) -> BTreeSet<&str> {
        self.quests().map(|q| q.quest_key.as_str()).collect()
    }

    /// Whether the catalog contains `key`.
    pub fn contains_key(&self, key: &str) -> bool {
        self.quests().any(|q| q.quest_key == key)
    }

    /// Look up a quest by key.
    pub fn get(&self, key: &str) -> Option<&QuestRecord> {
        self.quests().find(|q| q.quest_key == key)
    }

    /// Sections for one campaign, if present.
    pub fn campaign(&self, campaign: Campaign) -> Option<&CampaignCatalog> {
        self.campaigns.iter().find(|c| c.campaign == campaign)
    }

    /// Wiki article for a quest, for the "open in browser" pass-through.
    pub fn wiki_url(&self, key: &str) -> Option<&str> {
        self.get(key).map(|q| q.wiki_url.as_str())
    }

    /// Index of quests by key.
    pub fn index(&self) -> HashMap<&str, &QuestRecord> {
        self.quests().map(|q| (q.quest_key.as_str(), q)).collect()
    }

    /// Check structural invariants after loading from disk.
    pub fn validate(&self) -> Result<()> {
        if self.format_version > CATALOG_FORMAT_VERSION {
            return Err(AppError::validation(format!(
                "catalog format {} is newer than supported {}",
                self.format_version, CATALOG_FORMAT_VERSION
            )));
        }
        let mut seen = BTreeSet::new();
        for campaign in &self.campaigns {
            for quest in campaign.quests() {
                if quest.campaign != campaign.campaign {
                    return Err(AppError::validation(format!(
                        "quest '{}' filed under {} but belongs to {}",
                        quest.quest_key, campaign.campaign, quest.campaign
                    )));
                }
                if !seen.insert(quest.quest_key.as_str()) {
                    return Err(AppError::validation(format!(
                        "duplicate quest_key '{}' in catalog",
                        quest.quest_key
                    )));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::QuestKind;

    fn record(campaign: Campaign, title: &str, section: &str) -> QuestRecord {
        QuestRecord::new(
            campaign,
            title,
            section,
            QuestKind::SideQuest,
            format!("https://wiki.example/wiki/{}", title.replace(' ', "_")),
            Utc::now(),
        )
    }

    #[test]
    fn test_from_records_groups_in_first_seen_order() {
        let catalog = Catalog::from_records(
            1,
            Utc::now(),
            vec![
                record(Campaign::Nightfall, "A", "Istan"),
                record(Campaign::Prophecies, "B", "Ascalon"),
                record(Campaign::Nightfall, "C", "Kourna"),
                record(Campaign::Nightfall, "D", "Istan"),
            ],
        )
        .unwrap();

        assert_eq!(catalog.campaigns[0].campaign, Campaign::Prophecies);
        let nightfall = catalog.campaign(Campaign::Nightfall).unwrap();
        let names: Vec<_> = nightfall.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Istan", "Kourna"]);
        assert_eq!(nightfall.sections[0].quests.len(), 2);
        assert_eq!(catalog.quest_count(), 4);
    }

    #[test]
    fn test_from_records_rejects_duplicates() {
        let result = Catalog::from_records(
            1,
            Utc::now(),
            vec![
                record(Campaign::Factions, "Same", "One"),
                record(Campaign::Factions, "same", "Two"),
            ],
        );
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[test]
    fn test_lookup_helpers() {
        let catalog = Catalog::from_records(
            3,
            Utc::now(),
            vec![record(Campaign::Factions, "Minister Cho's Estate", "Shing Jea")],
        )
        .unwrap();
        let key = "factions:minister-chos-estate";
        assert!(catalog.contains_key(key));
        assert_eq!(
            catalog.wiki_url(key),
            Some("https://wiki.example/wiki/Minister_Cho's_Estate")
        );
        assert!(catalog.validate().is_ok());
    }
}
