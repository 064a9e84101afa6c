//! Built-in seed quests.
//!
//! Primary missions and LDoA milestones are not enumerated by the wiki quest
//! tables, so every build starts from this list.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{Campaign, QuestKind, QuestRecord};
use crate::utils::url::article_url;

/// One seeded quest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeedQuest {
    pub campaign: Campaign,
    pub section: String,
    pub title: String,
    pub kind: QuestKind,
}

/// Root seed data structure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub quests: Vec<SeedQuest>,
}

impl Seed {
    /// Materialise seed quests as catalog records linked to `wiki_base_url`.
    pub fn records(&self, wiki_base_url: &str, now: DateTime<Utc>) -> Vec<QuestRecord> {
        self.quests
            .iter()
            .map(|q| {
                QuestRecord::new(
                    q.campaign,
                    q.title.clone(),
                    q.section.clone(),
                    q.kind,
                    article_url(wiki_base_url, &q.title),
                    now,
                )
            })
            .collect()
    }
}

fn seed(campaign: Campaign, section: &str, kind: QuestKind, titles: &[&str]) -> Vec<SeedQuest> {
    titles
        .iter()
        .map(|title| SeedQuest {
            campaign,
            section: section.to_string(),
            title: (*title).to_string(),
            kind,
        })
        .collect()
}

impl Default for Seed {
    fn default() -> Self {
        let mut quests = Vec::new();
        quests.extend(seed(
            Campaign::Prophecies,
            "Primary Missions",
            QuestKind::Mission,
            &["The Great Northern Wall"],
        ));
        quests.extend(seed(
            Campaign::Factions,
            "Primary Missions",
            QuestKind::Mission,
            &["Minister Cho's Estate"],
        ));
        quests.extend(seed(
            Campaign::Nightfall,
            "Primary Missions",
            QuestKind::Mission,
            &["Chahbek Village"],
        ));
        quests.extend(seed(
            Campaign::Eotn,
            "Primary Missions",
            QuestKind::Mission,
            &["Boreal Station"],
        ));
        quests.extend(seed(
            Campaign::PreSearing,
            "Tutorials",
            QuestKind::Milestone,
            &["Ascalon (Pre-Searing) Tutorials"],
        ));
        quests.extend(seed(
            Campaign::Ldoa,
            "Leveling Milestones",
            QuestKind::Milestone,
            &[
                "Reach Level 10 (Charr at the Gate)",
                "Reach Level 13 (Farmer Hamnet Farm)",
                "Reach Level 16 (Vanguard Quest Scaling)",
                "Reach Level 20 (Legendary Defender)",
            ],
        ));
        quests.extend(seed(
            Campaign::Ldoa,
            "Daily Vanguard Quests",
            QuestKind::SideQuest,
            &[
                "Vanguard Rescue: Farmer Hamnet",
                "Vanguard Annihilation: Undead",
                "Vanguard Rescue: Footman Tate",
                "The Blazefiend",
                "Vanguard Annihilation: Charr",
            ],
        ));
        Self { quests }
    }
}
