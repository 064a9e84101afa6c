// src/services/legacy.rs

//! Legacy profile documents.
//!
//! Older exports carried no `quest_key` and a numeric status vocabulary.
//! Two layouts are understood:
//!
//! ```text
//! flat:         { "<title>": true | 0..2 | { "status": 0..2, "timestamp": "..." } }
//! categorized:  { "<category>": { "<title>": <same values as flat> } }
//! ```
//!
//! Categories map onto campaigns through a fixed table; flat titles are
//! matched against the catalog. Records that cannot be mapped are reported
//! as [`SkippedRecord`]s and never fail the import.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Result};
use crate::models::{Campaign, Catalog, QuestStatus, quest_key, title_slug};

/// Timestamp layouts written by older versions, interpreted as UTC.
const LEGACY_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%m / %d / %Y %I:%M %p",
];

/// Category names used by older exports.
const CATEGORY_TABLE: &[(&str, Campaign)] = &[
    ("prophecies", Campaign::Prophecies),
    ("factions", Campaign::Factions),
    ("nightfall", Campaign::Nightfall),
    ("eye of the north", Campaign::Eotn),
    ("eotn", Campaign::Eotn),
    ("gw:eotn", Campaign::Eotn),
    ("pre-searing", Campaign::PreSearing),
    ("presearing", Campaign::PreSearing),
    ("pre searing", Campaign::PreSearing),
    ("ascalon (pre-searing)", Campaign::PreSearing),
    ("ldoa", Campaign::Ldoa),
    ("legendary defender of ascalon", Campaign::Ldoa),
];

/// Layout of an imported legacy document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum LegacyFormat {
    Flat,
    Categorized,
}

/// A legacy record that could not be mapped onto a current quest key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRecord {
    /// Title as written in the legacy document
    pub identifier: String,
    /// Category it was filed under, for categorized documents
    pub category: Option<String>,
    pub reason: String,
}

/// A legacy record mapped onto the current key space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedRecord {
    pub quest_key: String,
    pub status: QuestStatus,
    pub completed_at: Option<DateTime<Utc>>,
}

/// Result of mapping a whole legacy document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyImport {
    pub format: LegacyFormat,
    pub mapped: Vec<MappedRecord>,
    pub skipped: Vec<SkippedRecord>,
}

/// Campaign for a legacy category name.
pub fn campaign_for_category(name: &str) -> Option<Campaign> {
    let wanted = name.trim().to_lowercase();
    CATEGORY_TABLE
        .iter()
        .find(|(category, _)| *category == wanted)
        .map(|(_, campaign)| *campaign)
}

/// Parse a legacy timestamp; empty or unknown layouts give `None`.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.with_timezone(&Utc));
    }
    LEGACY_TIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Status from the old vocabulary: booleans, 0..2, or words.
fn parse_status(value: &Value) -> std::result::Result<QuestStatus, String> {
    match value {
        Value::Bool(true) => Ok(QuestStatus::Completed),
        Value::Bool(false) | Value::Null => Ok(QuestStatus::NotStarted),
        Value::Number(n) => match n.as_u64() {
            Some(0) => Ok(QuestStatus::NotStarted),
            Some(1) => Ok(QuestStatus::InProgress),
            Some(2) => Ok(QuestStatus::Completed),
            _ => Err(format!("unknown status {n}")),
        },
        Value::String(s) => match s.trim().parse::<u64>() {
            Ok(n) => parse_status(&Value::from(n)),
            Err(_) => s.parse().map_err(|_| format!("unknown status '{s}'")),
        },
        _ => Err("status is not a value".to_string()),
    }
}

/// Status and completion time of one legacy value.
fn parse_value(
    value: &Value,
) -> std::result::Result<(QuestStatus, Option<DateTime<Utc>>), String> {
    match value {
        Value::Object(fields) => {
            let status = parse_status(fields.get("status").unwrap_or(&Value::Null))?;
            let completed_at = fields
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(parse_timestamp);
            Ok((status, completed_at))
        }
        other => Ok((parse_status(other)?, None)),
    }
}

/// A nested map without its own `status` is a category of records.
fn is_category(value: &Value) -> bool {
    value
        .as_object()
        .is_some_and(|fields| !fields.contains_key("status"))
}

/// Catalog quests by title slug; ambiguous slugs map to every match.
fn title_index(catalog: &Catalog) -> HashMap<String, Vec<String>> {
    let mut index: HashMap<String, Vec<String>> = HashMap::new();
    for quest in catalog.quests() {
        // Keys carry the untruncated title slug
        let slug = quest
            .quest_key
            .split_once(':')
            .map_or_else(|| title_slug(&quest.title), |(_, slug)| slug.to_string());
        index.entry(slug).or_default().push(quest.quest_key.clone());
    }
    index
}

struct Mapper<'a> {
    titles: HashMap<String, Vec<String>>,
    catalog: &'a Catalog,
    mapped: Vec<MappedRecord>,
    skipped: Vec<SkippedRecord>,
}

impl Mapper<'_> {
    fn skip(&mut self, identifier: &str, category: Option<&str>, reason: impl Into<String>) {
        let record = SkippedRecord {
            identifier: identifier.to_string(),
            category: category.map(str::to_string),
            reason: reason.into(),
        };
        log::warn!(
            "Skipping legacy record '{}' ({}): {}",
            record.identifier,
            record.category.as_deref().unwrap_or("uncategorized"),
            record.reason
        );
        self.skipped.push(record);
    }

    fn push(&mut self, key: String, value: &Value, identifier: &str, category: Option<&str>) {
        match parse_value(value) {
            Ok((status, completed_at)) => self.mapped.push(MappedRecord {
                quest_key: key,
                status,
                completed_at,
            }),
            Err(reason) => self.skip(identifier, category, reason),
        }
    }

    /// Flat records are matched to the catalog by title.
    fn flat(&mut self, title: &str, value: &Value) {
        let slug = title_slug(title);
        let keys = self.titles.get(&slug).cloned().unwrap_or_default();
        match keys.as_slice() {
            [key] => self.push(key.clone(), value, title, None),
            [] => self.skip(title, None, "no catalog quest with this title"),
            _ => self.skip(title, None, "title matches quests in several campaigns"),
        }
    }

    /// Categorized records derive their key from the category's campaign.
    fn categorized(&mut self, category: &str, records: &Map<String, Value>) {
        let Some(campaign) = campaign_for_category(category) else {
            for title in records.keys() {
                self.skip(title, Some(category), "unknown category");
            }
            return;
        };
        for (title, value) in records {
            let key = quest_key(campaign, title);
            if !self.catalog.contains_key(&key) {
                log::debug!("Legacy record {key} is not in the current catalog");
            }
            self.push(key, value, title, Some(category));
        }
    }
}

/// Map a legacy document onto current quest keys.
pub fn map_legacy(document: &Value, catalog: &Catalog) -> Result<LegacyImport> {
    let Some(entries) = document.as_object() else {
        return Err(AppError::import("legacy document is not a JSON object"));
    };

    let format = if entries.values().any(is_category) {
        LegacyFormat::Categorized
    } else {
        LegacyFormat::Flat
    };

    let mut mapper = Mapper {
        titles: title_index(catalog),
        catalog,
        mapped: Vec::new(),
        skipped: Vec::new(),
    };
    for (name, value) in entries {
        match value.as_object() {
            Some(records) if is_category(value) => mapper.categorized(name, records),
            _ => mapper.flat(name, value),
        }
    }

    log::info!(
        "Legacy {:?} document: {} records mapped, {} skipped",
        format,
        mapper.mapped.len(),
        mapper.skipped.len()
    );
    Ok(LegacyImport {
        format,
        mapped: mapper.mapped,
        skipped: mapper.skipped,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{QuestKind, QuestRecord};
    use serde_json::json;

    fn catalog() -> Catalog {
        let now = Utc::now();
        let record = |campaign, title: &str| {
            QuestRecord::new(
                campaign,
                title,
                "Section",
                QuestKind::SideQuest,
                "https://wiki.example/wiki/x",
                now,
            )
        };
        Catalog::from_records(
            1,
            now,
            vec![
                record(Campaign::Prophecies, "Charr at the Gate"),
                record(Campaign::Ldoa, "The Blazefiend"),
                record(Campaign::Prophecies, "Shared Name"),
                record(Campaign::Factions, "Shared Name"),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_flat_document() {
        let doc = json!({
            "Charr at the Gate": {"status": 2, "timestamp": "2024-03-01 18:30"},
            "The Blazefiend": 1,
            "Shared Name": true,
            "Gone Quest": true
        });
        let import = map_legacy(&doc, &catalog()).unwrap();

        assert_eq!(import.format, LegacyFormat::Flat);
        assert_eq!(import.mapped.len(), 2);
        let charr = import
            .mapped
            .iter()
            .find(|m| m.quest_key == "prophecies:charr-at-the-gate")
            .unwrap();
        assert_eq!(charr.status, QuestStatus::Completed);
        assert_eq!(
            charr.completed_at,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 18, 30, 0).unwrap())
        );
        assert_eq!(import.skipped.len(), 2);
    }

    #[test]
    fn test_categorized_document_skips_unknown_category() {
        let doc = json!({
            "Prophecies": {"Charr at the Gate": {"status": 2, "timestamp": "03 / 01 / 2024 06:30 PM"}},
            "LDoA": {"The Blazefiend": {"status": "In Progress"}},
            "Beyond": {"War in Kryta": 2}
        });
        let import = map_legacy(&doc, &catalog()).unwrap();

        assert_eq!(import.format, LegacyFormat::Categorized);
        assert_eq!(import.mapped.len(), 2);
        assert_eq!(
            import.skipped,
            vec![SkippedRecord {
                identifier: "War in Kryta".into(),
                category: Some("Beyond".into()),
                reason: "unknown category".into(),
            }]
        );
    }

    #[test]
    fn test_bad_status_is_skipped() {
        let doc = json!({"Charr at the Gate": 7});
        let import = map_legacy(&doc, &catalog()).unwrap();
        assert!(import.mapped.is_empty());
        assert_eq!(import.skipped.len(), 1);
    }

    #[test]
    fn test_non_object_document_fails() {
        assert!(map_legacy(&json!([1, 2]), &catalog()).is_err());
    }

    #[test]
    fn test_category_table() {
        assert_eq!(campaign_for_category("Eye of the North"), Some(Campaign::Eotn));
        assert_eq!(campaign_for_category(" ldoa "), Some(Campaign::Ldoa));
        assert_eq!(campaign_for_category("Beyond"), None);
    }
}
