//! Per-character progress records.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::models::{Campaign, Catalog};

/// Current profile document schema.
pub const PROFILE_SCHEMA_VERSION: u32 = 2;

/// Longest accepted profile name, in characters.
pub const MAX_PROFILE_NAME_LEN: usize = 64;

/// Tri-state quest progress.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestStatus {
    #[default]
    NotStarted,
    InProgress,
    Completed,
}

impl fmt::Display for QuestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            QuestStatus::NotStarted => "Not Started",
            QuestStatus::InProgress => "In Progress",
            QuestStatus::Completed => "Completed",
        })
    }
}

impl FromStr for QuestStatus {
    type Err = AppError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match normalized.as_str() {
            "notstarted" | "todo" | "none" => Ok(QuestStatus::NotStarted),
            "inprogress" | "started" | "active" => Ok(QuestStatus::InProgress),
            "completed" | "complete" | "done" => Ok(QuestStatus::Completed),
            _ => Err(AppError::validation(format!("unknown quest status '{s}'"))),
        }
    }
}

/// Progress on one quest, owned by exactly one profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub status: QuestStatus,

    /// Set on entering Completed, cleared on leaving it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Append-only record of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionEvent {
    pub quest_key: String,
    pub completed_at: DateTime<Utc>,
}

/// Outcome of a status transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusChange {
    Unchanged,
    Changed {
        from: QuestStatus,
        to: QuestStatus,
    },
}

/// Counts from reconciling a profile against a catalog.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// NotStarted entries inserted for newly discovered quests
    pub inserted: usize,
    /// Entries retained although the catalog no longer has them
    pub orphaned: usize,
}

impl ReconcileStats {
    pub fn changed(&self) -> bool {
        self.inserted > 0
    }
}

/// One character's progress, independent of the catalog lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(default = "first_schema_version")]
    pub schema_version: u32,

    /// User-chosen character name, unique within the store
    pub name: String,

    #[serde(default)]
    pub progress: BTreeMap<String, ProgressEntry>,

    #[serde(default)]
    pub history: Vec<CompletionEvent>,
}

fn first_schema_version() -> u32 {
    1
}

impl Profile {
    /// Empty profile with the current schema.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            schema_version: PROFILE_SCHEMA_VERSION,
            name: name.into(),
            progress: BTreeMap::new(),
            history: Vec::new(),
        }
    }

    /// Status for `key`; unknown keys are NotStarted.
    pub fn status(&self, key: &str) -> QuestStatus {
        self.progress
            .get(key)
            .map(|e| e.status)
            .unwrap_or_default()
    }

    /// Progress entry for `key`, if recorded.
    pub fn entry(&self, key: &str) -> Option<&ProgressEntry> {
        self.progress.get(key)
    }

    /// Transition `key` to `status`, stamped with the current time.
    pub fn set_status(&mut self, key: &str, status: QuestStatus) -> StatusChange {
        self.set_status_at(key, status, Utc::now())
    }

    /// Transition `key` to `status` at `now`.
    ///
    /// Entering Completed stamps `completed_at` and appends a history event;
    /// leaving Completed clears `completed_at`. History is never rewritten.
    pub fn set_status_at(
        &mut self,
        key: &str,
        status: QuestStatus,
        now: DateTime<Utc>,
    ) -> StatusChange {
        let entry = self.progress.entry(key.to_string()).or_default();
        let from = entry.status;
        if from == status {
            return StatusChange::Unchanged;
        }

        entry.status = status;
        if status == QuestStatus::Completed {
            entry.completed_at = Some(now);
            self.history.push(CompletionEvent {
                quest_key: key.to_string(),
                completed_at: now,
            });
        } else if from == QuestStatus::Completed {
            entry.completed_at = None;
        }

        StatusChange::Changed { from, to: status }
    }

    /// Set many quests to one status; returns how many changed.
    pub fn set_bulk<'a>(
        &mut self,
        keys: impl IntoIterator<Item = &'a str>,
        status: QuestStatus,
        now: DateTime<Utc>,
    ) -> usize {
        let mut changed = 0;
        for key in keys {
            if self.set_status_at(key, status, now) != StatusChange::Unchanged {
                changed += 1;
            }
        }
        changed
    }

    /// Reset every catalog quest of `campaign` to NotStarted. History is kept.
    pub fn reset_campaign(&mut self, catalog: &Catalog, campaign: Campaign) -> usize {
        let keys: Vec<String> = catalog
            .campaign(campaign)
            .map(|c| c.quests().map(|q| q.quest_key.clone()).collect())
            .unwrap_or_default();
        self.set_bulk(keys.iter().map(String::as_str), QuestStatus::NotStarted, Utc::now())
    }

    /// Attach or clear free-text notes on a quest.
    pub fn set_notes(&mut self, key: &str, notes: Option<String>) {
        let notes = notes
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());
        self.progress.entry(key.to_string()).or_default().notes = notes;
    }

    /// Merge a catalog into this profile without discarding progress.
    ///
    /// Missing catalog keys get a NotStarted entry; entries the catalog no
    /// longer has are kept untouched. Running it twice is a no-op.
    pub fn reconcile(&mut self, catalog: &Catalog) -> ReconcileStats {
        let mut stats = ReconcileStats::default();
        for quest in catalog.quests() {
            if !self.progress.contains_key(&quest.quest_key) {
                self.progress
                    .insert(quest.quest_key.clone(), ProgressEntry::default());
                stats.inserted += 1;
            }
        }
        stats.orphaned = self.orphaned_keys(catalog).len();
        self.migrate();
        stats
    }

    /// Upgrade an older document to [`PROFILE_SCHEMA_VERSION`].
    ///
    /// Version 1 had no history; completed entries get one event each from
    /// their `completed_at`. Returns whether anything changed.
    pub fn migrate(&mut self) -> bool {
        if self.schema_version >= PROFILE_SCHEMA_VERSION {
            return false;
        }
        if self.schema_version < 2 {
            for (key, entry) in &self.progress {
                let Some(completed_at) = entry.completed_at else {
                    continue;
                };
                if entry.status != QuestStatus::Completed {
                    continue;
                }
                if !self.history.iter().any(|e| e.quest_key == *key) {
                    self.history.push(CompletionEvent {
                        quest_key: key.clone(),
                        completed_at,
                    });
                }
            }
            self.history.sort_by_key(|e| e.completed_at);
        }
        self.schema_version = PROFILE_SCHEMA_VERSION;
        true
    }

    /// Non-mutating form of [`Profile::reconcile`].
    pub fn reconciled(&self, catalog: &Catalog) -> Profile {
        let mut profile = self.clone();
        profile.reconcile(catalog);
        profile
    }

    /// Keys with progress entries that the catalog does not contain.
    pub fn orphaned_keys(&self, catalog: &Catalog) -> Vec<&str> {
        let keys = catalog.quest_keys();
        self.progress
            .keys()
            .map(String::as_str)
            .filter(|k| !keys.contains(k))
            .collect()
    }

    /// Orphaned entries, for history and export views.
    pub fn orphaned_entries<'a>(
        &'a self,
        catalog: &Catalog,
    ) -> Vec<(&'a str, &'a ProgressEntry)> {
        let keys = catalog.quest_keys();
        self.progress
            .iter()
            .filter(|(k, _)| !keys.contains(k.as_str()))
            .map(|(k, e)| (k.as_str(), e))
            .collect()
    }

    /// Completion events for one quest, oldest first.
    pub fn history_for<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a CompletionEvent> {
        self.history.iter().filter(move |e| e.quest_key == key)
    }
}

/// Reject names that cannot identify a profile.
pub fn validate_profile_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(AppError::validation("profile name is empty"));
    }
    if trimmed.chars().count() > MAX_PROFILE_NAME_LEN {
        return Err(AppError::validation(format!(
            "profile name longer than {MAX_PROFILE_NAME_LEN} characters"
        )));
    }
    if trimmed.chars().any(char::is_control) {
        return Err(AppError::validation("profile name contains control characters"));
    }
    Ok(trimmed)
}
