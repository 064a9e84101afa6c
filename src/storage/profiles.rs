//! Profile persistence.
//!
//! One JSON document per profile under `profiles/`. The file name is a slug
//! of the profile name plus a short hash, so names differing only in
//! punctuation or case never collide. Writes for one profile are serialised
//! through a per-name async mutex.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::error::{AppError, Result};
use crate::models::{
    Catalog, CompletionEvent, Profile, ProgressEntry, QuestStatus, ReconcileStats, StatusChange,
    title_slug, validate_profile_name,
};
use crate::services::legacy::{self, LegacyFormat, MappedRecord, SkippedRecord};
use crate::storage::LocalStore;
use crate::storage::local::write_atomic;

/// Which schema an imported document used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ImportFormat {
    Current,
    Legacy(LegacyFormat),
}

/// Outcome of an import.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Profile the records were merged into
    pub profile: String,
    pub format: ImportFormat,
    /// Records applied to the profile
    pub mapped: usize,
    /// Records that could not be mapped onto a quest key
    pub skipped: Vec<SkippedRecord>,
}

/// Store of per-character profiles.
#[derive(Clone)]
pub struct ProfileStore {
    store: LocalStore,
    locks: Arc<Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>>,
}

impl ProfileStore {
    pub fn new(store: LocalStore) -> Self {
        Self {
            store,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Document key for a (validated) profile name.
    fn key(name: &str) -> String {
        let slug = title_slug(name);
        let slug = if slug.is_empty() { "profile" } else { &slug };
        let hash = hex::encode(Sha256::digest(name.as_bytes()));
        format!("{}-{}.json", slug, &hash[..8])
    }

    fn lock_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(name.to_string()).or_default())
    }

    /// Drop the lock entry for `name` unless another task still holds a
    /// handle to it. `lock` is the caller's own handle.
    fn release_lock(&self, name: &str, lock: &Arc<tokio::sync::Mutex<()>>) {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map plus the caller's
        if Arc::strong_count(lock) == 2 {
            locks.remove(name);
        }
    }

    /// Read a stored profile, upgrading older schemas in memory.
    async fn read(&self, name: &str) -> Result<Option<Profile>> {
        let Some(mut profile) = self.store.read_json::<Profile>(&Self::key(name)).await? else {
            return Ok(None);
        };
        if profile.name != name {
            return Err(AppError::validation(format!(
                "profile file for '{}' holds profile '{}'",
                name, profile.name
            )));
        }
        if profile.migrate() {
            log::info!("Upgraded profile '{}' to the current schema", name);
        }
        Ok(Some(profile))
    }

    async fn write(&self, profile: &Profile) -> Result<()> {
        self.store.write_json(&Self::key(&profile.name), profile).await
    }

    /// Load `name`, creating and persisting an empty profile on first use.
    pub async fn load(&self, name: &str) -> Result<Profile> {
        let name = validate_profile_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        if let Some(profile) = self.read(name).await? {
            return Ok(profile);
        }
        let profile = Profile::new(name);
        self.write(&profile).await?;
        log::info!("Created profile '{}'", name);
        Ok(profile)
    }

    /// Load `name` without creating it.
    pub async fn get(&self, name: &str) -> Result<Option<Profile>> {
        let name = validate_profile_name(name)?;
        self.read(name).await
    }

    /// Persist `profile`, replacing the stored document atomically.
    ///
    /// The name must already be in canonical (trimmed) form, the form
    /// [`ProfileStore::load`] and [`ProfileStore::get`] look it up by.
    pub async fn save(&self, profile: &Profile) -> Result<()> {
        if validate_profile_name(&profile.name)? != profile.name {
            return Err(AppError::validation(format!(
                "profile name '{}' has surrounding whitespace",
                profile.name
            )));
        }
        let lock = self.lock_for(&profile.name);
        let _guard = lock.lock().await;
        self.write(profile).await
    }

    /// Names of all stored profiles, sorted.
    pub async fn list_profiles(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        for key in self.store.list_json().await? {
            match self.store.read_json::<Profile>(&key).await {
                Ok(Some(profile)) => names.push(profile.name),
                Ok(None) => {}
                Err(e) => log::warn!("Skipping unreadable profile file {key}: {e}"),
            }
        }
        names.sort_by(|a, b| a.to_lowercase().cmp(&b.to_lowercase()).then_with(|| a.cmp(b)));
        Ok(names)
    }

    /// Delete a profile; returns whether it existed.
    pub async fn delete(&self, name: &str) -> Result<bool> {
        let name = validate_profile_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;
        let removed = self.store.remove(&Self::key(name)).await?;
        if removed {
            log::info!("Deleted profile '{}'", name);
        }
        self.release_lock(name, &lock);
        Ok(removed)
    }

    /// Read-modify-write of one profile under its lock.
    ///
    /// The profile is created when missing. Nothing is written if `f`
    /// returns an error.
    pub async fn try_update<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Profile) -> Result<T>,
    {
        let name = validate_profile_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let mut profile = self
            .read(name)
            .await?
            .unwrap_or_else(|| Profile::new(name));
        let value = f(&mut profile)?;
        self.write(&profile).await?;
        Ok(value)
    }

    /// Infallible form of [`ProfileStore::try_update`].
    pub async fn update<T, F>(&self, name: &str, f: F) -> Result<T>
    where
        F: FnOnce(&mut Profile) -> T,
    {
        self.try_update(name, |profile| Ok(f(profile))).await
    }

    /// Read-modify-write of a profile that must already exist.
    ///
    /// Returns `Ok(None)` without writing when the profile is missing, so a
    /// profile deleted meanwhile stays deleted.
    pub async fn update_existing<T, F>(&self, name: &str, f: F) -> Result<Option<T>>
    where
        F: FnOnce(&mut Profile) -> T,
    {
        let name = validate_profile_name(name)?;
        let lock = self.lock_for(name);
        let _guard = lock.lock().await;

        let Some(mut profile) = self.read(name).await? else {
            return Ok(None);
        };
        let value = f(&mut profile);
        self.write(&profile).await?;
        Ok(Some(value))
    }

    /// Transition one quest of a stored profile.
    pub async fn set_status(
        &self,
        name: &str,
        quest_key: &str,
        status: QuestStatus,
    ) -> Result<StatusChange> {
        self.update(name, |profile| profile.set_status(quest_key, status))
            .await
    }

    /// Reconcile a stored profile against `catalog` and persist it.
    ///
    /// A profile that no longer exists is skipped and yields `None`.
    pub async fn reconcile(
        &self,
        name: &str,
        catalog: &Catalog,
    ) -> Result<Option<ReconcileStats>> {
        let stats = self
            .update_existing(name, |profile| profile.reconcile(catalog))
            .await?;
        match &stats {
            Some(stats) if stats.orphaned > 0 => {
                log::info!(
                    "Profile '{}' keeps {} orphaned entries",
                    name,
                    stats.orphaned
                );
            }
            Some(_) => {}
            None => log::info!("Profile '{}' was deleted; not reconciled", name),
        }
        Ok(stats)
    }

    /// Write a profile in the current schema to `path`.
    pub async fn export(&self, name: &str, path: &Path) -> Result<()> {
        let profile = self
            .get(name)
            .await?
            .ok_or_else(|| AppError::validation(format!("no profile named '{name}'")))?;
        let bytes = serde_json::to_vec_pretty(&profile)?;
        write_atomic(path, &bytes).await?;
        log::info!("Exported profile '{}' to {}", name, path.display());
        Ok(())
    }

    /// Import a profile document from `path`.
    ///
    /// See [`ProfileStore::import_document`].
    pub async fn import(
        &self,
        path: &Path,
        target: Option<&str>,
        catalog: &Catalog,
    ) -> Result<ImportReport> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| AppError::store(path, e))?;
        let document: Value = serde_json::from_slice(&bytes)
            .map_err(|e| AppError::import(format!("{} is not JSON: {e}", path.display())))?;
        self.import_document(&document, target, catalog).await
    }

    /// Merge a current-schema or legacy document into a profile.
    ///
    /// Current documents default to their own name; legacy documents carry
    /// none and need `target`. The merged profile is reconciled against
    /// `catalog` and saved.
    pub async fn import_document(
        &self,
        document: &Value,
        target: Option<&str>,
        catalog: &Catalog,
    ) -> Result<ImportReport> {
        let now = Utc::now();

        if is_current_schema(document) {
            let mut imported: Profile = serde_json::from_value(document.clone())
                .map_err(|e| AppError::import(format!("invalid profile document: {e}")))?;
            imported.migrate();
            let name = target.unwrap_or(&imported.name).to_string();
            let mapped = self
                .update(&name, |profile| {
                    let mapped = merge_profile(profile, &imported);
                    profile.reconcile(catalog);
                    mapped
                })
                .await?;
            log::info!("Imported {} entries into profile '{}'", mapped, name);
            return Ok(ImportReport {
                profile: name,
                format: ImportFormat::Current,
                mapped,
                skipped: Vec::new(),
            });
        }

        let name = target
            .ok_or_else(|| AppError::import("legacy documents need a target profile name"))?
            .to_string();
        let legacy = legacy::map_legacy(document, catalog)?;
        let mapped = legacy.mapped.len();
        self.update(&name, |profile| {
            for record in &legacy.mapped {
                apply_legacy(profile, record, now);
            }
            profile.reconcile(catalog);
        })
        .await?;

        Ok(ImportReport {
            profile: name,
            format: ImportFormat::Legacy(legacy.format),
            mapped,
            skipped: legacy.skipped,
        })
    }
}

fn is_current_schema(document: &Value) -> bool {
    document
        .as_object()
        .is_some_and(|fields| fields.get("progress").is_some_and(Value::is_object))
}

fn push_history(profile: &mut Profile, quest_key: &str, completed_at: DateTime<Utc>) {
    let exists = profile
        .history
        .iter()
        .any(|e| e.quest_key == quest_key && e.completed_at == completed_at);
    if !exists {
        profile.history.push(CompletionEvent {
            quest_key: quest_key.to_string(),
            completed_at,
        });
    }
}

/// Overlay imported progress; NotStarted entries without notes leave the
/// target untouched. Returns the number of entries applied.
fn merge_profile(profile: &mut Profile, imported: &Profile) -> usize {
    let mut applied = 0;
    for (key, entry) in &imported.progress {
        if entry.status == QuestStatus::NotStarted && entry.notes.is_none() {
            continue;
        }
        profile.progress.insert(key.clone(), entry.clone());
        applied += 1;
    }
    for event in &imported.history {
        push_history(profile, &event.quest_key, event.completed_at);
    }
    profile.history.sort_by_key(|e| e.completed_at);
    applied
}

fn apply_legacy(profile: &mut Profile, record: &MappedRecord, now: DateTime<Utc>) {
    match record.status {
        QuestStatus::NotStarted => {}
        QuestStatus::InProgress => {
            let entry = profile.progress.entry(record.quest_key.clone()).or_default();
            entry.status = QuestStatus::InProgress;
            entry.completed_at = None;
        }
        QuestStatus::Completed => {
            let completed_at = record.completed_at.unwrap_or(now);
            let notes = profile
                .progress
                .get(&record.quest_key)
                .and_then(|e| e.notes.clone());
            profile.progress.insert(
                record.quest_key.clone(),
                ProgressEntry {
                    status: QuestStatus::Completed,
                    completed_at: Some(completed_at),
                    notes,
                },
            );
            push_history(profile, &record.quest_key, completed_at);
            profile.history.sort_by_key(|e| e.completed_at);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Campaign, QuestKind, QuestRecord};
    use serde_json::json;
    use tempfile::TempDir;

    fn store(dir: &TempDir) -> ProfileStore {
        ProfileStore::new(LocalStore::new(dir.path().join("profiles")))
    }

    fn catalog() -> Catalog {
        let now = Utc::now();
        let record = |title: &str| {
            QuestRecord::new(
                Campaign::Prophecies,
                title,
                "Ascalon",
                QuestKind::SideQuest,
                "https://wiki.example/wiki/x",
                now,
            )
        };
        Catalog::from_records(1, now, vec![record("Charr at the Gate"), record("Grawl Invasion")])
            .unwrap()
    }

    #[tokio::test]
    async fn test_load_creates_and_persists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);

        let profile = store.load("Main Char").await.unwrap();
        assert_eq!(profile.name, "Main Char");
        assert!(profile.progress.is_empty());
        assert_eq!(store.list_profiles().await.unwrap(), vec!["Main Char"]);
    }

    #[tokio::test]
    async fn test_names_do_not_collide() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.load("Alt").await.unwrap();
        store.load("alt").await.unwrap();
        store.load("Zed").await.unwrap();

        assert_eq!(store.list_profiles().await.unwrap(), vec!["Alt", "alt", "Zed"]);
        assert!(store.delete("alt").await.unwrap());
        assert_eq!(store.list_profiles().await.unwrap(), vec!["Alt", "Zed"]);
        assert!(store.load("").await.is_err());
    }

    #[tokio::test]
    async fn test_set_status_persists() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let change = store
            .set_status("Main", "prophecies:charr-at-the-gate", QuestStatus::Completed)
            .await
            .unwrap();
        assert!(matches!(change, StatusChange::Changed { .. }));

        let profile = store.load("Main").await.unwrap();
        assert_eq!(
            profile.status("prophecies:charr-at-the-gate"),
            QuestStatus::Completed
        );
        assert_eq!(profile.history.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_updates_are_serialised() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let keys: Vec<String> = (0..16).map(|i| format!("prophecies:q{i}")).collect();

        let tasks = keys.iter().map(|key| {
            let store = store.clone();
            let key = key.clone();
            tokio::spawn(async move {
                store
                    .set_status("Main", &key, QuestStatus::InProgress)
                    .await
            })
        });
        for result in futures::future::join_all(tasks).await {
            result.unwrap().unwrap();
        }

        let profile = store.load("Main").await.unwrap();
        assert_eq!(profile.progress.len(), keys.len());
    }

    #[tokio::test]
    async fn test_export_then_import_into_other_profile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store
            .set_status("Main", "prophecies:charr-at-the-gate", QuestStatus::Completed)
            .await
            .unwrap();

        let path = dir.path().join("export.json");
        store.export("Main", &path).await.unwrap();
        let report = store
            .import(&path, Some("Copy"), &catalog())
            .await
            .unwrap();

        assert_eq!(report.format, ImportFormat::Current);
        assert_eq!(report.mapped, 1);
        let copy = store.load("Copy").await.unwrap();
        assert_eq!(copy.status("prophecies:charr-at-the-gate"), QuestStatus::Completed);
        assert_eq!(copy.status("prophecies:grawl-invasion"), QuestStatus::NotStarted);
        assert!(copy.entry("prophecies:grawl-invasion").is_some());
        assert_eq!(copy.history.len(), 1);
    }

    #[tokio::test]
    async fn test_legacy_import_needs_target() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let doc = json!({"Charr at the Gate": 2});

        assert!(matches!(
            store.import_document(&doc, None, &catalog()).await,
            Err(AppError::Import(_))
        ));

        let report = store
            .import_document(&doc, Some("Old"), &catalog())
            .await
            .unwrap();
        assert_eq!(report.format, ImportFormat::Legacy(LegacyFormat::Flat));
        let profile = store.load("Old").await.unwrap();
        assert_eq!(profile.status("prophecies:charr-at-the-gate"), QuestStatus::Completed);
        assert!(profile.entry("prophecies:charr-at-the-gate").unwrap().completed_at.is_some());
    }

    #[tokio::test]
    async fn test_reconcile_does_not_recreate_deleted_profile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.load("Alt").await.unwrap();
        assert!(store.delete("Alt").await.unwrap());

        let stats = store.reconcile("Alt", &catalog()).await.unwrap();
        assert!(stats.is_none());
        assert!(store.list_profiles().await.unwrap().is_empty());
        assert!(store.get("Alt").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_reconcile_existing_profile() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.load("Main").await.unwrap();

        let stats = store.reconcile("Main", &catalog()).await.unwrap().unwrap();
        assert_eq!(stats.inserted, 2);
        let profile = store.get("Main").await.unwrap().unwrap();
        assert!(profile.entry("prophecies:grawl-invasion").is_some());
    }

    #[tokio::test]
    async fn test_save_rejects_untrimmed_name() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        let mut profile = Profile::new(" Ranger ");
        profile.set_status("prophecies:charr-at-the-gate", QuestStatus::Completed);

        assert!(matches!(
            store.save(&profile).await,
            Err(AppError::Validation(_))
        ));
        assert!(store.list_profiles().await.unwrap().is_empty());

        profile.name = "Ranger".to_string();
        store.save(&profile).await.unwrap();
        let loaded = store.load(" Ranger ").await.unwrap();
        assert_eq!(
            loaded.status("prophecies:charr-at-the-gate"),
            QuestStatus::Completed
        );
    }

    #[tokio::test]
    async fn test_delete_releases_lock_entry() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        store.load("Alt").await.unwrap();
        store.load("Main").await.unwrap();
        assert!(store.delete("Alt").await.unwrap());

        let locks = store.locks.lock().unwrap();
        assert!(!locks.contains_key("Alt"));
        assert!(locks.contains_key("Main"));
    }

    #[tokio::test]
    async fn test_export_unknown_profile_fails() {
        let dir = TempDir::new().unwrap();
        let store = store(&dir);
        assert!(store.export("Nobody", &dir.path().join("x.json")).await.is_err());
    }
}
