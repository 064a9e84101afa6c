//! Persisted catalog.

use crate::error::Result;
use crate::models::Catalog;
use crate::storage::LocalStore;

const CATALOG_KEY: &str = "catalog.json";

/// The last committed catalog, replaced atomically on every successful sync.
#[derive(Debug, Clone)]
pub struct CatalogStore {
    store: LocalStore,
}

impl CatalogStore {
    pub fn new(store: LocalStore) -> Self {
        Self { store }
    }

    /// Load the committed catalog, if a sync ever succeeded.
    pub async fn load(&self) -> Result<Option<Catalog>> {
        let catalog: Option<Catalog> = self.store.read_json(CATALOG_KEY).await?;
        if let Some(catalog) = &catalog {
            catalog.validate()?;
            log::debug!(
                "Loaded catalog v{} with {} quests",
                catalog.version,
                catalog.quest_count()
            );
        }
        Ok(catalog)
    }

    /// Replace the committed catalog.
    pub async fn save(&self, catalog: &Catalog) -> Result<()> {
        catalog.validate()?;
        self.store.write_json(CATALOG_KEY, catalog).await?;
        log::info!(
            "Catalog v{} written ({} quests)",
            catalog.version,
            catalog.quest_count()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Campaign, QuestKind, QuestRecord};
    use chrono::Utc;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = CatalogStore::new(LocalStore::new(dir.path()));
        assert!(store.load().await.unwrap().is_none());

        let catalog = Catalog::from_records(
            4,
            Utc::now(),
            vec![QuestRecord::new(
                Campaign::Ldoa,
                "The Blazefiend",
                "Daily Vanguard Quests",
                QuestKind::SideQuest,
                "https://wiki.example/wiki/The_Blazefiend",
                Utc::now(),
            )],
        )
        .unwrap();
        store.save(&catalog).await.unwrap();

        assert_eq!(store.load().await.unwrap(), Some(catalog));
    }
}
