//! Local filesystem storage primitives.
//!
//! Every write goes to a sibling `.tmp` file first and is then renamed over
//! the target, so readers observe either the old or the new document and
//! never a partial one.
//!
//! ## Storage Layout
//!
//! ```text
//! {data_dir}/
//! ├── config.toml           # Configuration
//! ├── catalog.json          # Last committed catalog
//! ├── profiles/             # One document per profile
//! │   └── {slug}-{hash}.json
//! └── cache/                # Raw wiki pages
//!     └── {sha256(url)}.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};

/// JSON documents under one directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    root_dir: PathBuf,
}

impl LocalStore {
    /// Create a new store rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    /// Get the full path for a relative key.
    pub fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    /// Write bytes atomically under `key`.
    pub async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<()> {
        write_atomic(&self.path(key), bytes).await
    }

    /// Write JSON data.
    pub async fn write_json<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(value)?;
        self.write_bytes(key, &bytes).await
    }

    /// Read bytes, returning None if file doesn't exist.
    pub async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let path = self.path(key);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::store(path, e)),
        }
    }

    /// Read JSON data.
    pub async fn read_json<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        match self.read_bytes(key).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Remove `key`; returns whether it existed.
    pub async fn remove(&self, key: &str) -> Result<bool> {
        let path = self.path(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(AppError::store(path, e)),
        }
    }

    /// Keys of all `.json` documents, sorted. Temp files are ignored.
    pub async fn list_json(&self) -> Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.root_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::store(&self.root_dir, e)),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| AppError::store(&self.root_dir, e))?
        {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json") {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// Write bytes atomically (write to temp, then rename).
pub async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| AppError::store(parent, e))?;
    }

    let tmp = path.with_extension("tmp");
    let result = async {
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp, path).await
    }
    .await;

    if let Err(e) = result {
        let _ = tokio::fs::remove_file(&tmp).await;
        return Err(AppError::store(path, e));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        value: u32,
    }

    #[tokio::test]
    async fn test_roundtrip_and_missing() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());

        assert_eq!(store.read_json::<Doc>("a.json").await.unwrap(), None);
        store.write_json("a.json", &Doc { value: 1 }).await.unwrap();
        assert_eq!(
            store.read_json::<Doc>("a.json").await.unwrap(),
            Some(Doc { value: 1 })
        );
        assert!(!dir.path().join("a.tmp").exists());
    }

    #[tokio::test]
    async fn test_failed_write_keeps_previous_document() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.write_json("a.json", &Doc { value: 1 }).await.unwrap();

        // A directory squatting on the temp path makes the next write fail
        // before the rename.
        std::fs::create_dir(dir.path().join("a.tmp")).unwrap();
        let err = store.write_json("a.json", &Doc { value: 2 }).await;
        assert!(matches!(err, Err(AppError::Store { .. })));

        assert_eq!(
            store.read_json::<Doc>("a.json").await.unwrap(),
            Some(Doc { value: 1 })
        );
    }

    #[tokio::test]
    async fn test_list_ignores_temp_files() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path());
        store.write_json("b.json", &Doc { value: 1 }).await.unwrap();
        store.write_json("a.json", &Doc { value: 1 }).await.unwrap();
        std::fs::write(dir.path().join("c.tmp"), b"{").unwrap();

        assert_eq!(store.list_json().await.unwrap(), vec!["a.json", "b.json"]);
        assert!(store.remove("a.json").await.unwrap());
        assert!(!store.remove("a.json").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_missing_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = LocalStore::new(dir.path().join("nope"));
        assert!(store.list_json().await.unwrap().is_empty());
    }
}
