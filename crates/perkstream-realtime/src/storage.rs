//! # Key-Value Storage
//!
//! The small persistent store the client reads its bearer token from and
//! writes its connection history to.
//!
//! | Key | Value |
//! |-----|-------|
//! | [`AUTH_TOKEN_KEY`](perkstream_core::AUTH_TOKEN_KEY) | raw token string |
//! | [`CONNECTION_HISTORY_KEY`](perkstream_core::CONNECTION_HISTORY_KEY) | JSON [`ConnectionHistory`](perkstream_core::ConnectionHistory) |
//!
//! Hosts inject their own platform store; [`MemoryStore`] and [`FileStore`]
//! cover tests and desktop/CLI use.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::error::{RealtimeError, RealtimeResult};

/// Async string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> RealtimeResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> RealtimeResult<()>;

    /// Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> RealtimeResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-process store. Contents are lost on drop.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store pre-populated with `entries`.
    pub fn with_entries<K, V>(entries: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        MemoryStore {
            entries: RwLock::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> RealtimeResult<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> RealtimeResult<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> RealtimeResult<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// Store backed by a single JSON object file.
///
/// Every write rewrites the whole file; the data held here is a token and a
/// history blob, so the file stays tiny.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// Opens the store at the default location.
    pub fn open_default() -> RealtimeResult<Self> {
        Self::default_path()
            .map(Self::new)
            .ok_or_else(|| RealtimeError::Storage("No data directory available".into()))
    }

    /// Returns `<platform data dir>/store.json`.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("app", "perkstream", "perkstream")
            .map(|dirs| dirs.data_dir().join("store.json"))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> RealtimeResult<HashMap<String, String>> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(contents) if contents.trim().is_empty() => Ok(HashMap::new()),
            Ok(contents) => serde_json::from_str(&contents)
                .map_err(|e| RealtimeError::Storage(format!("Corrupt store file: {}", e))),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_all(&self, entries: &HashMap<String, String>) -> RealtimeResult<()> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let contents = serde_json::to_string_pretty(entries)?;
        tokio::fs::write(&self.path, contents).await?;
        debug!(path = ?self.path, keys = entries.len(), "Store file written");
        Ok(())
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> RealtimeResult<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> RealtimeResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());
        self.write_all(&entries).await
    }

    async fn remove(&self, key: &str) -> RealtimeResult<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        if entries.remove(key).is_some() {
            self.write_all(&entries).await?;
        }
        Ok(())
    }
}
