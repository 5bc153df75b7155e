//! Durable key-value cache.
//!
//! The durable analog of the browser demo's local storage: a flat string
//! store that survives process restarts. Its one load-bearing entry maps
//! [`KNOWLEDGE_ID_KEY`] to the last successfully resolved knowledge-base id
//! so later bootstraps reuse it instead of re-creating the knowledge base.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tokio::sync::RwLock;

use crate::error::CacheError;

/// Fixed key for the last resolved knowledge-base id.
pub const KNOWLEDGE_ID_KEY: &str = "last_knowledge_id";

/// Flat async key-value store.
#[async_trait]
pub trait KnowledgeCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;
    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError>;
    async fn remove(&self, key: &str) -> Result<(), CacheError>;
}

/// JSON-file-backed cache.
///
/// The whole map is read once at open and rewritten on every mutation; the
/// store holds a handful of entries, so the rewrite is cheap.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl FileCache {
    /// Open (or create) the cache file at `path`.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, CacheError> {
        let path = path.as_ref().to_path_buf();

        let entries = if fs::try_exists(&path).await.unwrap_or(false) {
            let raw = fs::read_to_string(&path).await?;
            if raw.trim().is_empty() {
                HashMap::new()
            } else {
                serde_json::from_str(&raw).map_err(|e| CacheError::Malformed {
                    path: path.display().to_string(),
                    message: e.to_string(),
                })?
            }
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            entries: RwLock::new(entries),
        })
    }

    async fn persist(&self, entries: &HashMap<String, String>) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let raw = serde_json::to_string_pretty(entries).map_err(|e| CacheError::Malformed {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        fs::write(&self.path, raw).await?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), value.to_string());
        self.persist(&entries).await
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        let mut entries = self.entries.write().await;
        if entries.remove(key).is_some() {
            self.persist(&entries).await?;
        }
        Ok(())
    }
}

/// In-memory cache for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KnowledgeCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &str) -> Result<(), CacheError> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CacheError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
