//! Key-value store seam consumed by the Cache Manager
//!
//! The storage abstraction itself is owned externally; this crate consumes
//! only `get/put(ttl)/list(prefix)/delete`. [`MemoryStore`] is a complete
//! in-process implementation with TTL expiry and paginated prefix listing,
//! used by tests and by embedders that need no external storage.

use crate::error::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// One page of a prefix listing
#[derive(Debug)]
pub struct KvPage {
    /// Keys in this page
    pub keys: Vec<String>,
    /// Opaque cursor for the next page; `None` when exhausted
    pub cursor: Option<String>,
}

/// Minimal async key-value store interface
///
/// Implementations are treated as eventually consistent and last-write-wins;
/// the Cache Manager never wraps them in a mutex.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Read a value; `Ok(None)` when absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Write a value, with an optional native TTL when supported
    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()>;

    /// List up to `limit` keys under a prefix, resuming from `cursor`
    async fn list(&self, prefix: &str, cursor: Option<String>, limit: usize) -> Result<KvPage>;

    /// Delete a key; deleting an absent key is not an error
    async fn delete(&self, key: &str) -> Result<()>;
}

/// In-memory [`KvStore`] with TTL expiry
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, StoredValue>>,
}

struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|at| Instant::now() >= at)
    }
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries
            .get(key)
            .filter(|stored| !stored.is_expired())
            .map(|stored| stored.value.clone()))
    }

    async fn put(&self, key: &str, value: String, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(
            key.to_string(),
            StoredValue {
                value,
                expires_at: ttl.map(|ttl| Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn list(&self, prefix: &str, cursor: Option<String>, limit: usize) -> Result<KvPage> {
        let entries = self.entries.read().await;
        let keys: Vec<String> = entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .filter(|(_, stored)| !stored.is_expired())
            .map(|(key, _)| key.clone())
            .filter(|key| cursor.as_ref().is_none_or(|cursor| key > cursor))
            .take(limit)
            .collect();
        let cursor = (keys.len() == limit).then(|| keys.last().cloned()).flatten();
        Ok(KvPage { keys, cursor })
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
