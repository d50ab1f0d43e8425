//! Cache Manager: freshness tiers and serve-then-refresh over a [`KvStore`]
//!
//! A read classifies the stored entry by age into fresh, stale, expired, or
//! miss. Fresh entries are served as-is. Stale and expired entries serve the
//! stored text immediately and schedule a bounded background refresh, so
//! readers never wait on upstream providers once an entry exists. Misses
//! (and forced refreshes) regenerate synchronously under a hard timeout; on
//! timeout the caller gets an empty result rather than an error.
//!
//! Storage failures never surface to readers: an unreadable entry is a
//! miss, a failed write is logged and swallowed.

use crate::config::CacheConfig;
use crate::error::Result;
use crate::store::KvStore;
use crate::types::{AggregationResult, CacheEntry, CacheStatus, SubjectType, cache_key};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// How a scheduled background refresh ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The refresh ran and the entry was rewritten
    Completed {
        /// Node count of the refreshed entry
        node_count: usize,
    },
    /// The refresh exceeded its timeout and was dropped
    TimedOut,
    /// The refresh ran and failed; the stored entry is left in place
    Failed(String),
}

/// Observable handle to a detached background refresh
///
/// Dropping the handle does not cancel the refresh; it keeps running to
/// completion on the runtime.
pub struct RefreshHandle {
    handle: JoinHandle<RefreshOutcome>,
}

impl RefreshHandle {
    /// Wait for the refresh to finish and return how it ended
    pub async fn wait(self) -> RefreshOutcome {
        self.handle
            .await
            .unwrap_or_else(|e| RefreshOutcome::Failed(format!("refresh task panicked: {e}")))
    }

    /// Abort the refresh task
    pub fn abort(&self) {
        self.handle.abort();
    }
}

/// What a cache read produced
pub struct CacheOutcome {
    /// The combined node text served to the caller
    pub text: String,
    /// Node count of the served text
    pub node_count: usize,
    /// Freshness tier the entry was served under
    pub status: CacheStatus,
    /// Background refresh scheduled by this read, when one was
    pub refresh: Option<RefreshHandle>,
}

/// Serves cached aggregations and keeps them refreshed
pub struct CacheManager {
    store: Arc<dyn KvStore>,
    config: CacheConfig,
}

impl CacheManager {
    /// Create a manager over a store
    pub fn new(store: Arc<dyn KvStore>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    /// Build the cache key for a subject under this manager's prefix
    pub fn key(&self, subject_type: SubjectType, subject_id: &str) -> String {
        cache_key(&self.config.prefix, subject_type, subject_id)
    }

    /// Serve a cached aggregation, regenerating or refreshing as its age
    /// demands
    ///
    /// `refresh` is invoked at most once: synchronously on a miss (or when
    /// `force_refresh` is set), or in a detached background task when the
    /// entry is stale or expired.
    pub async fn get_or_refresh<F, Fut>(
        &self,
        key: &str,
        force_refresh: bool,
        refresh: F,
    ) -> CacheOutcome
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AggregationResult>> + Send + 'static,
    {
        if !force_refresh {
            if let Some(entry) = self.read_entry(key).await {
                let age = entry_age(&entry);
                let status = self.classify(age);
                tracing::debug!(key, age_ms = age.as_millis() as u64, status = status.as_str(), "cache read");
                match status {
                    CacheStatus::Fresh => {
                        return CacheOutcome {
                            text: entry.nodes,
                            node_count: entry.node_count,
                            status,
                            refresh: None,
                        };
                    }
                    CacheStatus::Stale | CacheStatus::Expired => {
                        let handle = self.spawn_refresh(key.to_string(), refresh);
                        return CacheOutcome {
                            text: entry.nodes,
                            node_count: entry.node_count,
                            status,
                            refresh: Some(handle),
                        };
                    }
                    CacheStatus::Miss => {}
                }
            }
        }
        self.regenerate(key, refresh).await
    }

    /// Delete every entry under this manager's prefix; returns the count
    ///
    /// # Errors
    /// Returns the first store error encountered while listing or deleting.
    pub async fn invalidate_all(&self) -> Result<usize> {
        let mut removed = 0usize;
        let mut cursor = None;
        loop {
            let page = self.store.list(&self.config.prefix, cursor, 100).await?;
            for key in &page.keys {
                self.store.delete(key).await?;
                removed += 1;
            }
            cursor = page.cursor;
            if cursor.is_none() {
                break;
            }
        }
        tracing::info!(removed, prefix = %self.config.prefix, "cache invalidated");
        Ok(removed)
    }

    fn classify(&self, age: Duration) -> CacheStatus {
        if age < self.config.fresh_window {
            CacheStatus::Fresh
        } else if age < self.config.stale_window {
            CacheStatus::Stale
        } else if age < self.config.max_age {
            CacheStatus::Expired
        } else {
            CacheStatus::Miss
        }
    }

    async fn read_entry(&self, key: &str) -> Option<CacheEntry> {
        let raw = match self.store.get(key).await {
            Ok(raw) => raw?,
            Err(error) => {
                tracing::warn!(key, error = %error, "cache read failed, treating as miss");
                return None;
            }
        };
        match serde_json::from_str(&raw) {
            Ok(entry) => Some(entry),
            Err(error) => {
                tracing::warn!(key, error = %error, "cache entry unparsable, treating as miss");
                None
            }
        }
    }

    /// Regenerate synchronously under the sync timeout
    async fn regenerate<F, Fut>(&self, key: &str, refresh: F) -> CacheOutcome
    where
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = Result<AggregationResult>> + Send,
    {
        match tokio::time::timeout(self.config.sync_timeout, refresh()).await {
            Ok(Ok(result)) => {
                self.write_entry(key, &result).await;
                CacheOutcome {
                    text: result.combined_text,
                    node_count: result.node_count,
                    status: CacheStatus::Miss,
                    refresh: None,
                }
            }
            Ok(Err(error)) => {
                tracing::warn!(key, error = %error, "synchronous regeneration failed");
                empty_miss()
            }
            Err(_) => {
                tracing::warn!(
                    key,
                    timeout_ms = self.config.sync_timeout.as_millis() as u64,
                    "synchronous regeneration timed out"
                );
                empty_miss()
            }
        }
    }

    fn spawn_refresh<F, Fut>(&self, key: String, refresh: F) -> RefreshHandle
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = Result<AggregationResult>> + Send + 'static,
    {
        let store = self.store.clone();
        let ttl = self.config.max_age;
        let timeout = self.config.refresh_timeout;
        let handle = tokio::spawn(async move {
            match tokio::time::timeout(timeout, refresh()).await {
                Ok(Ok(result)) => {
                    write_entry_to(&*store, &key, &result, ttl).await;
                    tracing::debug!(key, nodes = result.node_count, "background refresh complete");
                    RefreshOutcome::Completed {
                        node_count: result.node_count,
                    }
                }
                Ok(Err(error)) => {
                    tracing::warn!(key, error = %error, "background refresh failed");
                    RefreshOutcome::Failed(error.to_string())
                }
                Err(_) => {
                    tracing::warn!(
                        key,
                        timeout_ms = timeout.as_millis() as u64,
                        "background refresh timed out"
                    );
                    RefreshOutcome::TimedOut
                }
            }
        });
        RefreshHandle { handle }
    }

    async fn write_entry(&self, key: &str, result: &AggregationResult) {
        write_entry_to(&*self.store, key, result, self.config.max_age).await;
    }
}

fn entry_age(entry: &CacheEntry) -> Duration {
    let now_ms = chrono::Utc::now().timestamp_millis();
    Duration::from_millis(now_ms.saturating_sub(entry.timestamp).max(0) as u64)
}

fn empty_miss() -> CacheOutcome {
    CacheOutcome {
        text: String::new(),
        node_count: 0,
        status: CacheStatus::Miss,
        refresh: None,
    }
}

/// Serialize and write one entry; failures are logged, never surfaced
async fn write_entry_to(store: &dyn KvStore, key: &str, result: &AggregationResult, ttl: Duration) {
    let entry = CacheEntry::from(result);
    let raw = match serde_json::to_string(&entry) {
        Ok(raw) => raw,
        Err(error) => {
            tracing::warn!(key, error = %error, "cache entry serialization failed");
            return;
        }
    };
    if let Err(error) = store.put(key, raw, Some(ttl)).await {
        tracing::warn!(key, error = %error, "cache write failed");
    }
}
