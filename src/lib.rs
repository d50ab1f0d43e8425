//! # subfuse
//!
//! Backend library for proxy subscription aggregation services.
//!
//! ## Design Philosophy
//!
//! subfuse is designed to be:
//! - **Failure-tolerant** - A dead source, a broken body, or a storage
//!   hiccup reduces a count, it never aborts a pass
//! - **Sensible defaults** - Works out of the box with zero configuration
//! - **Library-first** - No CLI or HTTP surface, purely a Rust crate for
//!   embedding
//! - **Deterministic** - The same sources and settings always produce the
//!   same combined output, regardless of fetch completion order
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use subfuse::{
//!     Aggregator, CacheManager, MemoryStore, SubjectType,
//!     CacheConfig, FetchConfig, TransformConfig, Source,
//! };
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let sources = vec![
//!         Source {
//!             id: "provider-a".to_string(),
//!             uri: "https://example.com/subscription".to_string(),
//!             display_name: "Provider A".to_string(),
//!             ..Default::default()
//!         },
//!     ];
//!
//!     let aggregator = Arc::new(Aggregator::new(FetchConfig::default())?);
//!     let cache = CacheManager::new(
//!         Arc::new(MemoryStore::new()),
//!         CacheConfig::default(),
//!     );
//!
//!     let key = cache.key(SubjectType::Token, "my-token");
//!     let transform = TransformConfig::default();
//!     let outcome = cache
//!         .get_or_refresh(&key, false, move || async move {
//!             Ok(aggregator.aggregate(&sources, &transform).await)
//!         })
//!         .await;
//!
//!     println!("{} nodes ({})", outcome.node_count, outcome.status.as_str());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Aggregation Service: one pass from sources to combined node text
pub mod aggregate;
/// Cache Manager: freshness tiers and background refresh
pub mod cache;
/// Node Codec: base64 unwrapping and URI parsing
pub mod codec;
/// Configuration types
pub mod config;
/// Conversion Client: external format rendering with fallback
pub mod convert;
/// Error types
pub mod error;
/// Fetch Orchestrator: bounded concurrent source retrieval
pub mod fetch;
/// Retry logic with exponential backoff
pub mod retry;
/// Key-value store seam and in-memory implementation
pub mod store;
/// Transform Pipeline: filter, rename, emoji, dedup, sort
pub mod transform;
/// Core types shared across the pipeline
pub mod types;

pub use aggregate::{AggregateOptions, Aggregator};
pub use cache::{CacheManager, CacheOutcome, RefreshHandle, RefreshOutcome};
pub use config::{
    CacheConfig, ConvertConfig, FetchConfig, Identity, RetryConfig, TransformConfig,
    TransformOverlay,
};
pub use convert::{Conversion, ConversionClient};
pub use error::{Error, Result};
pub use store::{KvPage, KvStore, MemoryStore};
pub use types::{
    AggregationResult, CacheEntry, CacheStatus, NodeDescriptor, Protocol, Source, SubjectType,
    cache_key,
};
