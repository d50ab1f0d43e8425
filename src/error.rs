//! Error types for subfuse
//!
//! This module provides the error handling for the library:
//! - Domain-specific error types (Fetch, Convert, Store)
//! - A crate-wide [`Result`] alias
//!
//! The propagation policy is deliberately narrow: only missing prerequisite
//! configuration reaches callers as a hard failure. Source fetch failures,
//! decode failures, cache store failures and background refresh failures all
//! degrade to logged, partial results inside the owning component.

use thiserror::Error;

/// Result type alias for subfuse operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for subfuse
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "convert.primary")
        key: Option<String>,
    },

    /// Source fetch failed after retries
    #[error("fetch error: {0}")]
    Fetch(#[from] FetchError),

    /// Conversion backend error
    #[error("conversion error: {0}")]
    Convert(#[from] ConvertError),

    /// Key-value store operation failed
    #[error("store error: {0}")]
    Store(String),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors produced by a single source fetch
///
/// These stay local to the Fetch Orchestrator: a failed source reduces the
/// success count of an aggregation pass but never aborts the batch.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The per-attempt timeout elapsed before a response arrived
    #[error("request timed out after {timeout_ms}ms")]
    Timeout {
        /// The attempt timeout that elapsed, in milliseconds
        timeout_ms: u64,
    },

    /// The server answered with a non-success status
    #[error("server returned status {status}")]
    Status {
        /// The HTTP status code returned by the source endpoint
        status: u16,
    },

    /// Connection-level failure (DNS, refused, reset, TLS)
    #[error("connection failed: {0}")]
    Connect(String),

    /// The global collection deadline fired while this source was in flight
    #[error("abandoned at collection deadline")]
    Deadline,
}

/// Errors produced by the Conversion Client
#[derive(Debug, Error)]
pub enum ConvertError {
    /// No backend is configured and the target has no in-process renderer
    #[error("no conversion backend configured for target '{target}'")]
    NoBackend {
        /// The requested target format
        target: String,
    },

    /// Every candidate endpoint failed; lists each endpoint attempted
    #[error("all conversion backends failed: {}", attempted.join(", "))]
    AllBackendsFailed {
        /// Every endpoint variant that was attempted, in order
        attempted: Vec<String>,
    },

    /// The in-process fallback renderer does not cover the requested format
    #[error("in-process renderer does not support target '{target}'")]
    UnsupportedFallbackTarget {
        /// The requested target format
        target: String,
    },
}
