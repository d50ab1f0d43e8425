//! Configuration types for subfuse

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, time::Duration};

/// Outbound identity for HTTP requests (User-Agent and extra headers)
///
/// Sources may override the default identity per request; many subscription
/// providers gate their responses on the client User-Agent.
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct Identity {
    /// User-Agent header value (None keeps the orchestrator default)
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Additional header name/value pairs sent with every request
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

/// Retry behavior for transient fetch failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum retry attempts after the initial try (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 500ms)
    #[serde(default = "default_initial_delay")]
    pub initial_delay: Duration,

    /// Upper bound on any single backoff delay (default: 10s)
    #[serde(default = "default_max_delay")]
    pub max_delay: Duration,

    /// Multiplier applied to the delay after each attempt (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays to prevent thundering herd (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Fetch Orchestrator configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Maximum sources fetched concurrently; excess queue FIFO (default: 5)
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Timeout for one fetch attempt (default: 10s)
    #[serde(default = "default_attempt_timeout")]
    pub attempt_timeout: Duration,

    /// Deadline for the whole collection; sources still in flight when it
    /// fires are abandoned and omitted from the result (default: 25s)
    #[serde(default = "default_collection_deadline")]
    pub collection_deadline: Duration,

    /// Retry policy applied per source
    #[serde(default)]
    pub retry: RetryConfig,

    /// Default outbound identity when a source has no override
    #[serde(default = "default_identity")]
    pub identity: Identity,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_concurrent: default_max_concurrent(),
            attempt_timeout: default_attempt_timeout(),
            collection_deadline: default_collection_deadline(),
            retry: RetryConfig::default(),
            identity: default_identity(),
        }
    }
}

/// Filter stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Apply per-source filter rules (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// How the index token is scoped during template renaming
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexScope {
    /// One counter across every node
    #[default]
    Global,
    /// A separate counter per (region, protocol) pair
    PerRegionProtocol,
}

/// Template rename settings
///
/// Recognized tokens: `{emoji}`, `{region}`, `{protocol}`, `{index}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TemplateConfig {
    /// The name template (default: `"{emoji}{region} {protocol} {index}"`)
    #[serde(default = "default_template")]
    pub template: String,

    /// Index counter scope
    #[serde(default)]
    pub index_scope: IndexScope,

    /// First index value (default: 1)
    #[serde(default = "default_index_start")]
    pub index_start: u32,

    /// Zero-pad the index to this width; 0 disables padding (default: 2)
    #[serde(default = "default_index_pad")]
    pub index_pad: usize,

    /// Replacement labels for region hints (e.g. "hongkong" -> "HK")
    #[serde(default)]
    pub region_aliases: HashMap<String, String>,

    /// Replacement labels for protocol tags (e.g. "hysteria2" -> "hy2")
    #[serde(default)]
    pub protocol_aliases: HashMap<String, String>,
}

impl Default for TemplateConfig {
    fn default() -> Self {
        Self {
            template: default_template(),
            index_scope: IndexScope::default(),
            index_start: default_index_start(),
            index_pad: default_index_pad(),
            region_aliases: HashMap::new(),
            protocol_aliases: HashMap::new(),
        }
    }
}

/// One rename behavior, applied independently to manual and fetched nodes
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum RenameMode {
    /// Leave names untouched
    #[default]
    Off,
    /// Idempotent `"{prefix} - {name}"` prefixing; a `None` prefix uses the
    /// source display name
    Prefix {
        /// Explicit prefix, or `None` for the source display name
        prefix: Option<String>,
    },
    /// Full template substitution
    Template(TemplateConfig),
}

/// Rename stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RenameConfig {
    /// Rename behavior for manual/inline nodes (default: off)
    #[serde(default)]
    pub manual: RenameMode,

    /// Rename behavior for fetched nodes (default: source-name prefixing)
    #[serde(default = "default_fetched_rename")]
    pub fetched: RenameMode,
}

impl Default for RenameConfig {
    fn default() -> Self {
        Self {
            manual: RenameMode::Off,
            fetched: default_fetched_rename(),
        }
    }
}

/// Emoji stage configuration
///
/// When `add` is true a region flag emoji is prepended from the lookup
/// table; when false any pre-existing leading flag-emoji sequence is
/// stripped, so output is deterministic regardless of upstream content.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EmojiConfig {
    /// Prepend region emoji (true) or strip existing ones (false)
    #[serde(default = "default_true")]
    pub add: bool,
}

impl Default for EmojiConfig {
    fn default() -> Self {
        Self { add: true }
    }
}

/// Dedup stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DedupConfig {
    /// Remove identity-equal duplicates (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Query parameter keys stripped from the identity key before comparison.
    ///
    /// The default strips only name-bearing keys. Some providers attach
    /// independently meaningful routing parameters; widening this set makes
    /// dedup more aggressive, so the default is left conservative.
    #[serde(default = "default_strip_query_keys")]
    pub strip_query_keys: Vec<String>,
}

impl Default for DedupConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            strip_query_keys: default_strip_query_keys(),
        }
    }
}

/// Keys available to the sort stage
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortKey {
    /// Region hint
    Region,
    /// Protocol tag
    Protocol,
    /// Display name
    Name,
}

/// Sort stage configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SortConfig {
    /// Apply the deterministic multi-key sort (default: true)
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Sort keys in precedence order (default: region, protocol, name)
    #[serde(default = "default_sort_keys")]
    pub keys: Vec<SortKey>,

    /// Custom per-key value orderings; values not listed sort lexically
    /// after every listed value
    #[serde(default)]
    pub custom_orders: HashMap<SortKey, Vec<String>>,

    /// Ignore a leading flag emoji when comparing names (default: true)
    #[serde(default = "default_true")]
    pub ignore_emoji: bool,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            keys: default_sort_keys(),
            custom_orders: HashMap::new(),
            ignore_emoji: true,
        }
    }
}

/// Full Transform Pipeline configuration, one field per stage
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransformConfig {
    /// Filter stage
    #[serde(default)]
    pub filter: FilterConfig,

    /// Rename stage
    #[serde(default)]
    pub rename: RenameConfig,

    /// Emoji stage
    #[serde(default)]
    pub emoji: EmojiConfig,

    /// Dedup stage
    #[serde(default)]
    pub dedup: DedupConfig,

    /// Sort stage
    #[serde(default)]
    pub sort: SortConfig,
}

/// Partial transform settings used in the cascading config lookup
///
/// Merged profile-over-global-over-defaults into one immutable
/// [`TransformConfig`] *before* the pipeline runs, so no stage re-derives
/// fallbacks at read time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct TransformOverlay {
    /// Filter stage override
    #[serde(default)]
    pub filter: Option<FilterConfig>,

    /// Rename stage override
    #[serde(default)]
    pub rename: Option<RenameConfig>,

    /// Emoji stage override
    #[serde(default)]
    pub emoji: Option<EmojiConfig>,

    /// Dedup stage override
    #[serde(default)]
    pub dedup: Option<DedupConfig>,

    /// Sort stage override
    #[serde(default)]
    pub sort: Option<SortConfig>,
}

impl TransformOverlay {
    fn apply_to(&self, config: &mut TransformConfig) {
        if let Some(filter) = &self.filter {
            config.filter = filter.clone();
        }
        if let Some(rename) = &self.rename {
            config.rename = rename.clone();
        }
        if let Some(emoji) = &self.emoji {
            config.emoji = emoji.clone();
        }
        if let Some(dedup) = &self.dedup {
            config.dedup = dedup.clone();
        }
        if let Some(sort) = &self.sort {
            config.sort = sort.clone();
        }
    }
}

impl TransformConfig {
    /// Resolve the three-source cascade: built-in defaults, then the global
    /// overlay, then the profile overlay
    pub fn resolve(global: Option<&TransformOverlay>, profile: Option<&TransformOverlay>) -> Self {
        let mut config = Self::default();
        for overlay in [global, profile].into_iter().flatten() {
            overlay.apply_to(&mut config);
        }
        config
    }
}

/// Cache Manager configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Key prefix for all cache entries (default: "sub_cache_")
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,

    /// Entries younger than this are served without a refresh (default: 0)
    ///
    /// A zero fresh window is legal and makes every hit at least STALE,
    /// i.e. every read schedules a background refresh.
    #[serde(default)]
    pub fresh_window: Duration,

    /// Entries younger than this serve stored text with a background
    /// refresh; older ones are labelled expired (default: 24h)
    #[serde(default = "default_stale_window")]
    pub stale_window: Duration,

    /// Entries at or past this age are misses; also used as the store's
    /// native TTL on write (default: 7d)
    #[serde(default = "default_max_age")]
    pub max_age: Duration,

    /// Hard timeout for synchronous regeneration on a miss (default: 20s)
    #[serde(default = "default_sync_timeout")]
    pub sync_timeout: Duration,

    /// Coarser timeout bounding a background refresh (default: 60s)
    #[serde(default = "default_refresh_timeout")]
    pub refresh_timeout: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_cache_prefix(),
            fresh_window: Duration::ZERO,
            stale_window: default_stale_window(),
            max_age: default_max_age(),
            sync_timeout: default_sync_timeout(),
            refresh_timeout: default_refresh_timeout(),
        }
    }
}

/// Conversion Client configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConvertConfig {
    /// Primary backend address; tried before any fallback
    #[serde(default)]
    pub primary: Option<String>,

    /// Fixed fallback backend addresses, tried in order
    #[serde(default = "default_convert_fallbacks")]
    pub fallbacks: Vec<String>,

    /// Timeout for one conversion attempt (default: 15s)
    #[serde(default = "default_convert_timeout")]
    pub timeout: Duration,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            primary: None,
            fallbacks: default_convert_fallbacks(),
            timeout: default_convert_timeout(),
        }
    }
}

impl ConvertConfig {
    /// All backend candidates in attempt order (primary first)
    ///
    /// # Errors
    /// Returns a config error when neither a primary nor any fallback is set.
    pub fn candidates(&self) -> Result<Vec<String>> {
        let mut out = Vec::with_capacity(1 + self.fallbacks.len());
        if let Some(primary) = &self.primary {
            if !primary.trim().is_empty() {
                out.push(primary.trim().to_string());
            }
        }
        out.extend(
            self.fallbacks
                .iter()
                .map(|f| f.trim().to_string())
                .filter(|f| !f.is_empty()),
        );
        if out.is_empty() {
            return Err(Error::Config {
                message: "no conversion backend configured".into(),
                key: Some("convert.primary".into()),
            });
        }
        Ok(out)
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(500)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(10)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_concurrent() -> usize {
    5
}

fn default_attempt_timeout() -> Duration {
    Duration::from_secs(10)
}

fn default_collection_deadline() -> Duration {
    Duration::from_secs(25)
}

fn default_identity() -> Identity {
    Identity {
        // Most providers answer a Clash-family UA with a plain node list
        user_agent: Some("clash.meta".to_string()),
        headers: Vec::new(),
    }
}

fn default_template() -> String {
    "{emoji}{region} {protocol} {index}".to_string()
}

fn default_index_start() -> u32 {
    1
}

fn default_index_pad() -> usize {
    2
}

fn default_fetched_rename() -> RenameMode {
    RenameMode::Prefix { prefix: None }
}

fn default_strip_query_keys() -> Vec<String> {
    vec!["remarks".into(), "remark".into(), "name".into(), "ps".into()]
}

fn default_sort_keys() -> Vec<SortKey> {
    vec![SortKey::Region, SortKey::Protocol, SortKey::Name]
}

fn default_cache_prefix() -> String {
    "sub_cache_".to_string()
}

fn default_stale_window() -> Duration {
    Duration::from_secs(24 * 60 * 60)
}

fn default_max_age() -> Duration {
    Duration::from_secs(7 * 24 * 60 * 60)
}

fn default_sync_timeout() -> Duration {
    Duration::from_secs(20)
}

fn default_refresh_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_convert_fallbacks() -> Vec<String> {
    vec![
        "api.dler.io".to_string(),
        "sub.xeton.dev".to_string(),
        "sub.id9.cc".to_string(),
    ]
}

fn default_convert_timeout() -> Duration {
    Duration::from_secs(15)
}
