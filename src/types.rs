//! Core types shared across the aggregation pipeline

use crate::config::Identity;
use crate::error::FetchError;
use serde::{Deserialize, Serialize};

/// Supported proxy protocols, as a closed set
///
/// Lines whose scheme is not one of these parse to nothing and are dropped
/// during extraction rather than carried as a partially-populated record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    /// Shadowsocks
    Ss,
    /// ShadowsocksR
    Ssr,
    /// VMess (base64-wrapped JSON payload)
    Vmess,
    /// VLESS
    Vless,
    /// Trojan
    Trojan,
    /// Hysteria v1
    Hysteria,
    /// Hysteria v2
    Hysteria2,
    /// TUIC
    Tuic,
    /// AnyTLS
    AnyTls,
    /// SOCKS5
    Socks5,
    /// Snell
    Snell,
}

impl Protocol {
    /// Parse a URI scheme into a protocol tag (case-insensitive)
    ///
    /// Accepts the `hy`/`hy2` shorthand schemes some providers emit for
    /// hysteria/hysteria2. Returns `None` for unsupported schemes.
    pub fn from_scheme(scheme: &str) -> Option<Self> {
        match scheme.to_ascii_lowercase().as_str() {
            "ss" => Some(Self::Ss),
            "ssr" => Some(Self::Ssr),
            "vmess" => Some(Self::Vmess),
            "vless" => Some(Self::Vless),
            "trojan" => Some(Self::Trojan),
            "hysteria" | "hy" => Some(Self::Hysteria),
            "hysteria2" | "hy2" => Some(Self::Hysteria2),
            "tuic" => Some(Self::Tuic),
            "anytls" => Some(Self::AnyTls),
            "socks5" => Some(Self::Socks5),
            "snell" => Some(Self::Snell),
            _ => None,
        }
    }

    /// Canonical lowercase label for this protocol
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ss => "ss",
            Self::Ssr => "ssr",
            Self::Vmess => "vmess",
            Self::Vless => "vless",
            Self::Trojan => "trojan",
            Self::Hysteria => "hysteria",
            Self::Hysteria2 => "hysteria2",
            Self::Tuic => "tuic",
            Self::AnyTls => "anytls",
            Self::Socks5 => "socks5",
            Self::Snell => "snell",
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A configured origin of proxy nodes
///
/// `uri` is either a remote `http(s)` endpoint serving a node list, or an
/// inline node literal (a single proxy URI). Sources are owned externally
/// and treated as read-only for the duration of one aggregation pass.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Source {
    /// Stable identifier used in fetch outcomes and logs
    pub id: String,

    /// Remote endpoint URL or inline node literal
    pub uri: String,

    /// Human-facing name; used as the node prefix and in stats
    #[serde(default)]
    pub display_name: String,

    /// Disabled sources are skipped entirely
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Optional outbound identity override (User-Agent, extra headers)
    #[serde(default)]
    pub custom_identity: Option<Identity>,

    /// Optional per-source filter rule text, one rule per line
    #[serde(default)]
    pub filter_rules: Option<String>,
}

impl Default for Source {
    fn default() -> Self {
        Self {
            id: String::new(),
            uri: String::new(),
            display_name: String::new(),
            enabled: default_true(),
            custom_identity: None,
            filter_rules: None,
        }
    }
}

impl Source {
    /// True when `uri` points at a remote endpoint rather than an inline node
    pub fn is_remote(&self) -> bool {
        self.uri.starts_with("http://") || self.uri.starts_with("https://")
    }
}

fn default_true() -> bool {
    true
}

/// One proxy server's connection parameters plus derived display metadata
///
/// Descriptors are ephemeral: recomputed on every aggregation pass and
/// replaced (never mutated in place) as they move through transform stages.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeDescriptor {
    /// Protocol tag parsed from the URI scheme
    pub protocol: Protocol,

    /// Decoded display name (URI fragment, vmess `ps`, or synthesized)
    pub display_name: String,

    /// The full node URI; always syntactically valid for `protocol`
    pub canonical_uri: String,

    /// Region keyword match over the display name, `"other"` when unmatched
    pub region_hint: String,

    /// Name of the source this descriptor came from
    pub source_name: String,

    /// True for inline/manual entries, false for fetched ones
    pub manual: bool,

    /// Whether the owning record is enabled (dedup priority input)
    pub enabled: bool,

    /// Whether the display name was set by the operator rather than derived
    pub custom_named: bool,

    /// Optional group tag carried from the owning record
    pub group_tag: Option<String>,

    /// Optional free-form annotation carried from the owning record
    pub annotation: Option<String>,
}

impl NodeDescriptor {
    /// Dedup priority score: enabled > custom name > group tag > annotation
    pub fn priority_score(&self) -> u8 {
        let mut score = 0;
        if self.enabled {
            score |= 0b1000;
        }
        if self.custom_named {
            score |= 0b0100;
        }
        if self.group_tag.is_some() {
            score |= 0b0010;
        }
        if self.annotation.is_some() {
            score |= 0b0001;
        }
        score
    }
}

/// The result of fetching one source, success or failure
///
/// Outcomes are unordered with respect to the input source list; a failed
/// source carries its error here and is surfaced upstream only as a count.
#[derive(Debug)]
pub struct FetchOutcome {
    /// The `Source::id` this outcome belongs to
    pub source_id: String,

    /// Raw response body on success, classified failure otherwise
    pub result: Result<String, FetchError>,
}

/// Output of one aggregation pass
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AggregationResult {
    /// Newline-joined canonical URIs; ends in exactly one `\n` when non-empty
    pub combined_text: String,

    /// Number of node lines in `combined_text`
    pub node_count: usize,

    /// Display names of the sources that contributed
    pub source_names: Vec<String>,

    /// Generation timestamp, milliseconds since the Unix epoch
    pub generated_at_ms: i64,

    /// Number of remote sources the pass attempted
    pub requested: usize,

    /// Number of remote sources that returned a body
    pub succeeded: usize,

    /// Number of remote sources that failed or were abandoned
    pub failed: usize,

    /// Wall-clock duration of the pass in milliseconds
    pub duration_ms: u64,
}

impl AggregationResult {
    /// An empty result, used when a synchronous regeneration times out
    pub fn empty() -> Self {
        Self {
            combined_text: String::new(),
            node_count: 0,
            source_names: Vec::new(),
            generated_at_ms: chrono::Utc::now().timestamp_millis(),
            requested: 0,
            succeeded: 0,
            failed: 0,
            duration_ms: 0,
        }
    }
}

/// Persisted cache value shape
///
/// Serialized as `{"nodes": ..., "timestamp": ..., "nodeCount": ...,
/// "sources": [...]}` under key `{prefix}{subject_type}_{subject_id}`.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
    /// The combined node text
    pub nodes: String,

    /// Write timestamp, milliseconds since the Unix epoch
    pub timestamp: i64,

    /// Number of node lines in `nodes`
    pub node_count: usize,

    /// Display names of contributing sources
    pub sources: Vec<String>,
}

impl From<&AggregationResult> for CacheEntry {
    fn from(result: &AggregationResult) -> Self {
        Self {
            nodes: result.combined_text.clone(),
            timestamp: result.generated_at_ms,
            node_count: result.node_count,
            sources: result.source_names.clone(),
        }
    }
}

/// How a cached aggregation was served
///
/// Ordered by entry age: `Fresh < Stale < Expired < Miss`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    /// Younger than the fresh window; served as-is
    Fresh,
    /// Served from the store with a background refresh scheduled
    Stale,
    /// Same serve-then-refresh behavior as stale; distinct for observability
    Expired,
    /// Absent or older than max age; regenerated synchronously
    Miss,
}

impl CacheStatus {
    /// Lowercase label used in responses and logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fresh => "fresh",
            Self::Stale => "stale",
            Self::Expired => "expired",
            Self::Miss => "miss",
        }
    }
}

/// The aggregation/cache scope: an access token or a named profile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubjectType {
    /// A single access token's full source list
    Token,
    /// A named profile (curated source subset)
    Profile,
}

impl SubjectType {
    /// Lowercase label used in cache keys
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Token => "token",
            Self::Profile => "profile",
        }
    }
}

/// Build the cache key for a subject: `{prefix}{subject_type}_{subject_id}`
pub fn cache_key(prefix: &str, subject_type: SubjectType, subject_id: &str) -> String {
    format!("{prefix}{}_{subject_id}", subject_type.as_str())
}
