//! Aggregation Service: one full pass from configured sources to combined
//! node text
//!
//! A pass fetches every enabled remote source under a collection budget,
//! decodes each body into descriptors, folds in inline/manual entries, runs
//! the Transform Pipeline, and joins the survivors into newline-terminated
//! text. Partial failure is the normal case: failed or abandoned sources
//! become counts in the result, never errors.

use crate::codec;
use crate::config::{FetchConfig, TransformConfig};
use crate::error::Result;
use crate::fetch::FetchOrchestrator;
use crate::transform::{self, SourceRules};
use crate::types::{AggregationResult, NodeDescriptor, Source};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Per-pass knobs that are not part of the long-lived configuration
#[derive(Clone, Debug, Default)]
pub struct AggregateOptions {
    /// Override the configured collection deadline, e.g. to nest the fetch
    /// budget inside a cache refresh timeout
    pub fetch_deadline: Option<Duration>,

    /// Synthetic informational node URI prepended to the output verbatim,
    /// exempt from every transform stage
    pub info_node: Option<String>,
}

/// Runs aggregation passes over a source list
pub struct Aggregator {
    fetcher: FetchOrchestrator,
}

impl Aggregator {
    /// Create an aggregator with its own fetch orchestrator
    ///
    /// # Errors
    /// Returns an error when the HTTP client cannot be built.
    pub fn new(fetch: FetchConfig) -> Result<Self> {
        Ok(Self {
            fetcher: FetchOrchestrator::new(fetch)?,
        })
    }

    /// Run one pass with default options
    pub async fn aggregate(
        &self,
        sources: &[Source],
        transform: &TransformConfig,
    ) -> AggregationResult {
        self.aggregate_with(sources, transform, &AggregateOptions::default())
            .await
    }

    /// Run one pass
    ///
    /// Always returns a valid (possibly empty) result; source failures are
    /// reported through the `failed` count.
    pub async fn aggregate_with(
        &self,
        sources: &[Source],
        transform: &TransformConfig,
        options: &AggregateOptions,
    ) -> AggregationResult {
        let started = Instant::now();

        let enabled: Vec<&Source> = sources.iter().filter(|s| s.enabled).collect();
        let (remote, inline): (Vec<&Source>, Vec<&Source>) =
            enabled.iter().copied().partition(|s| s.is_remote());

        let remote_owned: Vec<Source> = remote.iter().map(|s| (*s).clone()).collect();
        let outcomes = match options.fetch_deadline {
            Some(deadline) => self.fetcher.fetch_all_within(&remote_owned, deadline).await,
            None => self.fetcher.fetch_all(&remote_owned).await,
        };

        let by_id: HashMap<&str, &Source> =
            remote.iter().map(|s| (s.id.as_str(), *s)).collect();
        let mut nodes: Vec<NodeDescriptor> = Vec::new();
        let mut succeeded = 0usize;

        for outcome in &outcomes {
            let Some(source) = by_id.get(outcome.source_id.as_str()) else {
                continue;
            };
            match &outcome.result {
                Ok(body) => {
                    succeeded += 1;
                    let extracted = codec::decode_and_extract(body, source_label(source));
                    tracing::debug!(
                        source = %source.id,
                        nodes = extracted.len(),
                        "decoded source body"
                    );
                    nodes.extend(extracted);
                }
                Err(error) => {
                    tracing::warn!(source = %source.id, error = %error, "source fetch failed");
                }
            }
        }
        // Outcomes missing entirely were abandoned at the deadline
        let requested = remote.len();
        let failed = requested - succeeded;
        if outcomes.len() < requested {
            tracing::debug!(
                abandoned = requested - outcomes.len(),
                "sources abandoned at the collection deadline"
            );
        }

        for source in &inline {
            nodes.extend(inline_nodes(source));
        }

        let rules_by_source = collect_rules(&enabled);
        let nodes = transform::apply(nodes, &rules_by_source, transform);

        let mut source_names: Vec<String> = Vec::new();
        for node in &nodes {
            if !source_names.contains(&node.source_name) {
                source_names.push(node.source_name.clone());
            }
        }

        let mut lines: Vec<&str> = Vec::with_capacity(nodes.len() + 1);
        if let Some(info) = &options.info_node {
            lines.push(info.as_str());
        }
        lines.extend(nodes.iter().map(|n| n.canonical_uri.as_str()));
        let node_count = lines.len();
        let combined_text = if lines.is_empty() {
            String::new()
        } else {
            let mut text = lines.join("\n");
            text.push('\n');
            text
        };

        let duration_ms = started.elapsed().as_millis() as u64;
        tracing::info!(
            requested,
            succeeded,
            failed,
            nodes = node_count,
            duration_ms,
            "aggregation pass complete"
        );

        AggregationResult {
            combined_text,
            node_count,
            source_names,
            generated_at_ms: chrono::Utc::now().timestamp_millis(),
            requested,
            succeeded,
            failed,
            duration_ms,
        }
    }
}

/// Display name used for a source's nodes, falling back to its id
fn source_label(source: &Source) -> &str {
    if source.display_name.is_empty() {
        &source.id
    } else {
        &source.display_name
    }
}

/// Parse an inline source's URI literal into manual descriptors
///
/// A named inline source renames its node to the source display name and
/// marks it operator-named, which raises its dedup priority.
fn inline_nodes(source: &Source) -> Vec<NodeDescriptor> {
    let parsed = codec::extract_descriptors(&source.uri, source_label(source));
    if parsed.is_empty() {
        tracing::warn!(source = %source.id, "inline source did not parse as a node");
    }
    parsed
        .into_iter()
        .map(|node| {
            let node = if source.display_name.is_empty() {
                node
            } else {
                transform::set_display_name(node, &source.display_name)
            };
            NodeDescriptor {
                manual: true,
                custom_named: !source.display_name.is_empty(),
                ..node
            }
        })
        .collect()
}

/// Parse per-source filter rule text, keyed by the source label
fn collect_rules(sources: &[&Source]) -> HashMap<String, SourceRules> {
    sources
        .iter()
        .filter_map(|source| {
            let text = source.filter_rules.as_deref()?;
            Some((
                source_label(source).to_string(),
                transform::parse_rules(text),
            ))
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmojiConfig, RenameConfig, RenameMode, RetryConfig};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn aggregator() -> Aggregator {
        Aggregator::new(FetchConfig {
            max_concurrent: 4,
            attempt_timeout: Duration::from_secs(2),
            collection_deadline: Duration::from_secs(5),
            retry: RetryConfig {
                max_attempts: 0,
                ..Default::default()
            },
            ..Default::default()
        })
        .unwrap()
    }

    fn remote(id: &str, uri: String) -> Source {
        Source {
            id: id.to_string(),
            uri,
            display_name: id.to_string(),
            enabled: true,
            custom_identity: None,
            filter_rules: None,
        }
    }

    fn plain_transform() -> TransformConfig {
        TransformConfig {
            rename: RenameConfig {
                manual: RenameMode::Off,
                fetched: RenameMode::Off,
            },
            emoji: EmojiConfig { add: false },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn partial_failure_yields_counts_not_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ok"))
            .respond_with(ResponseTemplate::new(200).set_body_string("trojan://pw@h1:443#A"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/down"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let sources = vec![
            remote("ok", format!("{}/ok", server.uri())),
            remote("down", format!("{}/down", server.uri())),
        ];
        let result = aggregator()
            .aggregate(&sources, &plain_transform())
            .await;

        assert_eq!(result.requested, 2);
        assert_eq!(result.succeeded, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.node_count, 1);
        assert!(result.combined_text.ends_with('\n'));
    }

    #[tokio::test]
    async fn inline_sources_become_manual_nodes() {
        let sources = vec![Source {
            id: "inline".into(),
            uri: "ss://YWVzLTI1Ni1nY206cGFzcw==@host:1#ignored".into(),
            display_name: "My box".into(),
            enabled: true,
            custom_identity: None,
            filter_rules: None,
        }];
        let result = aggregator()
            .aggregate(&sources, &plain_transform())
            .await;

        assert_eq!(result.requested, 0);
        assert_eq!(result.node_count, 1);
        // Named inline nodes carry the operator's name in the fragment
        assert!(result.combined_text.contains("#My%20box"));
        assert_eq!(result.source_names, vec!["My box"]);
    }

    #[tokio::test]
    async fn disabled_sources_are_skipped() {
        let sources = vec![Source {
            id: "off".into(),
            uri: "ss://YWJj@host:1#n".into(),
            enabled: false,
            ..Default::default()
        }];
        let result = aggregator()
            .aggregate(&sources, &plain_transform())
            .await;
        assert_eq!(result.node_count, 0);
        assert!(result.combined_text.is_empty());
    }

    #[tokio::test]
    async fn info_node_is_prepended_and_exempt_from_transform() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sub"))
            .respond_with(ResponseTemplate::new(200).set_body_string("trojan://pw@h1:443#A"))
            .mount(&server)
            .await;

        let sources = vec![remote("s", format!("{}/sub", server.uri()))];
        let options = AggregateOptions {
            info_node: Some("trojan://expiry@0.0.0.0:1#Traffic%3A%2050GB".into()),
            ..Default::default()
        };
        let result = aggregator()
            .aggregate_with(&sources, &plain_transform(), &options)
            .await;

        assert_eq!(result.node_count, 2);
        assert!(
            result
                .combined_text
                .starts_with("trojan://expiry@0.0.0.0:1#Traffic%3A%2050GB\n")
        );
    }

    #[tokio::test]
    async fn per_source_filter_rules_apply_to_that_source_only() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("trojan://pw@h1:443#keep\nsocks5://u:p@h2:1080#drop"),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b"))
            .respond_with(ResponseTemplate::new(200).set_body_string("socks5://u:p@h3:1080#stays"))
            .mount(&server)
            .await;

        let mut filtered = remote("a", format!("{}/a", server.uri()));
        filtered.filter_rules = Some("proto:socks5".into());
        let sources = vec![filtered, remote("b", format!("{}/b", server.uri()))];

        let result = aggregator()
            .aggregate(&sources, &plain_transform())
            .await;
        assert_eq!(result.node_count, 2);
        assert!(result.combined_text.contains("#keep"));
        assert!(result.combined_text.contains("#stays"));
        assert!(!result.combined_text.contains("#drop"));
    }

    #[tokio::test]
    async fn empty_source_list_is_a_valid_empty_result() {
        let result = aggregator().aggregate(&[], &plain_transform()).await;
        assert_eq!(result.node_count, 0);
        assert_eq!(result.combined_text, "");
        assert_eq!(result.failed, 0);
    }
}
