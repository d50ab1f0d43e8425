//! Transform Pipeline: pure filter/dedup/rename/sort over descriptor lists
//!
//! Deterministic, no I/O, fixed stage order: filter, rename, emoji policy,
//! dedup, sort. Each stage is independently toggleable through
//! [`TransformConfig`](crate::config::TransformConfig). Descriptors are
//! replaced, never mutated in place.

/// Canonical-identity duplicate removal
pub mod dedup;
/// Flag emoji add/strip policy
pub mod emoji;
/// Per-source keep/exclude rules
pub mod filter;
/// Prefix and template renaming
pub mod rename;
/// Deterministic multi-key ordering
pub mod sort;

pub use filter::{SourceRules, parse_rules};

use crate::codec::vmess;
use crate::config::TransformConfig;
use crate::types::{NodeDescriptor, Protocol};
use std::collections::HashMap;

/// Run the full pipeline in stage order
pub fn apply(
    nodes: Vec<NodeDescriptor>,
    rules_by_source: &HashMap<String, SourceRules>,
    config: &TransformConfig,
) -> Vec<NodeDescriptor> {
    let nodes = if config.filter.enabled {
        filter::apply(nodes, rules_by_source)
    } else {
        nodes
    };
    let nodes = rename::apply(nodes, &config.rename);
    let nodes = emoji::apply(nodes, &config.emoji);
    let mut nodes = dedup::apply(nodes, &config.dedup);
    sort::apply(&mut nodes, &config.sort);
    nodes
}

/// Replace a node's display name, rewriting the canonical URI to match
///
/// Non-vmess nodes carry the name in the percent-encoded URI fragment;
/// vmess nodes carry it at JSON key `ps` inside the base64 payload. A
/// vmess payload that cannot be re-encoded keeps its original URI and name.
pub(crate) fn set_display_name(node: NodeDescriptor, name: &str) -> NodeDescriptor {
    let canonical_uri = if node.protocol == Protocol::Vmess {
        match vmess::with_name(&node.canonical_uri, name) {
            Some(uri) => uri,
            None => return node,
        }
    } else {
        let base = node
            .canonical_uri
            .split_once('#')
            .map(|(base, _)| base)
            .unwrap_or(node.canonical_uri.as_str());
        format!("{base}#{}", urlencoding::encode(name))
    };
    NodeDescriptor {
        display_name: name.to_string(),
        canonical_uri,
        ..node
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec;
    use crate::config::{EmojiConfig, RenameConfig, RenameMode};
    use base64::Engine as _;

    fn plain_config() -> TransformConfig {
        // Names untouched, no emoji injection: good for observing dedup/sort
        TransformConfig {
            rename: RenameConfig {
                manual: RenameMode::Off,
                fetched: RenameMode::Off,
            },
            emoji: EmojiConfig { add: false },
            ..Default::default()
        }
    }

    #[test]
    fn stages_compose_in_fixed_order() {
        let text = "\
trojan://pw@hk1:443#香港 01
trojan://pw@us1:443#US 01
trojan://pw@hk1:443#香港 01 duplicate
socks5://u:p@x:1080#blocked";
        let nodes = codec::extract_descriptors(text, "prov");

        let mut rules = HashMap::new();
        rules.insert("prov".to_string(), parse_rules("proto:socks5"));

        let out = apply(nodes, &rules, &plain_config());
        // socks5 filtered, hk duplicate removed, region sort puts HK first
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].region_hint, "hongkong");
        assert_eq!(out[1].region_hint, "usa");
        assert_eq!(out[0].display_name, "香港 01 duplicate"); // longer name won
    }

    #[test]
    fn set_display_name_rewrites_fragment() {
        let nodes = codec::extract_descriptors("trojan://pw@h:443#old", "s");
        let renamed = set_display_name(nodes[0].clone(), "new name");
        assert_eq!(renamed.display_name, "new name");
        assert_eq!(renamed.canonical_uri, "trojan://pw@h:443#new%20name");
    }

    #[test]
    fn set_display_name_rewrites_vmess_ps() {
        let payload = base64::engine::general_purpose::STANDARD
            .encode(r#"{"ps":"old","add":"h","port":"443","id":"u"}"#);
        let nodes = codec::extract_descriptors(&format!("vmess://{payload}"), "s");
        let renamed = set_display_name(nodes[0].clone(), "renamed");
        let value = vmess::decode_payload(&renamed.canonical_uri).unwrap();
        assert_eq!(vmess::display_name(&value).as_deref(), Some("renamed"));
    }

    #[test]
    fn full_pipeline_is_idempotent_with_prefix_rename() {
        let nodes = codec::extract_descriptors(
            "trojan://pw@hk1:443#HK 01\ntrojan://pw@us1:443#US 01",
            "prov",
        );
        // Emoji-add would re-prefix the flag in front of the source prefix
        // on the second pass, so idempotence is over rename + strip
        let config = TransformConfig {
            emoji: EmojiConfig { add: false },
            ..Default::default()
        };
        let rules = HashMap::new();

        let once = apply(nodes, &rules, &config);
        let twice = apply(once.clone(), &rules, &config);
        assert_eq!(once, twice);
    }
}
