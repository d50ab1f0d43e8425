//! Dedup stage: canonical-identity duplicate removal
//!
//! Identity deliberately excludes the display name: two records pointing at
//! the same server with different labels are duplicates. The comparison key
//! is rebuilt per protocol from host/port/credential/transport options,
//! with name-bearing query parameters stripped and the remainder sorted by
//! key; vmess compares its decoded JSON minus name-like keys.

use crate::codec::vmess;
use crate::config::DedupConfig;
use crate::types::{NodeDescriptor, Protocol};
use std::collections::HashMap;

/// Remove identity-equal duplicates, keeping one per identity
///
/// Among duplicates the survivor is chosen by priority score, then longer
/// display name, then earliest original position. Survivors keep the
/// relative order of their identity's first occurrence.
pub fn apply(nodes: Vec<NodeDescriptor>, config: &DedupConfig) -> Vec<NodeDescriptor> {
    if !config.enabled {
        return nodes;
    }

    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut kept: Vec<(NodeDescriptor, u8)> = Vec::new();

    for node in nodes {
        let key = identity_key(&node, &config.strip_query_keys);
        let score = node.priority_score();
        match slots.get(&key) {
            None => {
                slots.insert(key, kept.len());
                kept.push((node, score));
            }
            Some(&slot) => {
                let (current, current_score) = &kept[slot];
                // A strictly better challenger replaces the holder; on a
                // full tie the earlier position stays in place
                let wins = score > *current_score
                    || (score == *current_score
                        && node.display_name.len() > current.display_name.len());
                if wins {
                    kept[slot] = (node, score);
                }
            }
        }
    }

    kept.into_iter().map(|(node, _)| node).collect()
}

/// Canonical comparison key for one node
fn identity_key(node: &NodeDescriptor, strip_keys: &[String]) -> String {
    if node.protocol == Protocol::Vmess {
        if let Some(value) = vmess::decode_payload(&node.canonical_uri) {
            return format!("vmess|{}", vmess::identity_json(&value, strip_keys));
        }
        // Undecodable vmess still reached us syntactically valid; compare raw
        return node.canonical_uri.clone();
    }

    let uri = &node.canonical_uri;
    let body = uri
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(uri.as_str());
    let body = body.split_once('#').map(|(b, _)| b).unwrap_or(body);

    let (base, query) = match body.split_once('?') {
        Some((base, query)) => (base, Some(query)),
        None => (body, None),
    };

    let sorted_query = query
        .map(|q| {
            let mut params: Vec<&str> = q
                .split('&')
                .filter(|param| {
                    let key = param.split('=').next().unwrap_or(param);
                    !strip_keys.iter().any(|s| s == key)
                })
                .collect();
            params.sort_unstable();
            params.join("&")
        })
        .unwrap_or_default();

    format!("{}|{}|{}", node.protocol.as_str(), base, sorted_query)
}
