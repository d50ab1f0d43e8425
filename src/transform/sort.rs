//! Sort stage: deterministic multi-key ordering
//!
//! Completion order of fetches never reaches the output; this stage is the
//! only source of ordering. Callers may supply a custom ordering per key;
//! values not listed sort lexically after every listed value.

use super::emoji::strip_leading_flags;
use crate::config::{SortConfig, SortKey};
use crate::types::NodeDescriptor;
use std::cmp::Ordering;

/// Sort nodes in place by the configured keys
pub fn apply(nodes: &mut [NodeDescriptor], config: &SortConfig) {
    if !config.enabled {
        return;
    }
    nodes.sort_by(|a, b| compare(a, b, config));
}

fn compare(a: &NodeDescriptor, b: &NodeDescriptor, config: &SortConfig) -> Ordering {
    for key in &config.keys {
        let va = value_for(a, *key, config);
        let vb = value_for(b, *key, config);
        let ordering = match config.custom_orders.get(key) {
            Some(order) => compare_with_order(&va, &vb, order),
            None => va.cmp(&vb),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn value_for(node: &NodeDescriptor, key: SortKey, config: &SortConfig) -> String {
    match key {
        SortKey::Region => node.region_hint.clone(),
        SortKey::Protocol => node.protocol.as_str().to_string(),
        SortKey::Name => {
            if config.ignore_emoji {
                strip_leading_flags(&node.display_name)
            } else {
                node.display_name.clone()
            }
        }
    }
}

/// Listed values sort by list position; unlisted values sort lexically
/// after every listed one
fn compare_with_order(a: &str, b: &str, order: &[String]) -> Ordering {
    let pos = |v: &str| order.iter().position(|o| o == v);
    match (pos(a), pos(b)) {
        (Some(pa), Some(pb)) => pa.cmp(&pb),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.cmp(b),
    }
}
