//! Rename stage: prefixing or template substitution
//!
//! Manual and fetched nodes are renamed independently. Prefixing is
//! idempotent: a node already carrying the prefix is left alone, so running
//! the pipeline twice produces identical names.

use super::set_display_name;
use crate::codec::region;
use crate::config::{IndexScope, RenameConfig, RenameMode, TemplateConfig};
use crate::types::NodeDescriptor;
use std::collections::HashMap;

/// Apply the configured rename mode to every node
pub fn apply(nodes: Vec<NodeDescriptor>, config: &RenameConfig) -> Vec<NodeDescriptor> {
    let mut counters: HashMap<(String, String), u32> = HashMap::new();
    let mut global_counter: u32 = 0;

    nodes
        .into_iter()
        .map(|node| {
            let mode = if node.manual { &config.manual } else { &config.fetched };
            match mode {
                RenameMode::Off => node,
                RenameMode::Prefix { prefix } => {
                    let prefix = prefix
                        .clone()
                        .unwrap_or_else(|| node.source_name.clone());
                    apply_prefix(node, &prefix)
                }
                RenameMode::Template(template) => {
                    apply_template(node, template, &mut counters, &mut global_counter)
                }
            }
        })
        .collect()
}

fn apply_prefix(node: NodeDescriptor, prefix: &str) -> NodeDescriptor {
    if prefix.is_empty() {
        return node;
    }
    let wanted = format!("{prefix} - ");
    if node.display_name.starts_with(&wanted) {
        return node;
    }
    let name = format!("{wanted}{}", node.display_name);
    set_display_name(node, &name)
}

fn apply_template(
    node: NodeDescriptor,
    template: &TemplateConfig,
    counters: &mut HashMap<(String, String), u32>,
    global_counter: &mut u32,
) -> NodeDescriptor {
    let index = match template.index_scope {
        IndexScope::Global => {
            *global_counter += 1;
            template.index_start + *global_counter - 1
        }
        IndexScope::PerRegionProtocol => {
            let key = (node.region_hint.clone(), node.protocol.as_str().to_string());
            let counter = counters.entry(key).or_insert(0);
            *counter += 1;
            template.index_start + *counter - 1
        }
    };

    let region_label = template
        .region_aliases
        .get(&node.region_hint)
        .cloned()
        .unwrap_or_else(|| node.region_hint.clone());
    let protocol_label = template
        .protocol_aliases
        .get(node.protocol.as_str())
        .cloned()
        .unwrap_or_else(|| node.protocol.as_str().to_string());
    let emoji = region::emoji_for(&node.region_hint).unwrap_or_default();
    let index_str = if template.index_pad > 0 {
        format!("{index:0width$}", width = template.index_pad)
    } else {
        index.to_string()
    };

    let name = template
        .template
        .replace("{emoji}", emoji)
        .replace("{region}", &region_label)
        .replace("{protocol}", &protocol_label)
        .replace("{index}", &index_str);
    set_display_name(node, &name)
}
