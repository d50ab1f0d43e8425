//! Filter stage: per-source keep/exclude rules
//!
//! Rule text is one rule per line. A `keep:` prefix marks an include rule
//! and switches the source into whitelist mode (a node must match at least
//! one keep rule to survive). Without any keep rule, a node matching any
//! rule is excluded. Rule bodies are either a protocol-set match
//! (`proto:ss,vmess`) or a regular expression evaluated against the decoded
//! display name.

use crate::types::{NodeDescriptor, Protocol};
use regex::Regex;
use std::collections::HashMap;

/// One parsed filter rule
#[derive(Debug)]
pub struct FilterRule {
    /// True for `keep:` rules, false for exclude rules
    pub keep: bool,
    matcher: RuleMatcher,
}

#[derive(Debug)]
enum RuleMatcher {
    Protocols(Vec<Protocol>),
    Name(Regex),
}

impl FilterRule {
    fn matches(&self, node: &NodeDescriptor) -> bool {
        match &self.matcher {
            RuleMatcher::Protocols(protocols) => protocols.contains(&node.protocol),
            RuleMatcher::Name(regex) => regex.is_match(&node.display_name),
        }
    }
}

/// The parsed rule set of one source
#[derive(Debug, Default)]
pub struct SourceRules {
    rules: Vec<FilterRule>,
}

impl SourceRules {
    /// True when any `keep:` rule is present (whitelist mode)
    pub fn is_whitelist(&self) -> bool {
        self.rules.iter().any(|rule| rule.keep)
    }

    /// Whether a node from this source survives the filter stage
    pub fn keeps(&self, node: &NodeDescriptor) -> bool {
        if self.is_whitelist() {
            self.rules
                .iter()
                .any(|rule| rule.keep && rule.matches(node))
        } else {
            !self.rules.iter().any(|rule| rule.matches(node))
        }
    }
}

/// Parse rule text, one rule per line
///
/// Blank lines and lines starting with `//` are skipped. Invalid regular
/// expressions are logged and dropped rather than failing the source.
pub fn parse_rules(text: &str) -> SourceRules {
    let mut rules = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let (keep, body) = match line.strip_prefix("keep:") {
            Some(body) => (true, body.trim()),
            None => (false, line),
        };
        if body.is_empty() {
            continue;
        }

        let matcher = if let Some(protocols) = body.strip_prefix("proto:") {
            let parsed: Vec<Protocol> = protocols
                .split(',')
                .filter_map(|p| Protocol::from_scheme(p.trim()))
                .collect();
            if parsed.is_empty() {
                tracing::warn!(rule = body, "filter rule names no known protocol, dropped");
                continue;
            }
            RuleMatcher::Protocols(parsed)
        } else {
            match Regex::new(body) {
                Ok(regex) => RuleMatcher::Name(regex),
                Err(e) => {
                    tracing::warn!(rule = body, error = %e, "invalid filter regex, dropped");
                    continue;
                }
            }
        };
        rules.push(FilterRule { keep, matcher });
    }
    SourceRules { rules }
}

/// Apply per-source rules to the full descriptor list
///
/// Sources without a rule set pass everything through.
pub fn apply(
    nodes: Vec<NodeDescriptor>,
    rules_by_source: &HashMap<String, SourceRules>,
) -> Vec<NodeDescriptor> {
    nodes
        .into_iter()
        .filter(|node| {
            rules_by_source
                .get(&node.source_name)
                .is_none_or(|rules| rules.keeps(node))
        })
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn node(protocol: Protocol, name: &str, source: &str) -> NodeDescriptor {
        NodeDescriptor {
            protocol,
            display_name: name.to_string(),
            canonical_uri: format!("{}://x@h:1#{name}", protocol.as_str()),
            region_hint: "other".into(),
            source_name: source.to_string(),
            manual: false,
            enabled: true,
            custom_named: false,
            group_tag: None,
            annotation: None,
        }
    }

    #[test]
    fn exclude_rules_remove_matching_nodes() {
        let rules = parse_rules("过期|expired\nproto:socks5");
        assert!(!rules.is_whitelist());
        assert!(rules.keeps(&node(Protocol::Ss, "HK 01", "s")));
        assert!(!rules.keeps(&node(Protocol::Ss, "expired 2024", "s")));
        assert!(!rules.keeps(&node(Protocol::Socks5, "HK 01", "s")));
    }

    #[test]
    fn keep_rule_switches_to_whitelist() {
        let rules = parse_rules("keep:proto:ss,vmess");
        assert!(rules.is_whitelist());
        assert!(rules.keeps(&node(Protocol::Ss, "any", "s")));
        assert!(rules.keeps(&node(Protocol::Vmess, "any", "s")));
        assert!(!rules.keeps(&node(Protocol::Trojan, "any", "s")));
    }

    #[test]
    fn keep_name_regex_whitelists_by_name() {
        let rules = parse_rules("keep:HK|香港");
        assert!(rules.keeps(&node(Protocol::Trojan, "HK 01", "s")));
        assert!(rules.keeps(&node(Protocol::Trojan, "香港 02", "s")));
        assert!(!rules.keeps(&node(Protocol::Trojan, "US 01", "s")));
    }

    #[test]
    fn invalid_regex_is_dropped_not_fatal() {
        let rules = parse_rules("[unclosed\nexpired");
        assert!(rules.keeps(&node(Protocol::Ss, "[unclosed literal", "s")));
        assert!(!rules.keeps(&node(Protocol::Ss, "expired", "s")));
    }

    #[test]
    fn sources_without_rules_pass_through() {
        let mut rules_by_source = HashMap::new();
        rules_by_source.insert("ruled".to_string(), parse_rules("expired"));

        let nodes = vec![
            node(Protocol::Ss, "expired", "ruled"),
            node(Protocol::Ss, "expired", "free"),
            node(Protocol::Ss, "live", "ruled"),
        ];
        let kept = apply(nodes, &rules_by_source);
        assert_eq!(kept.len(), 2);
        assert!(kept.iter().any(|n| n.source_name == "free"));
        assert!(kept.iter().any(|n| n.display_name == "live"));
    }
}
