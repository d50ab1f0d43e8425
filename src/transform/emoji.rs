//! Emoji stage: deterministic flag handling
//!
//! Upstream providers disagree on whether names carry a flag emoji. This
//! stage normalizes either way: with `add` enabled every node gets exactly
//! one region flag prepended; disabled, any pre-existing leading flag
//! sequence is stripped. Either way the output no longer depends on what
//! the provider happened to send.

use super::set_display_name;
use crate::codec::region;
use crate::config::EmojiConfig;
use crate::types::NodeDescriptor;

/// Apply the emoji policy to every node
pub fn apply(nodes: Vec<NodeDescriptor>, config: &EmojiConfig) -> Vec<NodeDescriptor> {
    nodes
        .into_iter()
        .map(|node| {
            let bare = strip_leading_flags(&node.display_name);
            let name = if config.add {
                match region::emoji_for(&node.region_hint) {
                    Some(emoji) => format!("{emoji} {bare}"),
                    None => bare,
                }
            } else {
                bare
            };
            if name == node.display_name {
                node
            } else {
                set_display_name(node, &name)
            }
        })
        .collect()
}

fn is_regional_indicator(c: char) -> bool {
    ('\u{1F1E6}'..='\u{1F1FF}').contains(&c)
}

/// Strip any leading flag-emoji sequence (pairs of regional indicators)
/// and the whitespace that follows it
pub(crate) fn strip_leading_flags(name: &str) -> String {
    let mut rest = name;
    loop {
        let mut chars = rest.chars();
        match (chars.next(), chars.next()) {
            (Some(a), Some(b)) if is_regional_indicator(a) && is_regional_indicator(b) => {
                rest = &rest[a.len_utf8() + b.len_utf8()..];
                rest = rest.trim_start();
            }
            _ => break,
        }
    }
    rest.to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Protocol;

    fn node(name: &str, region: &str) -> NodeDescriptor {
        NodeDescriptor {
            protocol: Protocol::Ss,
            display_name: name.to_string(),
            canonical_uri: format!("ss://x@h:1#{}", urlencoding::encode(name)),
            region_hint: region.to_string(),
            source_name: "s".into(),
            manual: false,
            enabled: true,
            custom_named: false,
            group_tag: None,
            annotation: None,
        }
    }

    #[test]
    fn add_prepends_region_flag() {
        let config = EmojiConfig { add: true };
        let out = apply(vec![node("HK 01", "hongkong")], &config);
        assert_eq!(out[0].display_name, "\u{1F1ED}\u{1F1F0} HK 01");
    }

    #[test]
    fn add_replaces_wrong_upstream_flag() {
        let config = EmojiConfig { add: true };
        // Provider shipped a US flag on a Hong Kong node
        let out = apply(vec![node("\u{1F1FA}\u{1F1F8} HK 01", "hongkong")], &config);
        assert_eq!(out[0].display_name, "\u{1F1ED}\u{1F1F0} HK 01");
    }

    #[test]
    fn add_without_known_region_leaves_name_bare() {
        let config = EmojiConfig { add: true };
        let out = apply(vec![node("mystery", "other")], &config);
        assert_eq!(out[0].display_name, "mystery");
    }

    #[test]
    fn strip_removes_existing_flags() {
        let config = EmojiConfig { add: false };
        let out = apply(
            vec![node("\u{1F1ED}\u{1F1F0} HK 01", "hongkong"), node("US 02", "usa")],
            &config,
        );
        assert_eq!(out[0].display_name, "HK 01");
        assert_eq!(out[1].display_name, "US 02");
    }

    #[test]
    fn strip_handles_stacked_flags() {
        assert_eq!(
            strip_leading_flags("\u{1F1ED}\u{1F1F0}\u{1F1FA}\u{1F1F8} name"),
            "name"
        );
    }

    #[test]
    fn output_is_deterministic_regardless_of_upstream() {
        let config = EmojiConfig { add: true };
        let with_flag = apply(vec![node("\u{1F1ED}\u{1F1F0} HK", "hongkong")], &config);
        let without = apply(vec![node("HK", "hongkong")], &config);
        assert_eq!(with_flag[0].display_name, without[0].display_name);
    }
}
