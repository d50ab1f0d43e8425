//! Node Codec: decodes one raw subscription body into node descriptors
//!
//! The codec is pure (no I/O) and best-effort maximal: it extracts every
//! line it can make sense of and silently drops the rest. It is not a
//! validator — malformed proxy URIs are skipped, never reported.
//!
//! Decoding layers, outermost first:
//! 1. The whole body may be base64 (URL-safe variants and missing padding
//!    tolerated), possibly twice over.
//! 2. Each surviving line with a supported scheme becomes a descriptor.
//! 3. Bodies shaped like a full structured configuration (YAML proxy lists,
//!    JSON inbound/outbound configs) are scanned for embedded node URIs
//!    instead of being rejected — many providers mix both.

/// Static multi-language region keyword and emoji tables
pub mod region;
/// VMess base64(JSON) payload handling
pub mod vmess;

use crate::types::{NodeDescriptor, Protocol};
use base64::Engine as _;
use regex::Regex;
use std::sync::OnceLock;

/// Minimum stripped length before a body is even considered base64;
/// shorter strings are too likely to be an accidental alphabet match
const MIN_BASE64_LEN: usize = 20;

/// Decode a base64 string, tolerating URL-safe alphabets and missing padding
pub(crate) fn forgiving_base64_decode(input: &str) -> Option<Vec<u8>> {
    let normalized: String = input
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            other => other,
        })
        .collect();
    let trimmed = normalized.trim_end_matches('=');
    base64::engine::general_purpose::STANDARD_NO_PAD
        .decode(trimmed)
        .ok()
}

fn looks_like_base64(stripped: &str) -> bool {
    stripped.len() >= MIN_BASE64_LEN
        && stripped
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=' | '-' | '_'))
}

/// Decode a raw body that may be base64-wrapped
///
/// If the whitespace-stripped body matches the base64 alphabet and is long
/// enough, it is base64-decoded and UTF-8-decoded; on any failure the
/// original body is returned unchanged. Never errors, and is idempotent on
/// already-plain text.
pub fn decode(body: &str) -> String {
    let stripped: String = body.chars().filter(|c| !c.is_whitespace()).collect();
    if !looks_like_base64(&stripped) {
        return body.to_string();
    }
    match forgiving_base64_decode(&stripped) {
        Some(bytes) => match String::from_utf8(bytes) {
            Ok(text) => text,
            Err(_) => body.to_string(),
        },
        None => body.to_string(),
    }
}

fn embedded_uri_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // Schemes list mirrors Protocol::from_scheme; used to pull node URIs
        // out of YAML/JSON-shaped bodies
        Regex::new(
            r#"(?i)\b(ss|ssr|vmess|vless|trojan|hysteria2|hysteria|hy2|hy|tuic|anytls|socks5|snell)://[^\s"'<>,\\]+"#,
        )
        .unwrap_or_else(|e| unreachable!("static regex: {e}"))
    })
}

/// Extract node descriptors from decoded text
///
/// Splits lines and parses each one whose scheme prefix is a supported
/// protocol. If no whole line parses, the text is scanned for embedded node
/// URIs so structured configuration bodies still yield their nodes.
pub fn extract_descriptors(text: &str, source_name: &str) -> Vec<NodeDescriptor> {
    let mut out: Vec<NodeDescriptor> = text
        .lines()
        .filter_map(|line| parse_line(line, source_name))
        .collect();

    if out.is_empty() {
        out = embedded_uri_regex()
            .find_iter(text)
            .filter_map(|m| parse_line(m.as_str(), source_name))
            .collect();
    }
    out
}

/// Decode a raw body and extract descriptors, retrying once more through
/// base64 when the first pass yields nothing (handles double-encoded bodies)
pub fn decode_and_extract(body: &str, source_name: &str) -> Vec<NodeDescriptor> {
    let text = decode(body);
    let descriptors = extract_descriptors(&text, source_name);
    if !descriptors.is_empty() {
        return descriptors;
    }
    let twice = decode(&text);
    if twice != text {
        return extract_descriptors(&twice, source_name);
    }
    descriptors
}

/// Parse one node line into a descriptor; `None` drops the line
fn parse_line(line: &str, source_name: &str) -> Option<NodeDescriptor> {
    let line = line.trim().trim_end_matches(['\r']);
    let scheme_end = line.find("://")?;
    let protocol = Protocol::from_scheme(&line[..scheme_end])?;
    if line.len() <= scheme_end + 3 {
        return None;
    }

    if protocol == Protocol::Vmess {
        return parse_vmess_line(line, source_name);
    }

    let rest = &line[scheme_end + 3..];
    let (body, fragment) = match rest.split_once('#') {
        Some((body, fragment)) => (body, Some(fragment)),
        None => (rest, None),
    };
    if body.is_empty() {
        return None;
    }

    // Repair double-URL-encoded credentials: a literal '%' in the userinfo
    // means the provider percent-encoded an already-encoded secret
    let canonical_uri = match body.rfind('@') {
        Some(at) if body[..at].contains('%') => {
            let userinfo = &body[..at];
            let repaired = urlencoding::decode(userinfo)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| userinfo.to_string());
            let mut uri = format!("{}://{}{}", protocol.as_str(), repaired, &body[at..]);
            if let Some(fragment) = fragment {
                uri.push('#');
                uri.push_str(fragment);
            }
            uri
        }
        _ => line.to_string(),
    };

    let display_name = fragment
        .map(|f| {
            urlencoding::decode(f)
                .map(|decoded| decoded.into_owned())
                .unwrap_or_else(|_| f.to_string())
        })
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| synthesize_name(body, protocol));

    Some(descriptor(protocol, display_name, canonical_uri, source_name))
}

fn parse_vmess_line(line: &str, source_name: &str) -> Option<NodeDescriptor> {
    let value = vmess::decode_payload(line)?;
    let display_name = vmess::display_name(&value)
        .or_else(|| vmess::host(&value))
        .unwrap_or_else(|| "vmess".to_string());
    Some(descriptor(
        Protocol::Vmess,
        display_name,
        line.to_string(),
        source_name,
    ))
}

fn descriptor(
    protocol: Protocol,
    display_name: String,
    canonical_uri: String,
    source_name: &str,
) -> NodeDescriptor {
    let region_hint = region::detect(&display_name).to_string();
    NodeDescriptor {
        protocol,
        display_name,
        canonical_uri,
        region_hint,
        source_name: source_name.to_string(),
        manual: false,
        enabled: true,
        custom_named: false,
        group_tag: None,
        annotation: None,
    }
}

/// Fallback display name when a node has no usable fragment: the host part
fn synthesize_name(body: &str, protocol: Protocol) -> String {
    let after_user = match body.rfind('@') {
        Some(at) => &body[at + 1..],
        None => body,
    };
    let host_end = after_user
        .find([':', '/', '?'])
        .unwrap_or(after_user.len());
    let host = &after_user[..host_end];
    if host.is_empty() {
        protocol.as_str().to_string()
    } else {
        host.to_string()
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn b64(s: &str) -> String {
        base64::engine::general_purpose::STANDARD.encode(s.as_bytes())
    }

    // -----------------------------------------------------------------------
    // decode
    // -----------------------------------------------------------------------

    #[test]
    fn decode_plain_text_is_unchanged() {
        let body = "ss://YWVzLTI1Ni1nY206cGFzcw==@host:1#NodeA\n";
        assert_eq!(decode(body), body);
    }

    #[test]
    fn decode_is_idempotent_on_plain_text() {
        let body = "trojan://pw@example.com:443#name\nvless://uuid@h:443#x";
        assert_eq!(decode(&decode(body)), decode(body));
    }

    #[test]
    fn decode_unwraps_base64_bodies() {
        let plain = "vless://uuid@host2:443?security=tls#NodeB";
        assert_eq!(decode(&b64(plain)), plain);
    }

    #[test]
    fn decode_tolerates_urlsafe_and_missing_padding() {
        let plain = "trojan://pw@example.com:443#node name with spaces";
        let encoded = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(plain.as_bytes());
        assert_eq!(decode(&encoded), plain);
    }

    #[test]
    fn decode_tolerates_embedded_newlines() {
        let plain = "vless://uuid@host2:443?security=tls#NodeB";
        let mut encoded = b64(plain);
        encoded.insert(10, '\n');
        assert_eq!(decode(&encoded), plain);
    }

    #[test]
    fn decode_keeps_short_alphabet_matches_as_text() {
        // Alphabet-clean but under the length floor
        assert_eq!(decode("abcdef"), "abcdef");
    }

    #[test]
    fn decode_keeps_non_utf8_payloads_as_original() {
        let encoded = base64::engine::general_purpose::STANDARD.encode([0xff, 0xfe, 0xfd, 0x01].repeat(8));
        assert_eq!(decode(&encoded), encoded);
    }

    // -----------------------------------------------------------------------
    // extract_descriptors
    // -----------------------------------------------------------------------

    #[test]
    fn extracts_supported_schemes_and_drops_the_rest() {
        let text = "\
ss://YWVzLTI1Ni1nY206cGFzcw==@host:1#NodeA
http://not-a-node.example
garbage line
trojan://pw@h:443#T1
wireguard://ignored@h:51820#W";
        let nodes = extract_descriptors(text, "src");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].protocol, Protocol::Ss);
        assert_eq!(nodes[0].display_name, "NodeA");
        assert_eq!(nodes[1].protocol, Protocol::Trojan);
    }

    #[test]
    fn scheme_matching_is_case_insensitive() {
        let nodes = extract_descriptors("SS://YWJj@host:1#Up\nVLESS://uuid@h:443#V", "src");
        assert_eq!(nodes.len(), 2);
        assert_eq!(nodes[0].protocol, Protocol::Ss);
        assert_eq!(nodes[1].protocol, Protocol::Vless);
    }

    #[test]
    fn fragment_name_is_percent_decoded() {
        let nodes = extract_descriptors("trojan://pw@h:443#%E9%A6%99%E6%B8%AF%2001", "src");
        assert_eq!(nodes[0].display_name, "香港 01");
        assert_eq!(nodes[0].region_hint, "hongkong");
    }

    #[test]
    fn missing_fragment_synthesizes_name_from_host() {
        let nodes = extract_descriptors("trojan://pw@proxy.example.com:443?sni=x", "src");
        assert_eq!(nodes[0].display_name, "proxy.example.com");
    }

    #[test]
    fn double_encoded_credentials_are_repaired_once() {
        // "p%40ss" percent-decodes to "p@ss"
        let nodes = extract_descriptors("trojan://p%2540ss@h:443#N", "src");
        assert_eq!(nodes[0].canonical_uri, "trojan://p%40ss@h:443#N");
    }

    #[test]
    fn plain_credentials_are_left_alone() {
        let line = "trojan://plainpw@h:443#N";
        let nodes = extract_descriptors(line, "src");
        assert_eq!(nodes[0].canonical_uri, line);
    }

    #[test]
    fn vmess_name_comes_from_ps_key() {
        let payload = b64(r#"{"v":"2","ps":"日本 Tokyo","add":"jp.example.com","port":"443","id":"u"}"#);
        let nodes = extract_descriptors(&format!("vmess://{payload}"), "src");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].display_name, "日本 Tokyo");
        assert_eq!(nodes[0].region_hint, "japan");
    }

    #[test]
    fn undecodable_vmess_is_dropped() {
        assert!(extract_descriptors("vmess://%%%%", "src").is_empty());
    }

    #[test]
    fn structured_yaml_body_yields_embedded_nodes() {
        let text = "\
proxies:
  - {name: a, server: h}
# raw list appended by the provider:
subs: \"trojan://pw@h:443#T1\"
other: 'ss://YWJj@host:1#S1'";
        let nodes = extract_descriptors(text, "src");
        assert_eq!(nodes.len(), 2);
    }

    // -----------------------------------------------------------------------
    // decode_and_extract
    // -----------------------------------------------------------------------

    #[test]
    fn double_base64_bodies_are_unwrapped() {
        let plain = "vless://uuid@host2:443?security=tls#NodeB";
        let twice = b64(&b64(plain));
        let nodes = decode_and_extract(&twice, "src");
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].display_name, "NodeB");
    }

    #[test]
    fn empty_body_yields_nothing() {
        assert!(decode_and_extract("", "src").is_empty());
        assert!(decode_and_extract("\n\n", "src").is_empty());
    }
}
