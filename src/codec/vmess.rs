//! VMess node handling
//!
//! `vmess://` nodes are special: the whole node after the scheme is
//! base64(JSON), and the display name lives at JSON key `ps` rather than in
//! a URI fragment. This module decodes the payload, reads and rewrites the
//! name, and builds the name-free canonical form used by dedup.

use super::forgiving_base64_decode;
use base64::Engine as _;
use serde_json::Value;
use std::collections::BTreeMap;

/// JSON keys that carry the display name and must not enter the identity key
const NAME_KEYS: [&str; 3] = ["ps", "remark", "remarks"];

/// Decode a `vmess://` line's base64(JSON) payload
///
/// Returns `None` unless the payload decodes to a JSON object.
pub fn decode_payload(uri: &str) -> Option<Value> {
    let payload = uri.strip_prefix("vmess://")?;
    let bytes = forgiving_base64_decode(payload)?;
    let value: Value = serde_json::from_slice(&bytes).ok()?;
    value.is_object().then_some(value)
}

/// The display name (`ps`), if present and non-empty
pub fn display_name(value: &Value) -> Option<String> {
    let name = value.get("ps")?.as_str()?.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// The server host (`add`), if present and non-empty
pub fn host(value: &Value) -> Option<String> {
    let host = value.get("add")?.as_str()?.trim();
    (!host.is_empty()).then(|| host.to_string())
}

/// Rewrite the `ps` name of a `vmess://` line and re-encode it
///
/// Returns `None` when the payload is not decodable vmess JSON, in which
/// case the caller keeps the original line.
pub fn with_name(uri: &str, name: &str) -> Option<String> {
    let mut value = decode_payload(uri)?;
    if let Some(obj) = value.as_object_mut() {
        obj.insert("ps".to_string(), Value::String(name.to_string()));
    }
    let json = serde_json::to_string(&value).ok()?;
    Some(format!(
        "vmess://{}",
        base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
    ))
}

/// Canonical identity string for dedup: the decoded JSON minus name-like
/// keys (and any extra stripped keys), serialized with sorted keys
pub fn identity_json(value: &Value, extra_strip: &[String]) -> String {
    fn canonical(value: &Value, strip: &dyn Fn(&str) -> bool, top: bool) -> String {
        match value {
            Value::Object(map) => {
                let sorted: BTreeMap<&String, &Value> = map
                    .iter()
                    .filter(|(k, _)| !(top && strip(k)))
                    .collect();
                let inner: Vec<String> = sorted
                    .into_iter()
                    .map(|(k, v)| format!("{}:{}", k, canonical(v, strip, false)))
                    .collect();
                format!("{{{}}}", inner.join(","))
            }
            Value::Array(items) => {
                let inner: Vec<String> = items
                    .iter()
                    .map(|v| canonical(v, strip, false))
                    .collect();
                format!("[{}]", inner.join(","))
            }
            other => other.to_string(),
        }
    }

    let strip = |key: &str| {
        NAME_KEYS.contains(&key) || extra_strip.iter().any(|k| k == key)
    };
    canonical(value, &strip, true)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;

    fn encode_vmess(json: &str) -> String {
        format!(
            "vmess://{}",
            base64::engine::general_purpose::STANDARD.encode(json.as_bytes())
        )
    }

    #[test]
    fn payload_decodes_and_exposes_name() {
        let uri = encode_vmess(r#"{"v":"2","ps":"HK 01","add":"hk.example.com","port":"443","id":"uuid"}"#);
        let value = decode_payload(&uri).unwrap();
        assert_eq!(display_name(&value).as_deref(), Some("HK 01"));
        assert_eq!(host(&value).as_deref(), Some("hk.example.com"));
    }

    #[test]
    fn non_json_payload_is_rejected() {
        assert!(decode_payload("vmess://bm90IGpzb24gYXQgYWxsISEh").is_none());
        assert!(decode_payload("vmess://!!!").is_none());
    }

    #[test]
    fn with_name_round_trips() {
        let uri = encode_vmess(r#"{"ps":"old","add":"h","port":"443","id":"u"}"#);
        let renamed = with_name(&uri, "new name").unwrap();
        let value = decode_payload(&renamed).unwrap();
        assert_eq!(display_name(&value).as_deref(), Some("new name"));
        assert_eq!(host(&value).as_deref(), Some("h"));
    }

    #[test]
    fn identity_ignores_name_and_key_order() {
        let a: Value =
            serde_json::from_str(r#"{"ps":"A","add":"h","port":"443","id":"u"}"#).unwrap();
        let b: Value =
            serde_json::from_str(r#"{"id":"u","port":"443","add":"h","ps":"totally different"}"#)
                .unwrap();
        assert_eq!(identity_json(&a, &[]), identity_json(&b, &[]));
    }

    #[test]
    fn identity_differs_on_host() {
        let a: Value = serde_json::from_str(r#"{"ps":"A","add":"h1","id":"u"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"ps":"A","add":"h2","id":"u"}"#).unwrap();
        assert_ne!(identity_json(&a, &[]), identity_json(&b, &[]));
    }

    #[test]
    fn extra_strip_keys_are_honored() {
        let a: Value = serde_json::from_str(r#"{"ps":"A","add":"h","aid":"0"}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"ps":"A","add":"h","aid":"64"}"#).unwrap();
        assert_ne!(identity_json(&a, &[]), identity_json(&b, &[]));
        let strip = vec!["aid".to_string()];
        assert_eq!(identity_json(&a, &strip), identity_json(&b, &strip));
    }
}
