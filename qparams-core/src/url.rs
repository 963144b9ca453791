//! Query-string wire format
//!
//! Search strings are kept as ordered `(key, value)` pairs so keys owned by
//! other configurations (or by nobody) survive a write untouched. Each
//! configured key appears at most once, form-urlencoded.

use crate::config::QueryConfig;
use crate::query::{QueryPatch, Slot, ValueMap};
use tracing::debug;

/// Decode a search string (with or without the leading `?`) into pairs.
///
/// Undecodable input reads as an empty query.
pub fn parse_search(search: &str) -> Vec<(String, String)> {
    let search = search.strip_prefix('?').unwrap_or(search);
    match serde_urlencoded::from_str(search) {
        Ok(pairs) => pairs,
        Err(e) => {
            debug!(error = %e, "Ignoring undecodable search string");
            Vec::new()
        }
    }
}

/// Encode pairs into a search string without the leading `?`.
pub fn build_search(pairs: &[(String, String)]) -> String {
    match serde_urlencoded::to_string(pairs) {
        Ok(search) => search,
        Err(e) => {
            debug!(error = %e, "Failed to encode search string");
            String::new()
        }
    }
}

fn first_value<'a>(pairs: &'a [(String, String)], key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.as_str())
}

/// Decode the configured keys out of `pairs`. Malformed values read as absent.
pub fn decode_query(config: &QueryConfig, pairs: &[(String, String)]) -> ValueMap {
    let mut map = ValueMap::default();
    for (key, codec) in config.iter() {
        let value = codec.decode(first_value(pairs, key));
        map.insert(key, Slot::resolve(codec, value));
    }
    map
}

/// Wire pairs for the non-default entries of `map`, in configuration order.
pub fn encode_query(config: &QueryConfig, map: &ValueMap) -> Vec<(String, String)> {
    config
        .iter()
        .filter_map(|(key, codec)| {
            codec
                .encode(map.get(key))
                .map(|encoded| (key.to_string(), encoded))
        })
        .collect()
}

/// Write `patch` into `pairs` in place.
///
/// Existing keys keep their position, new keys are appended, and keys whose
/// value encodes to nothing (absent or default) are removed.
pub fn merge_patch(config: &QueryConfig, pairs: &mut Vec<(String, String)>, patch: &QueryPatch) {
    for (key, value) in patch {
        let Some(codec) = config.get(key) else {
            debug!(key = %key, "Ignoring patch entry for unconfigured key");
            continue;
        };
        let normalized = codec.normalize(value.clone());
        match codec.encode(normalized.as_ref()) {
            Some(encoded) => {
                let mut seen = false;
                pairs.retain_mut(|(k, v)| {
                    if k != key {
                        return true;
                    }
                    if seen {
                        return false;
                    }
                    seen = true;
                    *v = encoded.clone();
                    true
                });
                if !seen {
                    pairs.push((key.clone(), encoded));
                }
            }
            None => pairs.retain(|(k, _)| k != key),
        }
    }
}

/// Search string for a value map alone, e.g. for links
pub fn to_search(config: &QueryConfig, map: &ValueMap) -> String {
    build_search(&encode_query(config, map))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ParamValue;

    fn pairs(items: &[(&str, &str)]) -> Vec<(String, String)> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn config() -> QueryConfig {
        QueryConfig::builder()
            .number("x")
            .string("name")
            .boolean_with_default("active", false)
            .set_with_delimiter("miro.pat", "__")
            .build()
            .unwrap()
    }

    #[test]
    fn test_parse_and_build() {
        let parsed = parse_search("?x=1&name=hello%20world&flag&q=a+b");
        assert_eq!(
            parsed,
            pairs(&[("x", "1"), ("name", "hello world"), ("flag", ""), ("q", "a b")])
        );
        assert_eq!(
            build_search(&pairs(&[("name", "a b&c"), ("miro.pat", "A__B")])),
            "name=a+b%26c&miro.pat=A__B"
        );
        assert!(parse_search("").is_empty());
        assert!(parse_search("?").is_empty());
    }

    #[test]
    fn test_parse_lenient_escapes() {
        let parsed = parse_search("a=%E0%A4&b=%zz&c=x=y&&d=%C3%A9");
        assert_eq!(parsed[0], ("a".to_string(), "\u{FFFD}".to_string()));
        assert_eq!(parsed[1], ("b".to_string(), "%zz".to_string()));
        assert_eq!(parsed[2], ("c".to_string(), "x=y".to_string()));
        assert_eq!(parsed[3], ("d".to_string(), "é".to_string()));
        assert_eq!(parsed.len(), 4);
    }

    #[test]
    fn test_build_then_parse_keeps_reserved_characters() {
        let original = pairs(&[("q", "a&b=c d+e%"), ("miro.pat", "A__B")]);
        assert_eq!(parse_search(&build_search(&original)), original);
    }

    #[test]
    fn test_decode_query_tolerates_garbage() {
        let config = config();
        let map = decode_query(&config, &parse_search("x=abc&active=true&miro.pat=B__A"));
        assert_eq!(map.get("x"), None);
        assert!(map.is_at_default("x"));
        assert_eq!(map.get("active"), Some(&ParamValue::Bool(true)));
        assert_eq!(map.get("miro.pat"), Some(&ParamValue::set(["A", "B"])));
    }

    #[test]
    fn test_merge_patch_preserves_foreign_keys() {
        let config = config();
        let mut current = parse_search("other=1&name=bob&x=2");
        let patch = QueryPatch::from([
            ("name".to_string(), None),
            ("x".to_string(), Some(ParamValue::from(5))),
            ("active".to_string(), Some(ParamValue::Bool(true))),
        ]);
        merge_patch(&config, &mut current, &patch);
        assert_eq!(build_search(&current), "other=1&x=5&active=true");
    }

    #[test]
    fn test_merge_patch_omits_defaults() {
        let config = config();
        let mut current = parse_search("active=true");
        let patch = QueryPatch::from([("active".to_string(), Some(ParamValue::Bool(false)))]);
        merge_patch(&config, &mut current, &patch);
        assert!(current.is_empty());
    }

    #[test]
    fn test_merge_patch_collapses_duplicates() {
        let config = config();
        let mut current = parse_search("x=1&y=0&x=2");
        let patch = QueryPatch::from([("x".to_string(), Some(ParamValue::from(3)))]);
        merge_patch(&config, &mut current, &patch);
        assert_eq!(build_search(&current), "x=3&y=0");
    }

    #[test]
    fn test_to_search() {
        let config = config();
        let map = decode_query(&config, &parse_search("name=z&miro.pat=A__C&junk=1"));
        assert_eq!(to_search(&config, &map), "name=z&miro.pat=A__C");
    }
}
