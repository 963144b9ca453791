//! Key namespacing so one configuration can be mounted several times per page

use crate::config::{is_valid_segment, ConfigError, QueryConfig};
use crate::query::{QueryPatch, ValueMap};
use regex::Regex;
use std::fmt;

/// Separator between prefix and key on the wire
pub const SEPARATOR: char = '.';

/// Prepends `prefix.` to keys on the way to the URL and strips it on the way
/// back. Without a prefix both directions are the identity.
///
/// The anchored matcher is compiled once per prefix; binders keep the adapter
/// for as long as the prefix is unchanged.
#[derive(Clone)]
pub struct KeyPrefix {
    prefix: Option<String>,
    matcher: Option<Regex>,
}

impl KeyPrefix {
    pub fn none() -> Self {
        Self {
            prefix: None,
            matcher: None,
        }
    }

    /// An empty prefix is the same as no prefix
    pub fn new(prefix: Option<&str>) -> Result<Self, ConfigError> {
        let Some(prefix) = prefix.filter(|p| !p.is_empty()) else {
            return Ok(Self::none());
        };
        if !is_valid_segment(prefix) || prefix.contains(SEPARATOR) {
            return Err(ConfigError::InvalidPrefix(prefix.to_string()));
        }

        let pattern = format!("^{}\\{SEPARATOR}", regex::escape(prefix));
        let matcher =
            Regex::new(&pattern).map_err(|_| ConfigError::InvalidPrefix(prefix.to_string()))?;

        Ok(Self {
            prefix: Some(prefix.to_string()),
            matcher: Some(matcher),
        })
    }

    pub fn as_str(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    pub fn is_none(&self) -> bool {
        self.prefix.is_none()
    }

    pub fn apply_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}{SEPARATOR}{key}"),
            None => key.to_string(),
        }
    }

    pub fn strip_key(&self, key: &str) -> String {
        match &self.matcher {
            Some(matcher) => matcher.replace(key, "").into_owned(),
            None => key.to_string(),
        }
    }

    pub fn apply_config(&self, config: &QueryConfig) -> QueryConfig {
        if self.is_none() {
            return config.clone();
        }
        config.map_keys(|key| self.apply_key(key))
    }

    pub fn apply_patch(&self, patch: QueryPatch) -> QueryPatch {
        if self.is_none() {
            return patch;
        }
        patch
            .into_iter()
            .map(|(key, value)| (self.apply_key(&key), value))
            .collect()
    }

    pub fn strip_map(&self, map: ValueMap) -> ValueMap {
        if self.is_none() {
            return map;
        }
        map.map_keys(|key| self.strip_key(key))
    }
}

impl Default for KeyPrefix {
    fn default() -> Self {
        Self::none()
    }
}

impl PartialEq for KeyPrefix {
    fn eq(&self, other: &Self) -> bool {
        self.prefix == other.prefix
    }
}

impl fmt::Debug for KeyPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("KeyPrefix").field(&self.prefix).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ParamValue;

    #[test]
    fn test_roundtrip() {
        let prefix = KeyPrefix::new(Some("miro")).unwrap();
        for key in ["x", "name", "a.b", "miro", "miro.x"] {
            let applied = prefix.apply_key(key);
            assert_eq!(prefix.strip_key(&applied), key);
        }
        assert_eq!(prefix.apply_key("pat"), "miro.pat");
    }

    #[test]
    fn test_none_is_identity() {
        let prefix = KeyPrefix::new(None).unwrap();
        assert_eq!(prefix.apply_key("x"), "x");
        assert_eq!(prefix.strip_key("miro.x"), "miro.x");
        assert!(KeyPrefix::new(Some("")).unwrap().is_none());
    }

    #[test]
    fn test_strip_only_anchored_match() {
        let prefix = KeyPrefix::new(Some("john")).unwrap();
        assert_eq!(prefix.strip_key("miro.john.x"), "miro.john.x");
        assert_eq!(prefix.strip_key("johnx"), "johnx");
        assert_eq!(prefix.strip_key("john.count"), "count");
    }

    #[test]
    fn test_regex_metacharacters_are_literal() {
        let prefix = KeyPrefix::new(Some("a*b")).unwrap();
        assert_eq!(prefix.strip_key("a*b.x"), "x");
        assert_eq!(prefix.strip_key("aab.x"), "aab.x");
    }

    #[test]
    fn test_rejects_invalid_prefix() {
        for bad in ["a.b", "a b", "a=b", "a&b"] {
            assert_eq!(
                KeyPrefix::new(Some(bad)).unwrap_err(),
                ConfigError::InvalidPrefix(bad.to_string())
            );
        }
    }

    #[test]
    fn test_apply_config_and_patch() {
        let config = QueryConfig::builder()
            .number("count")
            .boolean_with_default("completed", false)
            .build()
            .unwrap();
        let prefix = KeyPrefix::new(Some("john")).unwrap();

        let prefixed = prefix.apply_config(&config);
        let keys: Vec<_> = prefixed.keys().collect();
        assert_eq!(keys, vec!["john.count", "john.completed"]);

        let patch = QueryPatch::from([("count".to_string(), Some(ParamValue::from(2)))]);
        let patch = prefix.apply_patch(patch);
        assert!(patch.contains_key("john.count"));
    }
}
