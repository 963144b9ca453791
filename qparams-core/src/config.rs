//! Query configuration: an ordered, validated set of named codecs

use crate::codec::{CodecKind, ParamCodec, ParamValue, DEFAULT_DELIMITER};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Parameter key must not be empty")]
    EmptyKey,
    #[error("Duplicate parameter key: {0}")]
    DuplicateKey(String),
    #[error("Invalid parameter key: {0:?}")]
    InvalidKey(String),
    #[error("Set parameter {0} has an empty delimiter")]
    EmptyDelimiter(String),
    #[error("Default value of {key} does not match its {kind} codec")]
    DefaultKindMismatch { key: String, kind: &'static str },
    #[error("Invalid prefix: {0:?}")]
    InvalidPrefix(String),
}

/// Characters that would break `key=value&...` framing
const RESERVED: &[char] = &['&', '=', '#', '?', '+', '%'];

/// Whether `segment` can be used verbatim as (part of) a query key
pub(crate) fn is_valid_segment(segment: &str) -> bool {
    !segment.is_empty()
        && !segment
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || RESERVED.contains(&c))
}

/// One named parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamDef {
    pub key: String,
    pub codec: ParamCodec,
}

/// Ordered mapping from parameter name to codec.
///
/// Immutable once built; binders share it behind an `Rc`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryConfig {
    params: Vec<ParamDef>,
}

impl QueryConfig {
    pub fn builder() -> QueryConfigBuilder {
        QueryConfigBuilder::new()
    }

    /// Build from declarative records, e.g. deserialized from JSON
    pub fn from_specs(specs: impl IntoIterator<Item = ParamSpec>) -> Result<Self, ConfigError> {
        specs
            .into_iter()
            .fold(QueryConfigBuilder::new(), |builder, spec| {
                let (key, codec) = spec.into_codec();
                builder.param(key, codec)
            })
            .build()
    }

    pub fn get(&self, key: &str) -> Option<&ParamCodec> {
        self.params
            .iter()
            .find(|def| def.key == key)
            .map(|def| &def.codec)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamCodec)> {
        self.params.iter().map(|def| (def.key.as_str(), &def.codec))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|def| def.key.as_str())
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Copy of this configuration with every key rewritten by `f`
    pub(crate) fn map_keys(&self, f: impl Fn(&str) -> String) -> Self {
        Self {
            params: self
                .params
                .iter()
                .map(|def| ParamDef {
                    key: f(&def.key),
                    codec: def.codec.clone(),
                })
                .collect(),
        }
    }
}

/// Builder for creating a QueryConfig
pub struct QueryConfigBuilder {
    params: Vec<ParamDef>,
}

impl QueryConfigBuilder {
    pub fn new() -> Self {
        Self { params: Vec::new() }
    }

    /// Add a parameter with an explicit codec
    pub fn param(mut self, key: impl Into<String>, codec: ParamCodec) -> Self {
        self.params.push(ParamDef {
            key: key.into(),
            codec,
        });
        self
    }

    pub fn string(self, key: impl Into<String>) -> Self {
        self.param(key, ParamCodec::string())
    }

    pub fn number(self, key: impl Into<String>) -> Self {
        self.param(key, ParamCodec::number())
    }

    pub fn boolean(self, key: impl Into<String>) -> Self {
        self.param(key, ParamCodec::boolean())
    }

    pub fn boolean_with_default(self, key: impl Into<String>, default: bool) -> Self {
        self.param(key, ParamCodec::boolean_with_default(default))
    }

    pub fn set(self, key: impl Into<String>) -> Self {
        self.param(key, ParamCodec::set())
    }

    pub fn set_with_delimiter(self, key: impl Into<String>, delimiter: &str) -> Self {
        self.param(key, ParamCodec::set_with_delimiter(delimiter))
    }

    /// Set the default of the last added parameter
    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        if let Some(last) = self.params.pop() {
            let codec = last.codec.with_default(default);
            self.params.push(ParamDef {
                key: last.key,
                codec,
            });
        }
        self
    }

    /// Validate keys, delimiters and defaults
    pub fn build(self) -> Result<QueryConfig, ConfigError> {
        let mut seen = HashSet::new();
        for def in &self.params {
            if def.key.is_empty() {
                return Err(ConfigError::EmptyKey);
            }
            if !is_valid_segment(&def.key) {
                return Err(ConfigError::InvalidKey(def.key.clone()));
            }
            if !seen.insert(def.key.as_str()) {
                return Err(ConfigError::DuplicateKey(def.key.clone()));
            }
            if let CodecKind::Set { delimiter } = def.codec.kind() {
                if delimiter.is_empty() {
                    return Err(ConfigError::EmptyDelimiter(def.key.clone()));
                }
            }
            if let Some(default) = def.codec.default_value() {
                if !def.codec.accepts(default) {
                    return Err(ConfigError::DefaultKindMismatch {
                        key: def.key.clone(),
                        kind: def.codec.kind().name(),
                    });
                }
            }
        }

        Ok(QueryConfig {
            params: self.params,
        })
    }
}

impl Default for QueryConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_delimiter() -> String {
    DEFAULT_DELIMITER.to_string()
}

/// Declarative parameter record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ParamSpec {
    String {
        key: String,
        #[serde(default)]
        default: Option<String>,
    },
    Number {
        key: String,
        #[serde(default)]
        default: Option<f64>,
    },
    Boolean {
        key: String,
        #[serde(default)]
        default: Option<bool>,
    },
    Set {
        key: String,
        #[serde(default = "default_delimiter")]
        delimiter: String,
        #[serde(default)]
        default: Option<Vec<String>>,
    },
}

impl ParamSpec {
    fn into_codec(self) -> (String, ParamCodec) {
        match self {
            ParamSpec::String { key, default } => {
                let codec = ParamCodec::string();
                (key, with_optional_default(codec, default))
            }
            ParamSpec::Number { key, default } => {
                let codec = ParamCodec::number();
                (key, with_optional_default(codec, default))
            }
            ParamSpec::Boolean { key, default } => {
                let codec = ParamCodec::boolean();
                (key, with_optional_default(codec, default))
            }
            ParamSpec::Set {
                key,
                delimiter,
                default,
            } => {
                let codec = ParamCodec::set_with_delimiter(delimiter);
                (key, with_optional_default(codec, default))
            }
        }
    }
}

fn with_optional_default<T: Into<ParamValue>>(codec: ParamCodec, default: Option<T>) -> ParamCodec {
    match default {
        Some(default) => codec.with_default(default),
        None => codec,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_keeps_order() {
        let config = QueryConfig::builder()
            .number("x")
            .string("name")
            .set("coords")
            .boolean_with_default("active", false)
            .build()
            .unwrap();

        let keys: Vec<_> = config.keys().collect();
        assert_eq!(keys, vec!["x", "name", "coords", "active"]);
        assert_eq!(
            config.get("active").and_then(|c| c.default_value()),
            Some(&ParamValue::Bool(false))
        );
    }

    #[test]
    fn test_default_applies_to_last_param() {
        let config = QueryConfig::builder()
            .set_with_delimiter("rating", "__")
            .with_default(vec!["HORRIBLE", "GREAT"])
            .string("name")
            .build()
            .unwrap();

        assert_eq!(
            config.get("rating").and_then(|c| c.default_value()),
            Some(&ParamValue::set(["GREAT", "HORRIBLE"]))
        );
        assert_eq!(config.get("name").and_then(|c| c.default_value()), None);
    }

    #[test]
    fn test_rejects_duplicate_key() {
        let err = QueryConfig::builder()
            .string("name")
            .number("name")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::DuplicateKey("name".to_string()));
    }

    #[test]
    fn test_rejects_invalid_keys() {
        assert_eq!(
            QueryConfig::builder().string("").build().unwrap_err(),
            ConfigError::EmptyKey
        );
        for key in ["a=b", "a&b", "a b", "a#", "a?"] {
            let err = QueryConfig::builder().string(key).build().unwrap_err();
            assert!(matches!(err, ConfigError::InvalidKey(_)), "{key}");
        }
    }

    #[test]
    fn test_rejects_empty_delimiter() {
        let err = QueryConfig::builder()
            .set_with_delimiter("pat", "")
            .build()
            .unwrap_err();
        assert_eq!(err, ConfigError::EmptyDelimiter("pat".to_string()));
    }

    #[test]
    fn test_rejects_mismatched_default() {
        let err = QueryConfig::builder()
            .number("x")
            .with_default("ten")
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::DefaultKindMismatch { kind: "number", .. }
        ));
    }

    #[test]
    fn test_from_json_specs() {
        let json = r#"[
            {"kind": "number", "key": "count"},
            {"kind": "boolean", "key": "completed", "default": false},
            {"kind": "set", "key": "pat", "delimiter": "__"},
            {"kind": "set", "key": "coords"},
            {"kind": "string", "key": "name", "default": "anon"}
        ]"#;
        let specs: Vec<ParamSpec> = serde_json::from_str(json).unwrap();
        let config = QueryConfig::from_specs(specs).unwrap();

        assert_eq!(config.len(), 5);
        assert!(config.get("completed").unwrap().is_boolean());
        assert_eq!(
            config.get("pat").unwrap().kind(),
            &CodecKind::Set {
                delimiter: "__".to_string()
            }
        );
        assert_eq!(
            config.get("coords").unwrap().kind(),
            &CodecKind::Set {
                delimiter: "_".to_string()
            }
        );
        assert_eq!(
            config.get("name").unwrap().default_value(),
            Some(&ParamValue::from("anon"))
        );
    }
}
