//! Parameter codecs
//!
//! A codec describes how one named value is represented in the query string:
//! its kind, an optional default, and the encode/decode pair between the
//! typed [`ParamValue`] and the wire string. Defaults are never written to
//! the wire, so `encode` returns `None` for a value equal to the default.

use serde::{Deserialize, Serialize};
use tracing::debug;

/// Delimiter used by set codecs when none is given
pub const DEFAULT_DELIMITER: &str = "_";

/// A decoded parameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Number(f64),
    Str(String),
    Set(Vec<String>),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            ParamValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&[String]> {
        match self {
            ParamValue::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Build a set value from anything yielding string-likes
    pub fn set<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ParamValue::Set(items.into_iter().map(Into::into).collect())
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Number(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Number(value.into())
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<Vec<String>> for ParamValue {
    fn from(value: Vec<String>) -> Self {
        ParamValue::Set(value)
    }
}

impl From<Vec<&str>> for ParamValue {
    fn from(value: Vec<&str>) -> Self {
        ParamValue::set(value)
    }
}

/// Shape of a parameter, resolved once when the configuration is built
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecKind {
    String,
    Number,
    Boolean,
    /// Unordered collection of strings joined by `delimiter` on the wire
    Set { delimiter: String },
}

impl CodecKind {
    pub fn name(&self) -> &'static str {
        match self {
            CodecKind::String => "string",
            CodecKind::Number => "number",
            CodecKind::Boolean => "boolean",
            CodecKind::Set { .. } => "set",
        }
    }
}

/// Encode/decode pair plus declared default for one parameter
#[derive(Debug, Clone, PartialEq)]
pub struct ParamCodec {
    kind: CodecKind,
    default: Option<ParamValue>,
}

impl ParamCodec {
    pub fn new(kind: CodecKind) -> Self {
        Self {
            kind,
            default: None,
        }
    }

    pub fn string() -> Self {
        Self::new(CodecKind::String)
    }

    pub fn number() -> Self {
        Self::new(CodecKind::Number)
    }

    /// Tri-state boolean: true, false or absent
    pub fn boolean() -> Self {
        Self::new(CodecKind::Boolean)
    }

    pub fn boolean_with_default(default: bool) -> Self {
        Self::boolean().with_default(default)
    }

    pub fn set() -> Self {
        Self::set_with_delimiter(DEFAULT_DELIMITER)
    }

    pub fn set_with_delimiter(delimiter: impl Into<String>) -> Self {
        Self::new(CodecKind::Set {
            delimiter: delimiter.into(),
        })
    }

    /// Declare the value implied by absence.
    ///
    /// Set defaults are normalized (sorted, deduplicated) so they compare
    /// equal to the values the helpers produce.
    pub fn with_default(mut self, default: impl Into<ParamValue>) -> Self {
        let default = default.into();
        self.default = match &self.kind {
            CodecKind::Set { delimiter } => normalize_set(default, delimiter),
            _ => Some(default),
        };
        self
    }

    pub fn kind(&self) -> &CodecKind {
        &self.kind
    }

    pub fn default_value(&self) -> Option<&ParamValue> {
        self.default.as_ref()
    }

    pub fn is_set(&self) -> bool {
        matches!(self.kind, CodecKind::Set { .. })
    }

    pub fn is_boolean(&self) -> bool {
        matches!(self.kind, CodecKind::Boolean)
    }

    /// Whether `value` has the shape this codec encodes
    pub fn accepts(&self, value: &ParamValue) -> bool {
        matches!(
            (&self.kind, value),
            (CodecKind::String, ParamValue::Str(_))
                | (CodecKind::Number, ParamValue::Number(_))
                | (CodecKind::Boolean, ParamValue::Bool(_))
                | (CodecKind::Set { .. }, ParamValue::Set(_))
        )
    }

    /// Whether `member` can be stored in this set codec and read back.
    /// Always false for non-set codecs.
    pub fn accepts_member(&self, member: &str) -> bool {
        match &self.kind {
            CodecKind::Set { delimiter } => {
                !member.is_empty() && !member.contains(delimiter.as_str())
            }
            _ => false,
        }
    }

    /// Encode a value for the wire. Absent and default values encode to `None`.
    pub fn encode(&self, value: Option<&ParamValue>) -> Option<String> {
        let value = value.or(self.default.as_ref())?;
        if self.default.as_ref() == Some(value) {
            return None;
        }

        match (&self.kind, value) {
            (CodecKind::String, ParamValue::Str(s)) => Some(s.clone()),
            (CodecKind::Number, ParamValue::Number(n)) if n.is_finite() => Some(n.to_string()),
            (CodecKind::Boolean, ParamValue::Bool(b)) => Some(b.to_string()),
            (CodecKind::Set { delimiter }, ParamValue::Set(items)) if !items.is_empty() => {
                Some(items.join(delimiter))
            }
            _ => None,
        }
    }

    /// Decode a wire string. Malformed input decodes to `None`, never an error.
    pub fn decode(&self, raw: Option<&str>) -> Option<ParamValue> {
        let raw = raw?;
        match &self.kind {
            CodecKind::String => Some(ParamValue::Str(raw.to_string())),
            CodecKind::Number => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(ParamValue::Number),
            CodecKind::Boolean => match raw {
                "" => None,
                "true" => Some(ParamValue::Bool(true)),
                _ => Some(ParamValue::Bool(false)),
            },
            CodecKind::Set { delimiter } => {
                let items: Vec<String> = raw
                    .split(delimiter.as_str())
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect();
                if items.is_empty() {
                    None
                } else {
                    Some(ParamValue::Set(items))
                }
            }
        }
    }

    /// Bring a value into canonical form.
    ///
    /// Sets are deduplicated and sorted, and an empty set collapses to `None`.
    /// Set members that are empty or contain the delimiter are dropped, as
    /// they could not be decoded back. Values of the wrong shape are dropped.
    pub fn normalize(&self, value: Option<ParamValue>) -> Option<ParamValue> {
        let value = value?;
        if !self.accepts(&value) {
            debug!(
                kind = self.kind.name(),
                ?value,
                "Dropping value that does not match codec"
            );
            return None;
        }
        match &self.kind {
            CodecKind::Set { delimiter } => normalize_set(value, delimiter),
            _ => Some(value),
        }
    }

    pub fn is_default(&self, value: Option<&ParamValue>) -> bool {
        value == self.default.as_ref()
    }
}

fn normalize_set(value: ParamValue, delimiter: &str) -> Option<ParamValue> {
    match value {
        ParamValue::Set(mut items) => {
            items.retain(|item| {
                let keep = !item.is_empty() && !item.contains(delimiter);
                if !keep {
                    debug!(
                        member = %item,
                        delimiter,
                        "Dropping set member that cannot be encoded"
                    );
                }
                keep
            });
            items.sort();
            items.dedup();
            if items.is_empty() {
                None
            } else {
                Some(ParamValue::Set(items))
            }
        }
        other => Some(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(items: &[&str]) -> ParamValue {
        ParamValue::set(items.iter().copied())
    }

    #[test]
    fn test_string_roundtrip() {
        let codec = ParamCodec::string();
        let value = ParamValue::from("hello world");
        let encoded = codec.encode(Some(&value));
        assert_eq!(encoded.as_deref(), Some("hello world"));
        assert_eq!(codec.decode(encoded.as_deref()), Some(value));
        assert_eq!(codec.encode(None), None);
    }

    #[test]
    fn test_string_default_is_omitted() {
        let codec = ParamCodec::string().with_default("all");
        assert_eq!(codec.encode(Some(&ParamValue::from("all"))), None);
        assert_eq!(codec.encode(None), None);
        assert_eq!(
            codec.encode(Some(&ParamValue::from("some"))).as_deref(),
            Some("some")
        );
    }

    #[test]
    fn test_number_roundtrip() {
        let codec = ParamCodec::number();
        for n in [0.0, 3.0, -12.5, 0.1 + 0.2, 1e21] {
            let value = ParamValue::Number(n);
            let encoded = codec.encode(Some(&value));
            assert_eq!(codec.decode(encoded.as_deref()), Some(value), "{n}");
        }
        assert_eq!(
            codec.encode(Some(&ParamValue::Number(3.0))).as_deref(),
            Some("3")
        );
    }

    #[test]
    fn test_number_rejects_garbage() {
        let codec = ParamCodec::number();
        assert_eq!(codec.decode(Some("abc")), None);
        assert_eq!(codec.decode(Some("NaN")), None);
        assert_eq!(codec.decode(Some("inf")), None);
        assert_eq!(codec.decode(Some("")), None);
        assert_eq!(codec.encode(Some(&ParamValue::Number(f64::NAN))), None);
    }

    #[test]
    fn test_boolean_tri_state() {
        let codec = ParamCodec::boolean();
        assert_eq!(codec.encode(Some(&true.into())).as_deref(), Some("true"));
        assert_eq!(codec.encode(Some(&false.into())).as_deref(), Some("false"));
        assert_eq!(codec.encode(None), None);

        assert_eq!(codec.decode(Some("true")), Some(true.into()));
        assert_eq!(codec.decode(Some("false")), Some(false.into()));
        assert_eq!(codec.decode(Some("yes")), Some(false.into()));
        assert_eq!(codec.decode(None), None);
    }

    #[test]
    fn test_boolean_with_default_omits_default() {
        let codec = ParamCodec::boolean_with_default(false);
        assert_eq!(codec.encode(Some(&false.into())), None);
        assert_eq!(codec.encode(None), None);
        assert_eq!(codec.encode(Some(&true.into())).as_deref(), Some("true"));

        let codec = ParamCodec::boolean_with_default(true);
        assert_eq!(codec.encode(None), None);
        assert_eq!(codec.encode(Some(&false.into())).as_deref(), Some("false"));
    }

    #[test]
    fn test_set_roundtrip_with_delimiter() {
        let codec = ParamCodec::set_with_delimiter("__");
        let value = set(&["ACTIVE", "NOT_MERGED"]);
        let encoded = codec.encode(Some(&value));
        assert_eq!(encoded.as_deref(), Some("ACTIVE__NOT_MERGED"));
        assert_eq!(codec.decode(encoded.as_deref()), Some(value));
    }

    #[test]
    fn test_set_decode_drops_empty_segments() {
        let codec = ParamCodec::set();
        assert_eq!(codec.decode(Some("a__b")), Some(set(&["a", "b"])));
        assert_eq!(codec.decode(Some("")), None);
        assert_eq!(codec.decode(Some("_")), None);
        assert_eq!(codec.encode(Some(&ParamValue::Set(vec![]))), None);
    }

    #[test]
    fn test_set_default_is_normalized_and_omitted() {
        let codec = ParamCodec::set_with_delimiter("__").with_default(vec!["GREAT", "HORRIBLE"]);
        assert_eq!(codec.default_value(), Some(&set(&["GREAT", "HORRIBLE"])));
        assert_eq!(codec.encode(Some(&set(&["GREAT", "HORRIBLE"]))), None);

        let codec = ParamCodec::set().with_default(vec!["b", "a", "b"]);
        assert_eq!(codec.default_value(), Some(&set(&["a", "b"])));
    }

    #[test]
    fn test_normalize_sorts_dedups_and_collapses() {
        let codec = ParamCodec::set();
        assert_eq!(
            codec.normalize(Some(set(&["c", "a", "c", "b"]))),
            Some(set(&["a", "b", "c"]))
        );
        assert_eq!(codec.normalize(Some(set(&[]))), None);
        assert_eq!(codec.normalize(Some(ParamValue::from("a"))), None);
    }

    #[test]
    fn test_normalize_drops_members_containing_delimiter() {
        let codec = ParamCodec::set();
        assert_eq!(
            codec.normalize(Some(set(&["MERGED", "NOT_MERGED"]))),
            Some(set(&["MERGED"]))
        );
        assert_eq!(codec.normalize(Some(set(&["NOT_MERGED", ""]))), None);

        let codec = ParamCodec::set_with_delimiter("__");
        assert_eq!(
            codec.normalize(Some(set(&["NOT_MERGED", "A__B"]))),
            Some(set(&["NOT_MERGED"]))
        );

        let codec = ParamCodec::set().with_default(vec!["OPEN", "NOT_OPEN"]);
        assert_eq!(codec.default_value(), Some(&set(&["OPEN"])));
    }

    #[test]
    fn test_param_value_serializes_as_bare_json() {
        let json = serde_json::to_string(&vec![
            ParamValue::from(true),
            ParamValue::from(2.5),
            ParamValue::from("x"),
            set(&["a"]),
        ])
        .unwrap();
        assert_eq!(json, r#"[true,2.5,"x",["a"]]"#);
    }
}
