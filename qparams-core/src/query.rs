//! Value maps, patches and the setter contract
//!
//! A [`ValueMap`] is one immutable version of the decoded query: every change
//! produces a new map. Each entry carries an explicit `at_default` flag next
//! to its value, which the set helpers use to tell "still at the declared
//! default" apart from "explicitly holds an equal value".

use crate::codec::{ParamCodec, ParamValue};
use crate::config::QueryConfig;
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::BTreeMap;
use std::rc::Rc;

/// Partial value map. `None` means absent, which reads back as the default.
pub type QueryPatch = BTreeMap<String, Option<ParamValue>>;

/// Write function handed to the helper synthesizer
pub type SetQuery = Rc<dyn Fn(QueryUpdate)>;

/// One decoded entry
#[derive(Debug, Clone, PartialEq)]
pub struct Slot {
    value: Option<ParamValue>,
    at_default: bool,
}

impl Slot {
    /// Resolve a requested value against the codec.
    ///
    /// Absent values and values equal to the default both land on the
    /// default, flagged `at_default`.
    pub fn resolve(codec: &ParamCodec, value: Option<ParamValue>) -> Self {
        let value = codec.normalize(value);
        if value.is_none() || codec.is_default(value.as_ref()) {
            Self::default_of(codec)
        } else {
            Self {
                value,
                at_default: false,
            }
        }
    }

    pub fn default_of(codec: &ParamCodec) -> Self {
        Self {
            value: codec.default_value().cloned(),
            at_default: true,
        }
    }

    pub fn value(&self) -> Option<&ParamValue> {
        self.value.as_ref()
    }

    pub fn is_at_default(&self) -> bool {
        self.at_default
    }
}

/// Current decoded values, one entry per configured key
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ValueMap {
    slots: BTreeMap<String, Slot>,
}

impl ValueMap {
    /// Every key at its declared default
    pub fn defaults(config: &QueryConfig) -> Self {
        Self {
            slots: config
                .iter()
                .map(|(key, codec)| (key.to_string(), Slot::default_of(codec)))
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.slots.get(key).and_then(Slot::value)
    }

    pub fn slot(&self, key: &str) -> Option<&Slot> {
        self.slots.get(key)
    }

    /// Unknown keys count as being at their (non-existent) default
    pub fn is_at_default(&self, key: &str) -> bool {
        self.slots.get(key).map_or(true, Slot::is_at_default)
    }

    /// Whether the set stored under `key` contains `member`
    pub fn has_member(&self, key: &str, member: &str) -> bool {
        self.get(key)
            .and_then(ParamValue::as_set)
            .is_some_and(|items| items.iter().any(|item| item == member))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Slot)> {
        self.slots.iter().map(|(key, slot)| (key.as_str(), slot))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub(crate) fn insert(&mut self, key: impl Into<String>, slot: Slot) {
        self.slots.insert(key.into(), slot);
    }

    /// New map with `patch` merged in. Keys outside `config` are ignored.
    pub fn with_patch(&self, config: &QueryConfig, patch: &QueryPatch) -> Self {
        let mut next = self.clone();
        for (key, value) in patch {
            if let Some(codec) = config.get(key) {
                next.insert(key.clone(), Slot::resolve(codec, value.clone()));
            }
        }
        next
    }

    /// Patch carrying every entry, with values equal to their default
    /// rewritten to absent
    pub fn without_defaults(&self, config: &QueryConfig) -> QueryPatch {
        config
            .iter()
            .map(|(key, codec)| {
                let value = self.get(key).filter(|v| !codec.is_default(Some(v))).cloned();
                (key.to_string(), value)
            })
            .collect()
    }

    pub fn map_keys(self, f: impl Fn(&str) -> String) -> Self {
        Self {
            slots: self
                .slots
                .into_iter()
                .map(|(key, slot)| (f(&key), slot))
                .collect(),
        }
    }
}

impl Serialize for ValueMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.slots.len()))?;
        for (key, slot) in &self.slots {
            map.serialize_entry(key, &slot.value)?;
        }
        map.end()
    }
}

/// Request to change the query: a literal patch, or a function of the latest
/// value map evaluated at write time. Returning `None` skips the write.
pub enum QueryUpdate {
    Patch(QueryPatch),
    With(Box<dyn FnOnce(&ValueMap) -> Option<QueryPatch>>),
}

impl QueryUpdate {
    pub fn with(f: impl FnOnce(&ValueMap) -> Option<QueryPatch> + 'static) -> Self {
        QueryUpdate::With(Box::new(f))
    }

    /// Patch touching a single key
    pub fn single(key: impl Into<String>, value: Option<ParamValue>) -> Self {
        QueryUpdate::Patch(QueryPatch::from([(key.into(), value)]))
    }

    pub fn resolve(self, prev: &ValueMap) -> Option<QueryPatch> {
        match self {
            QueryUpdate::Patch(patch) => Some(patch),
            QueryUpdate::With(f) => f(prev),
        }
    }
}

impl From<QueryPatch> for QueryUpdate {
    fn from(patch: QueryPatch) -> Self {
        QueryUpdate::Patch(patch)
    }
}
