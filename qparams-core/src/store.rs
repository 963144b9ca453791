//! Query stores: the URL binding the helpers read from and write to

use crate::config::QueryConfig;
use crate::query::{QueryPatch, ValueMap};
use crate::url::{build_search, decode_query, merge_patch, parse_search};
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// A live key-value query binding.
///
/// `read` decodes the configured keys from the current URL; `write` encodes a
/// patch per codec, drops absent and default-valued entries from the
/// serialized string, and leaves unconfigured keys untouched.
pub trait QueryStore {
    fn read(&self, config: &QueryConfig) -> ValueMap;
    fn write(&self, config: &QueryConfig, patch: QueryPatch);
}

impl<S: QueryStore + ?Sized> QueryStore for Rc<S> {
    fn read(&self, config: &QueryConfig) -> ValueMap {
        (**self).read(config)
    }

    fn write(&self, config: &QueryConfig, patch: QueryPatch) {
        (**self).write(config, patch)
    }
}

/// In-memory search string, for hosts without a browser location and for tests
#[derive(Debug, Default)]
pub struct MemoryStore {
    pairs: RefCell<Vec<(String, String)>>,
    writes: Cell<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_search(search: &str) -> Self {
        Self {
            pairs: RefCell::new(parse_search(search)),
            writes: Cell::new(0),
        }
    }

    /// Current search string without the leading `?`
    pub fn search(&self) -> String {
        build_search(&self.pairs.borrow())
    }

    /// Raw wire value of `key`, if present
    pub fn get_raw(&self, key: &str) -> Option<String> {
        self.pairs
            .borrow()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Number of writes performed so far
    pub fn write_count(&self) -> usize {
        self.writes.get()
    }

    /// Replace the whole search string, as a navigation would
    pub fn navigate(&self, search: &str) {
        *self.pairs.borrow_mut() = parse_search(search);
    }
}

impl QueryStore for MemoryStore {
    fn read(&self, config: &QueryConfig) -> ValueMap {
        decode_query(config, &self.pairs.borrow())
    }

    fn write(&self, config: &QueryConfig, patch: QueryPatch) {
        merge_patch(config, &mut self.pairs.borrow_mut(), &patch);
        self.writes.set(self.writes.get() + 1);
        debug!(keys = patch.len(), search = %self.search(), "Query written");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::ParamValue;

    #[test]
    fn test_read_write() {
        let config = QueryConfig::builder()
            .number("count")
            .boolean_with_default("completed", false)
            .build()
            .unwrap();
        let store = MemoryStore::from_search("?keep=me");

        store.write(
            &config,
            QueryPatch::from([("completed".to_string(), Some(ParamValue::Bool(true)))]),
        );
        assert_eq!(store.search(), "keep=me&completed=true");
        assert_eq!(store.get_raw("completed").as_deref(), Some("true"));
        assert_eq!(store.write_count(), 1);

        let map = store.read(&config);
        assert_eq!(map.get("completed"), Some(&ParamValue::Bool(true)));
        assert!(map.is_at_default("count"));
    }

    #[test]
    fn test_navigate_replaces_search() {
        let store = MemoryStore::from_search("a=1");
        store.navigate("?b=2");
        assert_eq!(store.search(), "b=2");
        assert_eq!(store.write_count(), 0);
    }
}
