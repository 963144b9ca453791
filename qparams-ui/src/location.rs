//! Browser URL binding
//!
//! Reads `location.search` and writes through `history.replaceState`, so
//! query updates never push history entries. A revision signal is bumped on
//! every write and on `popstate`, which re-renders the components that
//! mounted query helpers.

use dioxus::prelude::*;
use qparams_core::url::{build_search, decode_query, merge_patch, parse_search};
use qparams_core::{QueryConfig, QueryPatch, QueryStore, ValueMap};
use tracing::{debug, warn};
use wasm_bindgen::JsValue;

/// [`QueryStore`] over the current browser location
#[derive(Clone, Copy, PartialEq)]
pub struct LocationStore {
    revision: Signal<u64>,
}

impl LocationStore {
    pub fn new(revision: Signal<u64>) -> Self {
        Self { revision }
    }

    /// Current revision. Reading it subscribes the calling component.
    pub fn revision(&self) -> u64 {
        (self.revision)()
    }

    /// Mark the URL as changed outside this store
    pub fn refresh(&self) {
        let mut revision = self.revision;
        *revision.write() += 1;
    }
}

impl QueryStore for LocationStore {
    fn read(&self, config: &QueryConfig) -> ValueMap {
        decode_query(config, &parse_search(&current_search()))
    }

    fn write(&self, config: &QueryConfig, patch: QueryPatch) {
        let mut pairs = parse_search(&current_search());
        merge_patch(config, &mut pairs, &patch);
        let search = build_search(&pairs);

        if let Err(e) = replace_search(&search) {
            warn!("Failed to update URL: {e}");
            return;
        }
        debug!(keys = patch.len(), search = %search, "Query written to location");
        self.refresh();
    }
}

/// Search string of the current location, including the leading `?`
pub fn current_search() -> String {
    web_sys::window()
        .and_then(|w| w.location().search().ok())
        .unwrap_or_default()
}

fn replace_search(search: &str) -> Result<(), String> {
    let window = web_sys::window().ok_or("no window")?;
    let location = window.location();
    let path = location.pathname().map_err(|e| format!("{e:?}"))?;
    let hash = location.hash().unwrap_or_default();
    let history = window.history().map_err(|e| format!("{e:?}"))?;

    history
        .replace_state_with_url(&JsValue::NULL, "", Some(&url_with_search(&path, search, &hash)))
        .map_err(|e| format!("{e:?}"))
}

/// Relative URL for `path` with `search` (no leading `?`) and `hash`
pub fn url_with_search(path: &str, search: &str, hash: &str) -> String {
    if search.is_empty() {
        format!("{path}{hash}")
    } else {
        format!("{path}?{search}{hash}")
    }
}

/// Provide the location store to descendants. Call once near the root.
pub fn use_location_provider() -> LocationStore {
    let store = use_context_provider(|| LocationStore::new(Signal::new(0)));

    #[cfg(target_arch = "wasm32")]
    use_hook(move || install_popstate_listener(store));

    store
}

pub fn use_location_store() -> LocationStore {
    use_context::<LocationStore>()
}

/// Back/forward navigation changes the search without going through the
/// store; bump the revision so mounted helpers re-read it.
#[cfg(target_arch = "wasm32")]
fn install_popstate_listener(store: LocationStore) {
    use wasm_bindgen::{closure::Closure, JsCast};

    let Some(window) = web_sys::window() else {
        return;
    };
    let on_popstate: Closure<dyn FnMut()> =
        Closure::wrap(Box::new(move || store.refresh()) as Box<dyn FnMut()>);
    if window
        .add_event_listener_with_callback("popstate", on_popstate.as_ref().unchecked_ref())
        .is_err()
    {
        warn!("Failed to listen for popstate");
    }
    // Lives as long as the app root
    on_popstate.forget();
}
