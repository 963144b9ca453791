//! Binders: tie a configuration to a query store and expose helpers over it
//!
//! [`QueryParamHelpers`] commits every helper call straight to the store.
//! [`DeferredQueryParamHelpers`] stages helper calls locally and writes them
//! in one batch on [`DeferredQueryParamHelpers::apply_query`].

use crate::config::{ConfigError, QueryConfig};
use crate::helpers::{Helpers, HelpersCache, InitValues};
use crate::prefix::KeyPrefix;
use crate::query::{QueryUpdate, SetQuery, Slot, ValueMap};
use crate::store::QueryStore;
use std::cell::{Cell, RefCell};
use std::rc::Rc;
use tracing::debug;

/// Immediate-commit binder
pub struct QueryParamHelpers {
    store: Rc<dyn QueryStore>,
    config: Rc<QueryConfig>,
    prefixed: Rc<QueryConfig>,
    prefix: KeyPrefix,
    init: Option<Rc<InitValues>>,
    init_merged: Cell<bool>,
    set_query: SetQuery,
    cache: HelpersCache,
}

impl QueryParamHelpers {
    /// Mount `config` on `store`, optionally namespaced under `prefix`.
    ///
    /// `init` values are merged into keys still at their default, once, as a
    /// single write.
    pub fn mount(
        store: Rc<dyn QueryStore>,
        config: Rc<QueryConfig>,
        prefix: Option<&str>,
        init: Option<Rc<InitValues>>,
    ) -> Result<Self, ConfigError> {
        let binder = Self::mount_pending(store, config, prefix, init)?;
        binder.merge_initial();
        Ok(binder)
    }

    /// Mount without touching the store. The initializer stays pending until
    /// [`merge_initial`](Self::merge_initial).
    pub fn mount_pending(
        store: Rc<dyn QueryStore>,
        config: Rc<QueryConfig>,
        prefix: Option<&str>,
        init: Option<Rc<InitValues>>,
    ) -> Result<Self, ConfigError> {
        let prefix = KeyPrefix::new(prefix)?;
        let prefixed = Rc::new(prefix.apply_config(&config));
        let set_query = store_setter(&store, &prefixed);

        Ok(Self {
            store,
            config,
            prefixed,
            prefix,
            init,
            init_merged: Cell::new(false),
            set_query,
            cache: HelpersCache::new(),
        })
    }

    /// Run the initializer merge if it has not run yet.
    ///
    /// Returns whether a merge was issued. Later calls, including after a
    /// remount, are no-ops.
    pub fn merge_initial(&self) -> bool {
        if self.init_merged.replace(true) {
            return false;
        }
        self.helpers().run_initial_merge()
    }

    /// Re-point the binder at a (possibly) new configuration or prefix.
    ///
    /// Helpers keep their identity when neither changed.
    pub fn remount(&mut self, config: Rc<QueryConfig>, prefix: Option<&str>) -> Result<(), ConfigError> {
        let prefix_changed = self.prefix.as_str() != prefix.filter(|p| !p.is_empty());
        if !prefix_changed && Rc::ptr_eq(&self.config, &config) {
            return Ok(());
        }

        if prefix_changed {
            self.prefix = KeyPrefix::new(prefix)?;
        }
        if self.init_merged.get() {
            self.init = None;
        }
        self.prefixed = Rc::new(self.prefix.apply_config(&config));
        self.config = config;
        self.set_query = store_setter(&self.store, &self.prefixed);
        debug!(prefix = ?self.prefix.as_str(), "Remounted query helpers");
        Ok(())
    }

    /// Current values under unprefixed names
    pub fn query(&self) -> ValueMap {
        self.prefix.strip_map(self.raw_query())
    }

    /// Current values under their wire names
    pub fn raw_query(&self) -> ValueMap {
        self.store.read(&self.prefixed)
    }

    pub fn helpers(&self) -> Rc<Helpers> {
        self.cache.get_or_build(
            &self.prefixed,
            &self.set_query,
            &self.prefix,
            self.init.as_ref(),
        )
    }

    /// Setter over wire names; patches go straight to the store
    pub fn set_query(&self) -> &SetQuery {
        &self.set_query
    }

    pub fn config(&self) -> &Rc<QueryConfig> {
        &self.config
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }
}

/// Setter that reads the store at call time, so update functions always see
/// the latest URL state
fn store_setter(store: &Rc<dyn QueryStore>, config: &Rc<QueryConfig>) -> SetQuery {
    let store = store.clone();
    let config = config.clone();
    Rc::new(move |update: QueryUpdate| {
        let patch = match update {
            QueryUpdate::Patch(patch) => patch,
            QueryUpdate::With(f) => {
                let prev = store.read(&config);
                match f(&prev) {
                    Some(patch) => patch,
                    None => return,
                }
            }
        };
        store.write(&config, patch);
    })
}

type Listener = Rc<dyn Fn()>;

/// Deferred-commit binder.
///
/// Helpers mutate a local stage seeded from defaults and the initializer.
/// A remount onto a new configuration reseeds from defaults only. The store
/// is untouched until [`apply_query`](Self::apply_query), which
/// writes the whole stage at once and leaves it in place.
pub struct DeferredQueryParamHelpers {
    store: Rc<dyn QueryStore>,
    config: Rc<QueryConfig>,
    target: Rc<QueryConfig>,
    prefix: KeyPrefix,
    stage: Rc<RefCell<ValueMap>>,
    listeners: Rc<RefCell<Vec<Listener>>>,
    set_query: SetQuery,
    cache: HelpersCache,
}

impl DeferredQueryParamHelpers {
    pub fn mount(
        store: Rc<dyn QueryStore>,
        config: Rc<QueryConfig>,
        prefix: Option<&str>,
        init: Option<Rc<InitValues>>,
    ) -> Result<Self, ConfigError> {
        let prefix = KeyPrefix::new(prefix)?;
        let target = Rc::new(prefix.apply_config(&config));
        let stage = Rc::new(RefCell::new(seed_stage(&config, init.as_deref())));
        let listeners = Rc::new(RefCell::new(Vec::new()));
        let set_query = stage_setter(&config, &stage, &listeners);

        Ok(Self {
            store,
            config,
            target,
            prefix,
            stage,
            listeners,
            set_query,
            cache: HelpersCache::new(),
        })
    }

    /// Re-point the binder at a (possibly) new configuration or prefix.
    ///
    /// A new configuration reseeds the stage; a new prefix only moves where
    /// the next `apply_query` writes.
    pub fn remount(&mut self, config: Rc<QueryConfig>, prefix: Option<&str>) -> Result<(), ConfigError> {
        if self.prefix.as_str() != prefix.filter(|p| !p.is_empty()) {
            self.prefix = KeyPrefix::new(prefix)?;
            self.target = Rc::new(self.prefix.apply_config(&config));
        }
        if Rc::ptr_eq(&self.config, &config) {
            return Ok(());
        }

        debug!(keys = config.len(), "Reseeding staged query");
        self.target = Rc::new(self.prefix.apply_config(&config));
        *self.stage.borrow_mut() = seed_stage(&config, None);
        self.set_query = stage_setter(&config, &self.stage, &self.listeners);
        self.config = config;
        notify(&self.listeners);
        Ok(())
    }

    /// Staged values under unprefixed names
    pub fn query(&self) -> ValueMap {
        self.stage.borrow().clone()
    }

    /// Setter over unprefixed names; patches land in the stage only
    pub fn set_query(&self) -> &SetQuery {
        &self.set_query
    }

    pub fn helpers(&self) -> Rc<Helpers> {
        self.cache
            .get_or_build(&self.config, &self.set_query, &KeyPrefix::none(), None)
    }

    /// Write the stage to the store in one write.
    ///
    /// Entries equal to their default are written as absent, so they drop
    /// out of the URL. The stage itself is kept.
    pub fn apply_query(&self) {
        let patch = self.stage.borrow().without_defaults(&self.config);
        let patch = self.prefix.apply_patch(patch);
        debug!(keys = patch.len(), prefix = ?self.prefix.as_str(), "Applying staged query");
        self.store.write(&self.target, patch);
    }

    /// Whether the stage differs from what the store holds
    pub fn is_dirty(&self) -> bool {
        let committed = self.prefix.strip_map(self.store.read(&self.target));
        committed != *self.stage.borrow()
    }

    /// Register a callback run after every stage change
    pub fn subscribe(&self, listener: impl Fn() + 'static) {
        self.listeners.borrow_mut().push(Rc::new(listener));
    }

    pub fn config(&self) -> &Rc<QueryConfig> {
        &self.config
    }

    pub fn prefix(&self) -> &KeyPrefix {
        &self.prefix
    }
}

fn seed_stage(config: &QueryConfig, init: Option<&InitValues>) -> ValueMap {
    let mut stage = ValueMap::default();
    for (key, codec) in config.iter() {
        let value = init.and_then(|init| init.get(key)).cloned();
        stage.insert(key, Slot::resolve(codec, value));
    }
    stage
}

fn stage_setter(
    config: &Rc<QueryConfig>,
    stage: &Rc<RefCell<ValueMap>>,
    listeners: &Rc<RefCell<Vec<Listener>>>,
) -> SetQuery {
    let config = config.clone();
    let stage = stage.clone();
    let listeners = listeners.clone();
    Rc::new(move |update: QueryUpdate| {
        let prev = stage.borrow().clone();
        let Some(patch) = update.resolve(&prev) else {
            return;
        };
        *stage.borrow_mut() = prev.with_patch(&config, &patch);
        notify(&listeners);
    })
}

fn notify(listeners: &Rc<RefCell<Vec<Listener>>>) {
    let listeners = listeners.borrow().clone();
    for listener in listeners {
        listener();
    }
}
