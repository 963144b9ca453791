//! Component hooks over the browser location
//!
//! Each hook mounts its binder once per component and re-points it on every
//! render, so helpers keep their identity until the configuration or prefix
//! changes.

use crate::location::use_location_store;
use dioxus::prelude::*;
use qparams_core::{
    ConfigError, DeferredQueryParamHelpers, Helpers, InitValues, QueryConfig, QueryParamHelpers,
    SetQuery, ValueMap,
};
use std::cell::RefCell;
use std::rc::Rc;

type Slot<T> = Rc<RefCell<Option<Rc<RefCell<T>>>>>;

/// Handle returned by [`use_query_param_helpers`]
#[derive(Clone)]
pub struct QueryHandle {
    binder: Rc<RefCell<QueryParamHelpers>>,
}

impl QueryHandle {
    pub fn query(&self) -> ValueMap {
        self.binder.borrow().query()
    }

    pub fn raw_query(&self) -> ValueMap {
        self.binder.borrow().raw_query()
    }

    pub fn helpers(&self) -> Rc<Helpers> {
        self.binder.borrow().helpers()
    }

    pub fn set_query(&self) -> SetQuery {
        self.binder.borrow().set_query().clone()
    }
}

/// Bind `config` to the URL, committing every helper call immediately.
///
/// `init` is only read on the first render, and merged into the URL by an
/// effect after that render.
pub fn use_query_param_helpers(
    config: Rc<QueryConfig>,
    prefix: Option<&str>,
    init: Option<Rc<InitValues>>,
) -> Result<QueryHandle, ConfigError> {
    let store = use_location_store();
    let slot: Slot<QueryParamHelpers> = use_hook(|| Rc::new(RefCell::new(None)));

    // Writing the location bumps a signal, which is not allowed during render
    let mounted = slot.clone();
    use_effect(move || {
        let binder = mounted.borrow().clone();
        if let Some(binder) = binder {
            binder.borrow().merge_initial();
        }
    });

    store.revision();

    let existing = slot.borrow().clone();
    let binder = match existing {
        Some(binder) => {
            binder.borrow_mut().remount(config, prefix)?;
            binder
        }
        None => {
            let binder = QueryParamHelpers::mount_pending(Rc::new(store), config, prefix, init)?;
            let binder = Rc::new(RefCell::new(binder));
            *slot.borrow_mut() = Some(binder.clone());
            binder
        }
    };

    Ok(QueryHandle { binder })
}

/// Handle returned by [`use_deferred_query_param_helpers`]
#[derive(Clone)]
pub struct DeferredQueryHandle {
    binder: Rc<RefCell<DeferredQueryParamHelpers>>,
}

impl DeferredQueryHandle {
    pub fn query(&self) -> ValueMap {
        self.binder.borrow().query()
    }

    pub fn helpers(&self) -> Rc<Helpers> {
        self.binder.borrow().helpers()
    }

    pub fn set_query(&self) -> SetQuery {
        self.binder.borrow().set_query().clone()
    }

    pub fn apply_query(&self) {
        self.binder.borrow().apply_query();
    }

    pub fn is_dirty(&self) -> bool {
        self.binder.borrow().is_dirty()
    }
}

/// Bind `config` to a local stage that only reaches the URL on
/// [`DeferredQueryHandle::apply_query`].
pub fn use_deferred_query_param_helpers(
    config: Rc<QueryConfig>,
    prefix: Option<&str>,
    init: Option<Rc<InitValues>>,
) -> Result<DeferredQueryHandle, ConfigError> {
    let store = use_location_store();
    let staged = use_signal(|| 0u64);
    let slot: Slot<DeferredQueryParamHelpers> = use_hook(|| Rc::new(RefCell::new(None)));
    store.revision();
    staged();

    let existing = slot.borrow().clone();
    let binder = match existing {
        Some(binder) => {
            binder.borrow_mut().remount(config, prefix)?;
            binder
        }
        None => {
            let binder = DeferredQueryParamHelpers::mount(Rc::new(store), config, prefix, init)?;
            binder.subscribe(move || {
                let mut staged = staged;
                *staged.write() += 1;
            });
            let binder = Rc::new(RefCell::new(binder));
            *slot.borrow_mut() = Some(binder.clone());
            binder
        }
    };
    Ok(DeferredQueryHandle { binder })
}
