//! qparams-ui - Dioxus bindings for typed query parameters
//!
//! Wires `qparams-core` binders to the browser location. Wrap the app in
//! [`QueryParamsProvider`] (or call [`use_location_provider`] at the root),
//! then mount helpers per component with [`use_query_param_helpers`] or
//! [`use_deferred_query_param_helpers`].

pub mod hooks;
pub mod location;

pub use hooks::{
    use_deferred_query_param_helpers, use_query_param_helpers, DeferredQueryHandle, QueryHandle,
};
pub use location::{use_location_provider, use_location_store, LocationStore};

use dioxus::prelude::*;

/// Makes the location store available to every hook below it
#[component]
pub fn QueryParamsProvider(children: Element) -> Element {
    use_location_provider();
    rsx! {
        {children}
    }
}
