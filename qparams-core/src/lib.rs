//! qparams-core - Typed query-string parameters with mutation helpers
//!
//! Binds a configuration of named, typed parameters to a URL query string and
//! synthesizes set/add/remove/toggle/clear helpers for each of them. The URL
//! itself is reached through the [`QueryStore`] trait, so the engine runs the
//! same against the browser location or an in-memory search string.

pub mod binder;
pub mod codec;
pub mod config;
pub mod helpers;
pub mod prefix;
pub mod query;
pub mod store;
pub mod url;

pub use binder::{DeferredQueryParamHelpers, QueryParamHelpers};
pub use codec::{CodecKind, ParamCodec, ParamValue, DEFAULT_DELIMITER};
pub use config::{ConfigError, ParamSpec, QueryConfig, QueryConfigBuilder};
pub use helpers::{
    build_helpers, Assign, BooleanHelpers, ClearFn, HelperFn, Helpers, HelpersCache, InitValues,
    MemberFn, ParamHelpers, ScalarHelpers, SetFn, SetHelpers, ToggleFn,
};
pub use prefix::{KeyPrefix, SEPARATOR};
pub use query::{QueryPatch, QueryUpdate, SetQuery, Slot, ValueMap};
pub use store::{MemoryStore, QueryStore};
