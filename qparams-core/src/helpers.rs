//! Helper synthesis
//!
//! Given a (possibly prefixed) configuration and a setter, build one helper
//! bundle per key, shaped by the key's codec kind:
//!
//! - scalar: `set`
//! - boolean: `set`, `toggle`
//! - set-valued: `set`, `add`, `remove`, `toggle`
//!
//! Every operation is also exposed under a flattened name such as `addPat`
//! or `toggleActive`, sharing the same function reference as the nested
//! form. `clear` resets keys to their declared defaults in one write.
//!
//! Mutations that depend on the current value go through the update-function
//! form of the setter, so they always see the latest value map rather than
//! the one captured when the helpers were built.

use crate::codec::{CodecKind, ParamCodec, ParamValue};
use crate::config::QueryConfig;
use crate::prefix::KeyPrefix;
use crate::query::{QueryPatch, QueryUpdate, SetQuery, Slot};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;
use tracing::debug;

/// Initial values keyed by unprefixed parameter name
pub type InitValues = BTreeMap<String, ParamValue>;

/// Argument of a `set` helper: a literal, or a function of the previous value
pub enum Assign {
    Value(Option<ParamValue>),
    With(Box<dyn FnOnce(Option<&ParamValue>) -> Option<ParamValue>>),
}

impl Assign {
    pub fn with(f: impl FnOnce(Option<&ParamValue>) -> Option<ParamValue> + 'static) -> Self {
        Assign::With(Box::new(f))
    }
}

impl From<ParamValue> for Assign {
    fn from(value: ParamValue) -> Self {
        Assign::Value(Some(value))
    }
}

impl From<Option<ParamValue>> for Assign {
    fn from(value: Option<ParamValue>) -> Self {
        Assign::Value(value)
    }
}

/// `set(value?)` for any kind
#[derive(Clone)]
pub struct SetFn(Rc<dyn Fn(Assign)>);

impl SetFn {
    fn new(f: impl Fn(Assign) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, assign: impl Into<Assign>) {
        (self.0)(assign.into())
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Boolean `toggle()`
#[derive(Clone)]
pub struct ToggleFn(Rc<dyn Fn()>);

impl ToggleFn {
    fn new(f: impl Fn() + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self) {
        (self.0)()
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// Set-valued `add`, `remove` and `toggle`
#[derive(Clone)]
pub struct MemberFn(Rc<dyn Fn(&str)>);

impl MemberFn {
    fn new(f: impl Fn(&str) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, member: &str) {
        (self.0)(member)
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

/// `clear(keys?)`
#[derive(Clone)]
pub struct ClearFn(Rc<dyn Fn(Option<&[&str]>)>);

impl ClearFn {
    fn new(f: impl Fn(Option<&[&str]>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    pub fn call(&self, keys: Option<&[&str]>) {
        (self.0)(keys)
    }
}

/// A flattened helper
#[derive(Clone)]
pub enum HelperFn {
    Set(SetFn),
    Toggle(ToggleFn),
    Member(MemberFn),
}

impl HelperFn {
    pub fn as_set(&self) -> Option<&SetFn> {
        match self {
            HelperFn::Set(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_toggle(&self) -> Option<&ToggleFn> {
        match self {
            HelperFn::Toggle(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_member(&self) -> Option<&MemberFn> {
        match self {
            HelperFn::Member(f) => Some(f),
            _ => None,
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HelperFn::Set(a), HelperFn::Set(b)) => a.ptr_eq(b),
            (HelperFn::Toggle(a), HelperFn::Toggle(b)) => a.ptr_eq(b),
            (HelperFn::Member(a), HelperFn::Member(b)) => a.ptr_eq(b),
            _ => false,
        }
    }
}

#[derive(Clone)]
pub struct ScalarHelpers {
    set: SetFn,
}

impl ScalarHelpers {
    pub fn set(&self, value: impl Into<Option<ParamValue>>) {
        self.set.call(Assign::Value(value.into()));
    }

    pub fn update(&self, f: impl FnOnce(Option<&ParamValue>) -> Option<ParamValue> + 'static) {
        self.set.call(Assign::with(f));
    }

    pub fn set_fn(&self) -> &SetFn {
        &self.set
    }
}

#[derive(Clone)]
pub struct BooleanHelpers {
    set: SetFn,
    toggle: ToggleFn,
}

impl BooleanHelpers {
    pub fn set(&self, value: impl Into<Option<bool>>) {
        self.set
            .call(Assign::Value(value.into().map(ParamValue::Bool)));
    }

    pub fn update(&self, f: impl FnOnce(Option<bool>) -> Option<bool> + 'static) {
        self.set.call(Assign::with(move |prev| {
            f(prev.and_then(ParamValue::as_bool)).map(ParamValue::Bool)
        }));
    }

    /// Flip the current value; absent counts as false
    pub fn toggle(&self) {
        self.toggle.call();
    }

    pub fn set_fn(&self) -> &SetFn {
        &self.set
    }

    pub fn toggle_fn(&self) -> &ToggleFn {
        &self.toggle
    }
}

#[derive(Clone)]
pub struct SetHelpers {
    set: SetFn,
    add: MemberFn,
    remove: MemberFn,
    toggle: MemberFn,
}

impl SetHelpers {
    /// Replace the members. An empty collection stores absent.
    pub fn set<I, S>(&self, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.set.call(ParamValue::set(values));
    }

    pub fn unset(&self) {
        self.set.call(Assign::Value(None));
    }

    pub fn update(&self, f: impl FnOnce(&[String]) -> Vec<String> + 'static) {
        self.set.call(Assign::with(move |prev| {
            let current = prev.and_then(ParamValue::as_set).unwrap_or(&[]);
            Some(ParamValue::Set(f(current)))
        }));
    }

    pub fn add(&self, member: &str) {
        self.add.call(member);
    }

    pub fn remove(&self, member: &str) {
        self.remove.call(member);
    }

    pub fn toggle(&self, member: &str) {
        self.toggle.call(member);
    }

    pub fn set_fn(&self) -> &SetFn {
        &self.set
    }

    pub fn add_fn(&self) -> &MemberFn {
        &self.add
    }

    pub fn remove_fn(&self) -> &MemberFn {
        &self.remove
    }

    pub fn toggle_fn(&self) -> &MemberFn {
        &self.toggle
    }
}

/// Helper bundle for one key
#[derive(Clone)]
pub enum ParamHelpers {
    Scalar(ScalarHelpers),
    Boolean(BooleanHelpers),
    Set(SetHelpers),
}

impl ParamHelpers {
    pub fn as_scalar(&self) -> Option<&ScalarHelpers> {
        match self {
            ParamHelpers::Scalar(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_boolean(&self) -> Option<&BooleanHelpers> {
        match self {
            ParamHelpers::Boolean(h) => Some(h),
            _ => None,
        }
    }

    pub fn as_set(&self) -> Option<&SetHelpers> {
        match self {
            ParamHelpers::Set(h) => Some(h),
            _ => None,
        }
    }

    pub fn set_fn(&self) -> &SetFn {
        match self {
            ParamHelpers::Scalar(h) => &h.set,
            ParamHelpers::Boolean(h) => &h.set,
            ParamHelpers::Set(h) => &h.set,
        }
    }

    /// Operation names paired with their functions, in flattening order
    pub fn operations(&self) -> Vec<(&'static str, HelperFn)> {
        match self {
            ParamHelpers::Scalar(h) => vec![("set", HelperFn::Set(h.set.clone()))],
            ParamHelpers::Boolean(h) => vec![
                ("set", HelperFn::Set(h.set.clone())),
                ("toggle", HelperFn::Toggle(h.toggle.clone())),
            ],
            ParamHelpers::Set(h) => vec![
                ("set", HelperFn::Set(h.set.clone())),
                ("add", HelperFn::Member(h.add.clone())),
                ("remove", HelperFn::Member(h.remove.clone())),
                ("toggle", HelperFn::Member(h.toggle.clone())),
            ],
        }
    }
}

/// All helpers for one mounted configuration
pub struct Helpers {
    params: Vec<(String, ParamHelpers)>,
    flat: BTreeMap<String, HelperFn>,
    clear: ClearFn,
    config: Rc<QueryConfig>,
    prefix: KeyPrefix,
    set_query: SetQuery,
    init: Option<Rc<InitValues>>,
    init_pending: Cell<bool>,
}

impl Helpers {
    /// Nested helpers of `key` (unprefixed)
    pub fn get(&self, key: &str) -> Option<&ParamHelpers> {
        self.params
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, helpers)| helpers)
    }

    pub fn scalar(&self, key: &str) -> Option<&ScalarHelpers> {
        self.get(key).and_then(ParamHelpers::as_scalar)
    }

    pub fn boolean(&self, key: &str) -> Option<&BooleanHelpers> {
        self.get(key).and_then(ParamHelpers::as_boolean)
    }

    pub fn set_valued(&self, key: &str) -> Option<&SetHelpers> {
        self.get(key).and_then(ParamHelpers::as_set)
    }

    /// Flattened helper, e.g. `"togglePat"`
    pub fn flat(&self, name: &str) -> Option<&HelperFn> {
        self.flat.get(name)
    }

    pub fn flat_names(&self) -> impl Iterator<Item = &str> {
        self.flat.keys().map(String::as_str)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.params.iter().map(|(key, _)| key.as_str())
    }

    /// Reset the named keys to their defaults. An empty list resets all.
    pub fn clear(&self, keys: &[&str]) {
        self.clear.call(Some(keys));
    }

    pub fn clear_all(&self) {
        self.clear.call(None);
    }

    pub fn clear_fn(&self) -> &ClearFn {
        &self.clear
    }

    /// Fill initializer values into keys that are still at their default.
    ///
    /// Runs at most once per helpers instance, as one batched write. Values
    /// the URL already carries are never overwritten. Returns whether a merge
    /// was issued.
    pub fn run_initial_merge(&self) -> bool {
        if !self.init_pending.replace(false) {
            return false;
        }
        let Some(init) = self.init.as_ref() else {
            return false;
        };

        let targets: Vec<(String, ParamValue)> = self
            .config
            .keys()
            .filter_map(|key| {
                init.get(&self.prefix.strip_key(key))
                    .map(|value| (key.to_string(), value.clone()))
            })
            .collect();
        if targets.is_empty() {
            return false;
        }

        debug!(keys = targets.len(), "Merging initial query values");
        (self.set_query)(QueryUpdate::with(move |prev| {
            let patch: QueryPatch = targets
                .into_iter()
                .filter(|(key, _)| prev.is_at_default(key))
                .map(|(key, value)| (key, Some(value)))
                .collect();
            if patch.is_empty() {
                None
            } else {
                Some(patch)
            }
        }));
        true
    }
}

impl fmt::Debug for Helpers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Helpers")
            .field("keys", &self.keys().collect::<Vec<_>>())
            .field("flat", &self.flat_names().collect::<Vec<_>>())
            .field("prefix", &self.prefix)
            .finish()
    }
}

/// Build helpers for `config` writing through `set_query`.
///
/// `config` carries prefixed keys; `prefix` strips them back for the names
/// exposed to callers.
pub fn build_helpers(
    config: &Rc<QueryConfig>,
    set_query: &SetQuery,
    prefix: &KeyPrefix,
    init: Option<&Rc<InitValues>>,
) -> Helpers {
    let params: Vec<(String, ParamHelpers)> = config
        .iter()
        .map(|(key, codec)| (prefix.strip_key(key), param_helpers(key, codec, set_query)))
        .collect();

    let mut flat = BTreeMap::new();
    for (key, helpers) in &params {
        let capitalized = capitalize(key);
        for (op, f) in helpers.operations() {
            let name = format!("{op}{capitalized}");
            if flat.insert(name.clone(), f).is_some() {
                debug!(name = %name, "Flattened helper name collision, later key wins");
            }
        }
    }

    Helpers {
        params,
        flat,
        clear: clear_fn(config, prefix, set_query),
        config: config.clone(),
        prefix: prefix.clone(),
        set_query: set_query.clone(),
        init: init.cloned(),
        init_pending: Cell::new(init.is_some()),
    }
}

fn capitalize(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn param_helpers(key: &str, codec: &ParamCodec, set_query: &SetQuery) -> ParamHelpers {
    let set = set_fn(key, codec, set_query);
    match codec.kind() {
        CodecKind::Set { .. } => ParamHelpers::Set(SetHelpers {
            set,
            add: member_fn(key, codec, set_query, add_member),
            remove: member_fn(key, codec, set_query, remove_member),
            toggle: member_fn(key, codec, set_query, toggle_member),
        }),
        CodecKind::Boolean => ParamHelpers::Boolean(BooleanHelpers {
            set,
            toggle: toggle_fn(key, set_query),
        }),
        CodecKind::String | CodecKind::Number => ParamHelpers::Scalar(ScalarHelpers { set }),
    }
}

fn set_fn(key: &str, codec: &ParamCodec, set_query: &SetQuery) -> SetFn {
    let key = key.to_string();
    let codec = codec.clone();
    let set_query = set_query.clone();
    SetFn::new(move |assign| match assign {
        Assign::Value(value) => {
            set_query(QueryUpdate::single(key.clone(), codec.normalize(value)));
        }
        Assign::With(f) => {
            let key = key.clone();
            let codec = codec.clone();
            set_query(QueryUpdate::with(move |prev| {
                let next = codec.normalize(f(prev.get(&key)));
                Some(QueryPatch::from([(key, next)]))
            }));
        }
    })
}

fn toggle_fn(key: &str, set_query: &SetQuery) -> ToggleFn {
    let key = key.to_string();
    let set_query = set_query.clone();
    ToggleFn::new(move || {
        let key = key.clone();
        set_query(QueryUpdate::with(move |prev| {
            let current = prev.get(&key).and_then(ParamValue::as_bool).unwrap_or(false);
            Some(QueryPatch::from([(key, Some(ParamValue::Bool(!current)))]))
        }));
    })
}

/// Next members given the key's current slot, or `None` for a no-op
type MemberOp = fn(&Slot, String) -> Option<Vec<String>>;

fn member_fn(key: &str, codec: &ParamCodec, set_query: &SetQuery, op: MemberOp) -> MemberFn {
    let key = key.to_string();
    let codec = codec.clone();
    let set_query = set_query.clone();
    MemberFn::new(move |member: &str| {
        if !codec.accepts_member(member) {
            debug!(key = %key, member, "Ignoring set member that cannot be encoded");
            return;
        }
        let key = key.clone();
        let codec = codec.clone();
        let member = member.to_string();
        set_query(QueryUpdate::with(move |prev| {
            let Some(slot) = prev.slot(&key) else {
                debug!(key = %key, "Helper called for a key missing from the query");
                return None;
            };
            let next = op(slot, member)?;
            Some(QueryPatch::from([(key, codec.normalize(Some(ParamValue::Set(next))))]))
        }));
    })
}

fn members(slot: &Slot) -> &[String] {
    slot.value().and_then(ParamValue::as_set).unwrap_or(&[])
}

fn add_member(slot: &Slot, member: String) -> Option<Vec<String>> {
    if slot.is_at_default() {
        return Some(vec![member]);
    }
    let current = members(slot);
    if current.contains(&member) {
        return None;
    }
    let mut next = current.to_vec();
    next.push(member);
    Some(next)
}

fn remove_member(slot: &Slot, member: String) -> Option<Vec<String>> {
    let current = members(slot);
    if !current.contains(&member) {
        return None;
    }
    Some(
        current
            .iter()
            .filter(|item| **item != member)
            .cloned()
            .collect(),
    )
}

fn toggle_member(slot: &Slot, member: String) -> Option<Vec<String>> {
    if slot.is_at_default() {
        return Some(vec![member]);
    }
    let current = members(slot);
    if current.contains(&member) {
        remove_member(slot, member)
    } else {
        let mut next = current.to_vec();
        next.push(member);
        Some(next)
    }
}

fn clear_fn(config: &Rc<QueryConfig>, prefix: &KeyPrefix, set_query: &SetQuery) -> ClearFn {
    let config = config.clone();
    let prefix = prefix.clone();
    let set_query = set_query.clone();
    ClearFn::new(move |keys: Option<&[&str]>| {
        let keys = keys.filter(|keys| !keys.is_empty());
        let patch: QueryPatch = config
            .iter()
            .filter(|(key, _)| keys.map_or(true, |keys| keys.contains(&prefix.strip_key(key).as_str())))
            .map(|(key, codec)| (key.to_string(), codec.default_value().cloned()))
            .collect();

        if let Some(keys) = keys {
            if patch.len() < keys.len() {
                debug!(requested = keys.len(), matched = patch.len(), "Clear named unknown keys");
            }
        }
        set_query(QueryUpdate::Patch(patch));
    })
}

/// Memo over [`build_helpers`].
///
/// Returns the same `Rc<Helpers>` for as long as the configuration, setter,
/// initializer (all by pointer) and prefix (by value) are unchanged.
#[derive(Default)]
pub struct HelpersCache {
    entry: RefCell<Option<CacheEntry>>,
}

struct CacheEntry {
    config: Rc<QueryConfig>,
    set_query: SetQuery,
    prefix: KeyPrefix,
    init: Option<Rc<InitValues>>,
    helpers: Rc<Helpers>,
}

impl CacheEntry {
    fn matches(
        &self,
        config: &Rc<QueryConfig>,
        set_query: &SetQuery,
        prefix: &KeyPrefix,
        init: Option<&Rc<InitValues>>,
    ) -> bool {
        let same_init = match (&self.init, init) {
            (None, None) => true,
            (Some(a), Some(b)) => Rc::ptr_eq(a, b),
            _ => false,
        };
        Rc::ptr_eq(&self.config, config)
            && Rc::ptr_eq(&self.set_query, set_query)
            && self.prefix == *prefix
            && same_init
    }
}

impl HelpersCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(
        &self,
        config: &Rc<QueryConfig>,
        set_query: &SetQuery,
        prefix: &KeyPrefix,
        init: Option<&Rc<InitValues>>,
    ) -> Rc<Helpers> {
        if let Some(entry) = self.entry.borrow().as_ref() {
            if entry.matches(config, set_query, prefix, init) {
                return entry.helpers.clone();
            }
        }

        debug!(keys = config.len(), prefix = ?prefix.as_str(), "Building query helpers");
        let helpers = Rc::new(build_helpers(config, set_query, prefix, init));
        *self.entry.borrow_mut() = Some(CacheEntry {
            config: config.clone(),
            set_query: set_query.clone(),
            prefix: prefix.clone(),
            init: init.cloned(),
            helpers: helpers.clone(),
        });
        helpers
    }
}
