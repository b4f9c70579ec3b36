// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Filters, their declarative configuration, and the filter store.

use core::any::Any;
use core::fmt;
use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use hashbrown::HashMap;
use serde_json::{Map, Value};

use crate::coerce::ValueType;
use crate::context::{FilterCx, InitCx};
use crate::error::{Error, Result};
use crate::names::split_names;
use crate::registry::Registry;

/// Whatever a filter's setup produced, typically a widget instance.
pub type Output = Rc<dyn Any>;

/// A filter's setup function.
pub type SetupFn = dyn Fn(&mut FilterCx<'_>) -> Result<Option<Output>>;

/// A custom initializer deciding when a deferred filter runs its setup.
pub type InitFn = dyn Fn(&mut InitCx<'_>) -> Result<()>;

/// Declared type of a filter's result.
#[derive(Clone, Copy)]
pub struct ResultType {
    name: &'static str,
    check: fn(&dyn Any) -> bool,
}

impl fmt::Debug for ResultType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResultType").field(&self.name).finish()
    }
}

impl ResultType {
    /// Results must be a `T`.
    pub fn of<T: Any>() -> Self {
        Self {
            name: core::any::type_name::<T>(),
            check: |value| value.is::<T>(),
        }
    }

    /// The type name.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns true if `output` is of this type.
    pub fn accepts(&self, output: &Output) -> bool {
        (self.check)(&**output)
    }
}

/// When a deferred filter runs its setup.
#[derive(Clone)]
pub enum Deferral {
    /// After a delay on the engine clock.
    Delay(Duration),
    /// When one of the named events reaches the element.
    Until(Vec<String>),
    /// Whenever the initializer calls [`InitCx::run_setup`] or hands its
    /// [`Trampoline`](crate::Trampoline) to code that later calls
    /// [`Behavior::run_setup`](crate::Behavior::run_setup).
    Initializer(Rc<InitFn>),
}

impl fmt::Debug for Deferral {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Delay(delay) => f.debug_tuple("Delay").field(delay).finish(),
            Self::Until(types) => f.debug_tuple("Until").field(types).finish(),
            Self::Initializer(_) => f.write_str("Initializer(..)"),
        }
    }
}

/// Declarative part of a filter.
#[derive(Clone, Debug, Default)]
pub struct FilterConfig {
    /// Defaults injected into the reader before setup.
    pub defaults: Map<String, Value>,
    /// Keys that must have a value.
    pub require: Vec<String>,
    /// Keys that must have a value of a given type.
    pub require_as: Vec<(String, ValueType)>,
    /// Declared result type.
    pub returns: Option<ResultType>,
    /// Deferred activation.
    pub deferral: Option<Deferral>,
    /// Option keys seeded from legacy `data-<attribute>` attributes.
    pub deprecated: Vec<(String, String)>,
    /// Legacy `data-<attribute>` holding a whole options object.
    pub deprecated_json: Option<String>,
}

/// A named behavior attached to elements declaring it.
///
/// ```rust
/// use std::time::Duration;
/// use serde_json::json;
/// use understory_behavior::{Filter, ValueType};
///
/// let filter = Filter::new("Resizable", |cx| {
///     let handle = cx.require_as(ValueType::String, "handle")?;
///     let element = cx.element();
///     cx.doc_mut().set_property(element, "handle", handle);
///     Ok(None)
/// })
/// .with_default("handle", json!(".grip"))
/// .with_delay(Duration::from_millis(50));
/// assert_eq!(filter.name(), "Resizable");
/// ```
#[derive(Clone)]
pub struct Filter {
    name: String,
    pub(crate) setup: Rc<SetupFn>,
    pub(crate) config: FilterConfig,
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Filter {
    /// A filter running `setup` on every element declaring `name`.
    pub fn new(name: &str, setup: impl Fn(&mut FilterCx<'_>) -> Result<Option<Output>> + 'static) -> Self {
        Self {
            name: name.to_string(),
            setup: Rc::new(setup),
            config: FilterConfig::default(),
        }
    }

    /// The filter's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The declarative configuration.
    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    /// Replace the declarative configuration.
    pub fn with_config(mut self, config: FilterConfig) -> Self {
        self.config = config;
        self
    }

    /// Add one default.
    pub fn with_default(mut self, key: &str, value: Value) -> Self {
        self.config.defaults.insert(key.to_string(), value);
        self
    }

    /// Merge several defaults.
    pub fn with_defaults(mut self, defaults: Map<String, Value>) -> Self {
        self.config.defaults.extend(defaults);
        self
    }

    /// Require keys to have a value.
    pub fn with_require(mut self, keys: &[&str]) -> Self {
        self.config.require.extend(keys.iter().map(|k| k.to_string()));
        self
    }

    /// Require a key to have a value of type `ty`.
    pub fn with_require_as(mut self, key: &str, ty: ValueType) -> Self {
        self.config.require_as.push((key.to_string(), ty));
        self
    }

    /// Declare the result type.
    pub fn with_returns(mut self, ty: ResultType) -> Self {
        self.config.returns = Some(ty);
        self
    }

    /// Defer setup by `delay` on the engine clock.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.config.deferral = Some(Deferral::Delay(delay));
        self
    }

    /// Defer setup until one of `events` (space or comma separated) reaches the element.
    pub fn with_delay_until(mut self, events: &str) -> Self {
        self.config.deferral = Some(Deferral::Until(split_names(events)));
        self
    }

    /// Defer setup to a custom initializer.
    pub fn with_initializer(mut self, init: impl Fn(&mut InitCx<'_>) -> Result<()> + 'static) -> Self {
        self.config.deferral = Some(Deferral::Initializer(Rc::new(init)));
        self
    }

    /// Seed `key` from the legacy `data-<attribute>` attribute.
    pub fn with_deprecated(mut self, key: &str, attribute: &str) -> Self {
        self.config
            .deprecated
            .push((key.to_string(), attribute.to_string()));
        self
    }

    /// Seed all options from a legacy `data-<attribute>` JSON object.
    pub fn with_deprecated_json(mut self, attribute: &str) -> Self {
        self.config.deprecated_json = Some(attribute.to_string());
        self
    }
}

/// Filters and their plugins for one scope.
///
/// Plugins are filters chained after a parent filter (or another plugin);
/// they run in registration order and receive the parent's result.
#[derive(Debug)]
pub struct FilterStore {
    filters: Registry<Filter>,
    plugins: HashMap<String, Vec<Rc<Filter>>>,
}

/// A filter store shared between engines.
pub type SharedFilters = Rc<RefCell<FilterStore>>;

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            filters: Registry::new("filter"),
            plugins: HashMap::new(),
        }
    }

    /// An empty store ready to share as a global scope.
    pub fn shared() -> SharedFilters {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Register a filter.
    pub fn register(&mut self, filter: Filter, overwrite: bool) -> Result<()> {
        let name = filter.name.clone();
        self.filters.register(&name, filter, overwrite)
    }

    /// Register filters in order; stops at the first failure, keeping earlier ones.
    pub fn register_many(&mut self, filters: impl IntoIterator<Item = Filter>, overwrite: bool) -> Result<()> {
        self.filters
            .register_many(filters.into_iter().map(|f| (f.name.clone(), f)), overwrite)
    }

    /// The underlying name registry.
    pub fn registry(&self) -> &Registry<Filter> {
        &self.filters
    }

    /// Look up a filter.
    pub fn get(&self, name: &str) -> Option<Rc<Filter>> {
        self.filters.get(name)
    }

    /// Remove a filter.
    pub fn remove(&mut self, name: &str) -> Option<Rc<Filter>> {
        self.filters.remove(name)
    }

    /// Register `plugin` to run after `parent`.
    ///
    /// Overwriting keeps the plugin's original position in the chain.
    pub fn register_plugin(&mut self, parent: &str, plugin: Filter, overwrite: bool) -> Result<()> {
        let chain = self.plugins.entry(parent.to_string()).or_default();
        match chain.iter().position(|p| p.name == plugin.name) {
            Some(_) if !overwrite => Err(Error::DuplicateRegistration {
                kind: "plugin",
                name: plugin.name,
            }),
            Some(pos) => {
                chain[pos] = Rc::new(plugin);
                Ok(())
            }
            None => {
                chain.push(Rc::new(plugin));
                Ok(())
            }
        }
    }

    /// Plugins chained after `parent`, in registration order.
    pub fn plugins(&self, parent: &str) -> &[Rc<Filter>] {
        self.plugins.get(parent).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Merge `defaults` into a registered filter's defaults.
    pub fn set_defaults(&mut self, name: &str, defaults: &Map<String, Value>) -> Result<()> {
        let filter = self.filters.get(name).ok_or_else(|| Error::NotFound {
            kind: "filter",
            name: name.to_string(),
        })?;
        let updated = (*filter).clone().with_defaults(defaults.clone());
        self.register(updated, true)
    }

    /// Forget every filter and plugin.
    pub fn reset(&mut self) {
        self.filters.clear();
        self.plugins.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop(name: &str) -> Filter {
        Filter::new(name, |_| Ok(None))
    }

    #[test]
    fn result_type_checks_downcast() {
        let ty = ResultType::of::<String>();
        let good: Output = Rc::new(String::from("widget"));
        let bad: Output = Rc::new(7_u32);
        assert!(ty.accepts(&good));
        assert!(!ty.accepts(&bad));
        assert!(ty.name().contains("String"));
    }

    #[test]
    fn plugins_keep_registration_order() {
        let mut store = FilterStore::new();
        store.register(noop("F"), false).unwrap();
        store.register_plugin("F", noop("P1"), false).unwrap();
        store.register_plugin("F", noop("P2"), false).unwrap();
        assert!(matches!(
            store.register_plugin("F", noop("P1"), false),
            Err(Error::DuplicateRegistration { kind: "plugin", .. })
        ));
        store.register_plugin("F", noop("P1"), true).unwrap();
        let names: Vec<&str> = store.plugins("F").iter().map(|p| p.name()).collect();
        assert_eq!(names, ["P1", "P2"]);
        assert!(store.plugins("G").is_empty());
    }

    #[test]
    fn set_defaults_merges() {
        let mut store = FilterStore::new();
        store
            .register(noop("F").with_default("a", json!(1)).with_default("b", json!(2)), false)
            .unwrap();
        let mut extra = Map::new();
        extra.insert("b".into(), json!(3));
        store.set_defaults("F", &extra).unwrap();
        let filter = store.get("F").unwrap();
        let defaults = &filter.config().defaults;
        assert_eq!(defaults.get("a"), Some(&json!(1)));
        assert_eq!(defaults.get("b"), Some(&json!(3)));
        assert!(matches!(
            store.set_defaults("missing", &extra),
            Err(Error::NotFound { .. })
        ));
    }

    #[test]
    fn reset_clears_everything() {
        let mut store = FilterStore::new();
        store.register(noop("F"), false).unwrap();
        store.register_plugin("F", noop("P"), false).unwrap();
        store.reset();
        assert!(store.get("F").is_none());
        assert!(store.plugins("F").is_empty());
    }
}
