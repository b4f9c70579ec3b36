// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Triggers and the trigger store.

use core::fmt;
use std::cell::RefCell;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use understory_behavior::{Api, Behavior, Error, Registry, Result, ValueType};
use understory_dom::{Document, Event, NodeId};

use crate::conditional::{Conditional, Gate};
use crate::delegator::Delegator;

/// A trigger's handler. Returns `None` when it has no result to report.
pub type TriggerFn = dyn Fn(&mut TriggerCx<'_>) -> Result<Option<Value>>;

/// A named handler run when a matching event reaches an element declaring it.
///
/// ```rust
/// use serde_json::json;
/// use understory_delegator::{Conditional, Trigger};
///
/// let toggle = Trigger::new("toggle", &["click"], |cx| {
///     let class = cx.get("class")?.unwrap_or(json!("open"));
///     let el = cx.element();
///     if let Some(class) = class.as_str() {
///         cx.doc_mut().add_class(el, class);
///     }
///     Ok(None)
/// })
/// .with_unless(Conditional::method("hasClass", vec![json!("disabled")]));
/// assert_eq!(toggle.types(), ["click"]);
/// ```
#[derive(Clone)]
pub struct Trigger {
    name: String,
    types: Vec<String>,
    pub(crate) handler: Rc<TriggerFn>,
    pub(crate) defaults: Map<String, Value>,
    pub(crate) require: Vec<String>,
    pub(crate) require_as: Vec<(String, ValueType)>,
    pub(crate) gate: Gate,
}

impl fmt::Debug for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Trigger")
            .field("name", &self.name)
            .field("types", &self.types)
            .field("defaults", &self.defaults)
            .field("require", &self.require)
            .field("require_as", &self.require_as)
            .field("gate", &self.gate)
            .finish_non_exhaustive()
    }
}

impl Trigger {
    /// A trigger named `name` listening for `types`.
    pub fn new(
        name: &str,
        types: &[&str],
        handler: impl Fn(&mut TriggerCx<'_>) -> Result<Option<Value>> + 'static,
    ) -> Self {
        let mut trigger = Self {
            name: name.to_string(),
            types: Vec::new(),
            handler: Rc::new(handler),
            defaults: Map::new(),
            require: Vec::new(),
            require_as: Vec::new(),
            gate: Gate::default(),
        };
        trigger.add_types(types.iter().copied());
        trigger
    }

    /// The trigger's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Event types the trigger responds to.
    pub fn types(&self) -> &[String] {
        &self.types
    }

    /// Add a default.
    pub fn with_default(mut self, key: &str, value: Value) -> Self {
        self.defaults.insert(key.to_string(), value);
        self
    }

    /// Require keys to have a value.
    pub fn with_require(mut self, keys: &[&str]) -> Self {
        self.require.extend(keys.iter().map(|k| k.to_string()));
        self
    }

    /// Require a key to have a value of type `ty`.
    pub fn with_require_as(mut self, key: &str, ty: ValueType) -> Self {
        self.require_as.push((key.to_string(), ty));
        self
    }

    /// Only run when `conditional` passes, in addition to any element-declared `if`.
    pub fn with_if(mut self, conditional: Conditional) -> Self {
        self.gate.when.push(conditional);
        self
    }

    /// Skip when `conditional` passes, in addition to any element-declared `unless`.
    pub fn with_unless(mut self, conditional: Conditional) -> Self {
        self.gate.unless.push(conditional);
        self
    }

    pub(crate) fn add_types<'a>(&mut self, types: impl IntoIterator<Item = &'a str>) {
        for ty in types {
            if !self.types.iter().any(|t| t == ty) {
                self.types.push(ty.to_string());
            }
        }
    }
}

/// Triggers for one scope.
#[derive(Debug)]
pub struct TriggerStore {
    triggers: Registry<Trigger>,
}

/// A trigger store shared between dispatchers.
pub type SharedTriggers = Rc<RefCell<TriggerStore>>;

impl Default for TriggerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TriggerStore {
    /// An empty store.
    pub fn new() -> Self {
        Self {
            triggers: Registry::new("trigger"),
        }
    }

    /// An empty store ready to share as a global scope.
    pub fn shared() -> SharedTriggers {
        Rc::new(RefCell::new(Self::new()))
    }

    /// Register a trigger.
    pub fn register(&mut self, trigger: Trigger, overwrite: bool) -> Result<()> {
        let name = trigger.name.clone();
        self.triggers.register(&name, trigger, overwrite)
    }

    /// Register triggers in order; stops at the first failure, keeping earlier ones.
    pub fn register_many(&mut self, triggers: impl IntoIterator<Item = Trigger>, overwrite: bool) -> Result<()> {
        self.triggers
            .register_many(triggers.into_iter().map(|t| (t.name.clone(), t)), overwrite)
    }

    /// The underlying name registry.
    pub fn registry(&self) -> &Registry<Trigger> {
        &self.triggers
    }

    /// Look up a trigger.
    pub fn get(&self, name: &str) -> Option<Rc<Trigger>> {
        self.triggers.get(name)
    }

    /// Returns true if `name` is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.triggers.contains(name)
    }

    /// Remove a trigger.
    pub fn remove(&mut self, name: &str) -> Option<Rc<Trigger>> {
        self.triggers.remove(name)
    }

    /// Extend a registered trigger's event types.
    pub fn add_event_types(&mut self, name: &str, types: &[&str]) -> Result<()> {
        let trigger = self.triggers.get(name).ok_or_else(|| Error::NotFound {
            kind: "trigger",
            name: name.to_string(),
        })?;
        let mut updated = (*trigger).clone();
        updated.add_types(types.iter().copied());
        self.register(updated, true)
    }

    /// Every event type any registered trigger listens for, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types: Vec<String> = self
            .triggers
            .iter()
            .flat_map(|(_, t)| t.types.iter().cloned())
            .collect();
        types.sort_unstable();
        types.dedup();
        types
    }

    /// Number of registered triggers.
    pub fn len(&self) -> usize {
        self.triggers.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.triggers.is_empty()
    }

    /// Forget every trigger.
    pub fn reset(&mut self) {
        self.triggers.clear();
    }
}

/// Context handed to a trigger's handler.
pub struct TriggerCx<'a> {
    doc: &'a mut Document,
    delegator: &'a Delegator,
    name: &'a str,
    event: &'a mut Event,
    api: Api,
}

impl fmt::Debug for TriggerCx<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerCx")
            .field("name", &self.name)
            .field("event", &self.event)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl<'a> TriggerCx<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        delegator: &'a Delegator,
        name: &'a str,
        event: &'a mut Event,
        api: Api,
    ) -> Self {
        Self {
            doc,
            delegator,
            name,
            event,
            api,
        }
    }

    /// The element the trigger fired on.
    pub fn element(&self) -> NodeId {
        self.api.element()
    }

    /// The trigger's name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The event; a mock `click` when the trigger was invoked without one.
    pub fn event(&self) -> &Event {
        self.event
    }

    /// The event, mutably.
    pub fn event_mut(&mut self) -> &mut Event {
        &mut *self.event
    }

    /// The document.
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    /// The document, mutably.
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    /// The dispatcher running this trigger.
    pub fn delegator(&self) -> &'a Delegator {
        self.delegator
    }

    /// The engine bound with [`Delegator::bind_to_behavior`].
    pub fn behavior(&self) -> Option<Rc<Behavior>> {
        self.delegator.behavior()
    }

    /// See [`Api::get`].
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        self.api.get(self.doc, key)
    }

    /// See [`Api::get_many`].
    pub fn get_many(&mut self, keys: &[&str]) -> Result<Map<String, Value>> {
        self.api.get_many(self.doc, keys)
    }

    /// See [`Api::get_as`].
    pub fn get_as(&mut self, ty: ValueType, key: &str) -> Result<Option<Value>> {
        self.api.get_as(self.doc, ty, key)
    }

    /// See [`Api::get_as_or`].
    pub fn get_as_or(&mut self, ty: ValueType, key: &str, fallback: Value) -> Result<Value> {
        self.api.get_as_or(self.doc, ty, key, fallback)
    }

    /// See [`Api::deserialize`].
    pub fn deserialize<T: DeserializeOwned>(&mut self, key: &str) -> Result<Option<T>> {
        self.api.deserialize(self.doc, key)
    }

    /// See [`Api::require`].
    pub fn require(&mut self, keys: &[&str]) -> Result<()> {
        self.api.require(self.doc, keys)
    }

    /// See [`Api::require_as`].
    pub fn require_as(&mut self, ty: ValueType, key: &str) -> Result<Value> {
        self.api.require_as(self.doc, ty, key)
    }

    /// See [`Api::refresh`].
    pub fn refresh(&mut self) -> Result<()> {
        self.api.refresh(self.doc)
    }

    /// Elements `selector` names relative to the trigger's element (`self` included).
    pub fn targets(&self, selector: &str) -> Result<Vec<NodeId>> {
        Ok(self.doc.targets(self.element(), selector)?)
    }

    /// Run another trigger on `element` without an event.
    pub fn trigger(&mut self, name: &str, element: NodeId) -> Result<Option<Value>> {
        self.delegator.trigger(self.doc, name, element, None, false, None)
    }

    /// Build an error aborting this trigger.
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::handler(message)
    }

    /// Emit a warning naming this element.
    pub fn warn(&self, message: impl Into<String>) {
        self.delegator.warn(Some(self.element()), message.into());
    }

    /// Report an error without aborting the trigger.
    pub fn error(&self, error: Error) {
        self.delegator
            .emit_error(Some(self.name), Some(self.element()), &error);
    }

    /// Call a method passed to the bound engine with [`Behavior::pass_method`].
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        match self.delegator.behavior() {
            Some(behavior) => behavior.call_method(self.doc, method, args),
            None => Err(Error::NotFound {
                kind: "method",
                name: method.to_string(),
            }),
        }
    }

    /// Apply filters to new content under `container` through the bound engine.
    pub fn amend_dom(&mut self, container: NodeId) -> Result<()> {
        self.delegator.amend_dom(self.doc, container)
    }

    /// Clean up and remove `element` through the bound engine.
    pub fn destroy_dom(&mut self, element: NodeId) {
        self.delegator.destroy_dom(self.doc, element);
    }
}
