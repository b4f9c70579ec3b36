// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! What a filter's setup and initializer see while they run.

use core::time::Duration;
use std::rc::Rc;

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use understory_dom::{Document, Event, NodeId};

use crate::api::Api;
use crate::applied::Cleanup;
use crate::coerce::ValueType;
use crate::defer::{TaskId, Trampoline};
use crate::engine::Behavior;
use crate::error::{Error, Result};
use crate::filter::Output;

/// Context handed to a filter's setup function.
///
/// Bundles the element, a configuration reader already seeded with the
/// filter's defaults, the document, and the engine. Cleanup hooks and timers
/// registered here belong to this application of the filter and are torn down
/// by [`Behavior::cleanup`].
pub struct FilterCx<'a> {
    doc: &'a mut Document,
    behavior: &'a Behavior,
    element: NodeId,
    name: &'a str,
    api: Api,
    plugin_target: Option<Output>,
    cleanups: Vec<Cleanup>,
    tasks: Vec<TaskId>,
}

impl core::fmt::Debug for FilterCx<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("FilterCx")
            .field("element", &self.element)
            .field("name", &self.name)
            .field("api", &self.api)
            .field("cleanups", &self.cleanups.len())
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl<'a> FilterCx<'a> {
    pub(crate) fn new(
        doc: &'a mut Document,
        behavior: &'a Behavior,
        name: &'a str,
        api: Api,
        plugin_target: Option<Output>,
    ) -> Self {
        Self {
            element: api.element(),
            doc,
            behavior,
            name,
            api,
            plugin_target,
            cleanups: Vec::new(),
            tasks: Vec::new(),
        }
    }

    /// The element the filter is applied to.
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The filter's name.
    pub fn name(&self) -> &str {
        self.name
    }

    /// The document.
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    /// The document, mutably.
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    /// The document and the configuration reader at once.
    pub fn split(&mut self) -> (&mut Document, &mut Api) {
        (&mut *self.doc, &mut self.api)
    }

    /// The engine running this filter.
    pub fn behavior(&self) -> &'a Behavior {
        self.behavior
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

    /// See [`Api::get_all_as`].
    pub fn get_all_as(&mut self, specs: &[(&str, ValueType)]) -> Result<Map<String, Value>> {
        self.api.get_all_as(self.doc, specs)
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

    /// See [`Api::set_default`].
    pub fn set_default(&mut self, key: &str, value: Value) -> Result<()> {
        self.api.set_default(self.doc, key, value)
    }

    /// See [`Api::refresh`].
    pub fn refresh(&mut self) -> Result<()> {
        self.api.refresh(self.doc)
    }

    /// The result of the filter this plugin is chained to.
    pub fn plugin_target(&self) -> Option<&Output> {
        self.plugin_target.as_ref()
    }

    /// The parent's result downcast to `T`.
    pub fn plugin_target_as<T: 'static>(&self) -> Option<Rc<T>> {
        self.plugin_target.clone()?.downcast::<T>().ok()
    }

    /// Register a hook undoing this filter's side effects.
    ///
    /// Hooks run in registration order when the filter is cleaned up, and
    /// immediately if setup fails after registering them.
    pub fn on_cleanup(&mut self, cleanup: impl FnOnce(&mut Document) + 'static) {
        self.cleanups.push(Box::new(cleanup));
    }

    /// Run `callback` after `delay` on the engine clock.
    ///
    /// The timer is cancelled if the filter is cleaned up before it fires.
    pub fn set_timeout(
        &mut self,
        delay: Duration,
        callback: impl FnOnce(&Behavior, &mut Document) -> Result<()> + 'static,
    ) -> TaskId {
        let task = self.behavior.set_timeout(delay, callback);
        self.tasks.push(task);
        task
    }

    /// Call `callback` for every event of one of `types` reaching `element`.
    ///
    /// The listener is removed when the filter is cleaned up.
    pub fn add_listener(
        &mut self,
        element: NodeId,
        types: &[&str],
        callback: impl Fn(&Behavior, &mut Document, &Event) -> Result<()> + 'static,
    ) -> TaskId {
        let task = self.behavior.add_listener(element, types, callback);
        self.tasks.push(task);
        task
    }

    /// Cancel a timer. Returns true if it had not fired yet.
    pub fn clear_timeout(&mut self, task: TaskId) -> bool {
        self.tasks.retain(|t| *t != task);
        self.behavior.clear_timeout(task)
    }

    /// Build an error aborting this filter.
    pub fn fail(&self, message: impl Into<String>) -> Error {
        Error::handler(message)
    }

    /// Emit a warning naming this element.
    pub fn warn(&self, message: impl Into<String>) {
        self.behavior.warn(Some(self.element), message.into());
    }

    /// Report an error without aborting the filter.
    pub fn error(&self, error: Error) {
        self.behavior
            .emit_error(Some(self.name), Some(self.element), &error);
    }

    /// Call a method passed to the engine with [`Behavior::pass_method`].
    pub fn call(&mut self, method: &str, args: &[Value]) -> Result<Value> {
        self.behavior.call_method(self.doc, method, args)
    }

    /// The element new content is expected under.
    pub fn content_element(&self) -> Option<NodeId> {
        self.behavior
            .options()
            .container
            .or_else(|| self.doc.root_of(self.element))
    }

    /// Apply filters to `root` and its descendants.
    pub fn apply(&mut self, root: NodeId, force: bool) -> Result<()> {
        self.behavior.apply(self.doc, root, force)
    }

    pub(crate) fn into_parts(self) -> (Vec<Cleanup>, Vec<TaskId>) {
        (self.cleanups, self.tasks)
    }
}

/// Context handed to a filter's custom initializer.
///
/// The initializer decides when setup runs: immediately through
/// [`InitCx::run_setup`], or later by keeping the [`Trampoline`] and passing
/// it to [`Behavior::run_setup`].
pub struct InitCx<'a> {
    doc: &'a mut Document,
    behavior: &'a Behavior,
    api: Api,
    trampoline: Trampoline,
}

impl core::fmt::Debug for InitCx<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("InitCx")
            .field("api", &self.api)
            .field("trampoline", &self.trampoline)
            .finish_non_exhaustive()
    }
}

impl<'a> InitCx<'a> {
    pub(crate) fn new(doc: &'a mut Document, behavior: &'a Behavior, api: Api, trampoline: Trampoline) -> Self {
        Self {
            doc,
            behavior,
            api,
            trampoline,
        }
    }

    /// The element the filter is applied to.
    pub fn element(&self) -> NodeId {
        self.api.element()
    }

    /// The document.
    pub fn doc(&self) -> &Document {
        &*self.doc
    }

    /// The document, mutably.
    pub fn doc_mut(&mut self) -> &mut Document {
        &mut *self.doc
    }

    /// The engine running this filter.
    pub fn behavior(&self) -> &'a Behavior {
        self.behavior
    }

    /// See [`Api::get`].
    pub fn get(&mut self, key: &str) -> Result<Option<Value>> {
        self.api.get(self.doc, key)
    }

    /// See [`Api::get_as`].
    pub fn get_as(&mut self, ty: ValueType, key: &str) -> Result<Option<Value>> {
        self.api.get_as(self.doc, ty, key)
    }

    /// The handle that runs setup later.
    pub fn trampoline(&self) -> Trampoline {
        self.trampoline
    }

    /// Run setup now.
    pub fn run_setup(&mut self) -> Result<()> {
        self.behavior.run_setup(self.doc, self.trampoline)
    }
}
