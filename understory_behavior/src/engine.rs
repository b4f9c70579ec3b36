// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The filter application engine.

use core::time::Duration;
use std::cell::RefCell;
use std::rc::Rc;

use serde_json::{Map, Value};
use tracing::{debug, warn};
use understory_dom::{Document, Event, EventAliases, NodeId, propagation_path};

use crate::api::Api;
use crate::applied::{AppliedState, AppliedTable, Cleanup, Phase};
use crate::context::{FilterCx, InitCx};
use crate::defer::{Job, ListenerFn, Scheduler, TaskId, Trampoline};
use crate::error::{Error, Result};
use crate::filter::{Deferral, Filter, FilterStore, Output, SharedFilters};
use crate::json::parse_options;
use crate::names;
use crate::notice::{Notice, Notifier, SubscriptionId};
use crate::options::BehaviorOptions;
use crate::registry::{Registry, resolve};

/// A host callback exposed to filters through [`FilterCx::call`].
pub type MethodFn = dyn Fn(&Behavior, &mut Document, &[Value]) -> Result<Value>;

/// Applies filters to the elements that declare them and tracks what was applied.
///
/// An engine resolves names in its own filter store first and in the shared
/// global store second. It records an applied state per (element, filter) so
/// repeated scans are no-ops unless forced, and so [`Behavior::cleanup`] can
/// undo everything a filter did.
///
/// All methods take `&self`: filters run with a reference to the engine and may
/// re-enter it (apply nested content, clean up, schedule timers).
///
/// ```rust
/// use serde_json::json;
/// use understory_behavior::{Behavior, BehaviorOptions, Filter, FilterStore};
/// use understory_dom::{Document, Element};
///
/// let global = FilterStore::shared();
/// global
///     .borrow_mut()
///     .register(
///         Filter::new("Highlight", |cx| {
///             let el = cx.element();
///             cx.doc_mut().add_class(el, "highlighted");
///             cx.on_cleanup(move |doc| doc.remove_class(el, "highlighted"));
///             Ok(None)
///         }),
///         false,
///     )
///     .unwrap();
///
/// let mut doc = Document::new();
/// let root = doc.insert(None, Element::new("div"));
/// let item = doc.insert(Some(root), Element::new("p").attr("data-behavior", "Highlight"));
///
/// let behavior = Behavior::new(global, BehaviorOptions::default());
/// behavior.apply(&mut doc, root, false).unwrap();
/// assert!(doc.has_class(item, "highlighted"));
///
/// behavior.cleanup(&mut doc, root, true);
/// assert!(!doc.has_class(item, "highlighted"));
/// ```
pub struct Behavior {
    options: BehaviorOptions,
    global: SharedFilters,
    local: RefCell<FilterStore>,
    applied: RefCell<AppliedTable>,
    scheduler: RefCell<Scheduler>,
    aliases: EventAliases,
    methods: RefCell<Registry<Box<MethodFn>>>,
    notices: Notifier<Notice>,
}

impl core::fmt::Debug for Behavior {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Behavior")
            .field("options", &self.options)
            .field("local", &self.local)
            .field("applied", &self.applied)
            .field("scheduler", &self.scheduler)
            .field("methods", &self.methods)
            .finish_non_exhaustive()
    }
}

/// A plugin waiting to run after its parent filter.
#[derive(Debug)]
pub struct PluginCall {
    element: NodeId,
    filter: Rc<Filter>,
    force: bool,
    target: Option<Output>,
}

impl PluginCall {
    /// The element the plugin will be applied to.
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The plugin.
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// Apply the plugin, handing it the parent's result.
    pub fn run(self, behavior: &Behavior, doc: &mut Document) -> Result<()> {
        behavior
            .apply_with(doc, self.element, &self.filter, self.force, self.target, false)
            .map(drop)
    }
}

struct Activation {
    result: Option<Output>,
    cleanups: Vec<Cleanup>,
    tasks: Vec<TaskId>,
}

impl Behavior {
    /// An engine resolving names in its own store, then in `global`.
    pub fn new(global: SharedFilters, options: BehaviorOptions) -> Self {
        Self {
            options,
            global,
            local: RefCell::new(FilterStore::new()),
            applied: RefCell::new(AppliedTable::default()),
            scheduler: RefCell::new(Scheduler::default()),
            aliases: EventAliases::default(),
            methods: RefCell::new(Registry::new("method")),
            notices: Notifier::new(),
        }
    }

    /// Use `aliases` when matching events against listeners.
    pub fn with_aliases(mut self, aliases: EventAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// The engine's options.
    pub fn options(&self) -> &BehaviorOptions {
        &self.options
    }

    /// The shared global filter store.
    pub fn global(&self) -> &SharedFilters {
        &self.global
    }

    /// Current time on the engine clock.
    pub fn now(&self) -> Duration {
        self.scheduler.borrow().now()
    }

    // --- Filter registration ---

    /// Register a filter on this engine only.
    pub fn add_filter(&self, filter: Filter, overwrite: bool) -> Result<()> {
        self.local.borrow_mut().register(filter, overwrite)
    }

    /// Register several filters on this engine; stops at the first failure.
    pub fn add_filters(&self, filters: impl IntoIterator<Item = Filter>, overwrite: bool) -> Result<()> {
        self.local.borrow_mut().register_many(filters, overwrite)
    }

    /// Register a plugin on this engine only.
    pub fn add_plugin(&self, parent: &str, plugin: Filter, overwrite: bool) -> Result<()> {
        self.local.borrow_mut().register_plugin(parent, plugin, overwrite)
    }

    /// Merge `defaults` into a filter for this engine.
    ///
    /// A filter found only in the global store is copied into this engine's
    /// store first, so the global registration stays untouched.
    pub fn set_filter_defaults(&self, name: &str, defaults: &Map<String, Value>) -> Result<()> {
        if self.local.borrow().get(name).is_some() {
            return self.local.borrow_mut().set_defaults(name, defaults);
        }
        let filter = self.global.borrow().get(name).ok_or_else(|| Error::NotFound {
            kind: "filter",
            name: name.to_string(),
        })?;
        let updated = (*filter).clone().with_defaults(defaults.clone());
        self.local.borrow_mut().register(updated, true)
    }

    /// Resolve a filter by name, this engine's store first.
    pub fn get_filter(&self, name: &str) -> Option<Rc<Filter>> {
        resolve(self.local.borrow().registry(), self.global.borrow().registry(), name)
    }

    /// Plugins chained after `name`; this engine's chain replaces the global one.
    pub fn get_plugins(&self, name: &str) -> Vec<Rc<Filter>> {
        let local = self.local.borrow().plugins(name).to_vec();
        if !local.is_empty() {
            return local;
        }
        self.global.borrow().plugins(name).to_vec()
    }

    // --- Application ---

    /// Apply declared filters to `root` and every descendant.
    ///
    /// Elements are visited in document order and each element's names in
    /// declaration order. Plugins of an element's filters run after all of that
    /// element's filters. Unknown names are reported and skipped.
    pub fn apply(&self, doc: &mut Document, root: NodeId, force: bool) -> Result<()> {
        let elements: Vec<NodeId> = doc
            .subtree(root)
            .into_iter()
            .filter(|&el| self.options.selects(doc, el))
            .collect();
        for element in elements {
            if !doc.is_alive(element) {
                continue;
            }
            let mut plugins = Vec::new();
            for name in self.filter_names(doc, element) {
                match self.get_filter(&name) {
                    Some(filter) => plugins.extend(self.apply_one(doc, element, &filter, force, true)?),
                    None => {
                        let error = Error::NotFound {
                            kind: "filter",
                            name: name.clone(),
                        };
                        self.emit_error(Some(&name), Some(element), &error);
                    }
                }
            }
            for call in plugins {
                call.run(self, doc)?;
            }
        }
        Ok(())
    }

    /// Apply declared filters under the configured container, or under every root.
    pub fn apply_all(&self, doc: &mut Document, force: bool) -> Result<()> {
        let roots = match self.options.container {
            Some(container) => vec![container],
            None => doc.roots(),
        };
        for root in roots {
            self.apply(doc, root, force)?;
        }
        Ok(())
    }

    /// Apply the filter registered as `name` to one element, plugins included.
    pub fn apply_filter(&self, doc: &mut Document, element: NodeId, name: &str, force: bool) -> Result<()> {
        let filter = self.get_filter(name).ok_or_else(|| Error::NotFound {
            kind: "filter",
            name: name.to_string(),
        })?;
        self.apply_one(doc, element, &filter, force, false).map(drop)
    }

    /// Apply one filter to one element.
    ///
    /// With `defer_plugins` the filter's plugins are returned instead of run,
    /// so the caller decides when they execute. Deferred filters run their
    /// plugins themselves once activated.
    pub fn apply_one(
        &self,
        doc: &mut Document,
        element: NodeId,
        filter: &Rc<Filter>,
        force: bool,
        defer_plugins: bool,
    ) -> Result<Vec<PluginCall>> {
        self.apply_with(doc, element, filter, force, None, defer_plugins)
    }

    fn apply_with(
        &self,
        doc: &mut Document,
        element: NodeId,
        filter: &Rc<Filter>,
        force: bool,
        plugin_target: Option<Output>,
        defer_plugins: bool,
    ) -> Result<Vec<PluginCall>> {
        if !doc.is_alive(element) {
            return Ok(Vec::new());
        }
        if self.applied.borrow().contains(element, filter.name()) {
            if !force {
                return Ok(Vec::new());
            }
            self.cleanup_filter(doc, element, filter.name());
        }
        match filter.config.deferral.clone() {
            None => self.activate(doc, element, filter, force, plugin_target, defer_plugins),
            Some(deferral) => {
                self.defer(doc, element, filter, force, plugin_target, deferral)?;
                Ok(Vec::new())
            }
        }
    }

    fn activate(
        &self,
        doc: &mut Document,
        element: NodeId,
        filter: &Rc<Filter>,
        force: bool,
        plugin_target: Option<Output>,
        defer_plugins: bool,
    ) -> Result<Vec<PluginCall>> {
        let Activation {
            result,
            cleanups,
            tasks,
        } = match self.invoke(doc, element, filter, plugin_target) {
            Ok(activation) => activation,
            Err(error) => {
                self.report(Some(filter.name()), Some(element), error)?;
                return Ok(Vec::new());
            }
        };
        self.applied.borrow_mut().insert(
            element,
            AppliedState {
                filter: filter.clone(),
                phase: Phase::Active(result.clone()),
                cleanups,
                tasks,
            },
        );
        self.log(Some(element), format!("applied filter {}", filter.name()));

        let calls: Vec<PluginCall> = self
            .get_plugins(filter.name())
            .into_iter()
            .map(|plugin| PluginCall {
                element,
                filter: plugin,
                force,
                target: result.clone(),
            })
            .collect();
        if defer_plugins {
            return Ok(calls);
        }
        for call in calls {
            call.run(self, doc)?;
        }
        Ok(Vec::new())
    }

    fn defer(
        &self,
        doc: &mut Document,
        element: NodeId,
        filter: &Rc<Filter>,
        force: bool,
        plugin_target: Option<Output>,
        deferral: Deferral,
    ) -> Result<()> {
        let job = Job::Activate {
            element,
            filter: filter.clone(),
            force,
            plugin_target,
        };
        let task = match &deferral {
            Deferral::Delay(delay) => self.scheduler.borrow_mut().after(*delay, job),
            Deferral::Until(types) => self.scheduler.borrow_mut().until(element, types.clone(), job),
            Deferral::Initializer(_) => self.scheduler.borrow_mut().trampoline(job),
        };
        self.applied
            .borrow_mut()
            .insert(element, AppliedState::pending(filter.clone(), task));
        debug!(name = filter.name(), ?element, ?deferral, "deferred filter");

        let Deferral::Initializer(init) = deferral else {
            return Ok(());
        };
        let mut api = Api::new(element, filter.name());
        let outcome = api
            .set_defaults(doc, &filter.config.defaults)
            .and_then(|()| init(&mut InitCx::new(doc, self, api, Trampoline(task))));
        if let Err(error) = outcome {
            if self.applied.borrow().is_pending(element, filter.name(), task) {
                self.applied.borrow_mut().take(element, filter.name());
            }
            self.scheduler.borrow_mut().cancel(task);
            self.report(Some(filter.name()), Some(element), error)?;
        }
        Ok(())
    }

    fn invoke(
        &self,
        doc: &mut Document,
        element: NodeId,
        filter: &Rc<Filter>,
        plugin_target: Option<Output>,
    ) -> Result<Activation> {
        let mut api = Api::new(element, filter.name());
        self.prepare(doc, &mut api, filter)?;
        let mut cx = FilterCx::new(doc, self, filter.name(), api, plugin_target);
        let outcome = (filter.setup)(&mut cx);
        let (cleanups, tasks) = cx.into_parts();
        let checked = outcome.and_then(|result| match &filter.config.returns {
            Some(ty) if !result.as_ref().is_some_and(|r| ty.accepts(r)) => Err(Error::InvalidResult {
                name: filter.name().to_string(),
                expected: ty.name(),
            }),
            _ => Ok(result),
        });
        match checked {
            Ok(result) => Ok(Activation {
                result,
                cleanups,
                tasks,
            }),
            Err(error) => {
                self.teardown(doc, cleanups, &tasks);
                Err(error)
            }
        }
    }

    /// Seed deprecated values and defaults, then check requirements.
    fn prepare(&self, doc: &Document, api: &mut Api, filter: &Filter) -> Result<()> {
        let config = filter.config();
        let element = api.element();
        if self.options.enable_deprecation {
            if let Some(attribute) = &config.deprecated_json
                && let Some(raw) = doc.data(element, attribute)
            {
                let seeded = parse_options(&format!("data-{attribute}"), raw)?;
                api.set_defaults(doc, &seeded)?;
            }
            for (key, attribute) in &config.deprecated {
                if let Some(raw) = doc.data(element, attribute) {
                    api.set_default(doc, key, Value::String(raw.to_string()))?;
                }
            }
        }
        api.set_defaults(doc, &config.defaults)?;
        for (key, ty) in &config.require_as {
            api.require_as(doc, *ty, key)?;
        }
        let required: Vec<&str> = config.require.iter().map(String::as_str).collect();
        api.require(doc, &required)
    }

    // --- Deferred work ---

    /// Move the engine clock forward, running every timer that comes due.
    pub fn advance(&self, doc: &mut Document, by: Duration) -> Result<()> {
        let until = self.now() + by;
        loop {
            let next = self.scheduler.borrow_mut().pop_due(until);
            let Some((task, job)) = next else {
                break;
            };
            self.run_job(doc, task, job)?;
        }
        self.scheduler.borrow_mut().set_now(until);
        Ok(())
    }

    /// Feed a native event to filters waiting for it and to listeners on its path.
    ///
    /// Waits match the native type only; listeners also match aliases such as
    /// `mouseenter`. A failing listener is reported like a failing timer.
    pub fn dispatch_event(&self, doc: &mut Document, event: &Event) -> Result<()> {
        let path = propagation_path(doc, event);
        let ready = self.scheduler.borrow_mut().take_waiting(&path, &event.kind);
        for (task, job) in ready {
            self.run_job(doc, task, job)?;
        }
        let listeners = {
            let doc: &Document = doc;
            self.scheduler.borrow().listeners_on(&path, |element, declared| {
                self.aliases.matches_type(doc, element, declared, event)
            })
        };
        for (element, callback) in listeners {
            if let Err(error) = callback(self, doc, event) {
                self.report(None, Some(element), error)?;
            }
        }
        Ok(())
    }

    /// Call `callback` for every event of one of `types` reaching `element`.
    ///
    /// The listener stays until [`Behavior::remove_listener`]; listeners added
    /// through [`FilterCx::add_listener`] are removed when their filter is
    /// cleaned up.
    pub fn add_listener(
        &self,
        element: NodeId,
        types: &[&str],
        callback: impl Fn(&Self, &mut Document, &Event) -> Result<()> + 'static,
    ) -> TaskId {
        let types = types.iter().map(|t| (*t).to_string()).collect();
        let callback: Rc<ListenerFn> = Rc::new(callback);
        self.scheduler.borrow_mut().listen(element, types, callback)
    }

    /// Remove a listener. Returns true if it was still registered.
    pub fn remove_listener(&self, listener: TaskId) -> bool {
        self.scheduler.borrow_mut().cancel(listener)
    }

    /// Run the setup a custom initializer deferred.
    ///
    /// Does nothing if the trampoline already ran or its filter was cleaned up.
    pub fn run_setup(&self, doc: &mut Document, trampoline: Trampoline) -> Result<()> {
        let job = self.scheduler.borrow_mut().take_trampoline(trampoline.0);
        match job {
            Some(job) => self.run_job(doc, trampoline.0, job),
            None => Ok(()),
        }
    }

    /// Run `callback` after `delay` on the engine clock.
    pub fn set_timeout(
        &self,
        delay: Duration,
        callback: impl FnOnce(&Self, &mut Document) -> Result<()> + 'static,
    ) -> TaskId {
        self.scheduler
            .borrow_mut()
            .after(delay, Job::Callback(Box::new(callback)))
    }

    /// Cancel a timer. Returns true if it had not fired yet.
    pub fn clear_timeout(&self, task: TaskId) -> bool {
        self.scheduler.borrow_mut().cancel(task)
    }

    /// Number of timers, event waits, listeners and trampolines still outstanding.
    pub fn pending_tasks(&self) -> usize {
        self.scheduler.borrow().len()
    }

    fn run_job(&self, doc: &mut Document, task: TaskId, job: Job) -> Result<()> {
        match job {
            Job::Activate {
                element,
                filter,
                force,
                plugin_target,
            } => {
                if !self.applied.borrow().is_pending(element, filter.name(), task) {
                    return Ok(());
                }
                self.applied.borrow_mut().take(element, filter.name());
                if !doc.is_alive(element) {
                    return Ok(());
                }
                self.activate(doc, element, &filter, force, plugin_target, false)
                    .map(drop)
            }
            Job::Callback(callback) => match callback(self, doc) {
                Ok(()) => Ok(()),
                Err(error) => self.report(None, None, error),
            },
        }
    }

    // --- Applied state and lifecycle ---

    /// Undo every filter applied to `element` and, optionally, its descendants.
    ///
    /// Pending deferrals are cancelled, filter timers are cleared and cleanup
    /// hooks run in the order they were registered.
    pub fn cleanup(&self, doc: &mut Document, element: NodeId, include_descendants: bool) {
        let elements = if include_descendants {
            doc.subtree(element)
        } else {
            vec![element]
        };
        for el in elements {
            let states = self.applied.borrow_mut().take_all(el);
            for state in states {
                self.log(Some(el), format!("cleaned up filter {}", state.filter.name()));
                self.teardown(doc, state.cleanups, &state.tasks);
            }
        }
    }

    /// Undo one filter on one element. Returns true if it was applied.
    pub fn cleanup_filter(&self, doc: &mut Document, element: NodeId, name: &str) -> bool {
        let state = self.applied.borrow_mut().take(element, name);
        match state {
            Some(state) => {
                self.teardown(doc, state.cleanups, &state.tasks);
                true
            }
            None => false,
        }
    }

    fn teardown(&self, doc: &mut Document, cleanups: Vec<Cleanup>, tasks: &[TaskId]) {
        {
            let mut scheduler = self.scheduler.borrow_mut();
            for task in tasks {
                scheduler.cancel(*task);
            }
        }
        for cleanup in cleanups {
            cleanup(doc);
        }
    }

    /// Clean up `element` and its descendants, then remove them from the document.
    pub fn destroy(&self, doc: &mut Document, element: NodeId) {
        self.cleanup(doc, element, true);
        doc.remove(element);
        self.notices.emit(&Notice::DestroyDom(element));
    }

    /// Apply filters to content added under `element`.
    pub fn amend(&self, doc: &mut Document, element: NodeId) -> Result<()> {
        self.apply(doc, element, false)?;
        self.notices.emit(&Notice::AmendDom(element));
        Ok(())
    }

    /// Clean up state left on elements removed without [`Behavior::destroy`].
    ///
    /// Cleanup hooks still run; they receive the document and must tolerate
    /// their element being gone. Returns the number of elements pruned.
    pub fn prune(&self, doc: &mut Document) -> usize {
        let dead: Vec<NodeId> = self
            .applied
            .borrow()
            .elements()
            .into_iter()
            .filter(|el| !doc.is_alive(*el))
            .collect();
        for &el in &dead {
            let states = self.applied.borrow_mut().take_all(el);
            for state in states {
                self.teardown(doc, state.cleanups, &state.tasks);
            }
        }
        dead.len()
    }

    /// Returns true if `name` is applied or pending on `element`.
    pub fn is_applied(&self, element: NodeId, name: &str) -> bool {
        self.applied.borrow().contains(element, name)
    }

    /// Returns true if `name` is waiting on a deferral on `element`.
    pub fn is_pending(&self, element: NodeId, name: &str) -> bool {
        self.applied
            .borrow()
            .get(element, name)
            .is_some_and(|s| matches!(s.phase, Phase::Pending))
    }

    /// Names of the filters applied or pending on `element`, in application order.
    pub fn applied_names(&self, element: NodeId) -> Vec<String> {
        self.applied.borrow().names(element)
    }

    /// What `name`'s setup returned on `element`.
    pub fn result(&self, element: NodeId, name: &str) -> Option<Output> {
        self.applied.borrow().result(element, name)
    }

    /// [`Behavior::result`] downcast to `T`.
    pub fn result_as<T: 'static>(&self, element: NodeId, name: &str) -> Option<Rc<T>> {
        self.result(element, name)?.downcast::<T>().ok()
    }

    // --- Marker list ---

    /// Filter names declared on `element`.
    pub fn filter_names(&self, doc: &Document, element: NodeId) -> Vec<String> {
        names::names(doc, element, &self.options.marker)
    }

    /// Declare `name` on `element`.
    pub fn add_filter_name(&self, doc: &mut Document, element: NodeId, name: &str) {
        names::add_name(doc, element, &self.options.marker, name);
    }

    /// Remove `name` from `element`'s declarations.
    pub fn remove_filter_name(&self, doc: &mut Document, element: NodeId, name: &str) {
        names::remove_name(doc, element, &self.options.marker, name);
    }

    /// Returns true if `element` declares `name`.
    pub fn has_filter_name(&self, doc: &Document, element: NodeId, name: &str) -> bool {
        names::has_name(doc, element, &self.options.marker, name)
    }

    // --- Passed methods ---

    /// Expose `method` to filters as `name`.
    pub fn pass_method(
        &self,
        name: &str,
        method: impl Fn(&Self, &mut Document, &[Value]) -> Result<Value> + 'static,
    ) -> Result<()> {
        self.methods
            .borrow_mut()
            .register(name, Box::new(method), false)
    }

    /// Call a passed method.
    pub fn call_method(&self, doc: &mut Document, name: &str, args: &[Value]) -> Result<Value> {
        let method = self.methods.borrow().get(name).ok_or_else(|| Error::NotFound {
            kind: "method",
            name: name.to_string(),
        })?;
        method(self, doc, args)
    }

    // --- Notices ---

    /// Subscribe to notices.
    pub fn on_notice(&self, callback: impl Fn(&Notice) + 'static) -> SubscriptionId {
        self.notices.subscribe(callback)
    }

    /// Unsubscribe from notices.
    pub fn off_notice(&self, id: SubscriptionId) -> bool {
        self.notices.unsubscribe(id)
    }

    /// Emit a warning.
    pub fn warn(&self, element: Option<NodeId>, message: String) {
        warn!(?element, "{message}");
        self.notices.emit(&Notice::Warn { element, message });
    }

    /// Emit a progress message when verbose.
    pub fn log(&self, element: Option<NodeId>, message: String) {
        if !self.options.verbose {
            return;
        }
        debug!(?element, "{message}");
        self.notices.emit(&Notice::Log { element, message });
    }

    /// Emit an error notice without propagating.
    pub fn emit_error(&self, name: Option<&str>, element: Option<NodeId>, error: &Error) {
        warn!(name, ?element, "{error}");
        self.notices.emit(&Notice::Error {
            name: name.map(str::to_string),
            element,
            error: error.clone(),
        });
    }

    /// Propagate `error` in break-on-errors mode, report it otherwise.
    pub fn report(&self, name: Option<&str>, element: Option<NodeId>, error: Error) -> Result<()> {
        if self.options.break_on_errors {
            return Err(error);
        }
        self.emit_error(name, element, &error);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coerce::ValueType;
    use crate::filter::ResultType;
    use serde_json::json;
    use understory_dom::Element;

    fn engine(options: BehaviorOptions) -> Behavior {
        Behavior::new(FilterStore::shared(), options)
    }

    /// Counts setups in the element's `count` property.
    fn counter(name: &str) -> Filter {
        Filter::new(name, |cx| {
            let el = cx.element();
            let count = cx.doc().property(el, "count").and_then(Value::as_u64).unwrap_or(0);
            cx.doc_mut().set_property(el, "count", json!(count + 1));
            Ok(None)
        })
    }

    /// Appends `name` to the element's `log` text.
    fn marker(name: &'static str) -> Filter {
        Filter::new(name, move |cx| {
            let el = cx.element();
            let log = cx.doc().text(el).unwrap_or("").to_string();
            cx.doc_mut().set_text(el, &format!("{log}{name};"));
            Ok(None)
        })
    }

    fn capture(behavior: &Behavior) -> Rc<RefCell<Vec<Notice>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = seen.clone();
        behavior.on_notice(move |n| sink.borrow_mut().push(n.clone()));
        seen
    }

    fn count(doc: &Document, el: NodeId) -> Option<u64> {
        doc.property(el, "count").and_then(Value::as_u64)
    }

    #[test]
    fn apply_is_idempotent_unless_forced() {
        let behavior = engine(BehaviorOptions::default());
        behavior.add_filter(counter("Count"), false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Count"));
        behavior.apply(&mut doc, el, false).unwrap();
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(count(&doc, el), Some(1));
        behavior.apply(&mut doc, el, true).unwrap();
        assert_eq!(count(&doc, el), Some(2));
    }

    #[test]
    fn cleanup_restores_element() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(
                Filter::new("Mark", |cx| {
                    let el = cx.element();
                    cx.doc_mut().add_class(el, "marked");
                    cx.on_cleanup(move |doc| doc.remove_class(el, "marked"));
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let el = doc.insert(Some(root), Element::new("p").class("x").attr("data-behavior", "Mark"));
        let before = doc.classes(el);
        behavior.apply(&mut doc, root, false).unwrap();
        assert!(doc.has_class(el, "marked"));
        behavior.cleanup(&mut doc, root, true);
        assert_eq!(doc.classes(el), before);
        assert!(!behavior.is_applied(el, "Mark"));

        behavior.apply(&mut doc, root, false).unwrap();
        behavior.cleanup(&mut doc, root, false);
        assert!(doc.has_class(el, "marked"), "descendants excluded");
    }

    #[test]
    fn forced_reapply_runs_cleanup_first() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(
                Filter::new("Once", |cx| {
                    let el = cx.element();
                    assert!(!cx.doc().has_class(el, "on"), "previous application was cleaned up");
                    cx.doc_mut().add_class(el, "on");
                    cx.on_cleanup(move |doc| doc.remove_class(el, "on"));
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Once"));
        behavior.apply(&mut doc, el, false).unwrap();
        behavior.apply(&mut doc, el, true).unwrap();
        assert!(doc.has_class(el, "on"));
    }

    #[test]
    fn plugins_run_after_parent_in_order() {
        let behavior = engine(BehaviorOptions::default());
        behavior.add_filter(marker("F"), false).unwrap();
        behavior.add_filter(marker("G"), false).unwrap();
        behavior.add_plugin("F", marker("P1"), false).unwrap();
        behavior.add_plugin("F", marker("P2"), false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "F G"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.text(el), Some("F;G;P1;P2;"));
        assert_eq!(behavior.applied_names(el), ["F", "G", "P1", "P2"]);
    }

    #[test]
    fn plugins_receive_parent_result() {
        let global = FilterStore::shared();
        global
            .borrow_mut()
            .register(Filter::new("Widget", |_| Ok(Some(Rc::new(41_u32) as Output))), false)
            .unwrap();
        global
            .borrow_mut()
            .register_plugin(
                "Widget",
                Filter::new("Plus", |cx| {
                    let parent = cx.plugin_target_as::<u32>().ok_or_else(|| cx.fail("no parent"))?;
                    Ok(Some(Rc::new(*parent + 1) as Output))
                }),
                false,
            )
            .unwrap();
        let behavior = Behavior::new(global, BehaviorOptions::default());
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Widget"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(behavior.result_as::<u32>(el, "Widget").as_deref(), Some(&41));
        assert_eq!(behavior.result_as::<u32>(el, "Plus").as_deref(), Some(&42));
    }

    #[test]
    fn local_filters_shadow_global() {
        let global = FilterStore::shared();
        global.borrow_mut().register(marker("A"), false).unwrap();
        let behavior = Behavior::new(global.clone(), BehaviorOptions::default());
        let local = Filter::new("A", |cx| {
            let el = cx.element();
            cx.doc_mut().set_text(el, "local");
            Ok(None)
        });
        behavior.add_filter(local, false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "A"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.text(el), Some("local"));
    }

    #[test]
    fn errors_are_reported_and_scan_continues() {
        let behavior = engine(BehaviorOptions::default());
        let seen = capture(&behavior);
        behavior
            .add_filter(Filter::new("Needs", |_| Ok(None)).with_require(&["width"]), false)
            .unwrap();
        behavior.add_filter(counter("Count"), false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Missing Needs Count"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(count(&doc, el), Some(1));
        assert!(!behavior.is_applied(el, "Needs"));
        let seen = seen.borrow();
        assert_eq!(seen.len(), 2);
        assert!(matches!(&seen[0], Notice::Error { error: Error::NotFound { .. }, .. }));
        match &seen[1] {
            Notice::Error { name, element, error } => {
                assert_eq!(name.as_deref(), Some("Needs"));
                assert_eq!(*element, Some(el));
                assert_eq!(error.to_string(), "Could not retrieve needs-width option from element.");
            }
            other => panic!("unexpected notice {other:?}"),
        }
    }

    #[test]
    fn break_on_errors_propagates() {
        let behavior = engine(BehaviorOptions::default().with_break_on_errors(true));
        behavior
            .add_filter(Filter::new("Fails", |cx| Err(cx.fail("boom"))), false)
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Fails"));
        assert_eq!(behavior.apply(&mut doc, el, false), Err(Error::handler("boom")));
    }

    #[test]
    fn failed_setup_unwinds_its_cleanups() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(
                Filter::new("Half", |cx| {
                    let el = cx.element();
                    cx.doc_mut().add_class(el, "half");
                    cx.on_cleanup(move |doc| doc.remove_class(el, "half"));
                    Err(cx.fail("second step failed"))
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Half"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert!(!doc.has_class(el, "half"));
    }

    #[test]
    fn declared_result_type_is_checked() {
        let behavior = engine(BehaviorOptions::default());
        let seen = capture(&behavior);
        behavior
            .add_filter(
                Filter::new("Typed", |_| Ok(Some(Rc::new("text") as Output))).with_returns(ResultType::of::<u32>()),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Typed"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert!(!behavior.is_applied(el, "Typed"));
        assert!(matches!(
            &seen.borrow()[0],
            Notice::Error { error: Error::InvalidResult { name, .. }, .. } if name == "Typed"
        ));
    }

    #[test]
    fn defaults_and_typed_requirements() {
        let behavior = engine(BehaviorOptions::default().with_break_on_errors(true));
        behavior
            .add_filter(
                Filter::new("Size", |cx| {
                    let width = cx.require_as(ValueType::Number, "width")?;
                    let height = cx.get("height")?;
                    let el = cx.element();
                    cx.doc_mut().set_property(el, "size", json!([width, height]));
                    Ok(None)
                })
                .with_default("height", json!(10))
                .with_require_as("width", ValueType::Number),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(
            None,
            Element::new("div").attr("data-behavior", "Size").attr("data-size-width", "9"),
        );
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.property(el, "size"), Some(&json!([9, 10])));

        let bad = doc.insert(
            None,
            Element::new("div").attr("data-behavior", "Size").attr("data-size-width", "wide"),
        );
        assert!(matches!(
            behavior.apply(&mut doc, bad, false),
            Err(Error::TypeMismatch { key, .. }) if key == "size-width"
        ));
    }

    #[test]
    fn deprecated_attributes_seed_options() {
        let tip = || {
            Filter::new("Tip", |cx| {
                let caption = cx.get("caption")?;
                let el = cx.element();
                cx.doc_mut().set_property(el, "tip", caption.unwrap_or(Value::Null));
                Ok(None)
            })
            .with_deprecated("caption", "tooltip-text")
        };
        let mut doc = Document::new();
        let el = doc.insert(
            None,
            Element::new("div").attr("data-behavior", "Tip").attr("data-tooltip-text", "hello"),
        );

        let on = engine(BehaviorOptions::default());
        on.add_filter(tip(), false).unwrap();
        on.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.property(el, "tip"), Some(&json!("hello")));

        let off = engine(BehaviorOptions::default().with_deprecation(false));
        off.add_filter(tip(), false).unwrap();
        off.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.property(el, "tip"), Some(&Value::Null));
    }

    #[test]
    fn deprecated_json_seeds_every_option() {
        let behavior = engine(BehaviorOptions::default());
        let seen = capture(&behavior);
        behavior
            .add_filter(
                Filter::new("Legacy", |cx| {
                    let values = cx.get_many(&["a", "b"])?;
                    let el = cx.element();
                    cx.doc_mut().set_property(el, "seen", Value::Object(values));
                    Ok(None)
                })
                .with_deprecated_json("old"),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(
            None,
            Element::new("div")
                .attr("data-behavior", "Legacy")
                .attr("data-old", r#"{"a": 1, "b": 1}"#)
                .attr("data-legacy-options", "'b': 2"),
        );
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(
            doc.property(el, "seen"),
            Some(&json!({ "a": 1, "b": 2 })),
            "legacy values only fill gaps"
        );
        assert!(seen.borrow().is_empty(), "valid legacy JSON reports nothing");

        let bad = doc.insert(
            None,
            Element::new("div")
                .attr("data-behavior", "Legacy")
                .attr("data-old", "{'a': alert(1)}"),
        );
        behavior.apply(&mut doc, bad, false).unwrap();
        assert!(!behavior.is_applied(bad, "Legacy"));
        assert!(matches!(
            &seen.borrow()[..],
            [Notice::Error { name: Some(name), error: Error::Parse { attribute, .. }, .. }]
                if name == "Legacy" && attribute == "data-old"
        ));
    }

    #[test]
    fn delayed_filter_waits_for_clock() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(counter("Later").with_delay(Duration::from_millis(100)), false)
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Later"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert!(behavior.is_pending(el, "Later"));
        assert_eq!(count(&doc, el), None);
        behavior.advance(&mut doc, Duration::from_millis(99)).unwrap();
        assert_eq!(count(&doc, el), None);
        behavior.advance(&mut doc, Duration::from_millis(1)).unwrap();
        assert_eq!(count(&doc, el), Some(1));
        assert!(!behavior.is_pending(el, "Later"));
        assert_eq!(behavior.now(), Duration::from_millis(100));
    }

    #[test]
    fn cleanup_cancels_pending_deferral() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(counter("Later").with_delay(Duration::from_millis(10)), false)
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Later"));
        behavior.apply(&mut doc, el, false).unwrap();
        behavior.cleanup(&mut doc, el, true);
        assert_eq!(behavior.pending_tasks(), 0);
        behavior.advance(&mut doc, Duration::from_millis(50)).unwrap();
        assert_eq!(count(&doc, el), None);
    }

    #[test]
    fn forcing_restarts_pending_deferral() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(counter("Later").with_delay(Duration::from_millis(10)), false)
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Later"));
        behavior.apply(&mut doc, el, false).unwrap();
        behavior.advance(&mut doc, Duration::from_millis(5)).unwrap();
        behavior.apply(&mut doc, el, true).unwrap();
        behavior.advance(&mut doc, Duration::from_millis(5)).unwrap();
        assert_eq!(count(&doc, el), None, "the first timer was cancelled");
        behavior.advance(&mut doc, Duration::from_millis(5)).unwrap();
        assert_eq!(count(&doc, el), Some(1));
    }

    #[test]
    fn event_deferral_runs_once_with_plugins() {
        let behavior = engine(BehaviorOptions::default());
        behavior.add_filter(marker("Lazy").with_delay_until("mouseover focus"), false).unwrap();
        behavior.add_plugin("Lazy", marker("After"), false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Lazy"));
        let child = doc.insert(Some(el), Element::new("span"));
        behavior.apply(&mut doc, el, false).unwrap();
        behavior.dispatch_event(&mut doc, &Event::new("click", child)).unwrap();
        assert_eq!(doc.text(el), None);
        behavior.dispatch_event(&mut doc, &Event::new("mouseover", child)).unwrap();
        assert_eq!(doc.text(el), Some("Lazy;After;"));
        behavior.dispatch_event(&mut doc, &Event::new("focus", el)).unwrap();
        assert_eq!(doc.text(el), Some("Lazy;After;"));
    }

    #[test]
    fn filter_listeners_follow_aliases_until_cleanup() {
        let behavior = engine(BehaviorOptions::default());
        let seen = capture(&behavior);
        behavior
            .add_filter(
                Filter::new("Hover", |cx| {
                    let el = cx.element();
                    cx.add_listener(el, &["mouseenter"], move |_, doc, _| {
                        let count = doc.property(el, "count").and_then(Value::as_u64).unwrap_or(0);
                        doc.set_property(el, "count", json!(count + 1));
                        Ok(())
                    });
                    cx.add_listener(el, &["focus"], |_, _, _| Err(Error::handler("no focus")));
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Hover"));
        let child = doc.insert(Some(el), Element::new("span"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(behavior.pending_tasks(), 2);

        behavior.dispatch_event(&mut doc, &Event::new("mouseover", child)).unwrap();
        let inside = Event::new("mouseover", child).with_related_target(el);
        behavior.dispatch_event(&mut doc, &inside).unwrap();
        behavior.dispatch_event(&mut doc, &Event::new("mouseover", el)).unwrap();
        assert_eq!(count(&doc, el), Some(2), "moves within the element are not entries");

        behavior.dispatch_event(&mut doc, &Event::new("focus", el)).unwrap();
        assert!(matches!(
            &seen.borrow()[..],
            [Notice::Error { element: Some(e), error: Error::Handler(msg), .. }] if *e == el && msg == "no focus"
        ));

        let direct = behavior.add_listener(el, &["click"], |_, _, _| Ok(()));
        assert_eq!(behavior.pending_tasks(), 3);
        assert!(behavior.remove_listener(direct));
        assert!(!behavior.remove_listener(direct), "second removal is a no-op");

        behavior.cleanup(&mut doc, el, false);
        assert_eq!(behavior.pending_tasks(), 0);
        behavior.dispatch_event(&mut doc, &Event::new("mouseover", el)).unwrap();
        assert_eq!(count(&doc, el), Some(2), "cleanup removes listeners");
    }

    #[test]
    fn initializer_controls_setup() {
        let behavior = engine(BehaviorOptions::default());
        let saved = Rc::new(RefCell::new(None));
        let keep = saved.clone();
        behavior
            .add_filter(
                counter("Manual").with_initializer(move |cx| {
                    *keep.borrow_mut() = Some(cx.trampoline());
                    Ok(())
                }),
                false,
            )
            .unwrap();
        behavior
            .add_filter(
                counter("Eager").with_initializer(|cx| {
                    assert_eq!(cx.get("mode")?, Some(json!("fast")));
                    cx.run_setup()
                })
                .with_default("mode", json!("fast")),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let manual = doc.insert(None, Element::new("div").attr("data-behavior", "Manual"));
        let eager = doc.insert(None, Element::new("div").attr("data-behavior", "Eager"));
        behavior.apply(&mut doc, manual, false).unwrap();
        behavior.apply(&mut doc, eager, false).unwrap();
        assert_eq!(count(&doc, eager), Some(1));
        assert_eq!(count(&doc, manual), None);

        let trampoline = saved.borrow().unwrap();
        behavior.run_setup(&mut doc, trampoline).unwrap();
        behavior.run_setup(&mut doc, trampoline).unwrap();
        assert_eq!(count(&doc, manual), Some(1), "trampolines run at most once");
    }

    #[test]
    fn filter_timers_are_cancelled_by_cleanup() {
        let behavior = engine(BehaviorOptions::default());
        behavior
            .add_filter(
                Filter::new("Blink", |cx| {
                    let el = cx.element();
                    cx.set_timeout(Duration::from_millis(20), move |_, doc| {
                        doc.add_class(el, "blinked");
                        Ok(())
                    });
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let a = doc.insert(None, Element::new("div").attr("data-behavior", "Blink"));
        let b = doc.insert(None, Element::new("div").attr("data-behavior", "Blink"));
        behavior.apply(&mut doc, a, false).unwrap();
        behavior.apply(&mut doc, b, false).unwrap();
        behavior.cleanup(&mut doc, b, true);
        behavior.advance(&mut doc, Duration::from_millis(20)).unwrap();
        assert!(doc.has_class(a, "blinked"));
        assert!(!doc.has_class(b, "blinked"));
    }

    #[test]
    fn destroy_amend_and_prune() {
        let behavior = engine(BehaviorOptions::default());
        let seen = capture(&behavior);
        let undone = Rc::new(RefCell::new(0));
        let hits = undone.clone();
        behavior
            .add_filter(
                Filter::new("Track", move |cx| {
                    let hits = hits.clone();
                    cx.on_cleanup(move |_| *hits.borrow_mut() += 1);
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let a = doc.insert(Some(root), Element::new("p").attr("data-behavior", "Track"));
        behavior.amend(&mut doc, root).unwrap();
        assert!(behavior.is_applied(a, "Track"));

        let b = doc.insert(Some(root), Element::new("p").attr("data-behavior", "Track"));
        behavior.amend(&mut doc, root).unwrap();
        doc.remove(b);
        assert_eq!(behavior.prune(&mut doc), 1);
        assert_eq!(*undone.borrow(), 1);

        behavior.destroy(&mut doc, root);
        assert_eq!(*undone.borrow(), 2);
        assert!(!doc.is_alive(a));
        let seen = seen.borrow();
        assert_eq!(
            *seen,
            [Notice::AmendDom(root), Notice::AmendDom(root), Notice::DestroyDom(root)]
        );
    }

    #[test]
    fn passed_methods() {
        let behavior = engine(BehaviorOptions::default().with_break_on_errors(true));
        behavior
            .pass_method("double", |_, _, args| {
                let n = args.first().and_then(Value::as_i64).unwrap_or(0);
                Ok(json!(n * 2))
            })
            .unwrap();
        assert!(matches!(
            behavior.pass_method("double", |_, _, _| Ok(Value::Null)),
            Err(Error::DuplicateRegistration { kind: "method", .. })
        ));
        behavior
            .add_filter(
                Filter::new("Calls", |cx| {
                    let value = cx.call("double", &[json!(21)])?;
                    let el = cx.element();
                    cx.doc_mut().set_property(el, "value", value);
                    Ok(None)
                }),
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Calls"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.property(el, "value"), Some(&json!(42)));
        assert!(matches!(
            behavior.call_method(&mut doc, "missing", &[]),
            Err(Error::NotFound { kind: "method", .. })
        ));
    }

    #[test]
    fn filter_defaults_override_is_local() {
        let global = FilterStore::shared();
        global
            .borrow_mut()
            .register(
                Filter::new("Greet", |cx| {
                    let word = cx.get("word")?.unwrap_or(Value::Null);
                    let el = cx.element();
                    cx.doc_mut().set_property(el, "word", word);
                    Ok(None)
                })
                .with_default("word", json!("hi")),
                false,
            )
            .unwrap();
        let behavior = Behavior::new(global.clone(), BehaviorOptions::default());
        let mut defaults = Map::new();
        defaults.insert("word".into(), json!("hello"));
        behavior.set_filter_defaults("Greet", &defaults).unwrap();
        assert!(behavior.set_filter_defaults("Nope", &defaults).is_err());

        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Greet"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(doc.property(el, "word"), Some(&json!("hello")));
        let global_default = global.borrow().get("Greet").unwrap().config().defaults.get("word").cloned();
        assert_eq!(global_default, Some(json!("hi")));
    }

    #[test]
    fn marker_helpers_and_custom_selection() {
        let behavior = engine(BehaviorOptions::default().with_marker("filters"));
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div"));
        behavior.add_filter_name(&mut doc, el, "A");
        behavior.add_filter_name(&mut doc, el, "B");
        assert!(behavior.has_filter_name(&doc, el, "B"));
        behavior.remove_filter_name(&mut doc, el, "A");
        assert_eq!(behavior.filter_names(&doc, el), ["B"]);
        assert_eq!(doc.attr(el, "data-filters"), Some("B"));

        let selective = engine(BehaviorOptions::default().with_select(|doc, el| doc.has_class(el, "on")));
        selective.add_filter(counter("Count"), false).unwrap();
        let on = doc.insert(None, Element::new("div").class("on").attr("data-behavior", "Count"));
        let off = doc.insert(None, Element::new("div").attr("data-behavior", "Count"));
        selective.apply_all(&mut doc, false).unwrap();
        assert_eq!(count(&doc, on), Some(1));
        assert_eq!(count(&doc, off), None);
    }

    #[test]
    fn verbose_mode_logs_applications() {
        let behavior = engine(BehaviorOptions::default().with_verbose(true));
        let seen = capture(&behavior);
        behavior.add_filter(counter("Count"), false).unwrap();
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").attr("data-behavior", "Count"));
        behavior.apply(&mut doc, el, false).unwrap();
        assert_eq!(
            *seen.borrow(),
            [Notice::Log {
                element: Some(el),
                message: "applied filter Count".into()
            }]
        );
    }
}
