// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The delegated trigger dispatcher.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};
use understory_behavior::{Api, Behavior, Error, Notifier, Result, SubscriptionId, resolve};
use understory_dom::{Document, Event, EventAliases, NodeId, propagation_path};

use crate::conditional::{Conditional, Evaluator, Gate};
use crate::switches::Switch;
use crate::trigger::{SharedTriggers, Trigger, TriggerCx, TriggerStore};

/// Name list an element declares its triggers in.
pub(crate) const TRIGGER_LIST: &str = "trigger";

/// Options for a [`Delegator`].
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DelegatorOptions {
    /// Propagate errors out of [`Delegator::trigger`] and
    /// [`Delegator::handle_event`] instead of reporting them.
    pub break_on_errors: bool,
    /// Log every dispatch at `debug` and emit [`DelegatorNotice::Log`].
    pub verbose: bool,
}

impl DelegatorOptions {
    /// Set [`DelegatorOptions::break_on_errors`].
    pub fn with_break_on_errors(mut self, on: bool) -> Self {
        self.break_on_errors = on;
        self
    }

    /// Set [`DelegatorOptions::verbose`].
    pub fn with_verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }
}

/// Notices emitted by a [`Delegator`].
#[derive(Clone, Debug, PartialEq)]
pub enum DelegatorNotice {
    /// A trigger or composite form failed and was skipped.
    Error {
        /// The trigger, when known.
        name: Option<String>,
        /// The element it ran on, when known.
        element: Option<NodeId>,
        /// What went wrong.
        error: Error,
    },
    /// Something looks misconfigured.
    Warn {
        /// The element concerned, when known.
        element: Option<NodeId>,
        /// Description.
        message: String,
    },
    /// Progress message; only emitted in verbose mode.
    Log {
        /// The element concerned, when known.
        element: Option<NodeId>,
        /// Description.
        message: String,
    },
    /// A trigger's handler ran.
    Fired {
        /// The trigger.
        name: String,
        /// The element it ran on.
        element: NodeId,
        /// Type of the event it handled (`click` for mock events).
        kind: String,
        /// What the handler returned.
        result: Option<Value>,
    },
}

/// Dispatches events to the triggers the elements under attached containers declare.
///
/// Elements declare triggers in `data-trigger`. When an event handed to
/// [`Delegator::handle_event`] passes through an attached container, the
/// closest element between the event's target and the container that declares
/// triggers is the delegation target; each declared name is then run through
/// [`Delegator::trigger`].
///
/// Besides registered triggers an element may declare the reserved names
/// `Stop`, `PreventDefault`, `multi`, `any` and `first`.
///
/// ```rust
/// use understory_delegator::{Delegator, DelegatorOptions, Trigger, TriggerStore};
/// use understory_dom::{Document, Element, Event};
///
/// let delegator = Delegator::new(TriggerStore::shared(), DelegatorOptions::default());
/// delegator
///     .add_trigger(
///         Trigger::new("open", &["click"], |cx| {
///             let el = cx.element();
///             cx.doc_mut().add_class(el, "open");
///             Ok(None)
///         }),
///         false,
///     )
///     .unwrap();
///
/// let mut doc = Document::new();
/// let page = doc.insert(None, Element::new("body"));
/// let link = doc.insert(Some(page), Element::new("a").attr("data-trigger", "open"));
/// delegator.attach(page);
///
/// delegator.handle_event(&mut doc, &mut Event::new("click", link)).unwrap();
/// assert!(doc.has_class(link, "open"));
/// ```
pub struct Delegator {
    options: DelegatorOptions,
    verbose: Cell<bool>,
    global: SharedTriggers,
    local: RefCell<TriggerStore>,
    attached: RefCell<Vec<(NodeId, Vec<String>)>>,
    aliases: EventAliases,
    evaluator: RefCell<Evaluator>,
    behavior: RefCell<Option<Rc<Behavior>>>,
    notices: Notifier<DelegatorNotice>,
}

impl core::fmt::Debug for Delegator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Delegator")
            .field("options", &self.options)
            .field("verbose", &self.verbose.get())
            .field("local", &self.local)
            .field("attached", &self.attached)
            .field("evaluator", &self.evaluator)
            .field("bound", &self.behavior.borrow().is_some())
            .finish_non_exhaustive()
    }
}

impl Delegator {
    /// A dispatcher reading triggers from its own store, then from `global`.
    pub fn new(global: SharedTriggers, options: DelegatorOptions) -> Self {
        Self {
            verbose: Cell::new(options.verbose),
            options,
            global,
            local: RefCell::new(TriggerStore::new()),
            attached: RefCell::new(Vec::new()),
            aliases: EventAliases::default(),
            evaluator: RefCell::new(Evaluator::new()),
            behavior: RefCell::new(None),
            notices: Notifier::new(),
        }
    }

    /// Replace the event alias table (`mouseenter` / `mouseleave` by default).
    pub fn with_aliases(mut self, aliases: EventAliases) -> Self {
        self.aliases = aliases;
        self
    }

    /// The options this dispatcher was built with.
    pub fn options(&self) -> &DelegatorOptions {
        &self.options
    }

    /// The shared global store.
    pub fn global(&self) -> &SharedTriggers {
        &self.global
    }

    /// Whether dispatch is being logged.
    pub fn is_verbose(&self) -> bool {
        self.verbose.get()
    }

    // --- Registration ---

    /// Register a trigger private to this dispatcher.
    ///
    /// Attached containers start listening for any new event type.
    pub fn add_trigger(&self, trigger: Trigger, overwrite: bool) -> Result<()> {
        self.local.borrow_mut().register(trigger, overwrite)?;
        self.sync_listeners();
        Ok(())
    }

    /// Register several private triggers in order.
    pub fn add_triggers(&self, triggers: impl IntoIterator<Item = Trigger>, overwrite: bool) -> Result<()> {
        let result = self.local.borrow_mut().register_many(triggers, overwrite);
        self.sync_listeners();
        result
    }

    /// Extend the event types of the trigger `name` resolves to.
    pub fn add_event_types(&self, name: &str, types: &[&str]) -> Result<()> {
        let local = self.local.borrow().contains(name);
        if local {
            self.local.borrow_mut().add_event_types(name, types)?;
        } else {
            self.global.borrow_mut().add_event_types(name, types)?;
        }
        self.sync_listeners();
        Ok(())
    }

    /// Resolve a trigger: private registrations shadow global ones.
    pub fn get_trigger(&self, name: &str) -> Option<Rc<Trigger>> {
        resolve(self.local.borrow().registry(), self.global.borrow().registry(), name)
    }

    /// Every event type a visible trigger listens for, sorted.
    pub fn event_types(&self) -> Vec<String> {
        let mut types = self.local.borrow().event_types();
        types.extend(self.global.borrow().event_types());
        types.sort_unstable();
        types.dedup();
        types
    }

    // --- Containers ---

    /// Start delegating events that pass through `container`.
    ///
    /// Returns false if it was already attached.
    pub fn attach(&self, container: NodeId) -> bool {
        if self.is_attached(container) {
            return false;
        }
        let types = self.event_types();
        debug!(?container, ?types, "attached delegator");
        self.attached.borrow_mut().push((container, types));
        true
    }

    /// Stop delegating events for `container`.
    ///
    /// Returns false if it was not attached.
    pub fn detach(&self, container: NodeId) -> bool {
        let mut attached = self.attached.borrow_mut();
        let Some(index) = attached.iter().position(|(c, _)| *c == container) else {
            return false;
        };
        attached.remove(index);
        debug!(?container, "detached delegator");
        true
    }

    /// Detach every container. Returns how many were attached.
    pub fn detach_all(&self) -> usize {
        core::mem::take(&mut *self.attached.borrow_mut()).len()
    }

    /// Returns true if `container` is attached.
    pub fn is_attached(&self, container: NodeId) -> bool {
        self.attached.borrow().iter().any(|(c, _)| *c == container)
    }

    /// Event types `container` listens for; empty when not attached.
    pub fn listening(&self, container: NodeId) -> Vec<String> {
        self.attached
            .borrow()
            .iter()
            .find(|(c, _)| *c == container)
            .map(|(_, types)| types.clone())
            .unwrap_or_default()
    }

    /// Bring every attached container's listeners in line with the registered triggers.
    ///
    /// Registration through the dispatcher does this itself; call it after
    /// registering directly into the shared global store.
    pub fn sync_listeners(&self) {
        let types = self.event_types();
        for (_, listening) in self.attached.borrow_mut().iter_mut() {
            listening.clone_from(&types);
        }
    }

    fn listens(&self, container: NodeId, kind: &str) -> bool {
        self.attached
            .borrow()
            .iter()
            .find(|(c, _)| *c == container)
            .is_some_and(|(_, types)| types.iter().any(|t| self.aliases.base_of(t) == kind))
    }

    // --- Dispatch ---

    /// Run the trigger `name` on `element`.
    ///
    /// Without an `event` a non-bubbling mock `click` is handed to the handler
    /// and the event type check is skipped. With one, the trigger only runs if
    /// the event satisfies one of its declared types, unless `ignore_types`.
    /// A prepared `api` is used instead of a fresh reader; composite forms use
    /// this to seed per-invocation defaults.
    ///
    /// Returns the handler's result. A missing trigger is a warning, a
    /// failing condition silently skips the handler, and errors are reported
    /// unless breaking on errors.
    pub fn trigger(
        &self,
        doc: &mut Document,
        name: &str,
        element: NodeId,
        event: Option<&mut Event>,
        ignore_types: bool,
        api: Option<Api>,
    ) -> Result<Option<Value>> {
        self.log(Some(element), format!("applying trigger {name}"));
        let Some(trigger) = self.get_trigger(name) else {
            self.warn(Some(element), format!("could not find a trigger by the name of {name}"));
            return Ok(None);
        };
        let mut mock = None;
        let event = match event {
            Some(event) => {
                if !ignore_types && !self.accepts(doc, &trigger, element, event) {
                    return Ok(None);
                }
                event
            }
            None => mock.insert(Event::mock(element)),
        };
        match self.fire(doc, &trigger, element, event, api) {
            Ok(result) => {
                if result.is_some() {
                    self.log(Some(element), format!("applied trigger {name}"));
                } else {
                    self.log(Some(element), format!("applied trigger {name} without a result"));
                }
                Ok(result)
            }
            Err(error) => self.report(Some(name), Some(element), error).map(|()| None),
        }
    }

    fn accepts(&self, doc: &Document, trigger: &Trigger, element: NodeId, event: &Event) -> bool {
        trigger
            .types()
            .iter()
            .any(|declared| self.aliases.matches_type(doc, element, declared, event))
    }

    fn fire(
        &self,
        doc: &mut Document,
        trigger: &Trigger,
        element: NodeId,
        event: &mut Event,
        api: Option<Api>,
    ) -> Result<Option<Value>> {
        let mut api = api.unwrap_or_else(|| Api::new(element, trigger.name()));
        api.set_defaults(doc, &trigger.defaults)?;
        for (key, ty) in &trigger.require_as {
            api.require_as(doc, *ty, key)?;
        }
        let required: Vec<&str> = trigger.require.iter().map(String::as_str).collect();
        api.require(doc, &required)?;

        let declared = Gate::from_api(doc, &mut api)?;
        if !self.passes(doc, element, &trigger.gate)? || !self.passes(doc, element, &declared)? {
            self.log(
                Some(element),
                format!("not running trigger {} due to its conditions", trigger.name()),
            );
            return Ok(None);
        }

        let result = {
            let mut cx = TriggerCx::new(doc, self, trigger.name(), event, api);
            (trigger.handler)(&mut cx)?
        };
        self.notices.emit(&DelegatorNotice::Fired {
            name: trigger.name().to_string(),
            element,
            kind: event.kind.clone(),
            result: result.clone(),
        });
        Ok(result)
    }

    /// Deliver a native event.
    ///
    /// Attached containers on the event's propagation path are visited
    /// innermost first until propagation is stopped. Each delegation target is
    /// handled at most once per event.
    pub fn handle_event(&self, doc: &mut Document, event: &mut Event) -> Result<()> {
        let path = propagation_path(doc, event);
        let mut handled: Vec<NodeId> = Vec::new();
        for (depth, &container) in path.iter().enumerate() {
            if event.is_propagation_stopped() {
                break;
            }
            if !self.listens(container, &event.kind) {
                continue;
            }
            let Some(target) = path[..depth]
                .iter()
                .copied()
                .find(|node| doc.has_attr(*node, "data-trigger"))
            else {
                continue;
            };
            if handled.contains(&target) {
                continue;
            }
            handled.push(target);
            self.handle_target(doc, target, event)?;
        }
        Ok(())
    }

    fn handle_target(&self, doc: &mut Document, target: NodeId, event: &mut Event) -> Result<()> {
        let mut declared = self.trigger_names(doc, target);
        if take(&mut declared, "Stop") {
            event.stop();
        }
        if take(&mut declared, "PreventDefault") {
            event.prevent_default();
        }
        if take(&mut declared, "multi") {
            let outcome = self.handle_multi(doc, target, event);
            self.guard("multi", target, outcome)?;
        }
        if take(&mut declared, "any") {
            let outcome = self.run_switch(doc, target, event, Switch::Any);
            self.guard("any", target, outcome)?;
        }
        if take(&mut declared, "first") {
            let outcome = self.run_switch(doc, target, event, Switch::First);
            self.guard("first", target, outcome)?;
        }
        for name in declared {
            self.trigger(doc, &name, target, Some(&mut *event), false, None)?;
        }
        Ok(())
    }

    fn guard(&self, name: &str, element: NodeId, outcome: Result<()>) -> Result<()> {
        match outcome {
            Ok(()) => Ok(()),
            Err(error) => self.report(Some(name), Some(element), error),
        }
    }

    // --- Conditions ---

    /// Make `method` available to conditions, shadowing a built-in of the same name.
    pub fn add_method(
        &self,
        name: &str,
        method: impl Fn(&Document, NodeId, &[Value]) -> Result<Value> + 'static,
    ) {
        self.evaluator.borrow_mut().add_method(name, method);
    }

    /// Evaluate `conditional` relative to `context`.
    pub fn evaluate(&self, doc: &Document, context: NodeId, conditional: &Conditional) -> Result<bool> {
        self.evaluator.borrow().evaluate(doc, context, conditional)
    }

    /// Returns true if every condition passes relative to `context`.
    pub fn verify(&self, doc: &Document, context: NodeId, conditionals: &[Conditional]) -> Result<bool> {
        self.evaluator.borrow().all(doc, context, conditionals)
    }

    pub(crate) fn passes(&self, doc: &Document, context: NodeId, gate: &Gate) -> Result<bool> {
        if gate.is_empty() {
            return Ok(true);
        }
        gate.passes(&self.evaluator.borrow(), doc, context)
    }

    // --- Trigger list ---

    /// Trigger names declared on `element`.
    pub fn trigger_names(&self, doc: &Document, element: NodeId) -> Vec<String> {
        understory_behavior::names(doc, element, TRIGGER_LIST)
    }

    /// Declare `name` on `element`.
    pub fn add_trigger_name(&self, doc: &mut Document, element: NodeId, name: &str) {
        understory_behavior::add_name(doc, element, TRIGGER_LIST, name);
    }

    /// Remove `name` from `element`'s declarations.
    pub fn remove_trigger_name(&self, doc: &mut Document, element: NodeId, name: &str) {
        understory_behavior::remove_name(doc, element, TRIGGER_LIST, name);
    }

    /// Returns true if `element` declares `name`.
    pub fn has_trigger_name(&self, doc: &Document, element: NodeId, name: &str) -> bool {
        understory_behavior::has_name(doc, element, TRIGGER_LIST, name)
    }

    // --- Behavior binding ---

    /// Let triggers reach `behavior` through [`TriggerCx::amend_dom`],
    /// [`TriggerCx::destroy_dom`] and [`TriggerCx::call`].
    ///
    /// A verbose engine makes the dispatcher verbose too.
    pub fn bind_to_behavior(&self, behavior: Rc<Behavior>) {
        if behavior.options().verbose {
            self.verbose.set(true);
        }
        *self.behavior.borrow_mut() = Some(behavior);
    }

    /// Forget the bound engine, returning it.
    pub fn unbind_from_behavior(&self) -> Option<Rc<Behavior>> {
        self.behavior.borrow_mut().take()
    }

    /// The bound engine.
    pub fn behavior(&self) -> Option<Rc<Behavior>> {
        self.behavior.borrow().clone()
    }

    /// Apply filters to content added under `container`.
    pub fn amend_dom(&self, doc: &mut Document, container: NodeId) -> Result<()> {
        match self.behavior() {
            Some(behavior) => behavior.amend(doc, container),
            None => {
                self.warn(Some(container), "no behavior bound to amend new content".to_string());
                Ok(())
            }
        }
    }

    /// Remove `element`, cleaning up its filters first when an engine is bound.
    pub fn destroy_dom(&self, doc: &mut Document, element: NodeId) {
        match self.behavior() {
            Some(behavior) => behavior.destroy(doc, element),
            None => {
                doc.remove(element);
            }
        }
    }

    // --- Notices ---

    /// Subscribe to notices.
    pub fn on_notice(&self, callback: impl Fn(&DelegatorNotice) + 'static) -> SubscriptionId {
        self.notices.subscribe(callback)
    }

    /// Unsubscribe from notices.
    pub fn off_notice(&self, id: SubscriptionId) -> bool {
        self.notices.unsubscribe(id)
    }

    /// Emit a warning.
    pub fn warn(&self, element: Option<NodeId>, message: String) {
        warn!(?element, "{message}");
        self.notices.emit(&DelegatorNotice::Warn { element, message });
    }

    /// Emit a progress message when verbose.
    pub fn log(&self, element: Option<NodeId>, message: String) {
        if !self.verbose.get() {
            return;
        }
        debug!(?element, "{message}");
        self.notices.emit(&DelegatorNotice::Log { element, message });
    }

    /// Emit an error notice without propagating.
    pub fn emit_error(&self, name: Option<&str>, element: Option<NodeId>, error: &Error) {
        warn!(name, ?element, "{error}");
        self.notices.emit(&DelegatorNotice::Error {
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

/// Remove `name` from `names`, returning whether it was there.
fn take(names: &mut Vec<String>, name: &str) -> bool {
    let before = names.len();
    names.retain(|n| n != name);
    names.len() != before
}
