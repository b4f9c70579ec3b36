// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_delegator --heading-base-level=0

//! Understory Delegator: delegated event triggers declared on elements.
//!
//! ## Overview
//!
//! Elements name the triggers they respond to in `data-trigger`. A
//! [`Delegator`] attached to a container receives native events through
//! [`Delegator::handle_event`], finds the closest declaring element between
//! the event target and the container, and runs each declared [`Trigger`]
//! whose event types the event satisfies.
//!
//! Triggers read their configuration through the same reader filters use
//! (`data-<trigger>-options`, `data-<trigger>-<key>`), can declare defaults and
//! required keys, and can be gated by `if` / `unless` [`Conditional`]s that
//! inspect nearby elements:
//!
//! ```text
//! <a data-trigger="toggle" data-toggle-options="
//!     'unless': { '~ .panel::hasClass': ['locked'] }
//! ">
//! ```
//!
//! ## Composite forms
//!
//! The reserved names `multi`, `first` and `any` fan out to other elements:
//! `multi` runs a list of `selector::trigger` entries, while `first` and `any`
//! run the entries of the first, or of every, conditional group that passes.
//! `Stop` and `PreventDefault` act on the native event.
//!
//! ## Working with the behavior engine
//!
//! [`Delegator::bind_to_behavior`] lets triggers apply filters to content they
//! add and destroy elements cleanly. [`startup_filter`] returns the `Startup`
//! filter, which fires triggers once its element is set up and their
//! conditions hold. [`trigger_filter`] returns the `Trigger` filter, which
//! listens on watched elements directly (useful for pointer transitions) and
//! runs `selector::trigger` entries when they see the listed events.
//!
//! ## Errors
//!
//! Failing triggers are reported as [`DelegatorNotice::Error`] and skipped
//! unless [`DelegatorOptions::break_on_errors`] is set, in which case the
//! error propagates out of dispatch.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use understory_delegator::{Delegator, DelegatorOptions, Trigger, TriggerStore};
//! use understory_dom::{Document, Element, Event};
//!
//! let delegator = Delegator::new(TriggerStore::shared(), DelegatorOptions::default());
//! delegator
//!     .add_trigger(
//!         Trigger::new("toggle", &["click"], |cx| {
//!             let class = cx.get("class")?.unwrap_or(json!("open"));
//!             let el = cx.element();
//!             if let Some(class) = class.as_str() {
//!                 if cx.doc().has_class(el, class) {
//!                     cx.doc_mut().remove_class(el, class);
//!                 } else {
//!                     cx.doc_mut().add_class(el, class);
//!                 }
//!             }
//!             Ok(None)
//!         }),
//!         false,
//!     )
//!     .unwrap();
//!
//! let mut doc = Document::new();
//! let page = doc.insert(None, Element::new("body"));
//! let menu = doc.insert(
//!     Some(page),
//!     Element::new("nav")
//!         .attr("data-trigger", "toggle")
//!         .attr("data-toggle-options", "'unless': { 'self::hasClass': ['locked'] }"),
//! );
//! delegator.attach(page);
//!
//! delegator.handle_event(&mut doc, &mut Event::new("click", menu)).unwrap();
//! assert!(doc.has_class(menu, "open"));
//!
//! doc.add_class(menu, "locked");
//! delegator.handle_event(&mut doc, &mut Event::new("click", menu)).unwrap();
//! assert!(doc.has_class(menu, "open"));
//! ```

mod conditional;
mod delegator;
mod monitor;
mod startup;
mod switches;
mod trigger;

pub use conditional::{Check, Conditional, ElementMethod, Evaluator, Gate, Target};
pub use delegator::{Delegator, DelegatorNotice, DelegatorOptions};
pub use monitor::{TRIGGER, trigger_filter};
pub use startup::{STARTUP, startup_filter};
pub use trigger::{SharedTriggers, Trigger, TriggerCx, TriggerFn, TriggerStore};
