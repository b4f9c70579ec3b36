// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_behavior --heading-base-level=0

//! Understory Behavior: attach named behaviors to the elements that declare them.
//!
//! ## Overview
//!
//! Elements list behaviors ("filters") by name in a marker attribute,
//! `data-behavior="Resizable Tooltip"` by default. A [`Behavior`] engine scans
//! a subtree, resolves each declared name against its filter stores and runs
//! the filter's setup once per (element, filter). What setup did can be undone
//! with [`Behavior::cleanup`].
//!
//! ## Configuration on the element
//!
//! A filter reads its options through an [`Api`] bound to the element:
//!
//! - `data-<name>-options` holds a JSON object; the braces may be omitted and
//!   single quotes are accepted. The text must pass a conservative character
//!   scan before it is parsed.
//! - `data-<name>-<key>` supplies a single string value when the options object
//!   lacks `<key>`.
//!
//! Keys are matched hyphenated or camel-cased alike. Values can be read as a
//! [`ValueType`] (strings such as `"9"` or `"true"` are decoded) or
//! deserialized into any `serde` type.
//!
//! ## Filters
//!
//! A [`Filter`] couples a setup function with declarative configuration:
//! defaults, required keys (optionally typed), a declared result type, legacy
//! attribute mappings and a [`Deferral`]. Setup receives a [`FilterCx`] and may
//! register cleanup hooks and timers, call methods the host passed in with
//! [`Behavior::pass_method`], and return a result that later plugins and
//! [`Behavior::result`] can see.
//!
//! Plugins are filters chained after a parent. They run after all of the
//! element's filters in registration order and receive the parent's result.
//!
//! ## Scopes
//!
//! Filters live in a [`FilterStore`]. Every engine has a private store and
//! shares a global [`SharedFilters`] store; private registrations shadow global
//! ones. Registering a taken name fails with
//! [`Error::DuplicateRegistration`] unless overwriting is requested.
//!
//! ## Errors
//!
//! Failures are [`Error`] values. By default the engine reports them as a
//! [`Notice::Error`] (and a `tracing` warning) and moves on to the next
//! filter; with [`BehaviorOptions::break_on_errors`] they propagate out of
//! [`Behavior::apply`].
//!
//! ## Deferred setup
//!
//! Deferred filters run on the engine's logical clock
//! ([`Behavior::advance`]), when a native event reaches the element
//! ([`Behavior::dispatch_event`]), or when a custom initializer fires its
//! [`Trampoline`]. Cleanup cancels whatever has not run yet.
//!
//! ## Example
//!
//! ```rust
//! use serde_json::json;
//! use understory_behavior::{Behavior, BehaviorOptions, Filter, FilterStore, ValueType};
//! use understory_dom::{Document, Element};
//!
//! let behavior = Behavior::new(FilterStore::shared(), BehaviorOptions::default());
//! behavior
//!     .add_filter(
//!         Filter::new("Resizable", |cx| {
//!             let max = cx.require_as(ValueType::Number, "maxWidth")?;
//!             let el = cx.element();
//!             cx.doc_mut().set_property(el, "maxWidth", max);
//!             Ok(None)
//!         }),
//!         false,
//!     )
//!     .unwrap();
//!
//! let mut doc = Document::new();
//! let el = doc.insert(
//!     None,
//!     Element::new("div")
//!         .attr("data-behavior", "Resizable")
//!         .attr("data-resizable-options", "'max-width': 300"),
//! );
//! behavior.apply(&mut doc, el, false).unwrap();
//! assert_eq!(doc.property(el, "maxWidth"), Some(&json!(300)));
//! ```

mod api;
mod applied;
mod coerce;
mod context;
mod defer;
mod engine;
mod error;
mod filter;
mod json;
mod names;
mod notice;
mod options;
mod registry;

pub use api::Api;
pub use coerce::ValueType;
pub use context::{FilterCx, InitCx};
pub use defer::{ListenerFn, TaskId, Trampoline};
pub use engine::{Behavior, MethodFn, PluginCall};
pub use error::{Error, Result};
pub use filter::{Deferral, Filter, FilterConfig, FilterStore, InitFn, Output, ResultType, SetupFn, SharedFilters};
pub use json::{decode, is_secure, parse_options};
pub use names::{add_name, camel_case, has_name, hyphenate, names, normalize_prefix, remove_name, split_names};
pub use notice::{Notice, Notifier, SubscriptionId};
pub use options::{BehaviorOptions, SelectFn};
pub use registry::{Registry, resolve};
