// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Engine options.

use std::rc::Rc;

use serde::Deserialize;
use understory_dom::{Document, NodeId};

/// Custom predicate choosing which elements a scan considers.
pub type SelectFn = dyn Fn(&Document, NodeId) -> bool;

/// Options for a [`Behavior`](crate::Behavior).
///
/// Deserializes from camel-cased keys with every field optional:
///
/// ```rust
/// use understory_behavior::BehaviorOptions;
///
/// let options: BehaviorOptions =
///     serde_json::from_str(r#"{ "breakOnErrors": true, "marker": "filters" }"#).unwrap();
/// assert!(options.break_on_errors);
/// assert!(options.enable_deprecation);
/// assert_eq!(options.marker, "filters");
/// ```
#[derive(Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BehaviorOptions {
    /// Propagate errors out of `apply` instead of reporting them.
    pub break_on_errors: bool,
    /// Honor filters' deprecated attribute mappings.
    pub enable_deprecation: bool,
    /// Log every application at `debug` and emit [`Notice::Log`](crate::Notice::Log).
    pub verbose: bool,
    /// Marker list read from `data-<marker>`.
    pub marker: String,
    /// Element that scans default to when no root is given.
    #[serde(skip)]
    pub container: Option<NodeId>,
    /// Replaces the marker test when set.
    #[serde(skip)]
    pub select: Option<Rc<SelectFn>>,
}

impl Default for BehaviorOptions {
    fn default() -> Self {
        Self {
            break_on_errors: false,
            enable_deprecation: true,
            verbose: false,
            marker: "behavior".to_string(),
            container: None,
            select: None,
        }
    }
}

impl core::fmt::Debug for BehaviorOptions {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BehaviorOptions")
            .field("break_on_errors", &self.break_on_errors)
            .field("enable_deprecation", &self.enable_deprecation)
            .field("verbose", &self.verbose)
            .field("marker", &self.marker)
            .field("container", &self.container)
            .field("select", &self.select.is_some())
            .finish()
    }
}

impl BehaviorOptions {
    /// Set [`BehaviorOptions::break_on_errors`].
    pub fn with_break_on_errors(mut self, on: bool) -> Self {
        self.break_on_errors = on;
        self
    }

    /// Set [`BehaviorOptions::enable_deprecation`].
    pub fn with_deprecation(mut self, on: bool) -> Self {
        self.enable_deprecation = on;
        self
    }

    /// Set [`BehaviorOptions::verbose`].
    pub fn with_verbose(mut self, on: bool) -> Self {
        self.verbose = on;
        self
    }

    /// Set the marker list name.
    pub fn with_marker(mut self, marker: &str) -> Self {
        self.marker = marker.to_string();
        self
    }

    /// Set the default scan root.
    pub fn with_container(mut self, container: NodeId) -> Self {
        self.container = Some(container);
        self
    }

    /// Choose elements with `select` instead of the marker attribute.
    pub fn with_select(mut self, select: impl Fn(&Document, NodeId) -> bool + 'static) -> Self {
        self.select = Some(Rc::new(select));
        self
    }

    /// Returns true if a scan should consider `element`.
    pub(crate) fn selects(&self, doc: &Document, element: NodeId) -> bool {
        match &self.select {
            Some(select) => select(doc, element),
            None => doc.data(element, &self.marker).is_some(),
        }
    }
}
