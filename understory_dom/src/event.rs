// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Native events and event-type aliases.
//!
//! An [`Event`] carries a type name, the node it was fired at, an optional
//! related node (for pointer transitions) and two mutable flags that handlers
//! flip: [`EventFlags::PROPAGATION_STOPPED`] and [`EventFlags::DEFAULT_PREVENTED`].
//!
//! [`EventAliases`] maps synthetic event names onto the native type that
//! carries them, plus a condition deciding whether a given native event counts
//! for the alias. The default table treats `mouseenter` as a `mouseover` whose
//! related target lies outside the listening element (and `mouseleave` as the
//! equivalent `mouseout`).
//!
//! ```rust
//! use understory_dom::{Document, Element, Event, EventAliases};
//!
//! let mut doc = Document::new();
//! let outer = doc.insert(None, Element::new("div"));
//! let inner = doc.insert(Some(outer), Element::new("span"));
//!
//! let aliases = EventAliases::default();
//! let from_inside = Event::new("mouseover", outer).with_related_target(inner);
//! assert!(!aliases.matches_type(&doc, outer, "mouseenter", &from_inside));
//!
//! let from_outside = Event::new("mouseover", inner);
//! assert!(aliases.matches_type(&doc, outer, "mouseenter", &from_outside));
//! assert_eq!(aliases.base_of("mouseenter"), "mouseover");
//! ```

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use serde_json::Value;

use crate::tree::Document;
use crate::types::NodeId;

bitflags::bitflags! {
    /// Propagation and default-action state of an [`Event`].
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct EventFlags: u8 {
        /// The event walks from its target up through the ancestors.
        const BUBBLES             = 0b0000_0001;
        /// The default action may be prevented.
        const CANCELABLE          = 0b0000_0010;
        /// A handler stopped propagation.
        const PROPAGATION_STOPPED = 0b0000_0100;
        /// A handler prevented the default action.
        const DEFAULT_PREVENTED   = 0b0000_1000;
    }
}

impl Default for EventFlags {
    fn default() -> Self {
        Self::BUBBLES | Self::CANCELABLE
    }
}

/// A native event.
#[derive(Clone, Debug, PartialEq)]
pub struct Event {
    /// Event type, for example `click`.
    pub kind: String,
    /// The node the event was fired at.
    pub target: NodeId,
    /// The other node of a pointer transition, if any.
    pub related_target: Option<NodeId>,
    /// Free-form payload.
    pub detail: Value,
    /// Propagation and default-action state.
    pub flags: EventFlags,
}

impl Event {
    /// A bubbling, cancelable event of type `kind` fired at `target`.
    pub fn new(kind: &str, target: NodeId) -> Self {
        Self {
            kind: kind.to_string(),
            target,
            related_target: None,
            detail: Value::Null,
            flags: EventFlags::default(),
        }
    }

    /// A synthetic non-bubbling `click` used when code invokes a handler
    /// without a real event.
    pub fn mock(target: NodeId) -> Self {
        Self {
            flags: EventFlags::CANCELABLE,
            ..Self::new("click", target)
        }
    }

    /// Set the related target.
    pub fn with_related_target(mut self, related: NodeId) -> Self {
        self.related_target = Some(related);
        self
    }

    /// Set the payload.
    pub fn with_detail(mut self, detail: Value) -> Self {
        self.detail = detail;
        self
    }

    /// Replace the flags.
    pub fn with_flags(mut self, flags: EventFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Stop propagation to further nodes.
    pub fn stop_propagation(&mut self) {
        self.flags.insert(EventFlags::PROPAGATION_STOPPED);
    }

    /// Prevent the default action (ignored for non-cancelable events).
    pub fn prevent_default(&mut self) {
        if self.flags.contains(EventFlags::CANCELABLE) {
            self.flags.insert(EventFlags::DEFAULT_PREVENTED);
        }
    }

    /// Stop propagation and prevent the default action.
    pub fn stop(&mut self) {
        self.stop_propagation();
        self.prevent_default();
    }

    /// Whether the event bubbles.
    pub fn bubbles(&self) -> bool {
        self.flags.contains(EventFlags::BUBBLES)
    }

    /// Whether propagation was stopped.
    pub fn is_propagation_stopped(&self) -> bool {
        self.flags.contains(EventFlags::PROPAGATION_STOPPED)
    }

    /// Whether the default action was prevented.
    pub fn is_default_prevented(&self) -> bool {
        self.flags.contains(EventFlags::DEFAULT_PREVENTED)
    }
}

/// Nodes an event visits: the target, then its ancestors nearest first.
///
/// Non-bubbling events visit only their target.
pub fn propagation_path(doc: &Document, event: &Event) -> Vec<NodeId> {
    if !doc.is_alive(event.target) {
        return Vec::new();
    }
    let mut path = alloc::vec![event.target];
    if event.bubbles() {
        path.extend(doc.ancestors(event.target));
    }
    path
}

/// Decides whether a native event counts as an alias for `element`.
pub type AliasCondition = fn(&Document, NodeId, &Event) -> bool;

#[derive(Clone, Debug)]
struct Alias {
    base: String,
    condition: AliasCondition,
}

/// Table of synthetic event types layered over native ones.
#[derive(Clone, Debug)]
pub struct EventAliases {
    aliases: HashMap<String, Alias>,
}

/// The related target is absent or lies outside `element`.
fn related_outside(doc: &Document, element: NodeId, event: &Event) -> bool {
    match event.related_target {
        Some(related) => !doc.contains(element, related),
        None => true,
    }
}

impl Default for EventAliases {
    fn default() -> Self {
        let mut table = Self::empty();
        table.insert("mouseenter", "mouseover", related_outside);
        table.insert("mouseleave", "mouseout", related_outside);
        table
    }
}

impl EventAliases {
    /// A table with no aliases.
    pub fn empty() -> Self {
        Self {
            aliases: HashMap::new(),
        }
    }

    /// Register `alias` as `base` gated by `condition`, replacing any previous entry.
    pub fn insert(&mut self, alias: &str, base: &str, condition: AliasCondition) {
        self.aliases.insert(
            alias.to_string(),
            Alias {
                base: base.to_string(),
                condition,
            },
        );
    }

    /// The native type carrying `kind` (itself when not an alias).
    pub fn base_of<'a>(&'a self, kind: &'a str) -> &'a str {
        self.aliases.get(kind).map_or(kind, |a| a.base.as_str())
    }

    /// Returns true if `event`, observed on `element`, satisfies the declared type.
    pub fn matches_type(&self, doc: &Document, element: NodeId, declared: &str, event: &Event) -> bool {
        if declared == event.kind {
            return true;
        }
        match self.aliases.get(declared) {
            Some(alias) => alias.base == event.kind && (alias.condition)(doc, element, event),
            None => false,
        }
    }
}
