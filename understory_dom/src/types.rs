// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Public types for the document: node identifiers, element data, and errors.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use hashbrown::HashMap;
use serde_json::Value;
use smallvec::SmallVec;

/// Identifier for a node in the document (generational).
///
/// A removed node's slot is reused with a bumped generation, so an id that
/// outlives its element never aliases a newer one.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32, pub(crate) u32);

impl NodeId {
    pub(crate) const fn new(idx: u32, generation: u32) -> Self {
        Self(idx, generation)
    }

    pub(crate) const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Local data for one element.
///
/// Attribute names are stored lowercased (HTML attribute names are
/// case-insensitive); insertion order is preserved.
#[derive(Clone, Debug, Default)]
pub struct Element {
    /// Lowercased tag name.
    pub tag: String,
    /// Ordered `(name, value)` attribute pairs.
    pub attributes: Vec<(String, String)>,
    /// Free-form element properties (for example `value` or `checked`).
    pub properties: HashMap<String, Value>,
    /// Text content.
    pub text: String,
}

impl Element {
    /// Create an element with the given tag name.
    pub fn new(tag: &str) -> Self {
        Self {
            tag: tag.to_ascii_lowercase(),
            ..Self::default()
        }
    }

    /// Set an attribute, replacing any previous value.
    pub fn attr(mut self, name: &str, value: &str) -> Self {
        set_attribute(&mut self.attributes, name, value);
        self
    }

    /// Add a class name to the `class` attribute.
    pub fn class(mut self, class: &str) -> Self {
        let joined = {
            let mut classes = class_list(attribute(&self.attributes, "class").unwrap_or(""));
            if !classes.contains(&class) {
                classes.push(class);
            }
            classes.join(" ")
        };
        set_attribute(&mut self.attributes, "class", &joined);
        self
    }

    /// Set the `id` attribute.
    pub fn id(self, id: &str) -> Self {
        self.attr("id", id)
    }

    /// Set a property.
    pub fn property(mut self, name: &str, value: Value) -> Self {
        self.properties.insert(name.to_string(), value);
        self
    }

    /// Set the text content.
    pub fn text(mut self, text: &str) -> Self {
        self.text = text.to_string();
        self
    }
}

pub(crate) fn attribute<'a>(attrs: &'a [(String, String)], name: &str) -> Option<&'a str> {
    attrs
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, v)| v.as_str())
}

pub(crate) fn set_attribute(attrs: &mut Vec<(String, String)>, name: &str, value: &str) {
    let name = name.to_ascii_lowercase();
    if let Some(slot) = attrs.iter_mut().find(|(n, _)| *n == name) {
        slot.1 = value.to_string();
    } else {
        attrs.push((name, value.to_string()));
    }
}

pub(crate) fn class_list(value: &str) -> SmallVec<[&str; 4]> {
    value.split_ascii_whitespace().collect()
}

/// Errors produced by document queries and element method calls.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum DomError {
    /// The selector could not be parsed.
    #[error("invalid selector `{selector}`: {message}")]
    Selector {
        /// The offending selector text.
        selector: String,
        /// What went wrong.
        message: String,
    },
    /// The element method is not known.
    #[error("element has no method named `{name}`")]
    UnknownMethod {
        /// The requested method name.
        name: String,
    },
    /// The element method was called with unusable arguments.
    #[error("method `{name}` expects {expected}")]
    BadArguments {
        /// The method name.
        name: String,
        /// Description of the expected arguments.
        expected: &'static str,
    },
    /// The node identifier is stale.
    #[error("node {0:?} is not alive")]
    Stale(NodeId),
}
