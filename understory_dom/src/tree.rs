// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Core document implementation: structure, updates, element data.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use serde_json::Value;

use crate::types::{Element, NodeId, attribute, class_list, set_attribute};

/// An arena of elements arranged in one or more trees.
///
/// Nodes are addressed by generational [`NodeId`]s. Removing a node frees its
/// whole subtree; stale ids are rejected by every accessor rather than
/// aliasing whatever element reuses the slot.
///
/// ## Example
///
/// ```rust
/// use understory_dom::{Document, Element};
///
/// let mut doc = Document::new();
/// let body = doc.insert(None, Element::new("body"));
/// let link = doc.insert(Some(body), Element::new("a").attr("data-trigger", "Open"));
///
/// assert_eq!(doc.parent_of(link), Some(body));
/// assert_eq!(doc.attr(link, "data-trigger"), Some("Open"));
///
/// let removed = doc.remove(body);
/// assert_eq!(removed, vec![body, link]);
/// assert!(!doc.is_alive(link));
/// ```
#[derive(Clone, Default)]
pub struct Document {
    /// slots
    nodes: Vec<Option<Node>>,
    /// last generation per slot (persists across frees)
    generations: Vec<u32>,
    free_list: Vec<usize>,
}

impl core::fmt::Debug for Document {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let total = self.nodes.len();
        let alive = self.nodes.iter().filter(|n| n.is_some()).count();
        f.debug_struct("Document")
            .field("nodes_total", &total)
            .field("nodes_alive", &alive)
            .field("free_list", &self.free_list.len())
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Debug)]
struct Node {
    generation: u32,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    element: Element,
}

impl Document {
    /// Create an empty document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new element as the last child of `parent` (or as a root if `None`).
    pub fn insert(&mut self, parent: Option<NodeId>, element: Element) -> NodeId {
        let node = |generation| Node {
            generation,
            parent: None,
            children: Vec::new(),
            element,
        };
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            self.nodes[idx] = Some(node(generation));
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            (idx as u32, generation)
        } else {
            let generation = 1_u32;
            self.nodes.push(Some(node(generation)));
            self.generations.push(generation);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "NodeId uses 32-bit indices by design."
            )]
            ((self.nodes.len() - 1) as u32, generation)
        };
        let id = NodeId::new(idx, generation);
        if let Some(p) = parent
            && self.is_alive(p)
        {
            self.link_parent(id, p);
        }
        id
    }

    /// Remove a node and its subtree.
    ///
    /// Returns the removed ids in document (pre-order) order so callers can
    /// release any side tables keyed by them.
    pub fn remove(&mut self, id: NodeId) -> Vec<NodeId> {
        if !self.is_alive(id) {
            return Vec::new();
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        let removed = self.subtree(id);
        for &node in &removed {
            self.nodes[node.idx()] = None;
            self.free_list.push(node.idx());
        }
        removed
    }

    /// Move `id` under `new_parent` (or make it a root).
    ///
    /// Moving a node under its own descendant is refused.
    pub fn reparent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        if !self.is_alive(id) {
            return;
        }
        if let Some(p) = new_parent
            && (!self.is_alive(p) || self.contains(id, p))
        {
            return;
        }
        if let Some(parent) = self.node(id).parent {
            self.unlink_parent(id, parent);
        }
        if let Some(p) = new_parent {
            self.link_parent(id, p);
        }
    }

    /// Returns true if `id` refers to a live node.
    pub fn is_alive(&self, id: NodeId) -> bool {
        self.nodes
            .get(id.idx())
            .and_then(|n| n.as_ref())
            .map(|n| n.generation == id.1)
            .unwrap_or(false)
    }

    /// Returns the parent of a node if live, or `None` for roots or stale ids.
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.node_opt(id).and_then(|node| node.parent)
    }

    /// Get the children of a node, or an empty slice if the node is stale.
    pub fn children_of(&self, id: NodeId) -> &[NodeId] {
        self.node_opt(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// All live roots, in slot order.
    pub fn roots(&self) -> Vec<NodeId> {
        self.nodes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| {
                let node = slot.as_ref()?;
                #[allow(
                    clippy::cast_possible_truncation,
                    reason = "NodeId uses 32-bit indices by design."
                )]
                let id = NodeId::new(i as u32, node.generation);
                node.parent.is_none().then_some(id)
            })
            .collect()
    }

    /// The root of the tree containing `id`.
    pub fn root_of(&self, id: NodeId) -> Option<NodeId> {
        if !self.is_alive(id) {
            return None;
        }
        let mut node = id;
        while let Some(parent) = self.parent_of(node) {
            node = parent;
        }
        Some(node)
    }

    /// Ancestors of `id`, nearest first (excluding `id` itself).
    pub fn ancestors(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut node = id;
        while let Some(parent) = self.parent_of(node) {
            out.push(parent);
            node = parent;
        }
        out
    }

    /// Returns true if `node` is `ancestor` or lies inside its subtree.
    pub fn contains(&self, ancestor: NodeId, node: NodeId) -> bool {
        if !self.is_alive(ancestor) || !self.is_alive(node) {
            return false;
        }
        node == ancestor || self.ancestors(node).contains(&ancestor)
    }

    /// The subtree rooted at `id` in pre-order, including `id`.
    pub fn subtree(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        if !self.is_alive(id) {
            return out;
        }
        let mut stack = alloc::vec![id];
        while let Some(node) = stack.pop() {
            out.push(node);
            stack.extend(self.node(node).children.iter().rev().copied());
        }
        out
    }

    /// Get the next node in depth-first traversal order.
    ///
    /// Returns `None` if no next node exists or if the current node is stale.
    /// This is a standard tree traversal that does not wrap around.
    pub fn next_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(&first_child) = self.node(current).children.first() {
            return Some(first_child);
        }
        let mut node = current;
        while let Some(parent) = self.parent_of(node) {
            if let Some(next) = self.next_sibling(node) {
                return Some(next);
            }
            node = parent;
        }
        None
    }

    /// Get the previous node in reverse depth-first traversal order.
    pub fn prev_depth_first(&self, current: NodeId) -> Option<NodeId> {
        if !self.is_alive(current) {
            return None;
        }
        if let Some(mut node) = self.prev_sibling(current) {
            while let Some(&last) = self.node(node).children.last() {
                node = last;
            }
            return Some(node);
        }
        self.parent_of(current)
    }

    /// The sibling following `node` under the same parent.
    pub fn next_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children_of(self.parent_of(node)?);
        let pos = siblings.iter().position(|&id| id == node)?;
        siblings.get(pos + 1).copied()
    }

    /// The sibling preceding `node` under the same parent.
    pub fn prev_sibling(&self, node: NodeId) -> Option<NodeId> {
        let siblings = self.children_of(self.parent_of(node)?);
        let pos = siblings.iter().position(|&id| id == node)?;
        pos.checked_sub(1).and_then(|p| siblings.get(p).copied())
    }

    // --- element data ---

    /// Borrow the element data of a live node.
    pub fn element(&self, id: NodeId) -> Option<&Element> {
        self.node_opt(id).map(|n| &n.element)
    }

    /// Lowercased tag name of a live node.
    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    /// Read an attribute.
    pub fn attr(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id).and_then(|e| attribute(&e.attributes, name))
    }

    /// Returns true if the attribute is present (even when empty).
    pub fn has_attr(&self, id: NodeId, name: &str) -> bool {
        self.attr(id, name).is_some()
    }

    /// Set an attribute on a live node.
    pub fn set_attr(&mut self, id: NodeId, name: &str, value: &str) {
        if let Some(n) = self.node_opt_mut(id) {
            set_attribute(&mut n.element.attributes, name, value);
        }
    }

    /// Remove an attribute, returning its previous value.
    pub fn remove_attr(&mut self, id: NodeId, name: &str) -> Option<String> {
        let n = self.node_opt_mut(id)?;
        let pos = n
            .element
            .attributes
            .iter()
            .position(|(k, _)| k.eq_ignore_ascii_case(name))?;
        Some(n.element.attributes.remove(pos).1)
    }

    /// Read a `data-<name>` attribute; empty values read as absent.
    pub fn data(&self, id: NodeId, name: &str) -> Option<&str> {
        let mut key = String::from("data-");
        key.push_str(name);
        self.attr(id, &key).filter(|v| !v.is_empty())
    }

    /// Write a `data-<name>` attribute.
    pub fn set_data(&mut self, id: NodeId, name: &str, value: &str) {
        let mut key = String::from("data-");
        key.push_str(name);
        self.set_attr(id, &key, value);
    }

    /// Returns true if the element's class list contains `class`.
    pub fn has_class(&self, id: NodeId, class: &str) -> bool {
        self.attr(id, "class")
            .is_some_and(|v| class_list(v).contains(&class))
    }

    /// Add a class name.
    pub fn add_class(&mut self, id: NodeId, class: &str) {
        if !self.is_alive(id) || self.has_class(id, class) {
            return;
        }
        let mut value = self.attr(id, "class").unwrap_or("").to_string();
        if !value.trim().is_empty() {
            value.push(' ');
        }
        value.push_str(class);
        self.set_attr(id, "class", value.trim());
    }

    /// Remove a class name.
    pub fn remove_class(&mut self, id: NodeId, class: &str) {
        let Some(current) = self.attr(id, "class") else {
            return;
        };
        let kept: Vec<&str> = class_list(current)
            .into_iter()
            .filter(|c| *c != class)
            .collect();
        let joined = kept.join(" ");
        self.set_attr(id, "class", &joined);
    }

    /// Classes of the element, in attribute order.
    pub fn classes(&self, id: NodeId) -> Vec<String> {
        self.attr(id, "class")
            .map(|v| class_list(v).iter().map(|c| c.to_string()).collect())
            .unwrap_or_default()
    }

    /// Read a property.
    pub fn property(&self, id: NodeId, name: &str) -> Option<&Value> {
        self.element(id).and_then(|e| e.properties.get(name))
    }

    /// Set a property on a live node.
    pub fn set_property(&mut self, id: NodeId, name: &str, value: Value) {
        if let Some(n) = self.node_opt_mut(id) {
            n.element.properties.insert(name.to_string(), value);
        }
    }

    /// Remove a property, returning its previous value.
    pub fn remove_property(&mut self, id: NodeId, name: &str) -> Option<Value> {
        self.node_opt_mut(id)?.element.properties.remove(name)
    }

    /// Text content of the element itself (children are not concatenated).
    pub fn text(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.text.as_str())
    }

    /// Replace the text content.
    pub fn set_text(&mut self, id: NodeId, text: &str) {
        if let Some(n) = self.node_opt_mut(id) {
            n.element.text = text.to_string();
        }
    }

    // --- internals ---

    fn node(&self, id: NodeId) -> &Node {
        self.nodes[id.idx()].as_ref().expect("dangling NodeId")
    }

    fn node_mut(&mut self, id: NodeId) -> &mut Node {
        self.nodes[id.idx()].as_mut().expect("dangling NodeId")
    }

    fn node_opt(&self, id: NodeId) -> Option<&Node> {
        let n = self.nodes.get(id.idx())?.as_ref()?;
        (n.generation == id.1).then_some(n)
    }

    fn node_opt_mut(&mut self, id: NodeId) -> Option<&mut Node> {
        let n = self.nodes.get_mut(id.idx())?.as_mut()?;
        if n.generation != id.1 {
            return None;
        }
        Some(n)
    }

    fn link_parent(&mut self, id: NodeId, parent: NodeId) {
        self.node_mut(parent).children.push(id);
        self.node_mut(id).parent = Some(parent);
    }

    fn unlink_parent(&mut self, id: NodeId, parent: NodeId) {
        self.node_mut(parent).children.retain(|c| *c != id);
        self.node_mut(id).parent = None;
    }
}
