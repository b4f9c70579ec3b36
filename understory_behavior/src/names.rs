// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Name lists and key spelling.
//!
//! Elements declare behaviors and triggers as space- or comma-separated name
//! lists in a `data-*` attribute. Option keys are looked up camel-cased and
//! read from attributes hyphenated.

use understory_dom::{Document, NodeId};

/// Split a declared name list on whitespace and commas.
pub fn split_names(list: &str) -> Vec<String> {
    list.split(|c: char| c == ',' || c.is_whitespace())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect()
}

/// `foo-bar-baz` to `fooBarBaz`; a hyphen before a digit is kept.
pub fn camel_case(key: &str) -> String {
    let mut out = String::with_capacity(key.len());
    let mut chars = key.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '-'
            && let Some(&next) = chars.peek()
            && !next.is_ascii_digit()
        {
            out.extend(next.to_uppercase());
            chars.next();
        } else {
            out.push(c);
        }
    }
    out
}

/// `fooBarBaz` to `foo-bar-baz`.
pub fn hyphenate(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for c in key.chars() {
        if c.is_ascii_uppercase() {
            out.push('-');
            out.push(c.to_ascii_lowercase());
        } else {
            out.push(c);
        }
    }
    out
}

/// Attribute prefix for a filter or trigger name: lowercased, dots become
/// hyphens and anything outside `[a-z0-9-]` is dropped.
pub fn normalize_prefix(name: &str) -> String {
    name.chars()
        .map(|c| if c == '.' { '-' } else { c.to_ascii_lowercase() })
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Names declared in `data-<list>` on `element`.
pub fn names(doc: &Document, element: NodeId, list: &str) -> Vec<String> {
    doc.data(element, list).map(split_names).unwrap_or_default()
}

/// Returns true if `data-<list>` on `element` declares `name`.
pub fn has_name(doc: &Document, element: NodeId, list: &str, name: &str) -> bool {
    names(doc, element, list).iter().any(|n| n == name)
}

/// Append `name` to `data-<list>` unless already declared.
pub fn add_name(doc: &mut Document, element: NodeId, list: &str, name: &str) {
    let mut current = names(doc, element, list);
    if !current.iter().any(|n| n == name) {
        current.push(name.to_string());
    }
    doc.set_data(element, list, &current.join(" "));
}

/// Remove `name` from `data-<list>`.
pub fn remove_name(doc: &mut Document, element: NodeId, list: &str, name: &str) {
    let current: Vec<String> = names(doc, element, list)
        .into_iter()
        .filter(|n| n != name)
        .collect();
    doc.set_data(element, list, &current.join(" "));
}
