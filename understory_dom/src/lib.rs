// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=understory_dom --heading-base-level=0

//! Understory DOM: a small arena document for attribute-driven behavior.
//!
//! This crate models exactly the part of an HTML document that declarative
//! behavior attachment needs: a tree of elements with tag names, ordered
//! attributes, a class list, free-form properties and text, plus queries over
//! that tree and native events that walk it.
//!
//! It is not a parser or a renderer. Documents are built through the
//! [`Element`] builder and mutated through [`Document`] methods.
//!
//! ## API overview
//!
//! - [`Document`]: arena of elements with generational [`NodeId`] handles.
//!   [`Document::insert`], [`Document::remove`] (returns the removed subtree),
//!   [`Document::reparent`], [`Document::next_depth_first`] and
//!   [`Document::prev_depth_first`].
//! - Element data: [`Document::attr`], [`Document::data`],
//!   [`Document::has_class`], [`Document::property`], [`Document::text`] and
//!   their setters.
//! - Queries: [`Selector`], [`Document::query_all`], [`Document::query`],
//!   [`Document::matches`] and [`Document::targets`] (which understands `self`).
//!   Selectors support reverse combinators (`!`, `!>`, `!+`, `!~`) and may
//!   start with a combinator to select relative to a context element.
//! - Dynamic access: [`Document::get`] and [`Document::call`] read values and
//!   invoke named element methods with JSON arguments.
//! - Events: [`Event`] with [`EventFlags`], [`propagation_path`] and the
//!   [`EventAliases`] table (`mouseenter`/`mouseleave`).
//!
//! ## Example
//!
//! ```rust
//! use understory_dom::{Document, Element};
//!
//! let mut doc = Document::new();
//! let list = doc.insert(None, Element::new("ul").attr("data-behavior", "Sortable"));
//! let a = doc.insert(Some(list), Element::new("li").class("item"));
//! let b = doc.insert(Some(list), Element::new("li").class("item selected"));
//!
//! assert_eq!(doc.query_all(Some(list), "> li.item").unwrap(), vec![a, b]);
//! assert_eq!(doc.query(Some(a), "+ .selected").unwrap(), Some(b));
//! assert_eq!(doc.data(list, "behavior"), Some("Sortable"));
//! ```
//!
//! This crate is `no_std` and uses `alloc`.

#![no_std]

extern crate alloc;

mod event;
mod methods;
mod selector;
mod tree;
mod types;

pub use event::{AliasCondition, Event, EventAliases, EventFlags, propagation_path};
pub use selector::{Combinator, Selector};
pub use tree::Document;
pub use types::{DomError, Element, NodeId};
