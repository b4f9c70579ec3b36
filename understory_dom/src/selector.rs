// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! CSS-style selectors with relative and reverse combinators.
//!
//! Supported syntax:
//! - compounds: `tag`, `*`, `#id`, `.class`, `[attr]`, `[attr=v]`, `[attr!=v]`,
//!   `[attr~=v]`, `[attr^=v]`, `[attr$=v]`, `[attr*=v]`, `[attr|=v]`
//! - combinators: descendant (` `), `>`, `+`, `~` and their reverses
//!   `!` (ancestor), `!>` (parent), `!+` (previous sibling), `!~` (any previous sibling)
//! - comma-separated lists
//!
//! A selector may begin with a combinator, in which case the first compound is
//! related to the context element of the query (`"> li"` selects the context's
//! `li` children, `"! form"` selects its `form` ancestors).

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use smallvec::SmallVec;

use crate::tree::Document;
use crate::types::{DomError, NodeId, class_list};

/// Relationship between two adjacent compounds of a selector.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Combinator {
    /// ` `: right side is a descendant of the left.
    Descendant,
    /// `>`: right side is a child of the left.
    Child,
    /// `+`: right side immediately follows the left.
    Adjacent,
    /// `~`: right side follows the left under the same parent.
    Sibling,
    /// `!`: right side is an ancestor of the left.
    Ancestor,
    /// `!>`: right side is the parent of the left.
    Parent,
    /// `!+`: right side immediately precedes the left.
    PrevAdjacent,
    /// `!~`: right side precedes the left under the same parent.
    PrevSibling,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum AttrOp {
    Equals,
    NotEquals,
    Includes,
    Prefix,
    Suffix,
    Substring,
    DashMatch,
}

#[derive(Clone, Debug)]
struct AttrTest {
    name: String,
    op: Option<(AttrOp, String)>,
}

#[derive(Clone, Debug, Default)]
struct Compound {
    universal: bool,
    tag: Option<String>,
    id: Option<String>,
    classes: SmallVec<[String; 2]>,
    attrs: SmallVec<[AttrTest; 2]>,
}

#[derive(Clone, Debug)]
struct Complex {
    /// `(combinator leading into the compound, compound)`; the first
    /// combinator relates the first compound to the query context.
    steps: Vec<(Combinator, Compound)>,
    /// Whether the selector started with an explicit combinator.
    relative: bool,
}

/// A parsed selector list.
///
/// ## Example
///
/// ```rust
/// use understory_dom::{Document, Element, Selector};
///
/// let mut doc = Document::new();
/// let form = doc.insert(None, Element::new("form").id("login"));
/// let input = doc.insert(Some(form), Element::new("input").attr("name", "user"));
///
/// let sel = Selector::parse("form#login > input[name=user]").unwrap();
/// assert!(sel.matches(&doc, input, None));
///
/// // Reverse combinator, relative to a context element.
/// assert_eq!(doc.query_all(Some(input), "! form").unwrap(), vec![form]);
/// ```
#[derive(Clone, Debug)]
pub struct Selector {
    source: String,
    groups: Vec<Complex>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let mut parser = Parser {
            source,
            chars: source.char_indices().collect(),
            pos: 0,
        };
        let mut groups = Vec::new();
        loop {
            groups.push(parser.complex()?);
            parser.skip_ws();
            match parser.peek() {
                None => break,
                Some(',') => parser.pos += 1,
                Some(c) => return Err(parser.error(&alloc::format!("unexpected `{c}`"))),
            }
        }
        Ok(Self {
            source: source.trim().to_string(),
            groups,
        })
    }

    /// The trimmed selector text.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Returns true if `node` is selected, optionally relative to `context`.
    ///
    /// Without a context, leading combinators are ignored and the first
    /// compound may match anywhere in the document.
    pub fn matches(&self, doc: &Document, node: NodeId, context: Option<NodeId>) -> bool {
        doc.is_alive(node)
            && self
                .groups
                .iter()
                .any(|g| g.matches_at(doc, node, g.steps.len() - 1, context))
    }
}

impl Complex {
    fn matches_at(&self, doc: &Document, node: NodeId, step: usize, context: Option<NodeId>) -> bool {
        let (combinator, compound) = &self.steps[step];
        if !compound.matches(doc, node) {
            return false;
        }
        if step == 0 {
            return match context {
                Some(ctx) => related(doc, ctx, *combinator, node),
                None => true,
            };
        }
        candidates(doc, *combinator, node)
            .into_iter()
            .any(|left| self.matches_at(doc, left, step - 1, context))
    }
}

/// Returns true if `right` stands in `combinator` relation to `left`.
fn related(doc: &Document, left: NodeId, combinator: Combinator, right: NodeId) -> bool {
    match combinator {
        Combinator::Descendant => left != right && doc.contains(left, right),
        Combinator::Child => doc.parent_of(right) == Some(left),
        Combinator::Adjacent => doc.next_sibling(left) == Some(right),
        Combinator::Sibling => following(doc, left).contains(&right),
        Combinator::Ancestor => left != right && doc.contains(right, left),
        Combinator::Parent => doc.parent_of(left) == Some(right),
        Combinator::PrevAdjacent => doc.prev_sibling(left) == Some(right),
        Combinator::PrevSibling => preceding(doc, left).contains(&right),
    }
}

/// Nodes `left` such that `right` stands in `combinator` relation to `left`.
fn candidates(doc: &Document, combinator: Combinator, right: NodeId) -> Vec<NodeId> {
    match combinator {
        Combinator::Descendant => doc.ancestors(right),
        Combinator::Child => doc.parent_of(right).into_iter().collect(),
        Combinator::Adjacent => doc.prev_sibling(right).into_iter().collect(),
        Combinator::Sibling => preceding(doc, right),
        Combinator::Ancestor => doc.subtree(right).into_iter().skip(1).collect(),
        Combinator::Parent => doc.children_of(right).to_vec(),
        Combinator::PrevAdjacent => doc.next_sibling(right).into_iter().collect(),
        Combinator::PrevSibling => following(doc, right),
    }
}

fn preceding(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = doc.parent_of(node) else {
        return Vec::new();
    };
    doc.children_of(parent)
        .iter()
        .copied()
        .take_while(|&id| id != node)
        .collect()
}

fn following(doc: &Document, node: NodeId) -> Vec<NodeId> {
    let Some(parent) = doc.parent_of(node) else {
        return Vec::new();
    };
    doc.children_of(parent)
        .iter()
        .copied()
        .skip_while(|&id| id != node)
        .skip(1)
        .collect()
}

impl Compound {
    fn is_empty(&self) -> bool {
        !self.universal
            && self.tag.is_none()
            && self.id.is_none()
            && self.classes.is_empty()
            && self.attrs.is_empty()
    }

    fn matches(&self, doc: &Document, node: NodeId) -> bool {
        if let Some(tag) = &self.tag
            && doc.tag(node) != Some(tag.as_str())
        {
            return false;
        }
        if let Some(id) = &self.id
            && doc.attr(node, "id") != Some(id.as_str())
        {
            return false;
        }
        if !self.classes.iter().all(|c| doc.has_class(node, c)) {
            return false;
        }
        self.attrs.iter().all(|test| {
            let value = doc.attr(node, &test.name);
            let Some((op, expected)) = &test.op else {
                return value.is_some();
            };
            let expected = expected.as_str();
            match (op, value) {
                (AttrOp::NotEquals, value) => value != Some(expected),
                (_, None) => false,
                (AttrOp::Equals, Some(value)) => value == expected,
                (AttrOp::Includes, Some(value)) => class_list(value).contains(&expected),
                (AttrOp::Prefix, Some(value)) => !expected.is_empty() && value.starts_with(expected),
                (AttrOp::Suffix, Some(value)) => !expected.is_empty() && value.ends_with(expected),
                (AttrOp::Substring, Some(value)) => !expected.is_empty() && value.contains(expected),
                (AttrOp::DashMatch, Some(value)) => {
                    value == expected
                        || value
                            .strip_prefix(expected)
                            .is_some_and(|rest| rest.starts_with('-'))
                }
            }
        })
    }
}

struct Parser<'a> {
    source: &'a str,
    chars: Vec<(usize, char)>,
    pos: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).map(|(_, c)| *c)
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|(_, c)| *c)
    }

    fn skip_ws(&mut self) -> bool {
        let start = self.pos;
        while self.peek().is_some_and(char::is_whitespace) {
            self.pos += 1;
        }
        self.pos != start
    }

    fn error(&self, message: &str) -> DomError {
        DomError::Selector {
            selector: self.source.to_string(),
            message: message.to_string(),
        }
    }

    /// An explicit combinator symbol at the cursor, consumed if present.
    fn symbol(&mut self) -> Option<Combinator> {
        let combinator = match (self.peek()?, self.peek_at(1)) {
            ('!', Some('>')) => (Combinator::Parent, 2),
            ('!', Some('+')) => (Combinator::PrevAdjacent, 2),
            ('!', Some('~')) => (Combinator::PrevSibling, 2),
            ('!', _) => (Combinator::Ancestor, 1),
            ('>', _) => (Combinator::Child, 1),
            ('+', _) => (Combinator::Adjacent, 1),
            ('~', Some('=')) => return None,
            ('~', _) => (Combinator::Sibling, 1),
            _ => return None,
        };
        self.pos += combinator.1;
        Some(combinator.0)
    }

    fn complex(&mut self) -> Result<Complex, DomError> {
        self.skip_ws();
        let mut relative = false;
        let mut combinator = Combinator::Descendant;
        if let Some(explicit) = self.symbol() {
            relative = true;
            combinator = explicit;
            self.skip_ws();
        }
        let mut steps = Vec::new();
        loop {
            let compound = self.compound()?;
            if compound.is_empty() {
                return Err(self.error("expected a selector"));
            }
            steps.push((combinator, compound));
            let spaced = self.skip_ws();
            match self.symbol() {
                Some(explicit) => {
                    combinator = explicit;
                    self.skip_ws();
                }
                None if spaced && !matches!(self.peek(), None | Some(',')) => {
                    combinator = Combinator::Descendant;
                }
                None => break,
            }
        }
        Ok(Complex { steps, relative })
    }

    fn compound(&mut self) -> Result<Compound, DomError> {
        let mut compound = Compound::default();
        if self.peek() == Some('*') {
            self.pos += 1;
            compound.universal = true;
        } else if let Some(tag) = self.ident() {
            compound.tag = Some(tag.to_ascii_lowercase());
        }
        loop {
            match self.peek() {
                Some('#') => {
                    self.pos += 1;
                    let id = self.ident().ok_or_else(|| self.error("expected an id after `#`"))?;
                    compound.id = Some(id);
                }
                Some('.') => {
                    self.pos += 1;
                    let class = self
                        .ident()
                        .ok_or_else(|| self.error("expected a class name after `.`"))?;
                    compound.classes.push(class);
                }
                Some('[') => {
                    self.pos += 1;
                    compound.attrs.push(self.attribute()?);
                }
                Some(':') => return Err(self.error("pseudo-classes are not supported")),
                _ => break,
            }
        }
        Ok(compound)
    }

    fn attribute(&mut self) -> Result<AttrTest, DomError> {
        self.skip_ws();
        let name = self
            .ident()
            .ok_or_else(|| self.error("expected an attribute name"))?
            .to_ascii_lowercase();
        self.skip_ws();
        let op = match (self.peek(), self.peek_at(1)) {
            (Some(']'), _) => {
                self.pos += 1;
                return Ok(AttrTest { name, op: None });
            }
            (Some('='), _) => Some((AttrOp::Equals, 1)),
            (Some('!'), Some('=')) => Some((AttrOp::NotEquals, 2)),
            (Some('~'), Some('=')) => Some((AttrOp::Includes, 2)),
            (Some('^'), Some('=')) => Some((AttrOp::Prefix, 2)),
            (Some('$'), Some('=')) => Some((AttrOp::Suffix, 2)),
            (Some('*'), Some('=')) => Some((AttrOp::Substring, 2)),
            (Some('|'), Some('=')) => Some((AttrOp::DashMatch, 2)),
            _ => None,
        };
        let Some((op, width)) = op else {
            return Err(self.error("expected an attribute operator or `]`"));
        };
        self.pos += width;
        self.skip_ws();
        let value = match self.peek() {
            Some(quote @ ('"' | '\'')) => {
                self.pos += 1;
                let mut value = String::new();
                loop {
                    match self.peek() {
                        None => return Err(self.error("unterminated string")),
                        Some('\\') => {
                            self.pos += 1;
                            if let Some(c) = self.peek() {
                                value.push(c);
                                self.pos += 1;
                            }
                        }
                        Some(c) if c == quote => {
                            self.pos += 1;
                            break;
                        }
                        Some(c) => {
                            value.push(c);
                            self.pos += 1;
                        }
                    }
                }
                value
            }
            _ => self.ident().unwrap_or_default(),
        };
        self.skip_ws();
        if self.peek() != Some(']') {
            return Err(self.error("expected `]`"));
        }
        self.pos += 1;
        Ok(AttrTest {
            name,
            op: Some((op, value)),
        })
    }

    fn ident(&mut self) -> Option<String> {
        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_alphanumeric() || c == '-' || c == '_')
        {
            self.pos += 1;
        }
        (self.pos != start).then(|| {
            self.chars[start..self.pos]
                .iter()
                .map(|(_, c)| *c)
                .collect()
        })
    }
}

impl Document {
    /// All live nodes in document order, roots in slot order.
    pub fn all(&self) -> Vec<NodeId> {
        self.roots()
            .into_iter()
            .flat_map(|root| self.subtree(root))
            .collect()
    }

    /// Select all matching nodes in document order.
    ///
    /// With a context, the selector is evaluated relative to it: a leading
    /// combinator (explicit or the implied descendant one) relates the first
    /// compound to the context node.
    pub fn query_all(&self, context: Option<NodeId>, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let selector = Selector::parse(selector)?;
        Ok(self.select_all(context, &selector))
    }

    /// Select the first matching node in document order.
    pub fn query(&self, context: Option<NodeId>, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.query_all(context, selector)?.into_iter().next())
    }

    /// [`Document::query_all`] with a pre-parsed selector.
    pub fn select_all(&self, context: Option<NodeId>, selector: &Selector) -> Vec<NodeId> {
        let pool = match context {
            Some(ctx) => match self.root_of(ctx) {
                Some(root) => self.subtree(root),
                None => return Vec::new(),
            },
            None => self.all(),
        };
        pool.into_iter()
            .filter(|&node| selector.matches(self, node, context))
            .collect()
    }

    /// Returns true if `node` matches `selector` anywhere in the document.
    pub fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
        Ok(Selector::parse(selector)?.matches(self, node, None))
    }

    /// Resolve a target expression relative to `context`.
    ///
    /// The literal `self` resolves to the context itself; anything else is a
    /// selector evaluated relative to it.
    pub fn targets(&self, context: NodeId, selector: &str) -> Result<Vec<NodeId>, DomError> {
        if selector.trim() == "self" {
            return Ok(if self.is_alive(context) {
                alloc::vec![context]
            } else {
                Vec::new()
            });
        }
        self.query_all(Some(context), selector)
    }
}

impl Selector {
    /// Returns true if any group begins with an explicit combinator.
    pub fn is_relative(&self) -> bool {
        self.groups.iter().any(|g| g.relative)
    }
}
