// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Declarative conditions over the state of nearby elements.
//!
//! A condition names its targets relative to a context element, what to read
//! from each target and the value to expect:
//!
//! ```text
//! { 'target': '.bar', 'method': 'hasClass', 'arguments': ['baz'], 'value': true }
//! { 'targets': '> li', 'property': 'checked', 'value': false }
//! { '.bar::hasClass': ['baz'] }
//! ```
//!
//! The last form is shorthand for `targets` + `method` + `arguments`. Several
//! shorthand entries in one object must all pass.

use std::rc::Rc;

use hashbrown::HashMap;
use serde_json::{Map, Value};
use understory_behavior::{Api, Error, Result};
use understory_dom::{Document, NodeId};

/// Which elements a condition inspects.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// The context element.
    SelfNode,
    /// The first element matching a selector relative to the context.
    One(String),
    /// Every element matching a selector relative to the context.
    All(String),
}

/// What a condition reads from each target.
#[derive(Clone, Debug, PartialEq)]
pub enum Check {
    /// Nothing; the condition passes once targets resolve.
    Always,
    /// A value read with [`Document::get`].
    Property(String),
    /// The result of an element method.
    Method {
        /// Method name, for example `hasClass`.
        name: String,
        /// JSON arguments.
        args: Vec<Value>,
    },
}

/// One normalized condition.
#[derive(Clone, Debug, PartialEq)]
pub struct Conditional {
    /// The elements to inspect.
    pub target: Target,
    /// What to read from them.
    pub check: Check,
    /// The expected value; `true` when not given.
    pub value: Value,
}

impl Conditional {
    /// A condition calling `method` on the context element.
    pub fn method(name: &str, args: Vec<Value>) -> Self {
        Self {
            target: Target::SelfNode,
            check: Check::Method {
                name: name.to_string(),
                args,
            },
            value: Value::Bool(true),
        }
    }

    /// A condition reading `property` from the context element.
    pub fn property(name: &str, value: Value) -> Self {
        Self {
            target: Target::SelfNode,
            check: Check::Property(name.to_string()),
            value,
        }
    }

    /// Inspect the first element matching `selector` instead.
    pub fn on(mut self, selector: &str) -> Self {
        self.target = single(selector);
        self
    }

    /// Inspect every element matching `selector` instead.
    pub fn on_all(mut self, selector: &str) -> Self {
        self.target = multiple(selector);
        self
    }

    /// Expect `value` instead of `true`.
    pub fn expect(mut self, value: Value) -> Self {
        self.value = value;
        self
    }

    /// Normalize a condition object; shorthand objects yield one condition per entry.
    pub fn parse(value: &Value) -> Result<Vec<Self>> {
        let Value::Object(map) = value else {
            return Err(Error::TypeMismatch {
                key: "conditional".to_string(),
                expected: "object".to_string(),
                value: value.to_string(),
            });
        };
        if ["target", "targets", "property", "method"]
            .iter()
            .any(|k| map.contains_key(*k))
        {
            return Ok(vec![Self::parse_long(map)]);
        }
        let shorthand: Vec<Self> = map
            .iter()
            .filter_map(|(key, args)| {
                let (selector, method) = key.split_once("::")?;
                Some(Self {
                    target: multiple(selector),
                    check: Check::Method {
                        name: method.to_string(),
                        args: arguments(Some(args)),
                    },
                    value: map.get("value").cloned().unwrap_or(Value::Bool(true)),
                })
            })
            .collect();
        if shorthand.is_empty() {
            return Ok(vec![Self {
                target: Target::SelfNode,
                check: Check::Always,
                value: Value::Bool(true),
            }]);
        }
        Ok(shorthand)
    }

    fn parse_long(map: &Map<String, Value>) -> Self {
        let target = match (
            map.get("targets").and_then(Value::as_str),
            map.get("target").and_then(Value::as_str),
        ) {
            (Some(all), _) => multiple(all),
            (None, Some(one)) => single(one),
            (None, None) => Target::SelfNode,
        };
        let check = match (
            map.get("property").and_then(Value::as_str),
            map.get("method").and_then(Value::as_str),
        ) {
            (Some(property), _) => Check::Property(property.to_string()),
            (None, Some(method)) => Check::Method {
                name: method.to_string(),
                args: arguments(map.get("arguments")),
            },
            (None, None) => Check::Always,
        };
        Self {
            target,
            check,
            value: map.get("value").cloned().unwrap_or(Value::Bool(true)),
        }
    }
}

fn single(selector: &str) -> Target {
    match selector.trim() {
        "" | "self" => Target::SelfNode,
        s => Target::One(s.to_string()),
    }
}

fn multiple(selector: &str) -> Target {
    match selector.trim() {
        "" | "self" => Target::SelfNode,
        s => Target::All(s.to_string()),
    }
}

fn arguments(args: Option<&Value>) -> Vec<Value> {
    match args {
        Some(Value::Array(items)) => items.clone(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => vec![other.clone()],
    }
}

/// `if` / `unless` pair gating a trigger, a composite block or a switch group.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Gate {
    /// All of these must pass.
    pub when: Vec<Conditional>,
    /// If all of these pass the gate is closed.
    pub unless: Vec<Conditional>,
}

impl Gate {
    /// Read `if` and `unless` from a configuration object.
    pub fn from_map(map: &Map<String, Value>) -> Result<Self> {
        Ok(Self {
            when: parse_opt(map.get("if"))?,
            unless: parse_opt(map.get("unless"))?,
        })
    }

    /// Read `if` and `unless` through a configuration reader.
    pub fn from_api(doc: &Document, api: &mut Api) -> Result<Self> {
        Ok(Self {
            when: parse_opt(api.get(doc, "if")?.as_ref())?,
            unless: parse_opt(api.get(doc, "unless")?.as_ref())?,
        })
    }

    /// Returns true if neither side is set.
    pub fn is_empty(&self) -> bool {
        self.when.is_empty() && self.unless.is_empty()
    }

    /// Evaluate the gate against `context`.
    pub fn passes(&self, evaluator: &Evaluator, doc: &Document, context: NodeId) -> Result<bool> {
        if !evaluator.all(doc, context, &self.when)? {
            return Ok(false);
        }
        if !self.unless.is_empty() && evaluator.all(doc, context, &self.unless)? {
            return Ok(false);
        }
        Ok(true)
    }
}

fn parse_opt(value: Option<&Value>) -> Result<Vec<Conditional>> {
    match value {
        None | Some(Value::Null) => Ok(Vec::new()),
        // Attribute fallbacks arrive as strings.
        Some(Value::String(text)) => match understory_behavior::decode(text) {
            Some(decoded) => Conditional::parse(&decoded),
            None => Err(Error::Parse {
                attribute: "conditional".to_string(),
                value: text.clone(),
                message: "not a condition object".to_string(),
            }),
        },
        Some(other) => Conditional::parse(other),
    }
}

/// A host-provided element method usable in conditions.
pub type ElementMethod = dyn Fn(&Document, NodeId, &[Value]) -> Result<Value>;

/// Evaluates conditions; knows the built-in element methods plus any added ones.
#[derive(Default)]
pub struct Evaluator {
    methods: HashMap<String, Rc<ElementMethod>>,
}

impl core::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let mut names: Vec<&str> = self.methods.keys().map(String::as_str).collect();
        names.sort_unstable();
        f.debug_struct("Evaluator").field("methods", &names).finish()
    }
}

impl Evaluator {
    /// An evaluator knowing only the built-in methods.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a custom method; custom methods shadow built-in ones.
    pub fn add_method(
        &mut self,
        name: &str,
        method: impl Fn(&Document, NodeId, &[Value]) -> Result<Value> + 'static,
    ) {
        self.methods.insert(name.to_string(), Rc::new(method));
    }

    /// The elements `target` names relative to `context`.
    ///
    /// Fails with [`Error::Resolution`] when a selector matches nothing.
    pub fn resolve(&self, doc: &Document, context: NodeId, target: &Target) -> Result<Vec<NodeId>> {
        let (selector, found): (&String, Vec<NodeId>) = match target {
            Target::SelfNode => return Ok(vec![context]),
            Target::One(selector) => (selector, doc.query(Some(context), selector)?.into_iter().collect()),
            Target::All(selector) => (selector, doc.targets(context, selector)?),
        };
        if found.is_empty() {
            return Err(Error::Resolution {
                selector: selector.clone(),
            });
        }
        Ok(found)
    }

    /// Evaluate one condition: true if any target yields the expected value.
    pub fn evaluate(&self, doc: &Document, context: NodeId, conditional: &Conditional) -> Result<bool> {
        for target in self.resolve(doc, context, &conditional.target)? {
            let actual = match &conditional.check {
                Check::Always => return Ok(true),
                Check::Property(name) => doc.get(target, name),
                Check::Method { name, args } => self.call(doc, target, name, args)?,
            };
            if actual == conditional.value {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Returns true if every condition passes.
    pub fn all(&self, doc: &Document, context: NodeId, conditionals: &[Conditional]) -> Result<bool> {
        for conditional in conditionals {
            if !self.evaluate(doc, context, conditional)? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn call(&self, doc: &Document, target: NodeId, name: &str, args: &[Value]) -> Result<Value> {
        match self.methods.get(name) {
            Some(method) => method(doc, target, args),
            None => Ok(doc.call(target, name, args)?),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use understory_dom::Element;

    struct Fixture {
        doc: Document,
        link: NodeId,
        bar: NodeId,
    }

    fn fixture() -> Fixture {
        let mut doc = Document::new();
        let root = doc.insert(None, Element::new("div"));
        let link = doc.insert(Some(root), Element::new("a").class("foo"));
        let bar = doc.insert(Some(root), Element::new("span").class("bar baz").attr("title", "hi"));
        Fixture { doc, link, bar }
    }

    fn has_baz() -> Conditional {
        Conditional::method("hasClass", vec![json!("baz")]).on("~ .bar")
    }

    #[test]
    fn method_condition_tracks_element_state() {
        let mut f = fixture();
        let evaluator = Evaluator::new();
        assert!(evaluator.evaluate(&f.doc, f.link, &has_baz()).unwrap());
        f.doc.remove_class(f.bar, "baz");
        assert!(!evaluator.evaluate(&f.doc, f.link, &has_baz()).unwrap());
    }

    #[test]
    fn zero_targets_is_an_error() {
        let f = fixture();
        let evaluator = Evaluator::new();
        let missing = Conditional::method("hasClass", vec![json!("x")]).on_all(".nothing");
        assert_eq!(
            evaluator.evaluate(&f.doc, f.link, &missing),
            Err(Error::Resolution {
                selector: ".nothing".into()
            })
        );
    }

    #[test]
    fn property_and_expected_value() {
        let f = fixture();
        let evaluator = Evaluator::new();
        let title = Conditional::property("title", json!("hi")).on("~ .bar");
        assert!(evaluator.evaluate(&f.doc, f.link, &title).unwrap());
        let not_foo = Conditional::method("hasClass", vec![json!("foo")]).expect(json!(false));
        assert!(!evaluator.evaluate(&f.doc, f.link, &not_foo).unwrap());
    }

    #[test]
    fn shorthand_normalizes() {
        let parsed = Conditional::parse(&json!({ ".bar::hasClass": ["baz"] })).unwrap();
        assert_eq!(
            parsed,
            [Conditional {
                target: Target::All(".bar".into()),
                check: Check::Method {
                    name: "hasClass".into(),
                    args: vec![json!("baz")],
                },
                value: json!(true),
            }]
        );
        let self_form = Conditional::parse(&json!({ "self::hasClass": "foo", "value": false })).unwrap();
        assert_eq!(self_form[0].target, Target::SelfNode);
        assert_eq!(self_form[0].value, json!(false));
        let long = Conditional::parse(&json!({ "target": ".x", "targets": ".y", "property": "id" })).unwrap();
        assert_eq!(long[0].target, Target::All(".y".into()), "targets beats target");
        assert!(Conditional::parse(&json!("nope")).is_err());
    }

    #[test]
    fn gates_combine_if_and_unless() {
        let f = fixture();
        let evaluator = Evaluator::new();
        let mut options = Map::new();
        options.insert("if".into(), json!({ "self::hasClass": ["foo"] }));
        let gate = Gate::from_map(&options).unwrap();
        assert!(gate.passes(&evaluator, &f.doc, f.link).unwrap());
        assert!(!gate.passes(&evaluator, &f.doc, f.bar).unwrap());

        let mut options = Map::new();
        options.insert("unless".into(), json!({ "self::hasClass": ["foo"] }));
        let gate = Gate::from_map(&options).unwrap();
        assert!(!gate.passes(&evaluator, &f.doc, f.link).unwrap());
        assert!(gate.passes(&evaluator, &f.doc, f.bar).unwrap());
        assert!(Gate::default().passes(&evaluator, &f.doc, f.bar).unwrap());
    }

    #[test]
    fn custom_methods_shadow_builtins() {
        let f = fixture();
        let mut evaluator = Evaluator::new();
        evaluator.add_method("isLink", |doc, el, _| Ok(json!(doc.tag(el) == Some("a"))));
        let cond = Conditional::method("isLink", Vec::new());
        assert!(evaluator.evaluate(&f.doc, f.link, &cond).unwrap());
        assert!(!evaluator.evaluate(&f.doc, f.bar, &cond).unwrap());
        let unknown = Conditional::method("frobnicate", Vec::new());
        assert!(matches!(
            evaluator.evaluate(&f.doc, f.link, &unknown),
            Err(Error::Dom(_))
        ));
    }
}
