// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The composite `multi`, `first` and `any` forms.
//!
//! Each reads a list of entries naming a selector and a trigger, for example
//! `'.panel::open'` or `{ '.panel::open': { 'speed': 2 } }`, and runs the
//! trigger on every element the selector resolves to relative to the
//! declaring element. An object's value seeds the invocation's defaults.
//!
//! ```text
//! <a data-trigger="first" data-first-switches="[
//!     { 'if': { 'self::hasClass': ['open'] }, 'triggers': ['.panel::close'] },
//!     { 'triggers': ['.panel::open'] }
//! ]">
//! ```

use serde_json::{Map, Value};
use understory_behavior::{Api, Error, Result, ValueType};
use understory_dom::{Document, Event, NodeId};

use crate::conditional::Gate;
use crate::delegator::Delegator;

/// How a switch block picks its groups.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum Switch {
    /// Only the first passing group runs.
    First,
    /// Every passing group runs.
    Any,
}

impl Switch {
    fn name(self) -> &'static str {
        match self {
            Self::First => "first",
            Self::Any => "any",
        }
    }
}

impl Delegator {
    pub(crate) fn handle_multi(&self, doc: &mut Document, element: NodeId, event: &mut Event) -> Result<()> {
        let mut api = Api::new(element, "multi");
        let gate = Gate::from_api(doc, &mut api)?;
        if !self.passes(doc, element, &gate)? {
            self.log(Some(element), "not running multi due to its conditions".to_string());
            return Ok(());
        }
        if let Some(Value::Array(entries)) = api.get_as(doc, ValueType::Array, "triggers")? {
            self.run_entries(doc, element, event, &entries)?;
        }
        Ok(())
    }

    pub(crate) fn run_switch(
        &self,
        doc: &mut Document,
        element: NodeId,
        event: &mut Event,
        switch: Switch,
    ) -> Result<()> {
        let mut api = Api::new(element, switch.name());
        let gate = Gate::from_api(doc, &mut api)?;
        if !self.passes(doc, element, &gate)? {
            self.log(
                Some(element),
                format!("not running {} due to its conditions", switch.name()),
            );
            return Ok(());
        }
        let groups = api.require_as(doc, ValueType::Array, "switches")?;
        for group in groups.as_array().into_iter().flatten() {
            let Value::Object(group) = group else {
                return Err(Error::TypeMismatch {
                    key: "switches".to_string(),
                    expected: "array of objects".to_string(),
                    value: group.to_string(),
                });
            };
            if !self.passes(doc, element, &Gate::from_map(group)?)? {
                continue;
            }
            if let Some(Value::Array(entries)) = group.get("triggers") {
                self.run_entries(doc, element, event, entries)?;
            }
            if switch == Switch::First {
                break;
            }
        }
        Ok(())
    }

    pub(crate) fn run_entries(
        &self,
        doc: &mut Document,
        element: NodeId,
        event: &mut Event,
        entries: &[Value],
    ) -> Result<()> {
        for entry in entries {
            match entry {
                Value::String(spec) => self.invoke_entry(doc, element, event, spec, None)?,
                Value::Object(map) => {
                    for (spec, config) in map {
                        self.invoke_entry(doc, element, event, spec, Some(config))?;
                    }
                }
                other => self.emit_error(
                    None,
                    Some(element),
                    &Error::TypeMismatch {
                        key: "triggers".to_string(),
                        expected: "string or object".to_string(),
                        value: other.to_string(),
                    },
                ),
            }
        }
        Ok(())
    }

    fn invoke_entry(
        &self,
        doc: &mut Document,
        element: NodeId,
        event: &mut Event,
        spec: &str,
        config: Option<&Value>,
    ) -> Result<()> {
        let Some((selector, name)) = split_entry(spec) else {
            self.emit_error(
                None,
                Some(element),
                &Error::handler(format!(
                    "could not invoke multi delegator for {spec}; could not split on :: to derive selector and trigger name"
                )),
            );
            return Ok(());
        };
        let targets = doc.targets(element, selector)?;
        if targets.is_empty() {
            return Err(Error::Resolution {
                selector: selector.to_string(),
            });
        }
        for target in targets {
            let api = match config {
                Some(Value::Object(defaults)) => Some(seeded(doc, target, name, defaults)?),
                _ => None,
            };
            self.trigger(doc, name, target, Some(&mut *event), true, api)?;
        }
        Ok(())
    }
}

fn split_entry(spec: &str) -> Option<(&str, &str)> {
    let (selector, name) = spec.split_once("::")?;
    let (selector, name) = (selector.trim(), name.trim());
    (!selector.is_empty() && !name.is_empty()).then_some((selector, name))
}

fn seeded(doc: &Document, target: NodeId, name: &str, defaults: &Map<String, Value>) -> Result<Api> {
    let mut api = Api::new(target, name);
    api.set_defaults(doc, defaults)?;
    Ok(api)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegator::tests::{capture, counter, runs};
    use crate::delegator::{DelegatorNotice, DelegatorOptions};
    use crate::trigger::{Trigger, TriggerStore};
    use serde_json::json;
    use understory_dom::Element;

    struct Page {
        delegator: Delegator,
        doc: Document,
        link: NodeId,
        panels: [NodeId; 3],
    }

    /// A link followed by three sibling panels.
    fn page() -> Page {
        let delegator = Delegator::new(TriggerStore::shared(), DelegatorOptions::default());
        delegator
            .add_triggers(
                [
                    counter("one", &["click"]),
                    counter("two", &["click"]),
                    counter("three", &["click"]),
                    Trigger::new("speed", &["click"], |cx| cx.get("speed")),
                ],
                false,
            )
            .unwrap();
        let mut doc = Document::new();
        let page = doc.insert(None, Element::new("body"));
        let link = doc.insert(Some(page), Element::new("a"));
        let panels = [
            doc.insert(Some(page), Element::new("div").class("panel a")),
            doc.insert(Some(page), Element::new("div").class("panel b")),
            doc.insert(Some(page), Element::new("div").class("panel c")),
        ];
        delegator.attach(page);
        Page {
            delegator,
            doc,
            link,
            panels,
        }
    }

    fn click(p: &mut Page) {
        p.delegator
            .handle_event(&mut p.doc, &mut Event::new("click", p.link))
            .unwrap();
    }

    const GROUPS: &str = "[
        { 'if': { 'self::hasClass': ['never'] }, 'triggers': ['~ .a::one'] },
        { 'if': { 'self::hasClass': ['armed'] }, 'triggers': ['~ .b::two'] },
        { 'triggers': ['~ .c::three'] }
    ]";

    #[test]
    fn first_runs_only_the_first_passing_group() {
        let mut p = page();
        p.doc.add_class(p.link, "armed");
        p.doc.set_attr(p.link, "data-trigger", "first");
        p.doc.set_attr(p.link, "data-first-switches", GROUPS);
        click(&mut p);
        let [a, b, c] = p.panels;
        assert_eq!(runs(&p.doc, a, "one"), 0, "failing group never runs");
        assert_eq!(runs(&p.doc, b, "two"), 1, "first passing group runs once");
        assert_eq!(runs(&p.doc, c, "three"), 0, "first stops after a match");
    }

    #[test]
    fn any_runs_every_passing_group() {
        let mut p = page();
        p.doc.add_class(p.link, "armed");
        p.doc.set_attr(p.link, "data-trigger", "any");
        p.doc.set_attr(p.link, "data-any-switches", GROUPS);
        click(&mut p);
        let [a, b, c] = p.panels;
        assert_eq!(runs(&p.doc, a, "one"), 0, "failing group never runs");
        assert_eq!(runs(&p.doc, b, "two"), 1);
        assert_eq!(runs(&p.doc, c, "three"), 1, "unconditioned group runs under any");
    }

    #[test]
    fn switch_block_gate_and_missing_switches() {
        let mut p = page();
        let seen = capture(&p.delegator);
        p.doc.set_attr(p.link, "data-trigger", "any");
        p.doc.set_attr(
            p.link,
            "data-any-options",
            "'if': { 'self::hasClass': ['armed'] }, 'switches': [{ 'triggers': ['~ .a::one'] }]",
        );
        click(&mut p);
        assert_eq!(runs(&p.doc, p.panels[0], "one"), 0, "block gate closed");
        p.doc.add_class(p.link, "armed");
        click(&mut p);
        assert_eq!(runs(&p.doc, p.panels[0], "one"), 1);

        p.doc.set_attr(p.link, "data-trigger", "first");
        click(&mut p);
        assert!(seen.borrow().iter().any(|n| matches!(
            n,
            DelegatorNotice::Error { name: Some(name), error: Error::MissingOption { .. }, .. } if name == "first"
        )));
    }

    #[test]
    fn multi_fans_out_with_seeded_defaults() {
        let mut p = page();
        let seen = capture(&p.delegator);
        p.doc.set_attr(p.link, "data-trigger", "multi");
        p.doc.set_attr(
            p.link,
            "data-multi-options",
            "'triggers': ['~ .panel::one', { '~ .c::speed': { 'speed': 3 } }, 'self::two']",
        );
        click(&mut p);
        for panel in p.panels {
            assert_eq!(runs(&p.doc, panel, "one"), 1, "every sibling panel after the link");
        }
        assert_eq!(runs(&p.doc, p.link, "two"), 1, "self resolves to the declaring element");
        let c = p.panels[2];
        assert!(seen.borrow().iter().any(|n| matches!(
            n,
            DelegatorNotice::Fired { name, element, result: Some(speed), .. }
                if name == "speed" && *element == c && *speed == json!(3)
        )));
    }

    #[test]
    fn multi_block_gate_suppresses_all_entries() {
        let mut p = page();
        p.doc.set_attr(p.link, "data-trigger", "multi");
        p.doc.set_attr(
            p.link,
            "data-multi-options",
            "'unless': { 'self::hasClass': ['off'] }, 'triggers': ['self::one']",
        );
        click(&mut p);
        p.doc.add_class(p.link, "off");
        click(&mut p);
        assert_eq!(runs(&p.doc, p.link, "one"), 1);
    }

    #[test]
    fn bad_entries_are_reported() {
        let mut p = page();
        let seen = capture(&p.delegator);
        p.doc.set_attr(p.link, "data-trigger", "multi");
        p.doc.set_attr(
            p.link,
            "data-multi-options",
            "'triggers': ['nonsense', 'self::one', '.missing::two', 'self::three']",
        );
        click(&mut p);
        let errors: Vec<Error> = seen
            .borrow()
            .iter()
            .filter_map(|n| match n {
                DelegatorNotice::Error { error, .. } => Some(error.clone()),
                _ => None,
            })
            .collect();
        assert!(matches!(&errors[0], Error::Handler(msg) if msg.contains("nonsense")));
        assert_eq!(
            errors[1],
            Error::Resolution {
                selector: ".missing".into()
            }
        );
        assert_eq!(runs(&p.doc, p.link, "one"), 1, "entries before the failure ran");
        assert_eq!(runs(&p.doc, p.link, "three"), 0, "a missing target aborts the block");
    }

    #[test]
    fn split_entry_requires_both_halves() {
        assert_eq!(split_entry(".a::open"), Some((".a", "open")));
        assert_eq!(split_entry("::open"), None);
        assert_eq!(split_entry(".a::"), None);
        assert_eq!(split_entry("open"), None);
    }
}
