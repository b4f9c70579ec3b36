// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `Trigger` filter: run triggers from listeners on watched elements.
//!
//! Pointer transitions are a poor fit for delegation, so this filter listens
//! on the watched elements directly. Each group names the events to watch and
//! maps selectors of watched elements to `selector::trigger` entries, resolved
//! relative to the watched element:
//!
//! ```text
//! <div data-behavior="Trigger" data-trigger-options="'triggers': [{
//!     'events': ['mouseover', 'focus'],
//!     'targets': {
//!         '.card': { '.body::reveal': { 'speed': 2, 'if': { 'self::hasClass': ['ready'] } } }
//!     }
//! }]">
//! ```
//!
//! `mouseover` and `mouseout` are watched as `mouseenter` and `mouseleave`.
//! An entry's object seeds the trigger's configuration, including its
//! `if` / `unless` conditions; a group may carry its own `if` / `unless`,
//! checked against the filter's element.

use std::rc::Rc;

use serde_json::Value;
use understory_behavior::{Error, Filter, Result, ValueType, split_names};

use crate::conditional::Gate;
use crate::delegator::Delegator;

/// Name the filter registers under.
pub const TRIGGER: &str = "Trigger";

/// A filter that fires triggers when watched elements see the listed events.
///
/// Events reach the listeners through
/// [`Behavior::dispatch_event`](understory_behavior::Behavior::dispatch_event);
/// cleaning the element up removes them. The filter holds the dispatcher
/// weakly and fails to set up once it is gone.
pub fn trigger_filter(delegator: &Rc<Delegator>) -> Filter {
    let delegator = Rc::downgrade(delegator);
    Filter::new(TRIGGER, move |cx| {
        if delegator.upgrade().is_none() {
            return Err(cx.fail("the Trigger filter requires a live delegator"));
        }
        let Some(Value::Array(groups)) = cx.get_as(ValueType::Array, "triggers")? else {
            return Ok(None);
        };
        let element = cx.element();
        for group in &groups {
            let Value::Object(group) = group else {
                return Err(mismatch("triggers", "array of objects", group));
            };
            let gate = Gate::from_map(group)?;
            let events = watched_events(group.get("events"));
            let events: Vec<&str> = events.iter().map(String::as_str).collect();
            let targets = match group.get("targets") {
                Some(Value::Object(targets)) => targets,
                None | Some(Value::Null) => continue,
                Some(other) => return Err(mismatch("targets", "object", other)),
            };
            for (selector, entries) in targets {
                let entries = match entries {
                    Value::Object(_) => [entries.clone()],
                    other => return Err(mismatch(selector, "object", other)),
                };
                for watched in cx.doc().targets(element, selector)? {
                    let delegator = delegator.clone();
                    let gate = gate.clone();
                    let entries = entries.clone();
                    cx.add_listener(watched, &events, move |_, doc, event| {
                        let Some(delegator) = delegator.upgrade() else {
                            return Ok(());
                        };
                        if !delegator.passes(doc, element, &gate)? {
                            return Ok(());
                        }
                        let mut event = event.clone();
                        match delegator.run_entries(doc, watched, &mut event, &entries) {
                            Ok(()) => Ok(()),
                            Err(error) => delegator.report(Some(TRIGGER), Some(watched), error),
                        }
                    });
                }
            }
        }
        Ok(None)
    })
    .with_require_as("triggers", ValueType::Array)
}

/// The listener types for a group's `events`, with pointer transitions
/// mapped to their enter/leave forms.
fn watched_events(events: Option<&Value>) -> Vec<String> {
    let names = match events {
        Some(Value::String(list)) => split_names(list),
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).map(str::to_string).collect(),
        _ => Vec::new(),
    };
    names
        .into_iter()
        .map(|name| match name.as_str() {
            "mouseover" => "mouseenter".to_string(),
            "mouseout" => "mouseleave".to_string(),
            _ => name,
        })
        .collect()
}

fn mismatch(key: &str, expected: &str, value: &Value) -> Error {
    Error::TypeMismatch {
        key: key.to_string(),
        expected: expected.to_string(),
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delegator::tests::{capture, counter, runs};
    use crate::delegator::{DelegatorNotice, DelegatorOptions};
    use crate::trigger::{Trigger, TriggerStore};
    use serde_json::json;
    use understory_behavior::{Behavior, BehaviorOptions, FilterStore, Notice};
    use understory_dom::{Document, Element, Event, NodeId};

    struct Fixture {
        behavior: Rc<Behavior>,
        delegator: Rc<Delegator>,
        doc: Document,
        widget: NodeId,
        card: NodeId,
        body: NodeId,
    }

    /// A widget holding a card whose body is the trigger target.
    fn fixture(options: &str) -> Fixture {
        let behavior = Rc::new(Behavior::new(FilterStore::shared(), BehaviorOptions::default()));
        let delegator = Rc::new(Delegator::new(TriggerStore::shared(), DelegatorOptions::default()));
        delegator
            .add_triggers(
                [
                    counter("reveal", &["click"]),
                    Trigger::new("speed", &["click"], |cx| cx.get("speed")),
                ],
                false,
            )
            .unwrap();
        delegator.bind_to_behavior(behavior.clone());
        behavior.add_filter(trigger_filter(&delegator), false).unwrap();

        let mut doc = Document::new();
        let widget = doc.insert(
            None,
            Element::new("div")
                .attr("data-behavior", "Trigger")
                .attr("data-trigger-options", options),
        );
        let card = doc.insert(Some(widget), Element::new("div").class("card"));
        let body = doc.insert(Some(card), Element::new("p").class("body"));
        Fixture {
            behavior,
            delegator,
            doc,
            widget,
            card,
            body,
        }
    }

    fn dispatch(f: &mut Fixture, event: Event) {
        f.behavior.dispatch_event(&mut f.doc, &event).unwrap();
    }

    #[test]
    fn watched_events_fire_entries() {
        let mut f = fixture(
            "'triggers': [{ 'events': ['mouseover', 'focus'], 'targets': { '.card': { '.body::reveal': null } } }]",
        );
        f.behavior.apply(&mut f.doc, f.widget, false).unwrap();
        let (card, body) = (f.card, f.body);
        assert_eq!(f.behavior.pending_tasks(), 1, "one listener on the one card");

        dispatch(&mut f, Event::new("mouseover", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 1, "mouseover is watched as mouseenter");
        dispatch(&mut f, Event::new("mouseover", body).with_related_target(card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 1, "moving within the card is not an entry");
        dispatch(&mut f, Event::new("focus", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 2);
        dispatch(&mut f, Event::new("click", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 2, "unwatched event");

        f.behavior.cleanup(&mut f.doc, f.widget, false);
        assert_eq!(f.behavior.pending_tasks(), 0);
        dispatch(&mut f, Event::new("focus", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 2, "cleanup removes the listeners");
    }

    #[test]
    fn closed_gates_skip_entries() {
        let mut f = fixture(
            "'triggers': [{
                'events': 'focus',
                'unless': { 'self::hasClass': ['off'] },
                'targets': { '.card': { '.body::reveal': { 'if': { 'self::hasClass': ['ready'] } } } }
            }]",
        );
        f.behavior.apply(&mut f.doc, f.widget, false).unwrap();
        let card = f.card;
        dispatch(&mut f, Event::new("focus", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 0, "entry condition fails on the body");

        f.doc.add_class(f.body, "ready");
        dispatch(&mut f, Event::new("focus", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 1);

        f.doc.add_class(f.widget, "off");
        dispatch(&mut f, Event::new("focus", card));
        assert_eq!(runs(&f.doc, f.body, "reveal"), 1, "group gate is checked on the filter's element");
    }

    #[test]
    fn entry_objects_seed_defaults() {
        let mut f = fixture("'triggers': [{ 'events': ['focus'], 'targets': { '.card': { '.body::speed': { 'speed': 3 } } } }]");
        let seen = capture(&f.delegator);
        f.behavior.apply(&mut f.doc, f.widget, false).unwrap();
        let card = f.card;
        dispatch(&mut f, Event::new("focus", card));
        assert!(matches!(
            &seen.borrow()[..],
            [DelegatorNotice::Fired { name, element, kind, result: Some(speed) }]
                if name == "speed" && *element == f.body && kind == "focus" && *speed == json!(3)
        ));
    }

    #[test]
    fn missing_entry_targets_are_reported_by_the_delegator() {
        let mut f = fixture("'triggers': [{ 'events': ['focus'], 'targets': { '.card': { '.missing::reveal': null } } }]");
        let seen = capture(&f.delegator);
        f.behavior.apply(&mut f.doc, f.widget, false).unwrap();
        let card = f.card;
        dispatch(&mut f, Event::new("focus", card));
        assert!(matches!(
            &seen.borrow()[..],
            [DelegatorNotice::Error { name: Some(name), element: Some(e), error: Error::Resolution { selector } }]
                if name == TRIGGER && *e == card && selector == ".missing"
        ));
    }

    #[test]
    fn triggers_are_required() {
        let mut f = fixture("");
        let errors = Rc::new(core::cell::RefCell::new(Vec::new()));
        let sink = errors.clone();
        f.behavior.on_notice(move |n| {
            if let Notice::Error { error, .. } = n {
                sink.borrow_mut().push(error.clone());
            }
        });
        f.behavior.apply(&mut f.doc, f.widget, false).unwrap();
        assert_eq!(
            *errors.borrow(),
            [Error::MissingOption {
                key: "trigger-triggers".into()
            }]
        );
        assert!(!f.behavior.is_applied(f.widget, TRIGGER));
        assert_eq!(f.behavior.pending_tasks(), 0);
    }

    #[test]
    fn pointer_transitions_map_to_enter_and_leave() {
        assert_eq!(
            watched_events(Some(&json!("mouseover mouseout, focus"))),
            ["mouseenter", "mouseleave", "focus"]
        );
        assert_eq!(watched_events(Some(&json!(["click", 3]))), ["click"]);
        assert!(watched_events(None).is_empty());
    }
}
