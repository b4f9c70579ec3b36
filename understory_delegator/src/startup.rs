// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The `Startup` filter: fire triggers once an element is set up.

use core::time::Duration;
use std::rc::Rc;

use serde_json::Value;
use understory_behavior::{Filter, ValueType};

use crate::conditional::Conditional;
use crate::delegator::Delegator;

/// Name the filter registers under.
pub const STARTUP: &str = "Startup";

/// A filter that fires triggers on its element when their conditions hold.
///
/// The element lists triggers under `delegators`, each mapped to a condition
/// object (see [`Conditional::parse`]) that may also carry a `delay` in
/// milliseconds:
///
/// ```text
/// <div data-behavior="Startup"
///      data-startup-options="'delegators': {
///          'reveal': { 'target': '~ .flag', 'method': 'hasClass', 'arguments': ['on'], 'delay': 100 }
///      }">
/// ```
///
/// Conditions are checked when the delay elapses on the engine clock, even
/// a zero one; cleaning the element up first cancels them. The filter holds
/// the dispatcher weakly.
pub fn startup_filter(delegator: &Rc<Delegator>) -> Filter {
    let delegator = Rc::downgrade(delegator);
    Filter::new(STARTUP, move |cx| {
        let Some(Value::Object(delegators)) = cx.get_as(ValueType::Object, "delegators")? else {
            return Ok(None);
        };
        let element = cx.element();
        for (name, conditional) in delegators {
            let conditionals = Conditional::parse(&conditional)?;
            let delay = conditional.get("delay").and_then(Value::as_u64).unwrap_or(0);
            let delegator = delegator.clone();
            cx.set_timeout(Duration::from_millis(delay), move |_, doc| {
                let Some(delegator) = delegator.upgrade() else {
                    return Ok(());
                };
                if delegator.verify(doc, element, &conditionals)? {
                    delegator.trigger(doc, &name, element, None, false, None)?;
                }
                Ok(())
            });
        }
        Ok(None)
    })
}
