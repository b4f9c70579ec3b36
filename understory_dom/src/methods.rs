// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic element accessors used by declarative configuration.

use alloc::string::{String, ToString};

use serde_json::Value;

use crate::tree::Document;
use crate::types::{DomError, NodeId};

impl Document {
    /// Read a named value off an element.
    ///
    /// Properties win; then `tag`, `text` and `html` read element data; then
    /// the attribute of that name. Anything else (or a stale node) reads as
    /// [`Value::Null`].
    pub fn get(&self, id: NodeId, name: &str) -> Value {
        if let Some(value) = self.property(id, name) {
            return value.clone();
        }
        let special = match name {
            "tag" => self.tag(id),
            "text" | "html" => self.text(id),
            _ => None,
        };
        special
            .or_else(|| self.attr(id, name))
            .map_or(Value::Null, |v| Value::String(v.to_string()))
    }

    /// Invoke a named element method with JSON arguments.
    ///
    /// Known methods: `hasClass(name)`, `get(name)`, `getProperty(name)`,
    /// `getAttribute(name)`, `getData(name)`, `match(selector)` and
    /// `hasChild(selector?)`.
    pub fn call(&self, id: NodeId, method: &str, args: &[Value]) -> Result<Value, DomError> {
        if !self.is_alive(id) {
            return Err(DomError::Stale(id));
        }
        let arg = |expected: &'static str| -> Result<String, DomError> {
            match args.first() {
                Some(Value::String(s)) => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(DomError::BadArguments {
                    name: method.to_string(),
                    expected,
                }),
            }
        };
        let opt = |v: Option<&str>| v.map_or(Value::Null, |s| Value::String(s.to_string()));
        Ok(match method {
            "hasClass" => Value::Bool(self.has_class(id, &arg("a class name")?)),
            "get" => self.get(id, &arg("a key")?),
            "getProperty" => self
                .property(id, &arg("a property name")?)
                .cloned()
                .unwrap_or(Value::Null),
            "getAttribute" => opt(self.attr(id, &arg("an attribute name")?)),
            "getData" => opt(self.data(id, &arg("a data key")?)),
            "match" => Value::Bool(self.matches(id, &arg("a selector")?)?),
            "hasChild" => {
                let found = match args.first() {
                    None | Some(Value::Null) => !self.children_of(id).is_empty(),
                    Some(_) => self.query(Some(id), &arg("a selector")?)?.is_some(),
                };
                Value::Bool(found)
            }
            _ => {
                return Err(DomError::UnknownMethod {
                    name: method.to_string(),
                });
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Element;
    use alloc::vec;
    use serde_json::json;

    #[test]
    fn get_prefers_properties() {
        let mut doc = Document::new();
        let el = doc.insert(
            None,
            Element::new("input")
                .attr("value", "attr")
                .attr("name", "q")
                .property("value", json!("prop"))
                .text("hello"),
        );
        assert_eq!(doc.get(el, "value"), json!("prop"));
        assert_eq!(doc.get(el, "name"), json!("q"));
        assert_eq!(doc.get(el, "tag"), json!("input"));
        assert_eq!(doc.get(el, "text"), json!("hello"));
        assert_eq!(doc.get(el, "checked"), Value::Null);
    }

    #[test]
    fn call_builtin_methods() {
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div").class("bar").attr("data-size", "3"));
        let child = doc.insert(Some(el), Element::new("span").class("x"));
        assert_eq!(doc.call(el, "hasClass", &[json!("bar")]), Ok(json!(true)));
        assert_eq!(doc.call(el, "hasClass", &[json!("baz")]), Ok(json!(false)));
        assert_eq!(doc.call(el, "getData", &[json!("size")]), Ok(json!("3")));
        assert_eq!(doc.call(el, "getAttribute", &[json!("title")]), Ok(Value::Null));
        assert_eq!(doc.call(child, "match", &[json!("div > .x")]), Ok(json!(true)));
        assert_eq!(doc.call(el, "hasChild", &[json!("span.x")]), Ok(json!(true)));
        assert_eq!(doc.call(el, "hasChild", &[]), Ok(json!(true)));
        assert_eq!(doc.call(child, "hasChild", &[]), Ok(json!(false)));
    }

    #[test]
    fn call_errors() {
        let mut doc = Document::new();
        let el = doc.insert(None, Element::new("div"));
        assert!(matches!(
            doc.call(el, "explode", &[]),
            Err(DomError::UnknownMethod { .. })
        ));
        assert!(matches!(
            doc.call(el, "hasClass", &[]),
            Err(DomError::BadArguments { .. })
        ));
        doc.remove(el);
        assert_eq!(doc.call(el, "hasClass", &vec![json!("a")]), Err(DomError::Stale(el)));
    }
}
