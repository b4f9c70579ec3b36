// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Typed view over an element's namespaced configuration attributes.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use understory_dom::{Document, NodeId};

use crate::coerce::ValueType;
use crate::error::{Error, Result};
use crate::json::parse_options;
use crate::names::{camel_case, hyphenate, normalize_prefix};

/// Reads the configuration a filter or trigger named `prefix` declares on one element.
///
/// Values come from the JSON object in `data-<prefix>-options` and, for keys
/// that object lacks, from individual `data-<prefix>-<key>` attributes (read as
/// strings). Keys are camel-cased for lookup and hyphenated for attribute
/// names, so `max-width` and `maxWidth` are the same key.
///
/// The parsed object is built lazily on first read and cached; every value
/// resolved from an individual attribute is cached as well. [`Api::refresh`]
/// drops the cache and re-applies registered defaults.
///
/// JSON `null` counts as "no value" everywhere.
///
/// ```rust
/// use serde_json::json;
/// use understory_behavior::{Api, ValueType};
/// use understory_dom::{Document, Element};
///
/// let mut doc = Document::new();
/// let el = doc.insert(
///     None,
///     Element::new("div")
///         .attr("data-resize-options", "'max-width': 300")
///         .attr("data-resize-handle", "'.grip'"),
/// );
///
/// let mut api = Api::new(el, "Resize");
/// assert_eq!(api.get(&doc, "maxWidth").unwrap(), Some(json!(300)));
/// assert_eq!(api.get(&doc, "handle").unwrap(), Some(json!("'.grip'")));
/// assert_eq!(api.get_as(&doc, ValueType::String, "handle").unwrap(), Some(json!("'.grip'")));
/// assert!(api.require(&doc, &["minWidth"]).is_err());
/// ```
#[derive(Clone, Debug)]
pub struct Api {
    element: NodeId,
    prefix: String,
    options: Option<Map<String, Value>>,
    defaults: Map<String, Value>,
}

impl Api {
    /// A reader for `name`'s configuration on `element`.
    pub fn new(element: NodeId, name: &str) -> Self {
        Self {
            element,
            prefix: normalize_prefix(name),
            options: None,
            defaults: Map::new(),
        }
    }

    /// The element this reader is bound to.
    pub fn element(&self) -> NodeId {
        self.element
    }

    /// The normalized attribute prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The prefixed key used in error messages, for example `resize-max-width`.
    pub fn qualified(&self, key: &str) -> String {
        format!("{}-{}", self.prefix, hyphenate(&camel_case(key)))
    }

    /// Read one value.
    pub fn get(&mut self, doc: &Document, key: &str) -> Result<Option<Value>> {
        let key = camel_case(key);
        let element = self.element;
        let inline = format!("{}-{}", self.prefix, hyphenate(&key));
        let options = self.options(doc)?;
        if !options.contains_key(&key)
            && let Some(value) = doc.data(element, &inline)
        {
            options.insert(key.clone(), Value::String(value.to_string()));
        }
        Ok(options.get(&key).filter(|v| !v.is_null()).cloned())
    }

    /// Read several values; keys without a value are omitted.
    pub fn get_many(&mut self, doc: &Document, keys: &[&str]) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for key in keys {
            if let Some(value) = self.get(doc, key)? {
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    /// Read one value as `ty`.
    ///
    /// Returns `None` when absent and [`Error::TypeMismatch`] when present
    /// but not coercible.
    pub fn get_as(&mut self, doc: &Document, ty: ValueType, key: &str) -> Result<Option<Value>> {
        let Some(value) = self.get(doc, key)? else {
            return Ok(None);
        };
        match ty.coerce(&value) {
            Some(coerced) => Ok(Some(coerced)),
            None => Err(Error::TypeMismatch {
                key: self.qualified(key),
                expected: ty.to_string(),
                value: display(&value),
            }),
        }
    }

    /// Read one value as `ty`, falling back when it is absent or not coercible.
    ///
    /// Unlike [`Api::get_as`], a present value that fails coercion is not an
    /// error here: the [`Error::TypeMismatch`] is discarded and `fallback`
    /// returned. Use [`Api::require_as`] when a bad value must be reported.
    pub fn get_as_or(&mut self, doc: &Document, ty: ValueType, key: &str, fallback: Value) -> Result<Value> {
        match self.get_as(doc, ty, key) {
            Ok(Some(value)) => Ok(value),
            Ok(None) | Err(Error::TypeMismatch { .. }) => Ok(fallback),
            Err(other) => Err(other),
        }
    }

    /// Read several values, each as its own type; absent keys are omitted.
    pub fn get_all_as(&mut self, doc: &Document, specs: &[(&str, ValueType)]) -> Result<Map<String, Value>> {
        let mut out = Map::new();
        for (key, ty) in specs {
            if let Some(value) = self.get_as(doc, *ty, key)? {
                out.insert((*key).to_string(), value);
            }
        }
        Ok(out)
    }

    /// Read one value into a Rust type.
    pub fn deserialize<T: DeserializeOwned>(&mut self, doc: &Document, key: &str) -> Result<Option<T>> {
        let Some(value) = self.get(doc, key)? else {
            return Ok(None);
        };
        serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|_| Error::TypeMismatch {
                key: self.qualified(key),
                expected: core::any::type_name::<T>().to_string(),
                value: display(&value),
            })
    }

    /// Fail with [`Error::MissingOption`] unless every key has a value.
    pub fn require(&mut self, doc: &Document, keys: &[&str]) -> Result<()> {
        for key in keys {
            if self.get(doc, key)?.is_none() {
                return Err(Error::MissingOption {
                    key: self.qualified(key),
                });
            }
        }
        Ok(())
    }

    /// Require one value and read it as `ty`.
    pub fn require_as(&mut self, doc: &Document, ty: ValueType, key: &str) -> Result<Value> {
        self.get_as(doc, ty, key)?.ok_or_else(|| Error::MissingOption {
            key: self.qualified(key),
        })
    }

    /// Require several values, each readable as its own type.
    pub fn require_all_as(&mut self, doc: &Document, specs: &[(&str, ValueType)]) -> Result<()> {
        for (key, ty) in specs {
            self.require_as(doc, *ty, key)?;
        }
        Ok(())
    }

    /// Record a default for `key` and inject it if the key has no value.
    pub fn set_default(&mut self, doc: &Document, key: &str, value: Value) -> Result<()> {
        let key = camel_case(key);
        self.defaults.insert(key.clone(), value.clone());
        if self.get(doc, &key)?.is_none() {
            self.options(doc)?.insert(key, value);
        }
        Ok(())
    }

    /// [`Api::set_default`] for every entry of `defaults`.
    pub fn set_defaults(&mut self, doc: &Document, defaults: &Map<String, Value>) -> Result<()> {
        for (key, value) in defaults {
            self.set_default(doc, key, value.clone())?;
        }
        Ok(())
    }

    /// Drop cached values, re-read the element and re-apply recorded defaults.
    pub fn refresh(&mut self, doc: &Document) -> Result<()> {
        self.options = None;
        let defaults = core::mem::take(&mut self.defaults);
        self.set_defaults(doc, &defaults)
    }

    fn options(&mut self, doc: &Document) -> Result<&mut Map<String, Value>> {
        if self.options.is_none() {
            let attribute = format!("data-{}-options", self.prefix);
            let raw = doc.attr(self.element, &attribute).unwrap_or("");
            self.options = Some(parse_options(&attribute, raw)?);
        }
        Ok(self.options.get_or_insert_with(Map::new))
    }
}

fn display(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
