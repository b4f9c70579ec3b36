// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! JSON carried in HTML attributes.
//!
//! Attribute JSON is written by hand in markup, so single-quoted strings are
//! accepted and an object body may omit its braces. Before decoding, the text
//! must pass a restrictive scan: once escapes and quoted strings are removed,
//! only JSON punctuation, digits, whitespace and the letters of `true`,
//! `false` and `null` may remain.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::names::camel_case;

struct Scanner {
    escapes: Regex,
    double_quoted: Regex,
    single_quoted: Regex,
    allowed: Regex,
}

static SCANNER: LazyLock<Scanner> = LazyLock::new(|| Scanner {
    escapes: Regex::new(r"\\.").expect("escape pattern"),
    double_quoted: Regex::new(r#""[^"\\\n\r]*""#).expect("double-quote pattern"),
    single_quoted: Regex::new(r"'[^'\\\n\r]*'").expect("single-quote pattern"),
    allowed: Regex::new(r"^[,:{}\[\]0-9.\-+Eaeflnr-u \n\r\t]*$").expect("allowed pattern"),
});

/// Returns true if `text` contains nothing but JSON syntax.
pub fn is_secure(text: &str) -> bool {
    let scan = &*SCANNER;
    let stripped = scan.escapes.replace_all(text, "@");
    let stripped = scan.double_quoted.replace_all(&stripped, "");
    let stripped = scan.single_quoted.replace_all(&stripped, "");
    scan.allowed.is_match(&stripped)
}

/// Decode attribute JSON, or `None` if it is insecure or malformed.
pub fn decode(text: &str) -> Option<Value> {
    if !is_secure(text) {
        return None;
    }
    serde_json::from_str(&requote(text)).ok()
}

/// Parse the value of an `-options` attribute into an object.
///
/// Empty text is an empty object and a bare body is wrapped in braces. Every
/// key also gets a camel-cased alias.
pub fn parse_options(attribute: &str, raw: &str) -> Result<Map<String, Value>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(Map::new());
    }
    let text = if trimmed.starts_with('{') {
        trimmed.to_string()
    } else {
        format!("{{{trimmed}}}")
    };
    let error = |message: &str| Error::Parse {
        attribute: attribute.to_string(),
        value: raw.to_string(),
        message: message.to_string(),
    };
    if !is_secure(&text) {
        return Err(error("value contains characters outside of JSON syntax"));
    }
    let value: Value =
        serde_json::from_str(&requote(&text)).map_err(|e| error(&e.to_string()))?;
    let Value::Object(mut options) = value else {
        return Err(error("expected an object"));
    };
    let aliases: Vec<(String, Value)> = options
        .iter()
        .filter_map(|(key, value)| {
            let camel = camel_case(key);
            (camel != *key && !options.contains_key(&camel)).then(|| (camel, value.clone()))
        })
        .collect();
    options.extend(aliases);
    Ok(options)
}

/// Rewrite single-quoted strings as double-quoted ones.
fn requote(text: &str) -> String {
    enum State {
        Outside,
        Double,
        Single,
    }
    let mut out = String::with_capacity(text.len());
    let mut state = State::Outside;
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        match (&state, c) {
            (State::Outside, '"') => {
                state = State::Double;
                out.push(c);
            }
            (State::Outside, '\'') => {
                state = State::Single;
                out.push('"');
            }
            (State::Double, '"') => {
                state = State::Outside;
                out.push(c);
            }
            (State::Single, '\'') => {
                state = State::Outside;
                out.push('"');
            }
            (State::Single, '"') => out.push_str("\\\""),
            (State::Single, '\\') => match chars.next() {
                Some('\'') => out.push('\''),
                Some(next) => {
                    out.push('\\');
                    out.push(next);
                }
                None => out.push('\\'),
            },
            (State::Double, '\\') => {
                out.push(c);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            _ => out.push(c),
        }
    }
    out
}
