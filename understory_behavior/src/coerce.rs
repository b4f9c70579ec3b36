// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use core::fmt;

use serde::Deserialize;
use serde_json::Value;

use crate::json;

/// Semantic type an option value is read as.
///
/// Values coming from individual `data-*` attributes are strings; reading one
/// as any other type decodes it as attribute JSON first, so `"9"` reads as the
/// number `9` and `"true"` as a boolean.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// A JSON string.
    String,
    /// A JSON number.
    Number,
    /// `true` or `false`.
    Boolean,
    /// A JSON array.
    Array,
    /// A JSON object.
    Object,
}

impl ValueType {
    /// Returns true if `value` already has this type.
    pub fn matches(self, value: &Value) -> bool {
        matches!(
            (self, value),
            (Self::String, Value::String(_))
                | (Self::Number, Value::Number(_))
                | (Self::Boolean, Value::Bool(_))
                | (Self::Array, Value::Array(_))
                | (Self::Object, Value::Object(_))
        )
    }

    /// Coerce `value` to this type, or `None` if it cannot be read as one.
    pub fn coerce(self, value: &Value) -> Option<Value> {
        let decoded = match value {
            Value::String(s) if self != Self::String => json::decode(s)?,
            other => other.clone(),
        };
        self.matches(&decoded).then_some(decoded)
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::String => "string",
            Self::Number => "number",
            Self::Boolean => "boolean",
            Self::Array => "array",
            Self::Object => "object",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn strings_decode_to_requested_type() {
        assert_eq!(ValueType::Number.coerce(&json!("9")), Some(json!(9)));
        assert_eq!(ValueType::Boolean.coerce(&json!("false")), Some(json!(false)));
        assert_eq!(ValueType::Array.coerce(&json!("[1, 'a']")), Some(json!([1, "a"])));
        assert_eq!(ValueType::Object.coerce(&json!("{'a': 1}")), Some(json!({"a": 1})));
        assert_eq!(ValueType::String.coerce(&json!("9")), Some(json!("9")));
    }

    #[test]
    fn mismatches_are_none() {
        assert_eq!(ValueType::Number.coerce(&json!("nine")), None);
        assert_eq!(ValueType::Number.coerce(&json!("true")), None);
        assert_eq!(ValueType::String.coerce(&json!(9)), None);
        assert_eq!(ValueType::Array.coerce(&json!({"a": 1})), None);
    }

    #[test]
    fn deserializes_lowercase_names() {
        let ty: ValueType = serde_json::from_value(json!("boolean")).unwrap();
        assert_eq!(ty, ValueType::Boolean);
        assert_eq!(ValueType::Object.to_string(), "object");
    }
}
