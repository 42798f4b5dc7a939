//! Core types shared by loading and validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Supported JSON Schema drafts.
///
/// Ordered by publication, so draft intervals can be checked with `<=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Draft {
    V3,
    V4,
    V6,
}

impl Draft {
    pub const ALL: [Draft; 3] = [Draft::V3, Draft::V4, Draft::V6];

    /// Detect the draft from a `$schema` URI.
    ///
    /// Accepts `http` and `https` and ignores a trailing empty fragment.
    pub fn from_url(url: &str) -> Option<Draft> {
        let url = url.trim_end_matches('#');
        let rest = url
            .strip_prefix("http://")
            .or_else(|| url.strip_prefix("https://"))?;
        match rest {
            "json-schema.org/draft-03/schema" => Some(Draft::V3),
            "json-schema.org/draft-04/schema" => Some(Draft::V4),
            "json-schema.org/draft-06/schema" => Some(Draft::V6),
            _ => None,
        }
    }

    /// Detect the draft of a root document, falling back to `default`.
    pub fn detect(document: &Value, default: Draft) -> Draft {
        document
            .get("$schema")
            .and_then(Value::as_str)
            .and_then(Draft::from_url)
            .unwrap_or(default)
    }

    /// Parse a draft number as given on the command line (`3`, `4`, `6`).
    pub fn from_number(n: u8) -> Option<Draft> {
        match n {
            3 => Some(Draft::V3),
            4 => Some(Draft::V4),
            6 => Some(Draft::V6),
            _ => None,
        }
    }

    /// The meta-schema URI written to `$schema`.
    pub fn meta_schema_url(&self) -> &'static str {
        match self {
            Draft::V3 => "http://json-schema.org/draft-03/schema#",
            Draft::V4 => "http://json-schema.org/draft-04/schema#",
            Draft::V6 => "http://json-schema.org/draft-06/schema#",
        }
    }

    /// The keyword that carries a schema's identifier.
    pub fn id_keyword(&self) -> &'static str {
        match self {
            Draft::V3 | Draft::V4 => "id",
            Draft::V6 => "$id",
        }
    }
}

impl Default for Draft {
    fn default() -> Self {
        Draft::V6
    }
}

impl fmt::Display for Draft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Draft::V3 => f.write_str("draft-03"),
            Draft::V4 => f.write_str("draft-04"),
            Draft::V6 => f.write_str("draft-06"),
        }
    }
}

/// The six kinds of JSON value, used to dispatch keyword validators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum JsonType {
    Null,
    Boolean,
    Number,
    String,
    Array,
    Object,
}

impl JsonType {
    pub const ALL: [JsonType; 6] = [
        JsonType::Null,
        JsonType::Boolean,
        JsonType::Number,
        JsonType::String,
        JsonType::Array,
        JsonType::Object,
    ];

    pub fn of(value: &Value) -> JsonType {
        match value {
            Value::Null => JsonType::Null,
            Value::Bool(_) => JsonType::Boolean,
            Value::Number(_) => JsonType::Number,
            Value::String(_) => JsonType::String,
            Value::Array(_) => JsonType::Array,
            Value::Object(_) => JsonType::Object,
        }
    }

    /// Position in a fixed-size dispatch table.
    pub fn index(self) -> usize {
        self as usize
    }
}

/// Values of the `type` keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SchemaType {
    Null,
    Boolean,
    Integer,
    Number,
    String,
    Array,
    Object,
    /// Draft 3 only: matches every instance.
    Any,
}

impl SchemaType {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "null" => Some(SchemaType::Null),
            "boolean" => Some(SchemaType::Boolean),
            "integer" => Some(SchemaType::Integer),
            "number" => Some(SchemaType::Number),
            "string" => Some(SchemaType::String),
            "array" => Some(SchemaType::Array),
            "object" => Some(SchemaType::Object),
            "any" => Some(SchemaType::Any),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SchemaType::Null => "null",
            SchemaType::Boolean => "boolean",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::String => "string",
            SchemaType::Array => "array",
            SchemaType::Object => "object",
            SchemaType::Any => "any",
        }
    }

    /// Whether `value` is an instance of this type.
    ///
    /// `integer` accepts any number without a fractional part, so `1.0` matches.
    pub fn matches(&self, value: &Value) -> bool {
        match (self, value) {
            (SchemaType::Any, _) => true,
            (SchemaType::Null, Value::Null) => true,
            (SchemaType::Boolean, Value::Bool(_)) => true,
            (SchemaType::Number, Value::Number(_)) => true,
            (SchemaType::Integer, Value::Number(n)) => {
                n.is_i64() || n.is_u64() || n.as_f64().map(|f| f.fract() == 0.0).unwrap_or(false)
            }
            (SchemaType::String, Value::String(_)) => true,
            (SchemaType::Array, Value::Array(_)) => true,
            (SchemaType::Object, Value::Object(_)) => true,
            _ => false,
        }
    }

    /// The JSON value kinds this type can match.
    pub fn json_types(&self) -> &'static [JsonType] {
        match self {
            SchemaType::Null => &[JsonType::Null],
            SchemaType::Boolean => &[JsonType::Boolean],
            SchemaType::Integer | SchemaType::Number => &[JsonType::Number],
            SchemaType::String => &[JsonType::String],
            SchemaType::Array => &[JsonType::Array],
            SchemaType::Object => &[JsonType::Object],
            SchemaType::Any => &JsonType::ALL,
        }
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn draft_from_url() {
        assert_eq!(
            Draft::from_url("http://json-schema.org/draft-04/schema#"),
            Some(Draft::V4)
        );
        assert_eq!(
            Draft::from_url("https://json-schema.org/draft-06/schema"),
            Some(Draft::V6)
        );
        assert_eq!(
            Draft::from_url("http://json-schema.org/draft-03/schema#"),
            Some(Draft::V3)
        );
        assert_eq!(Draft::from_url("http://json-schema.org/draft-07/schema#"), None);
    }

    #[test]
    fn draft_detect_falls_back() {
        assert_eq!(Draft::detect(&json!({}), Draft::V4), Draft::V4);
        assert_eq!(
            Draft::detect(
                &json!({"$schema": "http://json-schema.org/draft-03/schema#"}),
                Draft::V6
            ),
            Draft::V3
        );
    }

    #[test]
    fn integer_accepts_integral_floats() {
        assert!(SchemaType::Integer.matches(&json!(1)));
        assert!(SchemaType::Integer.matches(&json!(1.0)));
        assert!(!SchemaType::Integer.matches(&json!(1.5)));
        assert!(!SchemaType::Integer.matches(&json!("1")));
    }

    #[test]
    fn any_matches_everything() {
        for value in [json!(null), json!(true), json!(1), json!("a"), json!([]), json!({})] {
            assert!(SchemaType::Any.matches(&value));
        }
    }

    #[test]
    fn drafts_are_ordered() {
        assert!(Draft::V3 < Draft::V4);
        assert!(Draft::V4 < Draft::V6);
    }
}
