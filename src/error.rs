//! Error types for schema loading, reference resolution and validation.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::pointer::JsonPath;
use crate::report::LoadingReport;
use crate::schema::Schema;

/// Errors while obtaining a raw JSON document.
#[derive(Debug, Error)]
pub enum FetchError {
    // IO errors (exit code 3)
    #[error("file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    NetworkError {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("no document registered for {url}")]
    NotFound { url: String },

    // Parse errors (exit code 2)
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("unsupported scheme for external document {url}: only http and https are fetched")]
    UnsupportedScheme { url: String },
}

impl FetchError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            FetchError::FileNotFound { .. }
            | FetchError::ReadError { .. }
            | FetchError::NotFound { .. } => 3,
            #[cfg(feature = "remote")]
            FetchError::NetworkError { .. } => 3,
            _ => 2,
        }
    }
}

/// Fatal failures locating or resolving a schema node.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("invalid location {uri}: {message}")]
    InvalidLocation { uri: String, message: String },

    #[error("unresolvable reference {uri}: {message}")]
    UnresolvableReference { uri: String, message: String },

    #[error("cannot load external document {uri}: {source}")]
    Fetch {
        uri: String,
        #[source]
        source: FetchError,
    },
}

impl SchemaError {
    /// The URI the failure is about.
    pub fn uri(&self) -> &str {
        match self {
            SchemaError::InvalidLocation { uri, .. }
            | SchemaError::UnresolvableReference { uri, .. }
            | SchemaError::Fetch { uri, .. } => uri,
        }
    }
}

/// A load that finished with errors in its report.
///
/// Carries the whole report and, when the root node could be allocated,
/// the partially built schema (unresolved references stay unresolved).
#[derive(Debug, Error)]
#[error("schema loading failed with {} error(s)", .report.error_count())]
pub struct SchemaLoadingError {
    pub report: LoadingReport,
    pub partial: Option<Schema>,
}

impl SchemaLoadingError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Conditions that make a schema graph unusable for validation.
#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("reference {reference} at {location} was never resolved")]
    UnresolvedReference { location: String, reference: String },

    #[error("reference chain starting at {location} does not reach a schema")]
    ReferenceCycle { location: String },

    #[error("invalid pattern {pattern:?} at {location}: {source}")]
    InvalidPattern {
        location: String,
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

impl ValidatorError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        2
    }
}

/// Kind of a validation failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ValidationErrorKind {
    TypeMismatch,
    Disallow,
    Enum,
    Const,
    MultipleOf,
    Minimum,
    Maximum,
    MinLength,
    MaxLength,
    Pattern,
    Format,
    MinItems,
    MaxItems,
    UniqueItems,
    AdditionalItems,
    Contains,
    Required,
    MinProperties,
    MaxProperties,
    AdditionalProperties,
    PropertyNames,
    Dependencies,
    FalseSchema,
    Not,
    AllOfFailure,
    AnyOfFailure,
    OneOfFailure,
    MultipleFailures,
}

/// A violation, possibly composed of nested violations.
///
/// A leaf has no causes. A composite (several sibling failures, or a failed
/// combinator) carries its causes and a summary message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationError {
    #[serde(skip)]
    pub kind: ValidationErrorKind,
    /// Canonical URI of the schema node that was violated.
    #[serde(rename = "schemaLocation")]
    pub violated_schema: String,
    /// Location of the offending value in the instance.
    pub pointer_to_violation: JsonPath,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub causes: Vec<ValidationError>,
}

impl ValidationError {
    pub fn is_leaf(&self) -> bool {
        self.causes.is_empty()
    }

    /// Number of leaf violations in this tree.
    pub fn violation_count(&self) -> usize {
        if self.causes.is_empty() {
            1
        } else {
            self.causes.iter().map(ValidationError::violation_count).sum()
        }
    }

    /// Leaf violations in depth-first order.
    pub fn leaves(&self) -> Vec<&ValidationError> {
        let mut out = Vec::new();
        self.collect_leaves(&mut out);
        out
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a ValidationError>) {
        if self.causes.is_empty() {
            out.push(self);
        } else {
            for cause in &self.causes {
                cause.collect_leaves(out);
            }
        }
    }

    /// `pointer: message` lines for every leaf.
    pub fn all_messages(&self) -> Vec<String> {
        self.leaves().iter().map(|e| e.to_string()).collect()
    }

    /// Serialize to the JSON report format.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(self).unwrap_or(serde_json::Value::Null)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.pointer_to_violation, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(pointer: &str, message: &str) -> ValidationError {
        ValidationError {
            kind: ValidationErrorKind::TypeMismatch,
            violated_schema: "mem://anonymous-0/schema.json".into(),
            pointer_to_violation: JsonPath::from_pointer(pointer).unwrap(),
            keyword: Some("type".into()),
            message: message.into(),
            causes: vec![],
        }
    }

    #[test]
    fn fetch_error_exit_codes() {
        let err = FetchError::FileNotFound {
            path: PathBuf::from("schema.json"),
        };
        assert_eq!(err.exit_code(), 3);

        let err = FetchError::UnsupportedScheme {
            url: "ftp://example.com/a.json".into(),
        };
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn validation_error_display() {
        let err = leaf("#/buyer/email", "expected type: string, found: number");
        assert_eq!(
            err.to_string(),
            "#/buyer/email: expected type: string, found: number"
        );
    }

    #[test]
    fn composite_counts_leaves() {
        let composite = ValidationError {
            kind: ValidationErrorKind::MultipleFailures,
            violated_schema: "mem://anonymous-0/schema.json".into(),
            pointer_to_violation: JsonPath::root(),
            keyword: None,
            message: "2 schema violations found".into(),
            causes: vec![leaf("#/a", "first"), leaf("#/b", "second")],
        };
        assert_eq!(composite.violation_count(), 2);
        assert_eq!(composite.all_messages(), vec!["#/a: first", "#/b: second"]);
    }

    #[test]
    fn serializes_pointer_as_fragment() {
        let json = leaf("/a/0", "bad").to_json();
        assert_eq!(json["pointerToViolation"], "#/a/0");
        assert_eq!(json["keyword"], "type");
        assert_eq!(json["schemaLocation"], "mem://anonymous-0/schema.json");
        assert!(json.get("causes").is_none());
    }
}
