//! Loading reports: hierarchical issues collected while building a schema.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Severity level for issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => f.write_str("info"),
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

/// What went wrong while loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum LoadingIssueKind {
    /// Keyword present with the wrong JSON type; the keyword is ignored.
    TypeMismatch,
    /// Keyword value has the right type but an unusable value.
    InvalidValue,
    /// Two keywords that cannot both apply; one wins.
    ConflictingKeyword,
    /// Keyword unknown to the draft; kept as a passthrough property.
    UnknownKeyword,
    /// Keyword dropped because a sibling `$ref` replaces the node.
    IgnoredKeyword,
    /// `pattern`/`patternProperties` that does not compile.
    InvalidPattern,
    UnresolvableReference,
    InvalidLocation,
}

/// A single issue, possibly with nested issues.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub kind: LoadingIssueKind,
    /// URI of the schema node the issue is about.
    pub location: String,
    pub message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub arguments: Vec<Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Issue>,
}

impl Issue {
    pub fn new(
        severity: Severity,
        kind: LoadingIssueKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            severity,
            kind,
            location: location.into(),
            message: message.into(),
            arguments: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn with_argument(mut self, argument: impl Into<Value>) -> Self {
        self.arguments.push(argument.into());
        self
    }

    pub fn has_errors(&self) -> bool {
        self.severity == Severity::Error || self.children.iter().any(Issue::has_errors)
    }

    fn error_count(&self) -> usize {
        let own = usize::from(self.severity == Severity::Error);
        own + self.children.iter().map(Issue::error_count).sum::<usize>()
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.location, self.message)
    }
}

/// Issue tree collected across one load.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LoadingReport {
    pub issues: Vec<Issue>,
}

impl LoadingReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, issue: Issue) {
        self.issues.push(issue);
    }

    pub fn error(
        &mut self,
        kind: LoadingIssueKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Issue::new(Severity::Error, kind, location, message));
    }

    pub fn warning(
        &mut self,
        kind: LoadingIssueKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Issue::new(Severity::Warning, kind, location, message));
    }

    pub fn info(
        &mut self,
        kind: LoadingIssueKind,
        location: impl Into<String>,
        message: impl Into<String>,
    ) {
        self.push(Issue::new(Severity::Info, kind, location, message));
    }

    /// Nest another report's issues under a single parent issue.
    pub fn push_nested(&mut self, mut parent: Issue, child: LoadingReport) {
        parent.children.extend(child.issues);
        self.push(parent);
    }

    pub fn has_errors(&self) -> bool {
        self.issues.iter().any(Issue::has_errors)
    }

    pub fn error_count(&self) -> usize {
        self.issues.iter().map(Issue::error_count).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.issues.len()
    }

    /// Issues of one kind, searched through the whole tree.
    pub fn find(&self, kind: LoadingIssueKind) -> Vec<&Issue> {
        fn walk<'a>(issues: &'a [Issue], kind: LoadingIssueKind, out: &mut Vec<&'a Issue>) {
            for issue in issues {
                if issue.kind == kind {
                    out.push(issue);
                }
                walk(&issue.children, kind, out);
            }
        }
        let mut out = Vec::new();
        walk(&self.issues, kind, &mut out);
        out
    }
}

impl fmt::Display for LoadingReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_issue(f: &mut fmt::Formatter<'_>, issue: &Issue, depth: usize) -> fmt::Result {
            writeln!(f, "{:indent$}{}", "", issue, indent = depth * 2)?;
            for child in &issue.children {
                write_issue(f, child, depth + 1)?;
            }
            Ok(())
        }
        for issue in &self.issues {
            write_issue(f, issue, 0)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warnings_are_not_errors() {
        let mut report = LoadingReport::new();
        report.warning(LoadingIssueKind::ConflictingKeyword, "#", "items conflict");
        report.info(LoadingIssueKind::UnknownKeyword, "#", "unknown keyword foo");
        assert!(!report.has_errors());
        assert_eq!(report.error_count(), 0);
        assert_eq!(report.len(), 2);
    }

    #[test]
    fn nested_errors_aggregate() {
        let mut child = LoadingReport::new();
        child.error(
            LoadingIssueKind::UnresolvableReference,
            "#/properties/a",
            "no such pointer",
        );
        let mut report = LoadingReport::new();
        report.push_nested(
            Issue::new(
                Severity::Warning,
                LoadingIssueKind::InvalidLocation,
                "#",
                "while loading properties",
            ),
            child,
        );
        assert!(report.has_errors());
        assert_eq!(report.error_count(), 1);
        assert_eq!(report.find(LoadingIssueKind::UnresolvableReference).len(), 1);
    }

    #[test]
    fn display_indents_children() {
        let mut parent = Issue::new(Severity::Error, LoadingIssueKind::InvalidValue, "a", "outer");
        parent
            .children
            .push(Issue::new(Severity::Error, LoadingIssueKind::InvalidValue, "b", "inner"));
        let report = LoadingReport {
            issues: vec![parent],
        };
        assert_eq!(
            report.to_string(),
            "error at a: outer\n  error at b: inner\n"
        );
    }

    #[test]
    fn arguments_serialize() {
        let issue = Issue::new(Severity::Warning, LoadingIssueKind::TypeMismatch, "#", "bad")
            .with_argument("minimum")
            .with_argument(2);
        let json = serde_json::to_value(&issue).unwrap();
        assert_eq!(json["arguments"], serde_json::json!(["minimum", 2]));
        assert_eq!(json["kind"], "typeMismatch");
    }
}
