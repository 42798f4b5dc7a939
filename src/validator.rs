//! Instance validation against a loaded schema graph.
//!
//! A [`Validator`] compiles every node reachable from its root once: each
//! node becomes a table of keyword rules grouped by the JSON value kind they
//! constrain, plus a separate `type` check. Validation then only dispatches
//! on the instance's kind and walks the compiled table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::error::{ValidationError, ValidationErrorKind, ValidatorError};
use crate::format::FormatRegistry;
use crate::keyword::Keyword;
use crate::pointer::JsonPath;
use crate::rules::{self, Rule, Site};
use crate::schema::{Schema, SchemaBody, SchemaGraph, SchemaId};
use crate::types::JsonType;

/// Options for building a [`Validator`].
#[derive(Debug, Clone)]
pub struct ValidatorOptions {
    formats: Arc<FormatRegistry>,
    assert_formats: bool,
}

impl Default for ValidatorOptions {
    fn default() -> Self {
        Self {
            formats: Arc::new(FormatRegistry::new()),
            assert_formats: true,
        }
    }
}

impl ValidatorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validators consulted by the `format` keyword.
    pub fn formats(mut self, registry: FormatRegistry) -> Self {
        self.formats = Arc::new(registry);
        self
    }

    /// When `false`, `format` is treated as an annotation only.
    pub fn assert_formats(mut self, assert: bool) -> Self {
        self.assert_formats = assert;
        self
    }

    pub fn format_registry(&self) -> &FormatRegistry {
        &self.formats
    }

    pub fn asserts_formats(&self) -> bool {
        self.assert_formats
    }
}

#[derive(Debug)]
enum CompiledNode {
    AlwaysValid,
    Reject,
    /// A `$ref`, standing for the node its chain ends at.
    Delegate(SchemaId),
    Rules {
        type_check: Option<Rule>,
        rules: Vec<Rule>,
        /// Indices into `rules`, per [`JsonType::index`].
        dispatch: [Vec<usize>; 6],
    },
}

/// A compiled, reusable validator for one schema.
///
/// Cheap to clone and safe to share between threads.
#[derive(Clone)]
pub struct Validator {
    schema: Schema,
    nodes: Arc<HashMap<SchemaId, CompiledNode>>,
}

impl fmt::Debug for Validator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validator")
            .field("schema", &self.schema)
            .field("nodes", &self.nodes.len())
            .finish()
    }
}

impl Validator {
    /// Compile `schema` with default options.
    ///
    /// # Errors
    ///
    /// Fails when a reachable `$ref` is unresolved or its chain is too long,
    /// or a pattern does not compile.
    pub fn new(schema: &Schema) -> Result<Self, ValidatorError> {
        Self::with_options(schema, &ValidatorOptions::default())
    }

    pub fn with_options(schema: &Schema, options: &ValidatorOptions) -> Result<Self, ValidatorError> {
        let graph = schema.graph();
        let mut nodes = HashMap::new();
        let mut queue = vec![schema.id()];

        while let Some(id) = queue.pop() {
            if nodes.contains_key(&id) {
                continue;
            }
            let node = graph.node(id);
            let compiled = match &node.body {
                SchemaBody::Boolean(true) => CompiledNode::AlwaysValid,
                SchemaBody::Boolean(false) => CompiledNode::Reject,
                SchemaBody::Ref { .. } => {
                    let target = graph.follow(id)?;
                    queue.push(target);
                    CompiledNode::Delegate(target)
                }
                SchemaBody::Keywords { keywords, .. } => {
                    for (keyword, value) in keywords {
                        if *keyword != Keyword::Definitions {
                            queue.extend(value.schemas().into_iter().copied());
                        }
                    }
                    let (type_check, rules) = rules::compile(graph, node, keywords, options)?;
                    if type_check.is_none() && rules.is_empty() {
                        CompiledNode::AlwaysValid
                    } else {
                        let dispatch = JsonType::ALL.map(|kind| {
                            rules
                                .iter()
                                .enumerate()
                                .filter(|(_, rule)| {
                                    let applies = rule.keyword.applies_to();
                                    applies.is_empty() || applies.contains(&kind)
                                })
                                .map(|(i, _)| i)
                                .collect()
                        });
                        CompiledNode::Rules {
                            type_check,
                            rules,
                            dispatch,
                        }
                    }
                }
            };
            nodes.insert(id, compiled);
        }

        debug!(
            schema = %schema.location(),
            nodes = nodes.len(),
            "validator compiled"
        );
        Ok(Self {
            schema: schema.clone(),
            nodes: Arc::new(nodes),
        })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Validate `instance`.
    ///
    /// A single violation is returned as is; several are wrapped in one
    /// [`ValidationErrorKind::MultipleFailures`] error.
    pub fn validate(&self, instance: &Value) -> Result<(), ValidationError> {
        self.evaluation()
            .descend(self.schema.id(), instance, &JsonPath::root())
    }

    /// Validate `instance`, appending any violation to `report`.
    ///
    /// Returns whether the instance is valid.
    pub fn validate_into(&self, instance: &Value, report: &mut ValidationReport) -> bool {
        match self.validate(instance) {
            Ok(()) => true,
            Err(e) => {
                report.push(e);
                false
            }
        }
    }

    pub fn is_valid(&self, instance: &Value) -> bool {
        self.validate(instance).is_ok()
    }

    fn evaluation(&self) -> Evaluation<'_> {
        Evaluation {
            graph: self.schema.graph(),
            nodes: &self.nodes,
            active: Vec::new(),
        }
    }
}

impl Schema {
    /// Compile a [`Validator`] for this schema with default options.
    pub fn validator(&self) -> Result<Validator, ValidatorError> {
        Validator::new(self)
    }
}

/// State of one `validate` call.
pub(crate) struct Evaluation<'a> {
    graph: &'a SchemaGraph,
    nodes: &'a HashMap<SchemaId, CompiledNode>,
    /// Nodes currently being applied, with the instance location.
    active: Vec<(SchemaId, JsonPath)>,
}

impl Evaluation<'_> {
    /// Validate `instance` (found at `path`) against node `id`.
    pub(crate) fn descend(
        &mut self,
        id: SchemaId,
        instance: &Value,
        path: &JsonPath,
    ) -> Result<(), ValidationError> {
        let nodes = self.nodes;
        let Some(node) = nodes.get(&id) else {
            return Ok(());
        };

        match node {
            CompiledNode::AlwaysValid => Ok(()),
            CompiledNode::Reject => Err(ValidationError {
                kind: ValidationErrorKind::FalseSchema,
                violated_schema: self.schema_uri(id),
                pointer_to_violation: path.clone(),
                keyword: None,
                message: "false schema permits no value".to_string(),
                causes: Vec::new(),
            }),
            CompiledNode::Delegate(target) => self.descend(*target, instance, path),
            CompiledNode::Rules {
                type_check,
                rules,
                dispatch,
            } => {
                if self.active.iter().any(|(node, at)| *node == id && at == path) {
                    return Ok(());
                }
                self.active.push((id, path.clone()));

                let schema = self.schema_uri(id);
                let mut errors = Vec::new();
                for &i in &dispatch[JsonType::of(instance).index()] {
                    let rule = &rules[i];
                    let site = Site {
                        schema: &schema,
                        keyword: rule.name,
                        path,
                    };
                    rule.check.evaluate(self, &site, instance, &mut errors);
                }
                if let Some(rule) = type_check {
                    let site = Site {
                        schema: &schema,
                        keyword: rule.name,
                        path,
                    };
                    rule.check.evaluate(self, &site, instance, &mut errors);
                }

                self.active.pop();
                fold(errors, schema, path)
            }
        }
    }

    fn schema_uri(&self, id: SchemaId) -> String {
        self.graph.node(id).location.canonical_uri().to_string()
    }
}

fn fold(
    mut errors: Vec<ValidationError>,
    schema: String,
    path: &JsonPath,
) -> Result<(), ValidationError> {
    match errors.len() {
        0 => Ok(()),
        1 => Err(errors.remove(0)),
        _ => Err(multiple_failures(errors, schema, path.clone())),
    }
}

fn multiple_failures(
    causes: Vec<ValidationError>,
    schema: String,
    path: JsonPath,
) -> ValidationError {
    let count: usize = causes.iter().map(ValidationError::violation_count).sum();
    ValidationError {
        kind: ValidationErrorKind::MultipleFailures,
        violated_schema: schema,
        pointer_to_violation: path,
        keyword: None,
        message: format!("{} schema violations found", count),
        causes,
    }
}

/// Violations collected over one or more `validate_into` calls.
#[derive(Debug, Clone, Default)]
pub struct ValidationReport {
    errors: Vec<ValidationError>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    /// The collected violations as one error, or `None` when there are none.
    pub fn into_error(mut self) -> Option<ValidationError> {
        match self.errors.len() {
            0 => None,
            1 => self.errors.pop(),
            _ => {
                let schema = self.errors[0].violated_schema.clone();
                Some(multiple_failures(self.errors, schema, JsonPath::root()))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::SchemaLoader;
    use serde_json::json;

    fn validator(schema: Value) -> Validator {
        SchemaLoader::new().load(&schema).unwrap().validator().unwrap()
    }

    #[test]
    fn validators_are_send_and_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Validator>();
        assert_send_sync::<Schema>();
    }

    #[test]
    fn single_violation_is_flattened() {
        let v = validator(json!({"type": "integer", "minimum": 0, "maximum": 10}));
        assert!(v.is_valid(&json!(5)));
        let err = v.validate(&json!(-1)).unwrap_err();
        assert!(err.is_leaf());
        assert_eq!(err.keyword.as_deref(), Some("minimum"));
        assert_eq!(err.kind, ValidationErrorKind::Minimum);
    }

    #[test]
    fn several_violations_are_wrapped() {
        let v = validator(json!({"type": "string", "minLength": 3, "pattern": "^[a-z]+$"}));
        let err = v.validate(&json!("A1")).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::MultipleFailures);
        assert_eq!(err.causes.len(), 2);
        assert_eq!(err.message, "2 schema violations found");
    }

    #[test]
    fn type_mismatch_message() {
        let v = validator(json!({"type": "string"}));
        let err = v.validate(&json!(42)).unwrap_err();
        assert_eq!(err.message, "expected type: string, found: number");
        assert_eq!(err.keyword.as_deref(), Some("type"));
    }

    #[test]
    fn keywords_only_constrain_their_kind() {
        let v = validator(json!({"minLength": 2, "minimum": 5, "required": ["a"]}));
        assert!(v.is_valid(&json!(true)));
        assert!(v.is_valid(&json!([])));
        assert!(!v.is_valid(&json!("x")));
        assert!(!v.is_valid(&json!(1)));
        assert!(!v.is_valid(&json!({})));
    }

    #[test]
    fn self_reference_terminates() {
        let v = validator(json!({"$id": "#root", "properties": {"x": {"$ref": "#root"}}}));
        assert!(v.is_valid(&json!({"x": {"x": {}}})));
    }

    #[test]
    fn cyclic_all_of_without_descent_terminates() {
        let v = validator(json!({
            "definitions": {
                "a": {"allOf": [{"$ref": "#/definitions/b"}], "minimum": 1},
                "b": {"allOf": [{"$ref": "#/definitions/a"}]}
            },
            "$ref": "#/definitions/a"
        }));
        assert!(v.is_valid(&json!(2)));
        assert!(!v.is_valid(&json!(0)));
    }

    #[test]
    fn unknown_formats_are_ignored() {
        let v = validator(json!({"format": "no-such-format"}));
        assert!(v.is_valid(&json!("anything")));
    }

    #[test]
    fn formats_can_be_disabled_or_replaced() {
        let schema = SchemaLoader::new()
            .load(&json!({"format": "ipv4"}))
            .unwrap();
        assert!(!Validator::new(&schema).unwrap().is_valid(&json!("nope")));

        let lenient = ValidatorOptions::new().assert_formats(false);
        assert!(Validator::with_options(&schema, &lenient)
            .unwrap()
            .is_valid(&json!("nope")));

        let custom = ValidatorOptions::new().formats(
            FormatRegistry::empty().with("ipv4", |v: &str| {
                if v == "nope" {
                    Ok(())
                } else {
                    Err("only nope".to_string())
                }
            }),
        );
        let v = Validator::with_options(&schema, &custom).unwrap();
        assert!(v.is_valid(&json!("nope")));
        assert!(!v.is_valid(&json!("10.0.0.1")));
    }

    #[test]
    fn false_schema_rejects_everything() {
        let v = validator(json!({"$schema": "http://json-schema.org/draft-06/schema#", "properties": {"a": false}}));
        let err = v.validate(&json!({"a": null})).unwrap_err();
        assert_eq!(err.kind, ValidationErrorKind::FalseSchema);
        assert_eq!(err.pointer_to_violation.to_pointer(), "/a");
        assert!(v.is_valid(&json!({"b": null})));
    }

    #[test]
    fn report_collects_across_calls() {
        let v = validator(json!({"type": "number"}));
        let mut report = ValidationReport::new();
        assert!(v.validate_into(&json!(1), &mut report));
        assert!(!v.validate_into(&json!("a"), &mut report));
        assert!(!v.validate_into(&json!(null), &mut report));
        assert_eq!(report.len(), 2);
        let err = report.into_error().unwrap();
        assert_eq!(err.kind, ValidationErrorKind::MultipleFailures);
        assert!(ValidationReport::new().into_error().is_none());
    }
}
