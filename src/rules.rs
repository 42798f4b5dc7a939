//! Keyword validators: compiled from canonical keywords, evaluated against
//! instance values.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Map, Number, Value};
use tracing::debug;

use crate::error::{ValidationError, ValidationErrorKind, ValidatorError};
use crate::format::FormatValidator;
use crate::keyword::{Dependency, Items, Keyword, KeywordMap, KeywordValue, NumericLimit, TypeSet};
use crate::number;
use crate::pointer::JsonPath;
use crate::schema::{SchemaBody, SchemaGraph, SchemaId, SchemaNode};
use crate::types::{json_type_name, SchemaType};
use crate::validator::{Evaluation, ValidatorOptions};

/// What may follow the tuple part of an array, or the declared properties
/// of an object.
#[derive(Debug, Clone)]
pub(crate) enum Additional {
    Forbidden,
    Schema(SchemaId),
}

#[derive(Debug, Clone)]
pub(crate) enum KeywordValidator {
    Type {
        types: Vec<SchemaType>,
        schemas: Vec<SchemaId>,
    },
    Disallow {
        types: Vec<SchemaType>,
        schemas: Vec<SchemaId>,
    },
    Enum(Vec<Value>),
    Const(Value),
    MultipleOf(Number),
    Minimum(NumericLimit),
    Maximum(NumericLimit),
    MinLength(u64),
    MaxLength(u64),
    Pattern(Regex),
    Format {
        name: String,
        validator: Arc<dyn FormatValidator>,
    },
    Items(SchemaId),
    TupleItems(Vec<SchemaId>),
    AdditionalItems {
        start: usize,
        additional: Additional,
    },
    MinItems(u64),
    MaxItems(u64),
    UniqueItems,
    Contains(SchemaId),
    Properties(Vec<(String, SchemaId)>),
    PatternProperties(Vec<(Regex, SchemaId)>),
    AdditionalProperties {
        declared: Vec<String>,
        patterns: Vec<Regex>,
        additional: Additional,
    },
    Required(Vec<String>),
    MinProperties(u64),
    MaxProperties(u64),
    Dependencies(Vec<(String, Dependency)>),
    PropertyNames(SchemaId),
    AllOf(Vec<SchemaId>),
    AnyOf(Vec<SchemaId>),
    OneOf(Vec<SchemaId>),
    Not(SchemaId),
}

impl std::fmt::Debug for dyn FormatValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FormatValidator")
    }
}

/// A compiled keyword and the name it reports violations under.
#[derive(Debug, Clone)]
pub(crate) struct Rule {
    pub keyword: Keyword,
    pub name: &'static str,
    pub check: KeywordValidator,
}

/// Compile the keywords of one node. Returns the `type` check separately
/// from the other rules.
pub(crate) fn compile(
    graph: &SchemaGraph,
    node: &SchemaNode,
    keywords: &KeywordMap,
    options: &ValidatorOptions,
) -> Result<(Option<Rule>, Vec<Rule>), ValidatorError> {
    let location = node.location.to_string();
    let mut type_check = None;
    let mut rules = Vec::new();

    for (keyword, value) in keywords {
        let check = match (keyword, value) {
            (Keyword::Type, KeywordValue::Types(set)) => {
                type_check = Some(Rule {
                    keyword: Keyword::Type,
                    name: "type",
                    check: KeywordValidator::Type {
                        types: set.types.clone(),
                        schemas: set.schemas.clone(),
                    },
                });
                continue;
            }
            (Keyword::Disallow, KeywordValue::Types(TypeSet { types, schemas, .. })) => {
                KeywordValidator::Disallow {
                    types: types.clone(),
                    schemas: schemas.clone(),
                }
            }
            (Keyword::Enum, KeywordValue::Values(values)) => KeywordValidator::Enum(values.clone()),
            (Keyword::Const, KeywordValue::Json(value)) => KeywordValidator::Const(value.clone()),
            (Keyword::MultipleOf, KeywordValue::Number(n)) => KeywordValidator::MultipleOf(n.clone()),
            (Keyword::Minimum, KeywordValue::Limit(limit)) => KeywordValidator::Minimum(limit.clone()),
            (Keyword::Maximum, KeywordValue::Limit(limit)) => KeywordValidator::Maximum(limit.clone()),
            (Keyword::MinLength, KeywordValue::Count(n)) => KeywordValidator::MinLength(*n),
            (Keyword::MaxLength, KeywordValue::Count(n)) => KeywordValidator::MaxLength(*n),
            (Keyword::Pattern, KeywordValue::String(pattern)) => {
                KeywordValidator::Pattern(compile_regex(&location, pattern)?)
            }
            (Keyword::Format, KeywordValue::String(name)) => {
                if !options.asserts_formats() {
                    continue;
                }
                match options.format_registry().get(name) {
                    Some(validator) => KeywordValidator::Format {
                        name: name.clone(),
                        validator,
                    },
                    None => {
                        debug!(format = %name, location = %location, "unknown format ignored");
                        continue;
                    }
                }
            }
            (Keyword::Items, KeywordValue::Items(Items::Single(id))) => KeywordValidator::Items(*id),
            (Keyword::Items, KeywordValue::Items(Items::Tuple(ids))) => {
                KeywordValidator::TupleItems(ids.clone())
            }
            (Keyword::AdditionalItems, KeywordValue::Schema(id)) => {
                let Some(KeywordValue::Items(Items::Tuple(tuple))) = keywords.get(&Keyword::Items)
                else {
                    continue;
                };
                let Some(additional) = additional(graph, *id) else {
                    continue;
                };
                KeywordValidator::AdditionalItems {
                    start: tuple.len(),
                    additional,
                }
            }
            (Keyword::MinItems, KeywordValue::Count(n)) => KeywordValidator::MinItems(*n),
            (Keyword::MaxItems, KeywordValue::Count(n)) => KeywordValidator::MaxItems(*n),
            (Keyword::UniqueItems, KeywordValue::Bool(true)) => KeywordValidator::UniqueItems,
            (Keyword::Contains, KeywordValue::Schema(id)) => KeywordValidator::Contains(*id),
            (Keyword::Properties, KeywordValue::SchemaMap(map)) => {
                KeywordValidator::Properties(map.clone())
            }
            (Keyword::PatternProperties, KeywordValue::SchemaMap(map)) => {
                KeywordValidator::PatternProperties(
                    map.iter()
                        .map(|(pattern, id)| Ok((compile_regex(&location, pattern)?, *id)))
                        .collect::<Result<_, ValidatorError>>()?,
                )
            }
            (Keyword::AdditionalProperties, KeywordValue::Schema(id)) => {
                let Some(additional) = additional(graph, *id) else {
                    continue;
                };
                let declared = match keywords.get(&Keyword::Properties) {
                    Some(KeywordValue::SchemaMap(map)) => {
                        map.iter().map(|(name, _)| name.clone()).collect()
                    }
                    _ => Vec::new(),
                };
                let patterns = match keywords.get(&Keyword::PatternProperties) {
                    Some(KeywordValue::SchemaMap(map)) => map
                        .iter()
                        .map(|(pattern, _)| compile_regex(&location, pattern))
                        .collect::<Result<_, _>>()?,
                    _ => Vec::new(),
                };
                KeywordValidator::AdditionalProperties {
                    declared,
                    patterns,
                    additional,
                }
            }
            (Keyword::Required, KeywordValue::Strings(names)) if !names.is_empty() => {
                KeywordValidator::Required(names.clone())
            }
            (Keyword::MinProperties, KeywordValue::Count(n)) => KeywordValidator::MinProperties(*n),
            (Keyword::MaxProperties, KeywordValue::Count(n)) => KeywordValidator::MaxProperties(*n),
            (Keyword::Dependencies, KeywordValue::Dependencies(deps)) => {
                KeywordValidator::Dependencies(deps.clone())
            }
            (Keyword::PropertyNames, KeywordValue::Schema(id)) => KeywordValidator::PropertyNames(*id),
            (Keyword::AllOf, KeywordValue::Schemas(ids)) => KeywordValidator::AllOf(ids.clone()),
            (Keyword::AnyOf, KeywordValue::Schemas(ids)) => KeywordValidator::AnyOf(ids.clone()),
            (Keyword::OneOf, KeywordValue::Schemas(ids)) => KeywordValidator::OneOf(ids.clone()),
            (Keyword::Not, KeywordValue::Schema(id)) => KeywordValidator::Not(*id),
            _ => continue,
        };
        rules.push(Rule {
            keyword: *keyword,
            name: keyword.surface_key(node.draft).unwrap_or(keyword.name()),
            check,
        });
    }

    Ok((type_check, rules))
}

fn compile_regex(location: &str, pattern: &str) -> Result<Regex, ValidatorError> {
    Regex::new(pattern).map_err(|source| ValidatorError::InvalidPattern {
        location: location.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

/// `None` when the subschema is `true` and the keyword can be skipped.
fn additional(graph: &SchemaGraph, id: SchemaId) -> Option<Additional> {
    let target = graph.follow(id).ok()?;
    match graph.node(target).body {
        SchemaBody::Boolean(true) => None,
        SchemaBody::Boolean(false) => Some(Additional::Forbidden),
        _ => Some(Additional::Schema(id)),
    }
}

/// Where a violation happened, for building errors.
pub(crate) struct Site<'s> {
    pub schema: &'s str,
    pub keyword: &'static str,
    pub path: &'s JsonPath,
}

impl Site<'_> {
    fn leaf(&self, kind: ValidationErrorKind, message: String) -> ValidationError {
        self.at(self.path, kind, message)
    }

    fn at(&self, path: &JsonPath, kind: ValidationErrorKind, message: String) -> ValidationError {
        ValidationError {
            kind,
            violated_schema: self.schema.to_string(),
            pointer_to_violation: path.clone(),
            keyword: Some(self.keyword.to_string()),
            message,
            causes: Vec::new(),
        }
    }

    fn composite(
        &self,
        kind: ValidationErrorKind,
        message: String,
        causes: Vec<ValidationError>,
    ) -> ValidationError {
        ValidationError {
            causes,
            ..self.leaf(kind, message)
        }
    }
}

impl KeywordValidator {
    /// Check `instance`, pushing every violation onto `errors`.
    pub(crate) fn evaluate(
        &self,
        eval: &mut Evaluation<'_>,
        site: &Site<'_>,
        instance: &Value,
        errors: &mut Vec<ValidationError>,
    ) {
        use ValidationErrorKind as Kind;
        let path = site.path;

        match (self, instance) {
            (KeywordValidator::Type { types, schemas }, _) => {
                let matched = types.iter().any(|t| t.matches(instance))
                    || schemas
                        .iter()
                        .any(|id| eval.descend(*id, instance, path).is_ok());
                if !matched {
                    errors.push(site.leaf(
                        Kind::TypeMismatch,
                        format!(
                            "expected type: {}, found: {}",
                            describe_types(types, schemas.len()),
                            json_type_name(instance)
                        ),
                    ));
                }
            }
            (KeywordValidator::Disallow { types, schemas }, _) => {
                if let Some(t) = types.iter().find(|t| t.matches(instance)) {
                    errors.push(site.leaf(Kind::Disallow, format!("type {} is disallowed", t)));
                } else if schemas
                    .iter()
                    .any(|id| eval.descend(*id, instance, path).is_ok())
                {
                    errors.push(site.leaf(
                        Kind::Disallow,
                        "subject matches a disallowed schema".to_string(),
                    ));
                }
            }
            (KeywordValidator::Enum(values), _) => {
                if !values.iter().any(|v| json_equal(v, instance)) {
                    errors.push(site.leaf(
                        Kind::Enum,
                        format!("{} is not a valid enum value", instance),
                    ));
                }
            }
            (KeywordValidator::Const(expected), _) => {
                if !json_equal(expected, instance) {
                    errors.push(site.leaf(
                        Kind::Const,
                        format!("{} does not match the expected constant {}", instance, expected),
                    ));
                }
            }
            (KeywordValidator::MultipleOf(divisor), Value::Number(n)) => {
                if !number::is_multiple_of(n, divisor) {
                    errors.push(site.leaf(
                        Kind::MultipleOf,
                        format!("{} is not a multiple of {}", n, divisor),
                    ));
                }
            }
            (KeywordValidator::Minimum(limit), Value::Number(n)) => {
                let ordering = number::compare(n, &limit.limit);
                if ordering.is_lt() || (limit.exclusive && ordering.is_eq()) {
                    let relation = if limit.exclusive { "greater than" } else { "greater or equal to" };
                    errors.push(site.leaf(
                        Kind::Minimum,
                        format!("{} is not {} {}", n, relation, limit.limit),
                    ));
                }
            }
            (KeywordValidator::Maximum(limit), Value::Number(n)) => {
                let ordering = number::compare(n, &limit.limit);
                if ordering.is_gt() || (limit.exclusive && ordering.is_eq()) {
                    let relation = if limit.exclusive { "less than" } else { "less or equal to" };
                    errors.push(site.leaf(
                        Kind::Maximum,
                        format!("{} is not {} {}", n, relation, limit.limit),
                    ));
                }
            }
            (KeywordValidator::MinLength(min), Value::String(s)) => {
                let length = s.chars().count() as u64;
                if length < *min {
                    errors.push(site.leaf(
                        Kind::MinLength,
                        format!("expected minLength: {}, actual: {}", min, length),
                    ));
                }
            }
            (KeywordValidator::MaxLength(max), Value::String(s)) => {
                let length = s.chars().count() as u64;
                if length > *max {
                    errors.push(site.leaf(
                        Kind::MaxLength,
                        format!("expected maxLength: {}, actual: {}", max, length),
                    ));
                }
            }
            (KeywordValidator::Pattern(regex), Value::String(s)) => {
                if !regex.is_match(s) {
                    errors.push(site.leaf(
                        Kind::Pattern,
                        format!("string [{}] does not match pattern {}", s, regex.as_str()),
                    ));
                }
            }
            (KeywordValidator::Format { name, validator }, Value::String(s)) => {
                if let Err(message) = validator.validate(s) {
                    errors.push(site.leaf(Kind::Format, format!("[{}] {}", name, message)));
                }
            }
            (KeywordValidator::Items(id), Value::Array(items)) => {
                for (i, item) in items.iter().enumerate() {
                    if let Err(e) = eval.descend(*id, item, &path.child_index(i)) {
                        errors.push(e);
                    }
                }
            }
            (KeywordValidator::TupleItems(ids), Value::Array(items)) => {
                for (i, (id, item)) in ids.iter().zip(items).enumerate() {
                    if let Err(e) = eval.descend(*id, item, &path.child_index(i)) {
                        errors.push(e);
                    }
                }
            }
            (KeywordValidator::AdditionalItems { start, additional }, Value::Array(items)) => {
                for (i, item) in items.iter().enumerate().skip(*start) {
                    let item_path = path.child_index(i);
                    match additional {
                        Additional::Forbidden => errors.push(site.at(
                            &item_path,
                            Kind::AdditionalItems,
                            format!(
                                "item {} is not permitted: at most {} items are allowed",
                                i, start
                            ),
                        )),
                        Additional::Schema(id) => {
                            if let Err(e) = eval.descend(*id, item, &item_path) {
                                errors.push(e);
                            }
                        }
                    }
                }
            }
            (KeywordValidator::MinItems(min), Value::Array(items)) => {
                if (items.len() as u64) < *min {
                    errors.push(site.leaf(
                        Kind::MinItems,
                        format!("expected minimum item count: {}, found: {}", min, items.len()),
                    ));
                }
            }
            (KeywordValidator::MaxItems(max), Value::Array(items)) => {
                if (items.len() as u64) > *max {
                    errors.push(site.leaf(
                        Kind::MaxItems,
                        format!("expected maximum item count: {}, found: {}", max, items.len()),
                    ));
                }
            }
            (KeywordValidator::UniqueItems, Value::Array(items)) => {
                if let Some((i, j)) = first_duplicate(items) {
                    errors.push(site.leaf(
                        Kind::UniqueItems,
                        format!("array items are not unique: items {} and {} are equal", i, j),
                    ));
                }
            }
            (KeywordValidator::Contains(id), Value::Array(items)) => {
                let found = items
                    .iter()
                    .enumerate()
                    .any(|(i, item)| eval.descend(*id, item, &path.child_index(i)).is_ok());
                if !found {
                    errors.push(site.leaf(
                        Kind::Contains,
                        "expected at least one array item to match the contains schema".to_string(),
                    ));
                }
            }
            (KeywordValidator::Properties(properties), Value::Object(map)) => {
                for (name, id) in properties {
                    if let Some(value) = map.get(name) {
                        if let Err(e) = eval.descend(*id, value, &path.child_key(name.as_str())) {
                            errors.push(e);
                        }
                    }
                }
            }
            (KeywordValidator::PatternProperties(patterns), Value::Object(map)) => {
                for (regex, id) in patterns {
                    for (name, value) in map.iter().filter(|(name, _)| regex.is_match(name)) {
                        if let Err(e) = eval.descend(*id, value, &path.child_key(name.as_str())) {
                            errors.push(e);
                        }
                    }
                }
            }
            (
                KeywordValidator::AdditionalProperties {
                    declared,
                    patterns,
                    additional,
                },
                Value::Object(map),
            ) => {
                let extra = map.iter().filter(|(name, _)| {
                    !declared.contains(name) && !patterns.iter().any(|re| re.is_match(name))
                });
                for (name, value) in extra {
                    match additional {
                        Additional::Forbidden => errors.push(site.leaf(
                            Kind::AdditionalProperties,
                            format!("extraneous key [{}] is not permitted", name),
                        )),
                        Additional::Schema(id) => {
                            if let Err(e) =
                                eval.descend(*id, value, &path.child_key(name.as_str()))
                            {
                                errors.push(e);
                            }
                        }
                    }
                }
            }
            (KeywordValidator::Required(names), Value::Object(map)) => {
                for name in names.iter().filter(|name| !map.contains_key(*name)) {
                    errors.push(site.leaf(
                        Kind::Required,
                        format!("required key [{}] not found", name),
                    ));
                }
            }
            (KeywordValidator::MinProperties(min), Value::Object(map)) => {
                if (map.len() as u64) < *min {
                    errors.push(site.leaf(
                        Kind::MinProperties,
                        format!("minimum size: [{}], found: [{}]", min, map.len()),
                    ));
                }
            }
            (KeywordValidator::MaxProperties(max), Value::Object(map)) => {
                if (map.len() as u64) > *max {
                    errors.push(site.leaf(
                        Kind::MaxProperties,
                        format!("maximum size: [{}], found: [{}]", max, map.len()),
                    ));
                }
            }
            (KeywordValidator::Dependencies(deps), Value::Object(map)) => {
                evaluate_dependencies(eval, site, deps, instance, map, errors);
            }
            (KeywordValidator::PropertyNames(id), Value::Object(map)) => {
                for name in map.keys() {
                    let key = Value::String(name.clone());
                    if let Err(e) = eval.descend(*id, &key, &path.child_key(name.as_str())) {
                        errors.push(site.composite(
                            Kind::PropertyNames,
                            format!("property name [{}] is not valid", name),
                            vec![e],
                        ));
                    }
                }
            }
            (KeywordValidator::AllOf(ids), _) => {
                let failures: Vec<_> = ids
                    .iter()
                    .filter_map(|id| eval.descend(*id, instance, path).err())
                    .collect();
                if !failures.is_empty() {
                    errors.push(site.composite(
                        Kind::AllOfFailure,
                        format!("{} of {} subschemas failed to match", failures.len(), ids.len()),
                        failures,
                    ));
                }
            }
            (KeywordValidator::AnyOf(ids), _) => {
                let mut failures = Vec::new();
                for id in ids {
                    match eval.descend(*id, instance, path) {
                        Ok(()) => return,
                        Err(e) => failures.push(e),
                    }
                }
                errors.push(site.composite(
                    Kind::AnyOfFailure,
                    format!("0 of {} subschemas matched", ids.len()),
                    failures,
                ));
            }
            (KeywordValidator::OneOf(ids), _) => {
                let mut failures = Vec::new();
                let mut matched = 0;
                for id in ids {
                    match eval.descend(*id, instance, path) {
                        Ok(()) => matched += 1,
                        Err(e) => failures.push(e),
                    }
                }
                if matched != 1 {
                    if matched > 1 {
                        failures.clear();
                    }
                    errors.push(site.composite(
                        Kind::OneOfFailure,
                        format!("{} subschemas matched instead of one", matched),
                        failures,
                    ));
                }
            }
            (KeywordValidator::Not(id), _) => {
                if eval.descend(*id, instance, path).is_ok() {
                    errors.push(site.leaf(
                        Kind::Not,
                        "subject must not be valid against schema".to_string(),
                    ));
                }
            }
            // keyword does not apply to this kind of value
            _ => {}
        }
    }
}

fn evaluate_dependencies(
    eval: &mut Evaluation<'_>,
    site: &Site<'_>,
    deps: &[(String, Dependency)],
    instance: &Value,
    map: &Map<String, Value>,
    errors: &mut Vec<ValidationError>,
) {
    for (name, dependency) in deps.iter().filter(|(name, _)| map.contains_key(name)) {
        match dependency {
            Dependency::Properties(required) => {
                for missing in required.iter().filter(|r| !map.contains_key(*r)) {
                    errors.push(site.leaf(
                        ValidationErrorKind::Dependencies,
                        format!("property [{}] is required by [{}]", missing, name),
                    ));
                }
            }
            Dependency::Schema(id) => {
                if let Err(e) = eval.descend(*id, instance, site.path) {
                    errors.push(e);
                }
            }
        }
    }
}

fn describe_types(types: &[SchemaType], schemas: usize) -> String {
    let mut names: Vec<String> = types.iter().map(|t| t.to_string()).collect();
    if schemas > 0 {
        names.push(format!("{} schema(s)", schemas));
    }
    match names.as_slice() {
        [single] => single.clone(),
        _ => format!("one of [{}]", names.join(", ")),
    }
}

/// JSON equality where numerically equal numbers are equal (`1 == 1.0`).
pub(crate) fn json_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => number::equals(x, y),
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(a, b)| json_equal(a, b))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.len() == y.len()
                && x
                    .iter()
                    .all(|(key, a)| y.get(key).is_some_and(|b| json_equal(a, b)))
        }
        _ => a == b,
    }
}

fn first_duplicate(items: &[Value]) -> Option<(usize, usize)> {
    for (i, a) in items.iter().enumerate() {
        for (j, b) in items.iter().enumerate().skip(i + 1) {
            if json_equal(a, b) {
                return Some((i, j));
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numeric_equality_ignores_representation() {
        assert!(json_equal(&json!(1), &json!(1.0)));
        assert!(json_equal(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!json_equal(&json!([1]), &json!([1, 1])));
        assert!(!json_equal(&json!("1"), &json!(1)));
    }

    #[test]
    fn duplicates_found_by_position() {
        assert_eq!(first_duplicate(&[json!(1), json!(2), json!(1.0)]), Some((0, 2)));
        assert_eq!(first_duplicate(&[json!({"a": 1}), json!({"a": 2})]), None);
    }

    #[test]
    fn type_descriptions() {
        assert_eq!(describe_types(&[SchemaType::String], 0), "string");
        assert_eq!(
            describe_types(&[SchemaType::String, SchemaType::Null], 1),
            "one of [string, null, 1 schema(s)]"
        );
    }
}
