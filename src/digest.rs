//! Translation of raw schema JSON into [`SchemaBuilder`]s.
//!
//! The digester is the only place that knows each draft's surface syntax.
//! Everything downstream sees canonical keywords.

use regex::Regex;
use serde_json::{Map, Number, Value};

use crate::builder::SchemaBuilder;
use crate::keyword::{Dependency, Items, Keyword, KeywordMetadata, KeywordValue, NumericLimit, TypeSet};
use crate::number;
use crate::report::{LoadingIssueKind, Severity};
use crate::types::{json_type_name, Draft, SchemaType};

/// Draft-aware JSON → builder translation.
#[derive(Debug, Clone, Copy)]
pub struct Digester {
    draft: Draft,
    strict: bool,
}

/// Numeric bounds collected from one schema object before they are folded
/// into a single canonical limit.
#[derive(Default)]
struct Bounds {
    inclusive: Option<Number>,
    exclusive_flag: Option<bool>,
    exclusive: Option<Number>,
}

impl Digester {
    pub fn new(draft: Draft, strict: bool) -> Self {
        Self { draft, strict }
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    /// Digest a schema document (or any subschema of one).
    pub fn digest(&self, value: &Value) -> SchemaBuilder {
        self.schema(value, self.draft)
    }

    fn mismatch(&self) -> Severity {
        if self.strict {
            Severity::Error
        } else {
            Severity::Warning
        }
    }

    fn schema(&self, value: &Value, draft: Draft) -> SchemaBuilder {
        match value {
            Value::Object(map) => self.object(map, draft),
            Value::Bool(b) if draft >= Draft::V6 => SchemaBuilder::boolean(*b),
            other => {
                let mut builder = SchemaBuilder::new();
                builder.issue(
                    self.mismatch(),
                    LoadingIssueKind::TypeMismatch,
                    format!(
                        "expected a schema object in {}, found: {}",
                        draft,
                        json_type_name(other)
                    ),
                );
                builder
            }
        }
    }

    fn object(&self, map: &Map<String, Value>, inherited: Draft) -> SchemaBuilder {
        let mut builder = SchemaBuilder::new();

        let draft = match map.get("$schema") {
            Some(Value::String(uri)) => match Draft::from_url(uri) {
                Some(draft) => {
                    builder.set_draft(draft);
                    draft
                }
                None => {
                    builder.issue(
                        Severity::Warning,
                        LoadingIssueKind::InvalidValue,
                        format!("unrecognized meta-schema {}, assuming {}", uri, inherited),
                    );
                    inherited
                }
            },
            _ => inherited,
        };

        match map.get(draft.id_keyword()) {
            Some(Value::String(id)) => builder.set_id(id.clone()),
            Some(other) => builder.issue(
                self.mismatch(),
                LoadingIssueKind::TypeMismatch,
                format!(
                    "{} must be a string, found: {}",
                    draft.id_keyword(),
                    json_type_name(other)
                ),
            ),
            None => {}
        }

        if let Some(reference) = map.get("$ref") {
            match reference {
                Value::String(reference) => {
                    builder.set_reference(reference.clone());
                    // Siblings are replaced by the target; keep them verbatim
                    // so the build can report what was dropped.
                    for (key, value) in map {
                        if key != "$ref" && key != draft.id_keyword() {
                            builder.set_extra(key.clone(), value.clone());
                        }
                    }
                    return builder;
                }
                other => builder.issue(
                    self.mismatch(),
                    LoadingIssueKind::TypeMismatch,
                    format!("$ref must be a string, found: {}", json_type_name(other)),
                ),
            }
        }

        let mut minimum = Bounds::default();
        let mut maximum = Bounds::default();

        for (key, value) in map {
            if key == "$ref" || key == draft.id_keyword() {
                continue;
            }
            let Some(meta) = KeywordMetadata::lookup(key, draft) else {
                builder.issue(
                    Severity::Info,
                    LoadingIssueKind::UnknownKeyword,
                    format!("unknown keyword {} in {}, kept as is", key, draft),
                );
                builder.set_extra(key.clone(), value.clone());
                continue;
            };
            if !meta.accepts_value(value, draft) {
                builder.issue(
                    self.mismatch(),
                    LoadingIssueKind::TypeMismatch,
                    format!(
                        "{} expects {}, found: {}",
                        key,
                        meta.accepted_names(),
                        json_type_name(value)
                    ),
                );
                continue;
            }

            match (meta.canonical, value) {
                (Keyword::Minimum, _) => collect_bound(&mut minimum, key, value),
                (Keyword::Maximum, _) => collect_bound(&mut maximum, key, value),
                (Keyword::Required, Value::Bool(_)) => {
                    // draft 3 flag, lifted into the parent's list
                }
                (keyword, value) => {
                    if let Some(canonical) = self.keyword(&mut builder, keyword, key, value, draft) {
                        builder.set(keyword, canonical);
                    }
                }
            }
        }

        if let Some(limit) = self.fold_bounds(&mut builder, minimum, "minimum", draft, true) {
            builder.set(Keyword::Minimum, KeywordValue::Limit(limit));
        }
        if let Some(limit) = self.fold_bounds(&mut builder, maximum, "maximum", draft, false) {
            builder.set(Keyword::Maximum, KeywordValue::Limit(limit));
        }

        if draft == Draft::V3 {
            lift_required(&mut builder, map);
        }

        builder
    }

    /// Canonical value of one keyword, or `None` when it has to be dropped.
    fn keyword(
        &self,
        builder: &mut SchemaBuilder,
        keyword: Keyword,
        key: &str,
        value: &Value,
        draft: Draft,
    ) -> Option<KeywordValue<SchemaBuilder>> {
        let canonical = match keyword {
            Keyword::Schema | Keyword::Title | Keyword::Description | Keyword::Format => {
                KeywordValue::String(value.as_str()?.to_string())
            }
            Keyword::Pattern => {
                let pattern = value.as_str()?;
                if let Err(e) = Regex::new(pattern) {
                    builder.issue(
                        Severity::Error,
                        LoadingIssueKind::InvalidPattern,
                        format!("pattern {:?} does not compile: {}", pattern, e),
                    );
                    return None;
                }
                KeywordValue::String(pattern.to_string())
            }
            Keyword::Default | Keyword::Const => KeywordValue::Json(value.clone()),
            Keyword::Enum | Keyword::Examples => {
                let values = value.as_array()?;
                if keyword == Keyword::Enum && values.is_empty() {
                    builder.issue(
                        Severity::Warning,
                        LoadingIssueKind::InvalidValue,
                        "enum is empty, no instance can match".to_string(),
                    );
                }
                KeywordValue::Values(values.clone())
            }
            Keyword::Definitions | Keyword::Properties => {
                KeywordValue::SchemaMap(self.schema_map(value.as_object()?, draft))
            }
            Keyword::PatternProperties => {
                let mut entries = Vec::new();
                for (pattern, schema) in value.as_object()? {
                    if let Err(e) = Regex::new(pattern) {
                        builder.issue(
                            Severity::Error,
                            LoadingIssueKind::InvalidPattern,
                            format!("patternProperties key {:?} does not compile: {}", pattern, e),
                        );
                        continue;
                    }
                    entries.push((pattern.clone(), self.schema(schema, draft)));
                }
                KeywordValue::SchemaMap(entries)
            }
            Keyword::Type | Keyword::Disallow => {
                KeywordValue::Types(self.type_set(builder, key, value, draft)?)
            }
            Keyword::MultipleOf => {
                let divisor = value.as_number()?;
                if divisor.as_f64().map(|f| f <= 0.0).unwrap_or(true) {
                    builder.issue(
                        self.mismatch(),
                        LoadingIssueKind::InvalidValue,
                        format!("{} must be greater than 0, found: {}", key, divisor),
                    );
                    return None;
                }
                KeywordValue::Number(divisor.clone())
            }
            Keyword::MinLength
            | Keyword::MaxLength
            | Keyword::MinItems
            | Keyword::MaxItems
            | Keyword::MinProperties
            | Keyword::MaxProperties => match count(value) {
                Some(n) => KeywordValue::Count(n),
                None => {
                    builder.issue(
                        self.mismatch(),
                        LoadingIssueKind::InvalidValue,
                        format!("{} must be a non-negative integer, found: {}", key, value),
                    );
                    return None;
                }
            },
            Keyword::UniqueItems => KeywordValue::Bool(value.as_bool()?),
            Keyword::Items => match value {
                Value::Array(list) => KeywordValue::Items(Items::Tuple(
                    list.iter().map(|s| self.schema(s, draft)).collect(),
                )),
                other => KeywordValue::Items(Items::Single(self.schema(other, draft))),
            },
            Keyword::AdditionalItems | Keyword::AdditionalProperties => match value {
                Value::Bool(b) => KeywordValue::Schema(SchemaBuilder::boolean(*b)),
                other => KeywordValue::Schema(self.schema(other, draft)),
            },
            Keyword::Contains | Keyword::PropertyNames | Keyword::Not => {
                KeywordValue::Schema(self.schema(value, draft))
            }
            Keyword::Required => {
                let mut names: Vec<String> = Vec::new();
                for name in value.as_array()? {
                    match name {
                        Value::String(name) if !names.contains(name) => names.push(name.clone()),
                        Value::String(name) => builder.issue(
                            Severity::Warning,
                            LoadingIssueKind::InvalidValue,
                            format!("required lists {} more than once", name),
                        ),
                        other => builder.issue(
                            self.mismatch(),
                            LoadingIssueKind::TypeMismatch,
                            format!("required entries must be strings, found: {}", json_type_name(other)),
                        ),
                    }
                }
                KeywordValue::Strings(names)
            }
            Keyword::Dependencies => {
                let mut deps = Vec::new();
                for (name, dep) in value.as_object()? {
                    let dependency = match dep {
                        Value::Array(list) => Dependency::Properties(
                            list.iter().filter_map(Value::as_str).map(str::to_string).collect(),
                        ),
                        Value::String(single) if draft == Draft::V3 => {
                            Dependency::Properties(vec![single.clone()])
                        }
                        Value::Object(_) => Dependency::Schema(self.schema(dep, draft)),
                        Value::Bool(_) if draft >= Draft::V6 => {
                            Dependency::Schema(self.schema(dep, draft))
                        }
                        other => {
                            builder.issue(
                                self.mismatch(),
                                LoadingIssueKind::TypeMismatch,
                                format!(
                                    "dependency {} must be an array or a schema, found: {}",
                                    name,
                                    json_type_name(other)
                                ),
                            );
                            continue;
                        }
                    };
                    deps.push((name.clone(), dependency));
                }
                KeywordValue::Dependencies(deps)
            }
            Keyword::AllOf | Keyword::AnyOf | Keyword::OneOf => {
                let schemas: Vec<SchemaBuilder> = match value {
                    Value::Array(list) => list.iter().map(|s| self.schema(s, draft)).collect(),
                    single => vec![self.schema(single, draft)],
                };
                if schemas.is_empty() && keyword != Keyword::AllOf {
                    builder.issue(
                        Severity::Warning,
                        LoadingIssueKind::InvalidValue,
                        format!("{} is empty, no instance can match", key),
                    );
                }
                KeywordValue::Schemas(schemas)
            }
            // handled by the caller
            Keyword::Id | Keyword::Minimum | Keyword::Maximum => return None,
        };
        Some(canonical)
    }

    fn schema_map(&self, map: &Map<String, Value>, draft: Draft) -> Vec<(String, SchemaBuilder)> {
        map.iter()
            .map(|(name, schema)| (name.clone(), self.schema(schema, draft)))
            .collect()
    }

    fn type_set(
        &self,
        builder: &mut SchemaBuilder,
        key: &str,
        value: &Value,
        draft: Draft,
    ) -> Option<TypeSet<SchemaBuilder>> {
        let (members, single) = match value {
            Value::String(_) => (std::slice::from_ref(value), true),
            Value::Array(list) => (list.as_slice(), false),
            _ => return None,
        };
        let mut set = TypeSet {
            types: Vec::new(),
            schemas: Vec::new(),
            single,
        };
        for member in members {
            match member {
                Value::String(name) => match SchemaType::parse(name) {
                    Some(SchemaType::Any) if draft > Draft::V3 => builder.issue(
                        self.mismatch(),
                        LoadingIssueKind::InvalidValue,
                        format!("type any is only defined in {}", Draft::V3),
                    ),
                    Some(t) if !set.types.contains(&t) => set.types.push(t),
                    Some(_) => {}
                    None => builder.issue(
                        self.mismatch(),
                        LoadingIssueKind::InvalidValue,
                        format!("{} names an unknown type {:?}", key, name),
                    ),
                },
                Value::Object(_) if draft == Draft::V3 => {
                    set.schemas.push(self.schema(member, draft));
                }
                other => builder.issue(
                    self.mismatch(),
                    LoadingIssueKind::TypeMismatch,
                    format!("{} entries must be type names, found: {}", key, json_type_name(other)),
                ),
            }
        }
        Some(set)
    }

    /// Fold the collected spellings of one bound into a canonical limit.
    fn fold_bounds(
        &self,
        builder: &mut SchemaBuilder,
        bounds: Bounds,
        name: &str,
        draft: Draft,
        lower: bool,
    ) -> Option<NumericLimit> {
        let exclusive_key = if lower { "exclusiveMinimum" } else { "exclusiveMaximum" };
        if draft < Draft::V6 {
            let Some(limit) = bounds.inclusive else {
                if bounds.exclusive_flag.is_some() {
                    builder.issue(
                        Severity::Warning,
                        LoadingIssueKind::ConflictingKeyword,
                        format!("{} has no effect without {}", exclusive_key, name),
                    );
                }
                return None;
            };
            return Some(NumericLimit {
                limit,
                exclusive: bounds.exclusive_flag.unwrap_or(false),
            });
        }

        match (bounds.inclusive, bounds.exclusive) {
            (Some(inclusive), Some(exclusive)) => {
                let ordering = number::compare(&exclusive, &inclusive);
                // for a lower bound the larger value is stricter, an equal
                // exclusive bound is stricter than the inclusive one
                let exclusive_wins = if lower {
                    ordering.is_ge()
                } else {
                    ordering.is_le()
                };
                Some(if exclusive_wins {
                    NumericLimit {
                        limit: exclusive,
                        exclusive: true,
                    }
                } else {
                    NumericLimit {
                        limit: inclusive,
                        exclusive: false,
                    }
                })
            }
            (Some(limit), None) => Some(NumericLimit {
                limit,
                exclusive: false,
            }),
            (None, Some(limit)) => Some(NumericLimit {
                limit,
                exclusive: true,
            }),
            (None, None) => None,
        }
    }
}

fn collect_bound(bounds: &mut Bounds, key: &str, value: &Value) {
    match value {
        Value::Number(n) if key.starts_with("exclusive") => bounds.exclusive = Some(n.clone()),
        Value::Number(n) => bounds.inclusive = Some(n.clone()),
        Value::Bool(b) => bounds.exclusive_flag = Some(*b),
        _ => {}
    }
}

/// Draft 3 marks required properties inside each property schema.
fn lift_required(builder: &mut SchemaBuilder, map: &Map<String, Value>) {
    let Some(Value::Object(properties)) = map.get("properties") else {
        return;
    };
    let names: Vec<String> = properties
        .iter()
        .filter(|(_, schema)| schema.get("required") == Some(&Value::Bool(true)))
        .map(|(name, _)| name.clone())
        .collect();
    if !names.is_empty() {
        builder.set(Keyword::Required, KeywordValue::Strings(names));
    }
}

/// A non-negative integer, also accepting integral floats such as `2.0`.
fn count(value: &Value) -> Option<u64> {
    let n = value.as_number()?;
    if let Some(u) = n.as_u64() {
        return Some(u);
    }
    let f = n.as_f64()?;
    (f >= 0.0 && f.fract() == 0.0 && f <= u64::MAX as f64).then_some(f as u64)
}
