//! Draft views: a [`Schema`] seen through one draft's surface syntax.
//!
//! Views hold no state of their own. [`DraftView::to_json`] re-serializes
//! the canonical keywords into the draft's spelling, rewriting constructs
//! the draft lacks where an equivalent exists (`const` as a one-element
//! `enum`, draft 3 `not` as `disallow`, boolean schemas as `{}` or their
//! negation). Keywords with no equivalent are dropped and reported by
//! [`DraftView::unsupported`].

use std::ops::Deref;

use serde_json::{json, Map, Number, Value};

use crate::keyword::{Dependency, Items, Keyword, KeywordMap, KeywordValue, NumericLimit, TypeSet};
use crate::schema::{Schema, SchemaBody, SchemaGraph, SchemaId};
use crate::types::{Draft, SchemaType};

/// A schema rendered in one draft.
#[derive(Debug, Clone)]
pub struct DraftView {
    schema: Schema,
    draft: Draft,
}

impl DraftView {
    pub fn new(schema: &Schema, draft: Draft) -> Self {
        Self {
            schema: schema.clone(),
            draft,
        }
    }

    pub fn draft(&self) -> Draft {
        self.draft
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The subtree as a document of this draft, with `$schema` set.
    ///
    /// `$ref`s are written as in the source and not followed.
    pub fn to_json(&self) -> Value {
        let mut writer = Writer::new(self.schema.graph(), self.draft);
        let body = writer.node(self.schema.id());
        let mut document = Map::new();
        document.insert(
            "$schema".to_string(),
            Value::String(self.draft.meta_schema_url().to_string()),
        );
        match body {
            Value::Object(map) => document.extend(map),
            Value::Bool(false) => {
                document.insert("not".to_string(), json!({}));
            }
            _ => {}
        }
        Value::Object(document)
    }

    /// Whether every keyword of the subtree can be expressed in this draft.
    pub fn supports(&self) -> bool {
        self.unsupported().is_empty()
    }

    /// Keywords of the subtree this draft cannot express, as
    /// `"<keyword> at <location>"`.
    pub fn unsupported(&self) -> Vec<String> {
        let mut writer = Writer::new(self.schema.graph(), self.draft);
        writer.node(self.schema.id());
        writer.unsupported
    }

    /// Keys this node is written with in this draft, `$schema` aside.
    pub fn keyword_names(&self) -> Vec<String> {
        match self.to_json() {
            Value::Object(map) => map
                .into_iter()
                .map(|(key, _)| key)
                .filter(|key| key != "$schema")
                .collect(),
            _ => Vec::new(),
        }
    }

    fn limit(&self, keyword: Keyword) -> Option<&NumericLimit> {
        match self.schema.get(keyword)? {
            KeywordValue::Limit(limit) => Some(limit),
            _ => None,
        }
    }

    fn number(&self, keyword: Keyword) -> Option<&Number> {
        match self.schema.get(keyword)? {
            KeywordValue::Number(n) => Some(n),
            _ => None,
        }
    }

    fn strings(&self, keyword: Keyword) -> &[String] {
        match self.schema.get(keyword) {
            Some(KeywordValue::Strings(names)) => names,
            _ => &[],
        }
    }

    fn single(&self, keyword: Keyword) -> Option<Schema> {
        match self.schema.get(keyword)? {
            KeywordValue::Schema(id) => Some(self.schema.subschema(*id)),
            _ => None,
        }
    }
}

macro_rules! draft_view {
    ($(#[$doc:meta])* $name:ident, $draft:expr) => {
        $(#[$doc])*
        #[derive(Debug, Clone)]
        pub struct $name(DraftView);

        impl $name {
            pub fn new(schema: &Schema) -> Self {
                Self(DraftView::new(schema, $draft))
            }
        }

        impl Deref for $name {
            type Target = DraftView;

            fn deref(&self) -> &DraftView {
                &self.0
            }
        }
    };
}

draft_view!(
    /// Draft 3 accessors.
    Draft3View,
    Draft::V3
);
draft_view!(
    /// Draft 4 accessors.
    Draft4View,
    Draft::V4
);
draft_view!(
    /// Draft 6 accessors.
    Draft6View,
    Draft::V6
);

impl Draft3View {
    pub fn divisible_by(&self) -> Option<&Number> {
        self.number(Keyword::MultipleOf)
    }

    /// The `extends` schemas.
    pub fn extends(&self) -> Vec<Schema> {
        self.schema.children(Keyword::AllOf)
    }

    pub fn disallow(&self) -> Option<&TypeSet> {
        match self.schema.get(Keyword::Disallow)? {
            KeywordValue::Types(set) => Some(set),
            _ => None,
        }
    }

    /// Whether the property schema of `name` carries `required: true`.
    pub fn is_property_required(&self, name: &str) -> bool {
        self.strings(Keyword::Required).iter().any(|n| n == name)
    }

    pub fn minimum(&self) -> Option<&Number> {
        self.limit(Keyword::Minimum).map(|l| &l.limit)
    }

    pub fn exclusive_minimum(&self) -> bool {
        self.limit(Keyword::Minimum).is_some_and(|l| l.exclusive)
    }

    pub fn maximum(&self) -> Option<&Number> {
        self.limit(Keyword::Maximum).map(|l| &l.limit)
    }

    pub fn exclusive_maximum(&self) -> bool {
        self.limit(Keyword::Maximum).is_some_and(|l| l.exclusive)
    }
}

impl Draft4View {
    pub fn multiple_of(&self) -> Option<&Number> {
        self.number(Keyword::MultipleOf)
    }

    pub fn minimum(&self) -> Option<&Number> {
        self.limit(Keyword::Minimum).map(|l| &l.limit)
    }

    pub fn exclusive_minimum(&self) -> bool {
        self.limit(Keyword::Minimum).is_some_and(|l| l.exclusive)
    }

    pub fn maximum(&self) -> Option<&Number> {
        self.limit(Keyword::Maximum).map(|l| &l.limit)
    }

    pub fn exclusive_maximum(&self) -> bool {
        self.limit(Keyword::Maximum).is_some_and(|l| l.exclusive)
    }

    pub fn required(&self) -> &[String] {
        self.strings(Keyword::Required)
    }

    pub fn all_of(&self) -> Vec<Schema> {
        self.schema.children(Keyword::AllOf)
    }

    pub fn not(&self) -> Option<Schema> {
        self.single(Keyword::Not)
    }
}

impl Draft6View {
    pub fn multiple_of(&self) -> Option<&Number> {
        self.number(Keyword::MultipleOf)
    }

    /// Inclusive lower bound; `None` when the bound is exclusive.
    pub fn minimum(&self) -> Option<&Number> {
        self.limit(Keyword::Minimum)
            .filter(|l| !l.exclusive)
            .map(|l| &l.limit)
    }

    pub fn exclusive_minimum(&self) -> Option<&Number> {
        self.limit(Keyword::Minimum)
            .filter(|l| l.exclusive)
            .map(|l| &l.limit)
    }

    pub fn maximum(&self) -> Option<&Number> {
        self.limit(Keyword::Maximum)
            .filter(|l| !l.exclusive)
            .map(|l| &l.limit)
    }

    pub fn exclusive_maximum(&self) -> Option<&Number> {
        self.limit(Keyword::Maximum)
            .filter(|l| l.exclusive)
            .map(|l| &l.limit)
    }

    pub fn required(&self) -> &[String] {
        self.strings(Keyword::Required)
    }

    pub fn const_value(&self) -> Option<&Value> {
        match self.schema.get(Keyword::Const)? {
            KeywordValue::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn contains(&self) -> Option<Schema> {
        self.single(Keyword::Contains)
    }

    pub fn property_names(&self) -> Option<Schema> {
        self.single(Keyword::PropertyNames)
    }

    pub fn examples(&self) -> &[Value] {
        match self.schema.get(Keyword::Examples) {
            Some(KeywordValue::Values(values)) => values,
            _ => &[],
        }
    }
}

impl Schema {
    pub fn as_draft(&self, draft: Draft) -> DraftView {
        DraftView::new(self, draft)
    }

    pub fn as_draft3(&self) -> Draft3View {
        Draft3View::new(self)
    }

    pub fn as_draft4(&self) -> Draft4View {
        Draft4View::new(self)
    }

    pub fn as_draft6(&self) -> Draft6View {
        Draft6View::new(self)
    }

    /// Serialize in the draft the schema was loaded as.
    pub fn to_json(&self) -> Value {
        self.as_draft(self.draft()).to_json()
    }
}

/// Serializes a subtree into one draft's syntax.
struct Writer<'g> {
    graph: &'g SchemaGraph,
    draft: Draft,
    unsupported: Vec<String>,
}

impl<'g> Writer<'g> {
    fn new(graph: &'g SchemaGraph, draft: Draft) -> Self {
        Self {
            graph,
            draft,
            unsupported: Vec::new(),
        }
    }

    fn node(&mut self, id: SchemaId) -> Value {
        let node = self.graph.node(id);
        match &node.body {
            SchemaBody::Boolean(value) => self.boolean(*value),
            SchemaBody::Ref { reference, .. } => json!({ "$ref": reference }),
            SchemaBody::Keywords { keywords, extra } => {
                let location = node.location.to_string();
                let mut out = self.keywords(&location, keywords);
                for (key, value) in extra {
                    if !out.contains_key(key) {
                        out.insert(key.clone(), value.clone());
                    }
                }
                Value::Object(out)
            }
        }
    }

    fn boolean(&self, value: bool) -> Value {
        match (self.draft, value) {
            (Draft::V6, b) => Value::Bool(b),
            (_, true) => json!({}),
            (Draft::V4, false) => json!({ "not": {} }),
            (Draft::V3, false) => json!({ "disallow": ["any"] }),
        }
    }

    /// `additionalItems`/`additionalProperties` accept booleans in every draft.
    fn additional(&mut self, id: SchemaId) -> Value {
        match self.graph.node(id).body {
            SchemaBody::Boolean(b) => Value::Bool(b),
            _ => self.node(id),
        }
    }

    fn list(&mut self, ids: &[SchemaId]) -> Vec<Value> {
        ids.iter().map(|id| self.node(*id)).collect()
    }

    fn unsupported(&mut self, keyword: Keyword, location: &str) {
        self.unsupported.push(format!("{} at {}", keyword, location));
    }

    fn keywords(&mut self, location: &str, keywords: &KeywordMap) -> Map<String, Value> {
        let draft = self.draft;
        let mut out = Map::new();
        // draft 4+ conjuncts standing in for draft 3 constructs
        let mut conjuncts = Vec::new();
        let mut negated = Vec::new();

        for (keyword, value) in keywords {
            let key = keyword.surface_key(draft);
            match (keyword, value) {
                (Keyword::Schema, _) => {}
                (Keyword::Id, KeywordValue::String(id)) => {
                    out.insert(draft.id_keyword().to_string(), Value::String(id.clone()));
                }
                (Keyword::Type, KeywordValue::Types(set)) => {
                    if set.types.contains(&SchemaType::Any) && draft != Draft::V3 {
                        continue;
                    }
                    if set.schemas.is_empty() || draft == Draft::V3 {
                        out.insert("type".to_string(), self.type_set(set));
                    } else {
                        let mut alternatives = Vec::new();
                        if !set.types.is_empty() {
                            alternatives.push(json!({ "type": type_names(&set.types) }));
                        }
                        alternatives.extend(self.list(&set.schemas));
                        conjuncts.push(json!({ "anyOf": alternatives }));
                    }
                }
                (Keyword::Disallow, KeywordValue::Types(set)) => {
                    if draft == Draft::V3 {
                        out.insert("disallow".to_string(), self.type_set(set));
                    } else {
                        if !set.types.is_empty() {
                            negated.push(json!({ "type": type_names(&set.types) }));
                        }
                        negated.extend(self.list(&set.schemas));
                    }
                }
                (Keyword::Not, KeywordValue::Schema(id)) if draft == Draft::V3 => {
                    let schema = self.node(*id);
                    match out.get_mut("disallow") {
                        Some(Value::Array(members)) => members.push(schema),
                        Some(existing) => {
                            let previous = existing.take();
                            *existing = json!([previous, schema]);
                        }
                        None => {
                            out.insert("disallow".to_string(), json!([schema]));
                        }
                    }
                }
                (Keyword::AnyOf, KeywordValue::Schemas(ids)) if draft == Draft::V3 => {
                    let members = self.list(ids);
                    conjuncts.push(json!({ "type": members }));
                }
                (Keyword::Const, KeywordValue::Json(value)) if draft != Draft::V6 => {
                    if keywords.contains_key(&Keyword::Enum) {
                        self.unsupported(*keyword, location);
                    } else {
                        out.insert("enum".to_string(), json!([value]));
                    }
                }
                (Keyword::Minimum | Keyword::Maximum, KeywordValue::Limit(limit)) => {
                    let (inclusive, exclusive) = match keyword {
                        Keyword::Minimum => ("minimum", "exclusiveMinimum"),
                        _ => ("maximum", "exclusiveMaximum"),
                    };
                    let number = Value::Number(limit.limit.clone());
                    match (draft, limit.exclusive) {
                        (Draft::V6, true) => {
                            out.insert(exclusive.to_string(), number);
                        }
                        (_, false) => {
                            out.insert(inclusive.to_string(), number);
                        }
                        (_, true) => {
                            out.insert(inclusive.to_string(), number);
                            out.insert(exclusive.to_string(), Value::Bool(true));
                        }
                    }
                }
                // written into the property schemas once `properties` is out
                (Keyword::Required, _) if draft == Draft::V3 => {}
                (Keyword::AdditionalItems | Keyword::AdditionalProperties, KeywordValue::Schema(id)) => {
                    let value = self.additional(*id);
                    out.insert(keyword.name().to_string(), value);
                }
                _ => {
                    let Some(key) = key else {
                        self.unsupported(*keyword, location);
                        continue;
                    };
                    let value = self.value(value);
                    out.insert(key.to_string(), value);
                }
            }
        }

        if draft == Draft::V3 {
            if let Some(KeywordValue::Strings(names)) = keywords.get(&Keyword::Required) {
                mark_required(&mut out, names);
            }
            if !conjuncts.is_empty() {
                append(&mut out, "extends", conjuncts);
            }
        } else {
            if !negated.is_empty() {
                conjuncts.push(json!({ "not": { "anyOf": negated } }));
            }
            if !conjuncts.is_empty() {
                append(&mut out, "allOf", conjuncts);
            }
        }
        out
    }

    fn type_set(&mut self, set: &TypeSet) -> Value {
        if set.single && set.schemas.is_empty() && set.types.len() == 1 {
            return Value::String(set.types[0].as_str().to_string());
        }
        let mut members = type_names(&set.types);
        members.extend(self.list(&set.schemas));
        Value::Array(members)
    }

    fn value(&mut self, value: &KeywordValue) -> Value {
        match value {
            KeywordValue::String(s) => Value::String(s.clone()),
            KeywordValue::Number(n) => Value::Number(n.clone()),
            KeywordValue::Count(c) => Value::from(*c),
            KeywordValue::Bool(b) => Value::Bool(*b),
            KeywordValue::Json(v) => v.clone(),
            KeywordValue::Values(values) => Value::Array(values.clone()),
            KeywordValue::Strings(names) => json!(names),
            KeywordValue::Schema(id) => self.node(*id),
            KeywordValue::Schemas(ids) => Value::Array(self.list(ids)),
            KeywordValue::SchemaMap(map) => Value::Object(
                map.iter()
                    .map(|(name, id)| (name.clone(), self.node(*id)))
                    .collect(),
            ),
            KeywordValue::Types(set) => self.type_set(set),
            KeywordValue::Items(Items::Single(id)) => self.node(*id),
            KeywordValue::Items(Items::Tuple(ids)) => Value::Array(self.list(ids)),
            KeywordValue::Limit(limit) => Value::Number(limit.limit.clone()),
            KeywordValue::Dependencies(deps) => Value::Object(
                deps.iter()
                    .map(|(name, dependency)| {
                        let value = match dependency {
                            Dependency::Properties(names) => json!(names),
                            Dependency::Schema(id) => self.node(*id),
                        };
                        (name.clone(), value)
                    })
                    .collect(),
            ),
        }
    }
}

fn type_names(types: &[SchemaType]) -> Vec<Value> {
    types
        .iter()
        .map(|t| Value::String(t.as_str().to_string()))
        .collect()
}

/// Append `values` to the array under `key`, creating or wrapping it.
fn append(out: &mut Map<String, Value>, key: &str, values: Vec<Value>) {
    match out.get_mut(key) {
        Some(Value::Array(existing)) => existing.extend(values),
        Some(existing) => {
            let mut members = vec![existing.take()];
            members.extend(values);
            *existing = Value::Array(members);
        }
        None => {
            out.insert(key.to_string(), Value::Array(values));
        }
    }
}

/// Draft 3 `required: true` on each named property schema.
fn mark_required(out: &mut Map<String, Value>, names: &[String]) {
    let properties = out
        .entry("properties")
        .or_insert_with(|| Value::Object(Map::new()));
    let Value::Object(properties) = properties else {
        return;
    };
    for name in names {
        let schema = properties
            .entry(name.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(schema) = schema {
            schema.insert("required".to_string(), Value::Bool(true));
        }
    }
}
