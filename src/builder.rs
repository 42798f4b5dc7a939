//! Mutable keyword accumulator that finalizes into graph nodes.

use std::convert::Infallible;

use serde_json::{Map, Number, Value};
use tracing::{debug, warn};

use crate::cache::SchemaCache;
use crate::keyword::{
    Dependency, Items, Keyword, KeywordMap, KeywordValue, NumericLimit, SchemaSlot, TypeSet,
};
use crate::location::SchemaLocation;
use crate::report::{Issue, LoadingIssueKind, LoadingReport, Severity};
use crate::schema::{RefTarget, SchemaBody, SchemaGraph, SchemaId};
use crate::types::{Draft, SchemaType};

/// State threaded through one recursive build.
pub(crate) struct BuildContext<'a> {
    pub graph: &'a mut SchemaGraph,
    pub cache: &'a mut SchemaCache,
    pub report: &'a mut LoadingReport,
    /// `$ref` nodes waiting for the resolution pass.
    pub pending: &'a mut Vec<SchemaId>,
}

/// A schema under construction.
///
/// Built either by the JSON digester or programmatically:
///
/// ```
/// use schema_graph::{SchemaBuilder, SchemaLoader, SchemaType};
///
/// let builder = SchemaBuilder::new()
///     .schema_type(SchemaType::Object)
///     .property("name", SchemaBuilder::new().schema_type(SchemaType::String))
///     .required(["name"]);
/// let schema = SchemaLoader::new().build(builder).unwrap();
/// assert!(schema.property("name").is_some());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchemaBuilder {
    draft: Option<Draft>,
    id: Option<String>,
    reference: Option<String>,
    boolean: Option<bool>,
    keywords: KeywordMap<SchemaBuilder>,
    extra: Map<String, Value>,
    issues: Vec<(Severity, LoadingIssueKind, String)>,
}

impl SchemaBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A draft 6 boolean schema.
    pub fn boolean(value: bool) -> Self {
        Self {
            boolean: Some(value),
            ..Self::default()
        }
    }

    /// A `$ref` to `uri`.
    pub fn reference_to(uri: impl Into<String>) -> Self {
        Self::new().reference(uri)
    }

    pub fn draft(mut self, draft: Draft) -> Self {
        self.draft = Some(draft);
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn reference(mut self, uri: impl Into<String>) -> Self {
        self.reference = Some(uri.into());
        self
    }

    pub fn title(self, title: impl Into<String>) -> Self {
        self.keyword(Keyword::Title, KeywordValue::String(title.into()))
    }

    pub fn description(self, description: impl Into<String>) -> Self {
        self.keyword(Keyword::Description, KeywordValue::String(description.into()))
    }

    pub fn default_value(self, value: Value) -> Self {
        self.keyword(Keyword::Default, KeywordValue::Json(value))
    }

    pub fn schema_type(self, schema_type: SchemaType) -> Self {
        self.keyword(Keyword::Type, KeywordValue::Types(TypeSet::of(vec![schema_type])))
    }

    pub fn types(self, types: impl IntoIterator<Item = SchemaType>) -> Self {
        let mut set = TypeSet::of(types.into_iter().collect());
        set.single = false;
        self.keyword(Keyword::Type, KeywordValue::Types(set))
    }

    pub fn enum_values(self, values: impl IntoIterator<Item = Value>) -> Self {
        self.keyword(Keyword::Enum, KeywordValue::Values(values.into_iter().collect()))
    }

    pub fn const_value(self, value: Value) -> Self {
        self.keyword(Keyword::Const, KeywordValue::Json(value))
    }

    pub fn format(self, format: impl Into<String>) -> Self {
        self.keyword(Keyword::Format, KeywordValue::String(format.into()))
    }

    pub fn multiple_of(self, divisor: impl Into<Number>) -> Self {
        self.keyword(Keyword::MultipleOf, KeywordValue::Number(divisor.into()))
    }

    pub fn minimum(self, limit: impl Into<Number>) -> Self {
        self.limit(Keyword::Minimum, limit.into(), false)
    }

    pub fn exclusive_minimum(self, limit: impl Into<Number>) -> Self {
        self.limit(Keyword::Minimum, limit.into(), true)
    }

    pub fn maximum(self, limit: impl Into<Number>) -> Self {
        self.limit(Keyword::Maximum, limit.into(), false)
    }

    pub fn exclusive_maximum(self, limit: impl Into<Number>) -> Self {
        self.limit(Keyword::Maximum, limit.into(), true)
    }

    fn limit(self, keyword: Keyword, limit: Number, exclusive: bool) -> Self {
        self.keyword(keyword, KeywordValue::Limit(NumericLimit { limit, exclusive }))
    }

    pub fn min_length(self, n: u64) -> Self {
        self.keyword(Keyword::MinLength, KeywordValue::Count(n))
    }

    pub fn max_length(self, n: u64) -> Self {
        self.keyword(Keyword::MaxLength, KeywordValue::Count(n))
    }

    pub fn pattern(self, pattern: impl Into<String>) -> Self {
        self.keyword(Keyword::Pattern, KeywordValue::String(pattern.into()))
    }

    /// `items` as one schema for every element.
    ///
    /// Ignored with a warning if a tuple form was already set.
    pub fn items(mut self, schema: SchemaBuilder) -> Self {
        if let Some(KeywordValue::Items(Items::Tuple(_))) = self.keywords.get(&Keyword::Items) {
            self.issue(
                Severity::Warning,
                LoadingIssueKind::ConflictingKeyword,
                "items is already a tuple; single-schema items ignored".to_string(),
            );
            return self;
        }
        self.keywords
            .insert(Keyword::Items, KeywordValue::Items(Items::Single(schema)));
        self
    }

    /// `items` as one schema per position. Replaces a single-schema `items`.
    pub fn item_tuple(mut self, schemas: impl IntoIterator<Item = SchemaBuilder>) -> Self {
        if let Some(KeywordValue::Items(Items::Single(_))) = self.keywords.get(&Keyword::Items) {
            self.issue(
                Severity::Warning,
                LoadingIssueKind::ConflictingKeyword,
                "items tuple replaces single-schema items".to_string(),
            );
        }
        self.keywords.insert(
            Keyword::Items,
            KeywordValue::Items(Items::Tuple(schemas.into_iter().collect())),
        );
        self
    }

    pub fn additional_items(self, schema: SchemaBuilder) -> Self {
        self.keyword(Keyword::AdditionalItems, KeywordValue::Schema(schema))
    }

    /// Boolean `additionalItems`; shares the slot with the schema form,
    /// the last call wins.
    pub fn additional_items_allowed(self, allowed: bool) -> Self {
        self.additional_items(SchemaBuilder::boolean(allowed))
    }

    pub fn min_items(self, n: u64) -> Self {
        self.keyword(Keyword::MinItems, KeywordValue::Count(n))
    }

    pub fn max_items(self, n: u64) -> Self {
        self.keyword(Keyword::MaxItems, KeywordValue::Count(n))
    }

    pub fn unique_items(self, unique: bool) -> Self {
        self.keyword(Keyword::UniqueItems, KeywordValue::Bool(unique))
    }

    pub fn contains(self, schema: SchemaBuilder) -> Self {
        self.keyword(Keyword::Contains, KeywordValue::Schema(schema))
    }

    pub fn property(self, name: impl Into<String>, schema: SchemaBuilder) -> Self {
        self.map_entry(Keyword::Properties, name.into(), schema)
    }

    pub fn pattern_property(self, pattern: impl Into<String>, schema: SchemaBuilder) -> Self {
        self.map_entry(Keyword::PatternProperties, pattern.into(), schema)
    }

    pub fn definition(self, name: impl Into<String>, schema: SchemaBuilder) -> Self {
        self.map_entry(Keyword::Definitions, name.into(), schema)
    }

    pub fn additional_properties(self, schema: SchemaBuilder) -> Self {
        self.keyword(Keyword::AdditionalProperties, KeywordValue::Schema(schema))
    }

    /// Boolean `additionalProperties`; shares the slot with the schema form,
    /// the last call wins.
    pub fn additional_properties_allowed(self, allowed: bool) -> Self {
        self.additional_properties(SchemaBuilder::boolean(allowed))
    }

    pub fn required<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = match self.keywords.remove(&Keyword::Required) {
            Some(KeywordValue::Strings(list)) => list,
            _ => Vec::new(),
        };
        for name in names {
            let name = name.into();
            if !current.contains(&name) {
                current.push(name);
            }
        }
        self.keywords
            .insert(Keyword::Required, KeywordValue::Strings(current));
        self
    }

    pub fn min_properties(self, n: u64) -> Self {
        self.keyword(Keyword::MinProperties, KeywordValue::Count(n))
    }

    pub fn max_properties(self, n: u64) -> Self {
        self.keyword(Keyword::MaxProperties, KeywordValue::Count(n))
    }

    pub fn property_dependency<I, S>(self, name: impl Into<String>, requires: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let requires = requires.into_iter().map(Into::into).collect();
        self.dependency(name.into(), Dependency::Properties(requires))
    }

    pub fn schema_dependency(self, name: impl Into<String>, schema: SchemaBuilder) -> Self {
        self.dependency(name.into(), Dependency::Schema(schema))
    }

    fn dependency(mut self, name: String, dependency: Dependency<SchemaBuilder>) -> Self {
        let mut deps = match self.keywords.remove(&Keyword::Dependencies) {
            Some(KeywordValue::Dependencies(deps)) => deps,
            _ => Vec::new(),
        };
        deps.retain(|(existing, _)| *existing != name);
        deps.push((name, dependency));
        self.keywords
            .insert(Keyword::Dependencies, KeywordValue::Dependencies(deps));
        self
    }

    pub fn property_names(self, schema: SchemaBuilder) -> Self {
        self.keyword(Keyword::PropertyNames, KeywordValue::Schema(schema))
    }

    pub fn all_of(self, schemas: impl IntoIterator<Item = SchemaBuilder>) -> Self {
        self.keyword(Keyword::AllOf, KeywordValue::Schemas(schemas.into_iter().collect()))
    }

    pub fn any_of(self, schemas: impl IntoIterator<Item = SchemaBuilder>) -> Self {
        self.keyword(Keyword::AnyOf, KeywordValue::Schemas(schemas.into_iter().collect()))
    }

    pub fn one_of(self, schemas: impl IntoIterator<Item = SchemaBuilder>) -> Self {
        self.keyword(Keyword::OneOf, KeywordValue::Schemas(schemas.into_iter().collect()))
    }

    pub fn not(self, schema: SchemaBuilder) -> Self {
        self.keyword(Keyword::Not, KeywordValue::Schema(schema))
    }

    /// Keep an unrecognized keyword verbatim.
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Set a keyword in canonical form, replacing any previous value.
    pub fn keyword(mut self, keyword: Keyword, value: KeywordValue<SchemaBuilder>) -> Self {
        self.keywords.insert(keyword, value);
        self
    }

    fn map_entry(mut self, keyword: Keyword, key: String, schema: SchemaBuilder) -> Self {
        let mut entries = match self.keywords.remove(&keyword) {
            Some(KeywordValue::SchemaMap(entries)) => entries,
            _ => Vec::new(),
        };
        entries.retain(|(existing, _)| *existing != key);
        entries.push((key, schema));
        self.keywords.insert(keyword, KeywordValue::SchemaMap(entries));
        self
    }

    pub(crate) fn issue(&mut self, severity: Severity, kind: LoadingIssueKind, message: String) {
        self.issues.push((severity, kind, message));
    }

    pub(crate) fn set(&mut self, keyword: Keyword, value: KeywordValue<SchemaBuilder>) {
        self.keywords.insert(keyword, value);
    }

    pub(crate) fn get(&self, keyword: Keyword) -> Option<&KeywordValue<SchemaBuilder>> {
        self.keywords.get(&keyword)
    }

    pub(crate) fn set_id(&mut self, id: String) {
        self.id = Some(id);
    }

    pub(crate) fn set_reference(&mut self, reference: String) {
        self.reference = Some(reference);
    }

    pub(crate) fn set_draft(&mut self, draft: Draft) {
        self.draft = Some(draft);
    }

    pub(crate) fn set_extra(&mut self, key: String, value: Value) {
        self.extra.insert(key, value);
    }

    pub fn has_reference(&self) -> bool {
        self.reference.is_some()
    }

    /// Finalize into the graph at `location` (the location before this
    /// node's own `$id` is applied).
    ///
    /// Returns the cached node when one already exists for the effective
    /// location, so each URI is constructed at most once.
    pub(crate) fn build(
        mut self,
        location: &SchemaLocation,
        inherited: Draft,
        cx: &mut BuildContext<'_>,
    ) -> SchemaId {
        let draft = self.draft.unwrap_or(inherited);

        let location = match self.id.as_deref() {
            Some(id) => match location.with_id(id) {
                Ok(with_id) => with_id,
                Err(e) => {
                    cx.report.error(
                        LoadingIssueKind::InvalidLocation,
                        location.to_string(),
                        e.to_string(),
                    );
                    location.clone()
                }
            },
            None => location.clone(),
        };

        if let Some(existing) = cx.cache.lookup(&location) {
            debug!(uri = %location, "schema cache hit");
            let first = cx.graph.node(existing).location.pointer_uri();
            let current = location.pointer_uri();
            if first != current {
                warn!(uri = %location, first = %first, duplicate = %current, "duplicate schema id");
                cx.report.warning(
                    LoadingIssueKind::InvalidLocation,
                    location.to_string(),
                    format!(
                        "{} declares the same id as {}; the first schema is kept",
                        current, first
                    ),
                );
            }
            return existing;
        }

        let id = cx.graph.reserve(location.clone(), draft);
        cx.cache.register(&location, id);

        let loc_str = location.to_string();
        for (severity, kind, message) in self.issues.drain(..) {
            if kind == LoadingIssueKind::ConflictingKeyword {
                warn!(location = %loc_str, "{}", message);
            }
            cx.report.push(Issue::new(severity, kind, loc_str.clone(), message));
        }

        if let Some(reference) = self.reference.take() {
            if !self.keywords.is_empty() || !self.extra.is_empty() {
                let ignored: Vec<_> = self
                    .keywords
                    .keys()
                    .map(|k| k.name().to_string())
                    .chain(self.extra.keys().cloned())
                    .collect();
                cx.report.push(
                    Issue::new(
                        Severity::Info,
                        LoadingIssueKind::IgnoredKeyword,
                        loc_str.clone(),
                        format!("keywords beside $ref are ignored: {}", ignored.join(", ")),
                    )
                    .with_argument(ignored),
                );
            }
            let target = match location.resolve(&reference) {
                Ok(uri) => {
                    cx.pending.push(id);
                    RefTarget::Unresolved(uri)
                }
                Err(e) => {
                    cx.report
                        .error(LoadingIssueKind::InvalidLocation, loc_str, e.to_string());
                    RefTarget::Unresolved(location.resolution_scope().clone())
                }
            };
            cx.graph.fill(id, SchemaBody::Ref { reference, target });
            return id;
        }

        if let Some(value) = self.boolean {
            cx.graph.fill(id, SchemaBody::Boolean(value));
            return id;
        }

        if let Some(KeywordValue::Items(Items::Single(_))) = self.keywords.get(&Keyword::Items) {
            if self.keywords.remove(&Keyword::AdditionalItems).is_some() {
                warn!(location = %loc_str, "additionalItems ignored beside single-schema items");
                cx.report.warning(
                    LoadingIssueKind::ConflictingKeyword,
                    loc_str.clone(),
                    "additionalItems has no effect when items is a single schema",
                );
            }
        }

        if let Some(declared) = self.id.take() {
            self.keywords.insert(Keyword::Id, KeywordValue::String(declared));
        }

        let mut keywords = KeywordMap::new();
        for (keyword, value) in std::mem::take(&mut self.keywords) {
            let key_location = location.child_key(keyword.surface_key(draft).unwrap_or(keyword.name()));
            let built = value.try_map::<_, Infallible>(|slot, child| {
                let child_location = match slot {
                    SchemaSlot::Here => key_location.clone(),
                    SchemaSlot::Index(i) => key_location.child_index(i),
                    SchemaSlot::Key(k) => key_location.child_key(k),
                };
                Ok(child.build(&child_location, draft, &mut *cx))
            });
            match built {
                Ok(value) => {
                    keywords.insert(keyword, value);
                }
                Err(never) => match never {},
            }
        }

        cx.graph.fill(
            id,
            SchemaBody::Keywords {
                keywords,
                extra: self.extra,
            },
        );
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn build(builder: SchemaBuilder) -> (SchemaGraph, SchemaId, LoadingReport) {
        let mut graph = SchemaGraph::new();
        let mut cache = SchemaCache::new();
        let mut report = LoadingReport::new();
        let mut pending = Vec::new();
        let mut cx = BuildContext {
            graph: &mut graph,
            cache: &mut cache,
            report: &mut report,
            pending: &mut pending,
        };
        let id = builder.build(&SchemaLocation::anonymous(), Draft::V6, &mut cx);
        (graph, id, report)
    }

    #[test]
    fn tuple_items_win_over_single() {
        let builder = SchemaBuilder::new()
            .item_tuple([SchemaBuilder::new()])
            .items(SchemaBuilder::new());
        let (graph, id, report) = build(builder);
        let SchemaBody::Keywords { keywords, .. } = &graph.node(id).body else {
            panic!("expected keywords");
        };
        assert!(matches!(
            keywords.get(&Keyword::Items),
            Some(KeywordValue::Items(Items::Tuple(_)))
        ));
        assert_eq!(report.find(LoadingIssueKind::ConflictingKeyword).len(), 1);
    }

    #[test]
    fn tuple_replaces_single_with_warning() {
        let builder = SchemaBuilder::new()
            .items(SchemaBuilder::new())
            .item_tuple([SchemaBuilder::new(), SchemaBuilder::new()]);
        let (graph, id, report) = build(builder);
        let SchemaBody::Keywords { keywords, .. } = &graph.node(id).body else {
            panic!("expected keywords");
        };
        assert!(matches!(
            keywords.get(&Keyword::Items),
            Some(KeywordValue::Items(Items::Tuple(list))) if list.len() == 2
        ));
        assert!(!report.has_errors());
        assert_eq!(report.find(LoadingIssueKind::ConflictingKeyword).len(), 1);
    }

    #[test]
    fn additional_items_dropped_beside_single_items() {
        let builder = SchemaBuilder::new()
            .items(SchemaBuilder::new())
            .additional_items_allowed(false);
        let (graph, id, report) = build(builder);
        let SchemaBody::Keywords { keywords, .. } = &graph.node(id).body else {
            panic!("expected keywords");
        };
        assert!(!keywords.contains_key(&Keyword::AdditionalItems));
        assert_eq!(report.find(LoadingIssueKind::ConflictingKeyword).len(), 1);
    }

    #[test]
    fn additional_properties_last_write_wins() {
        let builder = SchemaBuilder::new()
            .additional_properties_allowed(false)
            .additional_properties(SchemaBuilder::new().schema_type(SchemaType::String));
        let (graph, id, _) = build(builder);
        let SchemaBody::Keywords { keywords, .. } = &graph.node(id).body else {
            panic!("expected keywords");
        };
        let Some(KeywordValue::Schema(child)) = keywords.get(&Keyword::AdditionalProperties) else {
            panic!("expected schema");
        };
        assert!(matches!(graph.node(*child).body, SchemaBody::Keywords { .. }));
    }

    #[test]
    fn children_get_keyword_locations() {
        let builder = SchemaBuilder::new()
            .property("a", SchemaBuilder::new())
            .all_of([SchemaBuilder::new(), SchemaBuilder::new()]);
        let (graph, id, _) = build(builder);
        let paths: Vec<String> = graph
            .ids()
            .filter(|child| *child != id)
            .map(|child| graph.node(child).location.json_path().to_pointer())
            .collect();
        assert!(paths.contains(&"/properties/a".to_string()));
        assert!(paths.contains(&"/allOf/0".to_string()));
        assert!(paths.contains(&"/allOf/1".to_string()));
    }

    #[test]
    fn ref_ignores_siblings_and_queues() {
        let builder = SchemaBuilder::reference_to("#/definitions/a").min_length(2);
        let mut graph = SchemaGraph::new();
        let mut cache = SchemaCache::new();
        let mut report = LoadingReport::new();
        let mut pending = Vec::new();
        let mut cx = BuildContext {
            graph: &mut graph,
            cache: &mut cache,
            report: &mut report,
            pending: &mut pending,
        };
        let id = builder.build(&SchemaLocation::anonymous(), Draft::V6, &mut cx);
        assert_eq!(pending, vec![id]);
        assert!(matches!(
            &graph.node(id).body,
            SchemaBody::Ref { target: RefTarget::Unresolved(uri), .. }
                if uri.fragment() == Some("/definitions/a")
        ));
        assert_eq!(report.find(LoadingIssueKind::IgnoredKeyword).len(), 1);
    }

    #[test]
    fn same_alias_built_once() {
        let builder = SchemaBuilder::new()
            .definition("a", SchemaBuilder::new().id("#same"))
            .definition("b", SchemaBuilder::new().id("#same").min_length(1));
        let (graph, _, _) = build(builder);
        // root + definitions/a; definitions/b resolves to the cached alias
        assert_eq!(graph.len(), 2);
    }
}
