//! Canonical keyword model.
//!
//! Every keyword has one semantic shape regardless of draft. The static
//! [`KEYWORDS`] table maps each draft's surface syntax onto a canonical
//! [`Keyword`]: `divisibleBy` (draft 3) and `multipleOf` are both
//! [`Keyword::MultipleOf`], the boolean (draft 3/4) and numeric (draft 6)
//! spellings of `exclusiveMinimum` both fold into [`Keyword::Minimum`].

use std::collections::BTreeMap;
use std::fmt;

use serde_json::{Number, Value};

use crate::schema::SchemaId;
use crate::types::{Draft, JsonType, SchemaType};

/// Canonical keyword identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Keyword {
    Schema,
    Id,
    Title,
    Description,
    Default,
    Examples,
    Definitions,
    Format,
    Enum,
    Const,
    Type,
    Disallow,
    MultipleOf,
    Minimum,
    Maximum,
    MinLength,
    MaxLength,
    Pattern,
    Items,
    AdditionalItems,
    MinItems,
    MaxItems,
    UniqueItems,
    Contains,
    Properties,
    PatternProperties,
    AdditionalProperties,
    Required,
    MinProperties,
    MaxProperties,
    Dependencies,
    PropertyNames,
    AllOf,
    AnyOf,
    OneOf,
    Not,
}

impl Keyword {
    /// The keyword's name in the newest draft that has it.
    pub fn name(&self) -> &'static str {
        match self {
            Keyword::Schema => "$schema",
            Keyword::Id => "$id",
            Keyword::Title => "title",
            Keyword::Description => "description",
            Keyword::Default => "default",
            Keyword::Examples => "examples",
            Keyword::Definitions => "definitions",
            Keyword::Format => "format",
            Keyword::Enum => "enum",
            Keyword::Const => "const",
            Keyword::Type => "type",
            Keyword::Disallow => "disallow",
            Keyword::MultipleOf => "multipleOf",
            Keyword::Minimum => "minimum",
            Keyword::Maximum => "maximum",
            Keyword::MinLength => "minLength",
            Keyword::MaxLength => "maxLength",
            Keyword::Pattern => "pattern",
            Keyword::Items => "items",
            Keyword::AdditionalItems => "additionalItems",
            Keyword::MinItems => "minItems",
            Keyword::MaxItems => "maxItems",
            Keyword::UniqueItems => "uniqueItems",
            Keyword::Contains => "contains",
            Keyword::Properties => "properties",
            Keyword::PatternProperties => "patternProperties",
            Keyword::AdditionalProperties => "additionalProperties",
            Keyword::Required => "required",
            Keyword::MinProperties => "minProperties",
            Keyword::MaxProperties => "maxProperties",
            Keyword::Dependencies => "dependencies",
            Keyword::PropertyNames => "propertyNames",
            Keyword::AllOf => "allOf",
            Keyword::AnyOf => "anyOf",
            Keyword::OneOf => "oneOf",
            Keyword::Not => "not",
        }
    }

    /// Surface key used for this keyword in `draft`, if the draft has one.
    pub fn surface_key(&self, draft: Draft) -> Option<&'static str> {
        KEYWORDS
            .iter()
            .find(|m| m.canonical == *self && m.in_draft(draft) && m.primary)
            .map(|m| m.key)
    }

    pub fn is_supported_in(&self, draft: Draft) -> bool {
        self.surface_key(draft).is_some()
    }

    /// JSON value kinds the keyword constrains; empty means every kind.
    pub fn applies_to(&self) -> &'static [JsonType] {
        match self {
            Keyword::MultipleOf | Keyword::Minimum | Keyword::Maximum => &[JsonType::Number],
            Keyword::MinLength | Keyword::MaxLength | Keyword::Pattern | Keyword::Format => {
                &[JsonType::String]
            }
            Keyword::Items
            | Keyword::AdditionalItems
            | Keyword::MinItems
            | Keyword::MaxItems
            | Keyword::UniqueItems
            | Keyword::Contains => &[JsonType::Array],
            Keyword::Properties
            | Keyword::PatternProperties
            | Keyword::AdditionalProperties
            | Keyword::Required
            | Keyword::MinProperties
            | Keyword::MaxProperties
            | Keyword::Dependencies
            | Keyword::PropertyNames => &[JsonType::Object],
            _ => &[],
        }
    }

    /// Keywords that only annotate and never constrain an instance.
    pub fn is_annotation(&self) -> bool {
        matches!(
            self,
            Keyword::Schema
                | Keyword::Id
                | Keyword::Title
                | Keyword::Description
                | Keyword::Default
                | Keyword::Examples
                | Keyword::Definitions
        )
    }
}

impl fmt::Display for Keyword {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Where a keyword's raw value holds subschemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaPosition {
    None,
    /// The value is a schema.
    Single,
    /// The value is an array of schemas (non-schema members are skipped).
    List,
    /// The value is an object whose values are schemas.
    Map,
    /// Either a schema or an array of schemas.
    SingleOrList,
}

/// Static description of one surface spelling of a keyword.
#[derive(Debug, Clone, Copy)]
pub struct KeywordMetadata {
    pub key: &'static str,
    pub canonical: Keyword,
    /// Raw JSON kinds accepted. Draft 6 additionally accepts booleans
    /// wherever [`SchemaPosition`] says a schema is expected.
    pub accepts: &'static [JsonType],
    /// Schema types the keyword constrains; empty means every type.
    pub constrains: &'static [SchemaType],
    pub since: Draft,
    pub until: Draft,
    pub position: SchemaPosition,
    /// Whether this spelling is the one written back when serializing.
    pub primary: bool,
}

impl KeywordMetadata {
    pub fn in_draft(&self, draft: Draft) -> bool {
        self.since <= draft && draft <= self.until
    }

    /// Find the spelling of `key` valid in `draft`.
    pub fn lookup(key: &str, draft: Draft) -> Option<&'static KeywordMetadata> {
        KEYWORDS.iter().find(|m| m.key == key && m.in_draft(draft))
    }

    /// Whether `value` has an accepted JSON kind for this spelling.
    pub fn accepts_value(&self, value: &Value, draft: Draft) -> bool {
        let kind = JsonType::of(value);
        if self.accepts.contains(&kind) {
            return true;
        }
        kind == JsonType::Boolean
            && draft >= Draft::V6
            && matches!(
                self.position,
                SchemaPosition::Single | SchemaPosition::SingleOrList
            )
    }

    pub fn accepted_names(&self) -> String {
        self.accepts
            .iter()
            .map(|t| format!("{:?}", t).to_lowercase())
            .collect::<Vec<_>>()
            .join(" or ")
    }
}

macro_rules! kw {
    ($key:literal, $canonical:ident, [$($accepts:ident),*], [$($constrains:ident),*], $since:ident ..= $until:ident, $position:ident, $primary:literal) => {
        KeywordMetadata {
            key: $key,
            canonical: Keyword::$canonical,
            accepts: &[$(JsonType::$accepts),*],
            constrains: &[$(SchemaType::$constrains),*],
            since: Draft::$since,
            until: Draft::$until,
            position: SchemaPosition::$position,
            primary: $primary,
        }
    };
}

/// Surface keyword table for drafts 3, 4 and 6.
pub static KEYWORDS: &[KeywordMetadata] = &[
    kw!("$schema", Schema, [String], [], V3..=V6, None, true),
    kw!("id", Id, [String], [], V3..=V4, None, true),
    kw!("$id", Id, [String], [], V6..=V6, None, true),
    kw!("title", Title, [String], [], V3..=V6, None, true),
    kw!("description", Description, [String], [], V3..=V6, None, true),
    kw!("default", Default, [Null, Boolean, Number, String, Array, Object], [], V3..=V6, None, true),
    kw!("examples", Examples, [Array], [], V6..=V6, None, true),
    kw!("definitions", Definitions, [Object], [], V3..=V6, Map, true),
    kw!("format", Format, [String], [], V3..=V6, None, true),
    kw!("enum", Enum, [Array], [], V3..=V6, None, true),
    kw!("const", Const, [Null, Boolean, Number, String, Array, Object], [], V6..=V6, None, true),
    kw!("type", Type, [String, Array], [], V3..=V6, List, true),
    kw!("disallow", Disallow, [String, Array], [], V3..=V3, List, true),
    kw!("divisibleBy", MultipleOf, [Number], [Number, Integer], V3..=V3, None, true),
    kw!("multipleOf", MultipleOf, [Number], [Number, Integer], V4..=V6, None, true),
    kw!("minimum", Minimum, [Number], [Number, Integer], V3..=V6, None, true),
    kw!("exclusiveMinimum", Minimum, [Boolean], [Number, Integer], V3..=V4, None, false),
    kw!("exclusiveMinimum", Minimum, [Number], [Number, Integer], V6..=V6, None, false),
    kw!("maximum", Maximum, [Number], [Number, Integer], V3..=V6, None, true),
    kw!("exclusiveMaximum", Maximum, [Boolean], [Number, Integer], V3..=V4, None, false),
    kw!("exclusiveMaximum", Maximum, [Number], [Number, Integer], V6..=V6, None, false),
    kw!("minLength", MinLength, [Number], [String], V3..=V6, None, true),
    kw!("maxLength", MaxLength, [Number], [String], V3..=V6, None, true),
    kw!("pattern", Pattern, [String], [String], V3..=V6, None, true),
    kw!("items", Items, [Object, Array], [Array], V3..=V6, SingleOrList, true),
    kw!("additionalItems", AdditionalItems, [Object, Boolean], [Array], V3..=V6, Single, true),
    kw!("minItems", MinItems, [Number], [Array], V3..=V6, None, true),
    kw!("maxItems", MaxItems, [Number], [Array], V3..=V6, None, true),
    kw!("uniqueItems", UniqueItems, [Boolean], [Array], V3..=V6, None, true),
    kw!("contains", Contains, [Object], [Array], V6..=V6, Single, true),
    kw!("properties", Properties, [Object], [Object], V3..=V6, Map, true),
    kw!("patternProperties", PatternProperties, [Object], [Object], V3..=V6, Map, true),
    kw!("additionalProperties", AdditionalProperties, [Object, Boolean], [Object], V3..=V6, Single, true),
    kw!("required", Required, [Boolean], [], V3..=V3, None, true),
    kw!("required", Required, [Array], [Object], V4..=V6, None, true),
    kw!("minProperties", MinProperties, [Number], [Object], V4..=V6, None, true),
    kw!("maxProperties", MaxProperties, [Number], [Object], V4..=V6, None, true),
    kw!("dependencies", Dependencies, [Object], [Object], V3..=V6, Map, true),
    kw!("propertyNames", PropertyNames, [Object], [Object], V6..=V6, Single, true),
    kw!("extends", AllOf, [Object, Array], [], V3..=V3, SingleOrList, true),
    kw!("allOf", AllOf, [Array], [], V4..=V6, List, true),
    kw!("anyOf", AnyOf, [Array], [], V4..=V6, List, true),
    kw!("oneOf", OneOf, [Array], [], V4..=V6, List, true),
    kw!("not", Not, [Object], [], V4..=V6, Single, true),
];

/// `minimum`/`maximum` in canonical form.
#[derive(Debug, Clone, PartialEq)]
pub struct NumericLimit {
    pub limit: Number,
    pub exclusive: bool,
}

/// `items`: one schema for every element, or one schema per position.
#[derive(Debug, Clone, PartialEq)]
pub enum Items<S = SchemaId> {
    Single(S),
    Tuple(Vec<S>),
}

/// One entry of `dependencies`.
#[derive(Debug, Clone, PartialEq)]
pub enum Dependency<S = SchemaId> {
    Properties(Vec<String>),
    Schema(S),
}

/// `type`/`disallow`: primitive type names plus draft 3 schema members.
#[derive(Debug, Clone, PartialEq)]
pub struct TypeSet<S = SchemaId> {
    pub types: Vec<SchemaType>,
    pub schemas: Vec<S>,
    /// Written as a bare string rather than an array.
    pub single: bool,
}

impl<S> TypeSet<S> {
    pub fn of(types: Vec<SchemaType>) -> Self {
        Self {
            single: types.len() == 1,
            types,
            schemas: Vec::new(),
        }
    }
}

/// Canonical keyword value. `S` is a built [`SchemaId`] or, while loading,
/// a pending builder.
#[derive(Debug, Clone, PartialEq)]
pub enum KeywordValue<S = SchemaId> {
    String(String),
    Number(Number),
    Count(u64),
    Bool(bool),
    Json(Value),
    Values(Vec<Value>),
    Strings(Vec<String>),
    Schema(S),
    Schemas(Vec<S>),
    SchemaMap(Vec<(String, S)>),
    Types(TypeSet<S>),
    Items(Items<S>),
    Limit(NumericLimit),
    Dependencies(Vec<(String, Dependency<S>)>),
}

pub type KeywordMap<S = SchemaId> = BTreeMap<Keyword, KeywordValue<S>>;

impl<S> KeywordValue<S> {
    /// Convert every embedded schema, keeping the shape.
    pub fn try_map<T, E>(
        self,
        mut f: impl FnMut(SchemaSlot, S) -> Result<T, E>,
    ) -> Result<KeywordValue<T>, E> {
        Ok(match self {
            KeywordValue::String(s) => KeywordValue::String(s),
            KeywordValue::Number(n) => KeywordValue::Number(n),
            KeywordValue::Count(c) => KeywordValue::Count(c),
            KeywordValue::Bool(b) => KeywordValue::Bool(b),
            KeywordValue::Json(v) => KeywordValue::Json(v),
            KeywordValue::Values(v) => KeywordValue::Values(v),
            KeywordValue::Strings(v) => KeywordValue::Strings(v),
            KeywordValue::Limit(l) => KeywordValue::Limit(l),
            KeywordValue::Schema(s) => KeywordValue::Schema(f(SchemaSlot::Here, s)?),
            KeywordValue::Schemas(list) => KeywordValue::Schemas(
                list.into_iter()
                    .enumerate()
                    .map(|(i, s)| f(SchemaSlot::Index(i), s))
                    .collect::<Result<_, _>>()?,
            ),
            KeywordValue::SchemaMap(map) => KeywordValue::SchemaMap(
                map.into_iter()
                    .map(|(k, s)| {
                        let built = f(SchemaSlot::Key(k.clone()), s)?;
                        Ok((k, built))
                    })
                    .collect::<Result<_, _>>()?,
            ),
            KeywordValue::Types(set) => KeywordValue::Types(TypeSet {
                single: set.single,
                schemas: set
                    .schemas
                    .into_iter()
                    .enumerate()
                    .map(|(i, s)| f(SchemaSlot::Index(set.types.len() + i), s))
                    .collect::<Result<_, _>>()?,
                types: set.types,
            }),
            KeywordValue::Items(Items::Single(s)) => {
                KeywordValue::Items(Items::Single(f(SchemaSlot::Here, s)?))
            }
            KeywordValue::Items(Items::Tuple(list)) => KeywordValue::Items(Items::Tuple(
                list.into_iter()
                    .enumerate()
                    .map(|(i, s)| f(SchemaSlot::Index(i), s))
                    .collect::<Result<_, _>>()?,
            )),
            KeywordValue::Dependencies(deps) => KeywordValue::Dependencies(
                deps.into_iter()
                    .map(|(k, dep)| {
                        let dep = match dep {
                            Dependency::Properties(p) => Dependency::Properties(p),
                            Dependency::Schema(s) => {
                                Dependency::Schema(f(SchemaSlot::Key(k.clone()), s)?)
                            }
                        };
                        Ok((k, dep))
                    })
                    .collect::<Result<_, _>>()?,
            ),
        })
    }

    /// Every embedded schema, in source order.
    pub fn schemas(&self) -> Vec<&S> {
        match self {
            KeywordValue::Schema(s) => vec![s],
            KeywordValue::Schemas(list) => list.iter().collect(),
            KeywordValue::SchemaMap(map) => map.iter().map(|(_, s)| s).collect(),
            KeywordValue::Types(set) => set.schemas.iter().collect(),
            KeywordValue::Items(Items::Single(s)) => vec![s],
            KeywordValue::Items(Items::Tuple(list)) => list.iter().collect(),
            KeywordValue::Dependencies(deps) => deps
                .iter()
                .filter_map(|(_, d)| match d {
                    Dependency::Schema(s) => Some(s),
                    Dependency::Properties(_) => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Position of an embedded schema relative to its keyword, used to extend
/// the child location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaSlot {
    Here,
    Index(usize),
    Key(String),
}
