//! Schema Graph
//!
//! Loading and validation of JSON Schema drafts 3, 4 and 6.
//!
//! Documents are loaded into an immutable graph of schema nodes. Every node
//! gets a canonical URI, `$ref`s are bound to the node they point at (inside
//! the document, through `$id` aliases, or in fetched documents), and a
//! cache guarantees that each URI is built at most once, so shared and
//! self-referencing schemas are safe. Keywords are stored in one canonical
//! shape whatever draft they were written in; views re-serialize them into
//! any supported draft.
//!
//! # Example
//!
//! ```
//! use schema_graph::SchemaLoader;
//! use serde_json::json;
//!
//! let mut loader = SchemaLoader::new();
//! let schema = loader
//!     .load(&json!({
//!         "type": "object",
//!         "required": ["name"],
//!         "properties": {
//!             "name": { "type": "string" }
//!         }
//!     }))
//!     .unwrap();
//!
//! let validator = schema.validator().unwrap();
//! assert!(validator.is_valid(&json!({ "name": "test" })));
//!
//! let error = validator.validate(&json!({ "name": 42 })).unwrap_err();
//! assert_eq!(error.pointer_to_violation.to_pointer(), "/name");
//! assert_eq!(error.message, "expected type: string, found: number");
//! ```
//!
//! # Drafts
//!
//! | Draft 3 | Draft 4 | Draft 6 | Canonical keyword |
//! |---------|---------|---------|-------------------|
//! | `divisibleBy` | `multipleOf` | `multipleOf` | [`Keyword::MultipleOf`] |
//! | `extends` | `allOf` | `allOf` | [`Keyword::AllOf`] |
//! | `required: true` on the property | `required` | `required` | [`Keyword::Required`] |
//! | `exclusiveMinimum: true` | `exclusiveMinimum: true` | `exclusiveMinimum: n` | [`Keyword::Minimum`] |
//!
//! Programmatic schemas are assembled with [`SchemaBuilder`]:
//!
//! ```
//! use schema_graph::{SchemaBuilder, SchemaLoader, SchemaType};
//! use serde_json::json;
//!
//! let builder = SchemaBuilder::new()
//!     .schema_type(SchemaType::Array)
//!     .items(SchemaBuilder::new().schema_type(SchemaType::Integer))
//!     .min_items(1);
//! let schema = SchemaLoader::new().build(builder).unwrap();
//! assert!(schema.validator().unwrap().is_valid(&json!([1, 2])));
//! ```

mod builder;
mod cache;
mod digest;
mod error;
mod fetch;
mod format;
mod keyword;
mod loader;
mod location;
mod number;
mod pointer;
mod report;
mod resolver;
mod rules;
mod schema;
mod types;
mod validator;
mod view;

pub use builder::SchemaBuilder;
pub use cache::{Resource, SchemaCache};
pub use error::{
    FetchError, SchemaError, SchemaLoadingError, ValidationError, ValidationErrorKind,
    ValidatorError,
};
pub use fetch::{
    default_fetcher, is_fetchable, is_url, load_document, load_document_auto, load_document_str,
    DocumentFetcher, NoFetcher, StaticFetcher,
};
pub use format::{FormatRegistry, FormatValidator};
pub use keyword::{
    Dependency, Items, Keyword, KeywordMap, KeywordMetadata, KeywordValue, NumericLimit,
    SchemaPosition, TypeSet, KEYWORDS,
};
pub use loader::{LoaderOptions, SchemaLoader};
pub use location::{cache_key, SchemaLocation};
pub use pointer::{JsonPath, Segment};
pub use report::{Issue, LoadingIssueKind, LoadingReport, Severity};
pub use schema::{RefTarget, Schema, SchemaBody, SchemaGraph, SchemaId, SchemaNode, MAX_REF_DEPTH};
pub use types::{json_type_name, Draft, JsonType, SchemaType};
pub use validator::{ValidationReport, Validator, ValidatorOptions};
pub use view::{Draft3View, Draft4View, Draft6View, DraftView};

#[cfg(feature = "remote")]
pub use fetch::{load_document_url, HttpFetcher};
