//! Loading schema documents into a schema graph.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::builder::{BuildContext, SchemaBuilder};
use crate::cache::SchemaCache;
use crate::digest::Digester;
use crate::error::SchemaLoadingError;
use crate::fetch::{default_fetcher, DocumentFetcher};
use crate::location::{cache_key, without_fragment, SchemaLocation};
use crate::report::{LoadingIssueKind, LoadingReport};
use crate::resolver::Resolver;
use crate::schema::{Schema, SchemaGraph, SchemaId};
use crate::types::Draft;

/// Options for loading schemas.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoaderOptions {
    default_draft: Draft,
    strict: bool,
}

impl LoaderOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Draft assumed for documents without a recognized `$schema`.
    pub fn default_draft(mut self, draft: Draft) -> Self {
        self.default_draft = draft;
        self
    }

    /// Treat keywords with the wrong JSON type as errors instead of warnings.
    pub fn strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    pub fn draft(&self) -> Draft {
        self.default_draft
    }

    pub fn is_strict(&self) -> bool {
        self.strict
    }
}

/// Loads schema documents into one shared graph.
///
/// All loads through the same loader share a cache, so loading a document
/// twice yields the same nodes. A failed load leaves the loader as it was
/// before the call.
pub struct SchemaLoader {
    options: LoaderOptions,
    fetcher: Box<dyn DocumentFetcher>,
    cache: SchemaCache,
    graph: Arc<SchemaGraph>,
    last_report: LoadingReport,
}

impl Default for SchemaLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaLoader {
    pub fn new() -> Self {
        Self::with_options(LoaderOptions::default())
    }

    pub fn with_options(options: LoaderOptions) -> Self {
        Self {
            options,
            fetcher: default_fetcher(),
            cache: SchemaCache::new(),
            graph: Arc::new(SchemaGraph::new()),
            last_report: LoadingReport::new(),
        }
    }

    /// Replace the collaborator used for external documents.
    pub fn fetcher(mut self, fetcher: impl DocumentFetcher + 'static) -> Self {
        self.fetcher = Box::new(fetcher);
        self
    }

    pub fn options(&self) -> &LoaderOptions {
        &self.options
    }

    pub fn cache(&self) -> &SchemaCache {
        &self.cache
    }

    /// Issues of the most recent load, including warnings of a successful one.
    pub fn last_report(&self) -> &LoadingReport {
        &self.last_report
    }

    /// Load a document.
    ///
    /// The document is identified by its root `$id` when that is absolute.
    /// Otherwise it gets an anonymous URI, reused when the same document is
    /// loaded again.
    pub fn load(&mut self, document: &Value) -> Result<Schema, SchemaLoadingError> {
        let draft = Draft::detect(document, self.options.default_draft);
        let declared = document
            .get(draft.id_keyword())
            .and_then(Value::as_str)
            .and_then(|id| Url::parse(id).ok())
            .map(|uri| without_fragment(&uri));
        let uri = match declared {
            Some(uri) => uri,
            None => self
                .cache
                .find_document(document, "mem:")
                .and_then(|key| Url::parse(&key).ok())
                .unwrap_or_else(|| SchemaLocation::anonymous().document_uri().clone()),
        };
        self.load_with_uri(document, &uri)
    }

    /// Load a document retrieved from `uri`.
    pub fn load_with_uri(
        &mut self,
        document: &Value,
        uri: &Url,
    ) -> Result<Schema, SchemaLoadingError> {
        let draft = Draft::detect(document, self.options.default_draft);
        let digester = Digester::new(draft, self.options.strict);
        let uri = without_fragment(uri);

        self.run(|_, cx| {
            if !cx.cache.add_document(&uri, document.clone(), draft)
                && cx.cache.document(&cache_key(&uri)) != Some(document)
            {
                cx.report.warning(
                    LoadingIssueKind::InvalidLocation,
                    uri.to_string(),
                    "a different document is already loaded under this URI; keeping the first",
                );
            }
            let location = SchemaLocation::for_document(&uri);
            Some(digester.digest(document).build(&location, draft, cx))
        })
    }

    /// Load the schema a URI refers to, fetching its document if needed.
    ///
    /// The fragment may be a JSON pointer or an `$id` alias.
    pub fn load_uri(&mut self, uri: &Url) -> Result<Schema, SchemaLoadingError> {
        self.run(|resolver, cx| match resolver.resolve_reference(uri, cx) {
            Ok(id) => Some(id),
            Err(e) => {
                cx.report.error(
                    LoadingIssueKind::UnresolvableReference,
                    uri.to_string(),
                    e.to_string(),
                );
                None
            }
        })
    }

    /// Finalize a programmatically built schema.
    pub fn build(&mut self, builder: SchemaBuilder) -> Result<Schema, SchemaLoadingError> {
        let draft = self.options.default_draft;
        self.run(|_, cx| Some(builder.build(&SchemaLocation::anonymous(), draft, cx)))
    }

    /// Run one build against the shared graph and cache, then resolve every
    /// reference it queued. Rolls back on errors.
    fn run<F>(&mut self, build: F) -> Result<Schema, SchemaLoadingError>
    where
        F: FnOnce(&Resolver<'_>, &mut BuildContext<'_>) -> Option<SchemaId>,
    {
        let snapshot = self.cache.clone();
        let nodes_before = self.graph.len();
        let mut report = LoadingReport::new();
        let mut pending = Vec::new();
        let resolver = Resolver::new(
            self.fetcher.as_ref(),
            self.options.default_draft,
            self.options.strict,
        );

        let root = {
            let mut cx = BuildContext {
                graph: Arc::make_mut(&mut self.graph),
                cache: &mut self.cache,
                report: &mut report,
                pending: &mut pending,
            };
            let root = build(&resolver, &mut cx);
            resolver.resolve_pending(&mut cx);
            root
        };
        self.last_report = report.clone();

        match root {
            Some(root) if !report.has_errors() => {
                debug!(
                    uri = %self.graph.node(root).location,
                    nodes = self.graph.len() - nodes_before,
                    "schema loaded"
                );
                Ok(Schema::new(Arc::clone(&self.graph), root))
            }
            root => {
                let partial = root.map(|id| Schema::new(Arc::new(self.graph.detached()), id));
                Arc::make_mut(&mut self.graph).truncate(nodes_before);
                self.cache = snapshot;
                Err(SchemaLoadingError { report, partial })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyword::Keyword;
    use serde_json::json;

    #[test]
    fn anonymous_document_reloads_to_same_nodes() {
        let mut loader = SchemaLoader::new();
        let doc = json!({"properties": {"a": {"type": "string"}}});
        let first = loader.load(&doc).unwrap();
        let second = loader.load(&doc).unwrap();
        assert!(Schema::ptr_eq(&first, &second));
        assert!(Schema::ptr_eq(
            &first.property("a").unwrap(),
            &second.property("a").unwrap()
        ));
    }

    #[test]
    fn failed_load_rolls_back() {
        let mut loader = SchemaLoader::new();
        let before = loader.cache().len();
        let err = loader
            .load(&json!({"properties": {"a": {"$ref": "#/definitions/missing"}}}))
            .unwrap_err();
        assert!(err.report.has_errors());
        assert!(err.partial.is_some());
        assert_eq!(loader.cache().len(), before);
        assert!(loader.last_report().has_errors());
    }

    #[test]
    fn strict_turns_type_mismatch_into_error() {
        let doc = json!({"minLength": "three"});
        assert!(SchemaLoader::new().load(&doc).is_ok());
        let mut strict = SchemaLoader::with_options(LoaderOptions::new().strict(true));
        let err = strict.load(&doc).unwrap_err();
        assert_eq!(err.report.find(LoadingIssueKind::TypeMismatch).len(), 1);
    }

    #[test]
    fn default_draft_applies_without_schema_keyword() {
        let mut loader = SchemaLoader::with_options(LoaderOptions::new().default_draft(Draft::V3));
        let schema = loader.load(&json!({"divisibleBy": 2})).unwrap();
        assert_eq!(schema.draft(), Draft::V3);
        assert!(schema.get(Keyword::MultipleOf).is_some());
    }

    #[test]
    fn builder_refs_resolve_within_the_build() {
        let builder = SchemaBuilder::new()
            .definition("name", SchemaBuilder::new().min_length(1))
            .property("first", SchemaBuilder::reference_to("#/definitions/name"));
        let schema = SchemaLoader::new().build(builder).unwrap();
        let first = schema.property("first").unwrap();
        assert!(Schema::ptr_eq(
            &first.resolved().unwrap(),
            &schema.definition("name").unwrap()
        ));
    }
}
