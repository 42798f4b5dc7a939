//! `$ref` resolution.
//!
//! Building a document leaves every `$ref` node as
//! [`RefTarget::Unresolved`] and queues it. [`Resolver::resolve_pending`]
//! then drains the queue: each reference is looked up in the cache, or its
//! target is located (same document, `$id` alias, or fetched document),
//! built at its canonical location and bound. Building a target may queue
//! more references, so the loop runs until the queue is empty.

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::builder::BuildContext;
use crate::digest::Digester;
use crate::error::{FetchError, SchemaError, ValidatorError};
use crate::fetch::{is_fetchable, DocumentFetcher};
use crate::keyword::{KeywordMetadata, SchemaPosition};
use crate::location::{cache_key, without_fragment, SchemaLocation};
use crate::pointer::{JsonPath, Segment};
use crate::report::LoadingIssueKind;
use crate::schema::{RefTarget, SchemaBody, SchemaId};
use crate::types::Draft;

/// A located reference target, ready to be digested and built.
#[derive(Debug)]
struct Target {
    /// Location of the node before its own `$id` is applied.
    location: SchemaLocation,
    draft: Draft,
    value: Value,
}

pub(crate) struct Resolver<'f> {
    fetcher: &'f dyn DocumentFetcher,
    default_draft: Draft,
    strict: bool,
}

impl<'f> Resolver<'f> {
    pub fn new(fetcher: &'f dyn DocumentFetcher, default_draft: Draft, strict: bool) -> Self {
        Self {
            fetcher,
            default_draft,
            strict,
        }
    }

    /// Bind every queued reference, then reject chains that never reach a
    /// schema. Failures go to the report.
    pub fn resolve_pending(&self, cx: &mut BuildContext<'_>) {
        let mut bound = Vec::new();
        while let Some(id) = cx.pending.pop() {
            let node = cx.graph.node(id);
            let SchemaBody::Ref {
                target: RefTarget::Unresolved(uri),
                ..
            } = &node.body
            else {
                continue;
            };
            let uri = uri.clone();
            let from = node.location.to_string();

            match self.resolve_reference(&uri, cx) {
                Ok(target) => {
                    debug!(reference = %uri, from = %from, "resolved reference");
                    cx.graph.bind(id, target);
                    bound.push(id);
                }
                Err(e) => {
                    let kind = match e {
                        SchemaError::InvalidLocation { .. } => LoadingIssueKind::InvalidLocation,
                        _ => LoadingIssueKind::UnresolvableReference,
                    };
                    cx.report.error(kind, from, e.to_string());
                }
            }
        }

        for id in bound {
            if let Err(e @ ValidatorError::ReferenceCycle { .. }) = cx.graph.follow(id) {
                cx.report.error(
                    LoadingIssueKind::UnresolvableReference,
                    cx.graph.node(id).location.to_string(),
                    e.to_string(),
                );
            }
        }
    }

    /// Node for an absolute reference URI, building it if needed.
    ///
    /// The result is cached under `uri` as well as under the node's own
    /// location.
    pub fn resolve_reference(
        &self,
        uri: &Url,
        cx: &mut BuildContext<'_>,
    ) -> Result<SchemaId, SchemaError> {
        if let Some(id) = cx.cache.get(uri) {
            return Ok(id);
        }

        let target = self.locate(uri, cx)?;
        let digester = Digester::new(target.draft, self.strict);
        let id = digester
            .digest(&target.value)
            .build(&target.location, target.draft, cx);
        cx.cache.insert(uri, id);
        Ok(id)
    }

    fn locate(&self, uri: &Url, cx: &mut BuildContext<'_>) -> Result<Target, SchemaError> {
        let base = without_fragment(uri);
        let base_key = cache_key(&base);

        let (document, root) = if cx.cache.document(&base_key).is_some() {
            (base_key, JsonPath::root())
        } else if let Some(resource) = cx.cache.resource(&base_key) {
            (resource.document.clone(), resource.path.clone())
        } else {
            self.fetch(&base, cx)?;
            (base_key, JsonPath::root())
        };

        let path = match uri.fragment() {
            None | Some("") => root,
            Some(pointer) if pointer.starts_with('/') => {
                let relative = JsonPath::from_pointer(&format!("#{}", pointer)).map_err(|message| {
                    SchemaError::InvalidLocation {
                        uri: uri.to_string(),
                        message,
                    }
                })?;
                root.join(&relative)
            }
            Some(_) => {
                let resource =
                    cx.cache
                        .resource(uri.as_str())
                        .ok_or_else(|| SchemaError::UnresolvableReference {
                            uri: uri.to_string(),
                            message: "no schema declares this id".to_string(),
                        })?;
                if resource.document != document {
                    return Err(SchemaError::UnresolvableReference {
                        uri: uri.to_string(),
                        message: format!("id is declared in {}", resource.document),
                    });
                }
                resource.path.clone()
            }
        };

        let draft = cx
            .cache
            .document_draft(&document)
            .unwrap_or(self.default_draft);
        let value = cx
            .cache
            .document(&document)
            .ok_or_else(|| SchemaError::UnresolvableReference {
                uri: uri.to_string(),
                message: format!("document {} is not loaded", document),
            })?;
        let document_uri = Url::parse(&document).map_err(|e| SchemaError::InvalidLocation {
            uri: document.clone(),
            message: e.to_string(),
        })?;

        let (location, draft, value) = replay(&document_uri, value, draft, &path).ok_or_else(|| {
            SchemaError::UnresolvableReference {
                uri: uri.to_string(),
                message: format!("{} does not exist in {}", path, document),
            }
        })??;

        Ok(Target {
            location,
            draft,
            value: value.clone(),
        })
    }

    /// Fetch an external document into the cache.
    fn fetch(&self, base: &Url, cx: &mut BuildContext<'_>) -> Result<(), SchemaError> {
        let fetch_error = |source| SchemaError::Fetch {
            uri: base.to_string(),
            source,
        };
        if base.scheme() == "mem" {
            return Err(SchemaError::UnresolvableReference {
                uri: base.to_string(),
                message: "no such schema in this session".to_string(),
            });
        }
        if !is_fetchable(base) {
            return Err(fetch_error(FetchError::UnsupportedScheme {
                url: base.to_string(),
            }));
        }

        debug!(uri = %base, "fetching external document");
        let document = self.fetcher.fetch(base).map_err(fetch_error)?;
        let draft = Draft::detect(&document, self.default_draft);
        cx.cache.add_document(base, document, draft);
        Ok(())
    }
}

/// Walk `path` from the document root the way the tree build does, so the
/// target gets the same location (and thus cache identity) it would have
/// had when reached through its parents.
///
/// `None` when the path does not exist.
#[allow(clippy::type_complexity)]
fn replay<'v>(
    document_uri: &Url,
    document: &'v Value,
    mut draft: Draft,
    path: &JsonPath,
) -> Option<Result<(SchemaLocation, Draft, &'v Value), SchemaError>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Expect {
        Schema,
        Container,
        Other,
    }

    let mut location = SchemaLocation::for_document(document_uri);
    let mut value = document;
    let mut expect = Expect::Schema;

    for segment in path.segments() {
        if expect == Expect::Schema {
            if let Some(d) = value
                .get("$schema")
                .and_then(Value::as_str)
                .and_then(Draft::from_url)
            {
                draft = d;
            }
            if let Some(id) = value.get(draft.id_keyword()).and_then(Value::as_str) {
                location = match location.with_id(id) {
                    Ok(with_id) => with_id,
                    Err(e) => return Some(Err(e)),
                };
            }
        }

        let next = JsonPath::root().child(segment.clone()).evaluate(value)?;
        expect = match (expect, segment) {
            (Expect::Schema, Segment::Key(key)) => match KeywordMetadata::lookup(key, draft) {
                Some(meta) => match (meta.position, next) {
                    (SchemaPosition::Single, _) => Expect::Schema,
                    (SchemaPosition::SingleOrList, Value::Array(_)) => Expect::Container,
                    (SchemaPosition::SingleOrList, _) => Expect::Schema,
                    (SchemaPosition::List | SchemaPosition::Map, _) => Expect::Container,
                    (SchemaPosition::None, _) => Expect::Other,
                },
                None => Expect::Other,
            },
            (Expect::Container, _) => Expect::Schema,
            _ => Expect::Other,
        };
        location = location.child(segment.clone());
        value = next;
    }

    Some(Ok((location, draft, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn uri(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn replay_applies_ids_on_the_way() {
        let doc = json!({
            "$id": "http://example.com/root.json",
            "definitions": {
                "a": {"$id": "nested/", "properties": {"b": {}}}
            }
        });
        let path = JsonPath::from_pointer("/definitions/a/properties/b").unwrap();
        let (location, draft, value) =
            replay(&uri("http://example.com/root.json"), &doc, Draft::V6, &path)
                .unwrap()
                .unwrap();
        assert_eq!(draft, Draft::V6);
        assert_eq!(value, &json!({}));
        assert_eq!(
            location.resolution_scope().as_str(),
            "http://example.com/nested/"
        );
        assert_eq!(
            location.json_path().to_pointer(),
            "/definitions/a/properties/b"
        );
    }

    #[test]
    fn replay_ignores_ids_outside_schemas() {
        let doc = json!({"definitions": {"$id": "http://elsewhere.com/", "a": {}}});
        let path = JsonPath::from_pointer("/definitions/a").unwrap();
        let (location, _, _) = replay(&uri("http://example.com/a.json"), &doc, Draft::V6, &path)
            .unwrap()
            .unwrap();
        assert_eq!(
            location.resolution_scope().as_str(),
            "http://example.com/a.json"
        );
    }

    #[test]
    fn replay_missing_path() {
        let doc = json!({"definitions": {}});
        let path = JsonPath::from_pointer("/definitions/missing").unwrap();
        assert!(replay(&uri("http://example.com/a.json"), &doc, Draft::V6, &path).is_none());
    }
}
