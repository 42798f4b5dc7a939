//! URI-keyed caches shared by every build of a loader session.

use std::collections::HashMap;

use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::keyword::{KeywordMetadata, SchemaPosition};
use crate::location::{cache_key, SchemaLocation};
use crate::pointer::JsonPath;
use crate::schema::SchemaId;
use crate::types::Draft;

/// Where an `$id` was declared: raw document key plus path inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub document: String,
    pub path: JsonPath,
}

/// Schema and document caches.
///
/// Entries are never replaced once present, which is what guarantees that
/// a URI is bound to one node for the whole session.
#[derive(Debug, Clone, Default)]
pub struct SchemaCache {
    schemas: HashMap<String, SchemaId>,
    documents: HashMap<String, (Value, Draft)>,
    resources: HashMap<String, Resource>,
}

impl SchemaCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, uri: &Url) -> Option<SchemaId> {
        self.schemas.get(&cache_key(uri)).copied()
    }

    /// Node cached for a location, by unique URI then pointer URI.
    pub fn lookup(&self, location: &SchemaLocation) -> Option<SchemaId> {
        self.schemas
            .get(&location.unique_uri())
            .or_else(|| self.schemas.get(&cache_key(&location.pointer_uri())))
            .copied()
    }

    /// Cache a node under its unique and pointer URIs.
    pub fn register(&mut self, location: &SchemaLocation, id: SchemaId) {
        self.insert(location.canonical_uri(), id);
        self.insert(&location.pointer_uri(), id);
    }

    /// Cache `id` under `uri` unless the URI is already bound.
    pub fn insert(&mut self, uri: &Url, id: SchemaId) -> bool {
        let key = cache_key(uri);
        if self.schemas.contains_key(&key) {
            return false;
        }
        self.schemas.insert(key, id);
        true
    }

    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }

    pub fn document(&self, uri: &str) -> Option<&Value> {
        self.documents.get(uri).map(|(doc, _)| doc)
    }

    pub fn document_draft(&self, uri: &str) -> Option<Draft> {
        self.documents.get(uri).map(|(_, draft)| *draft)
    }

    pub fn resource(&self, uri: &str) -> Option<&Resource> {
        self.resources.get(uri)
    }

    /// Key of a previously added document equal to `document`, if any.
    pub(crate) fn find_document(&self, document: &Value, scheme: &str) -> Option<String> {
        self.documents
            .iter()
            .find(|(key, (doc, _))| key.starts_with(scheme) && doc == document)
            .map(|(key, _)| key.clone())
    }

    /// Store a raw document and index every `$id` declared in it.
    ///
    /// Returns `false` if a document was already stored under `uri`.
    pub fn add_document(&mut self, uri: &Url, document: Value, draft: Draft) -> bool {
        let key = cache_key(uri);
        if self.documents.contains_key(&key) {
            return false;
        }
        let mut found = Vec::new();
        scan_ids(
            &document,
            &SchemaLocation::for_document(uri),
            &JsonPath::root(),
            draft,
            &mut found,
        );
        for (id_uri, path) in found {
            debug!(id = %id_uri, document = %key, "indexed schema resource");
            self.resources.entry(id_uri).or_insert_with(|| Resource {
                document: key.clone(),
                path,
            });
        }
        self.documents.insert(key, (document, draft));
        true
    }
}

/// Collect `(resolved $id, path)` for every schema in `value`.
///
/// Only descends through keywords that hold schemas, so `enum` or `const`
/// values that happen to contain an `$id` key are not mistaken for schemas.
fn scan_ids(
    value: &Value,
    location: &SchemaLocation,
    path: &JsonPath,
    draft: Draft,
    found: &mut Vec<(String, JsonPath)>,
) {
    let Value::Object(map) = value else {
        return;
    };
    let location = match map.get(draft.id_keyword()).and_then(Value::as_str) {
        Some(id) => match location.with_id(id) {
            Ok(with_id) => {
                found.push((with_id.unique_uri(), path.clone()));
                with_id
            }
            Err(_) => location.clone(),
        },
        None => location.clone(),
    };
    if map.contains_key("$ref") {
        return;
    }

    for (key, child) in map {
        let Some(meta) = KeywordMetadata::lookup(key, draft) else {
            continue;
        };
        let key_location = location.child_key(key.as_str());
        let key_path = path.child_key(key.as_str());
        let scan_list = |items: &Vec<Value>, found: &mut Vec<(String, JsonPath)>| {
            for (i, item) in items.iter().enumerate() {
                scan_ids(
                    item,
                    &key_location.child_index(i),
                    &key_path.child_index(i),
                    draft,
                    found,
                );
            }
        };
        match (meta.position, child) {
            (SchemaPosition::Single, _) | (SchemaPosition::SingleOrList, Value::Object(_)) => {
                scan_ids(child, &key_location, &key_path, draft, found);
            }
            (SchemaPosition::List, Value::Array(items))
            | (SchemaPosition::SingleOrList, Value::Array(items)) => scan_list(items, found),
            (SchemaPosition::Map, Value::Object(entries)) => {
                for (name, entry) in entries {
                    scan_ids(
                        entry,
                        &key_location.child_key(name.as_str()),
                        &key_path.child_key(name.as_str()),
                        draft,
                        found,
                    );
                }
            }
            _ => {}
        }
    }
}
