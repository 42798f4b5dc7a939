//! Schema locations and `$id` scope resolution.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use url::Url;

use crate::error::SchemaError;
use crate::pointer::{JsonPath, Segment};

static ANONYMOUS_DOCUMENTS: AtomicU64 = AtomicU64::new(0);

/// Where a schema node lives, and the base URI its references resolve against.
///
/// Immutable; [`child`](Self::child) and [`with_id`](Self::with_id) return
/// new locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SchemaLocation {
    document_uri: Url,
    json_path: JsonPath,
    resolution_scope: Url,
    canonical_uri: Url,
}

impl SchemaLocation {
    /// Location of the root of the document identified by `uri`.
    pub fn for_document(uri: &Url) -> Self {
        let document_uri = without_fragment(uri);
        Self {
            resolution_scope: document_uri.clone(),
            canonical_uri: document_uri.clone(),
            document_uri,
            json_path: JsonPath::root(),
        }
    }

    /// Location for a document with no identifying URI.
    ///
    /// Each call yields a URI unique to this process, so such documents still
    /// get a cache identity. The URI means nothing outside the session.
    pub fn anonymous() -> Self {
        let n = ANONYMOUS_DOCUMENTS.fetch_add(1, Ordering::Relaxed);
        let uri = Url::parse(&format!("mem://anonymous-{}/schema.json", n))
            .unwrap_or_else(|_| unreachable!("anonymous document URI is well-formed"));
        Self::for_document(&uri)
    }

    pub fn document_uri(&self) -> &Url {
        &self.document_uri
    }

    pub fn json_path(&self) -> &JsonPath {
        &self.json_path
    }

    pub fn resolution_scope(&self) -> &Url {
        &self.resolution_scope
    }

    /// The resolved `$id` of this node, else its absolute pointer URI.
    pub fn canonical_uri(&self) -> &Url {
        &self.canonical_uri
    }

    /// Key under which the node is cached.
    pub fn unique_uri(&self) -> String {
        cache_key(&self.canonical_uri)
    }

    /// Document URI plus the json path as a fragment.
    pub fn pointer_uri(&self) -> Url {
        let mut uri = self.document_uri.clone();
        if !self.json_path.is_root() {
            let fragment = self.json_path.to_uri_fragment();
            uri.set_fragment(Some(&fragment[1..]));
        }
        uri
    }

    pub fn child(&self, segment: Segment) -> Self {
        let json_path = self.json_path.child(segment);
        let mut next = Self {
            document_uri: self.document_uri.clone(),
            json_path,
            resolution_scope: self.resolution_scope.clone(),
            canonical_uri: self.document_uri.clone(),
        };
        next.canonical_uri = next.pointer_uri();
        next
    }

    pub fn child_key(&self, key: impl Into<String>) -> Self {
        self.child(Segment::Key(key.into()))
    }

    pub fn child_index(&self, index: usize) -> Self {
        self.child(Segment::Index(index))
    }

    /// Apply an `$id` (or draft 3/4 `id`) found at this location.
    ///
    /// An absolute id starts a new document root. A relative id or a
    /// fragment alias only moves the resolution scope and canonical URI.
    pub fn with_id(&self, id: &str) -> Result<Self, SchemaError> {
        let resolved = self
            .resolution_scope
            .join(id)
            .map_err(|e| SchemaError::InvalidLocation {
                uri: id.to_string(),
                message: e.to_string(),
            })?;
        let is_absolute = Url::parse(id).is_ok();
        let has_fragment = resolved.fragment().map(|f| !f.is_empty()).unwrap_or(false);

        if has_fragment {
            return Ok(Self {
                document_uri: self.document_uri.clone(),
                json_path: self.json_path.clone(),
                resolution_scope: without_fragment(&resolved),
                canonical_uri: resolved,
            });
        }

        let base = without_fragment(&resolved);
        if is_absolute {
            Ok(Self::for_document(&base))
        } else {
            Ok(Self {
                document_uri: self.document_uri.clone(),
                json_path: self.json_path.clone(),
                resolution_scope: base.clone(),
                canonical_uri: base,
            })
        }
    }

    /// Resolve a reference against this location's resolution scope.
    pub fn resolve(&self, reference: &str) -> Result<Url, SchemaError> {
        self.resolution_scope
            .join(reference)
            .map_err(|e| SchemaError::InvalidLocation {
                uri: reference.to_string(),
                message: e.to_string(),
            })
    }
}

impl fmt::Display for SchemaLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_uri)
    }
}

/// Normalized string form of a URI for cache lookups.
///
/// An empty fragment is dropped, so `a.json#` and `a.json` share a key.
pub fn cache_key(uri: &Url) -> String {
    match uri.fragment() {
        Some("") => without_fragment(uri).to_string(),
        _ => uri.to_string(),
    }
}

pub(crate) fn without_fragment(uri: &Url) -> Url {
    let mut uri = uri.clone();
    uri.set_fragment(None);
    uri
}
