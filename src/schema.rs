//! Immutable schema graph.
//!
//! Nodes live in an arena ([`SchemaGraph`]) and refer to each other by
//! [`SchemaId`], so shared and cyclic references need no ownership tricks.
//! A [`Schema`] is a cheap handle: the shared graph plus one node id.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use crate::error::ValidatorError;
use crate::keyword::{Keyword, KeywordMap, KeywordValue};
use crate::location::SchemaLocation;
use crate::types::Draft;

/// Longest `$ref` → `$ref` chain followed before giving up.
pub const MAX_REF_DEPTH: usize = 10;

static SESSIONS: AtomicU64 = AtomicU64::new(0);

/// Index of a node in a [`SchemaGraph`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaId(pub(crate) usize);

impl SchemaId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Resolution state of a `$ref`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefTarget {
    /// Absolute reference URI, not bound yet.
    Unresolved(Url),
    Resolved(SchemaId),
}

/// What a node consists of.
#[derive(Debug, Clone, PartialEq)]
pub enum SchemaBody {
    Keywords {
        keywords: KeywordMap,
        /// Unknown keywords, kept verbatim.
        extra: Map<String, Value>,
    },
    /// Draft 6 `true`/`false` schema; also the canonical form of boolean
    /// `additionalItems`/`additionalProperties`.
    Boolean(bool),
    Ref {
        /// The reference as written in the document.
        reference: String,
        target: RefTarget,
    },
}

impl SchemaBody {
    pub fn empty() -> Self {
        SchemaBody::Keywords {
            keywords: KeywordMap::new(),
            extra: Map::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaNode {
    pub location: SchemaLocation,
    pub draft: Draft,
    pub body: SchemaBody,
}

/// Arena of schema nodes built by one loader session.
#[derive(Debug, Clone)]
pub struct SchemaGraph {
    session: u64,
    nodes: Vec<SchemaNode>,
}

impl Default for SchemaGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl SchemaGraph {
    pub fn new() -> Self {
        Self {
            session: SESSIONS.fetch_add(1, Ordering::Relaxed),
            nodes: Vec::new(),
        }
    }

    /// Copy of this graph under a new session, so its handles never compare
    /// equal to handles into this one.
    pub(crate) fn detached(&self) -> Self {
        Self {
            session: SESSIONS.fetch_add(1, Ordering::Relaxed),
            nodes: self.nodes.clone(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The node for `id`, or `None` when `id` belongs to another graph.
    pub fn get(&self, id: SchemaId) -> Option<&SchemaNode> {
        self.nodes.get(id.0)
    }

    pub(crate) fn node(&self, id: SchemaId) -> &SchemaNode {
        &self.nodes[id.0]
    }

    pub fn ids(&self) -> impl Iterator<Item = SchemaId> {
        (0..self.nodes.len()).map(SchemaId)
    }

    /// Allocate a node before its body is known.
    pub(crate) fn reserve(&mut self, location: SchemaLocation, draft: Draft) -> SchemaId {
        self.nodes.push(SchemaNode {
            location,
            draft,
            body: SchemaBody::empty(),
        });
        SchemaId(self.nodes.len() - 1)
    }

    /// Drop nodes allocated after the first `len`.
    pub(crate) fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub(crate) fn fill(&mut self, id: SchemaId, body: SchemaBody) {
        self.nodes[id.0].body = body;
    }

    /// Bind a pending reference. A reference is bound at most once.
    pub(crate) fn bind(&mut self, id: SchemaId, target: SchemaId) -> bool {
        match &mut self.nodes[id.0].body {
            SchemaBody::Ref {
                target: slot @ RefTarget::Unresolved(_),
                ..
            } => {
                *slot = RefTarget::Resolved(target);
                true
            }
            _ => false,
        }
    }

    /// Follow `$ref` links from `id` to a node that is not a reference.
    pub(crate) fn follow(&self, id: SchemaId) -> Result<SchemaId, ValidatorError> {
        let mut current = id;
        for _ in 0..=MAX_REF_DEPTH {
            match &self.node(current).body {
                SchemaBody::Ref {
                    target: RefTarget::Resolved(next),
                    ..
                } => current = *next,
                SchemaBody::Ref {
                    target: RefTarget::Unresolved(uri),
                    ..
                } => {
                    return Err(ValidatorError::UnresolvedReference {
                        location: self.node(current).location.to_string(),
                        reference: uri.to_string(),
                    })
                }
                _ => return Ok(current),
            }
        }
        Err(ValidatorError::ReferenceCycle {
            location: self.node(id).location.to_string(),
        })
    }
}

/// A schema node together with the graph it belongs to.
///
/// Cloning is cheap; handles are `Send + Sync` and can be shared across
/// threads.
#[derive(Clone)]
pub struct Schema {
    graph: Arc<SchemaGraph>,
    id: SchemaId,
}

impl Schema {
    pub(crate) fn new(graph: Arc<SchemaGraph>, id: SchemaId) -> Self {
        Self { graph, id }
    }

    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn graph(&self) -> &Arc<SchemaGraph> {
        &self.graph
    }

    pub fn node(&self) -> &SchemaNode {
        self.graph.node(self.id)
    }

    pub fn location(&self) -> &SchemaLocation {
        &self.node().location
    }

    pub fn draft(&self) -> Draft {
        self.node().draft
    }

    /// Another node of the same graph.
    pub(crate) fn subschema(&self, id: SchemaId) -> Schema {
        Schema::new(Arc::clone(&self.graph), id)
    }

    /// Whether both handles denote the same node of the same load session.
    pub fn ptr_eq(a: &Schema, b: &Schema) -> bool {
        a.id == b.id && a.graph.session == b.graph.session
    }

    pub fn is_ref(&self) -> bool {
        matches!(self.node().body, SchemaBody::Ref { .. })
    }

    /// The reference as written, for `$ref` nodes.
    pub fn reference(&self) -> Option<&str> {
        match &self.node().body {
            SchemaBody::Ref { reference, .. } => Some(reference),
            _ => None,
        }
    }

    /// The node a `$ref` chain ends at; `self` for non-references.
    pub fn resolved(&self) -> Result<Schema, ValidatorError> {
        self.graph.follow(self.id).map(|id| self.subschema(id))
    }

    /// Keyword map, delegated through references.
    ///
    /// `None` for boolean schemas and unresolved references.
    pub fn keywords(&self) -> Option<&KeywordMap> {
        let id = self.graph.follow(self.id).ok()?;
        match &self.graph.node(id).body {
            SchemaBody::Keywords { keywords, .. } => Some(keywords),
            _ => None,
        }
    }

    pub fn get(&self, keyword: Keyword) -> Option<&KeywordValue> {
        self.keywords()?.get(&keyword)
    }

    /// Unknown keywords kept from the source document.
    pub fn extra(&self) -> Option<&Map<String, Value>> {
        let id = self.graph.follow(self.id).ok()?;
        match &self.graph.node(id).body {
            SchemaBody::Keywords { extra, .. } => Some(extra),
            _ => None,
        }
    }

    /// `Some(b)` for boolean schemas.
    pub fn as_bool(&self) -> Option<bool> {
        let id = self.graph.follow(self.id).ok()?;
        match self.graph.node(id).body {
            SchemaBody::Boolean(b) => Some(b),
            _ => None,
        }
    }

    pub fn title(&self) -> Option<&str> {
        match self.get(Keyword::Title)? {
            KeywordValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self.get(Keyword::Description)? {
            KeywordValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Subschemas directly embedded under `keyword`.
    pub fn children(&self, keyword: Keyword) -> Vec<Schema> {
        self.get(keyword)
            .map(|value| value.schemas().into_iter().map(|id| self.subschema(*id)).collect())
            .unwrap_or_default()
    }

    /// The schema of a named property, if declared under `properties`.
    pub fn property(&self, name: &str) -> Option<Schema> {
        match self.get(Keyword::Properties)? {
            KeywordValue::SchemaMap(map) => map
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, id)| self.subschema(*id)),
            _ => None,
        }
    }

    /// A named entry of `definitions`.
    pub fn definition(&self, name: &str) -> Option<Schema> {
        match self.get(Keyword::Definitions)? {
            KeywordValue::SchemaMap(map) => map
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, id)| self.subschema(*id)),
            _ => None,
        }
    }
}

impl fmt::Debug for Schema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Schema")
            .field("id", &self.id.0)
            .field("location", &self.location().canonical_uri().as_str())
            .finish()
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        Schema::ptr_eq(self, other)
    }
}
