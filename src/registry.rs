//! Schema registry.
//!
//! Holds the raw documents of one parse run, keyed by fragment-less URI,
//! plus an anchor table of named or already-resolved subschemas. Documents
//! missing from the registry are fetched lazily through a [`Fetch`]
//! collaborator.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::schema::{SchemaNode, SchemaRef};

/// Supplies raw document bytes for a URI.
///
/// Returning `None` is a fetch miss; the registry reports it as a
/// reference that cannot be found.
pub trait Fetch {
    fn fetch(&self, uri: &Url) -> Option<Vec<u8>>;
}

impl<F> Fetch for F
where
    F: Fn(&Url) -> Option<Vec<u8>>,
{
    fn fetch(&self, uri: &Url) -> Option<Vec<u8>> {
        self(uri)
    }
}

/// Documents and anchors known to one parse run.
pub struct SchemaRegistry {
    fetch: Option<Box<dyn Fetch>>,
    documents: HashMap<Url, SchemaRef>,
    anchors: HashMap<(Url, String), SchemaRef>,
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for SchemaRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaRegistry")
            .field("documents", &self.documents.len())
            .field("anchors", &self.anchors.len())
            .field("fetch", &self.fetch.is_some())
            .finish()
    }
}

impl SchemaRegistry {
    /// Create a registry that never fetches.
    pub fn new() -> Self {
        Self {
            fetch: None,
            documents: HashMap::new(),
            anchors: HashMap::new(),
        }
    }

    /// Create a registry that fetches unknown documents through `fetch`.
    pub fn with_fetch(fetch: impl Fetch + 'static) -> Self {
        Self {
            fetch: Some(Box::new(fetch)),
            ..Self::new()
        }
    }

    /// Register a decoded document at `uri`. Any fragment on `uri` is ignored.
    pub fn register_document(&mut self, uri: &Url, node: SchemaNode) -> SchemaRef {
        let uri = without_fragment(uri);
        let node = Arc::new(node.with_base_uri(uri.clone()));
        self.documents.insert(uri, Arc::clone(&node));
        node
    }

    /// Whether a document is registered at `uri`.
    pub fn contains_document(&self, uri: &Url) -> bool {
        self.documents.contains_key(&without_fragment(uri))
    }

    /// Number of registered documents.
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// The document at `uri`, fetching and decoding it on first use.
    pub fn document(&mut self, uri: &Url) -> Result<SchemaRef, ResolveError> {
        let uri = without_fragment(uri);
        if let Some(doc) = self.documents.get(&uri) {
            return Ok(Arc::clone(doc));
        }

        let bytes = self
            .fetch
            .as_ref()
            .and_then(|fetch| fetch.fetch(&uri))
            .ok_or_else(|| {
                debug!(uri = %uri, "fetch miss");
                ResolveError::ReferenceNotFound {
                    reference: uri.to_string(),
                }
            })?;
        debug!(uri = %uri, bytes = bytes.len(), "fetched document");

        let node = SchemaNode::from_slice(&bytes).map_err(|source| ResolveError::Decode {
            uri: uri.to_string(),
            source,
        })?;
        Ok(self.register_document(&uri, node))
    }

    /// Register `node` under `anchor` within the document at `uri`.
    ///
    /// `anchor` is either a plain name (`$anchor`) or a JSON Pointer.
    pub fn register_anchor(&mut self, uri: &Url, anchor: &str, node: SchemaRef) {
        self.anchors
            .insert((without_fragment(uri), anchor.to_string()), node);
    }

    /// A previously registered anchor.
    pub fn anchor(&self, uri: &Url, anchor: &str) -> Option<SchemaRef> {
        self.anchors
            .get(&(without_fragment(uri), anchor.to_string()))
            .cloned()
    }

    /// Locate `fragment` inside the document at `uri`.
    ///
    /// Registered anchors are consulted first. Otherwise an empty fragment or
    /// one starting with `/` is a JSON Pointer into the raw document, and
    /// anything else names an `$anchor` inside it.
    pub fn lookup(&mut self, uri: &Url, fragment: &str) -> Result<SchemaRef, ResolveError> {
        let doc = self.document(uri)?;
        let found = self.anchor(uri, fragment).or_else(|| {
            if fragment.is_empty() || fragment.starts_with('/') {
                doc.find_subschema(fragment)
            } else {
                doc.find_anchor(fragment)
            }
        });
        found.ok_or_else(|| {
            let mut target = without_fragment(uri);
            target.set_fragment(Some(fragment));
            ResolveError::ReferenceNotFound {
                reference: target.to_string(),
            }
        })
    }
}

/// `uri` with its fragment removed.
pub fn without_fragment(uri: &Url) -> Url {
    let mut uri = uri.clone();
    uri.set_fragment(None);
    uri
}
