//! Reference resolution - inlines `$ref` indirection across a corpus.
//!
//! One [`Resolver`] lives for one parse run. It owns the [`SchemaRegistry`]
//! and a cache of completed reference targets, so a completed target is
//! shared by every node that references it. A reference back into a target
//! still being expanded higher on the stack is cut with a
//! [`SchemaNode::cycle_stub`], which keeps recursion bounded by the number of
//! distinct targets.
//!
//! Only complete expansions are cached. A target whose expansion cut a cycle
//! at an ancestor still on the stack holds a stub of that ancestor, so it is
//! returned to its caller but expanded again when referenced later.

use std::borrow::Cow;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use tracing::debug;
use url::Url;

use crate::error::ResolveError;
use crate::keyword::{Collector, Keyword, SchemaMap};
use crate::registry::{without_fragment, SchemaRegistry};
use crate::schema::{SchemaNode, SchemaRef};

/// Resolution context for one parse run.
#[derive(Debug)]
pub struct Resolver {
    registry: SchemaRegistry,
    resolved: HashMap<Url, SchemaRef>,
    /// Targets being expanded, outermost first.
    stack: Vec<Url>,
    /// Shallowest stack depth cut by a cycle in the expansion in progress.
    cut: Option<usize>,
}

impl Resolver {
    pub fn new(registry: SchemaRegistry) -> Self {
        Self {
            registry,
            resolved: HashMap::new(),
            stack: Vec::new(),
            cut: None,
        }
    }

    pub fn registry(&self) -> &SchemaRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut SchemaRegistry {
        &mut self.registry
    }

    pub fn into_registry(self) -> SchemaRegistry {
        self.registry
    }

    /// Number of distinct reference targets expanded so far.
    pub fn resolved_count(&self) -> usize {
        self.resolved.len()
    }

    /// Resolve the whole document registered (or fetchable) at `uri`.
    ///
    /// Documents are cached like any other target, so resolving the same
    /// document twice returns the same node.
    pub fn resolve_document(&mut self, uri: &Url) -> Result<SchemaRef, ResolveError> {
        self.resolve_target(&without_fragment(uri))
    }

    /// Resolve `node` in the context of `current`.
    ///
    /// The result carries no `$ref` anywhere in its tree.
    ///
    /// # Errors
    ///
    /// Returns `ResolveError` if a target cannot be found or a reference is
    /// malformed. Nothing is partially resolved on error.
    pub fn resolve(&mut self, node: &SchemaRef, current: &Url) -> Result<SchemaRef, ResolveError> {
        for keyword in node.keywords() {
            if let Keyword::Anchor(anchor) = keyword {
                self.registry.register_anchor(current, anchor, Arc::clone(node));
            }
        }
        if node.is_leaf() {
            return Ok(Arc::clone(node));
        }

        let keywords = node.keywords();
        let mut order: Vec<usize> = (0..keywords.len()).collect();
        order.sort_by_key(|&i| keywords[i].priority());

        let mut rebuilt: Vec<Option<Keyword>> = keywords.iter().map(|_| None).collect();
        for i in order {
            rebuilt[i] = Some(self.resolve_keyword(&keywords[i], current)?);
        }
        let own: Vec<Keyword> = rebuilt.into_iter().flatten().collect();

        let references: Vec<&str> = own.iter().filter_map(Keyword::reference).collect();
        let reference = match references.as_slice() {
            [] => return Ok(Arc::new(node.with_keywords(own))),
            [reference] => reference.to_string(),
            _ => {
                return Err(ResolveError::MalformedReference {
                    reference: references.join(", "),
                    message: "a schema may carry only one $ref".to_string(),
                })
            }
        };

        let target_uri = target_uri(&reference, current)?;
        let target = self.resolve_target(&target_uri)?;

        let mut merged: Vec<Keyword> = own
            .into_iter()
            .filter(|k| k.reference().is_none())
            .collect();
        if merged.is_empty() {
            return Ok(target);
        }
        merged.extend(target.keywords().iter().cloned());
        let node = SchemaNode::new(merged).with_base_uri(without_fragment(&target_uri));
        Ok(Arc::new(node))
    }

    fn resolve_keyword(&mut self, keyword: &Keyword, current: &Url) -> Result<Keyword, ResolveError> {
        let rebuilt = match keyword.collector() {
            Some(Collector::Keyed(map, rebuild)) => {
                let mut out = SchemaMap::with_capacity(map.len());
                for (key, schema) in map {
                    out.insert(key.clone(), self.resolve(schema, current)?);
                }
                rebuild(out)
            }
            Some(Collector::Ordered(list, rebuild)) => {
                let out = list
                    .iter()
                    .map(|schema| self.resolve(schema, current))
                    .collect::<Result<Vec<_>, _>>()?;
                rebuild(out)
            }
            Some(Collector::Single(schema, rebuild)) => rebuild(self.resolve(schema, current)?),
            None => keyword.clone(),
        };
        Ok(rebuilt)
    }

    /// Expand the node at an absolute target URI, reusing completed expansions.
    fn resolve_target(&mut self, target: &Url) -> Result<SchemaRef, ResolveError> {
        let key = cache_key(target);
        if let Some(hit) = self.resolved.get(&key) {
            debug!(reference = %key, "reusing resolved reference");
            return Ok(Arc::clone(hit));
        }

        let document = without_fragment(&key);
        let fragment = decode_fragment(&key)?.into_owned();
        let raw = self.registry.lookup(&document, &fragment)?;

        if let Some(depth) = self.stack.iter().position(|active| *active == key) {
            debug!(reference = %key, "reference cycle cut");
            self.cut = Some(self.cut.map_or(depth, |cut| cut.min(depth)));
            let (raw, document) = self.follow_aliases(raw, document)?;
            return Ok(Arc::new(raw.cycle_stub().with_base_uri(document)));
        }

        let depth = self.stack.len();
        let outer_cut = self.cut.take();
        self.stack.push(key.clone());
        let result = self.resolve(&raw, &document);
        self.stack.pop();

        // Cuts at this target or below are closed; shallower ones are still open.
        let open_cut = self.cut.take().filter(|&cut| cut < depth);
        self.cut = match (outer_cut, open_cut) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        let resolved = result?;

        if open_cut.is_some() {
            debug!(reference = %key, "resolved inside an open cycle");
            return Ok(resolved);
        }
        debug!(reference = %key, "resolved reference");
        self.resolved.insert(key, Arc::clone(&resolved));
        if !fragment.is_empty() {
            self.registry
                .register_anchor(&document, &fragment, Arc::clone(&resolved));
        }
        Ok(resolved)
    }

    /// Follow nodes made of a bare `$ref` to the first node with content of
    /// its own, so a cycle closing on an alias keeps the aliased scalars.
    fn follow_aliases(
        &mut self,
        mut raw: SchemaRef,
        mut document: Url,
    ) -> Result<(SchemaRef, Url), ResolveError> {
        let mut seen: HashSet<Url> = HashSet::new();
        loop {
            let reference = match raw.keywords() {
                [Keyword::Ref(reference)] => reference.clone(),
                _ => break,
            };
            let target = cache_key(&target_uri(&reference, &document)?);
            if !seen.insert(target.clone()) {
                break;
            }
            let fragment = decode_fragment(&target)?.into_owned();
            document = without_fragment(&target);
            raw = self.registry.lookup(&document, &fragment)?;
        }
        Ok((raw, document))
    }
}

/// Absolute URI a `$ref` points at, seen from `current`.
///
/// Relative references are joined against `current`, which for a document
/// URI means against the directory holding it. A reference made only of a
/// fragment stays inside the current document.
pub fn target_uri(reference: &str, current: &Url) -> Result<Url, ResolveError> {
    let malformed = |err: url::ParseError| ResolveError::MalformedReference {
        reference: reference.to_string(),
        message: err.to_string(),
    };
    match Url::parse(reference) {
        Ok(url) => Ok(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            let base = without_fragment(current);
            base.join(reference).map_err(malformed)
        }
        Err(err) => Err(malformed(err)),
    }
}

/// Target URI with an empty fragment normalized away.
fn cache_key(target: &Url) -> Url {
    match target.fragment() {
        Some("") => without_fragment(target),
        _ => target.clone(),
    }
}

pub(crate) fn decode_fragment(target: &Url) -> Result<Cow<'_, str>, ResolveError> {
    let raw = target.fragment().unwrap_or("");
    percent_decode_str(raw)
        .decode_utf8()
        .map_err(|err| ResolveError::MalformedReference {
            reference: target.to_string(),
            message: err.to_string(),
        })
}
