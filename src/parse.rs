//! Parse runs: decode, resolve and project a whole corpus.
//!
//! Decoding is independent per document and runs in parallel. Resolution
//! shares one registry and cycle cache, so it runs sequentially against a
//! single [`Resolver`].

use std::collections::HashSet;

use indexmap::IndexMap;
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::error::{ParseError, ProjectError};
use crate::loader::Corpus;
use crate::model::{ApiCategory, ApiSchema};
use crate::projector::{project_errors, project_methods};
use crate::registry::SchemaRegistry;
use crate::resolver::Resolver;
use crate::schema::{SchemaNode, SchemaRef};
use crate::types::ParseOptions;

/// Parse a corpus into the API model.
///
/// References outside the corpus are fatal. Use [`parse_with_registry`]
/// with a fetching registry to allow them.
///
/// # Errors
///
/// Returns the first decode, resolve or projection error; no partial
/// schema is produced.
pub fn parse(corpus: &Corpus, options: &ParseOptions) -> Result<ApiSchema, ParseError> {
    parse_with_registry(corpus, options, SchemaRegistry::new())
}

/// Parse a corpus, fetching referenced documents outside it through
/// `registry`.
pub fn parse_with_registry(
    corpus: &Corpus,
    options: &ParseOptions,
    registry: SchemaRegistry,
) -> Result<ApiSchema, ParseError> {
    let resolved = resolve_corpus(corpus, registry)?;

    let mut categories: IndexMap<String, ApiCategory> = IndexMap::new();
    let mut method_names: HashSet<String> = HashSet::new();
    for document in corpus.documents() {
        let Some(category) = document.category() else {
            continue;
        };
        let entry = categories.entry(category.to_string()).or_default();
        if document.file_name() != options.methods_file {
            continue;
        }
        let Some(node) = resolved.get(&document.name) else {
            continue;
        };
        let projection_failed = |source| ParseError::Project {
            document: document.name.clone(),
            source,
        };
        let methods = project_methods(node).map_err(projection_failed)?;
        debug!(
            document = %document.name,
            methods = methods.len(),
            "projected method catalog"
        );
        for (name, method) in methods {
            if !method_names.insert(name.clone()) {
                return Err(projection_failed(ProjectError::DuplicateMethod { name }));
            }
            entry.methods.insert(name, method);
        }
    }

    let errors_document = corpus
        .documents()
        .iter()
        .find(|d| d.file_name() == options.errors_file);
    let errors = match errors_document.and_then(|d| resolved.get(&d.name).map(|n| (d, n))) {
        Some((document, node)) => project_errors(node).map_err(|source| ParseError::Project {
            document: document.name.clone(),
            source,
        })?,
        None => {
            warn!(file = %options.errors_file, "no error catalog in corpus");
            IndexMap::new()
        }
    };

    let schema = ApiSchema { categories, errors };
    info!(
        categories = schema.categories.len(),
        methods = schema.method_count(),
        errors = schema.errors.len(),
        "parsed schema"
    );
    Ok(schema)
}

/// Decode and resolve every document of a corpus.
///
/// Returns the resolved documents keyed by name, in corpus order.
pub fn resolve_corpus(
    corpus: &Corpus,
    mut registry: SchemaRegistry,
) -> Result<IndexMap<String, SchemaRef>, ParseError> {
    let decoded = decode_corpus(corpus)?;
    for (document, node) in corpus.documents().iter().zip(decoded) {
        registry.register_document(&document.uri, node);
    }

    let mut resolver = Resolver::new(registry);
    let mut resolved = IndexMap::with_capacity(corpus.len());
    for document in corpus.documents() {
        let node = resolver.resolve_document(&document.uri)?;
        resolved.insert(document.name.clone(), node);
    }
    debug!(
        documents = resolved.len(),
        targets = resolver.resolved_count(),
        "resolved corpus"
    );
    Ok(resolved)
}

fn decode_corpus(corpus: &Corpus) -> Result<Vec<SchemaNode>, ParseError> {
    corpus
        .documents()
        .par_iter()
        .map(|document| {
            SchemaNode::from_slice(&document.content).map_err(|source| ParseError::Decode {
                document: document.name.clone(),
                source,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ResolveError;
    use url::Url;

    fn corpus(documents: &[(&str, &str)]) -> Corpus {
        let mut corpus = Corpus::new(Url::parse("file:///schema/").unwrap());
        for (name, content) in documents {
            corpus.insert(name, content.as_bytes()).unwrap();
        }
        corpus
    }

    #[test]
    fn categories_come_from_directories() {
        let corpus = corpus(&[
            (
                "users/methods.json",
                r#"{"methods": [{"name": "users.get", "parameters": []}]}"#,
            ),
            ("users/objects.json", r#"{"definitions": {}}"#),
            ("groups/objects.json", r#"{"definitions": {}}"#),
            ("errors.json", r#"{"errors": {}}"#),
        ]);
        let schema = parse(&corpus, &ParseOptions::new()).unwrap();
        assert_eq!(schema.categories.len(), 2);
        assert!(schema.categories["groups"].methods.is_empty());
        assert_eq!(schema.categories["users"].methods["users.get"].name, "get");
    }

    #[test]
    fn decode_error_names_the_document() {
        let corpus = corpus(&[("users/methods.json", r#"{"methods": [{"type": "object"}]}"#)]);
        let err = parse(&corpus, &ParseOptions::new()).unwrap_err();
        assert!(
            matches!(err, ParseError::Decode { ref document, .. } if document == "users/methods.json")
        );
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn unresolved_reference_aborts_the_run() {
        let corpus = corpus(&[(
            "users/methods.json",
            r##"{"methods": [{"name": "users.get", "responses": {"response": {"$ref": "objects.json#/definitions/x"}}}]}"##,
        )]);
        let err = parse(&corpus, &ParseOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Resolve(ResolveError::ReferenceNotFound { .. })
        ));
    }

    #[test]
    fn missing_error_catalog_is_tolerated() {
        let corpus = corpus(&[("users/methods.json", r#"{"methods": []}"#)]);
        let schema = parse(&corpus, &ParseOptions::new()).unwrap();
        assert!(schema.errors.is_empty());
    }

    #[test]
    fn custom_catalog_file_names() {
        let corpus = corpus(&[
            ("users/api.json", r#"{"methods": [{"name": "users.get"}]}"#),
            ("codes.json", r#"{"errors": [{"name": "E", "code": 5}]}"#),
        ]);
        let options = ParseOptions::new()
            .methods_file("api.json")
            .errors_file("codes.json");
        let schema = parse(&corpus, &options).unwrap();
        assert_eq!(schema.method_count(), 1);
        assert_eq!(schema.errors["E"].code, Some(5));
    }

    #[test]
    fn duplicate_method_across_catalogs_is_fatal() {
        let corpus = corpus(&[
            ("users/methods.json", r#"{"methods": [{"name": "users.get", "description": "one"}]}"#),
            (
                "users/extra/methods.json",
                r#"{"methods": [{"name": "users.get", "description": "two"}]}"#,
            ),
        ]);
        let err = parse(&corpus, &ParseOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Project {
                ref document,
                source: ProjectError::DuplicateMethod { ref name },
            } if document == "users/methods.json" && name == "users.get"
        ));
    }

    #[test]
    fn duplicate_error_name_is_fatal() {
        let corpus = corpus(&[(
            "errors.json",
            r#"{"errors": [{"name": "E", "code": 1}, {"name": "E", "code": 2}]}"#,
        )]);
        let err = parse(&corpus, &ParseOptions::new()).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Project {
                source: ProjectError::DuplicateError { .. },
                ..
            }
        ));
        assert_eq!(err.exit_code(), 2);
    }

    #[test]
    fn resolve_corpus_returns_every_document() {
        let corpus = corpus(&[
            ("a.json", r##"{"properties": {"b": {"$ref": "b.json#/definitions/b"}}}"##),
            ("b.json", r#"{"definitions": {"b": {"type": "string"}}}"#),
        ]);
        let resolved = resolve_corpus(&corpus, SchemaRegistry::new()).unwrap();
        assert_eq!(resolved.len(), 2);
        assert!(resolved.values().all(|node| !node.has_references()));
    }
}
