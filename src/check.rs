//! Corpus checking - static analysis of schema documents.
//!
//! Checks every document of a corpus for:
//! - JSON syntax and keyword shape errors
//! - Unresolvable or malformed `$ref` targets
//! - Duplicate sibling properties after references are inlined
//! - `enum` / `enumNames` length mismatches
//! - Method names without a category prefix

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use indexmap::IndexMap;
use rayon::prelude::*;
use serde::Serialize;
use tracing::debug;
use url::Url;

use crate::error::{LoadError, ProjectError};
use crate::keyword::{Collector, Keyword};
use crate::loader::{Corpus, Document};
use crate::registry::{without_fragment, SchemaRegistry};
use crate::resolver::{decode_fragment, target_uri, Resolver};
use crate::schema::{SchemaNode, SchemaRef};
use crate::types::ParseOptions;

/// Severity level for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Error,
    Warning,
}

/// A single diagnostic message from checking.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: String,
    pub file: String,
    /// JSON Pointer to the issue (e.g., "/definitions/user/properties/id")
    pub path: String,
    pub message: String,
}

/// Result of checking a single document.
#[derive(Debug, Clone, Serialize)]
pub struct FileResult {
    pub file: String,
    pub status: FileStatus,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<Diagnostic>,
}

/// Status of a checked document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    Ok,
    Error,
    Warning,
}

/// Result of checking a corpus.
#[derive(Debug, Clone, Serialize)]
pub struct CheckResult {
    pub base_uri: String,
    pub files_checked: usize,
    pub passed: usize,
    pub failed: usize,
    pub errors: usize,
    pub warnings: usize,
    pub results: Vec<FileResult>,
}

impl CheckResult {
    /// Returns true if no document has errors.
    pub fn is_ok(&self) -> bool {
        self.errors == 0
    }

    /// Returns the exit code: 0 when passed, 1 otherwise.
    ///
    /// With `strict`, warnings fail the check too.
    pub fn exit_code(&self, strict: bool) -> i32 {
        if self.is_ok() && (!strict || self.warnings == 0) {
            0
        } else {
            1
        }
    }
}

/// Check the corpus at `path` (a directory or a single file).
///
/// # Errors
///
/// Returns `LoadError` if the corpus can't be loaded. Problems inside
/// documents are reported as diagnostics, not errors.
pub fn check(
    path: &Path,
    options: &ParseOptions,
    registry: SchemaRegistry,
    strict: bool,
) -> Result<CheckResult, LoadError> {
    let corpus = Corpus::from_dir(path, options)?;
    Ok(check_corpus(&corpus, options, registry, strict))
}

/// Check every document of a loaded corpus.
///
/// If `strict` is true, documents with only warnings count as failed.
pub fn check_corpus(
    corpus: &Corpus,
    options: &ParseOptions,
    mut registry: SchemaRegistry,
    strict: bool,
) -> CheckResult {
    let decoded: Vec<Result<SchemaNode, String>> = corpus
        .documents()
        .par_iter()
        .map(|document| SchemaNode::from_slice(&document.content).map_err(|e| e.to_string()))
        .collect();

    let mut results: IndexMap<&str, Vec<Diagnostic>> = IndexMap::new();
    let mut raw: Vec<(&Document, SchemaRef)> = Vec::new();
    for (document, node) in corpus.documents().iter().zip(decoded) {
        let diagnostics = results.entry(document.name.as_str()).or_default();
        match node {
            Ok(node) => raw.push((document, registry.register_document(&document.uri, node))),
            Err(message) => diagnostics.push(Diagnostic {
                severity: Severity::Error,
                code: "E001".to_string(),
                file: document.name.clone(),
                path: "/".to_string(),
                message: format!("decode error: {}", message),
            }),
        }
    }

    let mut resolver = Resolver::new(registry);
    for (document, node) in raw {
        let mut diagnostics = Vec::new();
        check_document(&mut resolver, document, &node, options, &mut diagnostics);
        results.entry(document.name.as_str()).or_default().extend(diagnostics);
    }

    let results: Vec<FileResult> = results
        .into_iter()
        .map(|(file, diagnostics)| FileResult {
            file: file.to_string(),
            status: status_of(&diagnostics),
            diagnostics,
        })
        .collect();

    let errors = count(&results, Severity::Error);
    let warnings = count(&results, Severity::Warning);
    let failed = results
        .iter()
        .filter(|r| {
            if strict {
                r.status != FileStatus::Ok
            } else {
                r.status == FileStatus::Error
            }
        })
        .count();

    debug!(
        files = results.len(),
        errors = errors,
        warnings = warnings,
        "checked corpus"
    );
    CheckResult {
        base_uri: corpus.base_uri().to_string(),
        files_checked: results.len(),
        passed: results.len() - failed,
        failed,
        errors,
        warnings,
        results,
    }
}

fn check_document(
    resolver: &mut Resolver,
    document: &Document,
    raw: &SchemaRef,
    options: &ParseOptions,
    diagnostics: &mut Vec<Diagnostic>,
) {
    let error = |code: &str, path: &str, message: String| Diagnostic {
        severity: Severity::Error,
        code: code.to_string(),
        file: document.name.clone(),
        path: pointer_or_root(path),
        message,
    };

    // References are checked one by one on the raw tree so each gets a path.
    let mut broken = false;
    walk(raw, "", &mut HashSet::new(), &mut |node: &SchemaNode, path: &str| {
        for reference in node.references() {
            if let Err(message) = check_reference(resolver, reference, &document.uri) {
                broken = true;
                diagnostics.push(error("E002", path, message));
            }
        }
    });
    if broken {
        return;
    }

    let resolved = match resolver.resolve_document(&document.uri) {
        Ok(resolved) => resolved,
        Err(e) => {
            diagnostics.push(error("E002", "", e.to_string()));
            return;
        }
    };

    let is_catalog = document.file_name() == options.methods_file;
    walk(&resolved, "", &mut HashSet::new(), &mut |node: &SchemaNode, path: &str| {
        for names in duplicate_properties(node) {
            let message = ProjectError::DuplicateProperty { names }.to_string();
            diagnostics.push(error("E003", path, message));
        }

        if let Some((values, names)) = enum_lengths(node) {
            diagnostics.push(Diagnostic {
                severity: Severity::Warning,
                code: "W001".to_string(),
                file: document.name.clone(),
                path: pointer_or_root(path),
                message: format!(
                    "enum has {} values but enumNames has {} names; both are ignored",
                    values, names
                ),
            });
        }

        if is_catalog && path.is_empty() {
            for name in undotted_methods(node) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Warning,
                    code: "W002".to_string(),
                    file: document.name.clone(),
                    path: format!("/methods/{}", escape(name)),
                    message: format!("method name \"{}\" has no category prefix", name),
                });
            }
        }
    });
}

/// Check that a single reference points at something that exists.
fn check_reference(resolver: &mut Resolver, reference: &str, current: &Url) -> Result<(), String> {
    let target = target_uri(reference, current).map_err(|e| e.to_string())?;
    let fragment = decode_fragment(&target).map_err(|e| e.to_string())?;
    resolver
        .registry_mut()
        .lookup(&without_fragment(&target), &fragment)
        .map(|_| ())
        .map_err(|e| e.to_string())
}

/// Visit every node of a tree once, depth-first, with its JSON Pointer.
fn walk(
    node: &SchemaRef,
    path: &str,
    visited: &mut HashSet<*const SchemaNode>,
    visit: &mut dyn FnMut(&SchemaNode, &str),
) {
    if !visited.insert(Arc::as_ptr(node)) {
        return;
    }
    visit(node, path);
    for keyword in node.keywords() {
        let prefix = format!("{}/{}", path, keyword.name());
        match keyword.collector() {
            Some(Collector::Keyed(map, _)) => {
                for (key, child) in map {
                    walk(child, &format!("{}/{}", prefix, escape(key)), visited, visit);
                }
            }
            Some(Collector::Ordered(list, _)) => {
                for (i, child) in list.iter().enumerate() {
                    walk(child, &format!("{}/{}", prefix, i), visited, visit);
                }
            }
            Some(Collector::Single(child, _)) => walk(child, &prefix, visited, visit),
            None => {}
        }
    }
}

/// Names shared by sibling properties, one list per collector kind.
fn duplicate_properties(node: &SchemaNode) -> Vec<Vec<String>> {
    let mut found = Vec::new();
    for pattern in [false, true] {
        let mut seen: HashSet<&str> = HashSet::new();
        let mut duplicates: Vec<String> = Vec::new();
        for keyword in node.keywords() {
            let map = match keyword {
                Keyword::Properties(map) if !pattern => map,
                Keyword::PatternProperties(map) if pattern => map,
                _ => continue,
            };
            for key in map.keys() {
                if !seen.insert(key) && !duplicates.contains(key) {
                    duplicates.push(key.clone());
                }
            }
        }
        if !duplicates.is_empty() {
            found.push(duplicates);
        }
    }
    found
}

fn enum_lengths(node: &SchemaNode) -> Option<(usize, usize)> {
    let values = node.find_map(|k| match k {
        Keyword::Enum(values) => Some(values.len()),
        _ => None,
    })?;
    let names = node.find_map(|k| match k {
        Keyword::EnumNames(names) => Some(names.len()),
        _ => None,
    })?;
    (values != names).then_some((values, names))
}

fn undotted_methods(node: &SchemaNode) -> Vec<&str> {
    node.filter_map(|k| match k {
        Keyword::Methods(map) => Some(map),
        _ => None,
    })
    .flat_map(|map| map.keys())
    .filter(|name| !name.contains('.'))
    .map(String::as_str)
    .collect()
}

fn status_of(diagnostics: &[Diagnostic]) -> FileStatus {
    if diagnostics.iter().any(|d| d.severity == Severity::Error) {
        FileStatus::Error
    } else if diagnostics.iter().any(|d| d.severity == Severity::Warning) {
        FileStatus::Warning
    } else {
        FileStatus::Ok
    }
}

fn count(results: &[FileResult], severity: Severity) -> usize {
    results
        .iter()
        .flat_map(|r| &r.diagnostics)
        .filter(|d| d.severity == severity)
        .count()
}

fn escape(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

fn pointer_or_root(path: &str) -> String {
    if path.is_empty() {
        "/".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn corpus(documents: &[(&str, &str)]) -> Corpus {
        let mut corpus = Corpus::new(Url::parse("file:///schema/").unwrap());
        for (name, content) in documents {
            corpus.insert(name, content.as_bytes()).unwrap();
        }
        corpus
    }

    fn run(documents: &[(&str, &str)], strict: bool) -> CheckResult {
        check_corpus(
            &corpus(documents),
            &ParseOptions::new(),
            SchemaRegistry::new(),
            strict,
        )
    }

    fn codes(result: &CheckResult) -> Vec<&str> {
        result
            .results
            .iter()
            .flat_map(|r| &r.diagnostics)
            .map(|d| d.code.as_str())
            .collect()
    }

    #[test]
    fn clean_corpus_passes() {
        let result = run(
            &[
                ("users/methods.json", r##"{"methods": [{"name": "users.get", "responses": {"response": {"$ref": "objects.json#/definitions/user"}}}]}"##),
                ("users/objects.json", r#"{"definitions": {"user": {"type": "object"}}}"#),
            ],
            false,
        );
        assert!(result.is_ok());
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 2);
        assert_eq!(result.exit_code(false), 0);
    }

    #[test]
    fn decode_errors() {
        let result = run(&[("a.json", "{ not json }"), ("b.json", r#"{"type": 5}"#)], false);
        assert_eq!(codes(&result), vec!["E001", "E001"]);
        assert_eq!(result.failed, 2);
        assert_eq!(result.exit_code(false), 1);
    }

    #[test]
    fn broken_references_have_paths() {
        let result = run(
            &[(
                "a.json",
                r##"{"definitions": {"x": {"type": "string"}}, "properties": {"ok": {"$ref": "#/definitions/x"}, "bad": {"$ref": "#/definitions/missing"}, "far": {"$ref": "other.json"}}}"##,
            )],
            false,
        );
        let diagnostics = &result.results[0].diagnostics;
        assert_eq!(diagnostics.len(), 2);
        assert!(diagnostics.iter().all(|d| d.code == "E002"));
        assert_eq!(diagnostics[0].path, "/properties/bad");
        assert_eq!(diagnostics[1].path, "/properties/far");
    }

    #[test]
    fn duplicate_properties_after_merge() {
        let result = run(
            &[(
                "a.json",
                r##"{"definitions": {"base": {"properties": {"id": {"type": "integer"}}}, "user": {"$ref": "#/definitions/base", "properties": {"id": {"type": "string"}}}}}"##,
            )],
            false,
        );
        let diagnostics = &result.results[0].diagnostics;
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, "E003");
        assert_eq!(diagnostics[0].path, "/definitions/user");
        assert_eq!(diagnostics[0].message, "duplicate properties id");
    }

    #[test]
    fn warnings_fail_only_in_strict_mode() {
        let documents = [
            ("a.json", r#"{"enum": [1, 2, 3], "enumNames": ["one", "two"]}"#),
            ("misc/methods.json", r#"{"methods": [{"name": "execute"}]}"#),
        ];
        let lenient = run(&documents, false);
        assert_eq!(codes(&lenient), vec!["W001", "W002"]);
        assert_eq!(lenient.results[0].status, FileStatus::Warning);
        assert_eq!(lenient.results[1].diagnostics[0].path, "/methods/execute");
        assert_eq!(lenient.exit_code(false), 0);

        let strict = run(&documents, true);
        assert_eq!(strict.failed, 2);
        assert_eq!(strict.exit_code(true), 1);
    }

    #[test]
    fn check_directory() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("valid.json"), r#"{"type": "object"}"#).unwrap();
        fs::write(dir.path().join("invalid.json"), "{ not json }").unwrap();

        let result = check(dir.path(), &ParseOptions::new(), SchemaRegistry::new(), false).unwrap();
        assert_eq!(result.files_checked, 2);
        assert_eq!(result.passed, 1);
        assert_eq!(result.failed, 1);
        assert_eq!(result.results[0].file, "invalid.json");
    }

    #[test]
    fn missing_path_is_a_load_error() {
        let result = check(
            Path::new("/nonexistent/schema"),
            &ParseOptions::new(),
            SchemaRegistry::new(),
            false,
        );
        assert!(matches!(result, Err(LoadError::NotFound { .. })));
    }
}
