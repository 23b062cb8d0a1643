//! VK API Schema Parser
//!
//! Parses a corpus of JSON Schema documents extended with API keywords
//! (`methods`, `parameters`, `responses`, `errors`, ...) into a typed model
//! of the API surface.
//!
//! A parse run has three phases:
//!
//! 1. **Decode** every document into [`SchemaNode`]s built from typed [`Keyword`]s.
//! 2. **Resolve** every `$ref` with one [`Resolver`], which shares expanded
//!    targets between referencing nodes and terminates on reference cycles.
//! 3. **Project** method catalogs and the error catalog into [`ApiSchema`].
//!
//! # Example
//!
//! ```
//! use vkapi_schema::{parse, ApiObjectType, Corpus, ParseOptions};
//! use url::Url;
//!
//! let mut corpus = Corpus::new(Url::parse("file:///schema/").unwrap());
//! corpus
//!     .insert(
//!         "messages/methods.json",
//!         r#"{
//!             "methods": [{
//!                 "name": "messages.send",
//!                 "parameters": [{ "name": "peer_id", "type": "integer" }],
//!                 "responses": {
//!                     "response": { "$ref": "responses.json#/definitions/ok" }
//!                 }
//!             }]
//!         }"#,
//!     )
//!     .unwrap();
//! corpus
//!     .insert(
//!         "messages/responses.json",
//!         r#"{ "definitions": { "ok": { "type": "integer" } } }"#,
//!     )
//!     .unwrap();
//!
//! let schema = parse(&corpus, &ParseOptions::new()).unwrap();
//! let send = schema.method("messages.send").unwrap();
//! assert_eq!(send.category, "messages");
//! assert_eq!(send.parameters[0].object_type, ApiObjectType::Integer);
//! assert_eq!(send.responses[0].object_type, ApiObjectType::Integer);
//! ```
//!
//! # Corpus Layout
//!
//! | Path | Meaning |
//! |------|---------|
//! | `<category>/methods.json` | Method catalog of a category |
//! | `<category>/*.json` | Objects and responses referenced by the catalog |
//! | `errors.json` | Error catalog |
//! | `package.json`, `composer.json`, `schema.json` | Ignored |
//!
//! File names are configurable through [`ParseOptions`].

mod check;
mod error;
mod keyword;
mod loader;
mod mapper;
mod model;
mod parse;
mod projector;
mod registry;
mod resolver;
mod schema;
mod types;

pub use check::{
    check, check_corpus, CheckResult, Diagnostic, FileResult, FileStatus, Severity,
};
pub use error::{DecodeError, EncodeError, LoadError, ParseError, ProjectError, ResolveError};
pub use keyword::{AccessTokenType, Collector, Keyword, Required, SchemaMap, Unordered};
pub use loader::{is_url, read_file, Corpus, Document, DocumentFetcher};
pub use mapper::{map_object_type, map_string_format};
pub use model::{
    ApiCategory, ApiError, ApiMethod, ApiObject, ApiObjectType, ApiSchema, ApiStringFormat,
};
pub use parse::{parse, parse_with_registry, resolve_corpus};
pub use projector::{project_error, project_errors, project_method, project_methods, project_object};
pub use registry::{without_fragment, Fetch, SchemaRegistry};
pub use resolver::{target_uri, Resolver};
pub use schema::{SchemaNode, SchemaRef};
pub use types::{
    ParseOptions, DEFAULT_ERRORS_FILE, DEFAULT_EXCLUDED_FILES, DEFAULT_METHODS_FILE,
};

#[cfg(feature = "remote")]
pub use loader::fetch_url;
