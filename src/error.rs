//! Error types for schema decoding, resolution and projection.

use std::path::PathBuf;
use thiserror::Error;

/// Errors while decoding raw JSON into schema keywords.
///
/// Decoding is the only place malformed input is reported.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("invalid JSON: {source}")]
    InvalidJson {
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid `{keyword}`: expected {expected}, got {actual}")]
    UnexpectedShape {
        keyword: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("invalid `{keyword}`: entry {index} has no string `name` member")]
    MissingName { keyword: String, index: usize },

    #[error("invalid `{keyword}`: duplicate entry \"{key}\"")]
    DuplicateKey { keyword: String, key: String },

    #[error("invalid `{keyword}`: {message}")]
    InvalidValue { keyword: String, message: String },
}

/// Errors during reference resolution.
///
/// All of them abort the resolution of the enclosing document.
#[derive(Debug, Error)]
pub enum ResolveError {
    /// The referenced document could not be fetched, or the fragment
    /// does not exist inside it.
    #[error("reference not found: {reference}")]
    ReferenceNotFound { reference: String },

    #[error("malformed reference \"{reference}\": {message}")]
    MalformedReference { reference: String, message: String },

    #[error("cannot decode {uri}: {source}")]
    Decode {
        uri: String,
        #[source]
        source: DecodeError,
    },
}

/// Errors while projecting a resolved schema into the API model.
#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("duplicate properties {}", names.join(", "))]
    DuplicateProperty { names: Vec<String> },

    #[error("duplicate error \"{name}\"")]
    DuplicateError { name: String },

    #[error("duplicate method \"{name}\"")]
    DuplicateMethod { name: String },
}

/// Errors while encoding a schema node back to JSON.
///
/// Only merged nodes (a `$ref` extended with sibling keywords) can fail: two
/// keyed collectors that define the same member differently have no single
/// JSON form.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot encode `{keyword}`: conflicting definitions of \"{key}\"")]
    ConflictingKey { keyword: String, key: String },
}

/// Errors while loading a corpus of raw documents.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("file not found: {path}")]
    NotFound { path: PathBuf },

    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid base URI \"{uri}\"")]
    InvalidBaseUri { uri: String },

    #[cfg(feature = "remote")]
    #[error("failed to fetch {url}: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Errors from a complete parse run.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("cannot decode {document}: {source}")]
    Decode {
        document: String,
        #[source]
        source: DecodeError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("cannot project {document}: {source}")]
    Project {
        document: String,
        #[source]
        source: ProjectError,
    },
}

impl LoadError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            LoadError::InvalidBaseUri { .. } => 2,
            _ => 3,
        }
    }
}

impl ParseError {
    /// Returns the exit code for this error type.
    pub fn exit_code(&self) -> i32 {
        match self {
            ParseError::Load(e) => e.exit_code(),
            _ => 2,
        }
    }
}
