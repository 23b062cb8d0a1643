//! Corpus loading from files, directories, and HTTP URLs.
//!
//! A [`Corpus`] is the set of raw documents one parse run works on, each
//! addressed by a URI under a common base. Loading only reads bytes;
//! decoding happens in the parse run.

use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use url::Url;

use crate::error::LoadError;
use crate::registry::Fetch;
use crate::types::ParseOptions;

#[cfg(feature = "remote")]
use std::time::Duration;

/// Default timeout for HTTP requests (10 seconds).
#[cfg(feature = "remote")]
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// One raw document of a corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Path relative to the corpus root, `/`-separated (e.g. `users/methods.json`).
    pub name: String,
    pub uri: Url,
    pub content: Vec<u8>,
}

impl Document {
    /// Category directory this document lives in, if any.
    pub fn category(&self) -> Option<&str> {
        self.name.split_once('/').map(|(dir, _)| dir)
    }

    /// File name without its directory.
    pub fn file_name(&self) -> &str {
        self.name.rsplit('/').next().unwrap_or(&self.name)
    }
}

/// Raw documents addressed under a common base URI, sorted by name.
#[derive(Debug, Clone)]
pub struct Corpus {
    base_uri: Url,
    documents: Vec<Document>,
}

impl Corpus {
    /// Create an empty corpus rooted at `base_uri`.
    ///
    /// The base is treated as a directory even without a trailing slash.
    pub fn new(base_uri: Url) -> Self {
        Self {
            base_uri: directory_uri(base_uri),
            documents: Vec::new(),
        }
    }

    /// Load every `.json` file under `path`.
    ///
    /// Files named in `options.excluded_files` are skipped. If `path` is a
    /// single file, the corpus holds just that file.
    ///
    /// # Errors
    ///
    /// Returns `LoadError::NotFound` if `path` doesn't exist,
    /// `LoadError::Read` if a file can't be read, or
    /// `LoadError::InvalidBaseUri` if no base URI can be derived.
    pub fn from_dir(path: &Path, options: &ParseOptions) -> Result<Self, LoadError> {
        if !path.exists() {
            return Err(LoadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let canonical = path.canonicalize().map_err(|source| LoadError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let root = if canonical.is_file() {
            canonical
                .parent()
                .map(Path::to_path_buf)
                .unwrap_or_else(|| canonical.clone())
        } else {
            canonical.clone()
        };

        let base_uri = match &options.base_uri {
            Some(uri) => uri.clone(),
            None => Url::from_directory_path(&root).map_err(|()| LoadError::InvalidBaseUri {
                uri: root.display().to_string(),
            })?,
        };
        let mut corpus = Corpus::new(base_uri);

        let mut files = Vec::new();
        if canonical.is_file() {
            files.push(canonical.clone());
        } else {
            collect_files_recursive(&root, &mut files)?;
        }

        for file in files {
            let Some(file_name) = file.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if options.is_excluded(file_name) {
                debug!(file = %file.display(), "skipping excluded file");
                continue;
            }
            let name = relative_name(&root, &file);
            let content = read_file(&file)?;
            corpus.insert(&name, content)?;
        }

        debug!(
            base = %corpus.base_uri,
            documents = corpus.documents.len(),
            "loaded corpus"
        );
        Ok(corpus)
    }

    /// Add or replace the document at `name`, relative to the base URI.
    pub fn insert(&mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<(), LoadError> {
        let uri = self
            .base_uri
            .join(name)
            .map_err(|_| LoadError::InvalidBaseUri {
                uri: format!("{}{}", self.base_uri, name),
            })?;
        let document = Document {
            name: name.to_string(),
            uri,
            content: content.into(),
        };
        match self
            .documents
            .binary_search_by(|d| d.name.as_str().cmp(name))
        {
            Ok(i) => self.documents[i] = document,
            Err(i) => self.documents.insert(i, document),
        }
        Ok(())
    }

    /// Builder form of [`Corpus::insert`].
    pub fn with_document(mut self, name: &str, content: impl Into<Vec<u8>>) -> Result<Self, LoadError> {
        self.insert(name, content)?;
        Ok(self)
    }

    pub fn base_uri(&self) -> &Url {
        &self.base_uri
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn get(&self, name: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.name == name)
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

/// Read a file into memory.
///
/// # Errors
///
/// Returns `LoadError::NotFound` if the file doesn't exist,
/// or `LoadError::Read` if it can't be read.
pub fn read_file(path: &Path) -> Result<Vec<u8>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            path: path.to_path_buf(),
        });
    }
    std::fs::read(path).map_err(|source| LoadError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Check if a string looks like a URL (starts with http:// or https://).
pub fn is_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

/// Fetch a document over HTTP/HTTPS.
///
/// Requires the `remote` feature (enabled by default).
///
/// # Errors
///
/// Returns `LoadError::Network` if the request fails or the server
/// answers with a non-success status.
#[cfg(feature = "remote")]
pub fn fetch_url(url: &Url) -> Result<Vec<u8>, LoadError> {
    let network = |source| LoadError::Network {
        url: url.to_string(),
        source,
    };
    let client = reqwest::blocking::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(network)?;

    let response = client
        .get(url.as_str())
        .send()
        .map_err(network)?
        .error_for_status()
        .map_err(network)?;

    response
        .bytes()
        .map(|bytes| bytes.to_vec())
        .map_err(network)
}

/// Fetches documents that are not part of the corpus.
///
/// `file://` URIs are read from disk. `http(s)://` URIs are fetched only
/// when remote fetching is enabled and the `remote` feature is compiled in.
/// Every failure is a fetch miss.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentFetcher {
    remote: bool,
}

impl DocumentFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allow fetching over HTTP.
    pub fn remote(mut self, enabled: bool) -> Self {
        self.remote = enabled;
        self
    }
}

impl Fetch for DocumentFetcher {
    fn fetch(&self, uri: &Url) -> Option<Vec<u8>> {
        match uri.scheme() {
            "file" => {
                let path = uri.to_file_path().ok()?;
                std::fs::read(&path)
                    .map_err(|e| debug!(path = %path.display(), error = %e, "cannot read"))
                    .ok()
            }
            "http" | "https" if self.remote => fetch_remote(uri),
            _ => None,
        }
    }
}

#[cfg(feature = "remote")]
fn fetch_remote(uri: &Url) -> Option<Vec<u8>> {
    fetch_url(uri)
        .map_err(|e| warn!(error = %e, "remote fetch failed"))
        .ok()
}

#[cfg(not(feature = "remote"))]
fn fetch_remote(uri: &Url) -> Option<Vec<u8>> {
    warn!(uri = %uri, "remote fetching requires the `remote` feature");
    None
}

/// `uri` with a trailing slash so relative names join beneath it.
fn directory_uri(mut uri: Url) -> Url {
    if !uri.path().ends_with('/') {
        let path = format!("{}/", uri.path());
        uri.set_path(&path);
    }
    uri.set_fragment(None);
    uri
}

fn relative_name(root: &Path, file: &Path) -> String {
    let relative = file.strip_prefix(root).unwrap_or(file);
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_files_recursive(dir: &Path, files: &mut Vec<PathBuf>) -> Result<(), LoadError> {
    let entries = std::fs::read_dir(dir).map_err(|source| LoadError::Read {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut paths: Vec<PathBuf> = entries.flatten().map(|entry| entry.path()).collect();
    paths.sort();
    for path in paths {
        if path.is_dir() {
            collect_files_recursive(&path, files)?;
        } else if path.extension().map(|e| e == "json").unwrap_or(false) {
            files.push(path);
        }
    }
    Ok(())
}
