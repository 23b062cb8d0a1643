//! Shared configuration and JSON helpers.

use serde_json::Value;
use url::Url;

/// Default name of the per-category method catalog.
pub const DEFAULT_METHODS_FILE: &str = "methods.json";

/// Default name of the error catalog.
pub const DEFAULT_ERRORS_FILE: &str = "errors.json";

/// JSON files that live next to the schemas but are not schemas.
pub const DEFAULT_EXCLUDED_FILES: &[&str] = &["composer.json", "package.json", "schema.json"];

/// Returns the JSON type name for error messages.
pub fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Options for a parse run.
#[derive(Debug, Clone)]
pub struct ParseOptions {
    /// Base URI the corpus is addressed under.
    /// Defaults to the `file://` URL of the corpus directory.
    pub base_uri: Option<Url>,
    /// File name of the method catalog inside each category directory.
    pub methods_file: String,
    /// File name of the error catalog.
    pub errors_file: String,
    /// File names skipped when collecting the corpus.
    pub excluded_files: Vec<String>,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            base_uri: None,
            methods_file: DEFAULT_METHODS_FILE.to_string(),
            errors_file: DEFAULT_ERRORS_FILE.to_string(),
            excluded_files: DEFAULT_EXCLUDED_FILES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ParseOptions {
    /// Create options with the default file conventions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Address the corpus under `base_uri` instead of its file location.
    pub fn base_uri(mut self, base_uri: Url) -> Self {
        self.base_uri = Some(base_uri);
        self
    }

    /// Set the method catalog file name.
    pub fn methods_file(mut self, name: impl Into<String>) -> Self {
        self.methods_file = name.into();
        self
    }

    /// Set the error catalog file name.
    pub fn errors_file(mut self, name: impl Into<String>) -> Self {
        self.errors_file = name.into();
        self
    }

    /// Skip an additional file name when collecting the corpus.
    pub fn exclude(mut self, name: impl Into<String>) -> Self {
        self.excluded_files.push(name.into());
        self
    }

    /// Whether a file name is excluded from the corpus.
    pub fn is_excluded(&self, file_name: &str) -> bool {
        self.excluded_files.iter().any(|f| f == file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn json_type_names() {
        assert_eq!(json_type_name(&json!(null)), "null");
        assert_eq!(json_type_name(&json!(1)), "number");
        assert_eq!(json_type_name(&json!([])), "array");
        assert_eq!(json_type_name(&json!({})), "object");
    }

    #[test]
    fn default_options() {
        let opts = ParseOptions::new();
        assert_eq!(opts.methods_file, "methods.json");
        assert_eq!(opts.errors_file, "errors.json");
        assert!(opts.is_excluded("package.json"));
        assert!(!opts.is_excluded("objects.json"));
    }

    #[test]
    fn builder_overrides() {
        let base = Url::parse("https://example.com/schema/").unwrap();
        let opts = ParseOptions::new()
            .base_uri(base.clone())
            .methods_file("api.json")
            .exclude("draft.json");
        assert_eq!(opts.base_uri, Some(base));
        assert_eq!(opts.methods_file, "api.json");
        assert!(opts.is_excluded("draft.json"));
    }
}
