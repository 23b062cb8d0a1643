//! Output model: the typed API surface projected from resolved schemas.
//!
//! Everything here is built once by the projector and read by downstream
//! consumers. All types serialize to JSON for the `parse` subcommand.

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Number;

use crate::keyword::AccessTokenType;

/// The whole API surface of a corpus.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiSchema {
    pub categories: IndexMap<String, ApiCategory>,
    pub errors: IndexMap<String, ApiError>,
}

impl ApiSchema {
    /// Total number of methods across all categories.
    pub fn method_count(&self) -> usize {
        self.categories.values().map(|c| c.methods.len()).sum()
    }

    /// Look up a method by its dotted full name.
    pub fn method(&self, full_name: &str) -> Option<&ApiMethod> {
        self.categories
            .values()
            .find_map(|category| category.methods.get(full_name))
    }
}

/// Methods of one category, keyed by full name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiCategory {
    pub methods: IndexMap<String, ApiMethod>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiMethod {
    /// Dotted name, e.g. `messages.send`.
    pub full_name: String,
    /// Part of the full name before the first `.`; empty when there is none.
    pub category: String,
    /// Part of the full name after the first `.`.
    pub name: String,
    pub description: Option<String>,
    pub errors: Vec<ApiError>,
    pub access_token_types: Vec<AccessTokenType>,
    pub parameters: Vec<ApiObject>,
    pub responses: Vec<ApiObject>,
}

/// A projected object shape: a parameter, a response, or a nested property.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiObject {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub object_type: ApiObjectType,
    pub format: Option<ApiStringFormat>,
    pub description: Option<String>,
    pub properties: Vec<ApiObject>,
    pub pattern_properties: Vec<ApiObject>,
    /// Enum values rendered as strings. Same length as `enum_names` when
    /// that is non-empty.
    #[serde(rename = "enum")]
    pub enum_values: Vec<String>,
    pub enum_names: Vec<String>,
    pub items: Option<Box<ApiObject>>,
    pub min_properties: Option<u64>,
    pub max_properties: Option<u64>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub max_items: Option<u64>,
    pub minimum: Option<Number>,
    pub maximum: Option<Number>,
    pub default: Option<String>,
    pub additional_properties: bool,
    pub is_required: bool,
    pub with_setters: bool,
    pub without_refs: bool,
    pub all_of: Vec<ApiObject>,
    pub one_of: Vec<ApiObject>,
}

impl ApiObject {
    /// Enum values paired with their names by position.
    ///
    /// Names are `None` when the schema declares no `enumNames`.
    pub fn enum_entries(&self) -> impl Iterator<Item = (&str, Option<&str>)> + '_ {
        self.enum_values.iter().enumerate().map(|(i, value)| {
            (
                value.as_str(),
                self.enum_names.get(i).map(String::as_str),
            )
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ApiError {
    pub name: String,
    pub code: Option<i64>,
    pub description: Option<String>,
    pub subcodes: Vec<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiObjectType {
    Integer,
    String,
    Number,
    Boolean,
    Array,
    Object,
    Multiple,
    #[default]
    Undefined,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStringFormat {
    Uri,
}
