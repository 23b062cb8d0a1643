//! Lookups from raw `type` / `format` strings to the model enumerations.

use crate::model::{ApiObjectType, ApiStringFormat};

/// Map a JSON-Schema type name to [`ApiObjectType`], case-insensitively.
///
/// `None` and unknown names map to [`ApiObjectType::Undefined`].
pub fn map_object_type(name: Option<&str>) -> ApiObjectType {
    let Some(name) = name else {
        return ApiObjectType::Undefined;
    };
    match name.to_ascii_lowercase().as_str() {
        "integer" => ApiObjectType::Integer,
        "string" => ApiObjectType::String,
        "number" => ApiObjectType::Number,
        "boolean" => ApiObjectType::Boolean,
        "array" => ApiObjectType::Array,
        "object" => ApiObjectType::Object,
        "multiple" => ApiObjectType::Multiple,
        _ => ApiObjectType::Undefined,
    }
}

/// Map a string `format` annotation to [`ApiStringFormat`].
///
/// Only `uri` is recognized; every other format carries no model meaning.
pub fn map_string_format(format: Option<&str>) -> Option<ApiStringFormat> {
    match format? {
        "uri" => Some(ApiStringFormat::Uri),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_types() {
        assert_eq!(map_object_type(Some("integer")), ApiObjectType::Integer);
        assert_eq!(map_object_type(Some("String")), ApiObjectType::String);
        assert_eq!(map_object_type(Some("BOOLEAN")), ApiObjectType::Boolean);
        assert_eq!(map_object_type(Some("multiple")), ApiObjectType::Multiple);
        assert_eq!(map_object_type(Some("null")), ApiObjectType::Undefined);
        assert_eq!(map_object_type(None), ApiObjectType::Undefined);
    }

    #[test]
    fn string_formats() {
        assert_eq!(map_string_format(Some("uri")), Some(ApiStringFormat::Uri));
        assert_eq!(map_string_format(Some("date-time")), None);
        assert_eq!(map_string_format(None), None);
    }
}
