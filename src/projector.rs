//! Projection of resolved schemas into the API model.
//!
//! Projection reads keywords and never fails on a well-formed resolved node,
//! with one exception: two sibling properties sharing a name.

use indexmap::IndexMap;
use serde_json::Value;

use crate::error::ProjectError;
use crate::keyword::{Keyword, Required};
use crate::mapper::{map_object_type, map_string_format};
use crate::model::{ApiError, ApiMethod, ApiObject, ApiObjectType};
use crate::schema::{SchemaNode, SchemaRef};

/// Project every entry of the `methods` keywords on a method catalog.
///
/// Methods are keyed by full name.
pub fn project_methods(node: &SchemaNode) -> Result<IndexMap<String, ApiMethod>, ProjectError> {
    let mut methods = IndexMap::new();
    for keyword in node.keywords() {
        let Keyword::Methods(entries) = keyword else {
            continue;
        };
        for (full_name, schema) in entries {
            let method = project_method(full_name, schema)?;
            methods.insert(method.full_name.clone(), method);
        }
    }
    Ok(methods)
}

/// Project a single method schema named `full_name` (`category.method`).
pub fn project_method(full_name: &str, node: &SchemaNode) -> Result<ApiMethod, ProjectError> {
    let (category, name) = full_name.split_once('.').unwrap_or(("", full_name));

    let mut parameters = Vec::new();
    let mut responses = Vec::new();
    let mut errors = Vec::new();
    let mut access_token_types = Vec::new();
    for keyword in node.keywords() {
        match keyword {
            Keyword::Parameters(map) => {
                for (key, schema) in map {
                    parameters.push(project_object(schema, Some(key))?);
                }
            }
            Keyword::Responses(map) => {
                for (key, schema) in map {
                    responses.push(project_object(schema, Some(key))?);
                }
            }
            Keyword::Errors(map) => {
                errors.extend(map.iter().map(|(key, schema)| project_error(key, schema)));
            }
            Keyword::AccessTokenTypes(types) => access_token_types.extend(types.iter().copied()),
            _ => {}
        }
    }

    Ok(ApiMethod {
        full_name: full_name.to_string(),
        category: category.to_string(),
        name: name.to_string(),
        description: description(node),
        errors,
        access_token_types,
        parameters,
        responses,
    })
}

/// Project an object shape. `name` is the key it was found under, if any.
pub fn project_object(node: &SchemaNode, name: Option<&str>) -> Result<ApiObject, ProjectError> {
    let required = node.find_map(|k| match k {
        Keyword::Required(required) => Some(required),
        _ => None,
    });
    let required_names = required.map(Required::properties).unwrap_or(&[]);

    let (enum_values, enum_names) = enum_info(node);

    let items = node
        .find_map(|k| match k {
            Keyword::Items(items) => Some(items.first()),
            _ => None,
        })
        .flatten()
        .filter(|item| !item.is_empty())
        .map(|item| project_object(item, None).map(Box::new))
        .transpose()?;

    Ok(ApiObject {
        name: name.map(str::to_string),
        object_type: object_type(node),
        format: map_string_format(node.find_map(|k| match k {
            Keyword::Format(format) => Some(format.as_str()),
            _ => None,
        })),
        description: description(node),
        properties: project_properties(node, required_names, false)?,
        pattern_properties: project_properties(node, required_names, true)?,
        enum_values,
        enum_names,
        items,
        min_properties: node.find_map(|k| match k {
            Keyword::MinProperties(n) => Some(*n),
            _ => None,
        }),
        max_properties: node.find_map(|k| match k {
            Keyword::MaxProperties(n) => Some(*n),
            _ => None,
        }),
        min_length: node.find_map(|k| match k {
            Keyword::MinLength(n) => Some(*n),
            _ => None,
        }),
        max_length: node.find_map(|k| match k {
            Keyword::MaxLength(n) => Some(*n),
            _ => None,
        }),
        max_items: node.find_map(|k| match k {
            Keyword::MaxItems(n) => Some(*n),
            _ => None,
        }),
        minimum: node.find_map(|k| match k {
            Keyword::Minimum(n) => Some(n.clone()),
            _ => None,
        }),
        maximum: node.find_map(|k| match k {
            Keyword::Maximum(n) => Some(n.clone()),
            _ => None,
        }),
        default: node.find_map(|k| match k {
            Keyword::Default(value) => Some(scalar_string(value)),
            _ => None,
        }),
        additional_properties: node
            .find_map(|k| match k {
                Keyword::AdditionalProperties(schema) => {
                    Some(schema.as_bool() == Some(true) || !schema.is_empty())
                }
                _ => None,
            })
            .unwrap_or(false),
        is_required: required.map_or(false, Required::is_required),
        with_setters: node
            .find_map(|k| match k {
                Keyword::WithSetters(b) => Some(*b),
                _ => None,
            })
            .unwrap_or(false),
        without_refs: node
            .find_map(|k| match k {
                Keyword::WithoutRefs(b) => Some(*b),
                _ => None,
            })
            .unwrap_or(false),
        all_of: project_branches(node, |k| match k {
            Keyword::AllOf(branches) => Some(branches.as_slice()),
            _ => None,
        })?,
        one_of: project_branches(node, |k| match k {
            Keyword::OneOf(branches) => Some(branches.as_slice()),
            _ => None,
        })?,
    })
}

/// Project one error catalog entry found under `key`.
///
/// The entry's own `name` member takes precedence over the key.
pub fn project_error(key: &str, node: &SchemaNode) -> ApiError {
    let name = node
        .find_map(|k| match k {
            Keyword::Unrecognized {
                name,
                value: Value::String(value),
            } if name == "name" => Some(value.clone()),
            _ => None,
        })
        .unwrap_or_else(|| key.to_string());

    let subcodes = node
        .filter_map(|k| match k {
            Keyword::Subcodes(entries) => Some(entries),
            _ => None,
        })
        .flat_map(|entries| entries.values())
        .filter_map(|entry| {
            entry.find_map(|k| match k {
                Keyword::Subcode(code) => Some(*code),
                _ => None,
            })
        })
        .collect();

    ApiError {
        name,
        code: node.find_map(|k| match k {
            Keyword::Code(code) => Some(*code),
            _ => None,
        }),
        description: description(node),
        subcodes,
    }
}

/// Project the `errors` keywords of an error catalog, keyed by error name.
///
/// # Errors
///
/// Returns `ProjectError::DuplicateError` if two entries project to the
/// same name.
pub fn project_errors(node: &SchemaNode) -> Result<IndexMap<String, ApiError>, ProjectError> {
    let entries = node
        .filter_map(|k| match k {
            Keyword::Errors(entries) => Some(entries),
            _ => None,
        })
        .flat_map(|entries| entries.iter());

    let mut errors = IndexMap::new();
    for (key, schema) in entries {
        let error = project_error(key, schema);
        if errors.contains_key(&error.name) {
            return Err(ProjectError::DuplicateError { name: error.name });
        }
        errors.insert(error.name.clone(), error);
    }
    Ok(errors)
}

fn description(node: &SchemaNode) -> Option<String> {
    node.find_map(|k| match k {
        Keyword::Description(text) => Some(text.clone()),
        _ => None,
    })
}

fn object_type(node: &SchemaNode) -> ApiObjectType {
    let mut names: Vec<&str> = Vec::new();
    for types in node.filter_map(|k| match k {
        Keyword::Type(types) => Some(types),
        _ => None,
    }) {
        for name in types.iter() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
    }
    match names.as_slice() {
        [] if node.is_empty() => ApiObjectType::Undefined,
        [] => ApiObjectType::Object,
        [name] => map_object_type(Some(*name)),
        _ => ApiObjectType::Multiple,
    }
}

fn enum_info(node: &SchemaNode) -> (Vec<String>, Vec<String>) {
    let values: Vec<String> = node
        .find_map(|k| match k {
            Keyword::Enum(values) => Some(values),
            _ => None,
        })
        .map(|values| {
            values
                .iter()
                .filter(|v| !v.is_null())
                .map(scalar_string)
                .collect()
        })
        .unwrap_or_default();
    let names: Vec<String> = node
        .find_map(|k| match k {
            Keyword::EnumNames(names) => Some(names.to_vec()),
            _ => None,
        })
        .unwrap_or_default();

    if !names.is_empty() && names.len() != values.len() {
        return (Vec::new(), Vec::new());
    }
    (values, names)
}

fn project_properties(
    node: &SchemaNode,
    required_names: &[String],
    pattern: bool,
) -> Result<Vec<ApiObject>, ProjectError> {
    let mut properties = Vec::new();
    for keyword in node.keywords() {
        let map = match keyword {
            Keyword::Properties(map) if !pattern => map,
            Keyword::PatternProperties(map) if pattern => map,
            _ => continue,
        };
        for (key, schema) in map.iter().filter(|(_, schema)| !schema.is_empty()) {
            let mut property = project_object(schema, Some(key))?;
            if !required_names.is_empty() {
                property.is_required = required_names.contains(key);
            }
            properties.push(property);
        }
    }

    let mut duplicates: Vec<String> = Vec::new();
    for (i, property) in properties.iter().enumerate() {
        let seen_before = properties[..i].iter().any(|p| p.name == property.name);
        if let Some(name) = &property.name {
            if seen_before && !duplicates.contains(name) {
                duplicates.push(name.clone());
            }
        }
    }
    if !duplicates.is_empty() {
        return Err(ProjectError::DuplicateProperty { names: duplicates });
    }
    Ok(properties)
}

fn project_branches<'a>(
    node: &'a SchemaNode,
    select: impl FnMut(&'a Keyword) -> Option<&'a [SchemaRef]> + 'a,
) -> Result<Vec<ApiObject>, ProjectError> {
    node.filter_map(select)
        .flatten()
        .filter(|branch| !branch.is_empty())
        .map(|branch| project_object(branch, None))
        .collect()
}

/// Render a scalar the way it appears in source: strings unquoted.
fn scalar_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
