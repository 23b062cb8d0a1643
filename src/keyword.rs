//! Keyword vocabulary and codec.
//!
//! Every annotation a schema node can carry is one [`Keyword`] variant with a
//! typed payload. Keywords are data carriers: decoding checks the JSON shape
//! of each keyword and nothing else.
//!
//! Equality is semantic. Keyed collectors compare as maps, and set-shaped
//! payloads ([`Unordered`]) compare regardless of order.

use std::ops::Deref;
use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{DecodeError, EncodeError};
use crate::schema::{SchemaNode, SchemaRef};
use crate::types::json_type_name;

/// Nested schemas keyed by name, in declaration order.
///
/// `IndexMap` equality ignores order, which is what keyed collectors need.
pub type SchemaMap = IndexMap<String, SchemaRef>;

/// A list compared as a multiset.
#[derive(Debug, Clone, Default)]
pub struct Unordered<T>(pub Vec<T>);

impl<T: PartialEq> PartialEq for Unordered<T> {
    fn eq(&self, other: &Self) -> bool {
        same_elements(&self.0, &other.0)
    }
}

/// Multiset equality of two slices.
pub(crate) fn same_elements<T: PartialEq>(a: &[T], b: &[T]) -> bool {
    let count = |items: &[T], item: &T| items.iter().filter(|x| *x == item).count();
    a.len() == b.len() && a.iter().all(|item| count(a, item) == count(b, item))
}

impl<T> Deref for Unordered<T> {
    type Target = [T];

    fn deref(&self) -> &[T] {
        &self.0
    }
}

impl<T> From<Vec<T>> for Unordered<T> {
    fn from(items: Vec<T>) -> Self {
        Self(items)
    }
}

/// Kind of access token a method accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccessTokenType {
    User,
    Open,
    Service,
    Group,
}

impl AccessTokenType {
    /// Parse a token type name, ignoring case.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "user" => Some(AccessTokenType::User),
            "open" => Some(AccessTokenType::Open),
            "service" => Some(AccessTokenType::Service),
            "group" => Some(AccessTokenType::Group),
            _ => None,
        }
    }

    /// Canonical lowercase name.
    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTokenType::User => "user",
            AccessTokenType::Open => "open",
            AccessTokenType::Service => "service",
            AccessTokenType::Group => "group",
        }
    }
}

/// Payload of the `required` keyword.
///
/// The boolean form flags a single value (typically a method parameter) as
/// mandatory. The list form names the properties an object must contain.
#[derive(Debug, Clone, PartialEq)]
pub enum Required {
    Flag(bool),
    Properties(Unordered<String>),
}

impl Required {
    /// Whether the annotated value is itself considered required.
    pub fn is_required(&self) -> bool {
        match self {
            Required::Flag(flag) => *flag,
            Required::Properties(names) => !names.is_empty(),
        }
    }

    /// Property names of the list form; empty for the boolean form.
    pub fn properties(&self) -> &[String] {
        match self {
            Required::Flag(_) => &[],
            Required::Properties(names) => names,
        }
    }

    /// Names of required properties absent from `instance`.
    ///
    /// Only the list form validates, and only object instances.
    pub fn missing<'a>(&'a self, instance: &Value) -> Vec<&'a str> {
        let (Required::Properties(names), Value::Object(map)) = (self, instance) else {
            return Vec::new();
        };
        names
            .iter()
            .filter(|name| !map.contains_key(name.as_str()))
            .map(String::as_str)
            .collect()
    }
}

/// A schema annotation with its typed payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Keyword {
    // Baseline vocabulary
    Type(Unordered<String>),
    Properties(SchemaMap),
    PatternProperties(SchemaMap),
    Definitions(SchemaMap),
    Items(Vec<SchemaRef>),
    Required(Required),
    Enum(Vec<Value>),
    Ref(String),
    Anchor(String),
    AllOf(Vec<SchemaRef>),
    OneOf(Vec<SchemaRef>),
    AnyOf(Vec<SchemaRef>),
    AdditionalProperties(SchemaRef),
    MinProperties(u64),
    MaxProperties(u64),
    MinLength(u64),
    MaxLength(u64),
    MinItems(u64),
    MaxItems(u64),
    Description(String),
    Format(String),
    Minimum(Number),
    Maximum(Number),
    Default(Value),

    // API vocabulary
    Methods(SchemaMap),
    Parameters(SchemaMap),
    Responses(SchemaMap),
    Errors(SchemaMap),
    Subcodes(SchemaMap),
    Code(i64),
    Subcode(i64),
    Global(bool),
    AccessTokenTypes(Unordered<AccessTokenType>),
    EnumNames(Unordered<String>),
    WithSetters(bool),
    WithoutRefs(bool),

    /// Any member the vocabulary does not know, kept verbatim.
    Unrecognized { name: String, value: Value },
}

/// Borrowed view of the nested schemas a keyword carries, together with the
/// constructor that rebuilds the same variant from replacement schemas.
pub enum Collector<'a> {
    Keyed(&'a SchemaMap, fn(SchemaMap) -> Keyword),
    Ordered(&'a [SchemaRef], fn(Vec<SchemaRef>) -> Keyword),
    Single(&'a SchemaRef, fn(SchemaRef) -> Keyword),
}

impl Keyword {
    /// Decode the keyword named `name` from its raw JSON value.
    pub fn decode(name: &str, value: &Value) -> Result<Keyword, DecodeError> {
        let keyword = match name {
            "type" => Keyword::Type(decode_type(value)?),
            "properties" => Keyword::Properties(decode_schema_object(name, value)?),
            "patternProperties" => Keyword::PatternProperties(decode_schema_object(name, value)?),
            "definitions" => Keyword::Definitions(decode_schema_object(name, value)?),
            "items" => Keyword::Items(decode_items(value)?),
            "required" => Keyword::Required(decode_required(value)?),
            "enum" => match value {
                Value::Array(values) => Keyword::Enum(values.clone()),
                other => return Err(shape_error(name, "array", other)),
            },
            "$ref" => Keyword::Ref(decode_string(name, value)?),
            "$anchor" => Keyword::Anchor(decode_string(name, value)?),
            "allOf" => Keyword::AllOf(decode_schema_array(name, value)?),
            "oneOf" => Keyword::OneOf(decode_schema_array(name, value)?),
            "anyOf" => Keyword::AnyOf(decode_schema_array(name, value)?),
            "additionalProperties" => {
                Keyword::AdditionalProperties(Arc::new(SchemaNode::from_value(value)?))
            }
            "minProperties" => Keyword::MinProperties(decode_count(name, value)?),
            "maxProperties" => Keyword::MaxProperties(decode_count(name, value)?),
            "minLength" => Keyword::MinLength(decode_count(name, value)?),
            "maxLength" => Keyword::MaxLength(decode_count(name, value)?),
            "minItems" => Keyword::MinItems(decode_count(name, value)?),
            "maxItems" => Keyword::MaxItems(decode_count(name, value)?),
            "description" => Keyword::Description(decode_string(name, value)?),
            "format" => Keyword::Format(decode_string(name, value)?),
            "minimum" => Keyword::Minimum(decode_number(name, value)?),
            "maximum" => Keyword::Maximum(decode_number(name, value)?),
            "default" => Keyword::Default(value.clone()),
            "methods" => Keyword::Methods(decode_named_list(name, value)?),
            "parameters" => Keyword::Parameters(decode_named_list(name, value)?),
            "responses" => Keyword::Responses(decode_schema_object(name, value)?),
            "errors" => Keyword::Errors(decode_keyed_list(name, value)?),
            "subcodes" => Keyword::Subcodes(decode_keyed_list(name, value)?),
            "code" => Keyword::Code(decode_integer(name, value)?),
            "subcode" => Keyword::Subcode(decode_integer(name, value)?),
            "global" => Keyword::Global(decode_bool(name, value)?),
            "access_token_type" => Keyword::AccessTokenTypes(decode_token_types(value)?),
            "enumNames" => Keyword::EnumNames(decode_enum_names(value)?),
            "withSetters" => Keyword::WithSetters(decode_bool(name, value)?),
            "withoutRefs" => Keyword::WithoutRefs(decode_bool(name, value)?),
            _ => Keyword::Unrecognized {
                name: name.to_string(),
                value: value.clone(),
            },
        };
        Ok(keyword)
    }

    /// JSON member name of this keyword.
    pub fn name(&self) -> &str {
        match self {
            Keyword::Type(_) => "type",
            Keyword::Properties(_) => "properties",
            Keyword::PatternProperties(_) => "patternProperties",
            Keyword::Definitions(_) => "definitions",
            Keyword::Items(_) => "items",
            Keyword::Required(_) => "required",
            Keyword::Enum(_) => "enum",
            Keyword::Ref(_) => "$ref",
            Keyword::Anchor(_) => "$anchor",
            Keyword::AllOf(_) => "allOf",
            Keyword::OneOf(_) => "oneOf",
            Keyword::AnyOf(_) => "anyOf",
            Keyword::AdditionalProperties(_) => "additionalProperties",
            Keyword::MinProperties(_) => "minProperties",
            Keyword::MaxProperties(_) => "maxProperties",
            Keyword::MinLength(_) => "minLength",
            Keyword::MaxLength(_) => "maxLength",
            Keyword::MinItems(_) => "minItems",
            Keyword::MaxItems(_) => "maxItems",
            Keyword::Description(_) => "description",
            Keyword::Format(_) => "format",
            Keyword::Minimum(_) => "minimum",
            Keyword::Maximum(_) => "maximum",
            Keyword::Default(_) => "default",
            Keyword::Methods(_) => "methods",
            Keyword::Parameters(_) => "parameters",
            Keyword::Responses(_) => "responses",
            Keyword::Errors(_) => "errors",
            Keyword::Subcodes(_) => "subcodes",
            Keyword::Code(_) => "code",
            Keyword::Subcode(_) => "subcode",
            Keyword::Global(_) => "global",
            Keyword::AccessTokenTypes(_) => "access_token_type",
            Keyword::EnumNames(_) => "enumNames",
            Keyword::WithSetters(_) => "withSetters",
            Keyword::WithoutRefs(_) => "withoutRefs",
            Keyword::Unrecognized { name, .. } => name,
        }
    }

    /// Encode the keyword payload back to JSON.
    pub fn encode(&self) -> Result<Value, EncodeError> {
        let value = match self {
            Keyword::Type(types) => match types.0.as_slice() {
                [single] => Value::String(single.clone()),
                many => many.iter().cloned().map(Value::String).collect(),
            },
            Keyword::Properties(map)
            | Keyword::PatternProperties(map)
            | Keyword::Definitions(map)
            | Keyword::Responses(map) => encode_schema_object(map)?,
            Keyword::Items(items) => match items.as_slice() {
                [] => Value::Null,
                [single] => single.to_value()?,
                many => encode_schema_array(many)?,
            },
            Keyword::Required(Required::Flag(flag)) => Value::Bool(*flag),
            Keyword::Required(Required::Properties(names)) => {
                names.iter().cloned().map(Value::String).collect()
            }
            Keyword::Enum(values) => Value::Array(values.clone()),
            Keyword::Ref(s) | Keyword::Anchor(s) | Keyword::Description(s) | Keyword::Format(s) => {
                Value::String(s.clone())
            }
            Keyword::AllOf(list) | Keyword::OneOf(list) | Keyword::AnyOf(list) => {
                encode_schema_array(list)?
            }
            Keyword::AdditionalProperties(schema) => schema.to_value()?,
            Keyword::MinProperties(n)
            | Keyword::MaxProperties(n)
            | Keyword::MinLength(n)
            | Keyword::MaxLength(n)
            | Keyword::MinItems(n)
            | Keyword::MaxItems(n) => Value::from(*n),
            Keyword::Minimum(n) | Keyword::Maximum(n) => Value::Number(n.clone()),
            Keyword::Default(value) => value.clone(),
            Keyword::Methods(map)
            | Keyword::Parameters(map)
            | Keyword::Errors(map)
            | Keyword::Subcodes(map) => {
                let values: Vec<SchemaRef> = map.values().cloned().collect();
                encode_schema_array(&values)?
            }
            Keyword::Code(n) | Keyword::Subcode(n) => Value::from(*n),
            Keyword::Global(b) | Keyword::WithSetters(b) | Keyword::WithoutRefs(b) => Value::Bool(*b),
            Keyword::AccessTokenTypes(types) => types
                .iter()
                .map(|t| Value::String(t.as_str().to_string()))
                .collect(),
            Keyword::EnumNames(names) => names.iter().cloned().map(Value::String).collect(),
            Keyword::Unrecognized { value, .. } => value.clone(),
        };
        Ok(value)
    }

    /// Fold a later keyword of the same name into this one.
    ///
    /// Keyed collectors are unioned, list collectors and `required` lists
    /// are concatenated and `type` names are unioned. For every other
    /// keyword this one wins and `other` is dropped.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::ConflictingKey` if both keywords define the
    /// same named member differently.
    pub fn absorb(&mut self, other: &Keyword) -> Result<(), EncodeError> {
        let keyword = self.name().to_string();
        match (self, other) {
            (Keyword::Properties(a), Keyword::Properties(b))
            | (Keyword::PatternProperties(a), Keyword::PatternProperties(b))
            | (Keyword::Definitions(a), Keyword::Definitions(b))
            | (Keyword::Methods(a), Keyword::Methods(b))
            | (Keyword::Parameters(a), Keyword::Parameters(b))
            | (Keyword::Responses(a), Keyword::Responses(b)) => union_members(&keyword, a, b),
            (Keyword::Errors(a), Keyword::Errors(b)) | (Keyword::Subcodes(a), Keyword::Subcodes(b)) => {
                append_entries(a, b);
                Ok(())
            }
            (Keyword::AllOf(a), Keyword::AllOf(b))
            | (Keyword::OneOf(a), Keyword::OneOf(b))
            | (Keyword::AnyOf(a), Keyword::AnyOf(b)) => {
                a.extend(b.iter().cloned());
                Ok(())
            }
            (Keyword::Required(Required::Properties(a)), Keyword::Required(Required::Properties(b)))
            | (Keyword::Type(a), Keyword::Type(b)) => {
                for name in b.iter() {
                    if !a.contains(name) {
                        a.0.push(name.clone());
                    }
                }
                Ok(())
            }
            _ => Ok(()),
        }
    }

    /// Nested schemas carried by this keyword, if any.
    pub fn collector(&self) -> Option<Collector<'_>> {
        match self {
            Keyword::Properties(map) => Some(Collector::Keyed(map, Keyword::Properties)),
            Keyword::PatternProperties(map) => {
                Some(Collector::Keyed(map, Keyword::PatternProperties))
            }
            Keyword::Definitions(map) => Some(Collector::Keyed(map, Keyword::Definitions)),
            Keyword::Methods(map) => Some(Collector::Keyed(map, Keyword::Methods)),
            Keyword::Parameters(map) => Some(Collector::Keyed(map, Keyword::Parameters)),
            Keyword::Responses(map) => Some(Collector::Keyed(map, Keyword::Responses)),
            Keyword::Errors(map) => Some(Collector::Keyed(map, Keyword::Errors)),
            Keyword::Subcodes(map) => Some(Collector::Keyed(map, Keyword::Subcodes)),
            Keyword::Items(list) => Some(Collector::Ordered(list, Keyword::Items)),
            Keyword::AllOf(list) => Some(Collector::Ordered(list, Keyword::AllOf)),
            Keyword::OneOf(list) => Some(Collector::Ordered(list, Keyword::OneOf)),
            Keyword::AnyOf(list) => Some(Collector::Ordered(list, Keyword::AnyOf)),
            Keyword::AdditionalProperties(schema) => {
                Some(Collector::Single(schema, Keyword::AdditionalProperties))
            }
            _ => None,
        }
    }

    /// Resolution order: anchors first, then collectors that define
    /// addressable subschemas, then everything else. `$ref` goes last.
    pub fn priority(&self) -> u8 {
        match self {
            Keyword::Anchor(_) => 0,
            Keyword::Definitions(_) => 1,
            Keyword::Ref(_) => u8::MAX,
            _ => 8,
        }
    }

    /// The reference target if this is a `$ref`.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Keyword::Ref(target) => Some(target),
            _ => None,
        }
    }
}

fn shape_error(keyword: &str, expected: &'static str, actual: &Value) -> DecodeError {
    DecodeError::UnexpectedShape {
        keyword: keyword.to_string(),
        expected,
        actual: json_type_name(actual),
    }
}

fn decode_string(keyword: &str, value: &Value) -> Result<String, DecodeError> {
    value
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| shape_error(keyword, "string", value))
}

fn decode_bool(keyword: &str, value: &Value) -> Result<bool, DecodeError> {
    value
        .as_bool()
        .ok_or_else(|| shape_error(keyword, "boolean", value))
}

fn decode_count(keyword: &str, value: &Value) -> Result<u64, DecodeError> {
    value
        .as_u64()
        .ok_or_else(|| shape_error(keyword, "non-negative integer", value))
}

fn decode_integer(keyword: &str, value: &Value) -> Result<i64, DecodeError> {
    value
        .as_i64()
        .ok_or_else(|| shape_error(keyword, "integer", value))
}

fn decode_number(keyword: &str, value: &Value) -> Result<Number, DecodeError> {
    match value {
        Value::Number(n) => Ok(n.clone()),
        other => Err(shape_error(keyword, "number", other)),
    }
}

fn decode_strings(keyword: &str, value: &Value) -> Result<Vec<String>, DecodeError> {
    let Value::Array(items) = value else {
        return Err(shape_error(keyword, "array of strings", value));
    };
    items
        .iter()
        .map(|item| decode_string(keyword, item))
        .collect()
}

fn decode_type(value: &Value) -> Result<Unordered<String>, DecodeError> {
    match value {
        Value::String(s) => Ok(Unordered(vec![s.clone()])),
        Value::Array(_) => decode_strings("type", value).map(Unordered),
        other => Err(shape_error("type", "string or array of strings", other)),
    }
}

fn decode_required(value: &Value) -> Result<Required, DecodeError> {
    match value {
        Value::Bool(flag) => Ok(Required::Flag(*flag)),
        Value::Array(_) => {
            decode_strings("required", value).map(|names| Required::Properties(names.into()))
        }
        other => Err(shape_error("required", "boolean or array of strings", other)),
    }
}

fn decode_enum_names(value: &Value) -> Result<Unordered<String>, DecodeError> {
    let names = decode_strings("enumNames", value)?;
    for (i, name) in names.iter().enumerate() {
        if names[..i].contains(name) {
            return Err(DecodeError::DuplicateKey {
                keyword: "enumNames".to_string(),
                key: name.clone(),
            });
        }
    }
    Ok(Unordered(names))
}

fn decode_token_types(value: &Value) -> Result<Unordered<AccessTokenType>, DecodeError> {
    decode_strings("access_token_type", value)?
        .iter()
        .map(|name| {
            AccessTokenType::parse(name).ok_or_else(|| DecodeError::InvalidValue {
                keyword: "access_token_type".to_string(),
                message: format!("unknown access token type \"{}\"", name),
            })
        })
        .collect::<Result<Vec<_>, _>>()
        .map(Unordered)
}

fn decode_items(value: &Value) -> Result<Vec<SchemaRef>, DecodeError> {
    match value {
        Value::Null => Ok(Vec::new()),
        Value::Array(_) => decode_schema_array("items", value),
        Value::Object(_) | Value::Bool(_) => Ok(vec![Arc::new(SchemaNode::from_value(value)?)]),
        other => Err(shape_error("items", "array or object", other)),
    }
}

fn decode_schema_array(keyword: &str, value: &Value) -> Result<Vec<SchemaRef>, DecodeError> {
    let Value::Array(items) = value else {
        return Err(shape_error(keyword, "array", value));
    };
    items
        .iter()
        .map(|item| SchemaNode::from_value(item).map(Arc::new))
        .collect()
}

fn decode_schema_object(keyword: &str, value: &Value) -> Result<SchemaMap, DecodeError> {
    let Value::Object(members) = value else {
        return Err(shape_error(keyword, "object", value));
    };
    members
        .iter()
        .map(|(key, item)| {
            Ok::<_, DecodeError>((key.clone(), Arc::new(SchemaNode::from_value(item)?)))
        })
        .collect()
}

/// Array entries are keyed by position, object members by name.
fn decode_keyed_list(keyword: &str, value: &Value) -> Result<SchemaMap, DecodeError> {
    match value {
        Value::Object(_) => decode_schema_object(keyword, value),
        Value::Array(_) => Ok(decode_schema_array(keyword, value)?
            .into_iter()
            .enumerate()
            .map(|(i, schema)| (i.to_string(), schema))
            .collect()),
        other => Err(shape_error(keyword, "array or object", other)),
    }
}

/// Array entries keyed by their embedded `name` member.
fn decode_named_list(keyword: &str, value: &Value) -> Result<SchemaMap, DecodeError> {
    let Value::Array(items) = value else {
        return Err(shape_error(keyword, "array", value));
    };
    let mut map = SchemaMap::with_capacity(items.len());
    for (index, item) in items.iter().enumerate() {
        let name = item
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| DecodeError::MissingName {
                keyword: keyword.to_string(),
                index,
            })?
            .to_string();
        let schema = Arc::new(SchemaNode::from_value(item)?);
        if map.insert(name.clone(), schema).is_some() {
            return Err(DecodeError::DuplicateKey {
                keyword: keyword.to_string(),
                key: name,
            });
        }
    }
    Ok(map)
}

fn encode_schema_object(map: &SchemaMap) -> Result<Value, EncodeError> {
    let mut members = Map::with_capacity(map.len());
    for (key, schema) in map {
        members.insert(key.clone(), schema.to_value()?);
    }
    Ok(Value::Object(members))
}

fn encode_schema_array(list: &[SchemaRef]) -> Result<Value, EncodeError> {
    list.iter()
        .map(|schema| schema.to_value())
        .collect::<Result<Vec<_>, _>>()
        .map(Value::Array)
}

/// Members of `b` missing from `a` are added; shared members must agree.
fn union_members(keyword: &str, a: &mut SchemaMap, b: &SchemaMap) -> Result<(), EncodeError> {
    for (key, schema) in b {
        let agrees = a
            .get(key)
            .map(|existing| Arc::ptr_eq(existing, schema) || existing == schema);
        match agrees {
            Some(true) => {}
            Some(false) => {
                return Err(EncodeError::ConflictingKey {
                    keyword: keyword.to_string(),
                    key: key.clone(),
                })
            }
            None => {
                a.insert(key.clone(), Arc::clone(schema));
            }
        }
    }
    Ok(())
}

/// Entries of an array-encoded collector: equal entries collapse, others
/// are appended under the next free position.
fn append_entries(a: &mut SchemaMap, b: &SchemaMap) {
    for (key, schema) in b {
        match a.get(key).map(|existing| existing == schema) {
            Some(true) => {}
            Some(false) => {
                let mut index = a.len();
                while a.contains_key(&index.to_string()) {
                    index += 1;
                }
                a.insert(index.to_string(), Arc::clone(schema));
            }
            None => {
                a.insert(key.clone(), Arc::clone(schema));
            }
        }
    }
}
