//! Schema nodes.
//!
//! A [`SchemaNode`] is an immutable set of keywords. Nested schemas are held
//! behind [`Arc`] so resolved subtrees can be shared between every parent
//! that references them.

use std::borrow::Cow;
use std::sync::Arc;

use serde::de::{self, Deserialize, Deserializer};
use serde::ser::{self, Serialize, Serializer};
use serde_json::{Map, Value};
use url::Url;

use crate::error::{DecodeError, EncodeError};
use crate::keyword::{same_elements, Collector, Keyword};
use crate::types::json_type_name;

/// Shared handle to a schema node.
pub type SchemaRef = Arc<SchemaNode>;

/// An immutable schema: an ordered set of keywords addressed by a base URI.
///
/// Boolean schemas (`true` / `false`) carry no keywords.
#[derive(Debug, Clone, Default)]
pub struct SchemaNode {
    keywords: Vec<Keyword>,
    boolean: Option<bool>,
    base_uri: Option<Url>,
}

impl SchemaNode {
    /// Create a node from keywords.
    pub fn new(keywords: Vec<Keyword>) -> Self {
        Self {
            keywords,
            boolean: None,
            base_uri: None,
        }
    }

    /// Create a boolean schema.
    pub fn boolean(value: bool) -> Self {
        Self {
            keywords: Vec::new(),
            boolean: Some(value),
            base_uri: None,
        }
    }

    /// Return the same node addressed under `uri`.
    pub fn with_base_uri(mut self, uri: Url) -> Self {
        self.base_uri = Some(uri);
        self
    }

    pub fn base_uri(&self) -> Option<&Url> {
        self.base_uri.as_ref()
    }

    pub fn keywords(&self) -> &[Keyword] {
        &self.keywords
    }

    /// Whether this node carries no keywords at all.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// The value of a boolean schema.
    pub fn as_bool(&self) -> Option<bool> {
        self.boolean
    }

    /// First keyword for which `f` returns `Some`.
    pub fn find_map<'a, T>(&'a self, f: impl FnMut(&'a Keyword) -> Option<T>) -> Option<T> {
        self.keywords.iter().find_map(f)
    }

    /// All keywords for which `f` returns `Some`, in declaration order.
    pub fn filter_map<'a, T: 'a>(
        &'a self,
        f: impl FnMut(&'a Keyword) -> Option<T> + 'a,
    ) -> impl Iterator<Item = T> + 'a {
        self.keywords.iter().filter_map(f)
    }

    /// The `$ref` targets directly on this node.
    pub fn references(&self) -> Vec<&str> {
        self.keywords.iter().filter_map(Keyword::reference).collect()
    }

    /// Whether any `$ref` remains anywhere in this subtree.
    pub fn has_references(&self) -> bool {
        self.keywords.iter().any(|keyword| {
            if keyword.reference().is_some() {
                return true;
            }
            match keyword.collector() {
                Some(Collector::Keyed(map, _)) => map.values().any(|s| s.has_references()),
                Some(Collector::Ordered(list, _)) => list.iter().any(|s| s.has_references()),
                Some(Collector::Single(schema, _)) => schema.has_references(),
                None => false,
            }
        })
    }

    /// Whether resolution has nothing to do on this node: no `$ref` and no
    /// nested schemas.
    pub fn is_leaf(&self) -> bool {
        self.keywords
            .iter()
            .all(|k| k.reference().is_none() && k.collector().is_none())
    }

    /// A copy of this node carrying `keywords` instead.
    pub(crate) fn with_keywords(&self, keywords: Vec<Keyword>) -> SchemaNode {
        SchemaNode {
            keywords,
            boolean: self.boolean,
            base_uri: self.base_uri.clone(),
        }
    }

    /// The node with its `$ref` and every nested schema dropped.
    ///
    /// Used where a reference cycle closes: the scalar annotations of the
    /// target survive, its structure does not.
    pub fn cycle_stub(&self) -> SchemaNode {
        SchemaNode {
            keywords: self
                .keywords
                .iter()
                .filter(|k| k.reference().is_none() && k.collector().is_none())
                .cloned()
                .collect(),
            boolean: self.boolean,
            base_uri: self.base_uri.clone(),
        }
    }

    /// Decode a node from raw JSON.
    pub fn from_value(value: &Value) -> Result<Self, DecodeError> {
        match value {
            Value::Bool(b) => Ok(SchemaNode::boolean(*b)),
            Value::Object(members) => {
                let keywords = members
                    .iter()
                    .map(|(name, value)| Keyword::decode(name, value))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(SchemaNode::new(keywords))
            }
            other => Err(DecodeError::UnexpectedShape {
                keyword: "schema".to_string(),
                expected: "object or boolean",
                actual: json_type_name(other),
            }),
        }
    }

    /// Decode a node from raw JSON bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, DecodeError> {
        let value: Value =
            serde_json::from_slice(bytes).map_err(|source| DecodeError::InvalidJson { source })?;
        Self::from_value(&value)
    }

    /// Keywords with repeated names folded into one, as [`Keyword::absorb`]
    /// combines them.
    ///
    /// Only merged nodes repeat a keyword; any other node is returned as is.
    pub fn folded_keywords(&self) -> Result<Cow<'_, [Keyword]>, EncodeError> {
        let repeated = self
            .keywords
            .iter()
            .enumerate()
            .any(|(i, k)| self.keywords[..i].iter().any(|p| p.name() == k.name()));
        if !repeated {
            return Ok(Cow::Borrowed(self.keywords.as_slice()));
        }

        let mut folded: Vec<Keyword> = Vec::with_capacity(self.keywords.len());
        for keyword in &self.keywords {
            match folded.iter_mut().find(|k| k.name() == keyword.name()) {
                Some(existing) => existing.absorb(keyword)?,
                None => folded.push(keyword.clone()),
            }
        }
        Ok(Cow::Owned(folded))
    }

    /// Encode the node back to JSON.
    ///
    /// Repeated keywords of a merged node are folded first.
    ///
    /// # Errors
    ///
    /// Returns `EncodeError::ConflictingKey` if a merged node defines the
    /// same member twice with different schemas.
    pub fn to_value(&self) -> Result<Value, EncodeError> {
        if let Some(b) = self.boolean {
            return Ok(Value::Bool(b));
        }
        let keywords = self.folded_keywords()?;
        let mut members = Map::with_capacity(keywords.len());
        for keyword in keywords.iter() {
            members.insert(keyword.name().to_string(), keyword.encode()?);
        }
        Ok(Value::Object(members))
    }

    /// Find the subschema at a JSON Pointer (e.g. `/definitions/user`).
    ///
    /// The pointer must already be percent-decoded; `~0` / `~1` escapes are
    /// handled here.
    pub fn find_subschema(self: &Arc<Self>, pointer: &str) -> Option<SchemaRef> {
        if pointer.is_empty() {
            return Some(Arc::clone(self));
        }
        let segments: Vec<String> = pointer
            .strip_prefix('/')?
            .split('/')
            .map(|part| part.replace("~1", "/").replace("~0", "~"))
            .collect();
        walk(self, &segments)
    }

    /// Find the subschema declaring `$anchor: <anchor>` anywhere in this tree.
    pub fn find_anchor(self: &Arc<Self>, anchor: &str) -> Option<SchemaRef> {
        if self
            .keywords
            .iter()
            .any(|k| matches!(k, Keyword::Anchor(a) if a == anchor))
        {
            return Some(Arc::clone(self));
        }
        self.keywords.iter().find_map(|keyword| match keyword.collector()? {
            Collector::Keyed(map, _) => map.values().find_map(|s| s.find_anchor(anchor)),
            Collector::Ordered(list, _) => list.iter().find_map(|s| s.find_anchor(anchor)),
            Collector::Single(schema, _) => schema.find_anchor(anchor),
        })
    }
}

fn walk(node: &SchemaRef, segments: &[String]) -> Option<SchemaRef> {
    let Some((name, rest)) = segments.split_first() else {
        return Some(Arc::clone(node));
    };
    node.keywords
        .iter()
        .filter(|k| k.name() == name)
        .find_map(|keyword| step(keyword, rest))
}

fn step(keyword: &Keyword, rest: &[String]) -> Option<SchemaRef> {
    match keyword.collector() {
        Some(Collector::Keyed(map, _)) => {
            let (key, rest) = rest.split_first()?;
            walk(map.get(key)?, rest)
        }
        Some(Collector::Ordered(list, _)) => {
            let index = rest.first().and_then(|s| s.parse::<usize>().ok());
            match index {
                Some(i) => walk(list.get(i)?, &rest[1..]),
                // `items` holding a single schema is addressed without an index
                None if list.len() == 1 => walk(&list[0], rest),
                None => None,
            }
        }
        Some(Collector::Single(schema, _)) => walk(schema, rest),
        None => match keyword {
            Keyword::Unrecognized { value, .. } => {
                let mut current = value;
                for segment in rest {
                    current = match current {
                        Value::Object(members) => members.get(segment)?,
                        Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
                        _ => return None,
                    };
                }
                SchemaNode::from_value(current).ok().map(Arc::new)
            }
            _ => None,
        },
    }
}

/// Keyword order and base URI do not take part in equality. Merged nodes
/// compare by their folded keywords, so a merged node equals its re-decoded
/// encoding.
impl PartialEq for SchemaNode {
    fn eq(&self, other: &Self) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        if self.boolean != other.boolean {
            return false;
        }
        match (self.folded_keywords(), other.folded_keywords()) {
            (Ok(a), Ok(b)) => same_elements(&*a, &*b),
            _ => same_elements(&self.keywords, &other.keywords),
        }
    }
}

impl Serialize for SchemaNode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value()
            .map_err(<S::Error as ser::Error>::custom)?
            .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SchemaNode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        SchemaNode::from_value(&value).map_err(de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node(value: Value) -> SchemaRef {
        Arc::new(SchemaNode::from_value(&value).unwrap())
    }

    #[test]
    fn encode_decode_preserves_content() {
        let raw = json!({
            "type": "object",
            "description": "User object",
            "properties": {
                "id": { "type": "integer", "minimum": 1 },
                "photo": { "type": "string", "format": "uri" },
                "sex": { "type": "integer", "enum": [0, 1, 2], "enumNames": ["unknown", "female", "male"] }
            },
            "required": ["id"],
            "additionalProperties": false,
            "x-custom": { "kept": true }
        });
        let decoded = SchemaNode::from_value(&raw).unwrap();
        assert_eq!(decoded.to_value().unwrap(), raw);
        assert_eq!(SchemaNode::from_value(&decoded.to_value().unwrap()).unwrap(), decoded);
    }

    #[test]
    fn equality_ignores_member_order() {
        let a = node(json!({"type": "string", "description": "a"}));
        let b = node(json!({"description": "a", "type": "string"}));
        assert_eq!(a, b);
        assert_ne!(a, node(json!({"type": "string"})));
    }

    #[test]
    fn merged_node_folds_repeated_keywords() {
        let merged = SchemaNode::new(vec![
            Keyword::decode("properties", &json!({"name": {"type": "string"}})).unwrap(),
            Keyword::decode("type", &json!("object")).unwrap(),
            Keyword::decode("properties", &json!({"id": {"type": "integer"}})).unwrap(),
        ]);
        assert_eq!(merged.folded_keywords().unwrap().len(), 2);

        let encoded = merged.to_value().unwrap();
        assert_eq!(
            encoded,
            json!({"properties": {"name": {"type": "string"}, "id": {"type": "integer"}}, "type": "object"})
        );
        assert_eq!(SchemaNode::from_value(&encoded).unwrap(), merged);
    }

    #[test]
    fn boolean_schemas() {
        let t = SchemaNode::from_value(&json!(true)).unwrap();
        assert_eq!(t.as_bool(), Some(true));
        assert!(t.is_empty());
        assert_eq!(t.to_value().unwrap(), json!(true));
        assert_ne!(t, SchemaNode::boolean(false));
    }

    #[test]
    fn rejects_non_schema_values() {
        let err = SchemaNode::from_value(&json!("string")).unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedShape { actual: "string", .. }));

        let err = SchemaNode::from_slice(b"{not json").unwrap_err();
        assert!(matches!(err, DecodeError::InvalidJson { .. }));
    }

    #[test]
    fn nested_decode_errors_propagate() {
        let err = SchemaNode::from_value(&json!({
            "properties": { "id": { "type": 5 } }
        }))
        .unwrap_err();
        assert!(matches!(err, DecodeError::UnexpectedShape { keyword, .. } if keyword == "type"));
    }

    #[test]
    fn find_subschema_walks_collectors() {
        let root = node(json!({
            "definitions": {
                "user": {
                    "properties": { "tags": { "items": { "type": "string" } } }
                },
                "a/b": { "type": "integer" }
            },
            "allOf": [{ "type": "object" }, { "type": "null" }]
        }));

        let user = root.find_subschema("/definitions/user").unwrap();
        assert!(user.find_map(|k| match k {
            Keyword::Properties(_) => Some(()),
            _ => None,
        })
        .is_some());

        let item = root
            .find_subschema("/definitions/user/properties/tags/items")
            .unwrap();
        assert_eq!(item, node(json!({"type": "string"})));

        let escaped = root.find_subschema("/definitions/a~1b").unwrap();
        assert_eq!(escaped, node(json!({"type": "integer"})));

        let second = root.find_subschema("/allOf/1").unwrap();
        assert_eq!(second, node(json!({"type": "null"})));

        assert!(Arc::ptr_eq(&root.find_subschema("").unwrap(), &root));
        assert!(root.find_subschema("/definitions/missing").is_none());
        assert!(root.find_subschema("definitions").is_none());
    }

    #[test]
    fn find_subschema_inside_unrecognized_members() {
        let root = node(json!({ "components": { "thing": { "type": "boolean" } } }));
        let thing = root.find_subschema("/components/thing").unwrap();
        assert_eq!(thing, node(json!({"type": "boolean"})));
    }

    #[test]
    fn find_anchor_searches_the_tree() {
        let root = node(json!({
            "definitions": { "x": { "$anchor": "point", "type": "object" } }
        }));
        let found = root.find_anchor("point").unwrap();
        assert_eq!(found, node(json!({"$anchor": "point", "type": "object"})));
        assert!(root.find_anchor("missing").is_none());
    }

    #[test]
    fn reference_tracking() {
        let root = node(json!({
            "properties": { "a": { "$ref": "#/definitions/a" } }
        }));
        assert!(root.references().is_empty());
        assert!(root.has_references());
        assert!(!root.is_leaf());
        assert!(node(json!({"type": "string"})).is_leaf());
    }

    #[test]
    fn cycle_stub_keeps_scalars_only() {
        let root = node(json!({
            "$ref": "#/definitions/a",
            "type": "object",
            "description": "node",
            "properties": { "next": { "$ref": "#" } }
        }));
        let stub = root.cycle_stub();
        assert_eq!(stub.to_value().unwrap(), json!({"type": "object", "description": "node"}));
        assert!(!stub.has_references());
    }

    #[test]
    fn serde_round_trip() {
        let parsed: SchemaNode =
            serde_json::from_str(r#"{"type": "integer", "code": 5}"#).unwrap();
        assert_eq!(
            serde_json::to_value(&parsed).unwrap(),
            json!({"type": "integer", "code": 5})
        );
        assert!(serde_json::from_str::<SchemaNode>(r#"{"code": "x"}"#).is_err());
    }
}
