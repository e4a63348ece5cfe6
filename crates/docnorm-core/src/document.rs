//! Parsed document tree
//!
//! Documents reach the core as a closed tree of [`Node`]s. Numbers keep their
//! literal text so decimal scale can be read from the source digits.

use crate::{Error, Result};

/// One node of a parsed document
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    /// Number literal as written in the source
    Number(String),
    String(String),
    Array(Vec<Node>),
    /// Properties in document order
    Object(Vec<(String, Node)>),
}

/// Container-level kind of a node
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeKind {
    Null,
    Bool,
    Number,
    String,
    Array,
    Object,
}

impl Node {
    /// Parse one JSON document
    pub fn parse(input: &[u8]) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_slice(input).map_err(|e| Error::ParseError(e.to_string()))?;
        Ok(Self::from_json(&value))
    }

    /// Convert from serde_json::Value
    pub fn from_json(json: &serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Node::Null,
            serde_json::Value::Bool(b) => Node::Bool(*b),
            serde_json::Value::Number(n) => Node::Number(n.to_string()),
            serde_json::Value::String(s) => Node::String(s.clone()),
            serde_json::Value::Array(arr) => Node::Array(arr.iter().map(Node::from_json).collect()),
            serde_json::Value::Object(obj) => Node::Object(
                obj.iter()
                    .map(|(k, v)| (k.clone(), Node::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert to serde_json::Value
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Node::Null => serde_json::Value::Null,
            Node::Bool(b) => serde_json::Value::Bool(*b),
            Node::Number(n) => n
                .parse::<serde_json::Number>()
                .map(serde_json::Value::Number)
                .unwrap_or_else(|_| serde_json::Value::String(n.clone())),
            Node::String(s) => serde_json::Value::String(s.clone()),
            Node::Array(arr) => serde_json::Value::Array(arr.iter().map(Node::to_json).collect()),
            Node::Object(obj) => serde_json::Value::Object(
                obj.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
        }
    }

    pub fn kind(&self) -> NodeKind {
        match self {
            Node::Null => NodeKind::Null,
            Node::Bool(_) => NodeKind::Bool,
            Node::Number(_) => NodeKind::Number,
            Node::String(_) => NodeKind::String,
            Node::Array(_) => NodeKind::Array,
            Node::Object(_) => NodeKind::Object,
        }
    }

    /// Text used to count value reuse and to store opaque values.
    ///
    /// Strings and booleans pass through verbatim, numbers keep their literal,
    /// containers become compact JSON. `None` for null.
    pub fn value_text(&self) -> Option<String> {
        match self {
            Node::Null => None,
            Node::Bool(b) => Some(b.to_string()),
            Node::Number(n) => Some(n.clone()),
            Node::String(s) => Some(s.clone()),
            Node::Array(_) | Node::Object(_) => Some(self.to_json().to_string()),
        }
    }
}

impl From<serde_json::Value> for Node {
    fn from(value: serde_json::Value) -> Self {
        Node::from_json(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_keeps_property_order() {
        let node = Node::parse(br#"{"b": 1, "a": 2}"#).unwrap();
        match node {
            Node::Object(props) => {
                assert_eq!(props[0].0, "b");
                assert_eq!(props[1].0, "a");
            }
            _ => panic!("Expected Object"),
        }
    }

    #[test]
    fn test_parse_keeps_number_literal() {
        let node = Node::parse(br#"{"price": 1.250}"#).unwrap();
        match node {
            Node::Object(props) => assert_eq!(props[0].1, Node::Number("1.250".into())),
            _ => panic!("Expected Object"),
        }
    }

    #[test]
    fn test_parse_malformed() {
        assert!(matches!(Node::parse(b"{not json"), Err(Error::ParseError(_))));
    }

    #[test]
    fn test_value_text() {
        assert_eq!(Node::String("red".into()).value_text().as_deref(), Some("red"));
        assert_eq!(Node::Bool(true).value_text().as_deref(), Some("true"));
        assert_eq!(Node::Number("42".into()).value_text().as_deref(), Some("42"));
        assert_eq!(Node::Null.value_text(), None);

        let obj = Node::from_json(&serde_json::json!({"k": "v"}));
        assert_eq!(obj.value_text().as_deref(), Some(r#"{"k":"v"}"#));
    }
}
