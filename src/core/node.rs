use serde_json::Value;
use std::fmt;

/// Position inside a JSON document as seen by the evaluator.
///
/// `serde_json` has no notion of an absent value, so a selector step that
/// cannot be resolved yields `Node::Missing`. It is distinct from JSON
/// `null`, which is `Node::Present(&Value::Null)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Node<'a> {
    Missing,
    Present(&'a Value),
}

impl<'a> Node<'a> {
    pub fn is_missing(&self) -> bool {
        matches!(self, Node::Missing)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Present(Value::Null))
    }

    pub fn is_object(&self) -> bool {
        matches!(self, Node::Present(Value::Object(_)))
    }

    pub fn is_array(&self) -> bool {
        matches!(self, Node::Present(Value::Array(_)))
    }

    pub fn is_container(&self) -> bool {
        self.is_object() || self.is_array()
    }

    /// The underlying JSON value, `None` when missing.
    pub fn as_value(&self) -> Option<&'a Value> {
        match self {
            Node::Missing => None,
            Node::Present(value) => Some(value),
        }
    }

    /// Number of children of a container, zero for anything else.
    pub fn len(&self) -> usize {
        match self {
            Node::Present(Value::Object(map)) => map.len(),
            Node::Present(Value::Array(items)) => items.len(),
            _ => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn field(&self, name: &str) -> Option<&'a Value> {
        match self {
            Node::Present(Value::Object(map)) => map.get(name),
            _ => None,
        }
    }

    pub fn element(&self, index: usize) -> Option<&'a Value> {
        match self {
            Node::Present(Value::Array(items)) => items.get(index),
            _ => None,
        }
    }

    /// Textual form of a scalar: strings verbatim, numbers and booleans as
    /// printed by JSON. Containers, null and missing have none.
    pub fn scalar_text(&self) -> Option<String> {
        match self {
            Node::Present(Value::String(s)) => Some(s.clone()),
            Node::Present(Value::Number(n)) => Some(n.to_string()),
            Node::Present(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        }
    }
}

impl<'a> From<&'a Value> for Node<'a> {
    fn from(value: &'a Value) -> Self {
        Node::Present(value)
    }
}

impl fmt::Display for Node<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Missing => write!(f, "<missing>"),
            Node::Present(value) => write!(f, "{}", value),
        }
    }
}
