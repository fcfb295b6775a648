//! Arena-backed data tree that tolerates reference cycles.
//!
//! Every node lives in one `Vec` and composites refer to their children by
//! [`NodeId`]. Node identity is the id, so two structurally equal containers
//! are still distinct nodes, and a container may list one of its own
//! ancestors as a child.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashSet;

use super::path::PathSegment;
use crate::errors::TreeError;

/// Marker written in place of a container that re-enters one of its ancestors.
pub const CIRCULAR_MARKER: &str = "[Circular]";

/// Identity of a node inside a [`DataTree`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Returns the raw arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

/// A single value in a [`DataTree`].
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// JSON null.
    Null,
    /// A boolean.
    Bool(bool),
    /// A number, kept in its JSON form.
    Number(serde_json::Number),
    /// A string.
    String(String),
    /// A function captured from page state; carries its name when known.
    Function(Option<String>),
    /// An ordered sequence of children.
    Sequence(Vec<NodeId>),
    /// Keyed children in insertion order.
    Mapping(Vec<(String, NodeId)>),
}

impl Node {
    /// Whether this node is a sequence or a mapping.
    #[must_use]
    pub fn is_composite(&self) -> bool {
        matches!(self, Self::Sequence(_) | Self::Mapping(_))
    }

    /// Whether this node has at least one child.
    #[must_use]
    pub fn has_children(&self) -> bool {
        match self {
            Self::Sequence(items) => !items.is_empty(),
            Self::Mapping(entries) => !entries.is_empty(),
            _ => false,
        }
    }

    /// Returns the text a search term is matched against.
    ///
    /// Functions and non-empty composites have no searchable text.
    #[must_use]
    pub fn searchable_text(&self) -> Option<String> {
        match self {
            Self::Null => Some("null".to_string()),
            Self::Bool(b) => Some(b.to_string()),
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => Some(s.clone()),
            Self::Function(_) => None,
            Self::Sequence(items) if items.is_empty() => Some("[]".to_string()),
            Self::Mapping(entries) if entries.is_empty() => Some("{}".to_string()),
            Self::Sequence(_) | Self::Mapping(_) => None,
        }
    }
}

/// An arbitrary nested value, possibly cyclic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DataTree {
    nodes: Vec<Node>,
    root: Option<NodeId>,
}

impl DataTree {
    /// Creates an empty tree with no root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a tree from a JSON value; every composite becomes a fresh node.
    #[must_use]
    pub fn from_json(value: &serde_json::Value) -> Self {
        let mut tree = Self::new();
        let root = tree.add_json(value);
        tree.root = Some(root);
        tree
    }

    /// Adds a JSON value as a detached subtree and returns its id.
    pub fn add_json(&mut self, value: &serde_json::Value) -> NodeId {
        match value {
            serde_json::Value::Null => self.add(Node::Null),
            serde_json::Value::Bool(b) => self.add(Node::Bool(*b)),
            serde_json::Value::Number(n) => self.add(Node::Number(n.clone())),
            serde_json::Value::String(s) => self.add(Node::String(s.clone())),
            serde_json::Value::Array(items) => {
                let children = items.iter().map(|item| self.add_json(item)).collect();
                self.add(Node::Sequence(children))
            }
            serde_json::Value::Object(map) => {
                let entries = map
                    .iter()
                    .map(|(key, item)| (key.clone(), self.add_json(item)))
                    .collect();
                self.add(Node::Mapping(entries))
            }
        }
    }

    /// Adds a detached node and returns its id.
    pub fn add(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        NodeId(self.nodes.len() - 1)
    }

    /// Adds an empty mapping.
    pub fn add_mapping(&mut self) -> NodeId {
        self.add(Node::Mapping(Vec::new()))
    }

    /// Adds an empty sequence.
    pub fn add_sequence(&mut self) -> NodeId {
        self.add(Node::Sequence(Vec::new()))
    }

    /// Adds a string leaf.
    pub fn add_string(&mut self, value: impl Into<String>) -> NodeId {
        self.add(Node::String(value.into()))
    }

    /// Sets the root node.
    pub fn set_root(&mut self, root: NodeId) -> Result<(), TreeError> {
        self.check(root)?;
        self.root = Some(root);
        Ok(())
    }

    /// Appends `key -> child` to a mapping. Any existing node may be the
    /// child, including an ancestor of `mapping`.
    pub fn insert(
        &mut self,
        mapping: NodeId,
        key: impl Into<String>,
        child: NodeId,
    ) -> Result<(), TreeError> {
        self.check(child)?;
        match self.nodes.get_mut(mapping.0) {
            Some(Node::Mapping(entries)) => {
                entries.push((key.into(), child));
                Ok(())
            }
            Some(_) => Err(TreeError::NotAMapping(mapping.0)),
            None => Err(TreeError::UnknownNode(mapping.0)),
        }
    }

    /// Appends a child to a sequence.
    pub fn push(&mut self, sequence: NodeId, child: NodeId) -> Result<(), TreeError> {
        self.check(child)?;
        match self.nodes.get_mut(sequence.0) {
            Some(Node::Sequence(items)) => {
                items.push(child);
                Ok(())
            }
            Some(_) => Err(TreeError::NotASequence(sequence.0)),
            None => Err(TreeError::UnknownNode(sequence.0)),
        }
    }

    fn check(&self, id: NodeId) -> Result<(), TreeError> {
        if id.0 < self.nodes.len() {
            Ok(())
        } else {
            Err(TreeError::UnknownNode(id.0))
        }
    }

    /// Returns the root id, if any.
    #[must_use]
    pub fn root(&self) -> Option<NodeId> {
        self.root
    }

    /// Returns the root node, if any.
    #[must_use]
    pub fn root_node(&self) -> Option<&Node> {
        self.root.and_then(|id| self.node(id))
    }

    /// Returns a node by id.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    /// Returns the number of nodes in the arena.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no root or an empty root container.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self.root_node() {
            None => true,
            Some(node) => node.is_composite() && !node.has_children(),
        }
    }

    /// Follows one path segment from `parent`.
    #[must_use]
    pub fn child(&self, parent: NodeId, segment: &PathSegment) -> Option<NodeId> {
        match (self.node(parent)?, segment) {
            (Node::Mapping(entries), PathSegment::Key(key)) => entries
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, id)| *id),
            (Node::Sequence(items), PathSegment::Index(index)) => items.get(*index).copied(),
            _ => None,
        }
    }

    /// Resolves a path from the root.
    #[must_use]
    pub fn resolve(&self, path: &[PathSegment]) -> Option<NodeId> {
        path.iter()
            .try_fold(self.root?, |current, segment| self.child(current, segment))
    }

    /// Returns the JSON form of a leaf node. Composites render as their
    /// empty JSON container; functions render as null.
    #[must_use]
    pub fn leaf_value(&self, id: NodeId) -> serde_json::Value {
        match self.node(id) {
            Some(Node::Bool(b)) => serde_json::Value::Bool(*b),
            Some(Node::Number(n)) => serde_json::Value::Number(n.clone()),
            Some(Node::String(s)) => serde_json::Value::String(s.clone()),
            Some(Node::Sequence(_)) => serde_json::Value::Array(Vec::new()),
            Some(Node::Mapping(_)) => serde_json::Value::Object(serde_json::Map::new()),
            Some(Node::Null | Node::Function(_)) | None => serde_json::Value::Null,
        }
    }

    /// Converts the tree to JSON.
    ///
    /// A container that re-enters one of its ancestors is written as
    /// [`CIRCULAR_MARKER`]. Function values are dropped from mappings and
    /// written as null inside sequences.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        let mut on_stack = HashSet::new();
        self.root
            .map_or(serde_json::Value::Null, |root| self.node_to_json(root, &mut on_stack))
    }

    fn node_to_json(&self, id: NodeId, on_stack: &mut HashSet<NodeId>) -> serde_json::Value {
        let Some(node) = self.node(id) else {
            return serde_json::Value::Null;
        };
        if !node.is_composite() {
            return self.leaf_value(id);
        }
        if !on_stack.insert(id) {
            return serde_json::Value::String(CIRCULAR_MARKER.to_string());
        }

        let value = match node {
            Node::Sequence(items) => serde_json::Value::Array(
                items.iter().map(|child| self.node_to_json(*child, on_stack)).collect(),
            ),
            Node::Mapping(entries) => {
                let mut map = serde_json::Map::new();
                for (key, child) in entries {
                    if matches!(self.node(*child), Some(Node::Function(_))) {
                        continue;
                    }
                    map.insert(key.clone(), self.node_to_json(*child, on_stack));
                }
                serde_json::Value::Object(map)
            }
            _ => serde_json::Value::Null,
        };

        on_stack.remove(&id);
        value
    }
}

impl From<serde_json::Value> for DataTree {
    fn from(value: serde_json::Value) -> Self {
        Self::from_json(&value)
    }
}

impl Serialize for DataTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for DataTree {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        Ok(Self::from_json(&value))
    }
}
