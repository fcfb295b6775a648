//! Rebuilds the minimal subtree that leads to a set of matches.

use serde::{Serialize, Serializer};
use std::collections::HashSet;

use super::path::{MatchDescriptor, PathSegment};
use super::value::{DataTree, Node, NodeId};

/// A pruned copy of a [`DataTree`] that keeps only matched lineages.
#[derive(Debug, Clone, PartialEq)]
pub enum ReducedTree {
    /// A matched leaf value.
    Value(serde_json::Value),
    /// Keyed children, in the order they were first reached.
    Mapping(Vec<(String, ReducedTree)>),
    /// Children at their original positions; unmatched positions are
    /// [`ReducedTree::Elided`].
    Sequence(Vec<ReducedTree>),
    /// Placeholder for excluded sibling content.
    Elided,
}

impl ReducedTree {
    fn empty_like(node: Option<&Node>) -> Self {
        match node {
            Some(Node::Sequence(_)) => Self::Sequence(Vec::new()),
            _ => Self::Mapping(Vec::new()),
        }
    }

    /// Whether this is a container with no children.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Mapping(entries) => entries.is_empty(),
            Self::Sequence(items) => items.is_empty(),
            Self::Value(_) | Self::Elided => false,
        }
    }

    /// Returns the path of every matched leaf, depth first.
    #[must_use]
    pub fn leaf_paths(&self) -> Vec<Vec<PathSegment>> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.collect_leaf_paths(&mut path, &mut out);
        out
    }

    fn collect_leaf_paths(&self, path: &mut Vec<PathSegment>, out: &mut Vec<Vec<PathSegment>>) {
        match self {
            Self::Value(_) => out.push(path.clone()),
            Self::Elided => {}
            Self::Mapping(entries) => {
                for (key, child) in entries {
                    path.push(PathSegment::Key(key.clone()));
                    child.collect_leaf_paths(path, out);
                    path.pop();
                }
            }
            Self::Sequence(items) => {
                for (index, child) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    child.collect_leaf_paths(path, out);
                    path.pop();
                }
            }
        }
    }

    /// Converts to JSON; elided positions become null.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Self::Value(value) => value.clone(),
            Self::Elided => serde_json::Value::Null,
            Self::Mapping(entries) => serde_json::Value::Object(
                entries
                    .iter()
                    .map(|(key, child)| (key.clone(), child.to_json()))
                    .collect(),
            ),
            Self::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Self::to_json).collect())
            }
        }
    }

    /// Returns the child slot for `segment`, creating it as `Elided`.
    /// `None` when the segment does not fit this container.
    fn slot(&mut self, segment: &PathSegment) -> Option<&mut Self> {
        match (self, segment) {
            (Self::Mapping(entries), PathSegment::Key(key)) => {
                let position = match entries.iter().position(|(k, _)| k == key) {
                    Some(position) => position,
                    None => {
                        entries.push((key.clone(), Self::Elided));
                        entries.len() - 1
                    }
                };
                Some(&mut entries[position].1)
            }
            (Self::Sequence(items), PathSegment::Index(index)) => {
                if items.len() <= *index {
                    items.resize(*index + 1, Self::Elided);
                }
                Some(&mut items[*index])
            }
            _ => None,
        }
    }
}

impl Serialize for ReducedTree {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Reduces a tree to the common ancestors of a list of matches.
#[derive(Debug, Clone, Copy, Default)]
pub struct AncestorReducer;

impl AncestorReducer {
    /// Creates a new reducer.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Builds the union of every match's lineage.
    ///
    /// Intermediate containers keep the kind they have in `tree` and only the
    /// children leading to a match. With `treat_as_cyclic`, a path that would
    /// place a container below itself is dropped. No matches yields an empty
    /// container of the root's kind, never the original tree.
    #[must_use]
    pub fn reduce(
        &self,
        tree: &DataTree,
        matches: &[MatchDescriptor],
        treat_as_cyclic: bool,
    ) -> ReducedTree {
        let mut out = ReducedTree::empty_like(tree.root_node());
        let Some(root) = tree.root() else {
            return out;
        };

        for m in matches {
            if m.path.is_empty() {
                // The root itself matched, so there is nothing to prune.
                out = ReducedTree::Value(m.value.clone());
                continue;
            }
            let mut lineage = HashSet::from([root]);
            place(&mut out, tree, root, &m.path, &m.value, treat_as_cyclic, &mut lineage);
        }
        out
    }
}

fn place(
    out: &mut ReducedTree,
    tree: &DataTree,
    parent: NodeId,
    rest: &[PathSegment],
    value: &serde_json::Value,
    treat_as_cyclic: bool,
    lineage: &mut HashSet<NodeId>,
) {
    let Some((segment, remaining)) = rest.split_first() else {
        return;
    };
    let Some(child) = tree.child(parent, segment) else {
        return;
    };
    if treat_as_cyclic && !lineage.insert(child) {
        return;
    }
    let Some(slot) = out.slot(segment) else {
        return;
    };

    if remaining.is_empty() {
        *slot = ReducedTree::Value(value.clone());
        return;
    }

    if matches!(slot, ReducedTree::Elided) {
        *slot = ReducedTree::empty_like(tree.node(child));
    }
    place(slot, tree, child, remaining, value, treat_as_cyclic, lineage);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SearchTerms, TreeSearcher};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn reduce_json(value: serde_json::Value, terms: &[&str]) -> ReducedTree {
        let tree = DataTree::from_json(&value);
        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(terms.iter().copied()));
        AncestorReducer::new().reduce(&tree, &found, false)
    }

    #[test]
    fn test_single_lineage() {
        let reduced = reduce_json(json!({"a": {"b": "contains FOO here", "c": 1}}), &["foo"]);
        assert_eq!(reduced.to_json(), json!({"a": {"b": "contains FOO here"}}));
    }

    #[test]
    fn test_no_matches_yields_empty_root_kind() {
        let reduced = reduce_json(json!({"x": [1, {"y": "bar"}]}), &["baz"]);
        assert_eq!(reduced.to_json(), json!({}));

        let reduced = reduce_json(json!([1, 2, 3]), &["baz"]);
        assert_eq!(reduced.to_json(), json!([]));

        let reduced = reduce_json(json!("scalar"), &["baz"]);
        assert!(reduced.is_empty());
    }

    #[test]
    fn test_overlapping_paths_share_structure() {
        let reduced = reduce_json(
            json!({"product": {"name": "Acme Shoe", "sku": "x1", "brand": {"name": "ACME"}}}),
            &["acme"],
        );
        assert_eq!(
            reduced.to_json(),
            json!({"product": {"name": "Acme Shoe", "brand": {"name": "ACME"}}})
        );
    }

    #[test]
    fn test_sequence_positions_are_kept() {
        let reduced = reduce_json(json!({"items": ["a", "b", {"n": "acme"}]}), &["acme"]);
        assert_eq!(reduced.to_json(), json!({"items": [null, null, {"n": "acme"}]}));
        assert_eq!(
            reduced.leaf_paths(),
            vec![vec!["items".into(), 2.into(), "n".into()]]
        );
    }

    #[test]
    fn test_root_scalar_match() {
        let reduced = reduce_json(json!("Acme"), &["acme"]);
        assert_eq!(reduced, ReducedTree::Value(json!("Acme")));
    }

    #[test]
    fn test_leaf_paths_equal_match_paths() {
        let value = json!({
            "a": [{"b": "foo"}, "x", "FOO"],
            "c": {"d": {"e": "nope", "f": "food"}},
            "g": "bar"
        });
        let tree = DataTree::from_json(&value);
        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["foo"]));
        let reduced = AncestorReducer::new().reduce(&tree, &found, false);

        let match_paths: Vec<_> = found.iter().map(|m| m.path.clone()).collect();
        assert_eq!(reduced.leaf_paths(), match_paths);
    }

    #[test]
    fn test_cyclic_source_reduces_to_finite_tree() {
        let mut tree = DataTree::new();
        let window = tree.add_mapping();
        let app = tree.add_mapping();
        let name = tree.add_string("Acme");
        tree.insert(app, "name", name).unwrap();
        tree.insert(app, "owner", window).unwrap();
        tree.insert(window, "app", app).unwrap();
        tree.insert(window, "self", window).unwrap();
        tree.set_root(window).unwrap();

        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["acme"]));
        let reduced = AncestorReducer::new().reduce(&tree, &found, true);
        assert_eq!(reduced.to_json(), json!({"app": {"name": "Acme"}}));
    }

    #[test]
    fn test_cyclic_mode_drops_paths_reentering_lineage() {
        let mut tree = DataTree::new();
        let window = tree.add_mapping();
        let name = tree.add_string("Acme");
        tree.insert(window, "self", window).unwrap();
        tree.insert(window, "name", name).unwrap();
        tree.set_root(window).unwrap();

        let looping = MatchDescriptor::new(
            vec!["self".into(), "name".into()],
            "acme",
            json!("Acme"),
        );
        let direct = MatchDescriptor::new(vec!["name".into()], "acme", json!("Acme"));

        let reduced = AncestorReducer::new().reduce(&tree, &[looping.clone(), direct.clone()], true);
        assert_eq!(reduced.to_json(), json!({"name": "Acme"}));

        let relaxed = AncestorReducer::new().reduce(&tree, &[looping, direct], false);
        assert_eq!(relaxed.to_json(), json!({"self": {"name": "Acme"}, "name": "Acme"}));
    }

    #[test]
    fn test_unresolvable_paths_are_ignored() {
        let tree = DataTree::from_json(&json!({"a": 1}));
        let stale = MatchDescriptor::new(vec!["b".into(), "c".into()], "x", json!("x"));
        let reduced = AncestorReducer::new().reduce(&tree, &[stale], false);
        assert_eq!(reduced.to_json(), json!({}));
    }

    #[test]
    fn test_idempotent() {
        let tree = DataTree::from_json(&json!({"a": ["foo", {"b": "FOO"}]}));
        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["foo"]));
        let reducer = AncestorReducer::new();
        assert_eq!(reducer.reduce(&tree, &found, false), reducer.reduce(&tree, &found, false));
    }
}
