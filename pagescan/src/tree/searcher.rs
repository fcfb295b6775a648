//! Depth-first term search over a [`DataTree`].

use std::collections::HashSet;

use super::path::{MatchDescriptor, PathSegment};
use super::terms::SearchTerms;
use super::value::{DataTree, Node, NodeId};

/// Finds every leaf of a tree whose text contains a search term.
///
/// Mappings are visited in insertion order and sequences in index order.
/// A container that is already on the traversal stack is not entered again,
/// so cyclic trees terminate; a container reached twice through unrelated
/// branches is searched both times.
#[derive(Debug, Clone, Copy, Default)]
pub struct TreeSearcher;

impl TreeSearcher {
    /// Creates a new tree searcher.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Returns one descriptor per matching `(leaf, term)` pair, in traversal
    /// order. Never fails: missing roots and dangling ids yield nothing.
    #[must_use]
    pub fn find(&self, tree: &DataTree, terms: &SearchTerms) -> Vec<MatchDescriptor> {
        let mut found = Vec::new();
        let Some(root) = tree.root() else {
            return found;
        };
        if terms.is_empty() {
            return found;
        }

        let mut in_stack = HashSet::new();
        let mut path = Vec::new();
        visit(tree, root, terms, &mut in_stack, &mut path, &mut found);
        found
    }
}

fn visit(
    tree: &DataTree,
    id: NodeId,
    terms: &SearchTerms,
    in_stack: &mut HashSet<NodeId>,
    path: &mut Vec<PathSegment>,
    found: &mut Vec<MatchDescriptor>,
) {
    let Some(node) = tree.node(id) else {
        return;
    };

    if node.has_children() {
        if !in_stack.insert(id) {
            return;
        }
        match node {
            Node::Mapping(entries) => {
                for (key, child) in entries {
                    path.push(PathSegment::Key(key.clone()));
                    visit(tree, *child, terms, in_stack, path, found);
                    path.pop();
                }
            }
            Node::Sequence(items) => {
                for (index, child) in items.iter().enumerate() {
                    path.push(PathSegment::Index(index));
                    visit(tree, *child, terms, in_stack, path, found);
                    path.pop();
                }
            }
            _ => {}
        }
        in_stack.remove(&id);
        return;
    }

    let Some(text) = node.searchable_text() else {
        return;
    };
    for term in terms.matching(&text) {
        found.push(MatchDescriptor::new(
            path.clone(),
            term.as_str(),
            tree.leaf_value(id),
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn find(value: serde_json::Value, terms: &[&str]) -> Vec<MatchDescriptor> {
        let tree = DataTree::from_json(&value);
        TreeSearcher::new().find(&tree, &SearchTerms::new(terms.iter().copied()))
    }

    #[test]
    fn test_nested_match() {
        let found = find(json!({"a": {"b": "contains FOO here", "c": 1}}), &["foo"]);
        assert_eq!(
            found,
            vec![MatchDescriptor::new(
                vec!["a".into(), "b".into()],
                "foo",
                json!("contains FOO here"),
            )]
        );
    }

    #[test]
    fn test_no_match() {
        assert!(find(json!({"x": [1, {"y": "bar"}]}), &["baz"]).is_empty());
    }

    #[test]
    fn test_empty_inputs() {
        assert!(find(json!({"a": "foo"}), &[]).is_empty());
        assert!(find(json!({}), &["foo"]).is_empty());
        assert!(TreeSearcher::new()
            .find(&DataTree::new(), &SearchTerms::new(["foo"]))
            .is_empty());
    }

    #[test]
    fn test_order_follows_insertion_then_terms() {
        let found = find(
            json!({"z": "red shoe", "a": ["shoe"], "m": {"k": "RED"}}),
            &["shoe", "red"],
        );
        let summary: Vec<_> = found
            .iter()
            .map(|m| (m.display_path(), m.term.clone()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("z".to_string(), "shoe".to_string()),
                ("z".to_string(), "red".to_string()),
                ("a[0]".to_string(), "shoe".to_string()),
                ("m.k".to_string(), "red".to_string()),
            ]
        );
    }

    #[test]
    fn test_scalars_are_stringified() {
        let found = find(json!({"n": 12345, "b": true, "nil": null}), &["234", "TRUE", "null"]);
        let values: Vec<_> = found.iter().map(|m| m.value.clone()).collect();
        assert_eq!(values, vec![json!(12345), json!(true), json!(null)]);
    }

    #[test]
    fn test_root_scalar_match_has_empty_path() {
        let found = find(json!("Acme"), &["acme"]);
        assert_eq!(found.len(), 1);
        assert!(found[0].path.is_empty());
    }

    #[test]
    fn test_empty_containers_are_leaves() {
        let found = find(json!({"list": [], "map": {}}), &["[]", "{}"]);
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value, json!([]));
        assert_eq!(found[1].value, json!({}));
    }

    #[test]
    fn test_self_referencing_tree_terminates() {
        let mut tree = DataTree::new();
        let window = tree.add_mapping();
        let doc = tree.add_mapping();
        let title = tree.add_string("Acme Store");
        tree.insert(doc, "title", title).unwrap();
        tree.insert(doc, "defaultView", window).unwrap();
        tree.insert(window, "document", doc).unwrap();
        tree.insert(window, "window", window).unwrap();
        tree.set_root(window).unwrap();

        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["acme"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_path(), "document.title");
    }

    #[test]
    fn test_shared_node_searched_per_branch() {
        let mut tree = DataTree::new();
        let root = tree.add_mapping();
        let shared = tree.add_string("acme");
        tree.insert(root, "a", shared).unwrap();
        tree.insert(root, "b", shared).unwrap();
        tree.set_root(root).unwrap();

        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["acme"]));
        assert_eq!(found.len(), 2);
    }

    #[test]
    fn test_functions_skipped_without_blocking_siblings() {
        let mut tree = DataTree::new();
        let root = tree.add_mapping();
        let f = tree.add(Node::Function(Some("acmeHandler".to_string())));
        let s = tree.add_string("acme");
        tree.insert(root, "handler", f).unwrap();
        tree.insert(root, "name", s).unwrap();
        tree.set_root(root).unwrap();

        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["acme"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_path(), "name");
    }

    #[test]
    fn test_every_path_resolves_to_matching_value() {
        let value = json!({
            "@graph": [
                {"name": "Acme Shoe", "offers": {"price": 42, "seller": "ACME"}},
                {"name": "Other", "tags": ["acme", "x", {"deep": "acme!"}]}
            ]
        });
        let tree = DataTree::from_json(&value);
        let terms = SearchTerms::new(["acme", "42"]);
        let found = TreeSearcher::new().find(&tree, &terms);
        assert_eq!(found.len(), 5);

        for m in &found {
            let id = tree.resolve(&m.path).expect("path resolves");
            let text = tree.node(id).and_then(Node::searchable_text).unwrap();
            assert!(text.to_lowercase().contains(&m.term.to_lowercase()));
            assert_eq!(tree.leaf_value(id), m.value);
        }
    }

    #[test]
    fn test_idempotent() {
        let tree = DataTree::from_json(&json!({"a": ["foo", {"b": "FOO"}]}));
        let terms = SearchTerms::new(["foo"]);
        let searcher = TreeSearcher::new();
        assert_eq!(searcher.find(&tree, &terms), searcher.find(&tree, &terms));
    }
}
