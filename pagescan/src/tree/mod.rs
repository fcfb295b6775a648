//! Term search over arbitrary nested data.
//!
//! This module provides:
//! - [`DataTree`], an arena of nodes that may reference their ancestors
//! - [`TreeSearcher`], which lists every leaf containing a search term
//! - [`AncestorReducer`], which turns those matches back into a pruned subtree

mod path;
mod reducer;
mod searcher;
mod terms;
mod value;

pub use path::{display_path, MatchDescriptor, PathSegment};
pub use reducer::{AncestorReducer, ReducedTree};
pub use searcher::TreeSearcher;
pub use terms::{SearchTerm, SearchTerms};
pub use value::{DataTree, Node, NodeId, CIRCULAR_MARKER};
