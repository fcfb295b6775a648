//! Paths into a data tree and the match descriptors built from them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// One hop from a container to a child.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PathSegment {
    /// Position in a sequence.
    Index(usize),
    /// Key in a mapping.
    Key(String),
}

impl PathSegment {
    /// Creates a key segment.
    #[must_use]
    pub fn key(key: impl Into<String>) -> Self {
        Self::Key(key.into())
    }
}

impl fmt::Display for PathSegment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Index(index) => write!(f, "[{index}]"),
            Self::Key(key) => write!(f, "{key}"),
        }
    }
}

impl From<usize> for PathSegment {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for PathSegment {
    fn from(key: &str) -> Self {
        Self::Key(key.to_string())
    }
}

/// Renders a path as `a.b[0].c`.
#[must_use]
pub fn display_path(path: &[PathSegment]) -> String {
    let mut out = String::new();
    for segment in path {
        match segment {
            PathSegment::Key(key) => {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(key);
            }
            PathSegment::Index(_) => out.push_str(&segment.to_string()),
        }
    }
    out
}

/// Where a search term was found in a data tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchDescriptor {
    /// Keys and indices leading from the root to the matched value.
    pub path: Vec<PathSegment>,
    /// The term that matched, as the caller spelled it.
    pub term: String,
    /// The matched leaf value.
    pub value: serde_json::Value,
}

impl MatchDescriptor {
    /// Creates a new match descriptor.
    #[must_use]
    pub fn new(path: Vec<PathSegment>, term: impl Into<String>, value: serde_json::Value) -> Self {
        Self {
            path,
            term: term.into(),
            value,
        }
    }

    /// Returns the path rendered as `a.b[0].c`.
    #[must_use]
    pub fn display_path(&self) -> String {
        display_path(&self.path)
    }
}
