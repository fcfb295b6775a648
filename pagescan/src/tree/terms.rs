//! Normalized search terms.

use serde::{Deserialize, Serialize};

/// A single search term with its case-folded form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerm {
    original: String,
    folded: String,
}

impl SearchTerm {
    /// Creates a term; returns `None` for empty text.
    #[must_use]
    pub fn new(term: impl Into<String>) -> Option<Self> {
        let original = term.into();
        if original.is_empty() {
            return None;
        }
        let folded = original.to_lowercase();
        Some(Self { original, folded })
    }

    /// The term as the caller spelled it.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.original
    }

    /// Case-insensitive substring containment against `text`.
    #[must_use]
    pub fn matches(&self, text: &str) -> bool {
        text.to_lowercase().contains(&self.folded)
    }

    /// Like [`SearchTerm::matches`] for text that is already lowercased.
    #[must_use]
    pub fn matches_folded(&self, folded_text: &str) -> bool {
        folded_text.contains(&self.folded)
    }
}

/// The fixed set of terms for one analysis.
///
/// Empty terms are discarded and case-insensitive duplicates are kept once,
/// under their first spelling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchTerms {
    terms: Vec<SearchTerm>,
}

impl SearchTerms {
    /// Creates a term set from any list of strings.
    pub fn new<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut out: Vec<SearchTerm> = Vec::new();
        for term in terms.into_iter().filter_map(SearchTerm::new) {
            if !out.iter().any(|t| t.folded == term.folded) {
                out.push(term);
            }
        }
        Self { terms: out }
    }

    /// Iterates the terms in caller order.
    pub fn iter(&self) -> impl Iterator<Item = &SearchTerm> {
        self.terms.iter()
    }

    /// Returns the terms matching `text`, in caller order.
    pub fn matching<'a>(&'a self, text: &str) -> impl Iterator<Item = &'a SearchTerm> + 'a {
        let folded = text.to_lowercase();
        self.terms.iter().filter(move |t| t.matches_folded(&folded))
    }

    /// Returns the number of terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.terms.len()
    }

    /// Returns true if there are no terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }
}

impl<'a> IntoIterator for &'a SearchTerms {
    type Item = &'a SearchTerm;
    type IntoIter = std::slice::Iter<'a, SearchTerm>;

    fn into_iter(self) -> Self::IntoIter {
        self.terms.iter()
    }
}
