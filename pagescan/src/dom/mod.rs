//! Term search over parsed markup.
//!
//! Matches are reported by structural locator rather than by node handle, so
//! results outlive the parsed document and serialize cleanly into the record.

mod locator;

use scraper::{ElementRef, Html};
use serde::{Deserialize, Serialize};

use crate::tree::SearchTerms;

pub use locator::locator_for;

/// Which part of an element matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchLocation {
    /// The element's own text nodes.
    Text,
    /// One of the element's attribute values.
    Attribute,
}

/// Where a search term was found in a markup document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomMatchDescriptor {
    /// A CSS selector that selects exactly the matched element.
    pub locator: String,
    /// The element's tag name.
    pub tag: String,
    /// The term that matched, as the caller spelled it.
    pub term: String,
    /// Whether the term was found in text or in an attribute.
    pub matched_in: MatchLocation,
    /// The attribute name for attribute matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attribute_name: Option<String>,
}

/// Searches element text and attribute values of one markup snapshot.
pub struct DomSearcher {
    document: Html,
}

impl DomSearcher {
    /// Wraps an already parsed document.
    #[must_use]
    pub fn new(document: Html) -> Self {
        Self { document }
    }

    /// Parses raw markup as a full document.
    #[must_use]
    pub fn from_html(markup: &str) -> Self {
        Self::new(Html::parse_document(markup))
    }

    /// Returns the parsed document.
    #[must_use]
    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Returns one descriptor per distinct `(element, term, location)` in
    /// document order. For each element the direct text is checked first,
    /// then each attribute value.
    #[must_use]
    pub fn find(&self, terms: &SearchTerms) -> Vec<DomMatchDescriptor> {
        let mut found = Vec::new();
        if terms.is_empty() {
            return found;
        }

        for element in self
            .document
            .root_element()
            .descendants()
            .filter_map(ElementRef::wrap)
        {
            let mut locator = None;
            let tag = element.value().name();

            let text = direct_text(element);
            for term in terms.matching(&text) {
                found.push(DomMatchDescriptor {
                    locator: locator.get_or_insert_with(|| locator_for(element)).clone(),
                    tag: tag.to_string(),
                    term: term.as_str().to_string(),
                    matched_in: MatchLocation::Text,
                    attribute_name: None,
                });
            }

            for (name, value) in element.value().attrs() {
                for term in terms.matching(value) {
                    found.push(DomMatchDescriptor {
                        locator: locator.get_or_insert_with(|| locator_for(element)).clone(),
                        tag: tag.to_string(),
                        term: term.as_str().to_string(),
                        matched_in: MatchLocation::Attribute,
                        attribute_name: Some(name.to_string()),
                    });
                }
            }
        }
        found
    }
}

impl From<Html> for DomSearcher {
    fn from(document: Html) -> Self {
        Self::new(document)
    }
}

impl std::fmt::Debug for DomSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DomSearcher")
            .field("errors", &self.document.errors.len())
            .finish()
    }
}

/// Concatenates the element's own text nodes, ignoring descendants.
fn direct_text(element: ElementRef<'_>) -> String {
    element
        .children()
        .filter_map(|child| child.value().as_text())
        .map(|text| &**text)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use scraper::Selector;

    fn find(markup: &str, terms: &[&str]) -> Vec<DomMatchDescriptor> {
        DomSearcher::from_html(markup).find(&SearchTerms::new(terms.iter().copied()))
    }

    #[test]
    fn test_text_match_in_span() {
        let markup = r#"<div><span class="t">FooBar</span></div>"#;
        let found = find(markup, &["foobar"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "span");
        assert_eq!(found[0].matched_in, MatchLocation::Text);
        assert_eq!(found[0].attribute_name, None);
        assert_eq!(
            found[0].locator,
            "html > body:nth-child(2) > div:nth-child(1) > span:nth-child(1)"
        );
    }

    #[test]
    fn test_locator_selects_matched_element() {
        let markup = r#"
            <ul>
                <li>one</li>
                <li>two</li>
                <li>acme three</li>
            </ul>
        "#;
        let found = find(markup, &["acme"]);
        assert_eq!(found.len(), 1);

        let document = Html::parse_document(markup);
        let selector = Selector::parse(&found[0].locator).unwrap();
        let hits: Vec<_> = document.select(&selector).collect();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text().collect::<String>(), "acme three");
    }

    #[test]
    fn test_attribute_match() {
        let markup = r#"<a href="https://acme.example/shoes" title="Shoes">Buy</a>"#;
        let found = find(markup, &["ACME", "shoes"]);
        let summary: Vec<_> = found
            .iter()
            .map(|m| (m.term.as_str(), m.matched_in, m.attribute_name.as_deref()))
            .collect();
        assert_eq!(
            summary,
            vec![
                ("ACME", MatchLocation::Attribute, Some("href")),
                ("shoes", MatchLocation::Attribute, Some("href")),
                ("shoes", MatchLocation::Attribute, Some("title")),
            ]
        );
    }

    #[test]
    fn test_only_direct_text_counts() {
        let markup = "<section><p>outer <b>acme</b></p></section>";
        let found = find(markup, &["acme"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "b");
    }

    #[test]
    fn test_script_contents_are_searchable() {
        let markup = r#"<script>window.__STATE__ = {"brand": "Acme"}</script>"#;
        let found = find(markup, &["acme"]);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].tag, "script");
    }

    #[test]
    fn test_no_terms_or_no_match() {
        assert!(find("<p>acme</p>", &[]).is_empty());
        assert!(find("<p>acme</p>", &["zzz"]).is_empty());
        assert!(find("", &["acme"]).is_empty());
    }

    #[test]
    fn test_serialized_shape() {
        let found = find(r#"<img alt="Acme logo">"#, &["acme"]);
        let value = serde_json::to_value(&found[0]).unwrap();
        assert_eq!(value["matchedIn"], "attribute");
        assert_eq!(value["attributeName"], "alt");
        assert_eq!(value["tag"], "img");
    }

    #[test]
    fn test_reusable_with_different_snapshots() {
        let terms = SearchTerms::new(["acme"]);
        let initial = DomSearcher::from_html("<p>loading</p>").find(&terms);
        let rendered = DomSearcher::from_html("<p>Acme</p>").find(&terms);
        assert!(initial.is_empty());
        assert_eq!(rendered.len(), 1);
    }
}
