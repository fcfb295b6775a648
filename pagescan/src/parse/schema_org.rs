//! schema.org microdata (`itemscope` / `itemprop`).

use regex::Regex;
use scraper::{ElementRef, Html};
use std::sync::LazyLock;

use super::{insert_repeated, selector};
use crate::errors::ParseError;
use crate::tree::DataTree;

#[allow(clippy::expect_used)]
static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Parses every top-level microdata item into a sequence.
///
/// A top-level item is an `itemscope` element without `itemprop`. Each item
/// becomes a mapping with `@type` (from `itemtype`, when present) followed by
/// its properties in document order. Nested items are parsed recursively and
/// repeated properties collapse into a sequence.
pub fn parse_schema_org(markup: &str) -> Result<DataTree, ParseError> {
    let document = Html::parse_document(markup);
    let items = document
        .select(&selector("[itemscope]")?)
        .filter(|scope| scope.value().attr("itemprop").is_none())
        .map(read_item)
        .collect();

    Ok(DataTree::from_json(&serde_json::Value::Array(items)))
}

fn read_item(scope: ElementRef<'_>) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    if let Some(item_type) = scope.value().attr("itemtype") {
        map.insert("@type".to_string(), item_type.trim().into());
    }

    for node in scope.descendants().skip(1) {
        let Some(element) = ElementRef::wrap(node) else {
            continue;
        };
        let Some(names) = element.value().attr("itemprop") else {
            continue;
        };
        if owning_scope(element).map(|owner| owner.id()) != Some(scope.id()) {
            continue;
        }

        let value = if element.value().attr("itemscope").is_some() {
            read_item(element)
        } else {
            property_value(element)
        };
        for name in names.split_whitespace() {
            insert_repeated(&mut map, name, value.clone());
        }
    }

    serde_json::Value::Object(map)
}

/// The nearest `itemscope` ancestor, excluding the element itself.
fn owning_scope(element: ElementRef<'_>) -> Option<ElementRef<'_>> {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| ancestor.value().attr("itemscope").is_some())
}

fn property_value(element: ElementRef<'_>) -> serde_json::Value {
    let el = element.value();
    let attr = match el.name() {
        "meta" => el.attr("content"),
        "a" | "area" | "link" => el.attr("href"),
        "audio" | "embed" | "iframe" | "img" | "source" | "track" | "video" => el.attr("src"),
        "object" => el.attr("data"),
        "time" => el.attr("datetime"),
        "data" | "meter" => el.attr("value"),
        _ => None,
    };
    let raw = attr
        .or_else(|| el.attr("content"))
        .map_or_else(|| element.text().collect::<String>(), str::to_string);
    WHITESPACE.replace_all(raw.trim(), " ").into_owned().into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_product_with_nested_offer() {
        let markup = r#"
            <div itemscope itemtype="https://schema.org/Product">
                <h1 itemprop="name">Acme
                    Runner</h1>
                <img itemprop="image" src="/runner.png">
                <div itemprop="offers" itemscope itemtype="https://schema.org/Offer">
                    <span itemprop="price" content="42.00">$42</span>
                    <meta itemprop="priceCurrency" content="USD">
                </div>
                <span itemprop="color">red</span>
                <span itemprop="color">blue</span>
            </div>
        "#;
        let tree = parse_schema_org(markup).unwrap();
        assert_eq!(
            tree.to_json(),
            json!([{
                "@type": "https://schema.org/Product",
                "name": "Acme Runner",
                "image": "/runner.png",
                "offers": {
                    "@type": "https://schema.org/Offer",
                    "price": "42.00",
                    "priceCurrency": "USD"
                },
                "color": ["red", "blue"]
            }])
        );
    }

    #[test]
    fn test_multiple_top_level_items() {
        let markup = r#"
            <p itemscope><span itemprop="name">One</span></p>
            <p itemscope><span itemprop="name">Two</span></p>
        "#;
        let tree = parse_schema_org(markup).unwrap();
        assert_eq!(tree.to_json(), json!([{"name": "One"}, {"name": "Two"}]));
    }

    #[test]
    fn test_no_microdata() {
        let tree = parse_schema_org("<p>plain</p>").unwrap();
        assert_eq!(tree.to_json(), json!([]));
    }
}
