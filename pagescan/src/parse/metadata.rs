//! Head metadata: title, language, canonical URL and `<meta>` tags.

use scraper::Html;

use super::{insert_repeated, selector};
use crate::errors::ParseError;
use crate::tree::DataTree;

const META_KEY_ATTRIBUTES: [&str; 4] = ["name", "property", "itemprop", "http-equiv"];

/// Parses head metadata into a mapping.
///
/// `<meta>` tags are keyed by their `name`, `property`, `itemprop` or
/// `http-equiv` attribute, whichever comes first; tags without a key or a
/// `content` are skipped. Repeated keys collapse into a sequence.
pub fn parse_metadata(markup: &str) -> Result<DataTree, ParseError> {
    let document = Html::parse_document(markup);
    let mut map = serde_json::Map::new();

    if let Some(title) = document.select(&selector("title")?).next() {
        let text = title.text().collect::<String>();
        let text = text.trim();
        if !text.is_empty() {
            map.insert("title".to_string(), text.into());
        }
    }

    if let Some(lang) = document.root_element().value().attr("lang") {
        map.insert("language".to_string(), lang.trim().into());
    }

    if let Some(href) = document
        .select(&selector("link[rel=canonical]")?)
        .find_map(|link| link.value().attr("href"))
    {
        map.insert("canonical".to_string(), href.trim().into());
    }

    for meta in document.select(&selector("meta")?) {
        let element = meta.value();
        let Some(key) = META_KEY_ATTRIBUTES.iter().find_map(|attr| element.attr(attr)) else {
            continue;
        };
        let Some(content) = element.attr("content") else {
            continue;
        };
        insert_repeated(&mut map, key.trim(), content.into());
    }

    Ok(DataTree::from_json(&serde_json::Value::Object(map)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_parse_metadata() {
        let markup = r#"
            <html lang="en">
            <head>
                <title> Acme Shoes </title>
                <link rel="canonical" href="https://acme.example/shoes">
                <meta charset="utf-8">
                <meta name="description" content="Shoes by Acme">
                <meta property="og:image" content="https://acme.example/a.png">
                <meta property="og:image" content="https://acme.example/b.png">
            </head>
            <body></body>
            </html>
        "#;
        let tree = parse_metadata(markup).unwrap();
        assert_eq!(
            tree.to_json(),
            json!({
                "title": "Acme Shoes",
                "language": "en",
                "canonical": "https://acme.example/shoes",
                "description": "Shoes by Acme",
                "og:image": ["https://acme.example/a.png", "https://acme.example/b.png"]
            })
        );
    }

    #[test]
    fn test_empty_document() {
        let tree = parse_metadata("").unwrap();
        assert_eq!(tree.to_json(), json!({}));
    }
}
