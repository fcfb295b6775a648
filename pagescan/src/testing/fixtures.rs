//! Page fixtures.
//!
//! Every source of the product page mentions the brand "Acme", so a search
//! for `acme` completes every phase with at least one match.

use std::time::Duration;

use super::mocks::ScriptedDriver;
use crate::driver::{DriverEvent, NetworkPayload, ResponseBody};
use crate::errors::TreeError;
use crate::tree::{DataTree, Node};
use crate::utils::now_utc;

/// The initial response body of the product page.
pub const PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head>
    <title>Runner 2 | Acme Outfitters</title>
    <link rel="canonical" href="https://shop.acme.example/p/runner-2">
    <meta name="description" content="Lightweight running shoe">
    <meta property="og:site_name" content="Acme Outfitters">
    <script type="application/ld+json">
        {"@context": "https://schema.org", "@type": "Product", "name": "Runner 2",
         "brand": {"@type": "Brand", "name": "Acme"}, "sku": "R2-001"}
    </script>
</head>
<body>
    <div itemscope itemtype="https://schema.org/Product">
        <h1 itemprop="name">Runner 2</h1>
        <span itemprop="manufacturer">Acme Outfitters</span>
    </div>
    <div id="app">Loading...</div>
</body>
</html>"#;

/// The same page after scripts rendered the product grid.
pub const RENDERED_PRODUCT_PAGE: &str = r#"<!DOCTYPE html>
<html lang="en">
<head><title>Runner 2 | Acme Outfitters</title></head>
<body>
    <div id="app">
        <h1>Runner 2</h1>
        <a class="brand" href="/brands/acme">More from the brand</a>
        <p>Sold by ACME Outfitters.</p>
    </div>
</body>
</html>"#;

/// A `window`-like state that refers back to itself.
///
/// `window.self` and `window.app.owner` point at `window`.
#[must_use]
pub fn cyclic_window_state() -> DataTree {
    build_window_state().unwrap_or_default()
}

fn build_window_state() -> Result<DataTree, TreeError> {
    let mut tree = DataTree::new();
    let window = tree.add_mapping();
    let app = tree.add_mapping();
    let name = tree.add_string("Acme storefront");
    let version = tree.add_json(&serde_json::json!("4.2.0"));
    let handler = tree.add(Node::Function(Some("onAcmeLoad".to_string())));

    tree.insert(app, "name", name)?;
    tree.insert(app, "version", version)?;
    tree.insert(app, "owner", window)?;
    tree.insert(window, "self", window)?;
    tree.insert(window, "app", app)?;
    tree.insert(window, "onload", handler)?;
    tree.set_root(window)?;
    Ok(tree)
}

/// Intercepted API traffic: one JSON match, one markup match, one miss.
#[must_use]
pub fn api_payloads() -> Vec<NetworkPayload> {
    vec![
        NetworkPayload::new(
            "GET",
            "https://api.acme.example/v1/products/r2",
            ResponseBody::Text(r#"{"product": {"id": 2, "vendor": "Acme"}}"#.to_string()),
        ),
        NetworkPayload::new(
            "GET",
            "https://shop.acme.example/fragments/reviews",
            ResponseBody::Text(r#"<ul><li title="acme fan">Great shoe</li></ul>"#.to_string()),
        ),
        NetworkPayload::new(
            "POST",
            "https://metrics.example/collect",
            ResponseBody::Structured(DataTree::from_json(&serde_json::json!({"ok": true}))),
        ),
    ]
}

/// A driver that reports the full product page, pausing briefly between
/// lifecycle steps.
#[must_use]
pub fn full_page_driver() -> ScriptedDriver {
    let pause = Duration::from_millis(2);
    ScriptedDriver::new()
        .then_emit(DriverEvent::Started { timestamp: now_utc() })
        .then_emit(DriverEvent::InitialResponse {
            url: "https://shop.acme.example/p/runner-2".to_string(),
            body: PRODUCT_PAGE.to_string(),
        })
        .then_pause(pause)
        .then_emit(DriverEvent::Navigated { timestamp: now_utc() })
        .then_emit(DriverEvent::NetworkPayloads {
            payloads: api_payloads(),
        })
        .then_emit(DriverEvent::GlobalState {
            tree: cyclic_window_state(),
        })
        .then_pause(pause)
        .then_emit(DriverEvent::FinalMarkup {
            markup: RENDERED_PRODUCT_PAGE.to_string(),
        })
        .then_emit(DriverEvent::Screenshot {
            bytes: vec![0x89, b'P', b'N', b'G'],
        })
        .then_emit(DriverEvent::Done { timestamp: now_utc() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::{SearchTerms, TreeSearcher};

    #[test]
    fn test_cyclic_state_is_searchable() {
        let tree = cyclic_window_state();
        let found = TreeSearcher::new().find(&tree, &SearchTerms::new(["acme"]));
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].display_path(), "app.name");
    }

    #[test]
    fn test_payload_fixture_shape() {
        let payloads = api_payloads();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[2].request_line(), "POST https://metrics.example/collect");
    }
}
