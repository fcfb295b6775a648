//! Benchmarks for tree search, reduction and markup search.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use pagescan::dom::DomSearcher;
use pagescan::testing::{cyclic_window_state, RENDERED_PRODUCT_PAGE};
use pagescan::tree::{AncestorReducer, DataTree, SearchTerms, TreeSearcher};

fn catalog(items: usize) -> DataTree {
    let products: Vec<_> = (0..items)
        .map(|i| {
            serde_json::json!({
                "id": i,
                "name": format!("Product {i}"),
                "brand": {"name": if i % 10 == 0 { "Acme" } else { "Globex" }},
                "tags": ["shoe", "running", format!("sku-{i}")],
            })
        })
        .collect();
    DataTree::from_json(&serde_json::json!({"catalog": {"products": products}}))
}

fn tree_benchmark(c: &mut Criterion) {
    let terms = SearchTerms::new(["acme", "sku-42"]);
    let tree = catalog(1_000);
    let found = TreeSearcher::new().find(&tree, &terms);

    c.bench_function("tree_find_1000", |b| {
        b.iter(|| black_box(TreeSearcher::new().find(black_box(&tree), &terms)));
    });
    c.bench_function("tree_reduce_1000", |b| {
        b.iter(|| black_box(AncestorReducer::new().reduce(black_box(&tree), &found, false)));
    });

    let window = cyclic_window_state();
    c.bench_function("tree_find_cyclic", |b| {
        b.iter(|| black_box(TreeSearcher::new().find(black_box(&window), &terms)));
    });
}

fn dom_benchmark(c: &mut Criterion) {
    let terms = SearchTerms::new(["acme"]);
    c.bench_function("dom_find_rendered_page", |b| {
        b.iter(|| black_box(DomSearcher::from_html(black_box(RENDERED_PRODUCT_PAGE)).find(&terms)));
    });
}

criterion_group!(benches, tree_benchmark, dom_benchmark);
criterion_main!(benches);
