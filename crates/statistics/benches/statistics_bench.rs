use chrono::NaiveDate;
use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{DocumentStore, Fields, InMemoryDocumentStore};
use serde_json::{Value, json};
use statistics::StatisticsAggregator;

const CATEGORIES: [&str; 5] = ["Books", "Electronics", "Games", "Garden", "Toys"];

/// Populate a store with N promotions spread over a handful of categories.
async fn populate_store(store: &InMemoryDocumentStore, n: usize) {
    for i in 0..n {
        let body = json!({
            "name": format!("Promotion {i}"),
            "value": (i % 500) as f64 + 0.99,
            "discount_percent": (i % 50) as i64,
            "valid_until": if i % 2 == 0 { "2024-01-01" } else { "2030-01-01" },
            "categories": [CATEGORIES[i % 5], CATEGORIES[(i + 2) % 5]],
        });
        let fields: Fields = match body {
            Value::Object(map) => map,
            _ => unreachable!(),
        };
        store.insert_one("promotions", fields).await.unwrap();
    }
}

fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 15).unwrap()
}

fn bench_compute_1000_promotions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    rt.block_on(populate_store(&store, 1000));
    let aggregator = StatisticsAggregator::new(store);

    c.bench_function("statistics/compute_1000_promotions", |b| {
        b.iter(|| rt.block_on(aggregator.compute_at(today())).unwrap());
    });
}

fn bench_histogram_10000_promotions(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    rt.block_on(populate_store(&store, 10_000));
    let aggregator = StatisticsAggregator::new(store);

    c.bench_function("statistics/histogram_10000_promotions", |b| {
        b.iter(|| rt.block_on(aggregator.promotions_by_category()).unwrap());
    });
}

criterion_group!(
    benches,
    bench_compute_1000_promotions,
    bench_histogram_10000_promotions
);
criterion_main!(benches);
