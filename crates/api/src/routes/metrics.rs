//! Prometheus metrics endpoint and the catalog's metric descriptions.

use axum::extract::State;
use axum::http::StatusCode;
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for every metric the catalog emits.
pub fn describe() {
    describe_counter!("categories_created_total", "Categories added to the registry");
    describe_counter!("categories_renamed_total", "Category renames that changed the name");
    describe_counter!("categories_deleted_total", "Categories removed from the registry");
    describe_counter!(
        "category_cascade_promotions_total",
        "Promotions rewritten by category rename or delete sweeps"
    );
    describe_counter!(
        "category_cascade_failures_total",
        "Rename sweeps that failed after the registry was updated"
    );
    describe_counter!("promotions_created_total", "Promotions created");
    describe_counter!("promotions_deleted_total", "Promotions deleted");
    describe_counter!("statistics_computed_total", "Statistics payloads computed");
    describe_histogram!(
        "statistics_duration_seconds",
        Unit::Seconds,
        "Time spent computing statistics"
    );
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
