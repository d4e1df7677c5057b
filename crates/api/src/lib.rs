//! HTTP API server with observability for the promotion catalog.
//!
//! Provides REST endpoints for categories, promotions and statistics,
//! with structured logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use ::statistics::StatisticsAggregator;
use axum::Router;
use axum::http::{Method, header};
use axum::routing::{get, put};
use catalog::{CategoryService, PromotionService};
use doc_store::DocumentStore;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

use config::Config;
use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
    config: &Config,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route(
            "/categories",
            get(routes::categories::list::<S>).post(routes::categories::create::<S>),
        )
        .route(
            "/categories/{id}",
            put(routes::categories::update::<S>)
                .delete(routes::categories::delete::<S>),
        )
        .route(
            "/promotions",
            get(routes::promotions::list::<S>).post(routes::promotions::create::<S>),
        )
        .route(
            "/promotions/{id}",
            get(routes::promotions::get::<S>)
                .put(routes::promotions::update::<S>)
                .delete(routes::promotions::delete::<S>),
        )
        .route("/statistics", get(routes::statistics::get::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(cors_layer(config))
        .layer(TraceLayer::new_for_http())
}

/// CORS for the single configured browser origin, with credentials.
fn cors_layer(config: &Config) -> CorsLayer {
    let origin = match config.cors_origin() {
        Some(origin) => AllowOrigin::exact(origin),
        None => {
            tracing::warn!(
                origin = %config.cors_allowed_origin,
                "invalid CORS origin, cross-origin requests will be refused"
            );
            AllowOrigin::list([])
        }
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Creates the application state: every service over one shared store.
pub fn create_state<S: DocumentStore + Clone + 'static>(store: S) -> Arc<AppState<S>> {
    Arc::new(AppState {
        categories: CategoryService::new(store.clone()),
        promotions: PromotionService::new(store.clone()),
        statistics: StatisticsAggregator::new(store),
    })
}
