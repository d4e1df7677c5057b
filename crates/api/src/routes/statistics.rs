//! Catalog statistics endpoint.

use std::sync::Arc;

use ::statistics::CatalogStatistics;
use axum::Json;
use axum::extract::State;
use doc_store::DocumentStore;

use super::AppState;
use crate::error::ApiError;

/// GET /statistics: counts, category histogram and total discount.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<CatalogStatistics>, ApiError> {
    Ok(Json(state.statistics.compute().await?))
}
