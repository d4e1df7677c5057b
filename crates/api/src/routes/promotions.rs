//! Promotion CRUD endpoints.

use std::collections::HashMap;
use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use catalog::{Promotion, PromotionQuery, PromotionUpdate};
use doc_store::DocumentStore;
use serde::Serialize;
use serde_json::Value;

use super::categories::MessageResponse;
use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Response types --

#[derive(Serialize)]
pub struct PromotionCreatedResponse {
    pub message: &'static str,
    pub id: String,
}

#[derive(Serialize)]
pub struct PromotionUpdatedResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promotion: Option<Promotion>,
}

// -- Handlers --

/// GET /promotions: list promotions matching the query parameters.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    params: Result<Query<HashMap<String, String>>, QueryRejection>,
) -> Result<Json<Vec<Promotion>>, ApiError> {
    let Query(params) = params?;
    let query = PromotionQuery::from_params(&params);
    Ok(Json(state.promotions.list(&query).await?))
}

/// POST /promotions: store a new promotion with any extra fields.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<(StatusCode, Json<PromotionCreatedResponse>), ApiError> {
    let Json(body) = payload?;
    let id = state.promotions.create(body).await?;

    Ok((
        StatusCode::CREATED,
        Json(PromotionCreatedResponse {
            message: "Promotion created successfully",
            id: id.to_string(),
        }),
    ))
}

/// GET /promotions/:id: load a single promotion.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Promotion>, ApiError> {
    let id = parse_id(&id, "promotion")?;
    Ok(Json(state.promotions.get(id).await?))
}

/// PUT /promotions/:id: shallow-merge fields into a promotion.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<Value>, JsonRejection>,
) -> Result<Json<PromotionUpdatedResponse>, ApiError> {
    let Json(body) = payload?;
    let id = parse_id(&id, "promotion")?;

    let response = match state.promotions.update(id, body).await? {
        PromotionUpdate::Updated(Some(promotion)) => PromotionUpdatedResponse {
            message: "Promotion updated successfully",
            promotion: Some(promotion),
        },
        PromotionUpdate::Updated(None) => PromotionUpdatedResponse {
            message: "Promotion updated successfully, but the updated data could not be retrieved",
            promotion: None,
        },
        PromotionUpdate::Unchanged => PromotionUpdatedResponse {
            message: "No data was changed in the promotion",
            promotion: None,
        },
    };
    Ok(Json(response))
}

/// DELETE /promotions/:id: delete a promotion.
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "promotion")?;
    state.promotions.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "Promotion deleted successfully",
    }))
}
