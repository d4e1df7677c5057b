//! Category registry endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use catalog::{Category, CategoryName};
use doc_store::DocumentStore;
use serde::{Deserialize, Serialize};

use super::{AppState, parse_id};
use crate::error::ApiError;

// -- Request types --

#[derive(Deserialize)]
pub struct CategoryRequest {
    #[serde(default)]
    pub name: String,
}

// -- Response types --

#[derive(Serialize)]
pub struct CategoryResponse {
    pub message: &'static str,
    pub category: Category,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

// -- Handlers --

/// POST /categories: register a new category.
#[tracing::instrument(skip(state, payload))]
pub async fn create<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<CategoryResponse>), ApiError> {
    let Json(req) = payload?;
    let category = state.categories.add(&req.name).await?;

    Ok((
        StatusCode::CREATED,
        Json(CategoryResponse {
            message: "Category added successfully",
            category,
        }),
    ))
}

/// GET /categories: list every category.
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<Json<Vec<Category>>, ApiError> {
    Ok(Json(state.categories.list().await?))
}

/// PUT /categories/:id: rename a category and every promotion using it.
#[tracing::instrument(skip(state, payload))]
pub async fn update<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    payload: Result<Json<CategoryRequest>, JsonRejection>,
) -> Result<Json<CategoryResponse>, ApiError> {
    let Json(req) = payload?;
    // A blank name is reported before a malformed id.
    let name = CategoryName::parse(&req.name)?;
    let id = parse_id(&id, "category")?;
    let category = state.categories.rename(id, name.as_str()).await?;

    Ok(Json(CategoryResponse {
        message: "Category updated successfully",
        category,
    }))
}

/// DELETE /categories/:id: delete a category and untag its promotions.
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "category")?;
    state.categories.delete(id).await?;

    Ok(Json(MessageResponse {
        message: "Category deleted successfully",
    }))
}
