//! Route handlers and the state they share.

pub mod categories;
pub mod health;
pub mod metrics;
pub mod promotions;
pub mod statistics;

use ::statistics::StatisticsAggregator;
use catalog::{CategoryService, PromotionService};
use common::DocumentId;
use doc_store::DocumentStore;

use crate::error::ApiError;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub categories: CategoryService<S>,
    pub promotions: PromotionService<S>,
    pub statistics: StatisticsAggregator<S>,
}

/// Parses a path identifier, naming `kind` in the error message.
fn parse_id(raw: &str, kind: &str) -> Result<DocumentId, ApiError> {
    DocumentId::parse(raw).map_err(|_| ApiError::BadRequest(format!("Invalid {kind} ID format")))
}
