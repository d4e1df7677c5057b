//! Catalog error types.

use common::InvalidDocumentId;
use doc_store::StoreError;
use thiserror::Error;

/// Errors that can occur during catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// Malformed or missing input.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness rule would be violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The identifier does not resolve to a stored document.
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// The document store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl From<InvalidDocumentId> for CatalogError {
    fn from(err: InvalidDocumentId) -> Self {
        CatalogError::Validation(err.to_string())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
