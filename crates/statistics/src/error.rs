//! Statistics error types.

use thiserror::Error;

/// Errors that can occur while computing statistics.
#[derive(Debug, Error)]
pub enum StatisticsError {
    /// An error occurred in the document store.
    #[error("Store error: {0}")]
    Store(#[from] doc_store::StoreError),
}

/// Result type for statistics operations.
pub type Result<T> = std::result::Result<T, StatisticsError>;
