//! Shared types for the promotion catalog workspace.

pub mod types;

pub use types::{DocumentId, InvalidDocumentId};
