//! Category registry.

mod service;

use common::DocumentId;
use doc_store::{Document, StoreError};
use serde::{Deserialize, Serialize};

use crate::error::{CatalogError, Result};

pub use service::CategoryService;

/// Collection holding the category registry.
pub const COLLECTION: &str = "categories";

/// Field holding a category's name.
pub const NAME_FIELD: &str = "name";

/// A registered category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    pub name: String,
}

impl Category {
    /// Reads a category out of a stored document.
    pub fn from_document(doc: Document) -> Result<Self> {
        let name = doc
            .get_str(NAME_FIELD)
            .ok_or_else(|| {
                StoreError::InvalidDocument(format!("category {} has no string name", doc.id))
            })?
            .to_string();
        Ok(Self { id: doc.id, name })
    }
}

/// A category name: trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CategoryName(String);

impl CategoryName {
    /// Trims `raw` and rejects it if nothing is left.
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CatalogError::Validation(
                "Category name is required and cannot be empty".to_string(),
            ));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl std::fmt::Display for CategoryName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
