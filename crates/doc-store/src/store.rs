use async_trait::async_trait;
use serde_json::Value;

use crate::{Document, DocumentId, Fields, Filter, Pipeline, Result, Update};

/// Outcome of an update operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpdateResult {
    /// Number of documents selected by the filter.
    pub matched: u64,
    /// Number of documents whose body actually changed.
    pub modified: u64,
}

/// Core trait for document store implementations.
///
/// Every operation is scoped to a named collection. Writes are atomic per
/// document; nothing spans several documents or collections atomically.
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a document and returns its newly assigned identifier.
    ///
    /// Any `_id` field in `fields` is discarded.
    async fn insert_one(&self, collection: &str, fields: Fields) -> Result<DocumentId>;

    /// Returns the first document matching the filter.
    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>>;

    /// Returns every document matching the filter, in store order.
    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>>;

    /// Counts the documents matching the filter.
    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Applies the update to the first document matching the filter.
    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;

    /// Applies the update to every document matching the filter.
    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult>;

    /// Deletes the first document matching the filter. Returns the number deleted.
    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64>;

    /// Runs an aggregation pipeline over the collection in a single request.
    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>>;
}

/// Extension trait providing convenience methods for document stores.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Loads a document by identifier.
    async fn find_by_id(&self, collection: &str, id: DocumentId) -> Result<Option<Document>> {
        self.find_one(collection, &Filter::by_id(id)).await
    }

    /// Checks whether any document matches the filter.
    async fn exists(&self, collection: &str, filter: &Filter) -> Result<bool> {
        Ok(self.find_one(collection, filter).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}
