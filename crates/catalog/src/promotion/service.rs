use common::DocumentId;
use doc_store::{DocumentStore, DocumentStoreExt, Filter, Update};
use serde_json::Value;

use super::{COLLECTION, Promotion, PromotionDraft, PromotionQuery};
use crate::error::{CatalogError, Result};

/// Result of a partial promotion update that found its target.
#[derive(Debug, Clone, PartialEq)]
pub enum PromotionUpdate {
    /// At least one field changed. Carries the re-read promotion, which may
    /// be missing if it was deleted in between.
    Updated(Option<Promotion>),
    /// The promotion already held the submitted values.
    Unchanged,
}

/// CRUD over the promotions collection.
pub struct PromotionService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> PromotionService<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Stores a new promotion. Category names are not checked against the
    /// registry.
    #[tracing::instrument(skip(self, body))]
    pub async fn create(&self, body: Value) -> Result<DocumentId> {
        let draft = PromotionDraft::for_create(body)?;
        let id = self.store.insert_one(COLLECTION, draft.into_fields()).await?;

        metrics::counter!("promotions_created_total").increment(1);
        tracing::info!(%id, "promotion created");
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub async fn list(&self, query: &PromotionQuery) -> Result<Vec<Promotion>> {
        let docs = self.store.find_many(COLLECTION, &query.to_filter()).await?;
        Ok(docs.into_iter().map(Promotion::from_document).collect())
    }

    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: DocumentId) -> Result<Promotion> {
        self.store
            .find_by_id(COLLECTION, id)
            .await?
            .map(Promotion::from_document)
            .ok_or_else(|| not_found(id))
    }

    /// Shallow-merges `body` into the promotion.
    #[tracing::instrument(skip(self, body))]
    pub async fn update(&self, id: DocumentId, body: Value) -> Result<PromotionUpdate> {
        let draft = PromotionDraft::for_update(body)?;
        let result = self
            .store
            .update_one(COLLECTION, &Filter::by_id(id), &Update::set(draft.into_fields()))
            .await?;

        if result.modified > 0 {
            tracing::info!(%id, "promotion updated");
            let reread = self.store.find_by_id(COLLECTION, id).await?;
            Ok(PromotionUpdate::Updated(reread.map(Promotion::from_document)))
        } else if result.matched > 0 {
            tracing::debug!(%id, "promotion update changed nothing");
            Ok(PromotionUpdate::Unchanged)
        } else {
            Err(not_found(id))
        }
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: DocumentId) -> Result<()> {
        let deleted = self.store.delete_one(COLLECTION, &Filter::by_id(id)).await?;
        if deleted == 0 {
            return Err(not_found(id));
        }
        metrics::counter!("promotions_deleted_total").increment(1);
        tracing::info!(%id, "promotion deleted");
        Ok(())
    }
}

fn not_found(id: DocumentId) -> CatalogError {
    CatalogError::NotFound {
        kind: "Promotion",
        id: id.to_string(),
    }
}
