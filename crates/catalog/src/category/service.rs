//! Category service: registry writes plus the promotion cascade.

use common::DocumentId;
use doc_store::{DocumentStore, DocumentStoreExt, Fields, Filter, Update};
use serde_json::Value;

use super::{COLLECTION, Category, CategoryName, NAME_FIELD};
use crate::error::{CatalogError, Result};
use crate::promotion;

/// Service owning the category registry.
///
/// Promotions store category *names*, not ids, and the store enforces no
/// reference between the two collections. Renames and deletes therefore
/// run in two phases: the registry write and a sweep over every promotion
/// holding the affected name. The phases are not atomic. A failure between
/// them leaves promotions pointing at a name the registry no longer has.
pub struct CategoryService<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> CategoryService<S> {
    /// Creates a new category service over the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new category and returns it as stored.
    ///
    /// The uniqueness check and the insert are separate store calls, so two
    /// concurrent adds of the same name can both succeed.
    #[tracing::instrument(skip(self))]
    pub async fn add(&self, name: &str) -> Result<Category> {
        let name = CategoryName::parse(name)?;

        if self
            .store
            .exists(COLLECTION, &Filter::new().eq(NAME_FIELD, name.as_str()))
            .await?
        {
            return Err(CatalogError::Conflict(format!(
                "Category '{name}' already exists"
            )));
        }

        let mut fields = Fields::new();
        fields.insert(NAME_FIELD.to_string(), Value::String(name.as_str().to_string()));
        let id = self.store.insert_one(COLLECTION, fields).await?;

        metrics::counter!("categories_created_total").increment(1);
        tracing::info!(%id, %name, "category created");

        self.get(id).await
    }

    /// Lists every category in store order.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self) -> Result<Vec<Category>> {
        self.store
            .find_many(COLLECTION, &Filter::new())
            .await?
            .into_iter()
            .map(Category::from_document)
            .collect()
    }

    /// Loads a single category.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, id: DocumentId) -> Result<Category> {
        let doc = self
            .store
            .find_by_id(COLLECTION, id)
            .await?
            .ok_or_else(|| not_found(id))?;
        Category::from_document(doc)
    }

    /// Renames a category and rewrites every promotion that references it.
    ///
    /// Each occurrence of the old name in a promotion's `categories` list is
    /// replaced in place; order, length and other entries are unchanged.
    /// If the registry write succeeds but the sweep fails, the rename is
    /// still reported successful and the failure is only logged.
    #[tracing::instrument(skip(self))]
    pub async fn rename(&self, id: DocumentId, new_name: &str) -> Result<Category> {
        let new_name = CategoryName::parse(new_name)?;
        let current = self.get(id).await?;
        let changed = current.name != new_name.as_str();

        if changed {
            let taken = Filter::new()
                .eq(NAME_FIELD, new_name.as_str())
                .excluding_id(id);
            if self.store.exists(COLLECTION, &taken).await? {
                return Err(CatalogError::Conflict(format!(
                    "Another category is already named '{new_name}'"
                )));
            }
        }

        // Phase 1: registry.
        let mut fields = Fields::new();
        fields.insert(
            NAME_FIELD.to_string(),
            Value::String(new_name.as_str().to_string()),
        );
        let written = self
            .store
            .update_one(COLLECTION, &Filter::by_id(id), &Update::set(fields))
            .await?;
        if written.matched == 0 {
            return Err(not_found(id));
        }

        // Phase 2: promotions.
        if changed {
            metrics::counter!("categories_renamed_total").increment(1);
            let sweep = self
                .store
                .update_many(
                    promotion::COLLECTION,
                    &Filter::new().array_contains(promotion::CATEGORIES, current.name.as_str()),
                    &Update::replace_in_array(
                        promotion::CATEGORIES,
                        current.name.as_str(),
                        new_name.as_str(),
                    ),
                )
                .await;
            match sweep {
                Ok(result) => {
                    metrics::counter!("category_cascade_promotions_total")
                        .increment(result.modified);
                    tracing::info!(
                        %id,
                        old_name = %current.name,
                        %new_name,
                        promotions_updated = result.modified,
                        "category renamed"
                    );
                }
                Err(err) => {
                    metrics::counter!("category_cascade_failures_total").increment(1);
                    tracing::error!(
                        %id,
                        old_name = %current.name,
                        %new_name,
                        error = %err,
                        "category renamed but promotions still reference the old name"
                    );
                }
            }
        }

        self.get(id).await
    }

    /// Deletes a category after removing its name from every promotion.
    ///
    /// The sweep runs first, so a failed sweep leaves the category in place
    /// and the error is returned. Returns the deleted category.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, id: DocumentId) -> Result<Category> {
        let category = self.get(id).await?;

        let sweep = self
            .store
            .update_many(
                promotion::COLLECTION,
                &Filter::new().array_contains(promotion::CATEGORIES, category.name.as_str()),
                &Update::pull(promotion::CATEGORIES, category.name.as_str()),
            )
            .await?;

        let deleted = self.store.delete_one(COLLECTION, &Filter::by_id(id)).await?;
        if deleted == 0 {
            return Err(not_found(id));
        }

        metrics::counter!("categories_deleted_total").increment(1);
        metrics::counter!("category_cascade_promotions_total").increment(sweep.modified);
        tracing::info!(
            %id,
            name = %category.name,
            promotions_updated = sweep.modified,
            "category deleted"
        );

        Ok(category)
    }
}

fn not_found(id: DocumentId) -> CatalogError {
    CatalogError::NotFound {
        kind: "Category",
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use doc_store::{Document, InMemoryDocumentStore, Pipeline, StoreError, UpdateResult};
    use serde_json::json;

    use super::*;

    fn service() -> CategoryService<InMemoryDocumentStore> {
        CategoryService::new(InMemoryDocumentStore::new())
    }

    /// Delegates to an in-memory store but fails every multi-document update.
    struct SweepFailingStore {
        inner: InMemoryDocumentStore,
    }

    #[async_trait]
    impl DocumentStore for SweepFailingStore {
        async fn insert_one(
            &self,
            collection: &str,
            fields: Fields,
        ) -> doc_store::Result<DocumentId> {
            self.inner.insert_one(collection, fields).await
        }

        async fn find_one(
            &self,
            collection: &str,
            filter: &Filter,
        ) -> doc_store::Result<Option<Document>> {
            self.inner.find_one(collection, filter).await
        }

        async fn find_many(
            &self,
            collection: &str,
            filter: &Filter,
        ) -> doc_store::Result<Vec<Document>> {
            self.inner.find_many(collection, filter).await
        }

        async fn count(&self, collection: &str, filter: &Filter) -> doc_store::Result<u64> {
            self.inner.count(collection, filter).await
        }

        async fn update_one(
            &self,
            collection: &str,
            filter: &Filter,
            update: &Update,
        ) -> doc_store::Result<UpdateResult> {
            self.inner.update_one(collection, filter, update).await
        }

        async fn update_many(
            &self,
            _collection: &str,
            _filter: &Filter,
            _update: &Update,
        ) -> doc_store::Result<UpdateResult> {
            Err(StoreError::InvalidDocument("sweep unavailable".to_string()))
        }

        async fn delete_one(&self, collection: &str, filter: &Filter) -> doc_store::Result<u64> {
            self.inner.delete_one(collection, filter).await
        }

        async fn aggregate(
            &self,
            collection: &str,
            pipeline: &Pipeline,
        ) -> doc_store::Result<Vec<Value>> {
            self.inner.aggregate(collection, pipeline).await
        }
    }

    /// A service whose sweeps fail, plus the in-memory store behind it.
    async fn failing_sweep_with_promotion(
        category: &str,
    ) -> (CategoryService<SweepFailingStore>, InMemoryDocumentStore, Category) {
        let inner = InMemoryDocumentStore::new();
        let service = CategoryService::new(SweepFailingStore {
            inner: inner.clone(),
        });
        let category = service.add(category).await.unwrap();

        let fields = json!({"name": "Dune", "categories": [category.name.as_str()]})
            .as_object()
            .cloned()
            .unwrap();
        inner.insert_one(promotion::COLLECTION, fields).await.unwrap();

        (service, inner, category)
    }

    async fn stored_categories(store: &InMemoryDocumentStore) -> Vec<Value> {
        store
            .find_many(promotion::COLLECTION, &Filter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|doc| doc.fields[promotion::CATEGORIES].clone())
            .collect()
    }

    #[tokio::test]
    async fn add_trims_and_returns_category() {
        let service = service();
        let category = service.add("  Books ").await.unwrap();
        assert_eq!(category.name, "Books");
        assert_eq!(service.get(category.id).await.unwrap(), category);
    }

    #[tokio::test]
    async fn add_rejects_duplicates_case_sensitively() {
        let service = service();
        service.add("Books").await.unwrap();

        assert!(matches!(
            service.add(" Books").await,
            Err(CatalogError::Conflict(_))
        ));
        service.add("books").await.unwrap();
        assert_eq!(service.list().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn rename_to_same_name_is_a_no_op() {
        let service = service();
        let category = service.add("Books").await.unwrap();
        let renamed = service.rename(category.id, " Books ").await.unwrap();
        assert_eq!(renamed, category);
    }

    #[tokio::test]
    async fn rename_unknown_id_is_not_found() {
        let service = service();
        assert!(matches!(
            service.rename(DocumentId::new(), "Books").await,
            Err(CatalogError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn empty_name_is_checked_before_lookup() {
        let service = service();
        assert!(matches!(
            service.rename(DocumentId::new(), "  ").await,
            Err(CatalogError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn delete_unknown_id_is_not_found() {
        let service = service();
        assert!(matches!(
            service.delete(DocumentId::new()).await,
            Err(CatalogError::NotFound { kind: "Category", .. })
        ));
    }

    #[tokio::test]
    async fn rename_survives_failed_promotion_sweep() {
        let (service, inner, category) = failing_sweep_with_promotion("Books").await;

        let renamed = service.rename(category.id, "Novels").await.unwrap();
        assert_eq!(renamed.name, "Novels");
        assert_eq!(service.get(category.id).await.unwrap().name, "Novels");

        // Promotions keep the old name until a later repair.
        assert_eq!(stored_categories(&inner).await, vec![json!(["Books"])]);
    }

    #[tokio::test]
    async fn delete_keeps_category_when_sweep_fails() {
        let (service, inner, category) = failing_sweep_with_promotion("Books").await;

        assert!(matches!(
            service.delete(category.id).await,
            Err(CatalogError::Store(_))
        ));
        assert_eq!(service.list().await.unwrap(), vec![category]);
        assert_eq!(stored_categories(&inner).await, vec![json!(["Books"])]);
    }
}
