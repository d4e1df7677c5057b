use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::{PgPoolOptions, PgRow};
use sqlx::{PgPool, Row};
use uuid::Uuid;

use crate::sql::{Scope, SqlBuilder, bind_all, filter_sql, pipeline_sql, update_sql};
use crate::{
    Document, DocumentId, Fields, Filter, Pipeline, Result, StoreError, Update,
    store::{DocumentStore, UpdateResult},
};

/// PostgreSQL-backed document store.
///
/// Every collection shares the `documents` table; a document is one row with
/// its body in a JSONB column. Filters, updates and pipelines are compiled to
/// a single statement each.
#[derive(Clone)]
pub struct PostgresDocumentStore {
    pool: PgPool,
}

impl PostgresDocumentStore {
    /// Creates a new PostgreSQL document store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connects a pool to `database_url` and wraps it.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_document(row: PgRow) -> Result<Document> {
        let id: Uuid = row.try_get("id")?;
        let body: Value = row.try_get("body")?;
        match body {
            Value::Object(fields) => Ok(Document::new(DocumentId::from_uuid(id), fields)),
            other => Err(StoreError::InvalidDocument(format!(
                "document {id} has a non-object body: {other}"
            ))),
        }
    }

    async fn select(
        &self,
        collection: &str,
        filter: &Filter,
        limit_one: bool,
    ) -> Result<Vec<Document>> {
        let mut b = SqlBuilder::new();
        let coll = b.text(collection);
        let predicate = filter_sql(&mut b, Scope::TABLE, filter);
        let limit = if limit_one { " LIMIT 1" } else { "" };
        let sql = format!(
            "SELECT id, body FROM documents WHERE collection = {coll} AND {predicate} ORDER BY seq{limit}"
        );

        let rows = bind_all(sqlx::query(&sql), b.into_binds())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(Self::row_to_document).collect()
    }

    async fn update(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
        limit_one: bool,
    ) -> Result<UpdateResult> {
        let mut b = SqlBuilder::new();
        let coll = b.text(collection);
        let predicate = filter_sql(&mut b, Scope::TABLE, filter);
        let new_body = update_sql(&mut b, "m.body", update);
        let limit = if limit_one { " LIMIT 1" } else { "" };
        let sql = format!(
            r#"
            WITH matched AS (
                SELECT id, body FROM documents
                WHERE collection = {coll} AND {predicate}
                ORDER BY seq{limit}
                FOR UPDATE
            ),
            rewritten AS (
                SELECT m.id, m.body AS old_body, {new_body} AS new_body FROM matched m
            ),
            changed AS (
                UPDATE documents d SET body = r.new_body
                FROM rewritten r
                WHERE d.id = r.id AND r.new_body IS DISTINCT FROM r.old_body
                RETURNING d.id
            )
            SELECT (SELECT COUNT(*) FROM matched) AS matched,
                   (SELECT COUNT(*) FROM changed) AS modified
            "#
        );

        let row = bind_all(sqlx::query(&sql), b.into_binds())
            .fetch_one(&self.pool)
            .await?;
        let matched: i64 = row.try_get("matched")?;
        let modified: i64 = row.try_get("modified")?;
        tracing::debug!(collection, matched, modified, "documents updated");

        Ok(UpdateResult {
            matched: matched as u64,
            modified: modified as u64,
        })
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn insert_one(&self, collection: &str, fields: Fields) -> Result<DocumentId> {
        let id = DocumentId::new();
        let document = Document::new(id, fields);

        sqlx::query(
            r#"
            INSERT INTO documents (id, collection, body)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(id.as_uuid())
        .bind(collection)
        .bind(Value::Object(document.fields))
        .execute(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_one(&self, collection: &str, filter: &Filter) -> Result<Option<Document>> {
        Ok(self.select(collection, filter, true).await?.into_iter().next())
    }

    async fn find_many(&self, collection: &str, filter: &Filter) -> Result<Vec<Document>> {
        self.select(collection, filter, false).await
    }

    async fn count(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut b = SqlBuilder::new();
        let coll = b.text(collection);
        let predicate = filter_sql(&mut b, Scope::TABLE, filter);
        let sql = format!(
            "SELECT COUNT(*) AS total FROM documents WHERE collection = {coll} AND {predicate}"
        );

        let row = bind_all(sqlx::query(&sql), b.into_binds())
            .fetch_one(&self.pool)
            .await?;
        let total: i64 = row.try_get("total")?;
        Ok(total as u64)
    }

    async fn update_one(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.update(collection, filter, update, true).await
    }

    async fn update_many(
        &self,
        collection: &str,
        filter: &Filter,
        update: &Update,
    ) -> Result<UpdateResult> {
        self.update(collection, filter, update, false).await
    }

    async fn delete_one(&self, collection: &str, filter: &Filter) -> Result<u64> {
        let mut b = SqlBuilder::new();
        let coll = b.text(collection);
        let predicate = filter_sql(&mut b, Scope::TABLE, filter);
        let sql = format!(
            r#"
            DELETE FROM documents WHERE id IN (
                SELECT id FROM documents
                WHERE collection = {coll} AND {predicate}
                ORDER BY seq LIMIT 1
            )
            "#
        );

        let result = bind_all(sqlx::query(&sql), b.into_binds())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn aggregate(&self, collection: &str, pipeline: &Pipeline) -> Result<Vec<Value>> {
        let mut b = SqlBuilder::new();
        let sql = pipeline_sql(&mut b, collection, pipeline);
        tracing::debug!(collection, stages = pipeline.stages().len(), "running aggregation");

        let rows = bind_all(sqlx::query(&sql), b.into_binds())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| row.try_get::<Value, _>("body").map_err(StoreError::from))
            .collect()
    }
}

