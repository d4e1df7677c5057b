//! Document store adapter for the promotion catalog.
//!
//! The catalog never talks to a database directly. It goes through the
//! [`DocumentStore`] trait, which exposes collection-scoped
//! insert/find/update/delete/aggregate primitives keyed by a [`Filter`],
//! an [`Update`] or a [`Pipeline`]. Two backends are provided:
//! - [`InMemoryDocumentStore`] for tests and local runs
//! - [`PostgresDocumentStore`], which keeps every document as a JSONB row

pub mod document;
pub mod error;
pub mod filter;
pub mod memory;
pub mod pipeline;
pub mod postgres;
mod sql;
pub mod store;
pub mod update;

pub use common::DocumentId;
pub use document::{Document, Fields, ID_FIELD};
pub use error::{Result, StoreError};
pub use filter::{Condition, Filter};
pub use memory::InMemoryDocumentStore;
pub use pipeline::{Accumulator, Expr, Pipeline, Stage};
pub use postgres::PostgresDocumentStore;
pub use store::{DocumentStore, DocumentStoreExt, UpdateResult};
pub use update::Update;
