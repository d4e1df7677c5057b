//! Catalog layer for the promotion service.
//!
//! This crate provides:
//! - [`Category`] and [`CategoryService`], which keeps category names
//!   consistent between the category registry and every promotion that
//!   denormalizes them
//! - [`Promotion`] and [`PromotionService`] for permissive promotion CRUD
//! - [`PromotionQuery`], which turns raw query parameters into a store filter

pub mod category;
pub mod error;
pub mod promotion;

pub use category::{Category, CategoryName, CategoryService};
pub use error::{CatalogError, Result};
pub use promotion::{
    Promotion, PromotionDraft, PromotionQuery, PromotionService, PromotionUpdate, parse_or_omit,
};
