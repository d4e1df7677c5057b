//! Catalog statistics.
//!
//! This crate provides:
//! - [`StatisticsAggregator`], which derives counts, a per-category histogram
//!   and the total discount offered from the promotions collection
//! - [`CatalogStatistics`] and its parts, serialized as the statistics payload

pub mod aggregator;
pub mod error;
pub mod model;

pub use aggregator::StatisticsAggregator;
pub use error::{Result, StatisticsError};
pub use model::{CatalogStatistics, CategoryCount, StatusSplit};
