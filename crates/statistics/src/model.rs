use serde::{Deserialize, Serialize};

/// Number of promotions tagged with one category name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    #[serde(rename = "_id")]
    pub name: String,
    pub count: u64,
}

/// Promotions split by expiry relative to a reference date.
///
/// Promotions without a usable `valid_until` fall in neither bucket, so
/// `active + expired` can be lower than the total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSplit {
    pub active: u64,
    pub expired: u64,
}

/// The statistics payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogStatistics {
    pub total_promotions: u64,
    /// Sorted by count, highest first. Order among equal counts is unspecified.
    pub promotions_by_category: Vec<CategoryCount>,
    pub active_promotions: u64,
    pub expired_promotions: u64,
    /// Sum of `value * discount_percent / 100`, rounded to cents.
    pub total_discount_offered: f64,
}
