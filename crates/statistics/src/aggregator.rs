//! Statistics aggregator.
//!
//! Every figure is computed by the store itself: plain counts for totals and
//! status, aggregation pipelines for the histogram and the discount sum.

use std::time::Instant;

use catalog::promotion::{CATEGORIES, COLLECTION, DISCOUNT_PERCENT, VALID_UNTIL, VALUE};
use chrono::{NaiveDate, Utc};
use doc_store::{Accumulator, Condition, DocumentStore, Expr, Filter, Pipeline};
use serde_json::Value;

use crate::error::Result;
use crate::model::{CatalogStatistics, CategoryCount, StatusSplit};

/// Computes [`CatalogStatistics`] over the promotions collection.
pub struct StatisticsAggregator<S: DocumentStore> {
    store: S,
}

impl<S: DocumentStore> StatisticsAggregator<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Computes statistics with today's UTC date as the expiry reference.
    pub async fn compute(&self) -> Result<CatalogStatistics> {
        self.compute_at(Utc::now().date_naive()).await
    }

    /// Computes statistics with `today` as the expiry reference.
    #[tracing::instrument(skip(self))]
    pub async fn compute_at(&self, today: NaiveDate) -> Result<CatalogStatistics> {
        let started = Instant::now();

        let (total_promotions, promotions_by_category, status, total_discount_offered) = tokio::try_join!(
            self.total_promotions(),
            self.promotions_by_category(),
            self.status_split(today),
            self.total_discount_offered(),
        )?;

        metrics::counter!("statistics_computed_total").increment(1);
        metrics::histogram!("statistics_duration_seconds").record(started.elapsed().as_secs_f64());
        tracing::debug!(total_promotions, "statistics computed");

        Ok(CatalogStatistics {
            total_promotions,
            promotions_by_category,
            active_promotions: status.active,
            expired_promotions: status.expired,
            total_discount_offered,
        })
    }

    pub async fn total_promotions(&self) -> Result<u64> {
        Ok(self.store.count(COLLECTION, &Filter::new()).await?)
    }

    /// Histogram of category names, highest count first.
    ///
    /// Promotions with no categories produce a null bucket during grouping;
    /// it is dropped together with any empty-string name.
    pub async fn promotions_by_category(&self) -> Result<Vec<CategoryCount>> {
        let pipeline = Pipeline::new()
            .unwind(CATEGORIES, true)
            .group(Some(CATEGORIES), vec![("count", Accumulator::Count)])
            .sort("count", true);

        let rows = self.store.aggregate(COLLECTION, &pipeline).await?;
        Ok(rows.iter().filter_map(category_count).collect())
    }

    /// Counts promotions whose `valid_until` is on/after `today` (active) or
    /// before it (expired). Dates compare as `YYYY-MM-DD` strings.
    pub async fn status_split(&self, today: NaiveDate) -> Result<StatusSplit> {
        let today = Value::String(today.format("%Y-%m-%d").to_string());
        let dated = || {
            Filter::new()
                .condition(VALID_UNTIL, Condition::Exists(true))
                .condition(VALID_UNTIL, Condition::Ne(Value::String(String::new())))
        };

        let active = dated().condition(VALID_UNTIL, Condition::Gte(today.clone()));
        let expired = dated().condition(VALID_UNTIL, Condition::Lt(today));

        let (active, expired) = tokio::try_join!(
            self.store.count(COLLECTION, &active),
            self.store.count(COLLECTION, &expired),
        )?;
        Ok(StatusSplit { active, expired })
    }

    /// Sum of `value * discount_percent / 100` over promotions where both
    /// fields are numbers, rounded to two decimals.
    pub async fn total_discount_offered(&self) -> Result<f64> {
        let pipeline = Pipeline::new()
            .project(vec![(
                "discount_amount",
                Expr::if_numeric(
                    &[VALUE, DISCOUNT_PERCENT],
                    Expr::multiply(
                        Expr::field(VALUE),
                        Expr::divide(Expr::field(DISCOUNT_PERCENT), Expr::Number(100.0)),
                    ),
                    Expr::Number(0.0),
                ),
            )])
            .group(
                None,
                vec![(
                    "total_discount",
                    Accumulator::Sum(Expr::field("discount_amount")),
                )],
            );

        let rows = self.store.aggregate(COLLECTION, &pipeline).await?;
        let total = rows
            .first()
            .and_then(|row| row.get("total_discount"))
            .and_then(Value::as_f64)
            .unwrap_or(0.0);
        Ok(round_cents(total))
    }
}

fn category_count(row: &Value) -> Option<CategoryCount> {
    let name = row.get("_id")?.as_str().filter(|name| !name.is_empty())?;
    let count = row.get("count")?.as_u64()?;
    Some(CategoryCount {
        name: name.to_string(),
        count,
    })
}

/// Rounds to two decimals on the exact binary value, as `{:.2}` formatting does.
/// `2.675` is stored just below the half cent and stays `2.67`.
fn round_cents(amount: f64) -> f64 {
    format!("{amount:.2}").parse().unwrap_or(amount)
}
