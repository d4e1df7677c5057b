use std::collections::HashMap;
use std::str::FromStr;

use doc_store::{Condition, Filter};
use serde_json::Value;

use super::{CATEGORIES, DISCOUNT_PERCENT, NAME, VALID_UNTIL};

/// Parses `raw` after trimming, or yields `None` when it is absent, blank or
/// malformed. Malformed input is not an error.
pub fn parse_or_omit<T: FromStr>(raw: Option<&str>) -> Option<T> {
    raw.map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| s.parse().ok())
}

/// Criteria for listing promotions, built from loosely-typed query parameters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionQuery {
    pub category: Option<String>,
    pub min_discount: Option<i64>,
    pub max_discount: Option<i64>,
    pub valid_until: Option<String>,
    pub search_term: Option<String>,
}

impl PromotionQuery {
    /// Reads the recognised parameters. Blank values count as absent and
    /// unknown keys are ignored.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let text = |key: &str| {
            params
                .get(key)
                .filter(|value| !value.trim().is_empty())
                .cloned()
        };
        Self {
            category: text("category"),
            min_discount: parse_or_omit(params.get("min_discount").map(String::as_str)),
            max_discount: parse_or_omit(params.get("max_discount").map(String::as_str)),
            valid_until: text("valid_until"),
            search_term: text("search_term"),
        }
    }

    /// Translates the criteria into a store filter. All criteria are ANDed;
    /// with none set the filter matches every promotion.
    pub fn to_filter(&self) -> Filter {
        let mut filter = Filter::new();

        if let Some(category) = &self.category {
            filter = filter.array_contains(CATEGORIES, category.as_str());
        }
        if let Some(min) = self.min_discount {
            filter = filter.condition(DISCOUNT_PERCENT, Condition::Gte(Value::from(min)));
        }
        if let Some(max) = self.max_discount {
            filter = filter.condition(DISCOUNT_PERCENT, Condition::Lte(Value::from(max)));
        }
        // Lexical comparison; ISO dates order correctly as strings.
        if let Some(date) = &self.valid_until {
            filter = filter.condition(VALID_UNTIL, Condition::Lte(Value::from(date.as_str())));
        }
        if let Some(term) = &self.search_term {
            filter = filter.condition(
                NAME,
                Condition::ContainsText {
                    needle: term.clone(),
                    case_insensitive: true,
                },
            );
        }

        filter
    }
}
