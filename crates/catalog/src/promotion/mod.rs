//! Promotions: permissive documents tagged with category names.

mod query;
mod service;

use common::DocumentId;
use doc_store::{Document, Fields, ID_FIELD};
use serde::{Serialize, Serializer};
use serde_json::Value;

use crate::error::{CatalogError, Result};

pub use query::{PromotionQuery, parse_or_omit};
pub use service::{PromotionService, PromotionUpdate};

/// Collection holding promotions.
pub const COLLECTION: &str = "promotions";

pub const NAME: &str = "name";
pub const DISCOUNT_PERCENT: &str = "discount_percent";
pub const VALUE: &str = "value";
pub const VALID_UNTIL: &str = "valid_until";
pub const CATEGORIES: &str = "categories";

/// A stored promotion.
///
/// Only `categories` is given a fixed shape. Everything else the caller sent
/// lives in `fields` and is returned as-is; the typed accessors return `None`
/// when a field is absent or holds an unexpected type.
#[derive(Debug, Clone, PartialEq)]
pub struct Promotion {
    pub id: DocumentId,
    pub categories: Vec<String>,
    pub fields: Fields,
    // Whether `categories` was lifted out of the stored body.
    has_categories: bool,
}

impl Promotion {
    /// Reads a promotion out of a stored document.
    ///
    /// A `categories` value that is not a list of strings is left in
    /// `fields` untouched and `categories` comes back empty.
    pub fn from_document(doc: Document) -> Self {
        let Document { id, mut fields } = doc;
        let (categories, has_categories) = match fields.get(CATEGORIES).and_then(string_list) {
            Some(list) => {
                fields.remove(CATEGORIES);
                (list, true)
            }
            None => (Vec::new(), false),
        };
        Self {
            id,
            categories,
            fields,
            has_categories,
        }
    }

    pub fn name(&self) -> Option<&str> {
        self.fields.get(NAME).and_then(Value::as_str)
    }

    pub fn discount_percent(&self) -> Option<f64> {
        self.fields.get(DISCOUNT_PERCENT).and_then(Value::as_f64)
    }

    pub fn value(&self) -> Option<f64> {
        self.fields.get(VALUE).and_then(Value::as_f64)
    }

    /// Expiry date as stored, expected to be `YYYY-MM-DD`.
    pub fn valid_until(&self) -> Option<&str> {
        self.fields.get(VALID_UNTIL).and_then(Value::as_str)
    }

    /// Renders the promotion as a JSON object with the identifier under `_id`.
    ///
    /// A document stored without `categories` is rendered without it.
    pub fn to_value(&self) -> Value {
        let mut map = Fields::with_capacity(self.fields.len() + 2);
        map.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        if self.has_categories {
            map.insert(
                CATEGORIES.to_string(),
                Value::Array(self.categories.iter().cloned().map(Value::String).collect()),
            );
        }
        Value::Object(map)
    }
}

impl Serialize for Promotion {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// A validated promotion body, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct PromotionDraft {
    fields: Fields,
}

impl PromotionDraft {
    /// Validates a body for insertion. A missing `categories` becomes `[]`.
    pub fn for_create(body: Value) -> Result<Self> {
        let mut fields = Self::object(body)?;
        match fields.get(CATEGORIES) {
            None => {
                fields.insert(CATEGORIES.to_string(), Value::Array(Vec::new()));
            }
            Some(value) => check_categories(value)?,
        }
        Ok(Self { fields })
    }

    /// Validates a partial body for a shallow update.
    pub fn for_update(body: Value) -> Result<Self> {
        let fields = Self::object(body)?;
        if let Some(value) = fields.get(CATEGORIES) {
            check_categories(value)?;
        }
        Ok(Self { fields })
    }

    pub fn fields(&self) -> &Fields {
        &self.fields
    }

    pub fn into_fields(self) -> Fields {
        self.fields
    }

    fn object(body: Value) -> Result<Fields> {
        match body {
            Value::Object(mut fields) => {
                fields.remove(ID_FIELD);
                Ok(fields)
            }
            _ => Err(CatalogError::Validation(
                "Request body must be a JSON object".to_string(),
            )),
        }
    }
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    value
        .as_array()?
        .iter()
        .map(|item| item.as_str().map(str::to_string))
        .collect()
}

fn check_categories(value: &Value) -> Result<()> {
    match string_list(value) {
        Some(_) => Ok(()),
        None => Err(CatalogError::Validation(
            "The 'categories' field must be a list of strings".to_string(),
        )),
    }
}
