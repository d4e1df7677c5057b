use std::cmp::Ordering;

use serde_json::Value;

use crate::document::{Document, Fields, ID_FIELD};
use crate::DocumentId;

/// A condition on a single top-level field.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// The field equals this value exactly.
    Eq(Value),
    /// The field is absent or differs from this value.
    Ne(Value),
    /// The field is an array holding at least one element equal to this value.
    ArrayContains(Value),
    /// The field is greater than this value.
    Gt(Value),
    /// The field is greater than or equal to this value.
    Gte(Value),
    /// The field is less than this value.
    Lt(Value),
    /// The field is less than or equal to this value.
    Lte(Value),
    /// The field is a string containing `needle` as a literal substring.
    ContainsText {
        needle: String,
        case_insensitive: bool,
    },
    /// The field is present (`true`) or absent (`false`).
    Exists(bool),
}

/// Builder for document filters.
///
/// All conditions are conjoined. An empty filter matches every document in
/// the collection. Range conditions only match when both sides have the same
/// JSON type: numbers compare numerically, strings compare lexically by byte.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Filter {
    /// Match only the document with this identifier.
    pub id: Option<DocumentId>,

    /// Never match the document with this identifier.
    pub exclude_id: Option<DocumentId>,

    /// Field conditions, all of which must hold.
    pub conditions: Vec<(String, Condition)>,
}

impl Filter {
    /// Creates a filter that matches every document.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter for a single document.
    pub fn by_id(id: DocumentId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }

    /// Adds a condition on `field`.
    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    /// Requires `field` to equal `value`.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Eq(value.into()))
    }

    /// Requires the array in `field` to contain `value`.
    pub fn array_contains(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::ArrayContains(value.into()))
    }

    /// Excludes the document with this identifier.
    pub fn excluding_id(mut self, id: DocumentId) -> Self {
        self.exclude_id = Some(id);
        self
    }

    /// Returns true if this filter places no restriction at all.
    pub fn is_empty(&self) -> bool {
        self.id.is_none() && self.exclude_id.is_none() && self.conditions.is_empty()
    }

    /// Evaluates the filter against a stored document.
    pub fn matches(&self, document: &Document) -> bool {
        self.matches_fields(Some(document.id), &document.fields)
    }

    /// Evaluates the filter against a JSON object carrying its id under `_id`.
    pub(crate) fn matches_value(&self, value: &Value) -> bool {
        let Some(map) = value.as_object() else {
            return false;
        };
        let id = map
            .get(ID_FIELD)
            .and_then(Value::as_str)
            .and_then(|s| DocumentId::parse(s).ok());
        self.matches_fields(id, map)
    }

    fn matches_fields(&self, id: Option<DocumentId>, fields: &Fields) -> bool {
        if let Some(wanted) = self.id
            && id != Some(wanted)
        {
            return false;
        }
        if let Some(excluded) = self.exclude_id
            && id == Some(excluded)
        {
            return false;
        }
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(fields.get(field)))
    }
}

impl Condition {
    /// Evaluates the condition against a field value (`None` when absent).
    pub fn matches(&self, value: Option<&Value>) -> bool {
        match self {
            Condition::Eq(expected) => value == Some(expected),
            Condition::Ne(expected) => value != Some(expected),
            Condition::ArrayContains(expected) => value
                .and_then(Value::as_array)
                .is_some_and(|items| items.contains(expected)),
            Condition::Gt(bound) => compare(value, bound) == Some(Ordering::Greater),
            Condition::Gte(bound) => matches!(
                compare(value, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Condition::Lt(bound) => compare(value, bound) == Some(Ordering::Less),
            Condition::Lte(bound) => {
                matches!(compare(value, bound), Some(Ordering::Less | Ordering::Equal))
            }
            Condition::ContainsText {
                needle,
                case_insensitive,
            } => match value.and_then(Value::as_str) {
                Some(haystack) if *case_insensitive => {
                    haystack.to_lowercase().contains(&needle.to_lowercase())
                }
                Some(haystack) => haystack.contains(needle.as_str()),
                None => false,
            },
            Condition::Exists(expected) => value.is_some() == *expected,
        }
    }
}

/// Orders two JSON values of the same comparable type.
fn compare(value: Option<&Value>, bound: &Value) -> Option<Ordering> {
    match (value?, bound) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => Some(a.as_str().cmp(b.as_str())),
        _ => None,
    }
}
