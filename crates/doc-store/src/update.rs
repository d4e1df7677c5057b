use serde_json::Value;

use crate::document::{Fields, ID_FIELD};

/// A single-document modification, applied atomically per document.
#[derive(Debug, Clone, PartialEq)]
pub enum Update {
    /// Replaces (or adds) each top-level field in the map.
    Set(Fields),
    /// Replaces every element equal to `from` in the array `field` with `to`,
    /// keeping positions and all other elements.
    ReplaceInArray {
        field: String,
        from: Value,
        to: Value,
    },
    /// Removes every element equal to `value` from the array `field`.
    PullFromArray { field: String, value: Value },
}

impl Update {
    /// Creates a shallow field replacement. The identifier field is ignored.
    pub fn set(mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Update::Set(fields)
    }

    pub fn replace_in_array(
        field: impl Into<String>,
        from: impl Into<Value>,
        to: impl Into<Value>,
    ) -> Self {
        Update::ReplaceInArray {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn pull(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Update::PullFromArray {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Applies the update in place. Returns true if the document changed.
    pub fn apply(&self, fields: &mut Fields) -> bool {
        match self {
            Update::Set(changes) => {
                let mut changed = false;
                for (key, value) in changes {
                    if key == ID_FIELD {
                        continue;
                    }
                    if fields.get(key) != Some(value) {
                        fields.insert(key.clone(), value.clone());
                        changed = true;
                    }
                }
                changed
            }
            Update::ReplaceInArray { field, from, to } => {
                let Some(Value::Array(items)) = fields.get_mut(field) else {
                    return false;
                };
                let mut changed = false;
                for item in items.iter_mut() {
                    if *item == *from && *item != *to {
                        *item = to.clone();
                        changed = true;
                    }
                }
                changed
            }
            Update::PullFromArray { field, value } => {
                let Some(Value::Array(items)) = fields.get_mut(field) else {
                    return false;
                };
                let before = items.len();
                items.retain(|item| item != value);
                items.len() != before
            }
        }
    }
}
