use serde_json::{Map, Value};

use crate::DocumentId;

/// Field name under which a document's identifier is exposed.
pub const ID_FIELD: &str = "_id";

/// The open-ended body of a document.
pub type Fields = Map<String, Value>;

/// A stored document: its store-assigned identifier plus its fields.
///
/// The identifier is kept out of `fields`; [`Document::to_value`] merges it
/// back in under [`ID_FIELD`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: DocumentId,
    pub fields: Fields,
}

impl Document {
    pub fn new(id: DocumentId, mut fields: Fields) -> Self {
        fields.remove(ID_FIELD);
        Self { id, fields }
    }

    /// Returns a field value, if present.
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns a field value if it is a string.
    pub fn get_str(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(Value::as_str)
    }

    /// Renders the document as a JSON object with the identifier under `_id`.
    pub fn to_value(&self) -> Value {
        let mut map = Map::with_capacity(self.fields.len() + 1);
        map.insert(ID_FIELD.to_string(), Value::String(self.id.to_string()));
        for (key, value) in &self.fields {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Resolves a top-level field of a JSON object.
pub(crate) fn resolve_field<'a>(doc: &'a Value, field: &str) -> Option<&'a Value> {
    doc.as_object().and_then(|map| map.get(field))
}
