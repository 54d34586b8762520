use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::models::{collections, record_id};

const ARRAY_COLLECTIONS: [&str; 5] = [
    collections::PICKERS,
    collections::USERS,
    collections::BINS,
    collections::PICKUPS,
    collections::POINTS_HISTORY,
];

const OBJECT_COLLECTIONS: [&str; 2] = [collections::PICKER_ROUTES, collections::META];

/// The whole JSON document: one top-level key per collection.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Document {
    root: Map<String, Value>,
}

impl Document {
    pub fn from_value(value: Value) -> Result<Self, StoreError> {
        match value {
            Value::Object(root) => Ok(Self { root }),
            _ => Err(StoreError::NotAnObject),
        }
    }

    /// Adds any of the well-known collections that are missing. Existing
    /// keys are left untouched.
    pub fn with_default_collections(mut self) -> Self {
        for name in ARRAY_COLLECTIONS {
            self.root
                .entry(name)
                .or_insert_with(|| Value::Array(Vec::new()));
        }
        for name in OBJECT_COLLECTIONS {
            self.root
                .entry(name)
                .or_insert_with(|| Value::Object(Map::new()));
        }
        self
    }

    pub fn root(&self) -> &Map<String, Value> {
        &self.root
    }

    pub fn root_mut(&mut self) -> &mut Map<String, Value> {
        &mut self.root
    }

    pub fn to_value(&self) -> Value {
        Value::Object(self.root.clone())
    }

    pub fn collection(&self, name: &str) -> Option<&Vec<Value>> {
        self.root.get(name).and_then(Value::as_array)
    }

    /// Returns the named array, creating it when absent. A non-array value
    /// under the same key is replaced.
    pub fn collection_mut(&mut self, name: &str) -> &mut Vec<Value> {
        let slot = self
            .root
            .entry(name)
            .or_insert_with(|| Value::Array(Vec::new()));
        if !slot.is_array() {
            *slot = Value::Array(Vec::new());
        }
        match slot {
            Value::Array(items) => items,
            _ => unreachable!("slot was just made an array"),
        }
    }

    pub fn object(&self, name: &str) -> Option<&Map<String, Value>> {
        self.root.get(name).and_then(Value::as_object)
    }

    /// Returns the named object, creating it when absent. A non-object value
    /// under the same key is replaced.
    pub fn object_mut(&mut self, name: &str) -> &mut Map<String, Value> {
        let slot = self
            .root
            .entry(name)
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        match slot {
            Value::Object(map) => map,
            _ => unreachable!("slot was just made an object"),
        }
    }

    /// Read view over the named array. A missing key reads as empty.
    pub fn records(&self, name: &str) -> Records<'_> {
        Records {
            items: self.collection(name).map(Vec::as_slice).unwrap_or(&[]),
        }
    }

    pub fn records_mut(&mut self, name: &str) -> RecordsMut<'_> {
        RecordsMut {
            items: self.collection_mut(name),
        }
    }

    /// Highest integer id found in the named array, counting numeric
    /// strings, if any.
    pub fn max_numeric_id(&self, name: &str) -> Option<i64> {
        self.records(name)
            .iter()
            .filter_map(|item| record_id(item.get("id")))
            .max()
    }
}

/// Read-only view over one collection. Records are handed out as stored.
pub struct Records<'a> {
    items: &'a [Value],
}

impl<'a> Records<'a> {
    pub fn iter(&self) -> std::slice::Iter<'a, Value> {
        self.items.iter()
    }

    pub fn all(&self) -> Vec<Value> {
        self.items.to_vec()
    }

    pub fn filter(&self, mut predicate: impl FnMut(&Value) -> bool) -> Vec<Value> {
        self.items
            .iter()
            .filter(|item| predicate(item))
            .cloned()
            .collect()
    }

    pub fn find(&self, id: i64) -> Option<&'a Value> {
        self.items.iter().find(|item| record_id(item.get("id")) == Some(id))
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Mutable view over one collection.
pub struct RecordsMut<'a> {
    items: &'a mut Vec<Value>,
}

impl<'a> RecordsMut<'a> {
    /// The object record with `id`. Non-object entries are never matched.
    pub fn find_mut(self, id: i64) -> Option<&'a mut Map<String, Value>> {
        self.items
            .iter_mut()
            .filter(|item| record_id(item.get("id")) == Some(id))
            .find_map(Value::as_object_mut)
    }

    pub fn push(&mut self, record: Value) {
        self.items.push(record);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn document() -> Document {
        Document::from_value(json!({
            "users": [
                { "id": 1, "totalPoints": 5, "bins": [10], "name": "Amina" },
                { "id": "2", "totalPoints": 0 },
                { "id": 3, "totalPoints": "broken" }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn non_object_root_is_rejected() {
        assert!(matches!(
            Document::from_value(json!([1, 2])),
            Err(StoreError::NotAnObject)
        ));
    }

    #[test]
    fn default_collections_are_added_without_clobbering() {
        let doc = document().with_default_collections();

        assert_eq!(doc.collection("users").map(Vec::len), Some(3));
        assert!(doc.collection("pickups").is_some_and(Vec::is_empty));
        assert!(doc.object("pickerRoutes").is_some());
        assert!(doc.object("meta").is_some());
    }

    #[test]
    fn listing_returns_records_as_stored() {
        let doc = document();
        let users = doc.records("users").all();

        assert_eq!(users.len(), 3);
        assert_eq!(users[2], json!({ "id": 3, "totalPoints": "broken" }));
        assert!(doc.records("missing").is_empty());
    }

    #[test]
    fn string_ids_match_their_numeric_form() {
        let doc = document();
        assert!(doc.records("users").find(2).is_some());
        assert!(doc.records("users").find(9).is_none());
    }

    #[test]
    fn find_mut_edits_in_place() {
        let mut doc = document();

        let user = doc.records_mut("users").find_mut(3).unwrap();
        user.insert("totalPoints".to_string(), json!(10));

        let raw = &doc.collection("users").unwrap()[2];
        assert_eq!(raw, &json!({ "id": 3, "totalPoints": 10 }));
        assert!(doc.records_mut("users").find_mut(99).is_none());
    }

    #[test]
    fn max_numeric_id_counts_numeric_strings() {
        let mut doc = document();
        doc.collection_mut("users").push(json!({ "id": "12" }));
        doc.collection_mut("users").push(json!({ "id": "abc" }));

        assert_eq!(doc.max_numeric_id("users"), Some(12));
        assert_eq!(doc.max_numeric_id("missing"), None);
    }
}
