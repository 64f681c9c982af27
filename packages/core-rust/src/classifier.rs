//! Field-type classifier: sampled documents in, one [`FieldTable`] out.
//!
//! Classification never fails. Disagreeing observations for a field collapse
//! to [`TypeLabel::Mixed`], and once mixed a field stays mixed for the rest of
//! the pass.

use std::mem::discriminant;

use crate::schema::{FieldTable, TypeLabel};
use crate::types::{Document, Value};

/// Field name of the store's internal identity, skipped at the top level.
pub const IDENTITY_FIELD: &str = "_id";

/// Infers per-field type labels for one collection's sample.
#[derive(Debug, Clone)]
pub struct FieldTypeClassifier {
    identity_field: String,
}

impl Default for FieldTypeClassifier {
    fn default() -> Self {
        Self::new(IDENTITY_FIELD)
    }
}

impl FieldTypeClassifier {
    #[must_use]
    pub fn new(identity_field: impl Into<String>) -> Self {
        Self {
            identity_field: identity_field.into(),
        }
    }

    /// Classifies every field seen across `samples`.
    ///
    /// Nested documents are labeled `document` and their leaves are added
    /// under dotted paths. Arrays are labeled from their elements and never
    /// recursed into.
    #[must_use]
    pub fn classify(&self, samples: &[Document]) -> FieldTable {
        let mut table = FieldTable::new();
        for doc in samples {
            for (key, value) in doc {
                if *key == self.identity_field {
                    continue;
                }
                observe(&mut table, key.clone(), value);
            }
        }
        table
    }
}

fn observe(table: &mut FieldTable, path: String, value: &Value) {
    record(table, &path, label_of(value));
    if let Value::Map(nested) = value {
        for (key, inner) in nested {
            observe(table, format!("{path}.{key}"), inner);
        }
    }
}

fn record(table: &mut FieldTable, path: &str, label: TypeLabel) {
    match table.get_mut(path) {
        None => {
            table.insert(path.to_string(), label);
        }
        Some(existing) if *existing != label => *existing = TypeLabel::Mixed,
        Some(_) => {}
    }
}

/// Shallow type label of a single value.
#[must_use]
pub fn label_of(value: &Value) -> TypeLabel {
    match value {
        Value::Null => TypeLabel::Null,
        Value::Bool(_) => TypeLabel::Boolean,
        Value::Int(_) => TypeLabel::Integer,
        Value::Float(_) => TypeLabel::Double,
        Value::String(_) => TypeLabel::String,
        Value::Bytes(_) => TypeLabel::Binary,
        Value::Map(_) => TypeLabel::Document,
        Value::ObjectId(_) => TypeLabel::ObjectId,
        Value::Date(_) => TypeLabel::Date,
        Value::Array(items) => array_label(items),
    }
}

fn array_label(items: &[Value]) -> TypeLabel {
    let Some(first) = items.first() else {
        return TypeLabel::Array(None);
    };
    let kind = discriminant(first);
    if !items.iter().all(|v| discriminant(v) == kind) {
        return TypeLabel::array_of(TypeLabel::Mixed);
    }
    match first {
        Value::Map(_) => TypeLabel::array_of(TypeLabel::Document),
        other => TypeLabel::array_of(label_of(other)),
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;
    use crate::types::document_from_json;

    fn docs(values: Vec<serde_json::Value>) -> Vec<Document> {
        values
            .into_iter()
            .map(|v| document_from_json(v).unwrap())
            .collect()
    }

    #[test]
    fn scalar_fields_get_their_type() {
        let table = FieldTypeClassifier::default().classify(&docs(vec![json!({
            "_id": {"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"},
            "fullName": "Ada",
            "age": 36,
            "score": 9.5,
            "active": true,
            "nickname": null,
            "joined": {"$date": 1_700_000_000_000_i64},
        })]));

        assert!(!table.contains_key("_id"));
        assert_eq!(table["fullName"], TypeLabel::String);
        assert_eq!(table["age"], TypeLabel::Integer);
        assert_eq!(table["score"], TypeLabel::Double);
        assert_eq!(table["active"], TypeLabel::Boolean);
        assert_eq!(table["nickname"], TypeLabel::Null);
        assert_eq!(table["joined"], TypeLabel::Date);
    }

    #[test]
    fn arrays_are_labeled_from_elements() {
        let table = FieldTypeClassifier::default().classify(&docs(vec![json!({
            "interests": ["hiking", "chess"],
            "mixedBag": ["a", 1],
            "addresses": [{"city": "Oslo"}],
            "empty": [],
        })]));

        assert_eq!(table["interests"], TypeLabel::array_of(TypeLabel::String));
        assert_eq!(table["mixedBag"], TypeLabel::array_of(TypeLabel::Mixed));
        assert_eq!(table["addresses"], TypeLabel::array_of(TypeLabel::Document));
        assert_eq!(table["empty"], TypeLabel::Array(None));
        assert!(!table.contains_key("addresses.city"));
    }

    #[test]
    fn nested_documents_contribute_dotted_leaves() {
        let table = FieldTypeClassifier::default().classify(&docs(vec![json!({
            "profile": {"city": "Oslo", "geo": {"lat": 59.9}},
        })]));

        assert_eq!(table["profile"], TypeLabel::Document);
        assert_eq!(table["profile.city"], TypeLabel::String);
        assert_eq!(table["profile.geo"], TypeLabel::Document);
        assert_eq!(table["profile.geo.lat"], TypeLabel::Double);
    }

    #[test]
    fn nested_identity_field_is_kept() {
        let table = FieldTypeClassifier::default()
            .classify(&docs(vec![json!({"owner": {"_id": 7}})]));
        assert_eq!(table["owner._id"], TypeLabel::Integer);
    }

    #[test]
    fn disagreement_is_terminal() {
        let table = FieldTypeClassifier::default().classify(&docs(vec![
            json!({"age": 30}),
            json!({"age": "thirty"}),
            json!({"age": 31}),
            json!({"age": 32}),
        ]));
        assert_eq!(table["age"], TypeLabel::Mixed);
    }

    #[test]
    fn first_seen_field_order_is_kept() {
        let table = FieldTypeClassifier::default().classify(&docs(vec![
            json!({"b": 1, "a": 1}),
            json!({"c": 1, "a": 1}),
        ]));
        let keys: Vec<&str> = table.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["b", "a", "c"]);
    }

    #[test]
    fn empty_sample_gives_empty_table() {
        assert!(FieldTypeClassifier::default().classify(&[]).is_empty());
    }

    fn scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            "[a-z]{0,8}".prop_map(Value::String),
            Just(Value::Null),
        ]
    }

    fn one_field(value: Value) -> Document {
        let mut doc = Document::new();
        doc.insert("f".to_string(), value);
        doc
    }

    proptest! {
        #[test]
        fn homogeneous_samples_keep_their_type(values in proptest::collection::vec(any::<i64>(), 1..20)) {
            let samples: Vec<Document> = values.into_iter().map(|v| one_field(Value::Int(v))).collect();
            let table = FieldTypeClassifier::default().classify(&samples);
            prop_assert_eq!(&table["f"], &TypeLabel::Integer);
        }

        #[test]
        fn once_mixed_always_mixed(
            head in proptest::collection::vec(scalar(), 0..10),
            tail in proptest::collection::vec(scalar(), 0..10),
        ) {
            let mut samples: Vec<Document> = head.into_iter().map(one_field).collect();
            samples.push(one_field(Value::Int(1)));
            samples.push(one_field(Value::String("x".to_string())));
            samples.extend(tail.into_iter().map(one_field));
            let table = FieldTypeClassifier::default().classify(&samples);
            prop_assert_eq!(&table["f"], &TypeLabel::Mixed);
        }
    }
}
