//! Field projection for find results.

use nlq_core::classifier::IDENTITY_FIELD;
use nlq_core::{Document, Value};
use serde_json::{Map, Value as JsonValue};

use crate::error::StoreError;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Mode {
    Include(Vec<String>),
    Exclude(Vec<String>),
}

/// Compiled projection.
///
/// Inclusion and exclusion cannot be mixed, except that the identity field
/// may always be excluded. The identity field is kept unless set to `0`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    mode: Mode,
    keep_identity: bool,
}

fn flag(field: &str, value: &JsonValue) -> Result<bool, StoreError> {
    match value {
        JsonValue::Bool(b) => Ok(*b),
        JsonValue::Number(n) => Ok(n.as_f64().is_some_and(|x| x != 0.0)),
        _ => Err(StoreError::InvalidRequest(format!(
            "projection for {field} must be 0, 1, true or false"
        ))),
    }
}

impl Projection {
    /// # Errors
    ///
    /// Returns [`StoreError::InvalidRequest`] for non-boolean flags or a mix of
    /// inclusions and exclusions.
    pub fn parse(fields: &Map<String, JsonValue>) -> Result<Self, StoreError> {
        let mut keep_identity = true;
        let mut include = Vec::new();
        let mut exclude = Vec::new();
        for (field, value) in fields {
            let on = flag(field, value)?;
            if field == IDENTITY_FIELD {
                keep_identity = on;
            } else if on {
                include.push(field.clone());
            } else {
                exclude.push(field.clone());
            }
        }
        if !include.is_empty() && !exclude.is_empty() {
            return Err(StoreError::InvalidRequest(
                "projection cannot mix inclusion and exclusion".to_string(),
            ));
        }
        let mode = if include.is_empty() {
            Mode::Exclude(exclude)
        } else {
            Mode::Include(include)
        };
        Ok(Self { mode, keep_identity })
    }

    #[must_use]
    pub fn apply(&self, doc: &Document) -> Document {
        match &self.mode {
            Mode::Include(paths) => {
                let mut out = Document::new();
                if self.keep_identity {
                    if let Some(id) = doc.get(IDENTITY_FIELD) {
                        out.insert(IDENTITY_FIELD.to_string(), id.clone());
                    }
                }
                for path in paths {
                    copy_path(doc, &mut out, path);
                }
                out
            }
            Mode::Exclude(paths) => {
                let mut out = doc.clone();
                if !self.keep_identity {
                    out.shift_remove(IDENTITY_FIELD);
                }
                for path in paths {
                    remove_path(&mut out, path);
                }
                out
            }
        }
    }
}

fn copy_path(src: &Document, dst: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            if let Some(value) = src.get(path) {
                dst.insert(path.to_string(), value.clone());
            }
        }
        Some((head, rest)) => {
            let Some(Value::Map(sub)) = src.get(head) else {
                return;
            };
            let slot = dst
                .entry(head.to_string())
                .or_insert_with(|| Value::Map(Document::new()));
            if let Value::Map(nested) = slot {
                copy_path(sub, nested, rest);
            }
        }
    }
}

fn remove_path(doc: &mut Document, path: &str) {
    match path.split_once('.') {
        None => {
            doc.shift_remove(path);
        }
        Some((head, rest)) => {
            if let Some(Value::Map(sub)) = doc.get_mut(head) {
                remove_path(sub, rest);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use nlq_core::types::{document_from_json, document_to_json};
    use serde_json::json;

    use super::*;

    fn projection(fields: JsonValue) -> Result<Projection, StoreError> {
        Projection::parse(fields.as_object().unwrap())
    }

    fn sample() -> Document {
        document_from_json(json!({
            "_id": 1,
            "fullName": "Ada",
            "age": 36,
            "address": {"city": "London", "zip": "N1"},
        }))
        .unwrap()
    }

    #[test]
    fn inclusion_keeps_identity_by_default() {
        let out = projection(json!({"fullName": 1, "address.city": true})).unwrap().apply(&sample());
        assert_eq!(
            document_to_json(&out),
            json!({"_id": 1, "fullName": "Ada", "address": {"city": "London"}})
        );
    }

    #[test]
    fn identity_can_be_dropped() {
        let out = projection(json!({"fullName": 1, "_id": 0})).unwrap().apply(&sample());
        assert_eq!(document_to_json(&out), json!({"fullName": "Ada"}));
    }

    #[test]
    fn exclusion_removes_paths() {
        let out = projection(json!({"age": 0, "address.zip": false})).unwrap().apply(&sample());
        assert_eq!(
            document_to_json(&out),
            json!({"_id": 1, "fullName": "Ada", "address": {"city": "London"}})
        );
    }

    #[test]
    fn mixed_or_malformed_projection_is_rejected() {
        assert!(projection(json!({"age": 0, "fullName": 1})).is_err());
        assert!(projection(json!({"age": "yes"})).is_err());
    }
}
