//! Document value model.
//!
//! [`Value`] is the runtime value type carried by sampled documents and by
//! literal filter values. It covers every JSON type plus the store-specific
//! scalars a document database hands back (object ids, dates, binary).
//!
//! # Wire format
//!
//! Values serialize to plain JSON. Store-specific scalars use extended JSON
//! wrappers so they survive a round trip:
//!
//! | Variant      | JSON form                  |
//! |--------------|----------------------------|
//! | `ObjectId`   | `{"$oid": "<hex>"}`        |
//! | `Date`       | `{"$date": <epoch millis>}`|
//! | `Bytes`      | `{"$binary": "<base64>"}`  |

use std::fmt;

use base64::Engine;
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value as JsonValue;

/// A document as returned by the store: field name to value, in stored order.
pub type Document = IndexMap<String, Value>;

/// Generic runtime value for document fields.
///
/// Field order inside `Map` is preserved so that "first seen" tie-breaks in
/// schema inference follow the order the store returned.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// JSON null.
    Null,
    /// JSON boolean.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit IEEE 754 float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Binary payload.
    Bytes(Vec<u8>),
    /// Ordered sequence of values.
    Array(Vec<Value>),
    /// Nested document.
    Map(Document),
    /// Store-assigned object identifier (hex string form).
    ObjectId(String),
    /// Timestamp as milliseconds since the Unix epoch.
    Date(i64),
}

impl Value {
    /// Returns the string slice if this is a `String`.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the nested document if this is a `Map`.
    #[must_use]
    pub fn as_map(&self) -> Option<&Document> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Numeric view used for cross-type comparisons (`Int` vs `Float`).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Converts a `serde_json::Value`, decoding extended JSON wrappers.
    #[must_use]
    pub fn from_json(json: JsonValue) -> Self {
        match json {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(b),
            JsonValue::Number(n) => match n.as_i64() {
                Some(i) => Self::Int(i),
                None => Self::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            JsonValue::String(s) => Self::String(s),
            JsonValue::Array(items) => Self::Array(items.into_iter().map(Self::from_json).collect()),
            JsonValue::Object(obj) => {
                if obj.len() == 1 {
                    if let Some(decoded) = decode_extended(&obj) {
                        return decoded;
                    }
                }
                Self::Map(
                    obj.into_iter()
                        .map(|(k, v)| (k, Self::from_json(v)))
                        .collect(),
                )
            }
        }
    }

    /// Converts to a `serde_json::Value`, encoding store scalars as extended JSON.
    ///
    /// Non-finite floats have no JSON representation and become `null`.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::Null => JsonValue::Null,
            Self::Bool(b) => JsonValue::Bool(*b),
            Self::Int(i) => JsonValue::from(*i),
            Self::Float(f) => serde_json::Number::from_f64(*f)
                .map_or(JsonValue::Null, JsonValue::Number),
            Self::String(s) => JsonValue::String(s.clone()),
            Self::Bytes(b) => serde_json::json!({
                "$binary": base64::engine::general_purpose::STANDARD.encode(b)
            }),
            Self::Array(items) => JsonValue::Array(items.iter().map(Self::to_json).collect()),
            Self::Map(m) => JsonValue::Object(
                m.iter().map(|(k, v)| (k.clone(), v.to_json())).collect(),
            ),
            Self::ObjectId(oid) => serde_json::json!({ "$oid": oid }),
            Self::Date(millis) => serde_json::json!({ "$date": millis }),
        }
    }
}

fn decode_extended(obj: &serde_json::Map<String, JsonValue>) -> Option<Value> {
    let (key, inner) = obj.iter().next()?;
    match (key.as_str(), inner) {
        ("$oid", JsonValue::String(s)) => Some(Value::ObjectId(s.clone())),
        ("$date", JsonValue::Number(n)) => n.as_i64().map(Value::Date),
        ("$binary", JsonValue::String(s)) => base64::engine::general_purpose::STANDARD
            .decode(s)
            .ok()
            .map(Value::Bytes),
        _ => None,
    }
}

/// Converts a JSON object into a [`Document`].
///
/// Returns `None` when the JSON value is not an object.
#[must_use]
pub fn document_from_json(json: JsonValue) -> Option<Document> {
    match Value::from_json(json) {
        Value::Map(doc) => Some(doc),
        _ => None,
    }
}

/// Converts a [`Document`] into a JSON object.
#[must_use]
pub fn document_to_json(doc: &Document) -> JsonValue {
    JsonValue::Object(doc.iter().map(|(k, v)| (k.clone(), v.to_json())).collect())
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        JsonValue::deserialize(deserializer).map(Self::from_json)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String(s) | Self::ObjectId(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) => write!(f, "{x}"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Null => f.write_str("null"),
            Self::Date(millis) => write!(f, "{millis}"),
            other => write!(f, "{}", other.to_json()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn from_json_preserves_field_order() {
        let doc = document_from_json(json!({"zeta": 1, "alpha": 2, "mid": 3})).unwrap();
        let keys: Vec<&str> = doc.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
    }

    #[test]
    fn integers_and_floats_are_distinguished() {
        assert_eq!(Value::from_json(json!(42)), Value::Int(42));
        assert_eq!(Value::from_json(json!(4.5)), Value::Float(4.5));
    }

    #[test]
    fn extended_json_scalars_decode() {
        assert_eq!(
            Value::from_json(json!({"$oid": "65a1f0c2e4b0a1b2c3d4e5f6"})),
            Value::ObjectId("65a1f0c2e4b0a1b2c3d4e5f6".to_string())
        );
        assert_eq!(
            Value::from_json(json!({"$date": 1_700_000_000_000_i64})),
            Value::Date(1_700_000_000_000)
        );
        assert_eq!(
            Value::from_json(json!({"$binary": "AQID"})),
            Value::Bytes(vec![1, 2, 3])
        );
    }

    #[test]
    fn lookalike_objects_stay_documents() {
        let value = Value::from_json(json!({"$oid": 12}));
        assert!(matches!(value, Value::Map(_)));

        let value = Value::from_json(json!({"$date": 1, "other": 2}));
        assert!(matches!(value, Value::Map(_)));
    }

    #[test]
    fn to_json_encodes_store_scalars() {
        assert_eq!(
            Value::ObjectId("abc".to_string()).to_json(),
            json!({"$oid": "abc"})
        );
        assert_eq!(Value::Date(5).to_json(), json!({"$date": 5}));
        assert_eq!(Value::Bytes(vec![1, 2, 3]).to_json(), json!({"$binary": "AQID"}));
        assert_eq!(Value::Float(f64::NAN).to_json(), JsonValue::Null);
    }

    #[test]
    fn serde_goes_through_plain_json() {
        let value = Value::Array(vec![Value::from("hiking"), Value::Int(3)]);
        let text = serde_json::to_string(&value).unwrap();
        assert_eq!(text, r#"["hiking",3]"#);
        let back: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(back, value);
    }

    #[test]
    fn display_renders_scalars_bare() {
        assert_eq!(Value::from("hiking").to_string(), "hiking");
        assert_eq!(Value::Int(30).to_string(), "30");
        assert_eq!(Value::Bool(true).to_string(), "true");
    }
}
