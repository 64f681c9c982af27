//! Inferred schema model: type labels, field tables, and per-database schemas.
//!
//! A [`Schema`] maps collection names to [`FieldTable`]s. Both layers keep
//! insertion order, which is what "first collection in the schema" means for
//! the lowest-confidence collection fallback.

use std::fmt;
use std::str::FromStr;

use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ---------------------------------------------------------------------------
// TypeLabel
// ---------------------------------------------------------------------------

/// Inferred type of one field, rendered as a short label string.
///
/// `Array(None)` is an array whose element type could not be observed (the
/// sampled arrays were empty) and renders as plain `array`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeLabel {
    String,
    Integer,
    Double,
    Boolean,
    Document,
    Null,
    ObjectId,
    Date,
    Binary,
    Array(Option<Box<TypeLabel>>),
    Mixed,
}

impl TypeLabel {
    /// Shorthand for `array<inner>`.
    #[must_use]
    pub fn array_of(inner: TypeLabel) -> Self {
        Self::Array(Some(Box::new(inner)))
    }

    /// True for `string`.
    #[must_use]
    pub fn is_textual(&self) -> bool {
        matches!(self, Self::String)
    }

    /// True for any array label.
    #[must_use]
    pub fn is_array(&self) -> bool {
        matches!(self, Self::Array(_))
    }

    /// True for `array<string>`.
    #[must_use]
    pub fn is_string_array(&self) -> bool {
        matches!(self, Self::Array(Some(inner)) if inner.is_textual())
    }

    /// True for `integer` and `double`.
    #[must_use]
    pub fn is_numeric(&self) -> bool {
        matches!(self, Self::Integer | Self::Double)
    }
}

impl fmt::Display for TypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::String => f.write_str("string"),
            Self::Integer => f.write_str("integer"),
            Self::Double => f.write_str("double"),
            Self::Boolean => f.write_str("boolean"),
            Self::Document => f.write_str("document"),
            Self::Null => f.write_str("null"),
            Self::ObjectId => f.write_str("objectId"),
            Self::Date => f.write_str("date"),
            Self::Binary => f.write_str("binary"),
            Self::Mixed => f.write_str("mixed"),
            Self::Array(None) => f.write_str("array"),
            Self::Array(Some(inner)) => write!(f, "array<{inner}>"),
        }
    }
}

/// Error returned when a string is not a recognized type label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownTypeLabel(pub String);

impl fmt::Display for UnknownTypeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown type label: {}", self.0)
    }
}

impl std::error::Error for UnknownTypeLabel {}

impl FromStr for TypeLabel {
    type Err = UnknownTypeLabel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let label = match trimmed {
            "string" => Self::String,
            "integer" => Self::Integer,
            "double" => Self::Double,
            "boolean" => Self::Boolean,
            "document" => Self::Document,
            "null" => Self::Null,
            "objectId" => Self::ObjectId,
            "date" => Self::Date,
            "binary" => Self::Binary,
            "mixed" => Self::Mixed,
            "array" => Self::Array(None),
            other => {
                let inner = other
                    .strip_prefix("array<")
                    .and_then(|rest| rest.strip_suffix('>'))
                    .ok_or_else(|| UnknownTypeLabel(trimmed.to_string()))?;
                Self::array_of(inner.parse()?)
            }
        };
        Ok(label)
    }
}

impl Serialize for TypeLabel {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TypeLabel {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Field name (dotted for nested fields) to inferred type label.
pub type FieldTable = IndexMap<String, TypeLabel>;

/// Collection name to field table for one database.
///
/// Immutable once built; translators share it behind an `Arc`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Schema {
    collections: IndexMap<String, FieldTable>,
}

impl Schema {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds or replaces a collection's field table, keeping its original position.
    pub fn insert(&mut self, collection: impl Into<String>, fields: FieldTable) {
        self.collections.insert(collection.into(), fields);
    }

    /// Builder-style variant of [`insert`](Self::insert).
    #[must_use]
    pub fn with_collection(mut self, collection: impl Into<String>, fields: FieldTable) -> Self {
        self.insert(collection, fields);
        self
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.collections.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.collections.len()
    }

    /// Field table of `collection`, if present (exact name).
    #[must_use]
    pub fn fields(&self, collection: &str) -> Option<&FieldTable> {
        self.collections.get(collection)
    }

    /// Collection names in schema order.
    pub fn collection_names(&self) -> impl Iterator<Item = &str> {
        self.collections.keys().map(String::as_str)
    }

    /// `(collection, field table)` pairs in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &FieldTable)> {
        self.collections.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Case-insensitive collection lookup returning the stored spelling.
    #[must_use]
    pub fn find_collection(&self, name: &str) -> Option<&str> {
        self.collections
            .keys()
            .find(|k| k.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }
}

impl FromIterator<(String, FieldTable)> for Schema {
    fn from_iter<I: IntoIterator<Item = (String, FieldTable)>>(iter: I) -> Self {
        Self {
            collections: iter.into_iter().collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inference reports
// ---------------------------------------------------------------------------

/// Result of inferring one collection's schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CollectionSchema {
    pub collection_name: String,
    pub fields: FieldTable,
    /// Number of documents requested (zero when the collection was empty).
    pub sample_size: usize,
    /// Number of documents actually classified.
    pub documents_sampled: usize,
}

impl CollectionSchema {
    /// Report for a collection that produced no sample.
    #[must_use]
    pub fn empty(collection_name: impl Into<String>) -> Self {
        Self {
            collection_name: collection_name.into(),
            fields: FieldTable::new(),
            sample_size: 0,
            documents_sampled: 0,
        }
    }
}

/// Inference report for a whole database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseSchema {
    pub database_name: String,
    pub collections: Vec<CollectionSchema>,
}

impl DatabaseSchema {
    /// Collapses the report into the translator's [`Schema`] form.
    #[must_use]
    pub fn to_schema(&self) -> Schema {
        self.collections
            .iter()
            .map(|c| (c.collection_name.clone(), c.fields.clone()))
            .collect()
    }
}
