//! Core data models: records, field values, and collection schemas.
//!
//! A [`Record`] is a flat mapping from field name to a scalar or a list of
//! text scalars. Records are produced by a loader and treated as read-only
//! input for one reconciliation pass.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Maximum number of characters kept by [`Record::summary`].
const SUMMARY_MAX_CHARS: usize = 80;

/// A single field value inside a [`Record`].
///
/// Serializes untagged, so a record maps directly onto a JSON object such
/// as `{"question": "...", "tags": ["a", "b"]}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Number(f64),
    Bool(bool),
}

impl FieldValue {
    /// Returns the text content if this is a [`FieldValue::Text`].
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FieldValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(value)
    }
}

impl From<Vec<String>> for FieldValue {
    fn from(value: Vec<String>) -> Self {
        FieldValue::TextList(value)
    }
}

impl From<Vec<&str>> for FieldValue {
    fn from(value: Vec<&str>) -> Self {
        FieldValue::TextList(value.into_iter().map(str::to_string).collect())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Number(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Bool(value)
    }
}

/// A structured record: field name → value.
///
/// Fields are kept in a `BTreeMap` so serialization order is stable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Record {
    fields: BTreeMap<String, FieldValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    ///
    /// ```rust
    /// use qa_sync_core::models::Record;
    ///
    /// let record = Record::new()
    ///     .with("question", "What is X?")
    ///     .with("tags", vec!["a", "b"]);
    /// assert_eq!(record.text("question"), Some("What is X?"));
    /// ```
    pub fn with(mut self, name: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<FieldValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// Returns the field as text, if present and textual.
    pub fn text(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(FieldValue::as_text)
    }

    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }

    /// Short human-readable label for logs and reports.
    ///
    /// Uses the trimmed text of `display_field`, truncated to 80 characters,
    /// or `"<no display value>"` when the field is absent or not text.
    pub fn summary(&self, display_field: &str) -> String {
        match self.text(display_field).map(str::trim) {
            Some(text) if !text.is_empty() => {
                if text.chars().count() > SUMMARY_MAX_CHARS {
                    let truncated: String = text.chars().take(SUMMARY_MAX_CHARS).collect();
                    format!("{}…", truncated)
                } else {
                    text.to_string()
                }
            }
            _ => "<no display value>".to_string(),
        }
    }
}

impl FromIterator<(String, FieldValue)> for Record {
    fn from_iter<I: IntoIterator<Item = (String, FieldValue)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Property data types supported by collection schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DataType {
    #[serde(rename = "text")]
    Text,
    #[serde(rename = "text[]")]
    TextArray,
    #[serde(rename = "number")]
    Number,
    #[serde(rename = "boolean")]
    Boolean,
}

impl DataType {
    /// Wire name used by the store (e.g. `"text[]"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Text => "text",
            DataType::TextArray => "text[]",
            DataType::Number => "number",
            DataType::Boolean => "boolean",
        }
    }
}

/// A named, typed property in a [`Schema`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub data_type: DataType,
}

/// Ordered list of properties shared by all records of a collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    properties: Vec<Property>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn property(mut self, name: impl Into<String>, data_type: DataType) -> Self {
        self.properties.push(Property {
            name: name.into(),
            data_type,
        });
        self
    }

    pub fn properties(&self) -> &[Property] {
        &self.properties
    }
}

/// Everything the engine needs to reconcile one collection.
///
/// `records` is the full desired set, in loader order. When
/// `display_field` is `None`, the identity field is used for log and
/// report summaries.
#[derive(Debug, Clone)]
pub struct DesiredCollection {
    pub name: String,
    pub schema: Schema,
    pub identity_field: String,
    pub display_field: Option<String>,
    pub records: Vec<Record>,
}

impl DesiredCollection {
    pub fn display_field(&self) -> &str {
        self.display_field
            .as_deref()
            .unwrap_or(self.identity_field.as_str())
    }
}
