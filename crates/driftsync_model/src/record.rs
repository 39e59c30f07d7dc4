//! Opaque record payloads.

use crate::error::{ModelError, ModelResult};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An opaque record payload.
///
/// A record is any JSON object carrying a non-empty string `id` field. The
/// engine never interprets the remaining fields - it only needs the id for
/// pending-operation bookkeeping and conflict matching.
///
/// Construction is validating: a [`Record`] that exists always satisfies
/// the id invariant.
///
/// # Example
///
/// ```rust
/// use driftsync_model::Record;
/// use serde_json::json;
///
/// let record = Record::from_value(json!({"id": "w1", "color": "red"})).unwrap();
/// assert_eq!(record.id(), "w1");
/// assert_eq!(record.get("color"), Some(&json!("red")));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Record {
    fields: Map<String, Value>,
}

impl Record {
    /// Builds a record from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::NotAnObject`] if `value` is not an object and
    /// [`ModelError::MissingId`] if it lacks a non-empty string `id`.
    pub fn from_value(value: Value) -> ModelResult<Self> {
        let Value::Object(fields) = value else {
            return Err(ModelError::NotAnObject(type_name(&value).to_owned()));
        };
        Self::from_map(fields)
    }

    /// Builds a record from a JSON object map.
    ///
    /// # Errors
    ///
    /// Returns [`ModelError::MissingId`] if the map lacks a non-empty
    /// string `id`.
    pub fn from_map(fields: Map<String, Value>) -> ModelResult<Self> {
        match fields.get("id") {
            Some(Value::String(id)) if !id.is_empty() => Ok(Self { fields }),
            _ => Err(ModelError::MissingId),
        }
    }

    /// Builds a record from a typed value implementing [`Identifiable`].
    ///
    /// The serialized form must be a JSON object; the id is taken from
    /// [`Identifiable::record_id`] and written into the `id` field,
    /// overriding whatever the serialization produced.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if `value` does not serialize to an
    /// object.
    pub fn from_identifiable<T: Identifiable + Serialize>(value: &T) -> ModelResult<Self> {
        let serialized = serde_json::to_value(value)
            .map_err(|e| ModelError::Conversion(e.to_string()))?;
        let Value::Object(mut fields) = serialized else {
            return Err(ModelError::NotAnObject(type_name(&serialized).to_owned()));
        };
        fields.insert("id".to_owned(), Value::String(value.record_id()));
        Self::from_map(fields)
    }

    /// Deserializes the record into a typed value.
    ///
    /// # Errors
    ///
    /// Returns a conversion error if the fields do not match `T`.
    pub fn to_typed<T: DeserializeOwned>(&self) -> ModelResult<T> {
        serde_json::from_value(Value::Object(self.fields.clone()))
            .map_err(|e| ModelError::Conversion(e.to_string()))
    }

    /// Returns the record id.
    #[must_use]
    pub fn id(&self) -> &str {
        match self.fields.get("id") {
            Some(Value::String(id)) => id,
            // Unreachable: construction validates the id field.
            _ => "",
        }
    }

    /// Returns a field by name.
    #[must_use]
    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Returns the underlying field map.
    #[must_use]
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns a copy of this record with a different id.
    #[must_use]
    pub fn with_id(&self, id: &str) -> Self {
        let mut fields = self.fields.clone();
        fields.insert("id".to_owned(), Value::String(id.to_owned()));
        Self { fields }
    }

    /// Shallow-merges this record over `base`.
    ///
    /// Fields present in `self` take precedence; fields only present in
    /// `base` are kept. Used for the `Merge` conflict resolution where the
    /// local snapshot wins field-by-field.
    #[must_use]
    pub fn merged_over(&self, base: &Record) -> Record {
        let mut fields = base.fields.clone();
        for (key, value) in &self.fields {
            fields.insert(key.clone(), value.clone());
        }
        Record { fields }
    }
}

impl TryFrom<Value> for Record {
    type Error = ModelError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        Self::from_value(value)
    }
}

impl From<Record> for Value {
    fn from(record: Record) -> Self {
        Value::Object(record.fields)
    }
}

/// A typed value that knows its own record id.
///
/// Implement this on application structs to move them through the engine
/// without giving up type safety at the call sites.
///
/// # Example
///
/// ```rust
/// use driftsync_model::{Identifiable, Record};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// struct Workout {
///     id: String,
///     reps: u32,
/// }
///
/// impl Identifiable for Workout {
///     fn record_id(&self) -> String {
///         self.id.clone()
///     }
/// }
///
/// let record = Record::from_identifiable(&Workout {
///     id: "wk_1".into(),
///     reps: 12,
/// })
/// .unwrap();
/// assert_eq!(record.id(), "wk_1");
/// ```
pub trait Identifiable {
    /// Returns the stable record id for this value.
    fn record_id(&self) -> String;
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
