//! Response wire format

pub mod encoder;

use serde::Serialize;

pub use encoder::{DEFAULT_CAPACITY, JsonEncoder, write_bad_request};

/// A scalar reported through `devicestate` and `readall`
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Double(f64),
    Str(String),
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<u32> for FieldValue {
    fn from(v: u32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

/// Named device property, rendered as `{"Name": ..., "Value": ...}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StateItem {
    #[serde(rename = "Name")]
    pub name: &'static str,
    #[serde(rename = "Value")]
    pub value: FieldValue,
}

impl StateItem {
    pub fn new(name: &'static str, value: impl Into<FieldValue>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

impl JsonEncoder<'_> {
    /// Append a state item as its own top-level field
    ///
    /// # Errors
    ///
    /// Returns the sink error if a flush was needed and failed
    pub fn add_field(&mut self, item: &StateItem, comma: bool) -> std::io::Result<usize> {
        match &item.value {
            FieldValue::Bool(v) => self.add_bool(item.name, *v, comma),
            FieldValue::Int(v) => self.add_serialized(item.name, v, comma),
            FieldValue::Double(v) => self.add_f64(item.name, *v, comma),
            FieldValue::Str(v) => self.add_string(item.name, v, comma),
        }
    }
}
