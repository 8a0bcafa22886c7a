//! Schema parsers.
//!
//! Both parsers accept either a JSON string or an already-parsed
//! [`serde_json::Value`] through [`SchemaSource`]:
//!
//! - [`transformation::TransformationSchemaParser`] - flatten / transform / parse sections
//! - [`validation::ValidationSchemaParser`] - media, file, column and workbook rules

pub mod transformation;
pub mod validation;

use serde_json::Value;

use crate::error::SchemaResult;

pub use transformation::{
    Condition, ConditionClause, FieldRule, FileStructureSchema, ParentReference, ParseColumn,
    ParseSchema, TransformSchema, Transformation, TransformationSchemaParser,
};
pub use validation::{ColumnSchema, FileSchema, ValidationSchema, ValidationSchemaParser};

/// Raw schema input: JSON text or a parsed value.
#[derive(Debug, Clone)]
pub enum SchemaSource {
    Json(String),
    Value(Value),
}

impl SchemaSource {
    /// Resolve to a JSON value. Text that is not JSON is an error.
    pub fn into_value(self) -> SchemaResult<Value> {
        match self {
            SchemaSource::Json(text) => Ok(serde_json::from_str(&text)?),
            SchemaSource::Value(value) => Ok(value),
        }
    }
}

impl From<&str> for SchemaSource {
    fn from(text: &str) -> Self {
        SchemaSource::Json(text.to_string())
    }
}

impl From<String> for SchemaSource {
    fn from(text: String) -> Self {
        SchemaSource::Json(text)
    }
}

impl From<Value> for SchemaSource {
    fn from(value: Value) -> Self {
        SchemaSource::Value(value)
    }
}

static NO_PARAMS: Value = Value::Null;

/// A single `{ "<kind>": params }` rule object split into its parts. A bare
/// `"<kind>"` string is a rule without parameters.
///
/// Objects with zero or several keys carry no recognizable kind.
pub fn rule_kind(rule: &Value) -> Option<(&str, &Value)> {
    if let Value::String(kind) = rule {
        return Some((kind.as_str(), &NO_PARAMS));
    }
    let object = rule.as_object()?;
    if object.len() != 1 {
        return None;
    }
    object.iter().next().map(|(kind, params)| (kind.as_str(), params))
}
