//! Validation schema definition and parser.
//!
//! Rules are kept as raw `{ "<kind>": params }` objects here; the validation
//! engine resolves them into typed rules through its registries.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};

use super::SchemaSource;

/// Column-level rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub validations: Vec<Value>,
}

/// Worksheet-level rule set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FileSchema {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub validations: Vec<Value>,
    #[serde(default)]
    pub columns: Vec<ColumnSchema>,
}

/// Whole validation schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub files: Vec<FileSchema>,
    /// Submission (media) level rules.
    #[serde(default)]
    pub validations: Vec<Value>,
    /// Cross-worksheet rules.
    #[serde(default)]
    pub workbook_validations: Vec<Value>,
}

/// Typed view over a validation schema.
#[derive(Debug, Clone)]
pub struct ValidationSchemaParser {
    schema: ValidationSchema,
}

impl ValidationSchemaParser {
    pub fn new(source: impl Into<SchemaSource>) -> SchemaResult<Self> {
        Self::from_value(source.into().into_value()?)
    }

    pub fn from_json_str(json: &str) -> SchemaResult<Self> {
        Self::new(json)
    }

    pub fn from_value(raw: Value) -> SchemaResult<Self> {
        if !raw.is_object() {
            return Err(SchemaError::InvalidSection {
                section: "validation".into(),
                message: "schema must be a JSON object".into(),
            });
        }
        let schema = serde_json::from_value(raw).map_err(|e| SchemaError::InvalidSection {
            section: "validation".into(),
            message: e.to_string(),
        })?;
        Ok(Self { schema })
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    pub fn get_submission_validations(&self) -> &[Value] {
        &self.schema.validations
    }

    pub fn get_workbook_validations(&self) -> &[Value] {
        &self.schema.workbook_validations
    }

    pub fn get_file_schema(&self, file_name: &str) -> Option<&FileSchema> {
        self.schema.files.iter().find(|file| file.name == file_name)
    }

    /// File rules for `file_name`; empty when the file is not declared.
    pub fn get_file_validations(&self, file_name: &str) -> &[Value] {
        self.get_file_schema(file_name)
            .map(|file| file.validations.as_slice())
            .unwrap_or_default()
    }

    pub fn get_column_validations(&self, file_name: &str, column_name: &str) -> &[Value] {
        self.get_file_schema(file_name)
            .and_then(|file| file.columns.iter().find(|c| c.name == column_name))
            .map(|column| column.validations.as_slice())
            .unwrap_or_default()
    }

    /// Declared column names of a file, in schema order.
    pub fn get_column_names(&self, file_name: &str) -> Vec<&str> {
        self.get_file_schema(file_name)
            .map(|file| file.columns.iter().map(|c| c.name.as_str()).collect())
            .unwrap_or_default()
    }

    pub fn get_file_names(&self) -> Vec<&str> {
        self.schema.files.iter().map(|f| f.name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parser() -> ValidationSchemaParser {
        ValidationSchemaParser::from_value(json!({
            "name": "Moose SRB",
            "validations": [
                { "mimetype_validator": { "reg_exps": ["text\\/csv"] } }
            ],
            "files": [
                {
                    "name": "Effort",
                    "validations": [
                        { "file_duplicate_columns_validator": {} },
                        { "file_required_columns_validator": { "required_columns": ["Study Area", "Date"] } }
                    ],
                    "columns": [
                        { "name": "Adult Males", "validations": [
                            { "column_numeric_validator": {} },
                            { "column_range_validator": { "min_value": 0, "max_value": 200 } }
                        ] },
                        { "name": "Date" }
                    ]
                }
            ],
            "workbookValidations": [
                { "workbook_parent_child_key_match_validator": {
                    "parent_worksheet_name": "Effort",
                    "child_worksheet_name": "Observations",
                    "column_names": ["Study Area"]
                } }
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_accessors() {
        let p = parser();
        assert_eq!(p.schema().name.as_deref(), Some("Moose SRB"));
        assert_eq!(p.get_submission_validations().len(), 1);
        assert_eq!(p.get_file_names(), vec!["Effort"]);
        assert_eq!(p.get_file_validations("Effort").len(), 2);
        assert_eq!(p.get_column_names("Effort"), vec!["Adult Males", "Date"]);
        assert_eq!(p.get_column_validations("Effort", "Adult Males").len(), 2);
        assert!(p.get_column_validations("Effort", "Date").is_empty());
        assert_eq!(p.get_workbook_validations().len(), 1);
    }

    #[test]
    fn test_unknown_names_are_empty() {
        let p = parser();
        assert!(p.get_file_validations("Observations").is_empty());
        assert!(p.get_column_validations("Observations", "Waypoint").is_empty());
        assert!(p.get_column_names("Observations").is_empty());
    }

    #[test]
    fn test_from_json_string() {
        let p = ValidationSchemaParser::new(r#"{ "files": [{ "name": "Effort" }] }"#).unwrap();
        assert_eq!(p.get_file_names(), vec!["Effort"]);
        assert!(p.get_submission_validations().is_empty());
    }

    #[test]
    fn test_malformed_schema() {
        assert!(matches!(
            ValidationSchemaParser::from_json_str("[1, 2"),
            Err(SchemaError::InvalidJson(_))
        ));
        assert!(matches!(
            ValidationSchemaParser::from_value(json!([])),
            Err(SchemaError::InvalidSection { .. })
        ));
        assert!(matches!(
            ValidationSchemaParser::from_value(json!({ "files": "Effort" })),
            Err(SchemaError::InvalidSection { .. })
        ));
    }
}
