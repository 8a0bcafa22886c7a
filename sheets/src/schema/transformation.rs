//! Transformation schema definition and parser.
//!
//! A transformation schema has three sections:
//!
//! ```json
//! {
//!   "flatten":         [ { "fileName": "...", "uniqueId": [...], "parent": { ... } } ],
//!   "transformations": [ { "condition": {...}, "transformations": [...], "postTransformations": [...] } ],
//!   "parse":           [ { "fileName": "event", "columns": [ { "source": "...", "target": "..." } ] } ]
//! }
//! ```

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::models::{Cell, Row};

use super::SchemaSource;

// =============================================================================
// Flatten section
// =============================================================================

/// Structure of one worksheet: its composite key and optional parent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileStructureSchema {
    pub file_name: String,
    pub unique_id: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<ParentReference>,
}

/// Reference from a child worksheet to its parent's key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParentReference {
    pub file_name: String,
    pub unique_id: Vec<String>,
}

// =============================================================================
// Transformations section
// =============================================================================

/// Presence gate: met when every listed column is non-blank, or when any is
/// blank if `not` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "if")]
    pub if_: ConditionClause,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConditionClause {
    pub columns: Vec<String>,
    #[serde(default)]
    pub not: bool,
}

impl Condition {
    pub fn columns(columns: &[&str]) -> Self {
        Self {
            if_: ConditionClause {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                not: false,
            },
        }
    }

    pub fn is_met(&self, row: &Row) -> bool {
        let all_present = self
            .if_
            .columns
            .iter()
            .all(|column| row.get(column).is_some_and(|cell| !cell.is_blank()));
        all_present != self.if_.not
    }
}

/// Value rule for a single target field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldRule {
    /// Source columns to join.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,

    /// Join separator for `columns` (default: " ").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separator: Option<String>,

    /// Literal value; takes precedence over `columns`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<Cell>,

    /// Tag making the value unique across the transformed set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
}

impl FieldRule {
    pub fn from_columns(columns: &[&str], separator: &str) -> Self {
        Self {
            columns: Some(columns.iter().map(|c| c.to_string()).collect()),
            separator: Some(separator.to_string()),
            ..Self::default()
        }
    }

    pub fn from_value(value: impl Into<Cell>) -> Self {
        Self {
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_unique(mut self, tag: &str) -> Self {
        self.unique = Some(tag.to_string());
        self
    }

    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = Some(condition);
        self
    }

    pub fn separator(&self) -> &str {
        self.separator.as_deref().unwrap_or(" ")
    }
}

/// One output record template: target field name → rule, in order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Transformation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,
    pub fields: IndexMap<String, FieldRule>,
}

/// A transformation schema applied to every merged row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransformSchema {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub condition: Option<Condition>,

    pub transformations: Vec<Transformation>,

    /// Post steps as `{ "<kind>": params }` objects, resolved through
    /// [`crate::transform::post::lookup_post_transformation`].
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_transformations: Vec<Value>,
}

// =============================================================================
// Parse section
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParseColumn {
    pub source: String,
    pub target: String,
}

/// Projection of transformed records onto one output entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParseSchema {
    pub file_name: String,
    pub columns: Vec<ParseColumn>,
    /// Target fields every projected record must carry.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditional_fields: Vec<String>,
}

impl ParseSchema {
    /// Declared target columns, first occurrence order.
    pub fn target_columns(&self) -> Vec<&str> {
        let mut targets: Vec<&str> = Vec::new();
        for column in &self.columns {
            if !targets.contains(&column.target.as_str()) {
                targets.push(&column.target);
            }
        }
        targets
    }
}

// =============================================================================
// Parser
// =============================================================================

/// Typed view over a transformation schema.
#[derive(Debug, Clone)]
pub struct TransformationSchemaParser {
    raw: Value,
    flatten: Option<Vec<FileStructureSchema>>,
    transformations: Option<Vec<TransformSchema>>,
    parse: Option<Vec<ParseSchema>>,
}

impl TransformationSchemaParser {
    /// Build from a JSON string or an already-parsed value.
    pub fn new(source: impl Into<SchemaSource>) -> SchemaResult<Self> {
        Self::from_value(source.into().into_value()?)
    }

    /// Parse a schema from a JSON string.
    pub fn from_json_str(json: &str) -> SchemaResult<Self> {
        Self::new(json)
    }

    /// Build from a parsed JSON value.
    pub fn from_value(raw: Value) -> SchemaResult<Self> {
        let flatten = section(&raw, "flatten")?;
        let transformations = match section(&raw, "transformations")? {
            Some(t) => Some(t),
            None => section(&raw, "transform")?,
        };
        let parse = section(&raw, "parse")?;

        Ok(Self {
            raw,
            flatten,
            transformations,
            parse,
        })
    }

    pub fn get_flatten_schemas(&self) -> SchemaResult<&[FileStructureSchema]> {
        self.flatten
            .as_deref()
            .ok_or_else(|| SchemaError::MissingSection("flatten".into()))
    }

    /// Structure schema declared for `file_name`, if any.
    pub fn get_flatten_schema(&self, file_name: &str) -> Option<&FileStructureSchema> {
        self.flatten
            .as_deref()?
            .iter()
            .find(|schema| schema.file_name == file_name)
    }

    /// Transformation schemas in declared order. A missing or empty section is
    /// an error: there is nothing to transform with.
    pub fn get_transform_schemas(&self) -> SchemaResult<&[TransformSchema]> {
        match self.transformations.as_deref() {
            Some(schemas) if !schemas.is_empty() => Ok(schemas),
            _ => Err(SchemaError::MissingSection("transformations".into())),
        }
    }

    pub fn get_parse_schemas(&self) -> SchemaResult<&[ParseSchema]> {
        self.parse
            .as_deref()
            .ok_or_else(|| SchemaError::MissingSection("parse".into()))
    }

    /// Raw lookup by JSON pointer, e.g. `/parse/0/fileName`.
    pub fn value_at(&self, pointer: &str) -> Option<&Value> {
        self.raw.pointer(pointer)
    }

    /// All source columns referenced by flatten keys, conditions and field
    /// rules, sorted.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = Vec::new();

        for schema in self.flatten.iter().flatten() {
            columns.extend(schema.unique_id.iter().cloned());
            if let Some(parent) = &schema.parent {
                columns.extend(parent.unique_id.iter().cloned());
            }
        }

        let condition_columns = |c: &Option<Condition>| {
            c.iter().flat_map(|c| c.if_.columns.clone()).collect::<Vec<_>>()
        };
        for schema in self.transformations.iter().flatten() {
            columns.extend(condition_columns(&schema.condition));
            for transformation in &schema.transformations {
                columns.extend(condition_columns(&transformation.condition));
                for rule in transformation.fields.values() {
                    columns.extend(rule.columns.iter().flatten().cloned());
                    columns.extend(condition_columns(&rule.condition));
                }
            }
        }

        // Deduplicate
        columns.sort();
        columns.dedup();
        columns
    }
}

fn section<T: serde::de::DeserializeOwned>(raw: &Value, name: &str) -> SchemaResult<Option<T>> {
    match raw.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(value) => serde_json::from_value(value.clone())
            .map(Some)
            .map_err(|e| SchemaError::InvalidSection {
                section: name.to_string(),
                message: e.to_string(),
            }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema_json() -> Value {
        json!({
            "flatten": [
                { "fileName": "Effort", "uniqueId": ["Survey Area", "Sampling Unit ID", "Stratum"] },
                {
                    "fileName": "Observations",
                    "uniqueId": ["Waypoint"],
                    "parent": { "fileName": "Effort", "uniqueId": ["Survey Area", "Sampling Unit ID", "Stratum"] }
                }
            ],
            "transformations": [
                {
                    "transformations": [
                        { "fields": {
                            "eventID": { "columns": ["Survey Area", "Sampling Unit ID", "Stratum"], "separator": ":" },
                            "basisOfRecord": { "value": "HumanObservation" }
                        } }
                    ]
                }
            ],
            "parse": [
                { "fileName": "event", "columns": [ { "source": "eventID", "target": "eventID" } ] }
            ]
        })
    }

    #[test]
    fn test_parse_sections() {
        let parser = TransformationSchemaParser::from_value(schema_json()).unwrap();

        assert_eq!(parser.get_flatten_schemas().unwrap().len(), 2);
        let obs = parser.get_flatten_schema("Observations").unwrap();
        assert_eq!(obs.parent.as_ref().unwrap().file_name, "Effort");
        assert!(parser.get_flatten_schema("Nope").is_none());

        let transforms = parser.get_transform_schemas().unwrap();
        let fields = &transforms[0].transformations[0].fields;
        let names: Vec<&str> = fields.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["eventID", "basisOfRecord"]);
        assert_eq!(fields["eventID"].separator(), ":");
        assert_eq!(fields["basisOfRecord"].value, Some(Cell::text("HumanObservation")));

        assert_eq!(parser.get_parse_schemas().unwrap()[0].file_name, "event");
    }

    #[test]
    fn test_from_json_string() {
        let json = serde_json::to_string(&schema_json()).unwrap();
        let parser = TransformationSchemaParser::new(json.as_str()).unwrap();
        assert_eq!(
            parser.value_at("/parse/0/fileName"),
            Some(&Value::String("event".into()))
        );
    }

    #[test]
    fn test_invalid_json_fails() {
        let err = TransformationSchemaParser::from_json_str("{ flatten: [").unwrap_err();
        assert!(matches!(err, SchemaError::InvalidJson(_)));
    }

    #[test]
    fn test_missing_sections() {
        let parser = TransformationSchemaParser::from_value(json!({ "transformations": [] })).unwrap();
        assert!(matches!(
            parser.get_transform_schemas(),
            Err(SchemaError::MissingSection(s)) if s == "transformations"
        ));
        assert!(parser.get_flatten_schemas().is_err());
        assert!(parser.get_parse_schemas().is_err());
    }

    #[test]
    fn test_structurally_invalid_section() {
        let err = TransformationSchemaParser::from_value(json!({ "flatten": [{ "fileName": 3 }] }))
            .unwrap_err();
        assert!(matches!(err, SchemaError::InvalidSection { section, .. } if section == "flatten"));
    }

    #[test]
    fn test_condition() {
        let mut row = Row::new();
        row.insert("a".into(), Cell::text("1"));
        row.insert("b".into(), Cell::text(" "));

        assert!(Condition::columns(&["a"]).is_met(&row));
        assert!(!Condition::columns(&["a", "b"]).is_met(&row));
        assert!(!Condition::columns(&["missing"]).is_met(&row));

        let mut negated = Condition::columns(&["b"]);
        negated.if_.not = true;
        assert!(negated.is_met(&row));
    }

    #[test]
    fn test_source_columns() {
        let parser = TransformationSchemaParser::from_value(schema_json()).unwrap();
        assert_eq!(
            parser.source_columns(),
            vec!["Sampling Unit ID", "Stratum", "Survey Area", "Waypoint"]
        );
    }

    #[test]
    fn test_source_columns_include_conditions() {
        let parser = TransformationSchemaParser::from_value(json!({
            "transformations": [{
                "condition": { "if": { "columns": ["Adult Males"] } },
                "transformations": [{ "fields": {
                    "sex": { "value": "male", "condition": { "if": { "columns": ["Sex Known"], "not": true } } }
                } }]
            }]
        }))
        .unwrap();
        assert_eq!(parser.source_columns(), vec!["Adult Males", "Sex Known"]);
    }
}
