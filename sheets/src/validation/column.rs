//! Column-level rules, checked cell by cell.
//!
//! Blank cells only fail [`ColumnRule::Required`]; every other rule skips
//! them.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaResult;
use crate::models::Cell;

use super::report::ErrorCode;
use super::{compile_patterns, rule_params, RuleParser};

/// One allowed value of a pick list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CodeValue {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ColumnRule {
    Required,
    /// Value must be numeric, and within bounds when given.
    Numeric { min: Option<f64>, max: Option<f64> },
    /// Numeric values must be within bounds; other values are ignored.
    Range { min: Option<f64>, max: Option<f64> },
    Format {
        reg_exps: Vec<Regex>,
        expected_format: Option<String>,
    },
    /// Case-insensitive pick list.
    Code { allowed: Vec<CodeValue> },
}

#[derive(Deserialize)]
struct BoundsParams {
    #[serde(default, alias = "min")]
    min_value: Option<f64>,
    #[serde(default, alias = "max")]
    max_value: Option<f64>,
}

#[derive(Deserialize)]
struct FormatParams {
    reg_exps: Vec<String>,
    #[serde(default)]
    expected_format: Option<String>,
}

#[derive(Deserialize)]
struct CodeParams {
    allowed_code_values: Vec<CodeValue>,
}

static COLUMN_RULES: &[(&str, RuleParser<ColumnRule>)] = &[
    ("column_required_validator", parse_required),
    ("column_numeric_validator", parse_numeric),
    ("column_range_validator", parse_range),
    ("column_format_validator", parse_format),
    ("column_code_validator", parse_code),
];

fn parse_required(_params: &Value) -> SchemaResult<ColumnRule> {
    Ok(ColumnRule::Required)
}

fn parse_numeric(params: &Value) -> SchemaResult<ColumnRule> {
    let p: BoundsParams = rule_params("column_numeric_validator", params)?;
    Ok(ColumnRule::Numeric {
        min: p.min_value,
        max: p.max_value,
    })
}

fn parse_range(params: &Value) -> SchemaResult<ColumnRule> {
    let p: BoundsParams = rule_params("column_range_validator", params)?;
    Ok(ColumnRule::Range {
        min: p.min_value,
        max: p.max_value,
    })
}

fn parse_format(params: &Value) -> SchemaResult<ColumnRule> {
    let kind = "column_format_validator";
    let p: FormatParams = rule_params(kind, params)?;
    Ok(ColumnRule::Format {
        reg_exps: compile_patterns(kind, &p.reg_exps)?,
        expected_format: p.expected_format,
    })
}

fn parse_code(params: &Value) -> SchemaResult<ColumnRule> {
    let p: CodeParams = rule_params("column_code_validator", params)?;
    Ok(ColumnRule::Code {
        allowed: p.allowed_code_values,
    })
}

pub fn lookup_column_rule(kind: &str) -> Option<RuleParser<ColumnRule>> {
    COLUMN_RULES
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, parser)| *parser)
}

impl ColumnRule {
    /// Check one cell. Returns the error code and message on failure.
    pub fn check(&self, cell: &Cell) -> Option<(ErrorCode, String)> {
        if cell.is_blank() {
            return matches!(self, ColumnRule::Required)
                .then(|| (ErrorCode::MissingRequiredField, "Missing required value".to_string()));
        }
        let text = cell.as_text().unwrap_or_default();

        match self {
            ColumnRule::Required => None,
            ColumnRule::Numeric { min, max } => match cell.as_f64() {
                Some(n) => check_bounds(n, *min, *max),
                None => Some((ErrorCode::InvalidValue, format!("Value '{text}' is not a number"))),
            },
            ColumnRule::Range { min, max } => {
                cell.as_f64().and_then(|n| check_bounds(n, *min, *max))
            }
            ColumnRule::Format { reg_exps, expected_format } => {
                if reg_exps.iter().any(|re| re.is_match(&text)) {
                    None
                } else {
                    let expected = expected_format
                        .as_deref()
                        .map(|f| format!(", expected {f}"))
                        .unwrap_or_default();
                    Some((
                        ErrorCode::UnexpectedFormat,
                        format!("Value '{text}' has an unexpected format{expected}"),
                    ))
                }
            }
            ColumnRule::Code { allowed } => {
                let needle = text.trim().to_lowercase();
                if allowed.iter().any(|code| code.name.trim().to_lowercase() == needle) {
                    None
                } else {
                    let names: Vec<&str> = allowed.iter().map(|c| c.name.as_str()).collect();
                    Some((
                        ErrorCode::InvalidValue,
                        format!("Value '{text}' is not one of: {}", names.join(", ")),
                    ))
                }
            }
        }
    }
}

fn check_bounds(n: f64, min: Option<f64>, max: Option<f64>) -> Option<(ErrorCode, String)> {
    if let Some(min) = min.filter(|min| n < *min) {
        return Some((ErrorCode::OutOfRange, format!("Value {n} is below the minimum of {min}")));
    }
    if let Some(max) = max.filter(|max| n > *max) {
        return Some((ErrorCode::OutOfRange, format!("Value {n} is above the maximum of {max}")));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rule(kind: &str, params: Value) -> ColumnRule {
        lookup_column_rule(kind).unwrap()(&params).unwrap()
    }

    #[test]
    fn test_numeric_range_scenario() {
        let numeric = rule("column_numeric_validator", json!({ "min_value": 0, "max_value": 200 }));

        let (code, _) = numeric.check(&Cell::text("-10")).unwrap();
        assert_eq!(code, ErrorCode::OutOfRange);
        assert!(numeric.check(&Cell::text("150")).is_none());
        assert!(numeric.check(&Cell::Number(200.0)).is_none());

        let (code, _) = numeric.check(&Cell::text("lots")).unwrap();
        assert_eq!(code, ErrorCode::InvalidValue);
    }

    #[test]
    fn test_range_aliases() {
        let range = rule("column_range_validator", json!({ "min": 0, "max": 200 }));
        assert_eq!(range.check(&Cell::text("-10")).unwrap().0, ErrorCode::OutOfRange);
        assert!(range.check(&Cell::text("150")).is_none());
        // not a number: left to the numeric rule
        assert!(range.check(&Cell::text("lots")).is_none());
    }

    #[test]
    fn test_blank_cells() {
        let required = rule("column_required_validator", Value::Null);
        assert_eq!(required.check(&Cell::Empty).unwrap().0, ErrorCode::MissingRequiredField);
        assert_eq!(required.check(&Cell::text("  ")).unwrap().0, ErrorCode::MissingRequiredField);
        assert!(required.check(&Cell::text("x")).is_none());

        let numeric = rule("column_numeric_validator", json!({}));
        assert!(numeric.check(&Cell::Empty).is_none());
    }

    #[test]
    fn test_format() {
        let date = rule(
            "column_format_validator",
            json!({ "reg_exps": ["^\\d{4}-\\d{2}-\\d{2}$"], "expected_format": "YYYY-MM-DD" }),
        );
        assert!(date.check(&Cell::text("2024-02-01")).is_none());
        let (code, message) = date.check(&Cell::text("01/02/2024")).unwrap();
        assert_eq!(code, ErrorCode::UnexpectedFormat);
        assert!(message.contains("YYYY-MM-DD"));
    }

    #[test]
    fn test_code_pick_list() {
        let sex = rule(
            "column_code_validator",
            json!({ "allowed_code_values": [
                { "name": "Male", "description": "male" },
                { "name": "Female" },
                { "name": "Unknown" }
            ] }),
        );
        assert!(sex.check(&Cell::text(" male ")).is_none());
        assert!(sex.check(&Cell::text("FEMALE")).is_none());
        assert_eq!(sex.check(&Cell::text("calf")).unwrap().0, ErrorCode::InvalidValue);
    }

    #[test]
    fn test_bad_params() {
        let parse = lookup_column_rule("column_range_validator").unwrap();
        assert!(parse(&json!({ "min_value": "zero" })).is_err());
        let parse = lookup_column_rule("column_format_validator").unwrap();
        assert!(parse(&json!({ "reg_exps": ["[a-"] })).is_err());
        assert!(lookup_column_rule("column_colour_validator").is_none());
    }
}
