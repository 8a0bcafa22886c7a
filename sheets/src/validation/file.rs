//! Worksheet-level (file) rules.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaResult;
use crate::models::{Cell, Row};
use crate::workbook::Worksheet;

use super::report::{sheet_row, CsvState, ErrorCode, HeaderError, RowError};
use super::{rule_params, RuleParser};

#[derive(Debug, Clone, PartialEq)]
pub enum FileRule {
    DuplicateColumns,
    RequiredColumns { required_columns: Vec<String> },
    ValidColumns { valid_columns: Vec<String> },
    /// The combination of `column_names` must be unique across rows.
    ColumnUnique { column_names: Vec<String> },
}

#[derive(Deserialize)]
struct RequiredColumnsParams {
    required_columns: Vec<String>,
}

#[derive(Deserialize)]
struct ValidColumnsParams {
    valid_columns: Vec<String>,
}

#[derive(Deserialize)]
struct ColumnUniqueParams {
    column_names: Vec<String>,
}

static FILE_RULES: &[(&str, RuleParser<FileRule>)] = &[
    ("file_duplicate_columns_validator", parse_duplicate_columns),
    ("file_required_columns_validator", parse_required_columns),
    ("file_valid_columns_validator", parse_valid_columns),
    ("file_column_unique_validator", parse_column_unique),
];

fn parse_duplicate_columns(_params: &Value) -> SchemaResult<FileRule> {
    Ok(FileRule::DuplicateColumns)
}

fn parse_required_columns(params: &Value) -> SchemaResult<FileRule> {
    let p: RequiredColumnsParams = rule_params("file_required_columns_validator", params)?;
    Ok(FileRule::RequiredColumns {
        required_columns: p.required_columns,
    })
}

fn parse_valid_columns(params: &Value) -> SchemaResult<FileRule> {
    let p: ValidColumnsParams = rule_params("file_valid_columns_validator", params)?;
    Ok(FileRule::ValidColumns {
        valid_columns: p.valid_columns,
    })
}

fn parse_column_unique(params: &Value) -> SchemaResult<FileRule> {
    let p: ColumnUniqueParams = rule_params("file_column_unique_validator", params)?;
    Ok(FileRule::ColumnUnique {
        column_names: p.column_names,
    })
}

pub fn lookup_file_rule(kind: &str) -> Option<RuleParser<FileRule>> {
    FILE_RULES
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, parser)| *parser)
}

impl FileRule {
    pub fn check(&self, sheet: &Worksheet, state: &mut CsvState) {
        match self {
            FileRule::DuplicateColumns => check_duplicates(sheet, state),
            FileRule::RequiredColumns { required_columns } => {
                for column in required_columns {
                    if !sheet.has_column(column) {
                        state.add_header_error(HeaderError {
                            error_code: ErrorCode::MissingRequiredHeader,
                            message: format!("Missing required column '{column}'"),
                            col: column.clone(),
                        });
                    }
                }
            }
            FileRule::ValidColumns { valid_columns } => {
                let valid: HashSet<&str> = valid_columns.iter().map(String::as_str).collect();
                for header in sheet.headers() {
                    if !header.is_empty() && !valid.contains(header.as_str()) {
                        state.add_header_error(HeaderError {
                            error_code: ErrorCode::UnknownHeader,
                            message: format!("Column '{header}' is not a recognized column"),
                            col: header.clone(),
                        });
                    }
                }
            }
            FileRule::ColumnUnique { column_names } => check_unique(sheet, column_names, state),
        }
    }
}

fn check_duplicates(sheet: &Worksheet, state: &mut CsvState) {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for header in sheet.headers().iter().filter(|h| !h.is_empty()) {
        *counts.entry(header.as_str()).or_default() += 1;
    }

    let mut reported = HashSet::new();
    for header in sheet.headers() {
        if counts.get(header.as_str()).copied().unwrap_or_default() > 1 && reported.insert(header) {
            state.add_header_error(HeaderError {
                error_code: ErrorCode::DuplicateHeader,
                message: format!("Column '{header}' appears more than once"),
                col: header.clone(),
            });
        }
    }
}

fn check_unique(sheet: &Worksheet, column_names: &[String], state: &mut CsvState) {
    if column_names.is_empty() || !column_names.iter().all(|c| sheet.has_column(c)) {
        return;
    }

    let mut seen: HashSet<Vec<Option<String>>> = HashSet::new();
    for (idx, row) in sheet.get_row_objects().iter().enumerate() {
        let key = key_values(row, column_names);
        if key.iter().all(Option::is_none) {
            continue;
        }
        if !seen.insert(key.clone()) {
            let shown: Vec<String> = key.into_iter().map(Option::unwrap_or_default).collect();
            state.add_row_error(RowError {
                error_code: ErrorCode::NonUniqueKey,
                message: format!("Duplicate key '{}'", shown.join(":")),
                col: column_names.join(", "),
                row: sheet_row(idx),
            });
        }
    }
}

fn key_values(row: &Row, columns: &[String]) -> Vec<Option<String>> {
    columns
        .iter()
        .map(|c| row.get(c).filter(|cell| !cell.is_blank()).and_then(Cell::as_text))
        .collect()
}
