//! Cross-worksheet (workbook) rules.

use std::collections::HashSet;

use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaResult;
use crate::models::composite_key;
use crate::workbook::Workbook;

use super::report::{sheet_row, ErrorCode, RowError};
use super::{rule_params, RuleParser};

#[derive(Debug, Clone, PartialEq)]
pub enum WorkbookRule {
    /// Every child key must exist in the parent sheet.
    ParentChildKeyMatch {
        parent_worksheet_name: String,
        child_worksheet_name: String,
        column_names: Vec<String>,
    },
}

#[derive(Deserialize)]
struct ParentChildParams {
    parent_worksheet_name: String,
    child_worksheet_name: String,
    column_names: Vec<String>,
}

static WORKBOOK_RULES: &[(&str, RuleParser<WorkbookRule>)] =
    &[("workbook_parent_child_key_match_validator", parse_parent_child)];

fn parse_parent_child(params: &Value) -> SchemaResult<WorkbookRule> {
    let p: ParentChildParams = rule_params("workbook_parent_child_key_match_validator", params)?;
    Ok(WorkbookRule::ParentChildKeyMatch {
        parent_worksheet_name: p.parent_worksheet_name,
        child_worksheet_name: p.child_worksheet_name,
        column_names: p.column_names,
    })
}

pub fn lookup_workbook_rule(kind: &str) -> Option<RuleParser<WorkbookRule>> {
    WORKBOOK_RULES
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, parser)| *parser)
}

/// Row errors produced by a workbook rule, attributed to one worksheet.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkbookFindings {
    pub worksheet: String,
    pub row_errors: Vec<RowError>,
}

impl WorkbookRule {
    /// `None` when the rule does not apply: a sheet or key column is missing.
    pub fn check(&self, workbook: &Workbook) -> Option<WorkbookFindings> {
        match self {
            WorkbookRule::ParentChildKeyMatch {
                parent_worksheet_name,
                child_worksheet_name,
                column_names,
            } => {
                let parent = workbook.get_worksheet(parent_worksheet_name)?;
                let child = workbook.get_worksheet(child_worksheet_name)?;
                if column_names.is_empty()
                    || !column_names
                        .iter()
                        .all(|c| parent.has_column(c) && child.has_column(c))
                {
                    return None;
                }

                let parent_keys: HashSet<String> = parent
                    .get_row_objects()
                    .iter()
                    .map(|row| composite_key(row, column_names))
                    .collect();

                let row_errors = child
                    .get_row_objects()
                    .iter()
                    .enumerate()
                    .filter_map(|(idx, row)| {
                        let key = composite_key(row, column_names);
                        (!parent_keys.contains(&key)).then(|| RowError {
                            error_code: ErrorCode::DanglingParentChildKey,
                            message: format!(
                                "Key '{key}' has no matching row in '{parent_worksheet_name}'"
                            ),
                            col: column_names.join(", "),
                            row: sheet_row(idx),
                        })
                    })
                    .collect();

                Some(WorkbookFindings {
                    worksheet: child_worksheet_name.clone(),
                    row_errors,
                })
            }
        }
    }
}
