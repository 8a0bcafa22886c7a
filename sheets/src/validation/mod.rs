//! Schema-driven workbook validation.
//!
//! Validation runs in two phases:
//!
//! 1. **Media** - the submission as a whole: mime type, required sheets,
//!    emptiness. See [`is_media_valid`].
//! 2. **Content** - per declared worksheet: file rules over the header row,
//!    column rules over every cell, then workbook rules across sheets. See
//!    [`is_content_valid`].
//!
//! Content is only checked when the media phase passes. Data problems never
//! fail validation itself: they are collected into a [`ValidationReport`].
//! Only a malformed schema is an error.
//!
//! Rules are `{ "<kind>": params }` objects. Each scope resolves kinds through
//! its own static table; unknown kinds are logged and skipped.
//!
//! # Example
//!
//! ```rust,ignore
//! use biohub_sheets::{validate, ValidationSchemaParser, Workbook};
//!
//! let parser = ValidationSchemaParser::from_json_str(&schema_json)?;
//! let report = validate(&workbook, &parser)?;
//! if !report.is_valid() {
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//! }
//! ```

pub mod column;
pub mod file;
pub mod media;
pub mod report;
pub mod workbook;

use indexmap::IndexMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::error::{SchemaError, SchemaResult};
use crate::logs::{log_error, log_info, log_info_indent, log_success, log_warning_indent};
use crate::schema::{rule_kind, ValidationSchemaParser};
use crate::workbook::Workbook;

pub use column::{lookup_column_rule, CodeValue, ColumnRule};
pub use file::{lookup_file_rule, FileRule};
pub use media::{check_not_empty, lookup_media_rule, MediaRule};
pub use report::{
    sheet_row, CsvState, ErrorCode, FileError, HeaderError, MediaState, RowError, ValidationReport,
};
pub use workbook::{lookup_workbook_rule, WorkbookFindings, WorkbookRule};

/// Builds a typed rule from its parameters.
pub type RuleParser<R> = fn(&Value) -> SchemaResult<R>;

/// Deserialize rule parameters. A rule without parameters reads as `{}`.
pub(crate) fn rule_params<T: DeserializeOwned>(kind: &str, params: &Value) -> SchemaResult<T> {
    let params = match params {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(params).map_err(|e| SchemaError::InvalidRule {
        rule: kind.to_string(),
        message: e.to_string(),
    })
}

pub(crate) fn compile_patterns(kind: &str, patterns: &[String]) -> SchemaResult<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(pattern).map_err(|e| SchemaError::InvalidRule {
                rule: kind.to_string(),
                message: e.to_string(),
            })
        })
        .collect()
}

/// Resolve raw rule objects through `lookup`, skipping unknown kinds.
pub fn resolve_rules<R>(
    rules: &[Value],
    lookup: fn(&str) -> Option<RuleParser<R>>,
    scope: &str,
) -> SchemaResult<Vec<R>> {
    let mut resolved = Vec::with_capacity(rules.len());
    for rule in rules {
        let Some((kind, params)) = rule_kind(rule) else {
            log_warning_indent(format!("{scope}: unrecognized rule {rule}, skipped"), 1);
            continue;
        };
        match lookup(kind) {
            Some(parse) => resolved.push(parse(params)?),
            None => log_warning_indent(format!("{scope}: unknown rule '{kind}', skipped"), 1),
        }
    }
    Ok(resolved)
}

/// Media phase: submission rules plus the built-in empty-file check.
pub fn is_media_valid(workbook: &Workbook, parser: &ValidationSchemaParser) -> SchemaResult<MediaState> {
    let mut state = MediaState::new(workbook.file_name());

    if let Some(error) = check_not_empty(workbook) {
        state.add_error(error);
    }

    let rules = resolve_rules(parser.get_submission_validations(), lookup_media_rule, "submission")?;
    for rule in &rules {
        for error in rule.check(workbook) {
            state.add_error(error);
        }
    }

    Ok(state)
}

/// Content phase: one [`CsvState`] per declared worksheet present in the
/// workbook, in schema order. Worksheets named only by workbook rules get a
/// state when those rules report errors against them.
pub fn is_content_valid(
    workbook: &Workbook,
    parser: &ValidationSchemaParser,
) -> SchemaResult<Vec<CsvState>> {
    let mut states: IndexMap<String, CsvState> = IndexMap::new();

    for file_name in parser.get_file_names() {
        let Some(sheet) = workbook.get_worksheet(file_name) else {
            log_info_indent(format!("{file_name}: not in workbook, skipped"), 1);
            continue;
        };
        let mut state = CsvState::new(file_name);

        let file_rules = resolve_rules(parser.get_file_validations(file_name), lookup_file_rule, file_name)?;
        for rule in &file_rules {
            rule.check(sheet, &mut state);
        }

        for column_name in parser.get_column_names(file_name) {
            let rules = resolve_rules(
                parser.get_column_validations(file_name, column_name),
                lookup_column_rule,
                file_name,
            )?;
            if rules.is_empty() || !sheet.has_column(column_name) {
                continue;
            }
            let Some(cells) = sheet.column_values(column_name) else {
                continue;
            };

            for (idx, cell) in cells.into_iter().enumerate() {
                for rule in &rules {
                    if let Some((error_code, message)) = rule.check(cell) {
                        state.add_row_error(RowError {
                            error_code,
                            message,
                            col: column_name.to_string(),
                            row: sheet_row(idx),
                        });
                    }
                }
            }
        }

        states.insert(file_name.to_string(), state);
    }

    let workbook_rules = resolve_rules(parser.get_workbook_validations(), lookup_workbook_rule, "workbook")?;
    for rule in &workbook_rules {
        let Some(findings) = rule.check(workbook) else {
            continue;
        };
        if findings.row_errors.is_empty() {
            continue;
        }
        let state = states
            .entry(findings.worksheet.clone())
            .or_insert_with(|| CsvState::new(findings.worksheet.clone()));
        for error in findings.row_errors {
            state.add_row_error(error);
        }
    }

    Ok(states.into_values().collect())
}

/// Run both phases. Content is skipped when the media phase fails.
pub fn validate(workbook: &Workbook, parser: &ValidationSchemaParser) -> SchemaResult<ValidationReport> {
    log_info(format!("🔎 Validating '{}'...", workbook.file_name()));

    let media_state = is_media_valid(workbook, parser)?;
    let csv_state = if media_state.is_valid {
        is_content_valid(workbook, parser)?
    } else {
        log_warning_indent(
            format!("{} file error(s), content not checked", media_state.file_errors.len()),
            1,
        );
        Vec::new()
    };

    let report = ValidationReport { media_state, csv_state };
    let errors: usize = report.csv_state.iter().map(CsvState::error_count).sum();
    if report.is_valid() {
        log_success("Validation passed");
    } else {
        log_error(format!(
            "Validation failed: {} file error(s), {} content error(s)",
            report.media_state.file_errors.len(),
            errors
        ));
    }
    Ok(report)
}
