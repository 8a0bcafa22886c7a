//! Submission-level (media) rules.

use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::error::SchemaResult;
use crate::workbook::Workbook;

use super::report::{ErrorCode, FileError};
use super::{compile_patterns, rule_params, RuleParser};

#[derive(Debug, Clone)]
pub enum MediaRule {
    /// The reported mime type must match one of the patterns.
    Mimetype { reg_exps: Vec<Regex> },
    /// Every listed worksheet must be present.
    RequiredFiles { required_files: Vec<String> },
}

#[derive(Deserialize)]
struct MimetypeParams {
    #[serde(default)]
    reg_exps: Vec<String>,
}

#[derive(Deserialize)]
struct RequiredFilesParams {
    #[serde(default)]
    required_files: Vec<String>,
}

static MEDIA_RULES: &[(&str, RuleParser<MediaRule>)] = &[
    ("mimetype_validator", parse_mimetype),
    ("submission_required_files_validator", parse_required_files),
];

fn parse_mimetype(params: &Value) -> SchemaResult<MediaRule> {
    let kind = "mimetype_validator";
    let p: MimetypeParams = rule_params(kind, params)?;
    Ok(MediaRule::Mimetype {
        reg_exps: compile_patterns(kind, &p.reg_exps)?,
    })
}

fn parse_required_files(params: &Value) -> SchemaResult<MediaRule> {
    let p: RequiredFilesParams = rule_params("submission_required_files_validator", params)?;
    Ok(MediaRule::RequiredFiles {
        required_files: p.required_files,
    })
}

pub fn lookup_media_rule(kind: &str) -> Option<RuleParser<MediaRule>> {
    MEDIA_RULES
        .iter()
        .find(|(name, _)| *name == kind)
        .map(|(_, parser)| *parser)
}

impl MediaRule {
    pub fn check(&self, workbook: &Workbook) -> Vec<FileError> {
        match self {
            MediaRule::Mimetype { reg_exps } => {
                if reg_exps.is_empty() || reg_exps.iter().any(|re| re.is_match(workbook.mime_type())) {
                    Vec::new()
                } else {
                    vec![FileError {
                        error_code: ErrorCode::InvalidMimetype,
                        message: format!("Mimetype '{}' is not accepted", workbook.mime_type()),
                    }]
                }
            }
            MediaRule::RequiredFiles { required_files } => required_files
                .iter()
                .filter(|name| workbook.get_worksheet(name).is_none())
                .map(|name| FileError {
                    error_code: ErrorCode::MissingRequiredFile,
                    message: format!("Missing required sheet '{name}'"),
                })
                .collect(),
        }
    }
}

/// Built-in check: a workbook without worksheets, or without a header row
/// in any of them, is empty.
pub fn check_not_empty(workbook: &Workbook) -> Option<FileError> {
    let has_headers = workbook.worksheets().any(|sheet| !sheet.headers().is_empty());
    (!has_headers).then(|| FileError {
        error_code: ErrorCode::EmptyFile,
        message: "File is empty".into(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MediaFile;
    use crate::workbook::Worksheet;
    use serde_json::json;

    fn csv_workbook(content: &[u8]) -> Workbook {
        Workbook::from_media(&MediaFile::new("Effort.csv", "text/csv", content.to_vec())).unwrap()
    }

    #[test]
    fn test_mimetype() {
        let parse = lookup_media_rule("mimetype_validator").unwrap();
        let accepts_csv = parse(&json!({ "reg_exps": ["text\\/csv", "application\\/vnd.*"] })).unwrap();
        assert!(accepts_csv.check(&csv_workbook(b"a\n1\n")).is_empty());

        let xlsx_only = parse(&json!({ "reg_exps": ["spreadsheetml"] })).unwrap();
        let errors = xlsx_only.check(&csv_workbook(b"a\n1\n"));
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].error_code, ErrorCode::InvalidMimetype);
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let parse = lookup_media_rule("mimetype_validator").unwrap();
        assert!(parse(&json!({ "reg_exps": ["(unclosed"] })).is_err());
    }

    #[test]
    fn test_required_files() {
        let parse = lookup_media_rule("submission_required_files_validator").unwrap();
        let rule = parse(&json!({ "required_files": ["Effort", "Observations"] })).unwrap();
        let errors = rule.check(&csv_workbook(b"a\n1\n"));
        assert_eq!(errors.len(), 1);
        assert!(errors[0].message.contains("Observations"));
    }

    #[test]
    fn test_empty_file() {
        assert!(check_not_empty(&csv_workbook(b"")).is_some());
        assert!(check_not_empty(&Workbook::from_worksheets("x.xlsx", vec![])).is_some());
        assert!(check_not_empty(&csv_workbook(b"a,b\n")).is_none());

        let headerless = Worksheet::new("Effort", vec![], vec![]);
        assert!(check_not_empty(&Workbook::from_worksheets("x.xlsx", vec![headerless])).is_some());
    }

    #[test]
    fn test_unknown_kind() {
        assert!(lookup_media_rule("virus_scan_validator").is_none());
    }
}
