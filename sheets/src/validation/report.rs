//! Validation report types.
//!
//! The report shape is what upload clients render:
//!
//! ```json
//! {
//!   "mediaState": { "fileName": "moose.xlsx", "isValid": true, "fileErrors": [] },
//!   "csvState": [
//!     { "fileName": "Effort", "isValid": false, "headerErrors": [...], "rowErrors": [...] }
//!   ]
//! }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error categories, serialized with their display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    #[serde(rename = "Duplicate Header")]
    DuplicateHeader,
    #[serde(rename = "Unknown Header")]
    UnknownHeader,
    #[serde(rename = "Missing Required Header")]
    MissingRequiredHeader,
    #[serde(rename = "Missing Required Field")]
    MissingRequiredField,
    #[serde(rename = "Out of Range")]
    OutOfRange,
    #[serde(rename = "Invalid Value")]
    InvalidValue,
    #[serde(rename = "Unexpected Format")]
    UnexpectedFormat,
    #[serde(rename = "Non Unique Key")]
    NonUniqueKey,
    #[serde(rename = "Dangling Parent Child Key")]
    DanglingParentChildKey,
    #[serde(rename = "Missing Required File")]
    MissingRequiredFile,
    #[serde(rename = "Invalid Mimetype")]
    InvalidMimetype,
    #[serde(rename = "Empty File")]
    EmptyFile,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::DuplicateHeader => "Duplicate Header",
            ErrorCode::UnknownHeader => "Unknown Header",
            ErrorCode::MissingRequiredHeader => "Missing Required Header",
            ErrorCode::MissingRequiredField => "Missing Required Field",
            ErrorCode::OutOfRange => "Out of Range",
            ErrorCode::InvalidValue => "Invalid Value",
            ErrorCode::UnexpectedFormat => "Unexpected Format",
            ErrorCode::NonUniqueKey => "Non Unique Key",
            ErrorCode::DanglingParentChildKey => "Dangling Parent Child Key",
            ErrorCode::MissingRequiredFile => "Missing Required File",
            ErrorCode::InvalidMimetype => "Invalid Mimetype",
            ErrorCode::EmptyFile => "Empty File",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Problem with the submitted file as a whole.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileError {
    pub error_code: ErrorCode,
    pub message: String,
}

/// Problem with a worksheet header.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeaderError {
    pub error_code: ErrorCode,
    pub message: String,
    pub col: String,
}

/// Problem with one cell (or key) of a data row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RowError {
    pub error_code: ErrorCode,
    pub message: String,
    pub col: String,
    /// Spreadsheet row number: the header is row 1, the first data row is 2.
    pub row: usize,
}

/// Spreadsheet row number of a zero-based data row index.
pub fn sheet_row(data_index: usize) -> usize {
    data_index + 2
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaState {
    pub file_name: String,
    pub is_valid: bool,
    pub file_errors: Vec<FileError>,
}

impl MediaState {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            is_valid: true,
            file_errors: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: FileError) {
        self.is_valid = false;
        self.file_errors.push(error);
    }
}

/// Per-worksheet content results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CsvState {
    pub file_name: String,
    pub is_valid: bool,
    pub header_errors: Vec<HeaderError>,
    pub row_errors: Vec<RowError>,
}

impl CsvState {
    pub fn new(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            is_valid: true,
            header_errors: Vec::new(),
            row_errors: Vec::new(),
        }
    }

    pub fn add_header_error(&mut self, error: HeaderError) {
        self.is_valid = false;
        self.header_errors.push(error);
    }

    pub fn add_row_error(&mut self, error: RowError) {
        self.is_valid = false;
        self.row_errors.push(error);
    }

    pub fn error_count(&self) -> usize {
        self.header_errors.len() + self.row_errors.len()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub media_state: MediaState,
    pub csv_state: Vec<CsvState>,
}

impl ValidationReport {
    pub fn is_valid(&self) -> bool {
        self.media_state.is_valid && self.csv_state.iter().all(|state| state.is_valid)
    }

    pub fn csv_state_for(&self, file_name: &str) -> Option<&CsvState> {
        self.csv_state.iter().find(|state| state.file_name == file_name)
    }
}
