//! Core value types shared by every pipeline stage.
//!
//! - [`Cell`] - a single scalar spreadsheet value
//! - [`Row`] - a header-keyed row object
//! - [`MediaFile`] - raw upload bytes with their name and content type

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

// =============================================================================
// Cell
// =============================================================================

/// A scalar cell value.
///
/// Serializes as plain JSON (`null`, `true`, `12.5`, `"text"`), so rows can be
/// handed to collaborators without conversion.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    /// Boolean cell.
    Bool(bool),
    /// Numeric cell. Integers are stored as whole floats.
    Number(f64),
    /// Text cell.
    Text(String),
    /// Missing value.
    #[default]
    Empty,
}

impl Cell {
    /// Build a text cell, mapping the empty string to [`Cell::Empty`].
    pub fn text(value: impl Into<String>) -> Self {
        let value = value.into();
        if value.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(value)
        }
    }

    /// True for [`Cell::Empty`] and whitespace-only text.
    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Render the value as text. Whole numbers render without a fraction.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Cell::Empty => None,
            Cell::Bool(b) => Some(b.to_string()),
            Cell::Number(n) => Some(n.to_string()),
            Cell::Text(s) => Some(s.clone()),
        }
    }

    /// Read the value as a number, parsing trimmed text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Cell::text(value)
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Cell::text(value)
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Cell::Number(value)
    }
}

impl From<i64> for Cell {
    fn from(value: i64) -> Self {
        Cell::Number(value as f64)
    }
}

impl From<bool> for Cell {
    fn from(value: bool) -> Self {
        Cell::Bool(value)
    }
}

// =============================================================================
// Row
// =============================================================================

/// A row keyed by column name. Key order follows header order; equality
/// ignores key order.
pub type Row = IndexMap<String, Cell>;

/// Read a column as text, treating blank cells as absent.
pub fn row_text(row: &Row, column: &str) -> Option<String> {
    row.get(column)
        .filter(|cell| !cell.is_blank())
        .and_then(Cell::as_text)
}

/// Colon-joined composite key over `columns`. Missing values contribute an
/// empty segment.
pub fn composite_key(row: &Row, columns: &[String]) -> String {
    columns
        .iter()
        .map(|column| row.get(column).and_then(Cell::as_text).unwrap_or_default())
        .collect::<Vec<_>>()
        .join(":")
}

// =============================================================================
// Media File
// =============================================================================

/// Raw uploaded file as received from the upload layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaFile {
    /// Original file name, including extension.
    pub file_name: String,
    /// Content type reported by the uploader.
    pub mime_type: String,
    /// File content.
    #[serde(skip)]
    pub buffer: Vec<u8>,
}

impl MediaFile {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, buffer: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            buffer,
        }
    }

    /// Lower-cased extension of the file name, if any.
    pub fn extension(&self) -> Option<String> {
        std::path::Path::new(&self.file_name)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
    }

    /// File name without its extension.
    pub fn stem(&self) -> String {
        std::path::Path::new(&self.file_name)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or(&self.file_name)
            .to_string()
    }
}

// =============================================================================
// Tests
// =============================================================================
