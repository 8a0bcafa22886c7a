//! In-memory workbook model.
//!
//! A [`Workbook`] is an ordered set of named [`Worksheet`]s parsed from a
//! [`MediaFile`]. Every worksheet row has exactly one cell per header; missing
//! cells are [`Cell::Empty`], never absent.
//!
//! ```text
//! MediaFile ──▶ delimited::read_csv          ──┐
//!          └──▶ spreadsheet::read_spreadsheet ──┴──▶ Workbook { Worksheet { headers, rows } }
//! ```

pub mod delimited;
pub mod spreadsheet;

use indexmap::IndexMap;

use crate::error::{WorkbookError, WorkbookResult};
use crate::models::{Cell, MediaFile, Row};

const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];
const CSV_EXTENSIONS: [&str; 2] = ["csv", "txt"];

/// A single named sheet.
#[derive(Debug, Clone, PartialEq)]
pub struct Worksheet {
    name: String,
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Worksheet {
    /// Build a worksheet, trimming headers and normalizing every row to the
    /// header width. Fully blank rows are dropped.
    pub fn new(name: impl Into<String>, headers: Vec<String>, rows: Vec<Vec<Cell>>) -> Self {
        let headers: Vec<String> = headers.into_iter().map(|h| h.trim().to_string()).collect();
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|row| row.iter().any(|cell| !cell.is_blank()))
            .map(|mut row| {
                row.resize(width, Cell::Empty);
                row
            })
            .collect();

        Self {
            name: name.into(),
            headers,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Header row, in sheet order. May contain duplicates.
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Raw data rows, aligned with [`Worksheet::headers`].
    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// True when the sheet has neither headers nor data.
    pub fn is_empty(&self) -> bool {
        self.headers.is_empty() && self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.headers.iter().any(|h| h == column)
    }

    /// Every row as a header-keyed object. With duplicate headers the
    /// rightmost column wins.
    pub fn get_row_objects(&self) -> Vec<Row> {
        self.rows
            .iter()
            .map(|cells| {
                self.headers
                    .iter()
                    .cloned()
                    .zip(cells.iter().cloned())
                    .collect::<Row>()
            })
            .collect()
    }

    /// Cell at `column` for the zero-based data row `row_index`.
    pub fn get_cell(&self, column: &str, row_index: usize) -> Option<&Cell> {
        let col = self.headers.iter().rposition(|h| h == column)?;
        self.rows.get(row_index)?.get(col)
    }

    /// All values of a column, in row order.
    pub fn column_values(&self, column: &str) -> Option<Vec<&Cell>> {
        let col = self.headers.iter().rposition(|h| h == column)?;
        Some(self.rows.iter().map(|row| &row[col]).collect())
    }
}

/// A parsed spreadsheet file.
#[derive(Debug, Clone, Default)]
pub struct Workbook {
    file_name: String,
    mime_type: String,
    byte_len: usize,
    worksheets: IndexMap<String, Worksheet>,
}

impl Workbook {
    /// Build a workbook directly from worksheets (already-parsed data).
    pub fn from_worksheets(file_name: impl Into<String>, worksheets: Vec<Worksheet>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: String::new(),
            byte_len: 0,
            worksheets: worksheets
                .into_iter()
                .map(|ws| (ws.name().to_string(), ws))
                .collect(),
        }
    }

    /// Parse a media file, picking the reader by extension then mime type.
    pub fn from_media(media: &MediaFile) -> WorkbookResult<Self> {
        let worksheets = match detect_format(media) {
            Some(MediaFormat::Csv) => vec![delimited::read_csv(&media.stem(), &media.buffer)?],
            Some(MediaFormat::Spreadsheet) => spreadsheet::read_spreadsheet(&media.buffer)?,
            None => {
                return Err(WorkbookError::UnsupportedFormat {
                    file_name: media.file_name.clone(),
                    mime_type: media.mime_type.clone(),
                })
            }
        };

        let mut workbook = Self::from_worksheets(media.file_name.clone(), worksheets);
        workbook.mime_type = media.mime_type.clone();
        workbook.byte_len = media.buffer.len();
        Ok(workbook)
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Worksheet by name. Unknown names yield `None`.
    pub fn get_worksheet(&self, name: &str) -> Option<&Worksheet> {
        self.worksheets.get(name)
    }

    pub fn worksheet_names(&self) -> Vec<&str> {
        self.worksheets.keys().map(String::as_str).collect()
    }

    pub fn worksheets(&self) -> impl Iterator<Item = &Worksheet> {
        self.worksheets.values()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MediaFormat {
    Csv,
    Spreadsheet,
}

fn detect_format(media: &MediaFile) -> Option<MediaFormat> {
    if let Some(ext) = media.extension() {
        if CSV_EXTENSIONS.contains(&ext.as_str()) {
            return Some(MediaFormat::Csv);
        }
        if SPREADSHEET_EXTENSIONS.contains(&ext.as_str()) {
            return Some(MediaFormat::Spreadsheet);
        }
    }

    match media.mime_type.to_lowercase().as_str() {
        "text/csv" | "application/csv" | "text/plain" => Some(MediaFormat::Csv),
        "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        | "application/vnd.ms-excel"
        | "application/vnd.oasis.opendocument.spreadsheet" => Some(MediaFormat::Spreadsheet),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Worksheet {
        Worksheet::new(
            "Effort",
            vec![" Survey Area ".into(), "Count".into()],
            vec![
                vec![Cell::text("A"), Cell::Number(3.0)],
                vec![Cell::text("B")],
                vec![Cell::Empty, Cell::text("  ")],
            ],
        )
    }

    #[test]
    fn test_rows_padded_and_blank_rows_dropped() {
        let ws = sample();
        assert_eq!(ws.headers(), &["Survey Area".to_string(), "Count".to_string()]);
        assert_eq!(ws.row_count(), 2);
        assert_eq!(ws.rows()[1], vec![Cell::text("B"), Cell::Empty]);
    }

    #[test]
    fn test_row_objects_follow_header_order() {
        let rows = sample().get_row_objects();
        let keys: Vec<&str> = rows[0].keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["Survey Area", "Count"]);
        assert_eq!(rows[1]["Count"], Cell::Empty);
    }

    #[test]
    fn test_get_cell_out_of_bounds() {
        let ws = sample();
        assert_eq!(ws.get_cell("Count", 0), Some(&Cell::Number(3.0)));
        assert_eq!(ws.get_cell("Count", 9), None);
        assert_eq!(ws.get_cell("Nope", 0), None);
    }

    #[test]
    fn test_unknown_worksheet_is_none() {
        let wb = Workbook::from_worksheets("survey.xlsx", vec![sample()]);
        assert!(wb.get_worksheet("Effort").is_some());
        assert!(wb.get_worksheet("Observations").is_none());
    }

    #[test]
    fn test_csv_media_uses_file_stem() {
        let media = MediaFile::new("Observations.csv", "text/csv", b"Waypoint,Count\nW1,2\n".to_vec());
        let wb = Workbook::from_media(&media).unwrap();
        assert_eq!(wb.worksheet_names(), vec!["Observations"]);
        assert_eq!(wb.byte_len(), media.buffer.len());
        let ws = wb.get_worksheet("Observations").unwrap();
        assert_eq!(ws.get_cell("Waypoint", 0), Some(&Cell::text("W1")));
    }

    #[test]
    fn test_unsupported_format() {
        let media = MediaFile::new("notes.pdf", "application/pdf", vec![1, 2, 3]);
        let err = Workbook::from_media(&media).unwrap_err();
        assert!(matches!(err, WorkbookError::UnsupportedFormat { .. }));
    }
}
