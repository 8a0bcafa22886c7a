//! XLSX/XLS/ODS reader backed by calamine.

use std::io::Cursor;

use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use chrono::Timelike;

use crate::error::WorkbookResult;
use crate::models::Cell;

use super::Worksheet;

/// Read every sheet of a spreadsheet container, in workbook order.
///
/// The header row is the first non-empty row of each sheet; rows above it
/// are ignored.
pub fn read_spreadsheet(bytes: &[u8]) -> WorkbookResult<Vec<Worksheet>> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes.to_vec()))?;

    let mut worksheets = Vec::new();
    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        worksheets.push(read_range(&name, &range));
    }

    Ok(worksheets)
}

fn read_range(name: &str, range: &Range<Data>) -> Worksheet {
    let mut rows = range.rows();

    let headers: Vec<String> = rows
        .by_ref()
        .find(|row| row.iter().any(|c| !matches!(c, Data::Empty)))
        .map(|row| row.iter().map(header_text).collect())
        .unwrap_or_default();

    let data = rows
        .map(|row| row.iter().map(convert_cell).collect())
        .collect();

    Worksheet::new(name, headers, data)
}

fn header_text(c: &Data) -> String {
    convert_cell(c).as_text().unwrap_or_default()
}

fn convert_cell(c: &Data) -> Cell {
    match c {
        Data::Empty => Cell::Empty,
        Data::String(s) => Cell::text(s.trim()),
        Data::Int(i) => Cell::Number(*i as f64),
        Data::Float(f) => Cell::Number(*f),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(naive) if naive.num_seconds_from_midnight() == 0 => {
                Cell::Text(naive.format("%Y-%m-%d").to_string())
            }
            Some(naive) => Cell::Text(naive.format("%Y-%m-%dT%H:%M:%S").to_string()),
            None => Cell::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => Cell::text(s.clone()),
        Data::DurationIso(s) => Cell::text(s.clone()),
        Data::Error(e) => Cell::Text(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::Workbook as XlsxBook;

    fn survey_xlsx() -> Vec<u8> {
        let mut wb = XlsxBook::new();

        let effort = wb.add_worksheet();
        effort.set_name("Effort").unwrap();
        effort.write_string(0, 0, "Survey Area").unwrap();
        effort.write_string(0, 1, "Sampling Unit ID").unwrap();
        effort.write_string(0, 2, "Stratum").unwrap();
        effort.write_string(1, 0, "A").unwrap();
        effort.write_number(1, 1, 1).unwrap();
        effort.write_string(1, 2, "X").unwrap();

        let obs = wb.add_worksheet();
        obs.set_name("Observations").unwrap();
        // header on the second row; the first row is blank
        obs.write_string(1, 0, "Waypoint").unwrap();
        obs.write_string(1, 1, "Adult Males").unwrap();
        obs.write_string(2, 0, "W1").unwrap();
        obs.write_number(2, 1, 2.5).unwrap();
        obs.write_boolean(3, 1, true).unwrap();

        wb.save_to_buffer().unwrap()
    }

    #[test]
    fn test_reads_all_sheets_in_order() {
        let sheets = read_spreadsheet(&survey_xlsx()).unwrap();
        let names: Vec<&str> = sheets.iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["Effort", "Observations"]);
    }

    #[test]
    fn test_cell_types() {
        let sheets = read_spreadsheet(&survey_xlsx()).unwrap();
        let effort = &sheets[0];
        assert_eq!(effort.get_cell("Sampling Unit ID", 0), Some(&Cell::Number(1.0)));
        assert_eq!(
            effort.get_cell("Sampling Unit ID", 0).and_then(Cell::as_text),
            Some("1".to_string())
        );

        let obs = &sheets[1];
        assert_eq!(obs.headers(), &["Waypoint".to_string(), "Adult Males".to_string()]);
        assert_eq!(obs.get_cell("Adult Males", 0), Some(&Cell::Number(2.5)));
        assert_eq!(obs.get_cell("Adult Males", 1), Some(&Cell::Bool(true)));
        assert_eq!(obs.get_cell("Waypoint", 1), Some(&Cell::Empty));
    }

    #[test]
    fn test_garbage_bytes_are_an_error() {
        assert!(read_spreadsheet(b"definitely not a zip").is_err());
    }
}
