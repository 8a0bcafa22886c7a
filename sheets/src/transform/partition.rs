//! Output partitioner.
//!
//! Projects transformed records onto the entities declared in the `parse`
//! section, removes duplicates and serializes the result.

use std::collections::{BTreeMap, HashSet};

use indexmap::IndexMap;
use rust_xlsxwriter::Workbook as XlsxWorkbook;

use crate::error::{OutputError, OutputResult};
use crate::logs::log_info_indent;
use crate::models::{Cell, Row};
use crate::schema::ParseSchema;

/// Records grouped by output entity, in `parse` declaration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Partitions {
    pub entities: IndexMap<String, Vec<Row>>,
    /// Declared target columns per entity.
    pub headers: IndexMap<String, Vec<String>>,
}

/// Project `record` through one parse schema. Blank source values are left
/// out; `None` when nothing projects or a conditional field is missing.
pub fn project(record: &Row, schema: &ParseSchema) -> Option<Row> {
    let mut projected = Row::new();
    for column in &schema.columns {
        if let Some(cell) = record.get(&column.source).filter(|cell| !cell.is_blank()) {
            projected.insert(column.target.clone(), cell.clone());
        }
    }

    if projected.is_empty() {
        return None;
    }
    if !schema
        .conditional_fields
        .iter()
        .all(|field| projected.contains_key(field))
    {
        return None;
    }
    Some(projected)
}

/// Key-order-independent identity of a row.
pub fn fingerprint(row: &Row) -> String {
    let sorted: BTreeMap<&String, &Cell> = row.iter().collect();
    serde_json::to_string(&sorted).unwrap_or_default()
}

/// Partition `records` into one bucket per entity. Every declared entity gets
/// a bucket, even an empty one. Schemas sharing a `fileName` feed the same
/// bucket: their target columns are merged and duplicates are removed across
/// all of them.
pub fn partition(records: &[Row], schemas: &[ParseSchema]) -> Partitions {
    let mut partitions = Partitions::default();
    let mut seen: IndexMap<String, HashSet<String>> = IndexMap::new();
    let mut skipped: IndexMap<String, usize> = IndexMap::new();

    for schema in schemas {
        partitions.entities.entry(schema.file_name.clone()).or_default();
        let headers = partitions.headers.entry(schema.file_name.clone()).or_default();
        for target in schema.target_columns() {
            if !headers.iter().any(|h| h == target) {
                headers.push(target.to_string());
            }
        }
        seen.entry(schema.file_name.clone()).or_default();
        skipped.entry(schema.file_name.clone()).or_default();
    }

    for record in records {
        for schema in schemas {
            let Some(projected) = project(record, schema) else {
                if let Some(count) = skipped.get_mut(&schema.file_name) {
                    *count += 1;
                }
                continue;
            };
            let is_new = seen
                .get_mut(&schema.file_name)
                .is_some_and(|fingerprints| fingerprints.insert(fingerprint(&projected)));
            if is_new {
                if let Some(bucket) = partitions.entities.get_mut(&schema.file_name) {
                    bucket.push(projected);
                }
            }
        }
    }

    for (name, rows) in &partitions.entities {
        match skipped.get(name).copied().unwrap_or_default() {
            0 => log_info_indent(format!("{name}: {} record(s)", rows.len()), 1),
            n => log_info_indent(
                format!("{name}: {} record(s), {n} empty projection(s) skipped", rows.len()),
                1,
            ),
        }
    }

    partitions
}

impl Partitions {
    pub fn entity(&self, name: &str) -> Option<&[Row]> {
        self.entities.get(name).map(Vec::as_slice)
    }

    pub fn total_records(&self) -> usize {
        self.entities.values().map(Vec::len).sum()
    }

    fn headers_for(&self, name: &str) -> &[String] {
        self.headers.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    /// One CSV buffer per entity. The header row is the entity's declared
    /// target columns.
    pub fn to_csv_buffers(&self) -> OutputResult<IndexMap<String, Vec<u8>>> {
        let mut buffers = IndexMap::new();
        for (name, rows) in &self.entities {
            buffers.insert(name.clone(), write_csv(self.headers_for(name), rows)?);
        }
        Ok(buffers)
    }

    /// A single XLSX workbook with one sheet per entity.
    pub fn to_xlsx_buffer(&self) -> OutputResult<Vec<u8>> {
        let mut workbook = XlsxWorkbook::new();

        for (name, rows) in &self.entities {
            let sheet = workbook.add_worksheet();
            sheet.set_name(name.as_str())?;

            let headers = self.headers_for(name);
            for (col, header) in headers.iter().enumerate() {
                sheet.write_string(0, col as u16, header.as_str())?;
            }

            for (row_idx, row) in rows.iter().enumerate() {
                let xlsx_row = row_idx as u32 + 1;
                for (col, header) in headers.iter().enumerate() {
                    let col = col as u16;
                    match row.get(header) {
                        Some(Cell::Number(n)) => {
                            sheet.write_number(xlsx_row, col, *n)?;
                        }
                        Some(Cell::Bool(b)) => {
                            sheet.write_boolean(xlsx_row, col, *b)?;
                        }
                        Some(Cell::Text(s)) => {
                            sheet.write_string(xlsx_row, col, s.as_str())?;
                        }
                        Some(Cell::Empty) | None => {}
                    }
                }
            }
        }

        Ok(workbook.save_to_buffer()?)
    }

    /// Entities as a JSON object of row arrays.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::to_value(&self.entities).unwrap_or_default()
    }
}

fn write_csv(headers: &[String], rows: &[Row]) -> OutputResult<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(headers)?;
    for row in rows {
        writer.write_record(
            headers
                .iter()
                .map(|h| row.get(h).and_then(Cell::as_text).unwrap_or_default()),
        )?;
    }
    writer
        .into_inner()
        .map_err(|e| OutputError::Io(e.into_error()))
}
